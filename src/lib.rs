//! Library crate for trivia-show-back: a multi-game trivia show engine served
//! over REST, Server-Sent Events and a controller hub WebSocket.

pub mod config;
pub mod dao;
mod dto;
mod error;
pub mod routes;
pub mod services;
pub mod state;
