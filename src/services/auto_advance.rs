//! Derives the timers a game needs from its current state.
//!
//! Timers are never mutated in place: after every generation change the façade
//! asks [`required_timers`] what should be running and replaces the whole set.

use std::{ops::ControlFlow, time::Duration};

use uuid::Uuid;

use crate::{
    services::{
        engine::{self, Countdown},
        game_service,
        timers::{TimerKind, TimerTask},
    },
    state::{
        SharedState,
        game::{GameInstance, unix_millis},
        rounds::{FastestFingerPhase, HotPotatoPhase, RoundRuntime, StealPhase},
        state_machine::QuestionStage,
    },
};

/// Countdowns tick once per second.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// A timer the game should be running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPlan {
    /// Per-second countdown.
    Countdown(TimerKind),
    /// One-shot automatic step.
    Delayed {
        /// Step to run.
        kind: TimerKind,
        /// Wait before running it.
        delay: Duration,
    },
}

impl TimerPlan {
    /// Kind of the planned timer.
    pub fn kind(&self) -> TimerKind {
        match self {
            TimerPlan::Countdown(kind) | TimerPlan::Delayed { kind, .. } => *kind,
        }
    }
}

/// Timers required by the game in its current state.
///
/// Paused and finished games need none; their countdowns keep the remaining
/// seconds stored on the game and resume from there.
pub fn required_timers(game: &GameInstance) -> Vec<TimerPlan> {
    let Some(stage) = game.phase().question_stage() else {
        return Vec::new();
    };
    let settings = &game.settings;
    let mut plans = Vec::new();

    match stage {
        QuestionStage::Waiting => {}
        QuestionStage::Active => {
            let Some(question) = game.question.as_ref() else {
                return plans;
            };
            let bomb_burning = matches!(
                &game.runtime,
                RoundRuntime::HotPotato(bomb) if bomb.phase != HotPotatoPhase::Exploded
            );
            if bomb_burning {
                plans.push(TimerPlan::Countdown(TimerKind::Bomb));
            }

            if question.is_open() {
                let sub_timer = match &game.runtime {
                    RoundRuntime::FastestFinger(ff) if ff.phase == FastestFingerPhase::Answering => {
                        Some(TimerKind::AnswerTurn)
                    }
                    RoundRuntime::StealPoints(steal) if steal.phase == StealPhase::Answering => {
                        Some(TimerKind::StealAnswer)
                    }
                    _ => None,
                };
                let uses_question_timer = game
                    .active_round()
                    .is_some_and(|round| round.config.kind.uses_question_timer());
                match sub_timer {
                    Some(kind) => plans.push(TimerPlan::Countdown(kind)),
                    None if uses_question_timer => {
                        plans.push(TimerPlan::Countdown(TimerKind::Question))
                    }
                    None => {}
                }
            } else if settings.auto_reveal {
                plans.push(TimerPlan::Delayed {
                    kind: TimerKind::AutoReveal,
                    delay: settings.reveal_delay,
                });
            }
        }
        QuestionStage::Revealed => {
            if settings.auto_show_points {
                plans.push(TimerPlan::Delayed {
                    kind: TimerKind::AutoShowPoints,
                    delay: settings.show_points_delay,
                });
            }
        }
        QuestionStage::PointsShown => {
            if engine::has_more_to_play(game) {
                if settings.auto_next {
                    plans.push(TimerPlan::Delayed {
                        kind: TimerKind::AutoNext,
                        delay: settings.next_delay,
                    });
                }
            } else if settings.auto_end_game {
                plans.push(TimerPlan::Delayed {
                    kind: TimerKind::AutoEndGame,
                    delay: settings.next_delay,
                });
            }
        }
    }
    plans
}

/// Turn plans into orchestrator tasks bound to `generation`.
///
/// Every callback re-checks the generation under the game lock, so a timer that
/// fires after the game moved on does nothing.
pub fn build_tasks(
    state: &SharedState,
    game_id: Uuid,
    generation: u64,
    plans: Vec<TimerPlan>,
) -> Vec<(TimerKind, TimerTask)> {
    plans
        .into_iter()
        .map(|plan| {
            let state = state.clone();
            let task = match plan {
                TimerPlan::Countdown(kind) => TimerTask::Countdown {
                    period: TICK_PERIOD,
                    on_tick: Box::new(move || {
                        let ticked = game_service::apply_timed(&state, game_id, generation, |game, events| {
                            engine::tick_countdown(game, kind, events)
                        });
                        match ticked {
                            Some(Countdown::Running(_)) => ControlFlow::Continue(()),
                            _ => ControlFlow::Break(()),
                        }
                    }),
                },
                TimerPlan::Delayed { kind, delay } => TimerTask::Once {
                    delay,
                    action: Box::new(move || run_step(&state, game_id, generation, kind)),
                },
            };
            (plan.kind(), task)
        })
        .collect()
}

fn run_step(state: &SharedState, game_id: Uuid, generation: u64, kind: TimerKind) {
    match kind {
        TimerKind::AutoReveal => {
            game_service::apply_timed(state, game_id, generation, engine::reveal);
        }
        TimerKind::AutoShowPoints => {
            game_service::apply_timed(state, game_id, generation, engine::show_points);
        }
        TimerKind::AutoNext => {
            game_service::apply_timed(state, game_id, generation, |game, events| {
                engine::next(game, unix_millis(), &mut rand::rng(), events)
            });
        }
        TimerKind::AutoEndGame => {
            game_service::apply_timed(state, game_id, generation, engine::end_game);
        }
        TimerKind::Question | TimerKind::AnswerTurn | TimerKind::StealAnswer | TimerKind::Bomb => {
            tracing::warn!(game_id = %game_id, ?kind, "countdown scheduled as a one-shot step");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        services::engine::{Button, Press, PressAction, RoundDraft},
        state::{
            game::{Choice, ChoiceColor, ControllerSlot, GameSettings, Question},
            rounds::{RoundConfig, RoundKind},
        },
    };

    fn question() -> Question {
        Question {
            prompt: "Capital of Peru?".into(),
            choices: [ChoiceColor::Blue, ChoiceColor::Orange]
                .into_iter()
                .map(|color| Choice {
                    text: format!("{color:?}"),
                    color,
                    correct: color == ChoiceColor::Blue,
                })
                .collect(),
            media_url: None,
        }
    }

    fn game_with(kind: RoundKind, settings: GameSettings) -> GameInstance {
        let mut game = GameInstance::new("Quiz night".into(), settings);
        let team = engine::add_team(&mut game, "Owls", None).unwrap();
        engine::add_player(&mut game, team, "Ada", ControllerSlot::new(1).unwrap()).unwrap();
        let other = engine::add_team(&mut game, "Cats", None).unwrap();
        engine::add_player(&mut game, other, "Bob", ControllerSlot::new(2).unwrap()).unwrap();
        let config = RoundConfig {
            title: "Round".into(),
            kind,
            question_time: Duration::from_secs(20),
        };
        engine::set_rounds(
            &mut game,
            vec![RoundDraft {
                config,
                questions: vec![question(), question()],
            }],
        )
        .unwrap();
        engine::begin_setup(&mut game).unwrap();
        engine::start_game(&mut game).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let mut events = Vec::new();
        engine::start_round(&mut game, None, &mut rng, &mut events).unwrap();
        engine::start_question(&mut game, 1_000, &mut events).unwrap();
        game
    }

    fn manual() -> GameSettings {
        GameSettings {
            auto_reveal: false,
            auto_show_points: false,
            auto_next: false,
            auto_end_game: false,
            ..GameSettings::default()
        }
    }

    fn auto_settings() -> GameSettings {
        GameSettings {
            auto_reveal: true,
            auto_show_points: true,
            auto_next: true,
            auto_end_game: true,
            ..GameSettings::default()
        }
    }

    fn multiple_choice() -> RoundKind {
        RoundKind::MultipleChoice {
            correct_points: 100,
            wrong_points: 0,
            speed_bonus: None,
        }
    }

    fn press(game: &mut GameInstance, slot: u8, button: Button) {
        let press = Press {
            slot: ControllerSlot::new(slot).unwrap(),
            button,
            action: PressAction::Press,
            timestamp_ms: 2_000,
        };
        engine::handle_press(game, press, &mut Vec::new()).unwrap();
    }

    #[test]
    fn open_question_runs_the_question_countdown() {
        let game = game_with(multiple_choice(), manual());
        assert_eq!(
            required_timers(&game),
            vec![TimerPlan::Countdown(TimerKind::Question)]
        );
    }

    #[test]
    fn answer_turn_preempts_the_question_countdown() {
        let mut game = game_with(
            RoundKind::FastestFinger {
                correct_points: 100,
                wrong_points: -50,
                answer_time: Duration::from_secs(5),
            },
            manual(),
        );
        press(&mut game, 1, Button::Buzz);
        assert_eq!(
            required_timers(&game),
            vec![TimerPlan::Countdown(TimerKind::AnswerTurn)]
        );
    }

    #[test]
    fn resolved_question_waits_for_the_host_without_auto_reveal() {
        let mut game = game_with(multiple_choice(), manual());
        press(&mut game, 1, Button::Blue);
        press(&mut game, 2, Button::Orange);
        assert!(required_timers(&game).is_empty());
    }

    #[test]
    fn auto_steps_follow_the_stage() {
        let settings = auto_settings();
        let mut game = game_with(multiple_choice(), settings.clone());
        press(&mut game, 1, Button::Blue);
        press(&mut game, 2, Button::Blue);
        assert_eq!(
            required_timers(&game),
            vec![TimerPlan::Delayed {
                kind: TimerKind::AutoReveal,
                delay: settings.reveal_delay,
            }]
        );

        let mut events = Vec::new();
        engine::reveal(&mut game, &mut events).unwrap();
        assert_eq!(
            required_timers(&game).iter().map(TimerPlan::kind).collect::<Vec<_>>(),
            vec![TimerKind::AutoShowPoints]
        );

        engine::show_points(&mut game, &mut events).unwrap();
        assert_eq!(
            required_timers(&game).iter().map(TimerPlan::kind).collect::<Vec<_>>(),
            vec![TimerKind::AutoNext]
        );
    }

    #[test]
    fn last_question_schedules_the_end_of_the_game() {
        let mut game = game_with(multiple_choice(), auto_settings());
        let mut rng = StdRng::seed_from_u64(1);
        let mut events = Vec::new();
        for _ in 0..2 {
            press(&mut game, 1, Button::Blue);
            press(&mut game, 2, Button::Orange);
            engine::reveal(&mut game, &mut events).unwrap();
            engine::show_points(&mut game, &mut events).unwrap();
            if engine::has_more_to_play(&game) {
                engine::next(&mut game, 5_000, &mut rng, &mut events).unwrap();
            }
        }
        assert_eq!(
            required_timers(&game).iter().map(TimerPlan::kind).collect::<Vec<_>>(),
            vec![TimerKind::AutoEndGame]
        );
    }

    #[test]
    fn paused_game_needs_no_timer() {
        let mut game = game_with(multiple_choice(), auto_settings());
        engine::pause(&mut game, &mut Vec::new()).unwrap();
        assert!(required_timers(&game).is_empty());
    }

    #[test]
    fn bomb_keeps_burning_while_the_holder_passes() {
        let mut game = game_with(
            RoundKind::HotPotato {
                correct_points: 50,
                wrong_points: 0,
                bomb_time: Duration::from_secs(30),
                explosion_penalty: 200,
            },
            manual(),
        );
        assert_eq!(
            required_timers(&game),
            vec![TimerPlan::Countdown(TimerKind::Bomb)]
        );

        let RoundRuntime::HotPotato(bomb) = &game.runtime else {
            panic!("hot potato runtime expected");
        };
        let holder_slot = game.player(bomb.holder).unwrap().1.slot.get();
        press(&mut game, holder_slot, Button::Blue);
        assert_eq!(
            required_timers(&game),
            vec![TimerPlan::Countdown(TimerKind::Bomb)]
        );
    }
}
