use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::{phase::VisiblePhase, sse::ChoiceView},
    state::{
        game::{
            BuzzRecord, ChoiceColor, GameInstance, GameSettings, QuestionResolution,
            Round, RoundResult, RoundStatus, Team, TeamColor,
        },
        rounds::{
            BuzzerRef, FastestFingerPhase, HotPotatoEntry, HotPotatoPhase, RoundKindTag,
            RoundRuntime, StealPhase,
        },
        state_machine::{GameStatus, PlayPhase, QuestionStage},
    },
};

/// Player as shown to displays.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct PlayerView {
    pub id: Uuid,
    pub name: String,
    pub slot: u8,
}

/// Team with its committed score.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct TeamView {
    pub id: Uuid,
    pub name: String,
    pub color: TeamColor,
    pub score: u32,
    pub players: Vec<PlayerView>,
}

impl From<(&Uuid, &Team)> for TeamView {
    fn from((id, team): (&Uuid, &Team)) -> Self {
        Self {
            id: *id,
            name: team.name.clone(),
            color: team.color,
            score: team.score,
            players: team
                .players
                .iter()
                .map(|player| PlayerView {
                    id: player.id,
                    name: player.name.clone(),
                    slot: player.slot.get(),
                })
                .collect(),
        }
    }
}

/// Round outline; questions are not exposed.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct RoundView {
    pub title: String,
    pub kind: RoundKindTag,
    pub question_count: usize,
    pub current_question_index: i32,
    pub status: RoundStatus,
}

impl From<&Round> for RoundView {
    fn from(round: &Round) -> Self {
        Self {
            title: round.config.title.clone(),
            kind: round.config.kind.tag(),
            question_count: round.questions.len(),
            current_question_index: round.current_question_index,
            status: round.status,
        }
    }
}

/// Question on screen.
///
/// Correctness stays hidden until the reveal; before it only the identity of the
/// players who answered and whether answers are locked are public.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct QuestionView {
    pub index: usize,
    pub prompt: String,
    pub choices: Vec<ChoiceView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    pub time_limit_secs: u32,
    pub remaining_secs: u32,
    pub buzz_queue: Vec<BuzzRecord>,
    pub answered: Vec<Uuid>,
    /// No more answers are accepted.
    pub closed: bool,
    /// Why the question closed, once revealed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<QuestionResolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_choice: Option<ChoiceColor>,
}

/// Archetype-specific live state.
#[derive(Debug, Serialize, ToSchema, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuntimeView {
    FastestFinger {
        phase: FastestFingerPhase,
        #[serde(skip_serializing_if = "Option::is_none")]
        answering_player_id: Option<Uuid>,
        eliminated: Vec<Uuid>,
        answer_remaining_secs: u32,
    },
    HotPotato {
        /// `passing` is public: any non-holder press picks the next holder.
        phase: HotPotatoPhase,
        holder_id: Uuid,
        team_id: Uuid,
        bomb_remaining_secs: u32,
        bomb_total_secs: u32,
        /// Only published once the bomb exploded.
        #[serde(skip_serializing_if = "Option::is_none")]
        history: Option<Vec<HotPotatoEntry>>,
    },
    StealPoints {
        phase: StealPhase,
        #[serde(skip_serializing_if = "Option::is_none")]
        buzzer: Option<BuzzerRef>,
        steal_amount: u32,
        answer_remaining_secs: u32,
    },
    /// Climb progress is withheld while a question is open.
    Ladder {
        team_id: Uuid,
        rungs: Vec<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        rung: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        unbanked: Option<u32>,
        banked: u32,
    },
    Final {
        #[serde(skip_serializing_if = "Option::is_none")]
        gate_holder: Option<BuzzerRef>,
    },
}

/// Public snapshot of a game broadcast as `game.snapshot` and served by the public routes.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct GameStateView {
    pub id: Uuid,
    pub name: String,
    pub status: GameStatus,
    pub phase: VisiblePhase,
    pub generation: u64,
    pub teams: Vec<TeamView>,
    pub rounds: Vec<RoundView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_round: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<QuestionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<RuntimeView>,
    pub round_results: Vec<RoundResult>,
    pub settings: GameSettings,
    pub updated_at_ms: u64,
}

impl From<&GameInstance> for GameStateView {
    fn from(game: &GameInstance) -> Self {
        let phase = game.phase();
        let stage = match phase.play_phase() {
            Some(PlayPhase::RoundActive(stage)) => Some(stage),
            Some(PlayPhase::Intermission) | None => None,
        };
        let question_open = stage == Some(QuestionStage::Active);
        let revealed = matches!(
            stage,
            Some(QuestionStage::Revealed | QuestionStage::PointsShown)
        );

        let question = game.question.as_ref().and_then(|state| {
            let question = game.active_round()?.questions.get(state.index)?;
            Some(QuestionView {
                index: state.index,
                prompt: question.prompt.clone(),
                choices: question
                    .choices
                    .iter()
                    .map(|choice| ChoiceView {
                        text: choice.text.clone(),
                        color: choice.color,
                    })
                    .collect(),
                media_url: question.media_url.clone(),
                time_limit_secs: state.time_limit_secs,
                remaining_secs: state.remaining_secs,
                buzz_queue: state.buzz_queue.clone(),
                answered: state.answers.iter().map(|answer| answer.player_id).collect(),
                closed: !state.is_open(),
                resolution: revealed.then_some(state.resolution).flatten(),
                correct_choice: revealed
                    .then(|| question.correct_choice().map(|choice| choice.color))
                    .flatten(),
            })
        });

        let runtime = match &game.runtime {
            RoundRuntime::Idle | RoundRuntime::Standard => None,
            RoundRuntime::Final(gate) => Some(RuntimeView::Final {
                gate_holder: gate.gate_holder,
            }),
            RoundRuntime::FastestFinger(ff) => {
                let queue = game
                    .question
                    .as_ref()
                    .map(|state| state.buzz_queue.as_slice())
                    .unwrap_or_default();
                Some(RuntimeView::FastestFinger {
                    phase: ff.phase,
                    answering_player_id: ff.current_buzzer(queue).map(|buzz| buzz.player_id),
                    eliminated: ff.eliminated.iter().copied().collect(),
                    answer_remaining_secs: ff.answer_remaining_secs,
                })
            }
            RoundRuntime::HotPotato(bomb) => Some(RuntimeView::HotPotato {
                phase: bomb.phase,
                holder_id: bomb.holder,
                team_id: bomb.holder_team,
                bomb_remaining_secs: bomb.bomb_remaining_secs,
                bomb_total_secs: bomb.bomb_total_secs,
                history: (bomb.phase == HotPotatoPhase::Exploded).then(|| bomb.history.clone()),
            }),
            RoundRuntime::StealPoints(steal) => Some(RuntimeView::StealPoints {
                phase: steal.phase,
                buzzer: steal.buzzer,
                steal_amount: steal.steal_amount,
                answer_remaining_secs: steal.answer_remaining_secs,
            }),
            RoundRuntime::Ladder(ladder) => Some(RuntimeView::Ladder {
                team_id: ladder.team_id,
                rungs: ladder.rungs.clone(),
                rung: (!question_open).then_some(ladder.rung),
                unbanked: (!question_open).then_some(ladder.unbanked),
                banked: ladder.banked,
            }),
        };

        Self {
            id: game.id,
            name: game.name.clone(),
            status: game.status(),
            phase: phase.into(),
            generation: game.generation(),
            teams: game.teams.iter().map(TeamView::from).collect(),
            rounds: game.rounds.iter().map(RoundView::from).collect(),
            active_round: game.active_round,
            question,
            runtime,
            round_results: game.round_results.clone(),
            settings: game.settings.clone(),
            updated_at_ms: game.updated_at_ms,
        }
    }
}
