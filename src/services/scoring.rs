//! Deferred scoring: values are staged on answer and committed on reveal.

use crate::state::{
    game::PendingAnswer,
    rounds::{RoundKind, SpeedBonus},
};

/// Points to stage for an answer given `prior` answers already received for the question.
///
/// Pure: committed scores are untouched.
pub fn stage_points(kind: &RoundKind, correct: bool, prior: &[PendingAnswer]) -> i64 {
    if !correct {
        return i64::from(kind.wrong_points());
    }

    let prior_correct = prior.iter().filter(|answer| answer.correct).count();
    let points = match kind {
        RoundKind::TrueFalse { correct_points, .. } => {
            if prior_correct == 0 {
                *correct_points
            } else {
                0
            }
        }
        RoundKind::MultipleChoice {
            speed_bonus: Some(bonus),
            ..
        }
        | RoundKind::PictureSound {
            speed_bonus: Some(bonus),
            ..
        } => speed_points(bonus, prior_correct),
        RoundKind::StealPoints { .. } | RoundKind::Ladder { .. } => 0,
        other => other.correct_points(),
    };
    i64::from(points)
}

fn speed_points(bonus: &SpeedBonus, rank: usize) -> i32 {
    match bonus {
        SpeedBonus::FastSlow { fast, slow } => {
            if rank == 0 {
                *fast
            } else {
                *slow
            }
        }
        SpeedBonus::Ranked { table } => table.get(rank).copied().unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uuid::Uuid;

    use super::*;
    use crate::state::game::ChoiceColor;

    fn answer(correct: bool) -> PendingAnswer {
        PendingAnswer {
            player_id: Uuid::new_v4(),
            team_id: Uuid::new_v4(),
            choice: ChoiceColor::Blue,
            timestamp_ms: 0,
            latency_ms: 0,
            correct,
            staged_points: 0,
        }
    }

    #[test]
    fn wrong_answers_use_configured_value() {
        let kind = RoundKind::FastestFinger {
            correct_points: 200,
            wrong_points: -100,
            answer_time: Duration::from_secs(5),
        };
        assert_eq!(stage_points(&kind, false, &[]), -100);
        assert_eq!(stage_points(&kind, true, &[]), 200);
    }

    #[test]
    fn true_false_rewards_only_first_correct() {
        let kind = RoundKind::TrueFalse {
            correct_points: 100,
            wrong_points: 0,
        };
        assert_eq!(stage_points(&kind, true, &[answer(false)]), 100);
        assert_eq!(stage_points(&kind, true, &[answer(false), answer(true)]), 0);
    }

    #[test]
    fn fast_slow_bonus() {
        let kind = RoundKind::MultipleChoice {
            correct_points: 100,
            wrong_points: 0,
            speed_bonus: Some(SpeedBonus::FastSlow {
                fast: 300,
                slow: 100,
            }),
        };
        assert_eq!(stage_points(&kind, true, &[answer(false)]), 300);
        assert_eq!(stage_points(&kind, true, &[answer(true)]), 100);
    }

    #[test]
    fn ranked_table_falls_to_zero() {
        let kind = RoundKind::PictureSound {
            correct_points: 100,
            wrong_points: 0,
            speed_bonus: Some(SpeedBonus::Ranked {
                table: vec![500, 300],
            }),
        };
        let prior = vec![answer(true), answer(true)];
        assert_eq!(stage_points(&kind, true, &prior[..1]), 300);
        assert_eq!(stage_points(&kind, true, &prior), 0);
    }

    #[test]
    fn steal_and_ladder_stage_nothing_on_correct() {
        let steal = RoundKind::StealPoints {
            wrong_points: -50,
            steal_amount: 300,
            answer_time: Duration::from_secs(5),
        };
        let ladder = RoundKind::Ladder {
            rungs: vec![100, 200],
        };
        assert_eq!(stage_points(&steal, true, &[]), 0);
        assert_eq!(stage_points(&steal, false, &[]), -50);
        assert_eq!(stage_points(&ladder, true, &[]), 0);
    }
}
