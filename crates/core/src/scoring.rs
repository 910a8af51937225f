//! Reward points for quiz outcomes.

/// Points granted for finishing a lesson, regardless of answers.
pub const BASE_COMPLETION: u32 = 30;
/// Points per correctly answered question.
pub const PER_CORRECT_ANSWER: u32 = 5;
/// Extra points when every question was answered correctly.
pub const PERFECT_SCORE_BONUS: u32 = 20;

/// Reward for a single lesson completion.
///
/// Does not check `correct_answers` against the quiz size; callers derive it
/// with [`correct_answers`].
#[must_use]
pub fn points(correct_answers: u32, is_perfect: bool) -> u32 {
    let bonus = if is_perfect { PERFECT_SCORE_BONUS } else { 0 };
    BASE_COMPLETION
        .saturating_add(correct_answers.saturating_mul(PER_CORRECT_ANSWER))
        .saturating_add(bonus)
}

/// `round(score / 100 * total_questions)`, rounding halves away from zero.
#[must_use]
pub fn correct_answers(score: u8, total_questions: u32) -> u32 {
    let scaled = u64::from(score) * u64::from(total_questions);
    let rounded = (scaled + 50) / 100;
    u32::try_from(rounded).unwrap_or(u32::MAX)
}
