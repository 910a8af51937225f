//! Lesson accessibility derived from the completed and unlocked sets.

use crate::model::{Curriculum, LessonId, UserProgress};

/// Derived state of a lesson. Never stored directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LessonStatus {
    Locked,
    Unlocked,
    Completed,
}

#[must_use]
pub fn lesson_status(progress: &UserProgress, lesson: &LessonId) -> LessonStatus {
    if progress.completed_lessons.contains(lesson) {
        LessonStatus::Completed
    } else if progress.unlocked_lessons.contains(lesson) {
        LessonStatus::Unlocked
    } else {
        LessonStatus::Locked
    }
}

/// Advances the unlock frontier past `lesson`.
///
/// Unlocks the next lesson in the same module, or the first lesson of the
/// next module. The target also becomes `current_lesson`. Returns the target
/// only if it was not already unlocked; the last lesson of the last module
/// (or an unknown id) is a no-op.
pub fn unlock_next(
    progress: &mut UserProgress,
    curriculum: &Curriculum,
    lesson: &LessonId,
) -> Option<LessonId> {
    let target = curriculum.next_lesson(lesson)?.id.clone();
    progress.current_lesson = Some(target.clone());
    progress
        .unlocked_lessons
        .insert(target.clone())
        .then_some(target)
}

/// True when `score` meets the lesson's pass threshold.
#[must_use]
pub fn is_passing(curriculum: &Curriculum, lesson: &LessonId, score: u8) -> bool {
    curriculum
        .pass_threshold(lesson)
        .is_some_and(|threshold| score >= threshold)
}
