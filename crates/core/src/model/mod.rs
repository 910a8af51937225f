mod badge;
mod curriculum;
mod ids;
mod progress;

pub use ids::{BadgeId, LessonId, ModuleId, ParseIdError, UserId};

pub use badge::{Badge, BadgeCatalog, BadgeCategory, BadgeRule};
pub use curriculum::{
    Curriculum, CurriculumError, CurriculumModule, DEFAULT_PASS_THRESHOLD, Lesson, QuizSpec,
};
pub use progress::{FontSize, LessonScore, Preferences, ProgressPatch, Theme, UserProgress};
