use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{LessonId, ModuleId};

/// Passing threshold applied when a quiz does not specify one.
pub const DEFAULT_PASS_THRESHOLD: u8 = 80;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CurriculumError {
    #[error("curriculum must contain at least one module")]
    NoModules,

    #[error("module {0} has no lessons")]
    EmptyModule(ModuleId),

    #[error("duplicate module id: {0}")]
    DuplicateModule(ModuleId),

    #[error("duplicate lesson id: {0}")]
    DuplicateLesson(LessonId),

    #[error("lesson {0} must have at least one question")]
    NoQuestions(LessonId),

    #[error("lesson {lesson} has pass threshold {threshold} (must be <= 100)")]
    InvalidThreshold { lesson: LessonId, threshold: u8 },

    #[error("invalid curriculum document: {0}")]
    Parse(String),
}

//
// ─── GRAPH NODES ───────────────────────────────────────────────────────────────
//

fn default_pass_threshold() -> u8 {
    DEFAULT_PASS_THRESHOLD
}

/// Quiz attached to a lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSpec {
    pub total_questions: u32,
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: u8,
}

impl QuizSpec {
    #[must_use]
    pub fn new(total_questions: u32) -> Self {
        Self {
            total_questions,
            pass_threshold: DEFAULT_PASS_THRESHOLD,
        }
    }

    #[must_use]
    pub fn with_pass_threshold(mut self, threshold: u8) -> Self {
        self.pass_threshold = threshold;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub title: String,
    pub quiz: QuizSpec,
}

impl Lesson {
    #[must_use]
    pub fn new(id: impl Into<LessonId>, title: impl Into<String>, quiz: QuizSpec) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            quiz,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurriculumModule {
    pub id: ModuleId,
    pub title: String,
    pub lessons: Vec<Lesson>,
}

impl CurriculumModule {
    #[must_use]
    pub fn new(id: impl Into<ModuleId>, title: impl Into<String>, lessons: Vec<Lesson>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            lessons,
        }
    }
}

//
// ─── CURRICULUM ────────────────────────────────────────────────────────────────
//

/// Ordered modules, each holding ordered lessons.
///
/// Lesson order within a module and module order across the curriculum are
/// total orders; construction rejects duplicates and empty modules so that
/// successor lookups are always well defined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Curriculum {
    modules: Vec<CurriculumModule>,
}

#[derive(Deserialize)]
struct CurriculumDocument {
    modules: Vec<CurriculumModule>,
}

impl Curriculum {
    /// Validates and builds a curriculum graph.
    ///
    /// # Errors
    ///
    /// Returns `CurriculumError` if the graph is empty, a module has no lessons,
    /// an id repeats, or a quiz definition is out of range.
    pub fn new(modules: Vec<CurriculumModule>) -> Result<Self, CurriculumError> {
        if modules.is_empty() {
            return Err(CurriculumError::NoModules);
        }

        let mut module_ids = HashSet::new();
        let mut lesson_ids = HashSet::new();
        for module in &modules {
            if !module_ids.insert(module.id.clone()) {
                return Err(CurriculumError::DuplicateModule(module.id.clone()));
            }
            if module.lessons.is_empty() {
                return Err(CurriculumError::EmptyModule(module.id.clone()));
            }
            for lesson in &module.lessons {
                if !lesson_ids.insert(lesson.id.clone()) {
                    return Err(CurriculumError::DuplicateLesson(lesson.id.clone()));
                }
                if lesson.quiz.total_questions == 0 {
                    return Err(CurriculumError::NoQuestions(lesson.id.clone()));
                }
                if lesson.quiz.pass_threshold > 100 {
                    return Err(CurriculumError::InvalidThreshold {
                        lesson: lesson.id.clone(),
                        threshold: lesson.quiz.pass_threshold,
                    });
                }
            }
        }

        Ok(Self { modules })
    }

    /// Parses a JSON curriculum document of the form `{"modules": [...]}`.
    ///
    /// # Errors
    ///
    /// Returns `CurriculumError::Parse` for malformed JSON, or any validation
    /// error from [`Curriculum::new`].
    pub fn from_json(raw: &str) -> Result<Self, CurriculumError> {
        let doc: CurriculumDocument =
            serde_json::from_str(raw).map_err(|err| CurriculumError::Parse(err.to_string()))?;
        Self::new(doc.modules)
    }

    #[must_use]
    pub fn modules(&self) -> &[CurriculumModule] {
        &self.modules
    }

    /// All lessons in curriculum order.
    pub fn lessons(&self) -> impl Iterator<Item = &Lesson> {
        self.modules.iter().flat_map(|m| m.lessons.iter())
    }

    #[must_use]
    pub fn first_lesson(&self) -> &Lesson {
        // Non-empty by construction.
        &self.modules[0].lessons[0]
    }

    /// `(module_index, lesson_index)` of a lesson.
    #[must_use]
    pub fn position(&self, id: &LessonId) -> Option<(usize, usize)> {
        self.modules.iter().enumerate().find_map(|(mi, module)| {
            module
                .lessons
                .iter()
                .position(|lesson| &lesson.id == id)
                .map(|li| (mi, li))
        })
    }

    #[must_use]
    pub fn lesson(&self, id: &LessonId) -> Option<&Lesson> {
        self.position(id)
            .map(|(mi, li)| &self.modules[mi].lessons[li])
    }

    #[must_use]
    pub fn module_of(&self, id: &LessonId) -> Option<&CurriculumModule> {
        self.position(id).map(|(mi, _)| &self.modules[mi])
    }

    /// Lessons of a module in curriculum order.
    #[must_use]
    pub fn module_lessons(&self, id: &ModuleId) -> Option<&[Lesson]> {
        self.modules
            .iter()
            .find(|m| &m.id == id)
            .map(|m| m.lessons.as_slice())
    }

    /// The lesson that completing `id` makes reachable: the next lesson in the
    /// same module, else the first lesson of the next module, else `None`.
    #[must_use]
    pub fn next_lesson(&self, id: &LessonId) -> Option<&Lesson> {
        let (mi, li) = self.position(id)?;
        let module = &self.modules[mi];
        if let Some(next) = module.lessons.get(li + 1) {
            return Some(next);
        }
        self.modules.get(mi + 1).and_then(|m| m.lessons.first())
    }

    #[must_use]
    pub fn total_questions(&self, id: &LessonId) -> Option<u32> {
        self.lesson(id).map(|l| l.quiz.total_questions)
    }

    #[must_use]
    pub fn pass_threshold(&self, id: &LessonId) -> Option<u8> {
        self.lesson(id).map(|l| l.quiz.pass_threshold)
    }

    /// Built-in digital literacy course: email, web search, and device settings.
    #[must_use]
    pub fn digital_literacy() -> Self {
        let lesson = |id: &str, title: &str, questions: u32| {
            Lesson::new(id, title, QuizSpec::new(questions))
        };
        let modules = vec![
            CurriculumModule::new(
                "email-basics",
                "Email basics",
                vec![
                    lesson("email-1", "Opening your inbox", 5),
                    lesson("email-2", "Writing and sending a message", 5),
                    lesson("email-3", "Attachments and replies", 5),
                    lesson("email-4", "Spotting suspicious email", 6),
                ],
            ),
            CurriculumModule::new(
                "web-search",
                "Searching the web",
                vec![
                    lesson("search-1", "Using a search box", 5),
                    lesson("search-2", "Choosing trustworthy results", 5),
                    lesson("search-3", "Refining a search", 4),
                ],
            ),
            CurriculumModule::new(
                "device-settings",
                "Device settings",
                vec![
                    lesson("settings-1", "Text size and display", 4),
                    lesson("settings-2", "Wi-Fi and connectivity", 5),
                    lesson("settings-3", "Privacy and permissions", 6),
                ],
            ),
        ];
        Self { modules }
    }
}

impl<'de> Deserialize<'de> for Curriculum {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let doc = CurriculumDocument::deserialize(deserializer)?;
        Curriculum::new(doc.modules).map_err(serde::de::Error::custom)
    }
}
