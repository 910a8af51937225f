use serde::{Deserialize, Serialize};

use crate::model::curriculum::Curriculum;
use crate::model::ids::{BadgeId, ModuleId};
use crate::model::progress::UserProgress;

/// Unlock-predicate category of a badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BadgeCategory {
    Completion,
    Perfection,
    Module,
    Points,
    Streak,
}

/// Condition under which a badge is awarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "value")]
pub enum BadgeRule {
    FirstLesson,
    LessonsCompleted(usize),
    PerfectScore,
    ModuleCompleted(ModuleId),
    PointsReached(u64),
    StreakReached(u32),
}

impl BadgeRule {
    #[must_use]
    pub fn category(&self) -> BadgeCategory {
        match self {
            BadgeRule::FirstLesson | BadgeRule::LessonsCompleted(_) => BadgeCategory::Completion,
            BadgeRule::PerfectScore => BadgeCategory::Perfection,
            BadgeRule::ModuleCompleted(_) => BadgeCategory::Module,
            BadgeRule::PointsReached(_) => BadgeCategory::Points,
            BadgeRule::StreakReached(_) => BadgeCategory::Streak,
        }
    }

    #[must_use]
    pub fn is_satisfied(&self, progress: &UserProgress, curriculum: &Curriculum) -> bool {
        match self {
            BadgeRule::FirstLesson => !progress.completed_lessons.is_empty(),
            BadgeRule::LessonsCompleted(n) => progress.completed_lessons.len() >= *n,
            BadgeRule::PerfectScore => progress.scores.values().any(|s| s.is_perfect),
            BadgeRule::ModuleCompleted(module_id) => curriculum
                .module_lessons(module_id)
                .is_some_and(|lessons| {
                    lessons
                        .iter()
                        .all(|l| progress.completed_lessons.contains(&l.id))
                }),
            BadgeRule::PointsReached(points) => progress.total_points >= *points,
            BadgeRule::StreakReached(days) => progress.streak >= *days,
        }
    }
}

/// Static badge definition. Learners only store the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub id: BadgeId,
    pub title: String,
    pub description: String,
    pub rule: BadgeRule,
}

impl Badge {
    #[must_use]
    pub fn new(
        id: impl Into<BadgeId>,
        title: impl Into<String>,
        description: impl Into<String>,
        rule: BadgeRule,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            rule,
        }
    }

    #[must_use]
    pub fn category(&self) -> BadgeCategory {
        self.rule.category()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BadgeCatalog {
    badges: Vec<Badge>,
}

impl BadgeCatalog {
    #[must_use]
    pub fn new(badges: Vec<Badge>) -> Self {
        Self { badges }
    }

    /// Default catalog: first lesson, perfect quiz, one badge per module,
    /// point milestones, and streak milestones.
    #[must_use]
    pub fn standard(curriculum: &Curriculum) -> Self {
        let mut badges = vec![
            Badge::new(
                "first-steps",
                "First steps",
                "Complete your first lesson",
                BadgeRule::FirstLesson,
            ),
            Badge::new(
                "perfectionist",
                "Perfectionist",
                "Answer every question in a quiz correctly",
                BadgeRule::PerfectScore,
            ),
        ];
        badges.extend(curriculum.modules().iter().map(|module| {
            Badge::new(
                format!("module-{}", module.id),
                format!("{} complete", module.title),
                format!("Finish every lesson in \"{}\"", module.title),
                BadgeRule::ModuleCompleted(module.id.clone()),
            )
        }));
        badges.extend([
            Badge::new(
                "points-250",
                "Rising star",
                "Earn 250 points",
                BadgeRule::PointsReached(250),
            ),
            Badge::new(
                "points-500",
                "High achiever",
                "Earn 500 points",
                BadgeRule::PointsReached(500),
            ),
            Badge::new(
                "streak-3",
                "On a roll",
                "Practice three days in a row",
                BadgeRule::StreakReached(3),
            ),
            Badge::new(
                "streak-7",
                "Week of learning",
                "Practice seven days in a row",
                BadgeRule::StreakReached(7),
            ),
        ]);
        Self { badges }
    }

    #[must_use]
    pub fn badges(&self) -> &[Badge] {
        &self.badges
    }

    #[must_use]
    pub fn get(&self, id: &BadgeId) -> Option<&Badge> {
        self.badges.iter().find(|b| &b.id == id)
    }

    /// Badges whose rule holds and which the learner has not yet earned.
    #[must_use]
    pub fn eligible(&self, progress: &UserProgress, curriculum: &Curriculum) -> Vec<BadgeId> {
        self.badges
            .iter()
            .filter(|b| !progress.earned_badges.contains(&b.id))
            .filter(|b| b.rule.is_satisfied(progress, curriculum))
            .map(|b| b.id.clone())
            .collect()
    }
}
