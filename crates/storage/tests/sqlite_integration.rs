use std::collections::BTreeSet;
use std::sync::Arc;

use storage::document::{LocalProgressStore, RemoteRecord};
use storage::repository::{LocalStore, RemoteCounterField, RemoteSetField, RemoteStore, StorageError};
use storage::sqlite::SqliteRepository;
use tutor_core::Snapshot;
use tutor_core::model::{BadgeId, Curriculum, LessonId, UserId, UserProgress};
use tutor_core::time::fixed_now;

async fn repo(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_local_store_persists_progress_document() {
    let repo = Arc::new(repo("memdb_local_doc").await);
    let store = LocalProgressStore::new(repo.clone());

    let mut progress =
        UserProgress::new_default(UserId::local(), &Curriculum::digital_literacy(), fixed_now());
    progress.completed_lessons.insert(LessonId::new("email-1"));
    progress.unlocked_lessons.insert(LessonId::new("email-2"));
    progress.total_points = 50;

    store.save(&progress).await.unwrap();
    assert_eq!(store.load().await.unwrap(), Some(progress.clone()));

    progress.total_points = 100;
    store.save(&progress).await.unwrap();
    assert_eq!(store.load().await.unwrap().unwrap().total_points, 100);

    store.clear().await.unwrap();
    assert!(store.load().await.unwrap().is_none());
    assert!(repo.get("userProgress").await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_migrations_are_idempotent() {
    let repo = repo("memdb_migrate_twice").await;
    repo.migrate().await.expect("second migrate");
    repo.set("k", "v").await.unwrap();
    assert_eq!(repo.get("k").await.unwrap().as_deref(), Some("v"));
}

#[tokio::test]
async fn sqlite_remote_supports_commutative_updates() {
    let repo = repo("memdb_remote_ops").await;
    let user = UserId::new("learner-42");

    assert!(repo.get_record(&user).await.unwrap().is_none());

    let seed = RemoteRecord::from_snapshot(&Snapshot {
        completed_lessons: BTreeSet::from([LessonId::new("email-1")]),
        total_points: 50,
        earned_badges: BTreeSet::new(),
        streak: 1,
    });
    repo.create_record(&user, &seed).await.unwrap();
    // A second create must not clobber the first.
    repo.create_record(&user, &RemoteRecord::default())
        .await
        .unwrap();

    repo.append_to_set(&user, RemoteSetField::CompletedLessons, "email-2")
        .await
        .unwrap();
    repo.append_to_set(&user, RemoteSetField::CompletedLessons, "email-2")
        .await
        .unwrap();
    repo.append_to_set(&user, RemoteSetField::EarnedBadges, "first-steps")
        .await
        .unwrap();
    repo.increment_number(&user, RemoteCounterField::TotalPoints, 75)
        .await
        .unwrap();
    repo.increment_number(&user, RemoteCounterField::Streak, -3)
        .await
        .unwrap();

    let snapshot = repo.get_record(&user).await.unwrap().unwrap().into_snapshot();
    assert_eq!(
        snapshot.completed_lessons,
        BTreeSet::from([LessonId::new("email-1"), LessonId::new("email-2")])
    );
    assert_eq!(
        snapshot.earned_badges,
        BTreeSet::from([BadgeId::new("first-steps")])
    );
    assert_eq!(snapshot.total_points, 125);
    assert_eq!(snapshot.streak, 0);
}

#[tokio::test]
async fn sqlite_remote_overwrite_replaces_members() {
    let repo = repo("memdb_remote_overwrite").await;
    let user = UserId::new("learner-7");

    let first = RemoteRecord {
        lessons_completed: vec!["email-1".into(), "email-2".into()],
        points: 10,
        ..RemoteRecord::default()
    };
    repo.overwrite_record(&user, &first).await.unwrap();

    let second = RemoteRecord {
        lessons_completed: vec!["search-1".into()],
        badges: vec!["perfectionist".into()],
        points: 300,
        streak_days: 6,
        updated_at: Some(fixed_now()),
    };
    repo.overwrite_record(&user, &second).await.unwrap();

    let stored = repo.get_record(&user).await.unwrap().unwrap();
    assert_eq!(stored, second);
}

#[tokio::test]
async fn sqlite_remote_updates_require_a_record() {
    let repo = repo("memdb_remote_missing").await;
    let ghost = UserId::new("ghost");

    let err = repo
        .append_to_set(&ghost, RemoteSetField::EarnedBadges, "first-steps")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));

    let err = repo
        .increment_number(&ghost, RemoteCounterField::TotalPoints, 5)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}
