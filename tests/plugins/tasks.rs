use chrono::{TimeZone, Utc};
use questline::core::error::QuestlineError;
use questline::core::notify::NullNotifySink;
use questline::core::store::Store;
use questline::plugins::activity::{
    ActivityKind, SqliteActivityCounter, initialize_activity_db, record_activity,
};
use questline::plugins::ledger::{EntryKind, get_balance, initialize_ledger_db, list_entries};
use questline::plugins::tasks::{
    TaskCatalog, TaskCategory, TaskDef, claim_reward, default_tasks, get_progress,
    initialize_tasks_db, list_claims,
};
use std::sync::Arc;
use tempfile::tempdir;

fn setup() -> (tempfile::TempDir, Store) {
    let tmp = tempdir().unwrap();
    let store = Store::at(tmp.path());
    initialize_tasks_db(&store.root).unwrap();
    initialize_ledger_db(&store.root).unwrap();
    initialize_activity_db(&store.root).unwrap();
    (tmp, store)
}

fn catalog() -> TaskCatalog {
    TaskCatalog::new(default_tasks()).unwrap()
}

#[test]
fn test_unknown_task() {
    let (_tmp, store) = setup();
    let counter = SqliteActivityCounter::new(&store);

    let err = claim_reward(
        &store,
        &catalog(),
        &counter,
        &NullNotifySink,
        "alice",
        "no_such_task",
        Utc::now(),
    )
    .unwrap_err();
    assert!(matches!(err, QuestlineError::UnknownTask(_)));
}

#[test]
fn test_claim_requires_completion() {
    let (_tmp, store) = setup();
    let counter = SqliteActivityCounter::new(&store);

    let err = claim_reward(
        &store,
        &catalog(),
        &counter,
        &NullNotifySink,
        "alice",
        "daily_comment",
        Utc::now(),
    )
    .unwrap_err();
    match err {
        QuestlineError::TaskNotCompleted {
            progress,
            threshold,
            ..
        } => {
            assert_eq!(progress, 0);
            assert_eq!(threshold, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(list_claims(&store, "alice").unwrap().is_empty());
}

#[test]
fn test_progress_only_counts_inside_window() {
    let (_tmp, store) = setup();
    let counter = SqliteActivityCounter::new(&store);
    let cat = catalog();
    let task = cat.get("daily_comment").unwrap();

    let yesterday = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let today = Utc.with_ymd_and_hms(2024, 6, 2, 9, 0, 0).unwrap();
    record_activity(&store, "alice", ActivityKind::Comment, yesterday).unwrap();

    assert_eq!(get_progress(&counter, "alice", task, today).unwrap(), 0);
    assert_eq!(get_progress(&counter, "alice", task, yesterday).unwrap(), 1);

    // Achievements count lifetime regardless of date.
    let achievement = cat.get("hundred_comments").unwrap();
    assert_eq!(get_progress(&counter, "alice", achievement, today).unwrap(), 1);
}

#[test]
fn test_claim_credits_ledger_once() {
    let (_tmp, store) = setup();
    let counter = SqliteActivityCounter::new(&store);
    let cat = catalog();
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    record_activity(&store, "alice", ActivityKind::Comment, now).unwrap();

    let outcome = claim_reward(
        &store,
        &cat,
        &counter,
        &NullNotifySink,
        "alice",
        "daily_comment",
        now,
    )
    .unwrap();
    assert_eq!(outcome.credited, 10);
    assert_eq!(outcome.period_key, "2024-06-01");
    assert_eq!(outcome.balance.points, 10);

    let entries = list_entries(&store, "alice", 50, 0).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, EntryKind::TaskReward);
    assert_eq!(entries[0].amount, 10);

    // Second claim in the same period is rejected, with no second credit.
    let err = claim_reward(
        &store,
        &cat,
        &counter,
        &NullNotifySink,
        "alice",
        "daily_comment",
        now,
    )
    .unwrap_err();
    assert!(matches!(err, QuestlineError::AlreadyClaimed { .. }));
    assert_eq!(list_entries(&store, "alice", 50, 0).unwrap().len(), 1);
    assert_eq!(get_balance(&store, "alice").unwrap().points, 10);
}

#[test]
fn test_daily_claim_resets_next_day_but_achievement_never() {
    let (_tmp, store) = setup();
    let counter = SqliteActivityCounter::new(&store);
    let cat = catalog();
    let day1 = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let day2 = Utc.with_ymd_and_hms(2024, 6, 2, 12, 0, 0).unwrap();

    record_activity(&store, "alice", ActivityKind::Comment, day1).unwrap();
    record_activity(&store, "alice", ActivityKind::CharacterCreation, day1).unwrap();

    claim_reward(&store, &cat, &counter, &NullNotifySink, "alice", "daily_comment", day1).unwrap();
    claim_reward(&store, &cat, &counter, &NullNotifySink, "alice", "first_character", day1)
        .unwrap();

    // Day 2: fresh period key makes the daily claimable again.
    record_activity(&store, "alice", ActivityKind::Comment, day2).unwrap();
    let outcome =
        claim_reward(&store, &cat, &counter, &NullNotifySink, "alice", "daily_comment", day2)
            .unwrap();
    assert_eq!(outcome.period_key, "2024-06-02");

    // The achievement stays claimed forever.
    let err =
        claim_reward(&store, &cat, &counter, &NullNotifySink, "alice", "first_character", day2)
            .unwrap_err();
    assert!(matches!(err, QuestlineError::AlreadyClaimed { .. }));

    let claims = list_claims(&store, "alice").unwrap();
    assert_eq!(claims.len(), 3);
}

#[test]
fn test_weekly_period_key_spans_the_week() {
    let (_tmp, store) = setup();
    let counter = SqliteActivityCounter::new(&store);
    let cat = catalog();
    // Monday and Friday of the same ISO week.
    let monday = Utc.with_ymd_and_hms(2024, 6, 3, 8, 0, 0).unwrap();
    let friday = Utc.with_ymd_and_hms(2024, 6, 7, 20, 0, 0).unwrap();

    record_activity(&store, "alice", ActivityKind::ResourceUpload, monday).unwrap();
    let outcome =
        claim_reward(&store, &cat, &counter, &NullNotifySink, "alice", "weekly_upload", monday)
            .unwrap();
    assert_eq!(outcome.period_key, "2024-W23");

    let err =
        claim_reward(&store, &cat, &counter, &NullNotifySink, "alice", "weekly_upload", friday)
            .unwrap_err();
    assert!(matches!(err, QuestlineError::AlreadyClaimed { .. }));
}

#[test]
fn test_failed_credit_rolls_back_claim_record() {
    let (_tmp, store) = setup();
    let counter = SqliteActivityCounter::new(&store);
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    record_activity(&store, "alice", ActivityKind::Comment, now).unwrap();

    // A zero reward makes the ledger credit fail after the claim record
    // insert; the whole claim must roll back as one unit.
    let broken = TaskCatalog::new(vec![TaskDef {
        task_key: "daily_comment".into(),
        category: TaskCategory::Daily,
        activity: ActivityKind::Comment,
        threshold: 1,
        reward: 0,
        title: "broken".into(),
    }])
    .unwrap();

    let err = claim_reward(
        &store,
        &broken,
        &counter,
        &NullNotifySink,
        "alice",
        "daily_comment",
        now,
    )
    .unwrap_err();
    assert!(matches!(err, QuestlineError::InvalidAmount(0)));

    // No claim marked, no credit applied.
    assert!(list_claims(&store, "alice").unwrap().is_empty());
    assert_eq!(get_balance(&store, "alice").unwrap().points, 0);

    // With a sane catalog the same period is still claimable.
    let outcome = claim_reward(
        &store,
        &catalog(),
        &counter,
        &NullNotifySink,
        "alice",
        "daily_comment",
        now,
    )
    .unwrap();
    assert_eq!(outcome.credited, 10);
}

#[test]
fn test_concurrent_claims_yield_one_credit() {
    let (_tmp, store) = setup();
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    record_activity(&store, "alice", ActivityKind::Comment, now).unwrap();

    let store = Arc::new(store);
    let mut handles = Vec::new();
    for _ in 0..2 {
        let store = Arc::clone(&store);
        handles.push(std::thread::spawn(move || {
            let counter = SqliteActivityCounter::new(&store);
            claim_reward(
                &store,
                &TaskCatalog::new(default_tasks()).unwrap(),
                &counter,
                &NullNotifySink,
                "alice",
                "daily_comment",
                now,
            )
        }));
    }

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let already = results
        .iter()
        .filter(|r| matches!(r, Err(QuestlineError::AlreadyClaimed { .. })))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(already, 1);

    // Exactly one ledger entry was appended.
    assert_eq!(list_entries(&store, "alice", 50, 0).unwrap().len(), 1);
    assert_eq!(get_balance(&store, "alice").unwrap().points, 10);
}
