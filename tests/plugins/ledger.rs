use questline::core::error::QuestlineError;
use questline::core::store::Store;
use questline::plugins::ledger::{
    EntryKind, credit, debit, get_balance, initialize_ledger_db, list_entries,
};
use tempfile::tempdir;

fn setup() -> (tempfile::TempDir, Store) {
    let tmp = tempdir().unwrap();
    let store = Store::at(tmp.path());
    initialize_ledger_db(&store.root).unwrap();
    (tmp, store)
}

#[test]
fn test_ledger_lifecycle() {
    let (_tmp, store) = setup();

    // Fresh user resolves to a zero balance.
    let balance = get_balance(&store, "alice").unwrap();
    assert_eq!(balance.points, 0);
    assert_eq!(balance.total_earned, 0);
    assert_eq!(balance.total_spent, 0);

    let (balance, entry) = credit(&store, "alice", 100, EntryKind::Promotion, "welcome").unwrap();
    assert_eq!(balance.points, 100);
    assert_eq!(balance.total_earned, 100);
    assert_eq!(entry.amount, 100);
    assert_eq!(entry.kind, EntryKind::Promotion);

    let (balance, entry) = debit(&store, "alice", 40, EntryKind::Purchase, "sticker").unwrap();
    assert_eq!(balance.points, 60);
    assert_eq!(balance.total_earned, 100);
    assert_eq!(balance.total_spent, 40);
    assert_eq!(entry.amount, -40);

    // Balance invariant after every committed mutation.
    assert_eq!(balance.points, balance.total_earned - balance.total_spent);

    // History is newest first, one entry per mutation.
    let entries = list_entries(&store, "alice", 50, 0).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].amount, -40);
    assert_eq!(entries[1].amount, 100);
}

#[test]
fn test_credit_rejects_non_positive_amounts() {
    let (_tmp, store) = setup();

    for amount in [0, -5] {
        let err = credit(&store, "alice", amount, EntryKind::AdminAdjust, "").unwrap_err();
        assert!(matches!(err, QuestlineError::InvalidAmount(_)), "{err}");
    }
    assert!(list_entries(&store, "alice", 50, 0).unwrap().is_empty());
}

#[test]
fn test_debit_rejects_non_positive_amounts() {
    let (_tmp, store) = setup();

    let err = debit(&store, "alice", 0, EntryKind::Purchase, "").unwrap_err();
    assert!(matches!(err, QuestlineError::InvalidAmount(0)));
}

#[test]
fn test_debit_guard_leaves_state_untouched() {
    let (_tmp, store) = setup();
    credit(&store, "alice", 30, EntryKind::AdminAdjust, "seed").unwrap();

    let err = debit(&store, "alice", 50, EntryKind::Purchase, "too much").unwrap_err();
    match err {
        QuestlineError::InsufficientBalance { have, need } => {
            assert_eq!(have, 30);
            assert_eq!(need, 50);
        }
        other => panic!("unexpected error: {other}"),
    }

    // Neither the balance nor the ledger moved (no partial log entry).
    let balance = get_balance(&store, "alice").unwrap();
    assert_eq!(balance.points, 30);
    assert_eq!(balance.total_spent, 0);
    let entries = list_entries(&store, "alice", 50, 0).unwrap();
    assert_eq!(entries.len(), 1);
}

#[test]
fn test_users_are_isolated() {
    let (_tmp, store) = setup();
    credit(&store, "alice", 100, EntryKind::AdminAdjust, "").unwrap();
    credit(&store, "bob", 7, EntryKind::AdminAdjust, "").unwrap();

    assert_eq!(get_balance(&store, "alice").unwrap().points, 100);
    assert_eq!(get_balance(&store, "bob").unwrap().points, 7);
    assert_eq!(list_entries(&store, "bob", 50, 0).unwrap().len(), 1);
}

#[test]
fn test_history_pagination() {
    let (_tmp, store) = setup();
    for i in 1..=5 {
        credit(&store, "alice", i * 10, EntryKind::AdminAdjust, "").unwrap();
    }

    let page = list_entries(&store, "alice", 2, 0).unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].amount, 50);
    assert_eq!(page[1].amount, 40);

    let page = list_entries(&store, "alice", 2, 4).unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].amount, 10);
}

#[test]
fn test_concurrent_credits_serialize() {
    let (_tmp, store) = setup();
    let mut handles = Vec::new();
    for _ in 0..4 {
        let store = store.clone();
        handles.push(std::thread::spawn(move || {
            credit(&store, "alice", 10, EntryKind::AdminAdjust, "race").unwrap();
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let balance = get_balance(&store, "alice").unwrap();
    assert_eq!(balance.points, 40);
    assert_eq!(balance.points, balance.total_earned - balance.total_spent);
    assert_eq!(list_entries(&store, "alice", 50, 0).unwrap().len(), 4);
}
