#![allow(clippy::unwrap_used)]

use super::*;
use rust_decimal_macros::dec;
use std::sync::{Arc, Barrier};
use std::thread;

fn ledger() -> Ledger {
    Ledger::new(Database::open_in_memory().unwrap())
}

fn spent(ledger: &Ledger, id: i64) -> Decimal {
    ledger.category_summary(id).unwrap().spent
}

/// Every category's spending is within its limit.
fn assert_invariant(ledger: &Ledger) {
    for summary in ledger.list_category_summaries().unwrap().categories {
        assert!(
            summary.spent <= summary.limit(),
            "{} over budget: {} > {}",
            summary.category.name,
            summary.spent,
            summary.limit()
        );
    }
}

#[test]
fn test_ledger_is_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Ledger>();
}

// ── Categories ────────────────────────────────────────────────

#[test]
fn test_create_and_update_category() {
    let ledger = ledger();
    let cat = ledger.create_category(" Food ", dec!(300)).unwrap();
    assert_eq!(cat.name, "Food");

    let updated = ledger.update_category(cat.id, "Groceries", dec!(350)).unwrap();
    assert_eq!(updated.name, "Groceries");
    assert_eq!(updated.limit, dec!(350));
    assert_eq!(ledger.get_category(cat.id).unwrap(), updated);
}

#[test]
fn test_duplicate_category_name_rejected() {
    let ledger = ledger();
    ledger.create_category("Food", dec!(100)).unwrap();
    let err = ledger.create_category("Food", dec!(50)).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::BusinessRule(_) | LedgerError::Conflict(_)
    ));
    assert_eq!(ledger.list_categories().unwrap().len(), 1);
}

#[test]
fn test_rename_rules() {
    let ledger = ledger();
    let food = ledger.create_category("Food", dec!(100)).unwrap();
    let rent = ledger.create_category("Rent", dec!(900)).unwrap();

    assert!(ledger.update_category(rent.id, "Food", dec!(900)).is_err());
    assert_eq!(ledger.get_category(rent.id).unwrap().name, "Rent");
    assert!(ledger.update_category(food.id, "Food", dec!(120)).is_ok());
}

#[test]
fn test_limit_cannot_drop_below_spent() {
    let ledger = ledger();
    let cat = ledger.create_category("Food", dec!(100)).unwrap();
    ledger.create_transaction("Market", dec!(70), cat.id).unwrap();

    assert!(matches!(
        ledger.update_category(cat.id, "Food", dec!(69.99)),
        Err(LedgerError::BusinessRule(_))
    ));
    assert_eq!(ledger.get_category(cat.id).unwrap().limit, dec!(100));
    assert!(ledger.update_category(cat.id, "Food", dec!(70)).is_ok());
}

#[test]
fn test_validation_errors_write_nothing() {
    let ledger = ledger();
    assert!(matches!(
        ledger.create_category("", dec!(10)),
        Err(LedgerError::Validation(_))
    ));
    assert!(matches!(
        ledger.create_category("Food", dec!(0)),
        Err(LedgerError::Validation(_))
    ));
    assert!(ledger.list_categories().unwrap().is_empty());
}

// ── Boundary ──────────────────────────────────────────────────

#[test]
fn test_amount_equal_to_remaining_succeeds() {
    let ledger = ledger();
    let cat = ledger.create_category("Food", dec!(100)).unwrap();
    ledger.create_transaction("A", dec!(40), cat.id).unwrap();
    ledger.create_transaction("B", dec!(60), cat.id).unwrap();

    let summary = ledger.category_summary(cat.id).unwrap();
    assert_eq!(summary.remaining, Decimal::ZERO);
    assert_eq!(summary.percent_used, dec!(100));
}

#[test]
fn test_one_cent_over_remaining_fails() {
    let ledger = ledger();
    let cat = ledger.create_category("Food", dec!(100)).unwrap();
    ledger.create_transaction("A", dec!(40), cat.id).unwrap();

    let err = ledger.create_transaction("B", dec!(60.01), cat.id).unwrap_err();
    assert!(matches!(err, LedgerError::BusinessRule(_)));
    assert_eq!(spent(&ledger, cat.id), dec!(40));
    assert_eq!(ledger.list_transactions().unwrap().len(), 1);
}

// ── Self-exclusion ────────────────────────────────────────────

#[test]
fn test_update_transaction_self_exclusion() {
    let ledger = ledger();
    let cat = ledger.create_category("Food", dec!(100)).unwrap();
    let txn = ledger.create_transaction("A", dec!(40), cat.id).unwrap();

    let updated = ledger
        .update_transaction(txn.id, "A", dec!(90), cat.id)
        .unwrap();
    assert_eq!(updated.amount, dec!(90));
    assert_eq!(spent(&ledger, cat.id), dec!(90));

    let err = ledger
        .update_transaction(txn.id, "A", dec!(101), cat.id)
        .unwrap_err();
    assert!(matches!(err, LedgerError::BusinessRule(_)));
    assert_eq!(ledger.get_transaction(txn.id).unwrap().amount, dec!(90));
}

// ── Cross-category move ───────────────────────────────────────

#[test]
fn test_move_between_categories() {
    let ledger = ledger();
    let a = ledger.create_category("A", dec!(50)).unwrap();
    let b = ledger.create_category("B", dec!(50)).unwrap();
    let moving = ledger.create_transaction("Moving", dec!(30), a.id).unwrap();
    ledger.create_transaction("Staying", dec!(20), a.id).unwrap();
    assert_eq!(spent(&ledger, a.id), dec!(50));

    let moved = ledger
        .update_transaction(moving.id, "Moving", dec!(30), b.id)
        .unwrap();
    assert_eq!(moved.category_id, b.id);
    assert_eq!(spent(&ledger, a.id), dec!(20));
    assert_eq!(spent(&ledger, b.id), dec!(30));
    assert_invariant(&ledger);
}

#[test]
fn test_move_that_does_not_fit_changes_nothing() {
    let ledger = ledger();
    let a = ledger.create_category("A", dec!(100)).unwrap();
    let b = ledger.create_category("B", dec!(50)).unwrap();
    let big = ledger.create_transaction("Big", dec!(60), a.id).unwrap();

    let err = ledger
        .update_transaction(big.id, "Big", dec!(60), b.id)
        .unwrap_err();
    assert!(matches!(err, LedgerError::BusinessRule(_)));
    assert_eq!(spent(&ledger, a.id), dec!(60));
    assert_eq!(spent(&ledger, b.id), Decimal::ZERO);
    assert_eq!(ledger.get_transaction(big.id).unwrap(), big);
}

#[test]
fn test_move_to_missing_category() {
    let ledger = ledger();
    let a = ledger.create_category("A", dec!(100)).unwrap();
    let txn = ledger.create_transaction("T", dec!(10), a.id).unwrap();
    assert!(matches!(
        ledger.update_transaction(txn.id, "T", dec!(10), 12345),
        Err(LedgerError::NotFound { id: 12345, .. })
    ));
}

// ── Cascade delete ────────────────────────────────────────────

#[test]
fn test_delete_category_cascades() {
    let ledger = ledger();
    let cat = ledger.create_category("Food", dec!(100)).unwrap();
    let ids: Vec<i64> = (1..=4)
        .map(|i| {
            ledger
                .create_transaction(&format!("Meal {i}"), dec!(5), cat.id)
                .unwrap()
                .id
        })
        .collect();

    let notice = ledger.delete_category(cat.id).unwrap();
    assert_eq!(notice.transactions_removed, 4);
    assert_eq!(notice.category_name, "Food");
    for id in ids {
        assert!(matches!(
            ledger.get_transaction(id),
            Err(LedgerError::NotFound { .. })
        ));
    }
    assert!(matches!(
        ledger.category_summary(cat.id),
        Err(LedgerError::NotFound { .. })
    ));
}

#[test]
fn test_block_policy_keeps_everything() {
    let ledger = ledger().with_delete_policy(DeletePolicy::Block);
    let cat = ledger.create_category("Food", dec!(100)).unwrap();
    let txn = ledger.create_transaction("Meal", dec!(5), cat.id).unwrap();

    assert!(matches!(
        ledger.delete_category(cat.id),
        Err(LedgerError::BusinessRule(_))
    ));
    assert_eq!(ledger.get_transaction(txn.id).unwrap(), txn);

    ledger.delete_transaction(txn.id).unwrap();
    let notice = ledger.delete_category(cat.id).unwrap();
    assert!(!notice.cascaded());
}

#[test]
fn test_delete_missing_entities() {
    let ledger = ledger();
    assert!(matches!(
        ledger.delete_category(8),
        Err(LedgerError::NotFound { id: 8, .. })
    ));
    assert!(matches!(
        ledger.delete_transaction(9),
        Err(LedgerError::NotFound { id: 9, .. })
    ));
}

#[test]
fn test_delete_transaction_frees_budget() {
    let ledger = ledger();
    let cat = ledger.create_category("Food", dec!(50)).unwrap();
    let txn = ledger.create_transaction("A", dec!(50), cat.id).unwrap();
    assert!(ledger.create_transaction("B", dec!(1), cat.id).is_err());

    ledger.delete_transaction(txn.id).unwrap();
    assert!(ledger.create_transaction("B", dec!(1), cat.id).is_ok());
}

// ── Zero limit ────────────────────────────────────────────────

#[test]
fn test_zero_limit_category() {
    let db = Database::open_in_memory().unwrap();
    let legacy = db.insert_category("Legacy", Decimal::ZERO).unwrap();
    let ledger = Ledger::new(db);

    let summary = ledger.category_summary(legacy.id).unwrap();
    assert_eq!(summary.percent_used, Decimal::ZERO);
    assert_eq!(summary.remaining, Decimal::ZERO);
    assert!(matches!(
        ledger.create_transaction("Anything", dec!(0.01), legacy.id),
        Err(LedgerError::BusinessRule(_))
    ));
}

// ── Summaries and reads ───────────────────────────────────────

#[test]
fn test_list_category_summaries() {
    let ledger = ledger();
    let food = ledger.create_category("Food", dec!(200)).unwrap();
    let rent = ledger.create_category("Rent", dec!(1000)).unwrap();
    ledger.create_transaction("Market", dec!(50), food.id).unwrap();
    ledger.create_transaction("March", dec!(1000), rent.id).unwrap();

    let overview = ledger.list_category_summaries().unwrap();
    let names: Vec<&str> = overview
        .categories
        .iter()
        .map(|s| s.category.name.as_str())
        .collect();
    assert_eq!(names, vec!["Food", "Rent"]);
    assert_eq!(overview.categories[0].percent_used, dec!(25));
    assert_eq!(overview.totals.limit, dec!(1200));
    assert_eq!(overview.totals.spent, dec!(1050));
    assert_eq!(overview.totals.remaining, dec!(150));
}

#[test]
fn test_summaries_at_the_money_cap() {
    let ledger = ledger();
    let cap = Decimal::from(budget::MAX_MONEY);
    assert!(matches!(
        ledger.create_category("A", Decimal::MAX),
        Err(LedgerError::Validation(_))
    ));
    let a = ledger.create_category("A", cap).unwrap();
    ledger.create_category("B", cap).unwrap();
    ledger.create_transaction("All in", cap, a.id).unwrap();

    let overview = ledger.list_category_summaries().unwrap();
    assert_eq!(overview.totals.limit, cap * dec!(2));
    assert_eq!(overview.totals.spent, cap);
    assert_eq!(overview.categories[0].remaining, Decimal::ZERO);
}

#[test]
fn test_transactions_for_category() {
    let ledger = ledger();
    let food = ledger.create_category("Food", dec!(200)).unwrap();
    ledger.create_transaction("Market", dec!(50), food.id).unwrap();
    assert_eq!(ledger.transactions_for_category(food.id).unwrap().len(), 1);
    assert!(matches!(
        ledger.transactions_for_category(food.id + 1),
        Err(LedgerError::NotFound { .. })
    ));
    assert_eq!(ledger.transaction_details().unwrap()[0].category_name, "Food");
}

#[test]
fn test_invariant_over_mixed_sequence() {
    let ledger = ledger();
    let a = ledger.create_category("A", dec!(100)).unwrap();
    let b = ledger.create_category("B", dec!(80)).unwrap();

    let t1 = ledger.create_transaction("t1", dec!(60), a.id).unwrap();
    let t2 = ledger.create_transaction("t2", dec!(30), b.id).unwrap();
    assert_invariant(&ledger);

    let _ = ledger.create_transaction("too much", dec!(41), a.id);
    let _ = ledger.update_transaction(t1.id, "t1", dec!(51), b.id);
    assert_invariant(&ledger);

    ledger.update_transaction(t1.id, "t1", dec!(50), b.id).unwrap();
    let _ = ledger.update_transaction(t2.id, "t2", dec!(31), b.id);
    let _ = ledger.update_category(b.id, "B", dec!(79.99));
    assert_invariant(&ledger);

    ledger.create_transaction("t3", dec!(100), a.id).unwrap();
    assert_eq!(spent(&ledger, a.id), dec!(100));
    assert_eq!(spent(&ledger, b.id), dec!(80));
    assert_invariant(&ledger);
}

// ── Concurrency ───────────────────────────────────────────────

#[test]
fn test_concurrent_creates_cannot_both_fit() {
    for _ in 0..20 {
        let ledger = Arc::new(ledger());
        let cat = ledger.create_category("Food", dec!(100)).unwrap();
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    ledger.create_transaction(&format!("t{i}"), dec!(60), cat.id)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let committed = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(committed, 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(LedgerError::BusinessRule(_)))));
        assert_eq!(spent(&ledger, cat.id), dec!(60));
    }
}

#[test]
fn test_many_writers_fill_budget_exactly() {
    let ledger = Arc::new(ledger());
    let cat = ledger.create_category("Food", dec!(50)).unwrap();
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..20)
                    .filter(|j| {
                        ledger
                            .create_transaction(&format!("w{i}-{j}"), dec!(1), cat.id)
                            .is_ok()
                    })
                    .count()
            })
        })
        .collect();

    let committed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(committed, 50);
    assert_eq!(spent(&ledger, cat.id), dec!(50));
}

#[test]
fn test_opposite_moves_do_not_deadlock() {
    let ledger = Arc::new(ledger());
    let a = ledger.create_category("A", dec!(1000)).unwrap();
    let b = ledger.create_category("B", dec!(1000)).unwrap();
    let ta = ledger.create_transaction("ta", dec!(10), a.id).unwrap();
    let tb = ledger.create_transaction("tb", dec!(10), b.id).unwrap();
    let barrier = Arc::new(Barrier::new(2));

    let spawn_mover = |txn_id: i64, first: i64, second: i64| {
        let ledger = Arc::clone(&ledger);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for round in 0..100 {
                let target = if round % 2 == 0 { second } else { first };
                ledger
                    .update_transaction(txn_id, "mover", dec!(10), target)
                    .unwrap();
            }
        })
    };

    let h1 = spawn_mover(ta.id, a.id, b.id);
    let h2 = spawn_mover(tb.id, b.id, a.id);
    h1.join().unwrap();
    h2.join().unwrap();

    assert_eq!(spent(&ledger, a.id), dec!(10));
    assert_eq!(spent(&ledger, b.id), dec!(10));
}

#[test]
fn test_concurrent_duplicate_names() {
    let ledger = Arc::new(ledger());
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                ledger.create_category("Food", dec!(10))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().filter(|r| r.is_err()).all(|r| matches!(
        r,
        Err(LedgerError::BusinessRule(_) | LedgerError::Conflict(_))
    )));
    assert_eq!(ledger.list_categories().unwrap().len(), 1);
}

// ── Stale reads and lock table ────────────────────────────────

#[test]
fn test_stale_read_of_moved_transaction_conflicts() {
    let ledger = ledger();
    let a = ledger.create_category("A", dec!(100)).unwrap();
    let b = ledger.create_category("B", dec!(100)).unwrap();
    let stale = ledger.create_transaction("Lunch", dec!(10), a.id).unwrap();
    ledger
        .update_transaction(stale.id, "Lunch", dec!(10), b.id)
        .unwrap();

    assert!(matches!(
        ensure_unmoved(&ledger.db, &stale),
        Err(LedgerError::Conflict(_))
    ));
    let current = ledger.get_transaction(stale.id).unwrap();
    assert!(ensure_unmoved(&ledger.db, &current).is_ok());
}

#[test]
fn test_move_racing_delete_and_update() {
    for _ in 0..20 {
        let ledger = Arc::new(ledger());
        let a = ledger.create_category("A", dec!(100)).unwrap();
        let b = ledger.create_category("B", dec!(100)).unwrap();
        let id = ledger.create_transaction("Lunch", dec!(60), a.id).unwrap().id;
        let barrier = Arc::new(Barrier::new(3));

        let mover = {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                ledger
                    .update_transaction(id, "Lunch", dec!(60), b.id)
                    .map(|_| ())
            })
        };
        let editor = {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                ledger
                    .update_transaction(id, "Dinner", dec!(90), a.id)
                    .map(|_| ())
            })
        };
        let deleter = {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                ledger.delete_transaction(id)
            })
        };

        for handle in [mover, editor, deleter] {
            let result = handle.join().unwrap();
            assert!(
                matches!(
                    result,
                    Ok(()) | Err(LedgerError::Conflict(_)) | Err(LedgerError::NotFound { .. })
                ),
                "unexpected outcome: {result:?}"
            );
        }
        assert_invariant(&ledger);
        assert!(ledger.list_transactions().unwrap().len() <= 1);
    }
}

#[test]
fn test_missing_ids_leave_no_lock_entries() {
    let ledger = ledger();
    for id in 1000..1500 {
        assert!(ledger.category_summary(id).is_err());
        assert!(ledger.create_transaction("x", dec!(1), id).is_err());
    }
    assert_eq!(ledger.locks.len(), 0);

    let food = ledger.create_category("Food", dec!(10)).unwrap();
    ledger.create_transaction("Lunch", dec!(5), food.id).unwrap();
    ledger.delete_category(food.id).unwrap();
    assert_eq!(ledger.locks.len(), 0);
}
