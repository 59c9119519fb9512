#![allow(clippy::unwrap_used)]

use super::*;
use chrono::NaiveDate;
use rust_decimal_macros::dec;

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

fn add_user(store: &SqliteStore, name: &str) -> User {
    store
        .insert_user(NewUser::new(name.into(), dec!(500)))
        .unwrap()
}

fn add_category(store: &SqliteStore, user: &User, title: &str) -> Category {
    store
        .insert_category(NewCategory::new(user.id, title.into(), dec!(200)))
        .unwrap()
}

fn add_charge(store: &SqliteStore, user: &User, category: &Category, amount: Decimal) -> Charge {
    let charge = Charge::new(user.id, category.id, "test".into(), amount, day());
    store.insert_charge(&charge).unwrap();
    charge
}

fn schema_version(store: &SqliteStore) -> i32 {
    store.with_conn(|conn| {
        conn.query_row("SELECT version FROM schema_version", [], |row| row.get(0))
            .unwrap()
    })
}

// ── Schema ────────────────────────────────────────────────────

#[test]
fn test_fresh_database_at_current_version() {
    let store = SqliteStore::open_in_memory().unwrap();
    assert_eq!(schema_version(&store), schema::CURRENT_VERSION);
}

#[test]
fn test_reopen_does_not_remigrate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("budget.db");
    let user_id = {
        let store = SqliteStore::open(&path).unwrap();
        add_user(&store, "Pat").id
    };
    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(schema_version(&store), schema::CURRENT_VERSION);
    let users = store.list_users().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].id, user_id);
}

#[test]
fn test_unversioned_database_is_stamped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("old.db");
    let user = NewUser::new("Pat".into(), dec!(500)).into_user();
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(schema::SCHEMA).unwrap();
        conn.execute(
            "INSERT INTO users (id, credential_id, name, total_allotment)
             VALUES (?1, ?2, ?3, '500')",
            params![user.id, user.credential_id, user.name],
        )
        .unwrap();
    }

    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(schema_version(&store), schema::CURRENT_VERSION);
    assert_eq!(store.list_users().unwrap(), vec![user]);
}

// ── Records ───────────────────────────────────────────────────

#[test]
fn test_user_roundtrip() {
    let store = SqliteStore::open_in_memory().unwrap();
    let user = add_user(&store, "Pat");
    assert_eq!(user.total_amount, Decimal::ZERO);

    let found = store
        .with_transaction(None, |s| Ok(s.find_user(user.id)?))
        .unwrap();
    assert_eq!(found, Some(user));
}

#[test]
fn test_find_unknown_user_is_none() {
    let store = SqliteStore::open_in_memory().unwrap();
    let found = store
        .with_transaction(None, |s| Ok(s.find_user(UserId::new())?))
        .unwrap();
    assert!(found.is_none());
}

#[test]
fn test_users_sorted_by_name() {
    let store = SqliteStore::open_in_memory().unwrap();
    add_user(&store, "Zed");
    add_user(&store, "Ana");
    add_user(&store, "Max");
    let names: Vec<String> = store
        .list_users()
        .unwrap()
        .into_iter()
        .map(|u| u.name)
        .collect();
    assert_eq!(names, vec!["Ana", "Max", "Zed"]);
}

#[test]
fn test_categories_and_charges_keep_insertion_order() {
    let store = SqliteStore::open_in_memory().unwrap();
    let user = add_user(&store, "Pat");
    let gas = add_category(&store, &user, "Gas");
    let food = add_category(&store, &user, "Food");
    let c1 = add_charge(&store, &user, &food, dec!(10));
    let c2 = add_charge(&store, &user, &gas, dec!(20));

    let (cats, charges) = store
        .with_transaction(None, |s| Ok((s.list_categories(user.id)?, s.list_charges(user.id)?)))
        .unwrap();
    let titles: Vec<&str> = cats.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Gas", "Food"]);
    let ids: Vec<ChargeId> = charges.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![c1.id, c2.id]);
    assert_eq!(charges[0].date, day());
}

#[test]
fn test_update_charge_scoped_to_owner() {
    let store = SqliteStore::open_in_memory().unwrap();
    let pat = add_user(&store, "Pat");
    let sam = add_user(&store, "Sam");
    let food = add_category(&store, &pat, "Food");
    let charge = add_charge(&store, &pat, &food, dec!(12.50));

    let update = ChargeUpdate {
        category_id: food.id,
        description: "lunch".into(),
        amount: dec!(13.75),
        date: day(),
    };
    assert!(!store.update_charge(sam.id, charge.id, &update).unwrap());
    assert!(store.update_charge(pat.id, charge.id, &update).unwrap());

    let charges = store
        .with_transaction(None, |s| Ok(s.list_charges(pat.id)?))
        .unwrap();
    assert_eq!(charges[0].amount, dec!(13.75));
    assert_eq!(charges[0].description, "lunch");
}

#[test]
fn test_delete_charge() {
    let store = SqliteStore::open_in_memory().unwrap();
    let user = add_user(&store, "Pat");
    let food = add_category(&store, &user, "Food");
    let charge = add_charge(&store, &user, &food, dec!(5));

    assert!(store.delete_charge(user.id, charge.id).unwrap());
    assert!(!store.delete_charge(user.id, charge.id).unwrap());
}

#[test]
fn test_delete_category_removes_its_charges() {
    let store = SqliteStore::open_in_memory().unwrap();
    let user = add_user(&store, "Pat");
    let food = add_category(&store, &user, "Food");
    let gas = add_category(&store, &user, "Gas");
    add_charge(&store, &user, &food, dec!(5));
    let kept = add_charge(&store, &user, &gas, dec!(7));

    assert!(store.delete_category(user.id, food.id).unwrap());
    let (cats, charges) = store
        .with_transaction(None, |s| Ok((s.list_categories(user.id)?, s.list_charges(user.id)?)))
        .unwrap();
    assert_eq!(cats.len(), 1);
    assert_eq!(cats[0].id, gas.id);
    assert_eq!(charges.len(), 1);
    assert_eq!(charges[0].id, kept.id);
}

#[test]
fn test_delete_category_of_other_user_is_noop() {
    let store = SqliteStore::open_in_memory().unwrap();
    let pat = add_user(&store, "Pat");
    let sam = add_user(&store, "Sam");
    let food = add_category(&store, &pat, "Food");
    add_charge(&store, &pat, &food, dec!(5));

    assert!(!store.delete_category(sam.id, food.id).unwrap());
    let charges = store
        .with_transaction(None, |s| Ok(s.list_charges(pat.id)?))
        .unwrap();
    assert_eq!(charges.len(), 1);
}

#[test]
fn test_corrupt_decimal_reported() {
    let store = SqliteStore::open_in_memory().unwrap();
    let user = add_user(&store, "Pat");
    let food = add_category(&store, &user, "Food");
    store.with_conn(|conn| {
        conn.execute(
            "UPDATE categories SET amount = 'twelve' WHERE id = ?1",
            params![food.id],
        )
        .unwrap();
    });

    let err = store
        .with_transaction(None, |s| Ok(s.list_categories(user.id)?))
        .unwrap_err();
    assert!(matches!(err, SummaryError::Store(StoreError::Corrupt(_))));
}

// ── Aggregation ───────────────────────────────────────────────

#[test]
fn test_charge_sums_grouped_by_category() {
    let store = SqliteStore::open_in_memory().unwrap();
    let user = add_user(&store, "Pat");
    let food = add_category(&store, &user, "Food");
    let gas = add_category(&store, &user, "Gas");
    add_charge(&store, &user, &food, dec!(25));
    add_charge(&store, &user, &food, dec!(25));

    let totals = store
        .with_transaction(None, |s| Ok(s.sum_charges_by_category(user.id)?))
        .unwrap();
    assert_eq!(totals.len(), 1);
    assert_eq!(totals.get(&food.id), Some(dec!(50)));
    assert!(!totals.contains(&gas.id));
}

#[test]
fn test_charge_sums_are_exact() {
    let store = SqliteStore::open_in_memory().unwrap();
    let user = add_user(&store, "Pat");
    let food = add_category(&store, &user, "Food");
    for _ in 0..10 {
        add_charge(&store, &user, &food, dec!(0.1));
    }
    add_charge(&store, &user, &food, dec!(19.99));

    let totals = store
        .with_transaction(None, |s| Ok(s.sum_charges_by_category(user.id)?))
        .unwrap();
    assert_eq!(totals.get(&food.id), Some(dec!(20.99)));
}

#[test]
fn test_charge_sums_ignore_other_users() {
    let store = SqliteStore::open_in_memory().unwrap();
    let pat = add_user(&store, "Pat");
    let sam = add_user(&store, "Sam");
    let pat_food = add_category(&store, &pat, "Food");
    let sam_food = add_category(&store, &sam, "Food");
    add_charge(&store, &pat, &pat_food, dec!(3));
    add_charge(&store, &sam, &sam_food, dec!(100));

    let totals = store
        .with_transaction(None, |s| Ok(s.sum_charges_by_category(pat.id)?))
        .unwrap();
    assert_eq!(totals.len(), 1);
    assert_eq!(totals.get(&pat_food.id), Some(dec!(3)));
}

#[test]
fn test_category_sum_zero_without_categories() {
    let store = SqliteStore::open_in_memory().unwrap();
    let user = add_user(&store, "Pat");
    let total = store
        .with_transaction(None, |s| Ok(s.sum_category_amounts(user.id)?))
        .unwrap();
    assert_eq!(total, Decimal::ZERO);
}

#[test]
fn test_decimal_sum_skips_nulls() {
    let store = SqliteStore::open_in_memory().unwrap();
    let total: Option<String> = store.with_conn(|conn| {
        conn.query_row(
            "SELECT decimal_sum(x) FROM (SELECT '1.25' AS x UNION ALL SELECT NULL UNION ALL SELECT 2)",
            [],
            |row| row.get(0),
        )
        .unwrap()
    });
    assert_eq!(total.as_deref(), Some("3.25"));
}

// ── Reconcile writes ──────────────────────────────────────────

#[test]
fn test_apply_amounts_only_touches_owned_categories() {
    let store = SqliteStore::open_in_memory().unwrap();
    let pat = add_user(&store, "Pat");
    let sam = add_user(&store, "Sam");
    let pat_food = add_category(&store, &pat, "Food");
    let sam_food = add_category(&store, &sam, "Food");

    let updates = [
        AmountUpdate {
            category_id: pat_food.id,
            amount: dec!(42),
        },
        AmountUpdate {
            category_id: sam_food.id,
            amount: dec!(99),
        },
    ];
    let matched = store
        .with_transaction(None, |s| Ok(s.apply_category_amounts(pat.id, &updates)?))
        .unwrap();
    assert_eq!(matched, 1);

    let sam_cats = store
        .with_transaction(None, |s| Ok(s.list_categories(sam.id)?))
        .unwrap();
    assert_eq!(sam_cats[0].amount, Decimal::ZERO);
}

#[test]
fn test_set_user_total() {
    let store = SqliteStore::open_in_memory().unwrap();
    let user = add_user(&store, "Pat");
    let updated = store
        .with_transaction(None, |s| Ok(s.set_user_total(user.id, dec!(61.37))?))
        .unwrap();
    assert!(updated);
    let missing = store
        .with_transaction(None, |s| Ok(s.set_user_total(UserId::new(), dec!(1))?))
        .unwrap();
    assert!(!missing);

    let found = store
        .with_transaction(None, |s| Ok(s.find_user(user.id)?))
        .unwrap()
        .unwrap();
    assert_eq!(found.total_amount, dec!(61.37));
}

// ── Transactions ──────────────────────────────────────────────

#[test]
fn test_error_rolls_back_every_write() {
    let store = SqliteStore::open_in_memory().unwrap();
    let user = add_user(&store, "Pat");
    let food = add_category(&store, &user, "Food");

    let result: Result<(), SummaryError> = store.with_transaction(None, |s| {
        s.apply_category_amounts(
            user.id,
            &[AmountUpdate {
                category_id: food.id,
                amount: dec!(80),
            }],
        )?;
        s.set_user_total(user.id, dec!(80))?;
        Err(SummaryError::NotFound("forced".into()))
    });
    assert!(result.is_err());

    let (found, cats) = store
        .with_transaction(None, |s| Ok((s.find_user(user.id)?, s.list_categories(user.id)?)))
        .unwrap();
    assert_eq!(found.unwrap().total_amount, Decimal::ZERO);
    assert_eq!(cats[0].amount, Decimal::ZERO);
}

#[test]
fn test_ok_commits() {
    let store = SqliteStore::open_in_memory().unwrap();
    let user = add_user(&store, "Pat");
    store
        .with_transaction(None, |s| Ok(s.set_user_total(user.id, dec!(5))?))
        .unwrap();
    let found = store
        .with_transaction(None, |s| Ok(s.find_user(user.id)?))
        .unwrap()
        .unwrap();
    assert_eq!(found.total_amount, dec!(5));
}

#[test]
fn test_store_is_transactional() {
    let store = SqliteStore::open_in_memory().unwrap();
    assert_eq!(store.consistency(), Consistency::Transactional);
}
