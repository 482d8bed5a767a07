//! Integration tests for the marketplace store.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use maxbazar_core::model::{
    InvoiceRecord, Item, ItemCounterRecord, ItemType, ItemWatchlistRecord, Ruian, Setting, User,
    UserReviewRecord, WatchTarget, WatchlistType,
};
use maxbazar_core::{
    marketplace_registry, CategoryTree, Dependent, Error, Fields, Filter, Id, Pagination,
    Predicate, StorageConfig, Store, Value,
};

struct TestContext {
    store: Store,
    _dir: tempfile::TempDir,
}

impl TestContext {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(
            StorageConfig::new(dir.path()),
            marketplace_registry().unwrap(),
        )
        .unwrap();

        Self { store, _dir: dir }
    }

    fn user(&self, first: &str, second: &str, email: &str) -> Id {
        self.store
            .repository::<User>()
            .unwrap()
            .create(&User::new(first, second, email))
            .unwrap()
    }

    fn category(&self, name: &str) -> Id {
        self.store
            .repository::<ItemType>()
            .unwrap()
            .create(&ItemType::new(name, format!("/{name}")))
            .unwrap()
    }

    fn item(&self, heading: &str, user: Id, category: Id) -> Id {
        self.store
            .repository::<Item>()
            .unwrap()
            .create(&Item::new(heading, user, category))
            .unwrap()
    }

    fn watchlist_type(&self, name: &str) -> Id {
        self.store
            .repository::<WatchlistType>()
            .unwrap()
            .create(&WatchlistType {
                name: name.into(),
                note: None,
            })
            .unwrap()
    }
}

fn at(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap()
}

#[test]
fn test_user_conflict_and_key_reuse_after_soft_delete() {
    let ctx = TestContext::new();
    let users = ctx.store.repository::<User>().unwrap();
    let alice = User::new("A", "B", "a@x.com");

    let first = users.create(&alice).unwrap();
    assert_eq!(first, Id(1));

    match users.create(&alice) {
        Err(Error::Conflict {
            group,
            conflicting_id,
            ..
        }) => {
            assert_eq!(group, "unique_user");
            assert_eq!(conflicting_id, Id(1));
        }
        other => panic!("Expected conflict, got {other:?}"),
    }

    users.soft_delete(first).unwrap();
    let second = users.create(&alice).unwrap();
    assert_eq!(second, Id(2));
}

#[test]
fn test_dangling_reference_on_create() {
    let ctx = TestContext::new();
    let category = ctx.category("cars");
    let item = Item::new("Octavia", Id(999), category);

    match ctx.store.repository::<Item>().unwrap().create(&item) {
        Err(Error::DanglingReference {
            field,
            referenced_entity,
            referenced_id,
            ..
        }) => {
            assert_eq!(field, "user_id");
            assert_eq!(referenced_entity, "User");
            assert_eq!(referenced_id, Id(999));
        }
        other => panic!("Expected dangling reference, got {other:?}"),
    }
}

#[test]
fn test_reference_to_soft_deleted_row_is_dangling() {
    let ctx = TestContext::new();
    let user = ctx.user("A", "B", "a@x.com");
    let category = ctx.category("cars");
    ctx.store.soft_delete("User", user).unwrap();

    let result = ctx
        .store
        .repository::<Item>()
        .unwrap()
        .create(&Item::new("Octavia", user, category));
    assert!(matches!(result, Err(Error::DanglingReference { .. })));
}

#[test]
fn test_create_then_get_returns_input() {
    let ctx = TestContext::new();
    let user_id = ctx.user("Jan", "Novák", "jan@example.cz");
    let category = ctx.category("bikes");

    let users = ctx.store.repository::<User>().unwrap();
    let mut user = User::new("Eva", "Malá", "eva@example.cz");
    user.phone = Some("+420 777 000 000".into());
    user.last_access_time = Some(at(1_704_067_200_123_456));
    let id = users.create(&user).unwrap();
    let stored = users.get(id).unwrap();
    assert_eq!(stored.data, user);
    assert_eq!(stored.created_at, stored.updated_at);

    let items = ctx.store.repository::<Item>().unwrap();
    let mut item = Item::new("Kolo", user_id, category);
    item.price = 4500.0;
    item.public = true;
    item.item_data = Some(json!({"frame": "L", "gears": 21}));
    item.date_time = Some(at(1_700_000_000_000_000));
    let id = items.create(&item).unwrap();
    assert_eq!(items.get(id).unwrap().data, item);

    let places = ctx.store.repository::<Ruian>().unwrap();
    let place = Ruian {
        postal_code: "60200".into(),
        location: "Brno".into(),
        longitude: Some(16.6068),
        latitude: Some(49.1951),
        note: None,
    };
    let id = places.create(&place).unwrap();
    assert_eq!(places.get(id).unwrap().data, place);
}

#[test]
fn test_defaults_are_applied() {
    let ctx = TestContext::new();
    let user = ctx.user("A", "B", "a@x.com");
    let category = ctx.category("cars");
    let item = ctx.item("Octavia", user, category);

    let counters = ctx.store.repository::<ItemCounterRecord>().unwrap();
    let before = Utc::now();
    let id = counters
        .create(&ItemCounterRecord {
            item_id: item,
            date_time: None,
            count: 0,
            note: None,
        })
        .unwrap();

    let stored = counters.get(id).unwrap();
    let date_time = stored.data.date_time.unwrap();
    assert!(date_time.timestamp() >= before.timestamp() - 1);

    let mut fields = Fields::new();
    fields.insert("name".into(), "maintenance".into());
    let id = ctx.store.create("Setting", fields).unwrap();
    let setting = ctx.store.get("Setting", id).unwrap();
    assert_eq!(setting.fields.get("enabled"), Some(&Value::Bool(true)));
}

#[test]
fn test_second_soft_delete_is_not_found() {
    let ctx = TestContext::new();
    let id = ctx.user("A", "B", "a@x.com");

    ctx.store.soft_delete("User", id).unwrap();
    assert!(matches!(
        ctx.store.get("User", id),
        Err(Error::NotFound { .. })
    ));
    assert!(ctx.store.get_with_deleted("User", id).unwrap().deleted_at.is_some());
    assert!(matches!(
        ctx.store.soft_delete("User", id),
        Err(Error::NotFound { .. })
    ));
    assert!(matches!(
        ctx.store.soft_delete("User", Id(77)),
        Err(Error::NotFound { .. })
    ));
}

#[test]
fn test_concurrent_creates_succeed_exactly_once() {
    let ctx = TestContext::new();
    let store = Arc::new(ctx.store);

    let results: Vec<Result<Id, Error>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    store.repository::<Setting>().unwrap().create(&Setting {
                        name: "feature.premium".into(),
                        value: Some("on".into()),
                        enabled: true,
                        note: None,
                    })
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(Error::Conflict { group, .. }) if group == "unique_settings"))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(conflicts, 7);
}

#[test]
fn test_item_type_roots_conflict_on_null_parent() {
    let ctx = TestContext::new();
    ctx.category("cars");

    let mut fields = Fields::new();
    fields.insert("name".into(), "cars".into());
    fields.insert("url".into(), "/cars".into());
    match ctx.store.create("ItemType", fields) {
        Err(Error::Conflict { group, .. }) => assert_eq!(group, "unique_item_type"),
        other => panic!("Expected conflict, got {other:?}"),
    }
}

#[test]
fn test_watchlist_target_variants() {
    let ctx = TestContext::new();
    let user = ctx.user("A", "B", "a@x.com");
    let category = ctx.category("cars");
    let first_item = ctx.item("Octavia", user, category);
    let second_item = ctx.item("Fabia", user, category);
    let favourites = ctx.watchlist_type("favourites");
    let watchlist = ctx.store.repository::<ItemWatchlistRecord>().unwrap();

    for target in [
        WatchTarget::Item(first_item),
        WatchTarget::Item(second_item),
        WatchTarget::Category(category),
        WatchTarget::Filter(json!({"price_max": 100000})),
    ] {
        watchlist
            .create(&ItemWatchlistRecord::new(user, favourites, target))
            .unwrap();
    }

    let duplicate = ItemWatchlistRecord::new(user, favourites, WatchTarget::Item(first_item));
    assert!(matches!(
        watchlist.create(&duplicate),
        Err(Error::Conflict { group, .. }) if group == "unique_user_item_watchlist_record"
    ));

    let mut ambiguous = ItemWatchlistRecord::new(user, favourites, WatchTarget::Category(category));
    ambiguous.item_id = Some(first_item);
    assert!(matches!(
        watchlist.create(&ambiguous),
        Err(Error::Validation { .. })
    ));

    let mut empty = ItemWatchlistRecord::new(user, favourites, WatchTarget::Item(first_item));
    empty.item_id = None;
    assert!(matches!(watchlist.create(&empty), Err(Error::Validation { .. })));

    let page = watchlist
        .list(&Filter::new().is_not_null("item_id"), Pagination::all())
        .unwrap();
    assert_eq!(page.total, 2);
    assert!(page
        .items
        .iter()
        .all(|s| matches!(s.data.target(), Some(WatchTarget::Item(_)))));
}

#[test]
fn test_invoice_needs_an_owner() {
    let ctx = TestContext::new();
    let invoices = ctx.store.repository::<InvoiceRecord>().unwrap();
    let mut invoice = InvoiceRecord {
        payer_email: Some("payer@example.cz".into()),
        payer_name: None,
        premium_count: 1,
        item_id: None,
        user_id: None,
        date_time: None,
        amount: 99.0,
        currency: Some("CZK".into()),
        invoice_data: None,
        note: None,
    };

    assert!(matches!(invoices.create(&invoice), Err(Error::Validation { .. })));

    invoice.user_id = Some(ctx.user("A", "B", "a@x.com"));
    assert!(invoices.create(&invoice).is_ok());
}

#[test]
fn test_validation_lists_every_violation() {
    let ctx = TestContext::new();
    let mut fields = Fields::new();
    fields.insert("first_name".into(), Value::Int(5));
    fields.insert("shoe_size".into(), Value::Int(44));

    match ctx.store.create("User", fields) {
        Err(Error::Validation { entity, violations }) => {
            assert_eq!(entity, "User");
            let names: BTreeSet<&str> = violations.iter().map(|v| v.field.as_str()).collect();
            assert_eq!(
                names,
                BTreeSet::from(["first_name", "second_name", "email", "shoe_size"])
            );
        }
        other => panic!("Expected validation error, got {other:?}"),
    }
}

#[test]
fn test_update_rechecks_constraints() {
    let ctx = TestContext::new();
    let alice = ctx.user("Alice", "A", "alice@x.com");
    let bob = ctx.user("Bob", "B", "bob@x.com");

    let mut patch = Fields::new();
    patch.insert("first_name".into(), "Alice".into());
    patch.insert("second_name".into(), "A".into());
    patch.insert("email".into(), "alice@x.com".into());
    assert!(matches!(
        ctx.store.update("User", bob, patch),
        Err(Error::Conflict { conflicting_id, .. }) if conflicting_id == alice
    ));

    let mut patch = Fields::new();
    patch.insert("email".into(), Value::Null);
    assert!(matches!(
        ctx.store.update("User", bob, patch),
        Err(Error::Validation { .. })
    ));

    let mut patch = Fields::new();
    patch.insert("created_at".into(), Value::Timestamp(0));
    assert!(matches!(
        ctx.store.update("User", bob, patch),
        Err(Error::Validation { .. })
    ));

    // The user's own key does not conflict with itself.
    let mut patch = Fields::new();
    patch.insert("phone".into(), "123".into());
    let row = ctx.store.update("User", alice, patch).unwrap();
    assert_eq!(row.fields.get("phone"), Some(&Value::String("123".into())));

    ctx.store.soft_delete("User", bob).unwrap();
    assert!(matches!(
        ctx.store.update("User", bob, Fields::new()),
        Err(Error::NotFound { .. })
    ));
}

#[test]
fn test_update_to_deleted_reference_is_dangling() {
    let ctx = TestContext::new();
    let reviewer = ctx.user("A", "B", "a@x.com");
    let reviewee = ctx.user("C", "D", "c@x.com");
    let gone = ctx.user("E", "F", "e@x.com");
    ctx.store.soft_delete("User", gone).unwrap();

    let reviews = ctx.store.repository::<UserReviewRecord>().unwrap();
    let id = reviews
        .create(&UserReviewRecord {
            heading: Some("Great seller".into()),
            text: None,
            user_in_id: reviewee,
            user_out_id: reviewer,
            date_time: None,
            rating: 5.0,
            note: None,
        })
        .unwrap();

    let mut patch = Fields::new();
    patch.insert("user_in_id".into(), Value::Id(gone));
    assert!(matches!(
        reviews.patch(id, patch),
        Err(Error::DanglingReference { field, .. }) if field == "user_in_id"
    ));
}

#[test]
fn test_dependents_follow_live_rows() {
    let ctx = TestContext::new();
    let user = ctx.user("A", "B", "a@x.com");
    let category = ctx.category("cars");
    let first = ctx.item("Octavia", user, category);
    let second = ctx.item("Fabia", user, category);

    let dependents = ctx.store.dependents("User", user).unwrap();
    assert_eq!(
        dependents,
        vec![
            Dependent {
                entity: "Item".into(),
                field: "user_id".into(),
                id: first,
            },
            Dependent {
                entity: "Item".into(),
                field: "user_id".into(),
                id: second,
            },
        ]
    );

    ctx.store.soft_delete("Item", first).unwrap();
    let remaining: Vec<Id> = ctx
        .store
        .dependents("User", user)
        .unwrap()
        .into_iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(remaining, vec![second]);

    // No cascade: the user stays and the item keeps pointing at it.
    ctx.store.soft_delete("User", user).unwrap();
    assert!(ctx.store.get("Item", second).is_ok());
}

#[test]
fn test_list_with_predicates() {
    let ctx = TestContext::new();
    let user = ctx.user("A", "B", "a@x.com");
    let category = ctx.category("cars");
    let items = ctx.store.repository::<Item>().unwrap();

    for (heading, price) in [("a", 100.0), ("b", 250.0), ("c", 900.0), ("d", 40.0)] {
        let mut item = Item::new(heading, user, category);
        item.price = price;
        items.create(&item).unwrap();
    }

    let filter = Filter::new()
        .and(Predicate::Ge("price".into(), Value::Float(100.0)))
        .and(Predicate::Lt("price".into(), Value::Int(900)));
    let page = items.list(&filter, Pagination::all()).unwrap();
    let headings: Vec<&str> = page.items.iter().map(|s| s.data.heading.as_str()).collect();
    assert_eq!(headings, vec!["a", "b"]);

    let page = items.list(&Filter::new(), Pagination::new(1, 3)).unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(page.items[0].data.heading, "d");
}

#[test]
fn test_attach_both_ways_is_a_cycle() {
    let ctx = TestContext::new();
    let tree = CategoryTree::new(&ctx.store).unwrap();
    let a = tree.insert(&ItemType::new("a", "/a")).unwrap();
    let b = tree.insert(&ItemType::new("b", "/b")).unwrap();

    tree.attach(a, Some(b)).unwrap();
    match tree.attach(b, Some(a)) {
        Err(Error::Cycle { child, parent, .. }) => {
            assert_eq!(child, b);
            assert_eq!(parent, a);
        }
        other => panic!("Expected cycle, got {other:?}"),
    }

    let mut patch = Fields::new();
    patch.insert("parent_item_type_id".into(), Value::Id(a));
    assert!(matches!(
        ctx.store.update("ItemType", b, patch),
        Err(Error::Cycle { .. })
    ));
}

#[test]
fn test_store_reopens_with_data() {
    let dir = tempfile::tempdir().unwrap();
    let id = {
        let store = Store::open(
            StorageConfig::new(dir.path()),
            marketplace_registry().unwrap(),
        )
        .unwrap();
        let id = store
            .repository::<User>()
            .unwrap()
            .create(&User::new("A", "B", "a@x.com"))
            .unwrap();
        store.flush().unwrap();
        id
    };

    let store = Store::open(
        StorageConfig::new(dir.path()),
        marketplace_registry().unwrap(),
    )
    .unwrap();
    assert_eq!(store.schema_version(), 1);
    assert_eq!(
        store.get("User", id).unwrap().fields.get("email"),
        Some(&Value::String("a@x.com".into()))
    );
    assert!(matches!(
        store.repository::<User>().unwrap().create(&User::new("A", "B", "a@x.com")),
        Err(Error::Conflict { .. })
    ));
}

fn record(pairs: &[(&str, Value)]) -> Fields {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

#[test]
fn test_every_unique_group_rejects_a_second_create() {
    let ctx = TestContext::new();
    let jan = ctx.user("Jan", "Novák", "jan@example.cz");
    let eva = ctx.user("Eva", "Malá", "eva@example.cz");
    let bikes = ctx.category("bikes");
    let kolo = ctx.item("Kolo", jan, bikes);
    let favourites = ctx.watchlist_type("favourites");
    let noon = Value::Timestamp(1_704_110_400_000_000);

    let cases: Vec<(&str, Fields, &str)> = vec![
        (
            "User",
            record(&[
                ("first_name", "Petr".into()),
                ("second_name", "Král".into()),
                ("email", "petr@example.cz".into()),
            ]),
            "unique_user",
        ),
        (
            "ItemType",
            record(&[("name", "boats".into()), ("url", "/boats".into())]),
            "unique_item_type",
        ),
        (
            "Item",
            record(&[
                ("heading", "Helma".into()),
                ("user_id", jan.into()),
                ("item_type_id", bikes.into()),
            ]),
            "unique_item",
        ),
        (
            "UserReviewRecord",
            record(&[
                ("user_in_id", jan.into()),
                ("user_out_id", eva.into()),
                ("date_time", noon.clone()),
                ("rating", Value::Float(4.5)),
            ]),
            "unique_user_review_record",
        ),
        (
            "UserMessageRecord",
            record(&[
                ("user_in_id", jan.into()),
                ("user_out_id", eva.into()),
                ("item_id", kolo.into()),
                ("date_time", noon.clone()),
                ("message", "Is it still available?".into()),
            ]),
            "unique_user_message_record",
        ),
        (
            "ItemImageRecord",
            record(&[("item_id", kolo.into()), ("url", "/img/kolo.jpg".into())]),
            "unique_item_image_record",
        ),
        (
            "ItemAlarmRecord",
            record(&[
                ("user_id", eva.into()),
                ("item_type_id", bikes.into()),
                ("start_date_time", noon.clone()),
                ("end_date_time", Value::Timestamp(1_706_788_800_000_000)),
            ]),
            "unique_user_alarm_record",
        ),
        (
            "UserFilterRecord",
            record(&[("name", "cheap bikes".into()), ("user_id", eva.into())]),
            "unique_user_filter_record",
        ),
        (
            "ItemCounterRecord",
            record(&[("item_id", kolo.into())]),
            "unique_item_counter_record",
        ),
        (
            "Ruian",
            record(&[("postal_code", "60200".into()), ("location", "Brno".into())]),
            "unique_ruian",
        ),
        (
            "WatchlistType",
            record(&[("name", "alerts".into())]),
            "unique_watchlist_type",
        ),
        (
            "ItemWatchlistRecord",
            record(&[
                ("user_id", eva.into()),
                ("watchlist_type_id", favourites.into()),
                ("item_id", kolo.into()),
            ]),
            "unique_user_item_watchlist_record",
        ),
        (
            "ItemWatchlistRecord",
            record(&[
                ("user_id", eva.into()),
                ("watchlist_type_id", favourites.into()),
                ("item_type_id", bikes.into()),
            ]),
            "unique_user_data_watchlist_record",
        ),
        (
            "ItemWatchlistRecord",
            record(&[
                ("user_id", eva.into()),
                ("watchlist_type_id", favourites.into()),
                ("data", Value::Json(json!({"price_max": 5000}))),
            ]),
            "unique_user_filter_watchlist_record",
        ),
        (
            "MaxbazarVisitRecords",
            record(&[("date_time", "2024-01-01".into())]),
            "unique_maxbazar_visit_records",
        ),
        (
            "Setting",
            record(&[("name", "motd".into())]),
            "unique_settings",
        ),
        (
            "RoadmapRecords",
            record(&[("heading", "Dark mode".into())]),
            "unique_roadmap_records",
        ),
    ];

    for (entity, fields, expected_group) in cases {
        let first = ctx.store.create(entity, fields.clone()).unwrap();
        match ctx.store.create(entity, fields) {
            Err(Error::Conflict {
                group,
                conflicting_id,
                ..
            }) => {
                assert_eq!(group, expected_group, "{entity}");
                assert_eq!(conflicting_id, first, "{entity}");
            }
            other => panic!("Expected {expected_group} conflict on {entity}, got {other:?}"),
        }
    }

    let same_url = record(&[("name", "ships".into()), ("url", "/boats".into())]);
    assert!(matches!(
        ctx.store.create("ItemType", same_url),
        Err(Error::Conflict { group, .. }) if group == "unique_item_type_url"
    ));
}

#[test]
fn test_review_pair_is_unique_per_date_time() {
    let ctx = TestContext::new();
    let jan = ctx.user("Jan", "Novák", "jan@example.cz");
    let eva = ctx.user("Eva", "Malá", "eva@example.cz");
    let reviews = ctx.store.repository::<UserReviewRecord>().unwrap();

    let mut review = UserReviewRecord {
        heading: None,
        text: Some("Smooth handover".into()),
        user_in_id: eva,
        user_out_id: jan,
        date_time: Some(at(1_704_110_400_000_000)),
        rating: 5.0,
        note: None,
    };
    reviews.create(&review).unwrap();

    assert!(matches!(
        reviews.create(&review),
        Err(Error::Conflict { group, .. }) if group == "unique_user_review_record"
    ));

    review.date_time = Some(at(1_704_196_800_000_000));
    reviews.create(&review).unwrap();
    assert_eq!(reviews.list(&Filter::new(), Pagination::all()).unwrap().total, 2);
}

#[test]
fn test_sub_microsecond_timestamp_is_a_validation_error() {
    let ctx = TestContext::new();
    let user = ctx.user("A", "B", "a@x.com");
    let category = ctx.category("cars");
    let items = ctx.store.repository::<Item>().unwrap();

    let mut item = Item::new("Octavia", user, category);
    item.delete_after = DateTime::from_timestamp(1_700_000_000, 123_456_789);
    match items.create(&item) {
        Err(Error::Validation { violations, .. }) => {
            assert!(violations.iter().any(|v| v.field == "delete_after"));
        }
        other => panic!("Expected validation error, got {other:?}"),
    }

    item.delete_after = DateTime::from_timestamp(1_700_000_000, 123_456_000);
    let id = items.create(&item).unwrap();
    assert_eq!(items.get(id).unwrap().data.delete_after, item.delete_after);
}

#[test]
fn test_category_caches_follow_plain_store_writes() {
    let ctx = TestContext::new();
    let tree = CategoryTree::new(&ctx.store).unwrap();
    let types = ctx.store.repository::<ItemType>().unwrap();
    let leaves = |id: Id| types.get(id).unwrap().data.final_item_type_ids;

    let root = tree.insert(&ItemType::new("root", "/root")).unwrap();
    let mut child = ItemType::new("a", "/a");
    child.parent_item_type_id = Some(root);
    let a = tree.insert(&child).unwrap();
    child = ItemType::new("b", "/b");
    child.parent_item_type_id = Some(root);
    let b = tree.insert(&child).unwrap();

    types.soft_delete(a).unwrap();
    assert_eq!(leaves(root), Some(json!([b.get()])));

    let other = ctx.category("other");
    let mut patch = Fields::new();
    patch.insert("parent_item_type_id".into(), Value::Id(root));
    let moved = ctx.store.update("ItemType", other, patch).unwrap();
    assert_eq!(moved.fields.get("category_depth"), Some(&Value::Int(1)));
    assert_eq!(leaves(root), Some(json!([b.get(), other.get()])));

    let mut patch = Fields::new();
    patch.insert("enabled".into(), Value::Bool(false));
    ctx.store.update("ItemType", b, patch).unwrap();
    assert_eq!(leaves(root), Some(json!([other.get()])));
    assert_eq!(
        tree.resolve_descendant_leaves(root).unwrap(),
        BTreeSet::from([other])
    );
    assert_eq!(tree.refresh().unwrap(), 0);
}
