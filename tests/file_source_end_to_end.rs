// tests/file_source_end_to_end.rs

use std::fs;
use std::path::Path;

use serde_json::{Value, json};
use tempfile::TempDir;

use fetchdag::config::load_and_validate;
use fetchdag::dag::{Resolved, Scheduler};
use fetchdag::errors::FetchdagError;
use fetchdag::source::file::{JoinPlan, SOURCE_TAG_FIELD};
use fetchdag::source::{FileSource, MemoizedSource, Provider};
use fetchdag::types::JoinKind;
use fetchdag::{apply_overrides, build_providers};
use fetchdag_test_utils::builders::{options, records};
use fetchdag_test_utils::init_tracing;

fn write_json(dir: &Path, name: &str, value: Value) {
    fs::write(dir.join(name), serde_json::to_string_pretty(&value).unwrap()).unwrap();
}

fn workspace(config: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_json(
        dir.path(),
        "users.json",
        json!([
            { "id": 1, "name": "ada" },
            { "id": 2, "name": "brian" },
        ]),
    );
    write_json(
        dir.path(),
        "orders.json",
        json!([
            { "order": "o-1", "user_id": 2 },
            { "order": "o-2", "user_id": 3 },
        ]),
    );
    fs::write(dir.path().join("Fetchdag.toml"), config).unwrap();
    dir
}

const JOINED: &str = r#"
declarations = ["orders(users)", "users"]

[source.users]
path = "users.json"
fields = ["id", "name"]

[source.orders]
path = "orders.json"
tag = true
join = { kind = "left", left_key = "user_id", right_key = "id" }
"#;

#[tokio::test]
async fn config_driven_run_joins_and_tags() {
    init_tracing();

    let dir = workspace(JOINED);
    let cfg = load_and_validate(dir.path().join("Fetchdag.toml")).unwrap();
    let scheduler = Scheduler::from_declarations(&cfg.declarations).unwrap();
    assert_eq!(scheduler.order(), ["users", "orders"]);

    let providers = build_providers(&cfg, scheduler.graph(), dir.path()).unwrap();
    let resolved = scheduler
        .run(&cfg.options, &providers, cfg.consolidate)
        .await
        .unwrap();

    assert_eq!(
        resolved,
        Resolved::Consolidated(records(json!([
            { "order": "o-1", "user_id": 2, "id": 2, "name": "brian", "_source": "orders" },
            { "order": "o-2", "user_id": 3, "_source": "orders" },
        ])))
    );
}

#[tokio::test]
async fn unconsolidated_run_returns_every_source() {
    let dir = workspace(JOINED);
    let cfg = load_and_validate(dir.path().join("Fetchdag.toml")).unwrap();
    let scheduler = Scheduler::from_declarations(&cfg.declarations).unwrap();
    let providers = build_providers(&cfg, scheduler.graph(), dir.path()).unwrap();

    let all = scheduler
        .run(&cfg.options, &providers, false)
        .await
        .unwrap()
        .into_all();

    assert_eq!(all.len(), 2);
    assert_eq!(all[0].len(), 2);
    assert!(all[0].iter().all(|r| !r.contains_key(SOURCE_TAG_FIELD)));
    assert!(all[1].iter().all(|r| r[SOURCE_TAG_FIELD] == json!("orders")));
}

#[tokio::test]
async fn contract_violation_fails_the_run() {
    let dir = workspace(
        r#"
declarations = ["users"]

[source.users]
path = "users.json"
fields = ["id", "email"]
"#,
    );
    let cfg = load_and_validate(dir.path().join("Fetchdag.toml")).unwrap();
    let scheduler = Scheduler::from_declarations(&cfg.declarations).unwrap();
    let providers = build_providers(&cfg, scheduler.graph(), dir.path()).unwrap();

    let err = scheduler
        .run(&cfg.options, &providers, true)
        .await
        .unwrap_err();

    match err {
        FetchdagError::Fetch(inner) => {
            let message = inner.to_string();
            assert!(message.contains("users"));
            assert!(message.contains("email"));
        }
        other => panic!("expected a fetch failure, got {other:?}"),
    }
}

#[tokio::test]
async fn declared_source_without_section_is_a_missing_provider() {
    let dir = workspace(
        r#"
declarations = ["users", "orders(users)"]

[source.users]
path = "users.json"
"#,
    );
    let cfg = load_and_validate(dir.path().join("Fetchdag.toml")).unwrap();
    let scheduler = Scheduler::from_declarations(&cfg.declarations).unwrap();
    let providers = build_providers(&cfg, scheduler.graph(), dir.path()).unwrap();

    let err = scheduler
        .run(&cfg.options, &providers, true)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchdagError::MissingProvider(ref name) if name == "orders"));
}

#[tokio::test]
async fn missing_file_is_reported_and_not_cached() {
    let dir = tempfile::tempdir().unwrap();
    let source = MemoizedSource::new("users", FileSource::new("users", dir.path().join("users.json")), 4);
    let opts = options(json!({ "source": "users" }));

    let err = source.fetch(opts.clone(), vec![]).await.unwrap_err();
    assert!(err.to_string().contains("users.json"));
    assert_eq!(source.cached_len(), 0);

    write_json(dir.path(), "users.json", json!([{ "id": 1 }]));
    let records = source.fetch(opts, vec![]).await.unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn builder_configured_source_tags_checks_and_joins() {
    let dir = workspace(JOINED);
    let users = records(json!([{ "id": 3, "name": "cleo" }]));

    let orders = FileSource::new("orders", dir.path().join("orders.json"))
        .with_fields(vec!["order".to_string(), "user_id".to_string()])
        .with_tag(true)
        .with_join(JoinPlan {
            kind: JoinKind::Inner,
            prerequisite: 1,
            left_key: "user_id".to_string(),
            right_key: "id".to_string(),
        });
    let source = MemoizedSource::new("orders", orders, 4);

    let joined = source
        .fetch(options(json!({})), vec![Vec::new(), users])
        .await
        .unwrap();
    assert_eq!(
        joined,
        records(json!([
            { "order": "o-2", "user_id": 3, "id": 3, "name": "cleo", "_source": "orders" },
        ]))
    );

    // A missing prerequisite slot is a fetch failure, not a panic.
    let err = source.fetch(options(json!({})), vec![]).await.unwrap_err();
    assert!(err.to_string().contains("prerequisite #1"));

    let strict = FileSource::new("orders", dir.path().join("orders.json"))
        .with_fields(vec!["total".to_string()]);
    let err = MemoizedSource::new("orders", strict, 0)
        .fetch(options(json!({})), vec![])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("total"));
}

#[tokio::test]
async fn single_object_and_null_files_are_accepted() {
    let dir = tempfile::tempdir().unwrap();
    write_json(dir.path(), "one.json", json!({ "id": 1 }));
    write_json(dir.path(), "none.json", Value::Null);
    write_json(dir.path(), "bad.json", json!([1, 2]));

    let one = FileSource::new("one", dir.path().join("one.json"));
    let none = FileSource::new("none", dir.path().join("none.json"));
    let bad = FileSource::new("bad", dir.path().join("bad.json"));

    let opts = options(json!({}));
    let fetch = |adapter: FileSource| {
        let opts = opts.clone();
        async move { MemoizedSource::new("x", adapter, 0).fetch(opts, vec![]).await }
    };

    assert_eq!(fetch(one).await.unwrap(), records(json!([{ "id": 1 }])));
    assert!(fetch(none).await.unwrap().is_empty());
    let err = fetch(bad).await.unwrap_err();
    assert!(err.to_string().contains("JSON object"));
}

#[test]
fn overrides_parse_json_and_fall_back_to_strings() {
    let base = options(json!({ "region": "eu", "limit": 10 }));
    let set = vec![
        "limit=25".to_string(),
        "region=us".to_string(),
        "flags=[1, 2]".to_string(),
        "quoted=\"7\"".to_string(),
        "expr=a=b".to_string(),
    ];

    let opts = apply_overrides(base, &set).unwrap();
    assert_eq!(
        Value::Object(opts),
        json!({
            "region": "us",
            "limit": 25,
            "flags": [1, 2],
            "quoted": "7",
            "expr": "a=b",
        })
    );
}

#[test]
fn overrides_require_key_and_equals_sign() {
    assert!(apply_overrides(options(json!({})), &["limit".to_string()]).is_err());
    assert!(apply_overrides(options(json!({})), &["=5".to_string()]).is_err());
}
