// tests/scheduler.rs

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use fetchdag::dag::{ProviderMap, Resolved, Scheduler, resolve};
use fetchdag::errors::FetchdagError;
use fetchdag::source::{MemoizedSource, Provider};
use fetchdag::types::Records;
use fetchdag_test_utils::builders::{options, records};
use fetchdag_test_utils::fake_source::{EventLog, FakeSource, RecordingProvider};
use fetchdag_test_utils::{init_tracing, with_timeout};

fn rows(source: &str) -> Records {
    records(json!([{ "from": source }]))
}

fn provider_map(providers: &[(&str, &RecordingProvider)]) -> ProviderMap {
    providers
        .iter()
        .map(|(name, provider)| {
            let provider: Arc<dyn Provider> = Arc::new((*provider).clone());
            (name.to_string(), provider)
        })
        .collect()
}

struct Diamond {
    log: EventLog,
    a: RecordingProvider,
    b: RecordingProvider,
    c: RecordingProvider,
    d: RecordingProvider,
}

impl Diamond {
    fn new() -> Self {
        let log = EventLog::new();
        let slow = Duration::from_millis(40);
        Self {
            a: RecordingProvider::new("a", rows("a"), log.clone())
                .with_delay(Duration::from_millis(10)),
            b: RecordingProvider::new("b", rows("b"), log.clone()).with_delay(slow),
            c: RecordingProvider::new("c", rows("c"), log.clone()).with_delay(slow),
            d: RecordingProvider::new("d", rows("d"), log.clone()),
            log,
        }
    }

    fn providers(&self) -> ProviderMap {
        provider_map(&[("a", &self.a), ("b", &self.b), ("c", &self.c), ("d", &self.d)])
    }
}

const DIAMOND: [&str; 4] = ["a", "b(a)", "c(a)", "d(b, c)"];

#[tokio::test]
async fn independent_sources_run_concurrently_after_their_prerequisites() {
    init_tracing();

    let diamond = Diamond::new();
    let result = with_timeout(resolve(
        &options(json!({})),
        &diamond.providers(),
        &DIAMOND,
        true,
    ))
    .await
    .unwrap();

    assert_eq!(result, Resolved::Consolidated(rows("d")));

    let log = &diamond.log;
    assert!(log.position("start:b") > log.position("end:a"));
    assert!(log.position("start:c") > log.position("end:a"));
    // b and c overlap.
    assert!(log.position("start:b") < log.position("end:c"));
    assert!(log.position("start:c") < log.position("end:b"));
    assert!(log.position("start:d") > log.position("end:b"));
    assert!(log.position("start:d") > log.position("end:c"));

    for provider in [&diamond.a, &diamond.b, &diamond.c, &diamond.d] {
        assert_eq!(provider.calls(), 1);
    }
}

#[tokio::test]
async fn unconsolidated_results_follow_topological_order() {
    let diamond = Diamond::new();
    let result = resolve(&options(json!({})), &diamond.providers(), &DIAMOND, false)
        .await
        .unwrap();

    assert_eq!(
        result,
        Resolved::All(vec![rows("a"), rows("b"), rows("c"), rows("d")])
    );
}

#[tokio::test]
async fn consolidation_takes_last_source_in_order_not_in_declaration() {
    let log = EventLog::new();
    let base = RecordingProvider::new("base", rows("base"), log.clone());
    let extra = RecordingProvider::new("extra", rows("extra"), log.clone());
    let providers = provider_map(&[("base", &base), ("extra", &extra)]);

    // `extra` is declared last but `base` depends on it.
    let result = resolve(&options(json!({})), &providers, &["base(extra)", "extra"], true)
        .await
        .unwrap();
    assert_eq!(result.into_last(), rows("base"));
}

#[tokio::test]
async fn consolidation_follows_declaration_order_among_ready_sources() {
    let log = EventLog::new();
    let a = RecordingProvider::new("a", rows("a"), log.clone());
    let b = RecordingProvider::new("b", rows("b"), log.clone());
    let x = RecordingProvider::new("x", rows("x"), log.clone());
    let providers = provider_map(&[("a", &a), ("b", &b), ("x", &x)]);

    let result = resolve(&options(json!({})), &providers, &["b(a)", "x", "a"], true)
        .await
        .unwrap();
    assert_eq!(result.into_last(), rows("b"));

    let all = resolve(&options(json!({})), &providers, &["b(a)", "x", "a"], false)
        .await
        .unwrap();
    assert_eq!(all, Resolved::All(vec![rows("x"), rows("a"), rows("b")]));
}

#[tokio::test]
async fn prior_results_arrive_in_declared_prerequisite_order() {
    let diamond = Diamond::new();
    let declarations = ["a", "b(a)", "c(a)", "d(c, b)"];

    resolve(&options(json!({})), &diamond.providers(), &declarations, true)
        .await
        .unwrap();

    assert_eq!(diamond.d.seen_prior(), vec![vec![rows("c"), rows("b")]]);
    assert_eq!(diamond.b.seen_prior(), vec![vec![rows("a")]]);
    assert_eq!(diamond.a.seen_prior(), vec![Vec::<Records>::new()]);
}

#[tokio::test]
async fn each_source_gets_a_private_copy_of_the_options() {
    let diamond = Diamond::new();
    let shared = options(json!({ "region": "eu", "limit": 10 }));

    resolve(&shared, &diamond.providers(), &DIAMOND, true)
        .await
        .unwrap();

    for (name, provider) in [
        ("a", &diamond.a),
        ("b", &diamond.b),
        ("c", &diamond.c),
        ("d", &diamond.d),
    ] {
        let seen = provider.seen_options();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["source"], json!(name));
        assert_eq!(seen[0]["region"], json!("eu"));
        assert!(!seen[0].contains_key("scribbled_by"));
    }

    assert_eq!(shared, options(json!({ "region": "eu", "limit": 10 })));
}

#[tokio::test]
async fn missing_provider_fails_before_any_fetch() {
    let log = EventLog::new();
    let a = RecordingProvider::new("a", rows("a"), log.clone());
    let providers = provider_map(&[("a", &a)]);

    let err = resolve(&options(json!({})), &providers, &["a", "b(a)"], true)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchdagError::MissingProvider(ref name) if name == "b"));
    assert_eq!(a.calls(), 0);
    assert!(log.events().is_empty());
}

#[tokio::test]
async fn undeclared_prerequisite_needs_a_provider_too() {
    let log = EventLog::new();
    let b = RecordingProvider::new("b", rows("b"), log.clone());
    let providers = provider_map(&[("b", &b)]);

    let err = resolve(&options(json!({})), &providers, &["b(ghost)"], true)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchdagError::MissingProvider(ref name) if name == "ghost"));
    assert_eq!(b.calls(), 0);
}

#[tokio::test]
async fn declaration_errors_fail_before_any_fetch() {
    let diamond = Diamond::new();
    let providers = diamond.providers();

    let cyclic = resolve(&options(json!({})), &providers, &["a(d)", "b(a)", "c(a)", "d(b, c)"], true)
        .await
        .unwrap_err();
    assert!(matches!(cyclic, FetchdagError::CircularDependency(_)));

    let malformed = resolve(&options(json!({})), &providers, &["a", "b(a"], true)
        .await
        .unwrap_err();
    assert!(matches!(malformed, FetchdagError::ParseError(ref s) if s == "b(a"));

    assert!(diamond.log.events().is_empty());
}

#[tokio::test]
async fn failure_reaches_dependents_but_not_unrelated_sources() {
    init_tracing();

    let log = EventLog::new();
    let a = RecordingProvider::new("a", rows("a"), log.clone()).failing();
    let b = RecordingProvider::new("b", rows("b"), log.clone());
    let c = RecordingProvider::new("c", rows("c"), log.clone())
        .with_delay(Duration::from_millis(30));
    let providers = provider_map(&[("a", &a), ("b", &b), ("c", &c)]);

    let err = resolve(&options(json!({})), &providers, &["a", "b(a)", "c"], true)
        .await
        .unwrap_err();

    match err {
        FetchdagError::Fetch(inner) => assert!(inner.to_string().contains("a exploded")),
        other => panic!("expected a fetch failure, got {other:?}"),
    }

    // The unrelated branch still runs to completion.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(log.contains("end:c"));
    assert_eq!(c.calls(), 1);
    assert_eq!(b.calls(), 0);
}

#[tokio::test]
async fn empty_declarations_resolve_to_nothing() {
    let providers = ProviderMap::new();
    let none: [&str; 0] = [];

    let consolidated = resolve(&options(json!({})), &providers, &none, true)
        .await
        .unwrap();
    assert_eq!(consolidated, Resolved::Consolidated(vec![]));

    let all = resolve(&options(json!({})), &providers, &none, false)
        .await
        .unwrap();
    assert_eq!(all, Resolved::All(vec![]));
}

#[tokio::test]
async fn scheduler_can_be_reused_and_memoized_sources_hit_their_cache() {
    let users = FakeSource::new("users", rows("users"));
    let orders = FakeSource::new("orders", rows("orders"));

    let mut providers = ProviderMap::new();
    providers.insert(
        "users".into(),
        Arc::new(MemoizedSource::new("users", users.clone(), 4)),
    );
    providers.insert(
        "orders".into(),
        Arc::new(MemoizedSource::new("orders", orders.clone(), 4)),
    );

    let scheduler = Scheduler::from_declarations(&["users", "orders(users)"]).unwrap();
    assert_eq!(scheduler.order(), ["users", "orders"]);

    let opts = options(json!({ "tenant": 7 }));
    let first = scheduler.run(&opts, &providers, true).await.unwrap();
    let second = scheduler.run(&opts, &providers, true).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(users.calls(), 1);
    assert_eq!(orders.calls(), 1);

    // A different option set is a different request.
    scheduler
        .run(&options(json!({ "tenant": 8 })), &providers, true)
        .await
        .unwrap();
    assert_eq!(users.calls(), 2);
}
