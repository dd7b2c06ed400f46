mod common;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::json;

use arena_ladder::api_client::{ApiClient, Fetched, RetryPolicy};
use arena_ladder::auth::fetch_access_token;
use arena_ladder::config::Credentials;
use arena_ladder::error::PipelineError;
use arena_ladder::worker_pool::run_pool;

use common::{FakeTransport, json_response, rate_limited, status};

const URL: &str = "https://kr.api.blizzard.com/profile/wow/character/azshara/thrall";

type Sleeps = Arc<Mutex<Vec<Duration>>>;

fn recording_client(transport: &FakeTransport) -> (ApiClient<'_>, Sleeps) {
    let sleeps: Sleeps = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&sleeps);
    let client = ApiClient::new(transport).with_sleeper(move |d| log.lock().unwrap().push(d));
    (client, sleeps)
}

fn credentials() -> Credentials {
    Credentials {
        client_id: "id".to_string(),
        client_secret: "secret".to_string(),
    }
}

#[test]
fn not_found_is_absent_without_retry() {
    let transport = FakeTransport::new().route(URL, vec![status(404)]);
    let (client, sleeps) = recording_client(&transport);
    assert!(client.get("tok", URL, "profile-classicann-kr").is_none());
    assert_eq!(transport.calls_to(URL), 1);
    assert!(sleeps.lock().unwrap().is_empty());
}

#[test]
fn lookup_keeps_not_found_apart_from_failure() {
    let gone = "https://kr.api.blizzard.com/data/wow/media/item/1";
    let broken = "https://kr.api.blizzard.com/data/wow/media/item/2";
    let transport = FakeTransport::new()
        .route(gone, vec![status(404)])
        .route(broken, vec![status(500)]);
    let (client, _) = recording_client(&transport);
    assert_eq!(client.lookup("tok", gone, "ns"), Fetched::Missing);
    assert_eq!(client.lookup("tok", broken, "ns"), Fetched::Failed);
}

#[test]
fn rate_limit_waits_retry_after_then_succeeds() {
    let transport = FakeTransport::new().route(
        URL,
        vec![rate_limited(Some("2")), json_response(json!({"name": "Thrall"}))],
    );
    let (client, sleeps) = recording_client(&transport);
    let value = client
        .get("tok", URL, "profile-classicann-kr")
        .expect("second attempt should succeed");
    assert_eq!(value["name"], "Thrall");
    assert_eq!(transport.calls_to(URL), 2);
    assert_eq!(*sleeps.lock().unwrap(), vec![Duration::from_secs(2)]);
}

#[test]
fn rate_limit_pause_is_real_by_default() {
    let transport = FakeTransport::new().route(
        URL,
        vec![rate_limited(Some("2")), json_response(json!({"ok": true}))],
    );
    let client = ApiClient::new(&transport);
    let started = Instant::now();
    assert!(client.get("tok", URL, "ns").is_some());
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert_eq!(transport.calls_to(URL), 2);
}

#[test]
fn rate_limit_defaults_to_five_seconds() {
    let transport = FakeTransport::new().route(
        URL,
        vec![rate_limited(None), json_response(json!({}))],
    );
    let (client, sleeps) = recording_client(&transport);
    assert!(client.get("tok", URL, "ns").is_some());
    assert_eq!(*sleeps.lock().unwrap(), vec![Duration::from_secs(5)]);
}

#[test]
fn rate_limit_does_not_consume_retry_budget() {
    // Two server errors use up the whole budget; the 429s in between must not.
    let transport = FakeTransport::new().route(
        URL,
        vec![
            status(500),
            rate_limited(Some("1")),
            rate_limited(Some("1")),
            status(503),
            rate_limited(Some("1")),
            json_response(json!({"ok": true})),
        ],
    );
    let (client, _) = recording_client(&transport);
    assert!(client.get("tok", URL, "ns").is_some());
    assert_eq!(transport.calls_to(URL), 6);
}

#[test]
fn server_errors_back_off_exponentially_then_give_up() {
    let transport = FakeTransport::new().route(URL, vec![status(502)]);
    let (client, sleeps) = recording_client(&transport);
    assert!(client.get("tok", URL, "ns").is_none());
    assert_eq!(transport.calls_to(URL), 3);
    assert_eq!(
        *sleeps.lock().unwrap(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
}

#[test]
fn transport_errors_are_retried() {
    let transport = FakeTransport::new().route_script(
        URL,
        vec![None, Some(json_response(json!({"level": 70})))],
    );
    let (client, sleeps) = recording_client(&transport);
    let value = client.get("tok", URL, "ns").expect("retry should recover");
    assert_eq!(value["level"], 70);
    assert_eq!(sleeps.lock().unwrap().len(), 1);
}

#[test]
fn endless_rate_limit_is_capped() {
    let transport = FakeTransport::new().route(URL, vec![rate_limited(Some("1"))]);
    let (client, _) = recording_client(&transport);
    let client = client.with_policy(RetryPolicy {
        max_rate_limit_waits: 3,
        ..RetryPolicy::default()
    });
    assert!(client.get("tok", URL, "ns").is_none());
    assert_eq!(transport.calls_to(URL), 4);
}

#[test]
fn oversized_float_retry_after_falls_back_to_default() {
    let transport = FakeTransport::new().route(
        URL,
        vec![rate_limited(Some("1e20")), json_response(json!({"ok": true}))],
    );
    let (client, sleeps) = recording_client(&transport);
    assert!(client.get("tok", URL, "ns").is_some());
    assert_eq!(*sleeps.lock().unwrap(), vec![Duration::from_secs(5)]);
}

#[test]
fn huge_retry_after_is_clamped() {
    let transport = FakeTransport::new().route(
        URL,
        vec![
            rate_limited(Some("18446744073709551615")),
            json_response(json!({"ok": true})),
        ],
    );
    let (client, sleeps) = recording_client(&transport);
    assert!(client.get("tok", URL, "ns").is_some());
    assert_eq!(
        *sleeps.lock().unwrap(),
        vec![RetryPolicy::default().max_retry_after]
    );
}

#[test]
fn bad_retry_after_does_not_sink_the_batch() {
    let jaina = "https://kr.api.blizzard.com/profile/wow/character/azshara/jaina";
    let transport = FakeTransport::new()
        .route(
            URL,
            vec![rate_limited(Some("1e20")), json_response(json!({"name": "Thrall"}))],
        )
        .route(jaina, vec![json_response(json!({"name": "Jaina"}))]);
    let (client, _) = recording_client(&transport);

    let mut names = run_pool("batch", 2, vec![URL, jaina], 0, |url| {
        client
            .get("tok", url, "ns")
            .and_then(|v| v["name"].as_str().map(str::to_string))
    });
    names.sort();
    assert_eq!(
        names,
        vec![Some("Jaina".to_string()), Some("Thrall".to_string())]
    );
}

#[test]
fn token_exchange_returns_bearer() {
    let transport = FakeTransport::new().with_token("abc123");
    let token = fetch_access_token(&transport, "https://oauth.example/token", &credentials())
        .expect("token should be issued");
    assert_eq!(token, "abc123");
}

#[test]
fn token_exchange_failure_is_fatal() {
    let transport = FakeTransport::new().token_response(status(401));
    let err = fetch_access_token(&transport, "https://oauth.example/token", &credentials())
        .expect_err("401 must fail");
    assert!(matches!(err, PipelineError::TokenExchange(_)));

    let unreachable = FakeTransport::new();
    let err = fetch_access_token(&unreachable, "https://oauth.example/token", &credentials())
        .expect_err("network failure must fail");
    assert!(matches!(err, PipelineError::TokenExchange(_)));
}
