//! End-to-end tests for `POST /isgood`
//!
//! Each test spawns the daemon binary and talks to it over HTTP.


use integration_harness::{TestConfig, spawn_daemon, wait_for_port};
use std::time::Duration;

const VALID_BATCH: &str = r#"[{"checkType":"DEVICE","activityType":"SIGNUP","checkSessionKey":"s","activityData":[{"kvpKey":"ip.address","kvpValue":"true","kvpType":"general.bool"}]}]"#;

async fn post(client: &reqwest::Client, config: &TestConfig, body: &'static str) -> (u16, String) {
    let resp = client
        .post(config.url("/isgood"))
        .body(body)
        .send()
        .await
        .expect("request failed");
    let status = resp.status().as_u16();
    (status, resp.text().await.unwrap_or_default())
}

/// Test: accept and reject verdicts from a live daemon
#[tokio::test]
#[ignore] // Run with: cargo test -p actcheck-tests -- --ignored
async fn test_daemon_verdicts() {
    let config = TestConfig::default();

    let _daemon = spawn_daemon(&config).expect("Failed to spawn daemon");
    assert!(
        wait_for_port(config.daemon_bind, Duration::from_secs(60)).await,
        "Daemon did not start in time"
    );

    let client = reqwest::Client::new();

    let (status, body) = post(&client, &config, VALID_BATCH).await;
    assert_eq!(status, 200);
    assert_eq!(body, r#"{"puppy":true}"#);

    let (status, body) = post(&client, &config, "").await;
    assert_eq!(status, 500);
    assert_eq!(body, r#"{"code":0,"message":"request body is empty"}"#);

    let (status, _) = post(
        &client,
        &config,
        r#"[{"checkType":"DEVICE1","activityType":"SIGNUP","checkSessionKey":"s","activityData":[]}]"#,
    )
    .await;
    assert_eq!(status, 500);

    let (status, body) = post(
        &client,
        &config,
        r#"[{"checkType":"DEVICE","activityType":"SIGNUP","checkSessionKey":"s","activityData":[{"kvpKey":"n","kvpValue":"food","kvpType":"general.integer"}]}]"#,
    )
    .await;
    assert_eq!(status, 500);
    assert_eq!(
        body,
        r#"{"code":0,"message":"activityData value does not match its type"}"#
    );
}

/// Test: concurrent batches do not see each other's failures
#[tokio::test]
#[ignore]
async fn test_concurrent_requests_are_isolated() {
    let config = TestConfig {
        daemon_bind: "127.0.0.1:38889".parse().unwrap(),
        ..TestConfig::default()
    };

    let _daemon = spawn_daemon(&config).expect("Failed to spawn daemon");
    assert!(wait_for_port(config.daemon_bind, Duration::from_secs(60)).await);

    let client = reqwest::Client::new();
    let bad = r#"[{"checkType":"DEVICE","activityType":"SIGNUP1","checkSessionKey":"s","activityData":[]}]"#;

    let mut tasks = Vec::new();
    for i in 0..32 {
        let client = client.clone();
        let url = config.url("/isgood");
        let body = if i % 2 == 0 { VALID_BATCH } else { bad };
        tasks.push(tokio::spawn(async move {
            let resp = client.post(url).body(body).send().await?;
            anyhow::Ok((i, resp.status().as_u16()))
        }));
    }

    for task in tasks {
        let (i, status) = task.await.unwrap().unwrap();
        let expected = if i % 2 == 0 { 200 } else { 500 };
        assert_eq!(status, expected, "request {}", i);
    }
}

/// Test: routing outside /isgood
#[tokio::test]
#[ignore]
async fn test_unknown_routes() {
    let config = TestConfig {
        daemon_bind: "127.0.0.1:38890".parse().unwrap(),
        ..TestConfig::default()
    };

    let _daemon = spawn_daemon(&config).expect("Failed to spawn daemon");
    assert!(wait_for_port(config.daemon_bind, Duration::from_secs(60)).await);

    let client = reqwest::Client::new();

    let resp = client.get(config.url("/isgood")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 405);

    let resp = client.post(config.url("/health")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}
