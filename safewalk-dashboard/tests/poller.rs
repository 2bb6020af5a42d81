use safewalk_dashboard::telemetry::poller::{self, CancelToken};
use safewalk_dashboard::telemetry::Severity;
use safewalk_dashboard::HttpFetcher;
use safewalk_devkit::fixtures::{hazard, hazards, key_values};
use safewalk_devkit::{collect_for, wait_for, StubResponse, TestHarness};
use std::time::Duration;

fn fetcher(harness: &TestHarness, timeout_ms: u64) -> HttpFetcher {
    HttpFetcher::new(&harness.base_url(), Duration::from_millis(timeout_ms)).unwrap()
}

#[tokio::test]
async fn test_partial_failure_tick() {
    let harness = TestHarness::new().await.unwrap();
    harness.backend.respond("/telemetry/latitude", StubResponse::text("33.4"));
    harness.backend.respond("/telemetry/longitude", StubResponse::text("null"));

    let handle = poller::start(fetcher(&harness, 1000), Duration::from_millis(200));
    let mut feed = handle.subscribe();
    let snapshot = wait_for(&mut feed, 3000, |s| s.tick >= 1).await.expect("no tick published");

    assert_eq!(snapshot.latitude.as_deref(), Some("33.4"));
    assert_eq!(snapshot.longitude, None);
    assert_eq!(snapshot.heading, None);
    assert_eq!(snapshot.speeds, None);
    assert!(snapshot.hazards.is_empty());
    assert_eq!(snapshot.health, None);
    assert!(snapshot.all_fields.is_empty());

    let error = snapshot.last_error.as_deref().expect("404s must be reported");
    assert!(error.contains("heading"));
    assert!(error.contains("404"));
    assert!(!error.contains("latitude"));

    handle.cancel();
    handle.join().await;
}

#[tokio::test]
async fn test_previous_scalar_kept_on_404() {
    let harness = TestHarness::with_nominal_robot().await.unwrap();
    harness.backend.respond_sequence(
        "/telemetry/longitude",
        vec![StubResponse::text("-111.9"), StubResponse::status(404)],
    );

    let handle = poller::start(fetcher(&harness, 1000), Duration::from_millis(100));
    let mut feed = handle.subscribe();
    let snapshot = wait_for(&mut feed, 3000, |s| s.tick >= 2).await.expect("second tick missing");

    assert_eq!(snapshot.longitude.as_deref(), Some("-111.9"));
    assert!(snapshot.last_error.as_deref().unwrap().contains("longitude"));
    assert!(harness.backend.hits("/telemetry/longitude") >= 2);

    handle.cancel();
    handle.join().await;
}

#[tokio::test]
async fn test_stalled_field_times_out_without_blocking_tick() {
    let harness = TestHarness::with_nominal_robot().await.unwrap();
    harness.backend.respond_sequence(
        "/telemetry/heading",
        vec![
            StubResponse::text("1.5708"),
            StubResponse::text("3.1").delayed(Duration::from_secs(30)),
        ],
    );

    let handle = poller::start(fetcher(&harness, 200), Duration::from_millis(300));
    let mut feed = handle.subscribe();
    let stalled = wait_for(&mut feed, 3000, |s| {
        s.tick >= 2 && s.last_error.as_deref().is_some_and(|e| e.contains("timed out"))
    })
    .await
    .expect("stalled heading never timed out");

    assert_eq!(stalled.heading.as_deref(), Some("1.5708"));
    assert_eq!(stalled.latitude.as_deref(), Some("33.423322"));
    assert_eq!(stalled.longitude.as_deref(), Some("-111.932648"));
    assert!(stalled.health.is_some());
    let error = stalled.last_error.as_deref().unwrap();
    assert!(error.starts_with("heading: "));
    assert!(error.contains("after 200 ms"));

    handle.cancel();
    handle.join().await;
}

#[tokio::test]
async fn test_nominal_robot_snapshot() {
    let harness = TestHarness::with_nominal_robot().await.unwrap();
    harness.backend.respond(
        "/telemetry/hazards",
        StubResponse::json(hazards(vec![hazard("h1", "pothole", "high", 33.42, -111.93)])),
    );
    harness.backend.respond(
        "/telemetry",
        StubResponse::json(key_values(&[("battery", "87"), ("mode", "auto")])),
    );

    let handle = poller::start(fetcher(&harness, 1000), Duration::from_millis(200));
    let mut feed = handle.subscribe();
    let snapshot = wait_for(&mut feed, 3000, |s| s.tick >= 1).await.unwrap();

    assert_eq!(snapshot.last_error, None);
    assert_eq!(snapshot.heading.as_deref(), Some("1.5708"));
    assert_eq!(snapshot.speeds.as_ref().map(Vec::len), Some(4));
    assert_eq!(snapshot.hazards.len(), 1);
    assert_eq!(snapshot.hazards[0].kind, "pothole");
    assert_eq!(snapshot.hazards[0].severity, Severity::High);
    assert_eq!(snapshot.health.map(|h| h.cpu_usage), Some(12.5));
    assert_eq!(snapshot.all_fields["battery"], "87");
    assert_eq!(snapshot.all_fields["mode"], "auto");
    assert!(snapshot.published_at.is_some());

    handle.cancel();
    handle.join().await;
}

#[tokio::test]
async fn test_all_endpoints_failing() {
    let harness = TestHarness::with_nominal_robot().await.unwrap();
    harness.backend.respond(
        "/telemetry/hazards",
        StubResponse::json(hazards(vec![hazard("h1", "curb", "low", 1.0, 2.0)])),
    );

    let handle = poller::start(fetcher(&harness, 1000), Duration::from_millis(100));
    let mut feed = handle.subscribe();
    let first = wait_for(&mut feed, 3000, |s| s.tick >= 1 && s.last_error.is_none())
        .await
        .unwrap();

    harness.fail_all_telemetry(503);
    let failed = wait_for(&mut feed, 3000, |s| s.tick > first.tick && s.last_error.is_some())
        .await
        .unwrap();

    assert_eq!(failed.latitude, first.latitude);
    assert_eq!(failed.longitude, first.longitude);
    assert_eq!(failed.heading, first.heading);
    assert_eq!(failed.speeds, first.speeds);
    assert_eq!(failed.hazards, first.hazards);
    assert_eq!(failed.all_fields, first.all_fields);
    assert_eq!(failed.health, None);
    assert!(failed.last_error.as_deref().unwrap().contains("503"));

    handle.cancel();
    handle.join().await;
}

#[tokio::test]
async fn test_malformed_hazards_clear_the_list() {
    let harness = TestHarness::with_nominal_robot().await.unwrap();
    harness.backend.respond_sequence(
        "/telemetry/hazards",
        vec![
            StubResponse::json(hazards(vec![hazard("h1", "curb", "medium", 1.0, 2.0)])),
            StubResponse::text("{\"not\": \"an array\"}"),
        ],
    );

    let handle = poller::start(fetcher(&harness, 1000), Duration::from_millis(100));
    let mut feed = handle.subscribe();
    let cleared = wait_for(&mut feed, 3000, |s| s.tick >= 2 && s.hazards.is_empty())
        .await
        .unwrap();
    assert!(cleared.last_error.as_deref().unwrap().contains("hazards"));
    assert!(harness.backend.hits("/telemetry/hazards") >= 2);

    handle.cancel();
    handle.join().await;
}

#[tokio::test]
async fn test_slow_earlier_tick_never_overwrites_later_one() {
    let harness = TestHarness::with_nominal_robot().await.unwrap();
    harness.backend.respond_sequence(
        "/telemetry/latitude",
        vec![
            StubResponse::text("1.0").delayed(Duration::from_millis(500)),
            StubResponse::text("2.0"),
        ],
    );

    let handle = poller::start(fetcher(&harness, 2000), Duration::from_millis(150));
    let mut feed = handle.subscribe();
    let seen = collect_for(&mut feed, Duration::from_millis(1000)).await;

    assert!(!seen.is_empty());
    assert!(seen.iter().all(|s| s.latitude.as_deref() != Some("1.0")));
    assert_eq!(seen.last().unwrap().latitude.as_deref(), Some("2.0"));
    // ticks publiés strictement croissants
    assert!(seen.windows(2).all(|w| w[0].tick < w[1].tick));

    handle.cancel();
    handle.join().await;
}

#[tokio::test]
async fn test_cancel_discards_in_flight_tick() {
    let harness = TestHarness::with_nominal_robot().await.unwrap();
    harness.backend.respond(
        "/telemetry/latitude",
        StubResponse::text("33.4").delayed(Duration::from_millis(300)),
    );

    let token = CancelToken::new();
    let handle = poller::start_with_token(fetcher(&harness, 2000), Duration::from_secs(10), token.clone());

    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();
    assert!(handle.is_cancelled());

    tokio::time::sleep(Duration::from_millis(500)).await;
    let latest = handle.latest();
    assert_eq!(latest.tick, 0);
    assert_eq!(latest.latitude, None);
    assert_eq!(harness.backend.hits("/telemetry/latitude"), 1);

    tokio::time::timeout(Duration::from_secs(1), handle.join())
        .await
        .expect("scheduler did not stop");
}
