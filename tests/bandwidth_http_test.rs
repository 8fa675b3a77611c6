//! HTTP probe against a local mock server
//!
//! Run with: cargo test --test bandwidth_http_test --features http-probe

use crabclip::bandwidth::{BandwidthEstimator, HttpProbe, ProbeTransport, CACHE_BUST_PARAM};
use crabclip::config::BandwidthSettings;
use crabclip::ClipError;
use std::collections::HashSet;
use std::time::Duration;
use wiremock::matchers::{header, headers, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(server: &MockServer) -> BandwidthSettings {
    BandwidthSettings {
        probe_url: format!("{}/probe.jpg", server.uri()),
        request_timeout_ms: 5_000,
        ..BandwidthSettings::default()
    }
}

#[tokio::test]
async fn test_probe_rounds_bypass_caches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/probe.jpg"))
        .and(headers("cache-control", vec!["no-cache", "no-store"]))
        .and(header("pragma", "no-cache"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 50_000]))
        .expect(3)
        .mount(&server)
        .await;

    let estimator = BandwidthEstimator::http(&settings(&server)).unwrap();
    let sample = estimator.measure().await.unwrap();
    assert!(sample.throughput_mbps > 0.0);

    let requests = server.received_requests().await.unwrap();
    let tokens: HashSet<String> = requests
        .iter()
        .filter_map(|r| {
            r.url
                .query_pairs()
                .find(|(k, _)| k == CACHE_BUST_PARAM)
                .map(|(_, v)| v.into_owned())
        })
        .collect();
    assert_eq!(requests.len(), 3);
    assert_eq!(tokens.len(), 3, "every round needs its own cache-busting token");
}

#[tokio::test]
async fn test_fetch_reports_body_length() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/probe.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 12_345]))
        .mount(&server)
        .await;

    let probe = HttpProbe::new(Duration::from_secs(5)).unwrap();
    let bytes = probe
        .fetch(&format!("{}/probe.jpg?size=small", server.uri()))
        .await
        .unwrap();
    assert_eq!(bytes, 12_345);
}

#[tokio::test]
async fn test_server_error_aborts_measurement() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/probe.jpg"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let estimator = BandwidthEstimator::http(&settings(&server)).unwrap();
    let result = estimator.measure().await;
    assert!(matches!(result, Err(ClipError::NetworkMeasurement(_))));
}

#[tokio::test]
async fn test_unreachable_host_is_measurement_error() {
    let settings = BandwidthSettings {
        probe_url: "http://127.0.0.1:9/probe.jpg".to_string(),
        request_timeout_ms: 1_000,
        ..BandwidthSettings::default()
    };
    let estimator = BandwidthEstimator::http(&settings).unwrap();
    assert!(matches!(
        estimator.measure().await,
        Err(ClipError::NetworkMeasurement(_))
    ));
}
