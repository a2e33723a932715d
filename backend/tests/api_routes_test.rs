mod common;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{engine, snapshot, wire_topic, FakeFeed, FakePrices};
use pulse_backend::app::create_app;
use pulse_backend::models::{SeriesPoint, TickerSeries, WireDivergence};
use pulse_backend::services::comparison_service::ComparisonService;
use pulse_backend::state::AppState;

fn app(feed: Arc<FakeFeed>, prices: Arc<FakePrices>) -> Router {
    let state = AppState {
        engine: engine(feed.clone(), prices),
        comparisons: Arc::new(ComparisonService::new(feed)),
    };
    create_app(state)
}

fn default_app() -> (Router, Arc<FakeFeed>) {
    let feed = Arc::new(FakeFeed::with_snapshot(snapshot(vec![
        wire_topic("TSLA", 40, 0.4),
        wire_topic("AAPL", 25, -0.2),
    ])));
    let prices = Arc::new(FakePrices::new(&[("TSLA", 250.0), ("AAPL", 190.0)]));
    (app(feed.clone(), prices), feed)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, value)
}

fn series(symbol: &str, prices: &[f64], sentiments: &[f64]) -> TickerSeries {
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    TickerSeries {
        symbol: symbol.to_string(),
        series: prices
            .iter()
            .zip(sentiments)
            .enumerate()
            .map(|(i, (price, sentiment))| SeriesPoint {
                time: start + ChronoDuration::hours(i as i64),
                price: *price,
                sentiment: *sentiment,
                mentions: 10 + i as u32,
            })
            .collect(),
        source_breakdown: Default::default(),
    }
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = default_app();
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".to_string()));
}

#[tokio::test]
async fn test_refresh_then_list_topics() {
    let (app, feed) = default_app();

    let (status, body) = send(&app, Method::GET, "/api/topics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["topics"].as_array().unwrap().len(), 0);

    let (status, body) = send(&app, Method::POST, "/api/topics/refresh", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"]["outcome"], "rendered");
    assert_eq!(body["view"]["status"]["state"], "ready");
    assert_eq!(feed.calls(), 1);

    let (_, body) = send(&app, Method::GET, "/api/topics", None).await;
    let topics = body["topics"].as_array().unwrap();
    assert_eq!(topics.len(), 2);
    assert_eq!(topics[0]["ticker"], "TSLA");
    assert_eq!(topics[0]["currentPrice"], 250.0);
    assert_eq!(topics[1]["ticker"], "AAPL");

    let (_, health) = send(&app, Method::GET, "/health/engine", None).await;
    assert_eq!(health["guard"], "idle");
    assert_eq!(health["totalKnown"], 2);
    assert_eq!(health["generation"], 1);
}

#[tokio::test]
async fn test_settings_reject_unknown_bucket() {
    let (app, _) = default_app();
    send(&app, Method::POST, "/api/topics/refresh", None).await;

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/topics/settings",
        Some(json!({ "priceRange": "cheap" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_settings_sort_and_price_bucket() {
    let (app, feed) = default_app();
    send(&app, Method::POST, "/api/topics/refresh", None).await;

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/topics/settings",
        Some(json!({ "sort": "sentiment-negative", "priceRange": "100-200" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["render"]["outcome"], "completed");
    assert!(body["refresh"].is_null());
    assert_eq!(body["view"]["sort"], "sentiment-negative");

    let topics = body["view"]["topics"].as_array().unwrap();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0]["ticker"], "AAPL");
    // Sort and price changes reuse the universe
    assert_eq!(feed.calls(), 1);
}

#[tokio::test]
async fn test_settings_time_range_triggers_fetch() {
    let (app, feed) = default_app();
    send(&app, Method::POST, "/api/topics/refresh", None).await;

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/topics/settings",
        Some(json!({ "timeRange": "7d" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["refresh"]["outcome"], "rendered");
    assert_eq!(feed.calls(), 2);
    assert_eq!(feed.queries.lock()[1].time_range.as_str(), "7d");
}

#[tokio::test]
async fn test_search_and_clear() {
    let (app, feed) = default_app();
    send(&app, Method::POST, "/api/topics/refresh", None).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/topics/search",
        Some(json!({ "term": "$tsla" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"]["outcome"], "found");
    assert_eq!(body["outcome"]["term"], "TSLA");
    assert_eq!(body["view"]["search"], "TSLA");
    assert_eq!(body["view"]["topics"].as_array().unwrap().len(), 1);

    let (_, health) = send(&app, Method::GET, "/health/engine", None).await;
    assert_eq!(health["guard"], "searching");

    // A manual refresh is held off while the search result is on screen
    let (_, body) = send(&app, Method::POST, "/api/topics/refresh", None).await;
    assert_eq!(body["outcome"]["outcome"], "suppressed");
    assert_eq!(feed.calls(), 1);

    let (status, body) = send(&app, Method::DELETE, "/api/topics/search", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"]["outcome"], "cleared");
    assert!(body["view"]["search"].is_null());
    assert_eq!(feed.calls(), 2);

    let (_, body) = send(&app, Method::DELETE, "/api/topics/search", None).await;
    assert_eq!(body["outcome"]["outcome"], "notSearching");
}

#[tokio::test]
async fn test_compare_rejects_too_many_symbols() {
    let (app, _) = default_app();
    let (status, body) = send(
        &app,
        Method::GET,
        "/api/compare?symbols=AAPL,TSLA,NVDA,AMD,MSFT,META",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.as_str().unwrap().contains("At most 5"));
}

#[tokio::test]
async fn test_compare_keeps_request_order() {
    let (app, feed) = default_app();
    *feed.comparison.lock() = vec![
        series("TSLA", &[200.0, 210.0, 220.0, 230.0], &[0.1, 0.2, 0.3, 0.4]),
        series("AAPL", &[190.0, 188.0, 185.0, 180.0], &[0.3, 0.1, -0.1, -0.3]),
    ];

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/compare?symbols=aapl,tsla&timeRange=7d&aggregation=1h",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let stocks = body["stocks"].as_array().unwrap();
    assert_eq!(stocks.len(), 2);
    assert_eq!(stocks[0]["symbol"], "AAPL");
    assert_eq!(stocks[1]["symbol"], "TSLA");
    assert_eq!(body["timeRange"], "7d");
    assert_eq!(body["aggregation"], "1h");

    let tsla = &stocks[1]["metrics"];
    assert!((tsla["priceChangePercent"].as_f64().unwrap() - 15.0).abs() < 1e-9);
    assert!((tsla["correlation"].as_f64().unwrap() - 1.0).abs() < 1e-9);

    // Rising sentiment with growing mentions ranks first
    assert_eq!(body["ranking"][0], "TSLA");
}

#[tokio::test]
async fn test_divergence_uses_default_threshold() {
    let (app, feed) = default_app();
    *feed.divergence.lock() = vec![
        WireDivergence {
            ticker: "gme".to_string(),
            sentiment_change: 0.6,
            price_change: -0.1,
        },
        WireDivergence {
            ticker: "AAPL".to_string(),
            sentiment_change: 0.1,
            price_change: 0.05,
        },
        WireDivergence {
            ticker: "AMC".to_string(),
            sentiment_change: -0.3,
            price_change: 0.0,
        },
    ];

    let (status, body) = send(&app, Method::GET, "/api/divergence", None).await;
    assert_eq!(status, StatusCode::OK);

    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["ticker"], "GME");
    assert_eq!(items[1]["ticker"], "AMC");

    let (status, _) = send(&app, Method::GET, "/api/divergence?threshold=-1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
