#![cfg(feature = "api")]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::util::ServiceExt;
use truequote::api::{AppState, router};

mod common;

async fn post(state: &Arc<AppState>, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let req = Request::builder()
        .method("POST")
        .uri("/quotes")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = router(Arc::clone(state)).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn concurrent_posts_share_one_quote() {
    let state = Arc::new(AppState::new(common::default_engine()));
    let body = serde_json::to_value(common::manufacturing(100_000.0)).unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let state = Arc::clone(&state);
        let body = body.clone();
        handles.push(tokio::spawn(async move { post(&state, body).await }));
    }
    let mut ids = Vec::new();
    for h in handles {
        let (status, json) = h.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        ids.push(json["quote_id"].as_str().unwrap().to_string());
    }
    assert!(ids.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(state.engine.cached_quotes(), 1);
}

#[tokio::test]
async fn zero_roof_with_solar_reports_the_field() {
    let state = Arc::new(AppState::new(common::default_engine()));
    let mut request = common::car_wash(truequote::engine::inputs::AreaInput::sqft(0.0), None);
    request.options.solar = true;

    let (status, json) = post(&state, serde_json::to_value(&request).unwrap()).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"], "roof area must be greater than 0");
    assert_eq!(json["field"], "roof.value");
    assert_eq!(json["stage"], "solar");
}

#[tokio::test]
async fn unknown_region_is_unprocessable() {
    let state = Arc::new(AppState::new(common::default_engine()));
    let mut request = common::manufacturing(50_000.0);
    request.region = "ZZ".into();

    let (status, json) = post(&state, serde_json::to_value(&request).unwrap()).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["stage"], "region");
}
