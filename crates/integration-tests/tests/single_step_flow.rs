//! Deployments where owners retrieve by tracking id with no security step.

#![allow(clippy::unwrap_used)]

use serde_json::json;

use parcel_desk_core::{RetrievalFlow, Role};
use parcel_desk_integration_tests::TestApp;

#[tokio::test]
async fn test_retrieve_by_tracking_id() {
    let app = TestApp::with_flow(RetrievalFlow::SingleStep);
    let jane = app.user("Jane", "B-204", Role::User).await;

    let (status, created) = app
        .post(
            "/orders/expect",
            &jane,
            json!({"orderTrackingId": "AWB123", "expectedDate": "2025-06-01"}),
        )
        .await;
    assert_eq!(status, 201);
    assert!(created.get("otp").is_none());

    let (status, slip) = app
        .post("/orders/retrieve", &jane, json!({"orderTrackingId": " AWB123 "}))
        .await;
    assert_eq!(status, 200, "{slip}");
    assert_eq!(slip["order"]["status"], "retrieved");
    assert!(slip["order"]["retrieved_at"].is_string());
    assert!(slip["order"]["verified_at"].is_null());

    let (status, _) = app
        .post("/orders/retrieve", &jane, json!({"orderTrackingId": "AWB123"}))
        .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_cannot_retrieve_someone_elses_order() {
    let app = TestApp::with_flow(RetrievalFlow::SingleStep);
    let jane = app.user("Jane", "B-204", Role::User).await;
    let sam = app.user("Sam", "A-1", Role::User).await;
    app.post(
        "/orders/expect",
        &jane,
        json!({"orderTrackingId": "AWB123", "expectedDate": "2025-06-01"}),
    )
    .await;

    let (status, _) = app
        .post("/orders/retrieve", &sam, json!({"orderTrackingId": "AWB123"}))
        .await;
    assert_eq!(status, 404);

    let (_, mine) = app.get("/orders", &jane).await;
    assert_eq!(mine["orders"][0]["status"], "expected");
}

#[tokio::test]
async fn test_retrieved_orders_never_reach_the_desk() {
    let app = TestApp::with_flow(RetrievalFlow::SingleStep);
    let jane = app.user("Jane", "B-204", Role::User).await;
    let guard = app.user("Guard", "Desk", Role::Security).await;
    app.post(
        "/orders/expect",
        &jane,
        json!({"orderTrackingId": "AWB123", "expectedDate": "2025-06-01"}),
    )
    .await;
    app.post("/orders/retrieve", &jane, json!({"orderTrackingId": "AWB123"}))
        .await;

    let (status, queue) = app.get("/orders/verified", &guard).await;
    assert_eq!(status, 200);
    assert_eq!(queue["orders"], json!([]));
}
