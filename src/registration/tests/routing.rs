use chrono::{Duration as TimeDelta, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::registration::registration_router;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn submit_route_accepts_a_registration() {
    let h = harness();
    identity_grant(&h.grants, 3600);
    let router = registration_router(h.service.clone());

    let response = router
        .oneshot(
            axum::http::Request::post("/api/v1/registrations")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(
                    serde_json::to_vec(&submission()).expect("serializable"),
                ))
                .expect("request built"),
        )
        .await
        .expect("router responds");

    assert_eq!(response.status(), axum::http::StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert_eq!(body["status"], "pending_approval");
    assert!(body["registration_id"]
        .as_str()
        .expect("id string")
        .starts_with("reg-"));
}

#[tokio::test]
async fn submit_route_returns_conflict_for_a_duplicate_pair() {
    let h = harness();
    h.service.submit(submission()).expect("first accepted");
    let router = registration_router(h.service.clone());

    let response = router
        .oneshot(
            axum::http::Request::post("/api/v1/registrations")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(
                    serde_json::to_vec(&submission()).expect("serializable"),
                ))
                .expect("request built"),
        )
        .await
        .expect("router responds");

    assert_eq!(response.status(), axum::http::StatusCode::CONFLICT);
}

#[tokio::test]
async fn submit_route_rejects_unknown_legs_as_unprocessable() {
    let h = harness();
    let router = registration_router(h.service.clone());
    let mut payload = submission();
    payload.leg_id = "leg-nowhere".to_string();

    let response = router
        .oneshot(
            axum::http::Request::post("/api/v1/registrations")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(
                    serde_json::to_vec(&payload).expect("serializable"),
                ))
                .expect("request built"),
        )
        .await
        .expect("router responds");

    assert_eq!(
        response.status(),
        axum::http::StatusCode::UNPROCESSABLE_ENTITY
    );
}

#[tokio::test]
async fn status_route_returns_not_found_for_unknown_registrations() {
    let h = harness();
    let router = registration_router(h.service.clone());

    let response = router
        .oneshot(
            axum::http::Request::get("/api/v1/registrations/reg-999999")
                .body(axum::body::Body::empty())
                .expect("request built"),
        )
        .await
        .expect("router responds");

    assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_route_returns_the_sanitized_view() {
    let h = harness();
    let registration = h.service.submit(submission()).expect("accepted");
    let router = registration_router(h.service.clone());

    let response = router
        .oneshot(
            axum::http::Request::get(format!(
                "/api/v1/registrations/{}",
                registration.registration_id.0
            ))
            .body(axum::body::Body::empty())
            .expect("request built"),
        )
        .await
        .expect("router responds");

    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["reasoning"], "pending assessment");
    assert_eq!(body["auto_approved"], false);
}

#[tokio::test]
async fn review_queue_route_lists_registrations_awaiting_review() {
    let h = harness();
    // No grant exists, so assessment parks the registration for review.
    let registration = h.service.submit(submission()).expect("accepted");
    h.service
        .assess(&registration.registration_id, None)
        .expect("assessment runs");
    let router = registration_router(h.service.clone());

    let response = router
        .oneshot(
            axum::http::Request::get("/api/v1/registrations?limit=10")
                .body(axum::body::Body::empty())
                .expect("request built"),
        )
        .await
        .expect("router responds");

    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let body = body_json(response).await;
    let queue = body.as_array().expect("array body");
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0]["registration_id"], registration.registration_id.0);
    assert_eq!(queue[0]["status"], "pending_approval");
}

#[tokio::test]
async fn grant_routes_create_and_revoke_for_the_owner() {
    let h = harness();
    let router = registration_router(h.service.clone());

    let create = json!({
        "caller_id": CREW,
        "grantee_id": OWNER,
        "purpose": "QualificationReview",
        "expires_at": Utc::now() + TimeDelta::days(7),
        "max_views": 3,
    });
    let response = router
        .clone()
        .oneshot(
            axum::http::Request::post(format!("/api/v1/documents/{PASSPORT_DOC}/grants"))
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(
                    serde_json::to_vec(&create).expect("serializable"),
                ))
                .expect("request built"),
        )
        .await
        .expect("router responds");

    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    let body = body_json(response).await;
    let grant_id = body["grant_id"].as_str().expect("grant id").to_string();

    let revoke = json!({ "caller_id": CREW });
    let response = router
        .oneshot(
            axum::http::Request::post(format!("/api/v1/grants/{grant_id}/revoke"))
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(
                    serde_json::to_vec(&revoke).expect("serializable"),
                ))
                .expect("request built"),
        )
        .await
        .expect("router responds");

    assert_eq!(response.status(), axum::http::StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn grant_creation_by_a_non_owner_is_forbidden() {
    let h = harness();
    let router = registration_router(h.service.clone());

    let create = json!({
        "caller_id": "owner-imposter",
        "grantee_id": OWNER,
        "purpose": "IdentityVerification",
        "expires_at": Utc::now() + TimeDelta::days(7),
    });
    let response = router
        .oneshot(
            axum::http::Request::post(format!("/api/v1/documents/{PASSPORT_DOC}/grants"))
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(
                    serde_json::to_vec(&create).expect("serializable"),
                ))
                .expect("request built"),
        )
        .await
        .expect("router responds");

    assert_eq!(response.status(), axum::http::StatusCode::FORBIDDEN);
}
