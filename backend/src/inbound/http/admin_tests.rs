//! Handler tests for the admin waitlist endpoints.

use actix_web::http::StatusCode;
use actix_web::test;
use rstest::{fixture, rstest};
use serde_json::{Value, json};

use crate::inbound::http::test_utils::{admin_header, http_state, relaxed_policies, test_app};
use crate::test_support::InMemoryWaitlist;

#[fixture]
fn waitlist() -> InMemoryWaitlist {
    InMemoryWaitlist::new()
}

async fn seed(waitlist: &InMemoryWaitlist, emails: &[&str]) -> Vec<String> {
    let mut ids = Vec::new();
    for email in emails {
        let entry = waitlist.service.join(email, None).await.expect("join");
        ids.push(entry.id.to_string());
    }
    ids
}

async fn verify(waitlist: &InMemoryWaitlist, email: &str) {
    let token = waitlist.outbox.last_token_for(email).expect("token sent");
    waitlist.service.verify(&token).await.expect("verify");
}

#[rstest]
#[case(None)]
#[case(Some("Bearer wrong"))]
#[case(Some("admin-secret"))]
#[actix_web::test]
async fn admin_routes_reject_bad_credentials(
    waitlist: InMemoryWaitlist,
    #[case] authorization: Option<&str>,
) {
    let app = test::init_service(test_app(http_state(&waitlist, relaxed_policies()))).await;
    let mut req = test::TestRequest::get().uri("/api/v1/admin/waitlist");
    if let Some(value) = authorization {
        req = req.insert_header(("Authorization", value));
    }
    let res = test::call_service(&app, req.to_request()).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["code"], "unauthorized");
}

#[rstest]
#[actix_web::test]
async fn list_pages_active_entries(waitlist: InMemoryWaitlist) {
    seed(&waitlist, &["a@example.com", "b@example.com", "c@example.com"]).await;
    let app = test::init_service(test_app(http_state(&waitlist, relaxed_policies()))).await;

    let req = test::TestRequest::get()
        .uri("/api/v1/admin/waitlist?offset=1&limit=1")
        .insert_header(admin_header())
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let entries = body.as_array().expect("array body");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["email"], "b@example.com");
    assert_eq!(entries[0]["position"], 2);
}

#[rstest]
#[actix_web::test]
async fn invite_requires_verification(waitlist: InMemoryWaitlist) {
    let ids = seed(&waitlist, &["a@example.com", "b@example.com"]).await;
    let app = test::init_service(test_app(http_state(&waitlist, relaxed_policies()))).await;
    let invite = |id: &str| {
        test::TestRequest::post()
            .uri(&format!("/api/v1/admin/waitlist/{id}/invite"))
            .insert_header(admin_header())
            .to_request()
    };

    let pending = test::call_service(&app, invite(&ids[0])).await;
    assert_eq!(pending.status(), StatusCode::CONFLICT);

    verify(&waitlist, "a@example.com").await;
    let res = test::call_service(&app, invite(&ids[0])).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["status"], "INVITED");
    assert_eq!(body["position"], Value::Null);
    assert_eq!(
        waitlist.active_positions().await,
        vec![("b@example.com".to_owned(), 1)]
    );
}

#[rstest]
#[actix_web::test]
async fn block_then_remove_conflicts(waitlist: InMemoryWaitlist) {
    let ids = seed(&waitlist, &["a@example.com"]).await;
    let app = test::init_service(test_app(http_state(&waitlist, relaxed_policies()))).await;

    let block = test::TestRequest::post()
        .uri(&format!("/api/v1/admin/waitlist/{}/block", ids[0]))
        .insert_header(admin_header())
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, block).await;
    assert_eq!(body["status"], "BLOCKED");

    let remove = test::TestRequest::delete()
        .uri(&format!("/api/v1/admin/waitlist/{}", ids[0]))
        .insert_header(admin_header())
        .to_request();
    let res = test::call_service(&app, remove).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["details"], json!({ "from": "blocked", "to": "deleted" }));
}

#[rstest]
#[actix_web::test]
async fn remove_compacts_the_queue(waitlist: InMemoryWaitlist) {
    let ids = seed(&waitlist, &["a@example.com", "b@example.com", "c@example.com"]).await;
    let app = test::init_service(test_app(http_state(&waitlist, relaxed_policies()))).await;

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/admin/waitlist/{}", ids[1]))
        .insert_header(admin_header())
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        waitlist.active_positions().await,
        vec![
            ("a@example.com".to_owned(), 1),
            ("c@example.com".to_owned(), 2)
        ]
    );
}

#[rstest]
#[case("not-a-uuid", StatusCode::BAD_REQUEST)]
#[case("6f1c1c2e-8c39-4c7f-9d43-0e8f5b0e7a11", StatusCode::NOT_FOUND)]
#[actix_web::test]
async fn bad_or_unknown_ids(
    waitlist: InMemoryWaitlist,
    #[case] id: &str,
    #[case] expected: StatusCode,
) {
    let app = test::init_service(test_app(http_state(&waitlist, relaxed_policies()))).await;
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/admin/waitlist/{id}/block"))
        .insert_header(admin_header())
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), expected);
}
