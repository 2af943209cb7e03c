mod common;

use axum::http::{Method, StatusCode};
use chrono::{DateTime, TimeZone, Utc};
use common::{booking_body, response_json, TestApp, ADMIN_EMAIL, ADMIN_PASSWORD};
use sea_orm::ConnectionTrait;
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 6, day, hour, 0, 0).unwrap()
}

fn quote_uri(lot_id: Uuid, drop_off: DateTime<Utc>, pick_up: DateTime<Utc>) -> String {
    format!(
        "/api/v1/lots/{}/quote?vehicle_type=medium&drop_off_time={}&pick_up_time={}",
        lot_id,
        drop_off.format("%Y-%m-%dT%H:%M:%SZ"),
        pick_up.format("%Y-%m-%dT%H:%M:%SZ")
    )
}

/// Creates a 4-day booking (2030-06-01 06:00 to 2030-06-04 18:00) and
/// returns its `data` payload.
async fn create_booking(app: &TestApp, lot_id: Uuid, email: &str) -> Value {
    let response = app
        .request(
            Method::POST,
            "/api/v1/bookings",
            Some(booking_body(lot_id, at(1, 6), at(4, 18), email)),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    response_json(response).await["data"].clone()
}

async fn start_checkout(app: &TestApp, reference: &str, email: &str) -> axum::response::Response {
    app.request(
        Method::POST,
        &format!("/api/v1/bookings/{}/checkout", reference),
        Some(json!({ "email": email })),
        None,
    )
    .await
}

fn checkout_id(redirect_url: &str) -> String {
    redirect_url
        .split("checkout_id=")
        .nth(1)
        .expect("redirect url carries the checkout id")
        .to_string()
}

async fn lookup(app: &TestApp, reference: &str, email: &str) -> axum::response::Response {
    app.request(
        Method::POST,
        "/api/v1/bookings/lookup",
        Some(json!({ "reference": reference, "email": email })),
        None,
    )
    .await
}

/// Books and pays; returns (booking reference, payment id).
async fn paid_booking(app: &TestApp, lot_id: Uuid, email: &str) -> (String, String) {
    let booking = create_booking(app, lot_id, email).await;
    let reference = booking["booking"]["reference"].as_str().unwrap().to_string();

    let checkout = response_json(start_checkout(app, &reference, email).await).await;
    let redirect_url = checkout["data"]["redirect_url"].as_str().unwrap();
    let completed = app
        .send_webhook(json!({
            "id": "evt_paid",
            "type": "payment.completed",
            "checkout_id": checkout_id(redirect_url),
        }))
        .await;
    assert_eq!(completed.status(), StatusCode::OK);

    let payment_id = checkout["data"]["payment_id"].as_str().unwrap().to_string();
    (reference, payment_id)
}

#[tokio::test]
async fn public_lot_listing_shows_active_lots() {
    let app = TestApp::new().await;
    app.seed_lot("PUB", 40, 2_000).await;

    let response = app.request(Method::GET, "/api/v1/lots", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    let lots = body["data"].as_array().unwrap();
    assert_eq!(lots.len(), 1);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn quotes_round_up_and_apply_one_discount_tier() {
    let app = TestApp::new().await;
    let lot = app.seed_lot("QTE", 10, 2_000).await;

    // A few hours is still one day
    let short = response_json(
        app.request(Method::GET, &quote_uri(lot.id, at(1, 6), at(1, 10)), None, None)
            .await,
    )
    .await;
    assert_eq!(short["data"]["days"], 1);
    assert_eq!(short["data"]["total"], 2_000);
    assert_eq!(short["data"]["discount_tier"], Value::Null);

    let week = response_json(
        app.request(Method::GET, &quote_uri(lot.id, at(1, 6), at(8, 6)), None, None)
            .await,
    )
    .await;
    assert_eq!(week["data"]["days"], 7);
    assert_eq!(week["data"]["subtotal"], 14_000);
    assert_eq!(week["data"]["discount_tier"], "weekly");
    assert_eq!(week["data"]["discount_amount"], 1_400);
    assert_eq!(week["data"]["total"], 12_600);

    let month_end = Utc.with_ymd_and_hms(2030, 7, 1, 6, 0, 0).unwrap();
    let month = response_json(
        app.request(Method::GET, &quote_uri(lot.id, at(1, 6), month_end), None, None)
            .await,
    )
    .await;
    assert_eq!(month["data"]["days"], 30);
    assert_eq!(month["data"]["discount_tier"], "monthly");
    assert_eq!(month["data"]["total"], 48_000);
}

#[tokio::test]
async fn quote_without_pricing_for_the_vehicle_is_not_found() {
    let app = TestApp::new().await;
    let lot = app.seed_lot("NOP", 10, 2_000).await;

    let uri = format!(
        "/api/v1/lots/{}/quote?vehicle_type=xlarge&drop_off_time=2030-06-01T06:00:00Z&pick_up_time=2030-06-02T06:00:00Z",
        lot.id
    );
    let response = app.request(Method::GET, &uri, None, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn booking_is_confirmed_priced_and_emailed() {
    let app = TestApp::new().await;
    let lot = app.seed_lot("BOK", 10, 2_000).await;
    let wash = app.seed_service("Exterior wash", 500).await;

    let mut body = booking_body(lot.id, at(1, 6), at(4, 18), "Guest@Example.com");
    body["addon_ids"] = json!([wash.id]);
    body["departure_flight"] = json!("fi 204");
    let response = app
        .request(Method::POST, "/api/v1/bookings", Some(body), None)
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let data = response_json(response).await["data"].clone();
    let booking = &data["booking"];
    let reference = booking["reference"].as_str().unwrap();
    assert!(reference.starts_with("PK-"));
    assert_eq!(reference.len(), 9);
    assert_eq!(booking["status"], "CONFIRMED");
    assert_eq!(booking["license_plate"], "AB123");
    assert_eq!(booking["departure_flight"], "FI204");
    assert_eq!(booking["customer_email"], "guest@example.com");
    assert_eq!(booking["total_days"], 4);
    assert_eq!(booking["addons_total"], 500);
    assert_eq!(booking["total_price"], 8_500);
    assert_eq!(data["quote"]["total"], 8_000);
    assert_eq!(data["addons"][0]["status"], "PENDING");
    assert_eq!(data["confirmation_email"], "sent");

    let sent = app.outbox.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "guest@example.com");
    assert!(sent[0].body.contains(reference));
}

#[tokio::test]
async fn bookings_in_the_past_are_rejected() {
    let app = TestApp::new().await;
    let lot = app.seed_lot("PST", 10, 2_000).await;

    let drop_off = Utc.with_ymd_and_hms(2030, 5, 19, 6, 0, 0).unwrap();
    let response = app
        .request(
            Method::POST,
            "/api/v1/bookings",
            Some(booking_body(lot.id, drop_off, at(1, 6), "late@example.com")),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.outbox.sent().await.is_empty());
}

#[tokio::test]
async fn unknown_services_and_bad_flights_are_rejected() {
    let app = TestApp::new().await;
    let lot = app.seed_lot("ADD", 10, 2_000).await;

    let mut unknown_addon = booking_body(lot.id, at(1, 6), at(4, 18), "a@example.com");
    unknown_addon["addon_ids"] = json!([Uuid::new_v4()]);
    let response = app
        .request(Method::POST, "/api/v1/bookings", Some(unknown_addon), None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut bad_flight = booking_body(lot.id, at(1, 6), at(4, 18), "a@example.com");
    bad_flight["arrival_flight"] = json!("not a flight");
    let response = app
        .request(Method::POST, "/api/v1/bookings", Some(bad_flight), None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn full_lot_rejects_further_bookings() {
    let app = TestApp::new().await;
    let lot = app.seed_lot("FUL", 1, 2_000).await;
    create_booking(&app, lot.id, "first@example.com").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/bookings",
            Some(booking_body(lot.id, at(3, 6), at(6, 6), "second@example.com")),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(response_json(response).await["code"], "no_spots_available");
}

#[tokio::test]
async fn lookup_requires_the_matching_email() {
    let app = TestApp::new().await;
    let lot = app.seed_lot("LKP", 10, 2_000).await;
    let booking = create_booking(&app, lot.id, "owner@example.com").await;
    let reference = booking["booking"]["reference"].as_str().unwrap();

    let found = lookup(&app, &reference.to_lowercase(), "OWNER@example.com").await;
    assert_eq!(found.status(), StatusCode::OK);
    let body = response_json(found).await;
    assert_eq!(body["data"]["booking"]["reference"], reference);
    assert_eq!(body["data"]["payment"], Value::Null);

    let wrong = lookup(&app, reference, "someone@example.com").await;
    assert_eq!(wrong.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pending_checkout_is_handed_out_again() {
    let app = TestApp::new().await;
    let lot = app.seed_lot("CHK", 10, 2_000).await;
    let booking = create_booking(&app, lot.id, "payer@example.com").await;
    let reference = booking["booking"]["reference"].as_str().unwrap();

    let first = start_checkout(&app, reference, "payer@example.com").await;
    assert_eq!(first.status(), StatusCode::OK);
    let first = response_json(first).await;
    assert_eq!(first["data"]["amount"], 8_000);
    assert_eq!(first["data"]["currency"], "ISK");
    assert!(first["data"]["redirect_url"]
        .as_str()
        .unwrap()
        .contains(reference));

    let second = response_json(start_checkout(&app, reference, "payer@example.com").await).await;
    assert_eq!(second["data"]["payment_id"], first["data"]["payment_id"]);
    assert_eq!(second["data"]["redirect_url"], first["data"]["redirect_url"]);
}

#[tokio::test]
async fn completed_webhook_settles_the_payment_once() {
    let app = TestApp::new().await;
    let lot = app.seed_lot("WHK", 10, 2_000).await;
    let booking = create_booking(&app, lot.id, "payer@example.com").await;
    let reference = booking["booking"]["reference"].as_str().unwrap();

    let checkout = response_json(start_checkout(&app, reference, "payer@example.com").await).await;
    let payload = json!({
        "id": "evt_1",
        "type": "payment.completed",
        "checkout_id": checkout_id(checkout["data"]["redirect_url"].as_str().unwrap()),
    });

    let first = response_json(app.send_webhook(payload.clone()).await).await;
    assert_eq!(first["data"]["disposition"], "processed");
    assert_eq!(first["data"]["payment_id"], checkout["data"]["payment_id"]);

    let replay = response_json(app.send_webhook(payload).await).await;
    assert_eq!(replay["data"]["disposition"], "duplicate");

    let details = response_json(lookup(&app, reference, "payer@example.com").await).await;
    assert_eq!(details["data"]["payment"]["status"], "COMPLETED");

    // Paid bookings cannot be checked out again
    let again = start_checkout(&app, reference, "payer@example.com").await;
    assert_eq!(again.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_webhook_types_are_ignored() {
    let app = TestApp::new().await;
    let response = app
        .send_webhook(json!({ "type": "payment.disputed", "checkout_id": "chk_x" }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["data"]["disposition"], "ignored");
}

#[tokio::test]
async fn badly_signed_webhooks_are_rejected() {
    let app = TestApp::new().await;
    let timestamp = Utc::now().timestamp().to_string();
    let response = app
        .request_with_headers(
            Method::POST,
            "/api/v1/payments/webhook",
            Some(json!({ "type": "payment.completed", "checkout_id": "chk_x" })),
            None,
            &[("x-timestamp", timestamp.as_str()), ("x-signature", "deadbeef")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let unsigned = app
        .request(
            Method::POST,
            "/api/v1/payments/webhook",
            Some(json!({ "type": "payment.completed", "checkout_id": "chk_x" })),
            None,
        )
        .await;
    assert_eq!(unsigned.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn failed_payment_cancels_the_booking() {
    let app = TestApp::new().await;
    let lot = app.seed_lot("FAIL", 1, 2_000).await;
    let booking = create_booking(&app, lot.id, "payer@example.com").await;
    let reference = booking["booking"]["reference"].as_str().unwrap();

    let checkout = response_json(start_checkout(&app, reference, "payer@example.com").await).await;
    let outcome = response_json(
        app.send_webhook(json!({
            "type": "payment.failed",
            "checkout_id": checkout_id(checkout["data"]["redirect_url"].as_str().unwrap()),
            "failure_reason": "card_declined",
        }))
        .await,
    )
    .await;
    assert_eq!(outcome["data"]["disposition"], "processed");

    let details = response_json(lookup(&app, reference, "payer@example.com").await).await;
    assert_eq!(details["data"]["booking"]["status"], "CANCELLED");
    assert_eq!(details["data"]["payment"]["status"], "FAILED");
    assert_eq!(details["data"]["payment"]["failure_reason"], "card_declined");

    // The single space is free again
    create_booking(&app, lot.id, "next@example.com").await;
}

#[tokio::test]
async fn operators_refund_in_parts() {
    let app = TestApp::new().await;
    let lot = app.seed_lot("RFD", 10, 2_000).await;
    let (_, payment_id) = paid_booking(&app, lot.id, "payer@example.com").await;
    let uri = format!("/api/v1/admin/payments/{}/refund", payment_id);

    let partial = app
        .admin_request(Method::POST, &uri, Some(json!({ "amount": 3_000, "reason": "early return" })))
        .await;
    assert_eq!(partial.status(), StatusCode::OK);
    let partial = response_json(partial).await;
    assert_eq!(partial["data"]["status"], "PARTIALLY_REFUNDED");
    assert_eq!(partial["data"]["refunded_amount"], 3_000);

    let too_much = app
        .admin_request(Method::POST, &uri, Some(json!({ "amount": 6_000 })))
        .await;
    assert_eq!(too_much.status(), StatusCode::BAD_REQUEST);

    // No body refunds the rest
    let rest = response_json(app.admin_request(Method::POST, &uri, None).await).await;
    assert_eq!(rest["data"]["status"], "REFUNDED");
    assert_eq!(rest["data"]["refunded_amount"], 8_000);

    let nothing_left = app.admin_request(Method::POST, &uri, None).await;
    assert_eq!(nothing_left.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn simultaneous_refunds_both_count() {
    let app = TestApp::new().await;
    let lot = app.seed_lot("RCC", 10, 2_000).await;
    let (_, payment_id) = paid_booking(&app, lot.id, "payer@example.com").await;
    let uri = format!("/api/v1/admin/payments/{}/refund", payment_id);
    let body = || Some(json!({ "amount": 3_000 }));

    let (a, b) = tokio::join!(
        app.admin_request(Method::POST, &uri, body()),
        app.admin_request(Method::POST, &uri, body()),
    );
    assert_eq!(a.status(), StatusCode::OK);
    assert_eq!(b.status(), StatusCode::OK);

    // Only what neither refund claimed is left
    let rest = response_json(app.admin_request(Method::POST, &uri, None).await).await;
    assert_eq!(rest["data"]["status"], "REFUNDED");
    assert_eq!(rest["data"]["refunded_amount"], 8_000);
}

#[tokio::test]
async fn simultaneous_refunds_cannot_exceed_the_payment() {
    let app = TestApp::new().await;
    let lot = app.seed_lot("RCX", 10, 2_000).await;
    let (reference, payment_id) = paid_booking(&app, lot.id, "payer@example.com").await;
    let uri = format!("/api/v1/admin/payments/{}/refund", payment_id);
    let body = || Some(json!({ "amount": 5_000 }));

    let (a, b) = tokio::join!(
        app.admin_request(Method::POST, &uri, body()),
        app.admin_request(Method::POST, &uri, body()),
    );
    let mut statuses = [a.status(), b.status()];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::BAD_REQUEST]);

    let details = response_json(lookup(&app, &reference, "payer@example.com").await).await;
    assert_eq!(details["data"]["payment"]["refunded_amount"], 5_000);
    assert_eq!(details["data"]["payment"]["status"], "PARTIALLY_REFUNDED");
}

#[tokio::test]
async fn refused_refund_leaves_the_payment_untouched() {
    let gateway = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/checkouts"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "checkout_id": "chk_refused",
            "redirect_url": "https://pay.test/hosted?checkout_id=chk_refused",
        })))
        .mount(&gateway)
        .await;
    Mock::given(method("POST"))
        .and(path("/payments/chk_refused/refunds"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&gateway)
        .await;

    let gateway_url = gateway.uri();
    let app = TestApp::with_config(move |cfg| cfg.payment_gateway_url = Some(gateway_url)).await;
    let lot = app.seed_lot("RFX", 10, 2_000).await;
    let (reference, payment_id) = paid_booking(&app, lot.id, "payer@example.com").await;

    let refused = app
        .admin_request(
            Method::POST,
            &format!("/api/v1/admin/payments/{}/refund", payment_id),
            Some(json!({ "amount": 3_000 })),
        )
        .await;
    assert_eq!(refused.status(), StatusCode::BAD_GATEWAY);

    let details = response_json(lookup(&app, &reference, "payer@example.com").await).await;
    assert_eq!(details["data"]["payment"]["refunded_amount"], 0);
    assert_eq!(details["data"]["payment"]["status"], "COMPLETED");
}

#[tokio::test]
async fn cancellation_reports_a_refund_that_could_not_be_attempted() {
    let app = TestApp::new().await;
    let lot = app.seed_lot("CRE", 10, 2_000).await;
    let (reference, _) = paid_booking(&app, lot.id, "payer@example.com").await;

    app.state
        .db
        .execute_unprepared("ALTER TABLE payments RENAME TO payments_archive")
        .await
        .expect("move payments table");

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/bookings/{}/cancel", reference),
            Some(json!({ "email": "payer@example.com" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["data"]["booking"]["status"], "CANCELLED");
    assert_eq!(body["data"]["refund"]["succeeded"], false);
    assert_eq!(body["data"]["refund"]["payment_id"], Value::Null);
    assert!(body["data"]["refund"]["error"].is_string());
}

#[tokio::test]
async fn customer_cancellation_refunds_a_paid_booking() {
    let app = TestApp::new().await;
    let lot = app.seed_lot("CRF", 10, 2_000).await;
    let (reference, payment_id) = paid_booking(&app, lot.id, "payer@example.com").await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/bookings/{}/cancel", reference),
            Some(json!({ "email": "payer@example.com" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["data"]["booking"]["status"], "CANCELLED");
    assert_eq!(body["data"]["refund"]["payment_id"], payment_id);
    assert_eq!(body["data"]["refund"]["amount"], 8_000);
    assert_eq!(body["data"]["refund"]["succeeded"], true);
}

#[tokio::test]
async fn admin_manages_lots_and_pricing() {
    let app = TestApp::new().await;

    let created = app
        .admin_request(
            Method::POST,
            "/api/v1/admin/lots",
            Some(json!({
                "code": "KEF-P2",
                "name": "Long-term P2",
                "names": { "is": "Langtímastæði P2" },
                "total_spaces": 120,
            })),
        )
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let lot_id = response_json(created).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let duplicate = app
        .admin_request(
            Method::POST,
            "/api/v1/admin/lots",
            Some(json!({ "code": "KEF-P2", "name": "Again", "total_spaces": 5 })),
        )
        .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let pricing = app
        .admin_request(
            Method::PUT,
            &format!("/api/v1/admin/lots/{}/pricing", lot_id),
            Some(json!({
                "vehicle_type": "large",
                "price_per_day": 3_000,
                "weekly_discount_percent": "15",
                "monthly_discount_percent": "10",
            })),
        )
        .await;
    assert_eq!(pricing.status(), StatusCode::OK);
    let pricing = response_json(pricing).await;
    assert_eq!(pricing["data"]["pricing"]["price_per_day"], 3_000);
    assert_eq!(pricing["data"]["warnings"].as_array().unwrap().len(), 1);

    let localized = response_json(
        app.request(
            Method::GET,
            &format!("/api/v1/lots/{}?locale=is", lot_id),
            None,
            None,
        )
        .await,
    )
    .await;
    assert_eq!(localized["data"]["name"], "Langtímastæði P2");

    // Unused lots are deleted outright
    let removed = response_json(
        app.admin_request(Method::DELETE, &format!("/api/v1/admin/lots/{}", lot_id), None)
            .await,
    )
    .await;
    assert_eq!(removed["data"]["outcome"], "deleted");
}

#[tokio::test]
async fn lots_with_bookings_are_deactivated_not_deleted() {
    let app = TestApp::new().await;
    let lot = app.seed_lot("DEA", 10, 2_000).await;
    create_booking(&app, lot.id, "keep@example.com").await;

    let removed = response_json(
        app.admin_request(Method::DELETE, &format!("/api/v1/admin/lots/{}", lot.id), None)
            .await,
    )
    .await;
    assert_eq!(removed["data"]["outcome"], "deactivated");

    let public = response_json(app.request(Method::GET, "/api/v1/lots", None, None).await).await;
    assert!(public["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn admin_creates_users_who_can_sign_in() {
    let app = TestApp::new().await;

    let weak = app
        .admin_request(
            Method::POST,
            "/api/v1/admin/users",
            Some(json!({
                "email": "op@airpark.test",
                "name": "Operator",
                "password": "short",
                "role": "operator",
            })),
        )
        .await;
    assert_eq!(weak.status(), StatusCode::BAD_REQUEST);

    let created = app
        .admin_request(
            Method::POST,
            "/api/v1/admin/users",
            Some(json!({
                "email": "op@airpark.test",
                "name": "Operator",
                "password": "LongEnough123",
                "role": "operator",
            })),
        )
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let created = response_json(created).await;
    assert_eq!(created["data"]["role"], "operator");
    assert!(created["data"].get("password_hash").is_none());

    let login = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "op@airpark.test", "password": "LongEnough123" })),
            None,
        )
        .await;
    assert_eq!(login.status(), StatusCode::OK);
    let tokens = response_json(login).await;
    let access = tokens["access_token"].as_str().unwrap();

    let listed = app
        .request(Method::GET, "/api/v1/operator/bookings", None, Some(access))
        .await;
    assert_eq!(listed.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_and_refresh() {
    let app = TestApp::new().await;

    let wrong = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": ADMIN_EMAIL, "password": "not-the-password1" })),
            None,
        )
        .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let login = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(login.status(), StatusCode::OK);
    let tokens = response_json(login).await;
    assert_eq!(tokens["token_type"], "Bearer");

    let refresh_token = tokens["refresh_token"].as_str().unwrap();
    let refreshed = app
        .request(
            Method::POST,
            "/auth/refresh",
            Some(json!({ "refresh_token": refresh_token })),
            None,
        )
        .await;
    assert_eq!(refreshed.status(), StatusCode::OK);

    // A refresh token is not an access token
    let misuse = app
        .request(Method::GET, "/api/v1/admin/lots", None, Some(refresh_token))
        .await;
    assert_eq!(misuse.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn vehicle_lookups_are_rate_limited_per_client() {
    let app = TestApp::with_config(|cfg| {
        cfg.lookup_rate_limit_requests = 2;
        cfg.lookup_rate_limit_window_secs = 60;
    })
    .await;

    for _ in 0..2 {
        let response = app
            .request(Method::GET, "/api/v1/vehicles/AB-123", None, None)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let limited = app
        .request(Method::GET, "/api/v1/vehicles/AB-123", None, None)
        .await;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);

    // Another client has its own window
    let other = app
        .request_with_headers(
            Method::GET,
            "/api/v1/vehicles/AB-123",
            None,
            None,
            &[("x-forwarded-for", "203.0.113.7")],
        )
        .await;
    assert_eq!(other.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_and_status_endpoints_report() {
    let app = TestApp::new().await;

    let health = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(health.status(), StatusCode::OK);

    let ready = app.request(Method::GET, "/health/ready", None, None).await;
    assert_eq!(ready.status(), StatusCode::OK);
    assert_eq!(response_json(ready).await["ready"], true);

    let status = response_json(app.request(Method::GET, "/api/v1/status", None, None).await).await;
    assert_eq!(status["service"], "airpark-api");
    assert_eq!(status["currency"], "ISK");
}
