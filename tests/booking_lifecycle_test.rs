mod common;

use axum::http::{Method, StatusCode};
use chrono::{DateTime, Duration, TimeZone, Utc};
use common::{booking_body, response_json, TestApp};
use serde_json::{json, Value};
use uuid::Uuid;

struct Booked {
    id: String,
    reference: String,
    addon_ids: Vec<String>,
}

fn drop_off() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 6, 1, 6, 0, 0).unwrap()
}

fn pick_up() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 6, 4, 18, 0, 0).unwrap()
}

async fn book(app: &TestApp, lot_id: Uuid, addon_ids: &[Uuid], email: &str) -> Booked {
    let mut body = booking_body(lot_id, drop_off(), pick_up(), email);
    body["addon_ids"] = json!(addon_ids);

    let response = app
        .request(Method::POST, "/api/v1/bookings", Some(body), None)
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let data = response_json(response).await["data"].clone();

    Booked {
        id: data["booking"]["id"].as_str().unwrap().to_string(),
        reference: data["booking"]["reference"].as_str().unwrap().to_string(),
        addon_ids: data["addons"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["id"].as_str().unwrap().to_string())
            .collect(),
    }
}

async fn set_status(app: &TestApp, booking_id: &str, status: &str) -> (StatusCode, Value) {
    let response = app
        .admin_request(
            Method::PUT,
            &format!("/api/v1/operator/bookings/{}/status", booking_id),
            Some(json!({ "status": status })),
        )
        .await;
    let status = response.status();
    (status, response_json(response).await)
}

async fn set_addon(app: &TestApp, booking_id: &str, addon_id: &str, status: &str) -> Value {
    let response = app
        .admin_request(
            Method::PUT,
            &format!("/api/v1/operator/bookings/{}/addons/{}", booking_id, addon_id),
            Some(json!({ "status": status })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    response_json(response).await["data"].clone()
}

#[tokio::test]
async fn check_in_and_check_out_record_actual_times() {
    let app = TestApp::new().await;
    let lot = app.seed_lot("CIO", 10, 2_000).await;
    let booking = book(&app, lot.id, &[], "times@example.com").await;

    app.clock.set(drop_off() + Duration::minutes(5));
    let response = app
        .admin_request(
            Method::POST,
            &format!("/api/v1/operator/bookings/{}/check-in", booking.id),
            Some(json!({ "spot_number": "B12" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let checked_in = response_json(response).await["data"].clone();
    assert_eq!(checked_in["status"], "CHECKED_IN");
    assert_eq!(checked_in["spot_number"], "B12");
    assert_eq!(
        checked_in["actual_drop_off_time"],
        json!(drop_off() + Duration::minutes(5))
    );

    app.clock.set(pick_up() - Duration::minutes(30));
    let response = app
        .admin_request(
            Method::POST,
            &format!("/api/v1/operator/bookings/{}/check-out", booking.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let checked_out = response_json(response).await["data"].clone();
    assert_eq!(checked_out["status"], "CHECKED_OUT");
    assert_eq!(
        checked_out["actual_pick_up_time"],
        json!(pick_up() - Duration::minutes(30))
    );
}

#[tokio::test]
async fn check_in_rejects_oversized_spot_numbers() {
    let app = TestApp::new().await;
    let lot = app.seed_lot("SPT", 10, 2_000).await;
    let booking = book(&app, lot.id, &[], "spot@example.com").await;
    let uri = format!("/api/v1/operator/bookings/{}/check-in", booking.id);

    let response = app
        .admin_request(Method::POST, &uri, Some(json!({ "spot_number": "X".repeat(17) })))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let details = app
        .admin_request(
            Method::GET,
            &format!("/api/v1/operator/bookings/{}", booking.id),
            None,
        )
        .await;
    assert_eq!(
        response_json(details).await["data"]["booking"]["status"],
        "CONFIRMED"
    );

    let response = app
        .admin_request(Method::POST, &uri, Some(json!({ "spot_number": "  " })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["data"]["spot_number"], Value::Null);
}

#[tokio::test]
async fn statuses_never_move_backwards() {
    let app = TestApp::new().await;
    let lot = app.seed_lot("BWD", 10, 2_000).await;
    let booking = book(&app, lot.id, &[], "backwards@example.com").await;

    let (status, _) = set_status(&app, &booking.id, "IN_PROGRESS").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = set_status(&app, &booking.id, "CHECKED_IN").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_transition");

    // Same status again is accepted and changes nothing
    let (status, body) = set_status(&app, &booking.id, "IN_PROGRESS").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "IN_PROGRESS");
}

#[tokio::test]
async fn terminal_bookings_stay_terminal() {
    let app = TestApp::new().await;
    let lot = app.seed_lot("TRM", 10, 2_000).await;
    let booking = book(&app, lot.id, &[], "terminal@example.com").await;

    let (status, _) = set_status(&app, &booking.id, "NO_SHOW").await;
    assert_eq!(status, StatusCode::OK);

    for next in ["CONFIRMED", "CHECKED_IN", "CANCELLED"] {
        let (status, _) = set_status(&app, &booking.id, next).await;
        assert_eq!(status, StatusCode::CONFLICT, "NO_SHOW -> {}", next);
    }
}

#[tokio::test]
async fn last_settled_addon_makes_an_in_progress_booking_ready() {
    let app = TestApp::new().await;
    let lot = app.seed_lot("ADV", 10, 2_000).await;
    let wash = app.seed_service("Wash", 4_900).await;
    let tyres = app.seed_service("Tyre check", 1_500).await;
    let booking = book(&app, lot.id, &[wash.id, tyres.id], "ready@example.com").await;
    assert_eq!(booking.addon_ids.len(), 2);

    let (status, _) = set_status(&app, &booking.id, "IN_PROGRESS").await;
    assert_eq!(status, StatusCode::OK);

    let first = set_addon(&app, &booking.id, &booking.addon_ids[0], "COMPLETED").await;
    assert_eq!(first["booking_advanced"], false);
    assert_eq!(first["booking"]["status"], "IN_PROGRESS");

    let last = set_addon(&app, &booking.id, &booking.addon_ids[1], "SKIPPED").await;
    assert_eq!(last["booking_advanced"], true);
    assert_eq!(last["booking"]["status"], "READY");
    assert_eq!(last["addon"]["status"], "SKIPPED");
}

#[tokio::test]
async fn settling_addons_of_a_confirmed_booking_changes_nothing() {
    let app = TestApp::new().await;
    let lot = app.seed_lot("CNF", 10, 2_000).await;
    let wash = app.seed_service("Wash", 4_900).await;
    let booking = book(&app, lot.id, &[wash.id], "confirmed@example.com").await;

    let update = set_addon(&app, &booking.id, &booking.addon_ids[0], "COMPLETED").await;
    assert_eq!(update["booking_advanced"], false);
    assert_eq!(update["booking"]["status"], "CONFIRMED");
}

#[tokio::test]
async fn addon_changes_never_resurrect_a_cancelled_booking() {
    let app = TestApp::new().await;
    let lot = app.seed_lot("RES", 10, 2_000).await;
    let wash = app.seed_service("Wash", 4_900).await;
    let booking = book(&app, lot.id, &[wash.id], "cancelled@example.com").await;

    let (status, _) = set_status(&app, &booking.id, "CANCELLED").await;
    assert_eq!(status, StatusCode::OK);

    let update = set_addon(&app, &booking.id, &booking.addon_ids[0], "COMPLETED").await;
    assert_eq!(update["booking_advanced"], false);
    assert_eq!(update["booking"]["status"], "CANCELLED");
}

#[tokio::test]
async fn addon_of_another_booking_is_not_found() {
    let app = TestApp::new().await;
    let lot = app.seed_lot("OTH", 10, 2_000).await;
    let wash = app.seed_service("Wash", 4_900).await;
    let first = book(&app, lot.id, &[wash.id], "one@example.com").await;
    let second = book(&app, lot.id, &[], "two@example.com").await;

    let response = app
        .admin_request(
            Method::PUT,
            &format!(
                "/api/v1/operator/bookings/{}/addons/{}",
                second.id, first.addon_ids[0]
            ),
            Some(json!({ "status": "COMPLETED" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn customer_cannot_cancel_after_check_out() {
    let app = TestApp::new().await;
    let lot = app.seed_lot("CCO", 10, 2_000).await;
    let booking = book(&app, lot.id, &[], "late@example.com").await;

    let (status, _) = set_status(&app, &booking.id, "CHECKED_OUT").await;
    assert_eq!(status, StatusCode::OK);

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/bookings/{}/cancel", booking.reference),
            Some(json!({ "email": "late@example.com" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(response_json(response).await["code"], "cannot_cancel");
}

#[tokio::test]
async fn customer_cannot_cancel_once_drop_off_has_passed() {
    let app = TestApp::new().await;
    let lot = app.seed_lot("CDP", 10, 2_000).await;
    let booking = book(&app, lot.id, &[], "past@example.com").await;

    app.clock.set(drop_off() + Duration::seconds(1));
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/bookings/{}/cancel", booking.reference),
            Some(json!({ "email": "past@example.com" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(response_json(response).await["code"], "cannot_cancel");

    // Still CONFIRMED: the refusal had no side effects
    let details = response_json(
        app.admin_request(
            Method::GET,
            &format!("/api/v1/operator/bookings/{}", booking.id),
            None,
        )
        .await,
    )
    .await;
    assert_eq!(details["data"]["booking"]["status"], "CONFIRMED");
}

#[tokio::test]
async fn customer_cancellation_frees_the_space_and_sends_an_email() {
    let app = TestApp::new().await;
    let lot = app.seed_lot("CAN", 1, 2_000).await;
    let booking = book(&app, lot.id, &[], "cancel@example.com").await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/bookings/{}/cancel", booking.reference.to_lowercase()),
            Some(json!({ "email": "Cancel@Example.com" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["booking"]["status"], "CANCELLED");
    assert!(body["data"]["booking"]["cancelled_at"].is_string());
    assert!(body["data"]["refund"].is_null());
    assert_eq!(body["data"]["cancellation_email"], "sent");

    let subjects: Vec<String> = app
        .outbox
        .sent()
        .await
        .into_iter()
        .filter(|m| m.to == "cancel@example.com")
        .map(|m| m.subject)
        .collect();
    assert_eq!(subjects.len(), 2, "confirmation and cancellation: {:?}", subjects);

    // The single space is free again
    let again = app
        .request(
            Method::POST,
            "/api/v1/bookings",
            Some(booking_body(lot.id, drop_off(), pick_up(), "next@example.com")),
            None,
        )
        .await;
    assert_eq!(again.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn operator_tokens_cannot_reach_admin_routes() {
    let app = TestApp::new().await;
    let token = app.operator_token("operator@airpark.test").await;

    let allowed = app
        .request(Method::GET, "/api/v1/operator/bookings", None, Some(&token))
        .await;
    assert_eq!(allowed.status(), StatusCode::OK);

    let forbidden = app
        .request(Method::GET, "/api/v1/admin/lots", None, Some(&token))
        .await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let anonymous = app
        .request(Method::GET, "/api/v1/operator/bookings", None, None)
        .await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn daily_schedule_lists_arrivals_and_departures() {
    let app = TestApp::new().await;
    let lot = app.seed_lot("SCH", 10, 2_000).await;
    book(&app, lot.id, &[], "schedule@example.com").await;

    let arrivals = response_json(
        app.admin_request(
            Method::GET,
            &format!("/api/v1/operator/lots/{}/schedule?date=2030-06-01", lot.id),
            None,
        )
        .await,
    )
    .await;
    assert_eq!(arrivals["data"]["arrivals"].as_array().unwrap().len(), 1);
    assert_eq!(arrivals["data"]["departures"].as_array().unwrap().len(), 0);

    let departures = response_json(
        app.admin_request(
            Method::GET,
            &format!("/api/v1/operator/lots/{}/schedule?date=2030-06-04", lot.id),
            None,
        )
        .await,
    )
    .await;
    assert_eq!(departures["data"]["arrivals"].as_array().unwrap().len(), 0);
    assert_eq!(departures["data"]["departures"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn reminders_go_out_once() {
    let app = TestApp::new().await;
    let lot = app.seed_lot("REM", 10, 2_000).await;
    book(&app, lot.id, &[], "remind@example.com").await;

    // Not yet within the 24 hour lead
    let run = response_json(
        app.admin_request(Method::POST, "/api/v1/operator/reminders/run", None)
            .await,
    )
    .await;
    assert_eq!(run["data"]["due"], 0);

    app.clock.set(drop_off() - Duration::hours(12));
    let run = response_json(
        app.admin_request(Method::POST, "/api/v1/operator/reminders/run", None)
            .await,
    )
    .await;
    assert_eq!(run["data"]["due"], 1);
    assert_eq!(run["data"]["sent"], 1);

    let run = response_json(
        app.admin_request(Method::POST, "/api/v1/operator/reminders/run", None)
            .await,
    )
    .await;
    assert_eq!(run["data"]["due"], 0);
}
