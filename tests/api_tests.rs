mod common;

use chrono::{Duration, DurationRound, Utc};
use reqwest::StatusCode;
use serde_json::{Value, json};

fn appointment(title: &str, start: &str, end: &str) -> Value {
    json!({ "title": title, "start_time": start, "end_time": end })
}

fn sum_revenue(rows: &Value) -> f64 {
    rows.as_array()
        .unwrap()
        .iter()
        .map(|r| r["revenue"].as_f64().unwrap())
        .sum()
}

// ── Health ──────────────────────────────────────────────────────

#[tokio::test]
async fn health_returns_ok() {
    let app = common::spawn_app().await;

    let resp = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["x-content-type-options"], "nosniff");
    assert_eq!(resp.text().await.unwrap(), "ok");

    common::cleanup(app).await;
}

#[tokio::test]
async fn cors_allows_only_configured_origins() {
    let app = common::spawn_app().await;

    let preflight = |origin: &'static str| {
        app.client
            .request(reqwest::Method::OPTIONS, app.url("/api/v1/appointments"))
            .header("origin", origin)
            .header("access-control-request-method", "GET")
            .send()
    };

    let resp = preflight("http://localhost:5173").await.unwrap();
    assert_eq!(
        resp.headers()["access-control-allow-origin"],
        "http://localhost:5173"
    );

    let resp = preflight("https://evil.example").await.unwrap();
    assert!(resp.headers().get("access-control-allow-origin").is_none());

    common::cleanup(app).await;
}

// ── Registration & Auth ─────────────────────────────────────────

#[tokio::test]
async fn register_returns_tokens_and_plain_role() {
    let app = common::spawn_app().await;

    let (body, status) = app.register("ada@test.com", common::PASSWORD, "Ada").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["access_token"].is_string());
    assert!(body["refresh_token"].is_string());
    assert_eq!(body["role"], "user");
    assert!(body["user"].get("password_hash").is_none());

    let token = body["access_token"].as_str().unwrap();
    let (me, status) = app.get_auth("/api/v1/auth/me", token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["user"]["email"], "ada@test.com");
    assert_eq!(me["is_admin"], false);
    assert_eq!(me["organization"], Value::Null);

    common::cleanup(app).await;
}

#[tokio::test]
async fn configured_email_is_super_admin() {
    let app = common::spawn_app().await;
    let token = app.signup(common::SUPER_ADMIN_EMAIL).await;

    let (me, _) = app.get_auth("/api/v1/auth/me", &token).await;
    assert_eq!(me["role"], "super_admin");
    assert_eq!(me["is_super_admin"], true);

    let (status_body, status) = app.get_auth("/api/v1/admin/status", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(status_body["is_super_admin"], true);
    assert_eq!(status_body["is_org_admin"], false);

    common::cleanup(app).await;
}

#[tokio::test]
async fn register_rejects_duplicate_email_and_short_password() {
    let app = common::spawn_app().await;
    app.signup("ada@test.com").await;

    let (_, status) = app.register("ADA@test.com", common::PASSWORD, "Ada").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, status) = app.register("grace@test.com", "short", "Grace").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    common::cleanup(app).await;
}

#[tokio::test]
async fn closed_registration_is_forbidden() {
    let app = common::spawn_app_with(|c| {
        c.registration = booksmartly::config::RegistrationMode::Closed;
    })
    .await;

    let (body, status) = app.register("ada@test.com", common::PASSWORD, "Ada").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("disabled"));

    common::cleanup(app).await;
}

#[tokio::test]
async fn login_locks_out_after_repeated_failures() {
    let app = common::spawn_app().await;
    app.signup("ada@test.com").await;

    for _ in 0..5 {
        let (_, status) = app.login("ada@test.com", "wrongpassword").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    let (_, status) = app.login("ada@test.com", common::PASSWORD).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    common::cleanup(app).await;
}

#[tokio::test]
async fn requests_without_token_are_unauthorized() {
    let app = common::spawn_app().await;

    let resp = app
        .client
        .get(app.url("/api/v1/appointments"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let (_, status) = app.get_auth("/api/v1/appointments", "not-a-jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    common::cleanup(app).await;
}

#[tokio::test]
async fn refresh_rotates_and_detects_reuse() {
    let app = common::spawn_app().await;
    let (body, _) = app.register("ada@test.com", common::PASSWORD, "Ada").await;
    let refresh = body["refresh_token"].as_str().unwrap().to_string();

    let resp = app
        .client
        .post(app.url("/api/v1/auth/refresh"))
        .header("cookie", format!("refresh_token={refresh}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let rotated: Value = resp.json().await.unwrap();
    let new_refresh = rotated["refresh_token"].as_str().unwrap().to_string();
    assert_ne!(new_refresh, refresh);

    // Replaying the old token revokes every session, including the new one.
    let resp = app
        .client
        .post(app.url("/api/v1/auth/refresh"))
        .header("cookie", format!("refresh_token={refresh}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .client
        .post(app.url("/api/v1/auth/refresh"))
        .header("cookie", format!("refresh_token={new_refresh}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    common::cleanup(app).await;
}

#[tokio::test]
async fn logout_invalidates_refresh_token() {
    let app = common::spawn_app().await;
    let (body, _) = app.register("ada@test.com", common::PASSWORD, "Ada").await;
    let refresh = body["refresh_token"].as_str().unwrap().to_string();

    let resp = app
        .client
        .post(app.url("/api/v1/auth/logout"))
        .header("cookie", format!("refresh_token={refresh}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .client
        .post(app.url("/api/v1/auth/refresh"))
        .header("cookie", format!("refresh_token={refresh}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    common::cleanup(app).await;
}

// ── Appointments ────────────────────────────────────────────────

#[tokio::test]
async fn appointment_crud_round_trip() {
    let app = common::spawn_app().await;
    let token = app.signup("ada@test.com").await;

    let created = app
        .create_appointment(
            &token,
            &json!({
                "title": "Intake",
                "start_time": "2025-05-01T09:00:00Z",
                "end_time": "2025-05-01T10:00:00Z",
                "client_name": "Grace Hopper",
                "price": 75
            }),
        )
        .await;
    let id = created["id"].as_str().unwrap();
    assert_eq!(created["status"], "scheduled");
    assert_eq!(created["billing_status"], "unbilled");
    assert_eq!(created["price"].as_f64(), Some(75.0));

    let (fetched, status) = app.get_auth(&format!("/api/v1/appointments/{id}"), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["client_name"], "Grace Hopper");

    let (updated, status) = app
        .put_auth(
            &format!("/api/v1/appointments/{id}"),
            &token,
            &json!({ "title": "Follow-up", "location": "Room 2" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Follow-up");
    assert_eq!(updated["location"], "Room 2");
    assert_eq!(updated["start_time"], created["start_time"]);

    let (_, status) = app.delete_auth(&format!("/api/v1/appointments/{id}"), &token).await;
    assert_eq!(status, StatusCode::OK);

    let (_, status) = app.get_auth(&format!("/api/v1/appointments/{id}"), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    common::cleanup(app).await;
}

#[tokio::test]
async fn appointment_validation_errors() {
    let app = common::spawn_app().await;
    let token = app.signup("ada@test.com").await;

    let (body, status) = app
        .post_auth(
            "/api/v1/appointments",
            &token,
            &appointment("Backwards", "2025-05-01T10:00:00Z", "2025-05-01T09:00:00Z"),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("End time"));

    let (_, status) = app
        .post_auth(
            "/api/v1/appointments",
            &token,
            &appointment("  ", "2025-05-01T09:00:00Z", "2025-05-01T10:00:00Z"),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    common::cleanup(app).await;
}

#[tokio::test]
async fn list_filters_by_inclusive_start_range_in_order() {
    let app = common::spawn_app().await;
    let token = app.signup("ada@test.com").await;

    for (title, start, end) in [
        ("Late", "2025-05-03T09:00:00Z", "2025-05-03T10:00:00Z"),
        ("Early", "2025-05-01T09:00:00Z", "2025-05-01T10:00:00Z"),
        ("Outside", "2025-06-01T09:00:00Z", "2025-06-01T10:00:00Z"),
    ] {
        app.create_appointment(&token, &appointment(title, start, end)).await;
    }

    let (all, _) = app.get_auth("/api/v1/appointments", &token).await;
    assert_eq!(all.as_array().unwrap().len(), 3);

    let (ranged, status) = app
        .get_auth("/api/v1/appointments?start=2025-05-01&end=2025-05-03", &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = ranged
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Early", "Late"]);

    let (_, status) = app.get_auth("/api/v1/appointments?start=yesterday", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    common::cleanup(app).await;
}

#[tokio::test]
async fn status_update_changes_only_status() {
    let app = common::spawn_app().await;
    let token = app.signup("ada@test.com").await;

    let created = app
        .create_appointment(
            &token,
            &json!({
                "title": "Consult",
                "description": "first visit",
                "start_time": "2025-05-01T09:00:00Z",
                "end_time": "2025-05-01T09:45:00Z",
                "client_name": "Grace Hopper",
                "price": 120
            }),
        )
        .await;
    let id = created["id"].as_str().unwrap();

    let (_, status) = app
        .put_auth(
            &format!("/api/v1/appointments/{id}/status"),
            &token,
            &json!({ "status": "no-show" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (fetched, _) = app.get_auth(&format!("/api/v1/appointments/{id}"), &token).await;
    assert_eq!(fetched["status"], "no-show");
    for field in ["title", "description", "start_time", "end_time", "client_name", "price", "billing_status"] {
        assert_eq!(fetched[field], created[field], "{field} changed");
    }

    let (_, status) = app
        .put_auth(
            &format!("/api/v1/appointments/{id}/status"),
            &token,
            &json!({ "status": "postponed" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    common::cleanup(app).await;
}

#[tokio::test]
async fn other_users_cannot_touch_an_appointment() {
    let app = common::spawn_app().await;
    let owner = app.signup("ada@test.com").await;
    let intruder = app.signup("mallory@test.com").await;

    let created = app
        .create_appointment(
            &owner,
            &appointment("Private", "2025-05-01T09:00:00Z", "2025-05-01T10:00:00Z"),
        )
        .await;
    let id = created["id"].as_str().unwrap();

    let (body, status) = app.delete_auth(&format!("/api/v1/appointments/{id}"), &intruder).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Appointment not found or unauthorized");

    let (_, status) = app
        .put_auth(
            &format!("/api/v1/appointments/{id}/status"),
            &intruder,
            &json!({ "status": "cancelled" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (fetched, status) = app.get_auth(&format!("/api/v1/appointments/{id}"), &owner).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["status"], "scheduled");

    common::cleanup(app).await;
}

#[tokio::test]
async fn typed_appointments_are_prorated() {
    let app = common::spawn_app().await;
    let token = app.signup("ada@test.com").await;
    let (_, token) = app.create_organization("ada@test.com", &token, "Clinic").await;

    let (session, status) = app
        .post_auth(
            "/api/v1/appointment-types",
            &token,
            &json!({ "name": "Therapy", "duration_minutes": 60, "price": 100 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{session}");
    let type_id = session["id"].as_str().unwrap();

    let created = app
        .create_appointment(
            &token,
            &json!({
                "title": "Short session",
                "start_time": "2025-05-01T09:00:00Z",
                "end_time": "2025-05-01T09:30:00Z",
                "appointment_type_id": type_id,
                "price": 999
            }),
        )
        .await;
    assert_eq!(created["price"].as_f64(), Some(50.0));
    let id = created["id"].as_str().unwrap();

    let (longer, _) = app
        .put_auth(
            &format!("/api/v1/appointments/{id}"),
            &token,
            &json!({ "end_time": "2025-05-01T10:30:00Z" }),
        )
        .await;
    assert_eq!(longer["price"].as_f64(), Some(150.0));

    let (after_status, _) = app
        .put_auth(
            &format!("/api/v1/appointments/{id}/status"),
            &token,
            &json!({ "status": "completed" }),
        )
        .await;
    assert_eq!(after_status["price"].as_f64(), Some(150.0));

    common::cleanup(app).await;
}

#[tokio::test]
async fn appointment_types_from_another_catalog_are_not_found() {
    let app = common::spawn_app().await;
    let bob = app.signup("bob@test.com").await;
    let (_, bob) = app.create_organization("bob@test.com", &bob, "Northside").await;
    let (session, status) = app
        .post_auth(
            "/api/v1/appointment-types",
            &bob,
            &json!({ "name": "Therapy", "duration_minutes": 60, "price": 100 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let type_id = session["id"].as_str().unwrap();

    let body = json!({
        "title": "Borrowed session",
        "start_time": "2025-05-01T09:00:00Z",
        "end_time": "2025-05-01T09:30:00Z",
        "appointment_type_id": type_id
    });
    let ada = app.signup("ada@test.com").await;
    let (err, status) = app.post_auth("/api/v1/appointments", &ada, &body).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{err}");

    let (listed, _) = app.get_auth("/api/v1/appointments", &ada).await;
    assert!(listed.as_array().unwrap().is_empty());

    let created = app.create_appointment(&bob, &body).await;
    assert_eq!(created["price"].as_f64(), Some(50.0));

    common::cleanup(app).await;
}

// ── Catalog ─────────────────────────────────────────────────────

#[tokio::test]
async fn catalog_edits_need_an_admin() {
    let app = common::spawn_app().await;
    let member = app.signup("ada@test.com").await;

    let (_, status) = app
        .post_auth("/api/v1/locations", &member, &json!({ "name": "Downtown" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, admin) = app.create_organization("ada@test.com", &member, "Clinic").await;
    let (location, status) = app
        .post_auth(
            "/api/v1/locations",
            &admin,
            &json!({ "name": "Downtown", "address": "1 Main St" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let id = location["id"].as_str().unwrap();

    let (renamed, status) = app
        .put_auth(&format!("/api/v1/locations/{id}"), &admin, &json!({ "name": "Uptown" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["name"], "Uptown");

    let (listed, _) = app.get_auth("/api/v1/locations", &admin).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (_, status) = app
        .post_auth(
            "/api/v1/appointment-types",
            &admin,
            &json!({ "name": "Broken", "duration_minutes": 0, "price": 10 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, status) = app.delete_auth(&format!("/api/v1/locations/{id}"), &admin).await;
    assert_eq!(status, StatusCode::OK);
    let (_, status) = app.delete_auth(&format!("/api/v1/locations/{id}"), &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    common::cleanup(app).await;
}

// ── Clients ─────────────────────────────────────────────────────

#[tokio::test]
async fn personal_clients_are_private() {
    let app = common::spawn_app().await;
    let ada = app.signup("ada@test.com").await;
    let grace = app.signup("grace@test.com").await;

    let (client, status) = app
        .post_auth(
            "/api/v1/clients",
            &ada,
            &json!({ "name": "Alan Turing", "email": "alan@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let id = client["id"].as_str().unwrap();

    let (_, status) = app.get_auth(&format!("/api/v1/clients/{id}"), &grace).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (listed, _) = app.get_auth("/api/v1/clients", &grace).await;
    assert!(listed.as_array().unwrap().is_empty());

    let (updated, status) = app
        .put_auth(
            &format!("/api/v1/clients/{id}"),
            &ada,
            &json!({ "name": "Alan Turing", "phone": "555-0100" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["phone"], "555-0100");

    let (_, status) = app
        .post_auth("/api/v1/clients", &ada, &json!({ "name": "" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, status) = app.delete_auth(&format!("/api/v1/clients/{id}"), &grace).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, status) = app.delete_auth(&format!("/api/v1/clients/{id}"), &ada).await;
    assert_eq!(status, StatusCode::OK);

    common::cleanup(app).await;
}

#[tokio::test]
async fn csv_import_reports_each_failed_row() {
    let app = common::spawn_app().await;
    let token = app.signup("ada@test.com").await;

    let csv = "name,email,mobile\nAlan Turing,alan@example.com,555-0100\n,nobody@example.com,\nGrace Hopper,,\n";
    let (report, status) = app.post_text("/api/v1/clients/import", &token, csv).await;
    assert_eq!(status, StatusCode::OK, "{report}");

    let successful = report["successful"].as_array().unwrap();
    assert_eq!(successful.len(), 2);
    assert_eq!(successful[0]["cell_phone"], "555-0100");

    let failed = report["failed"].as_array().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["row"], 2);
    assert_eq!(failed[0]["error"], "Name is required");
    assert_eq!(failed[0]["data"]["email"], "nobody@example.com");

    let (clients, _) = app.get_auth("/api/v1/clients", &token).await;
    assert_eq!(clients.as_array().unwrap().len(), 2);

    common::cleanup(app).await;
}

#[tokio::test]
async fn csv_import_understands_square_exports() {
    let app = common::spawn_app().await;
    let token = app.signup("ada@test.com").await;

    let csv = "First Name,Last Name,Square Customer ID,Email Address,Phone Number\n\
               Jane,Doe - DOB: 3/14/1985,SQ123,jane@example.com,'+15551234567'\n";
    let (report, status) = app.post_text("/api/v1/clients/import", &token, csv).await;
    assert_eq!(status, StatusCode::OK);

    let jane = &report["successful"][0];
    assert_eq!(jane["name"], "Jane Doe");
    assert_eq!(jane["date_of_birth"], "3/14/1985");
    assert_eq!(jane["phone"], "15551234567");
    assert!(jane["notes"].as_str().unwrap().contains("Square Customer ID: SQ123"));

    let (_, status) = app.post_text("/api/v1/clients/import", &token, "  ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    common::cleanup(app).await;
}

// ── Organizations & Admin ───────────────────────────────────────

#[tokio::test]
async fn joining_an_organization_waits_for_approval() {
    let app = common::spawn_app().await;
    let owner = app.signup("ada@test.com").await;
    let (org, owner) = app.create_organization("ada@test.com", &owner, "Clinic").await;
    let org_id = org["id"].as_str().unwrap();
    let code = org["access_code"].as_str().unwrap();
    assert_eq!(code.len(), 8);

    let (me, _) = app.get_auth("/api/v1/auth/me", &owner).await;
    assert_eq!(me["role"], "org_admin");
    assert_eq!(me["user"]["organization_approved"], true);

    let member = app.signup("grace@test.com").await;
    let (_, status) = app
        .post_auth(
            &format!("/api/v1/organizations/{org_id}/join"),
            &member,
            &json!({ "access_code": "WRONG123" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (joined, status) = app
        .post_auth(
            &format!("/api/v1/organizations/{org_id}/join"),
            &member,
            &json!({ "access_code": code.to_lowercase() }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(joined["organization_id"], org_id);
    assert_eq!(joined["organization_approved"], false);

    // Pending members act without the organization.
    let member = app.relogin("grace@test.com").await;
    let (_, status) = app.get_auth(&format!("/api/v1/organizations/{org_id}"), &member).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (users, status) = app.get_auth("/api/v1/admin/users", &owner).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 2);

    let member_id = joined["id"].as_str().unwrap();
    let (approved, status) = app
        .post_auth(&format!("/api/v1/admin/users/{member_id}/approve"), &owner, &json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["organization_approved"], true);

    let member = app.relogin("grace@test.com").await;
    let (view, status) = app.get_auth(&format!("/api/v1/organizations/{org_id}"), &member).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["name"], "Clinic");
    assert!(view.get("access_code").is_none());

    let (view, _) = app.get_auth(&format!("/api/v1/organizations/{org_id}"), &owner).await;
    assert_eq!(view["access_code"], code);

    common::cleanup(app).await;
}

#[tokio::test]
async fn org_admin_can_rotate_access_code() {
    let app = common::spawn_app().await;
    let owner = app.signup("ada@test.com").await;
    let (org, owner) = app.create_organization("ada@test.com", &owner, "Clinic").await;
    let org_id = org["id"].as_str().unwrap();

    let (rotated, status) = app
        .post_auth(&format!("/api/v1/organizations/{org_id}/access-code"), &owner, &json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(rotated["access_code"], org["access_code"]);

    let outsider = app.signup("mallory@test.com").await;
    let (_, status) = app
        .post_auth(&format!("/api/v1/organizations/{org_id}/access-code"), &outsider, &json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    common::cleanup(app).await;
}

#[tokio::test]
async fn role_changes_respect_admin_level() {
    let app = common::spawn_app().await;
    let root = app.signup(common::SUPER_ADMIN_EMAIL).await;
    let plain = app.signup("grace@test.com").await;
    let grace_id = app.user_id(&plain).await;

    let (_, status) = app
        .put_auth(
            &format!("/api/v1/admin/users/{grace_id}/role"),
            &plain,
            &json!({ "role": "super_admin" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (changed, status) = app
        .put_auth(
            &format!("/api/v1/admin/users/{grace_id}/role"),
            &root,
            &json!({ "role": "org_admin" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(changed["role"], "org_admin");

    let (users, _) = app.get_auth("/api/v1/admin/users", &root).await;
    let grace = users
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["email"] == "grace@test.com")
        .unwrap();
    assert_eq!(grace["role"], "org_admin");

    // An org admin may not grant super admin.
    let org_admin = app.relogin("grace@test.com").await;
    let (_, status) = app
        .put_auth(
            &format!("/api/v1/admin/users/{grace_id}/role"),
            &org_admin,
            &json!({ "role": "super_admin" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    common::cleanup(app).await;
}

#[tokio::test]
async fn org_admin_cannot_demote_a_super_admin_member() {
    let app = common::spawn_app().await;
    let ada = app.signup("ada@test.com").await;
    let (org, ada) = app.create_organization("ada@test.com", &ada, "Clinic").await;
    let org_id = org["id"].as_str().unwrap();

    let root = app.signup(common::SUPER_ADMIN_EMAIL).await;
    let root_id = app.user_id(&root).await;
    let (_, status) = app
        .post_auth(
            &format!("/api/v1/organizations/{org_id}/join"),
            &root,
            &json!({ "access_code": org["access_code"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, status) = app
        .post_auth(&format!("/api/v1/admin/users/{root_id}/approve"), &ada, &json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, status) = app
        .put_auth(
            &format!("/api/v1/admin/users/{root_id}/role"),
            &ada,
            &json!({ "role": "user" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let root = app.relogin(common::SUPER_ADMIN_EMAIL).await;
    let (me, _) = app.get_auth("/api/v1/auth/me", &root).await;
    assert_eq!(me["role"], "super_admin");

    common::cleanup(app).await;
}

#[tokio::test]
async fn changing_organization_drops_admin_role() {
    let app = common::spawn_app().await;
    let ada = app.signup("ada@test.com").await;
    let (first, _) = app.create_organization("ada@test.com", &ada, "Clinic").await;
    let first_id = first["id"].as_str().unwrap();
    let bob = app.signup("bob@test.com").await;
    let (second, bob) = app.create_organization("bob@test.com", &bob, "Northside").await;
    let second_id = second["id"].as_str().unwrap();

    let ada = app.relogin("ada@test.com").await;
    let ada_id = app.user_id(&ada).await;
    let (_, status) = app
        .post_auth(
            &format!("/api/v1/organizations/{second_id}/join"),
            &ada,
            &json!({ "access_code": second["access_code"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, status) = app
        .post_auth(&format!("/api/v1/admin/users/{ada_id}/approve"), &bob, &json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let ada = app.relogin("ada@test.com").await;
    let (me, _) = app.get_auth("/api/v1/auth/me", &ada).await;
    assert_eq!(me["role"], "user");

    let (view, status) = app
        .get_auth(&format!("/api/v1/organizations/{second_id}"), &ada)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(view.get("access_code").is_none());

    for org_id in [first_id, second_id] {
        let (_, status) = app
            .post_auth(&format!("/api/v1/organizations/{org_id}/access-code"), &ada, &json!({}))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    common::cleanup(app).await;
}

#[tokio::test]
async fn super_admin_manages_organizations_and_membership() {
    let app = common::spawn_app().await;
    let root = app.signup(common::SUPER_ADMIN_EMAIL).await;
    let member = app.signup("grace@test.com").await;
    let member_id = app.user_id(&member).await;

    let (org, status) = app
        .post_auth("/api/v1/admin/organizations", &root, &json!({ "name": "Northside" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let org_id = org["id"].as_str().unwrap();

    let (listed, _) = app.get_auth("/api/v1/admin/organizations", &root).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (_, status) = app.get_auth("/api/v1/admin/organizations", &member).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (moved, status) = app
        .put_auth(
            &format!("/api/v1/admin/users/{member_id}/organization"),
            &root,
            &json!({ "organization_id": org_id, "approved": true }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["organization_id"], org_id);
    assert_eq!(moved["organization_approved"], true);

    app.create_appointment(
        &member,
        &appointment("Visit", "2025-05-01T09:00:00Z", "2025-05-01T10:00:00Z"),
    )
    .await;
    let (all, status) = app.get_auth("/api/v1/admin/appointments", &root).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all[0]["user_name"], "grace");

    let (_, status) = app.get_auth("/api/v1/admin/appointments", &member).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (events, status) = app.get_auth("/api/v1/admin/audit?limit=10", &root).await;
    assert_eq!(status, StatusCode::OK);
    let actions: Vec<&str> = events
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action"].as_str().unwrap())
        .collect();
    assert!(actions.contains(&"organization.created"));
    assert!(actions.contains(&"user.organization_changed"));

    common::cleanup(app).await;
}

// ── Analytics ───────────────────────────────────────────────────

#[tokio::test]
async fn summary_histogram_counts_every_appointment() {
    let app = common::spawn_app().await;
    let token = app.signup("ada@test.com").await;

    // 2025-05-04 is a Sunday.
    for (start, end) in [
        ("2025-05-04T09:00:00Z", "2025-05-04T09:30:00Z"),
        ("2025-05-04T11:00:00Z", "2025-05-04T12:00:00Z"),
        ("2025-05-06T09:00:00Z", "2025-05-06T10:30:00Z"),
    ] {
        app.create_appointment(&token, &appointment("Visit", start, end)).await;
    }

    let (summary, status) = app.get_auth("/api/v1/analytics/summary", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["total_appointments"], 3);
    assert_eq!(summary["average_duration"], 60);
    assert_eq!(summary["busiest_day"], "Sunday");

    let by_day = summary["appointments_by_day"].as_object().unwrap();
    assert_eq!(by_day.len(), 7);
    let total: u64 = by_day.values().map(|v| v.as_u64().unwrap()).sum();
    assert_eq!(total, 3);
    assert_eq!(by_day["Tuesday"], 1);

    common::cleanup(app).await;
}

#[tokio::test]
async fn financial_analytics_sums_match_appointments() {
    let app = common::spawn_app().await;
    let token = app.signup("ada@test.com").await;
    let (org, token) = app.create_organization("ada@test.com", &token, "Clinic").await;
    let org_id = org["id"].as_str().unwrap();
    let ada_id = app.user_id(&token).await;

    let (location, _) = app
        .post_auth("/api/v1/locations", &token, &json!({ "name": "Downtown" }))
        .await;
    let location_id = location["id"].as_str().unwrap();

    for (price, location, assigned) in [
        (json!(80), json!(location_id), json!(ada_id)),
        (json!(20), Value::Null, Value::Null),
        (json!(0), json!(location_id), json!(ada_id)),
        (Value::Null, Value::Null, json!(ada_id)),
    ] {
        app.create_appointment(
            &token,
            &json!({
                "title": "Visit",
                "start_time": "2025-05-01T09:00:00Z",
                "end_time": "2025-05-01T10:00:00Z",
                "price": price,
                "location_id": location,
                "assigned_to_user_id": assigned
            }),
        )
        .await;
    }

    let (report, status) = app
        .get_auth(&format!("/api/v1/analytics/financial?organizationId={org_id}"), &token)
        .await;
    assert_eq!(status, StatusCode::OK, "{report}");
    assert_eq!(report["totalRevenue"].as_f64(), Some(100.0));
    assert_eq!(sum_revenue(&report["byLocation"]), 100.0);
    assert_eq!(sum_revenue(&report["byUser"]), 100.0);
    assert_eq!(report["period"]["startDate"], "all time");
    assert_eq!(report["period"]["endDate"], "present");

    let downtown = report["byLocation"]
        .as_array()
        .unwrap()
        .iter()
        .find(|l| l["id"] == location_id)
        .unwrap();
    assert_eq!(downtown["name"], "Downtown");
    assert_eq!(downtown["revenue"].as_f64(), Some(80.0));

    let unassigned = report["byUser"]
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["id"] == "unassigned")
        .unwrap();
    assert_eq!(unassigned["revenue"].as_f64(), Some(20.0));

    let (windowed, _) = app
        .get_auth(
            &format!("/api/v1/analytics/financial?organizationId={org_id}&startDate=2025-06-01"),
            &token,
        )
        .await;
    assert_eq!(windowed["totalRevenue"].as_f64(), Some(0.0));
    assert_eq!(windowed["period"]["startDate"], "2025-06-01");

    let outsider = app.signup("mallory@test.com").await;
    let (_, status) = app
        .get_auth(&format!("/api/v1/analytics/financial?organizationId={org_id}"), &outsider)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    common::cleanup(app).await;
}

#[tokio::test]
async fn organization_report_covers_the_default_window() {
    let app = common::spawn_app().await;
    let token = app.signup("ada@test.com").await;
    let (org, token) = app.create_organization("ada@test.com", &token, "Clinic").await;
    let org_id = org["id"].as_str().unwrap();

    let day = Utc::now().duration_trunc(Duration::days(1)).unwrap();
    for offset in [10, 10, 200] {
        let start = day - Duration::days(offset);
        let end = start + Duration::minutes(60);
        app.create_appointment(&token, &appointment("Visit", &start.to_rfc3339(), &end.to_rfc3339()))
            .await;
    }

    let (report, status) = app
        .get_auth(&format!("/api/v1/analytics/organizations/{org_id}?interval=week"), &token)
        .await;
    assert_eq!(status, StatusCode::OK, "{report}");
    assert_eq!(report["organization_name"], "Clinic");
    assert_eq!(report["metrics"]["total"], 2);
    assert_eq!(report["metrics"]["completed"], 2);
    let bucketed: u64 = report["time_series"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["count"].as_u64().unwrap())
        .sum();
    assert_eq!(bucketed, 2);

    let (_, status) = app
        .get_auth(
            &format!("/api/v1/analytics/organizations/{org_id}?start=2025-05-10&end=2025-05-01"),
            &token,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let outsider = app.signup("mallory@test.com").await;
    let (_, status) = app
        .get_auth(&format!("/api/v1/analytics/organizations/{org_id}"), &outsider)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    common::cleanup(app).await;
}

#[tokio::test]
async fn user_report_is_self_service() {
    let app = common::spawn_app().await;
    let token = app.signup("ada@test.com").await;
    let ada_id = app.user_id(&token).await;
    let other = app.signup("mallory@test.com").await;

    let (report, status) = app
        .get_auth(&format!("/api/v1/analytics/users/{ada_id}"), &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["user_name"], "ada");
    assert_eq!(report["metrics"]["total"], 0);

    let (_, status) = app
        .get_auth(&format!("/api/v1/analytics/users/{ada_id}"), &other)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, status) = app
        .get_auth(
            &format!("/api/v1/analytics/users/{ada_id}?start=0001-01-01&end=9999-12-31"),
            &token,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    common::cleanup(app).await;
}

// ── Chat ────────────────────────────────────────────────────────

#[tokio::test]
async fn chat_function_dispatch_and_errors() {
    let app = common::spawn_app().await;
    let token = app.signup("ada@test.com").await;
    let user_id = app.user_id(&token).await;

    let call = |name: &str, arguments: Value| {
        json!({
            "message": {
                "role": "assistant",
                "content": null,
                "function_call": { "name": name, "arguments": arguments.to_string() }
            }
        })
    };

    let (body, status) = app
        .post_auth("/api/v1/chat/function", &token, &call("deleteEverything", json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("deleteEverything"));

    let (info, status) = app
        .post_auth("/api/v1/chat/function", &token, &call("getAppInfo", json!({})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["name"], "getAppInfo");
    assert_eq!(info["result"]["name"], "BookSmartly");

    let (created, status) = app
        .post_auth(
            "/api/v1/chat/function",
            &token,
            &call(
                "createAppointment",
                json!({
                    "userId": user_id,
                    "title": "Booked by chat",
                    "startTime": "2025-05-01T09:00:00Z",
                    "endTime": "2025-05-01T10:00:00Z"
                }),
            ),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let appointment_id = created["result"]["id"].as_str().unwrap().to_string();
    assert_eq!(created["result"]["title"], "Booked by chat");

    let (failed, status) = app
        .post_auth(
            "/api/v1/chat/function",
            &token,
            &call(
                "cancelAppointment",
                json!({ "id": uuid::Uuid::new_v4(), "userId": user_id }),
            ),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(failed["result"]["error"], true);
    assert!(
        failed["result"]["message"]
            .as_str()
            .unwrap()
            .starts_with("Failed to execute cancelAppointment")
    );

    let (cancelled, _) = app
        .post_auth(
            "/api/v1/chat/function",
            &token,
            &call("cancelAppointment", json!({ "id": appointment_id, "userId": user_id })),
        )
        .await;
    assert_eq!(cancelled["result"]["success"], true);

    let (_, status) = app
        .get_auth(&format!("/api/v1/appointments/{appointment_id}"), &token)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    common::cleanup(app).await;
}

#[tokio::test]
async fn chat_function_cannot_act_for_someone_else() {
    let app = common::spawn_app().await;
    let owner = app.signup("ada@test.com").await;
    let owner_id = app.user_id(&owner).await;
    let created = app
        .create_appointment(
            &owner,
            &appointment("Private", "2025-05-01T09:00:00Z", "2025-05-01T10:00:00Z"),
        )
        .await;
    let intruder = app.signup("mallory@test.com").await;

    let (outcome, status) = app
        .post_auth(
            "/api/v1/chat/function",
            &intruder,
            &json!({
                "message": {
                    "role": "assistant",
                    "content": null,
                    "function_call": {
                        "name": "cancelAppointment",
                        "arguments": json!({ "id": created["id"], "userId": owner_id }).to_string()
                    }
                }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["result"]["error"], true);

    let (_, status) = app
        .get_auth(&format!("/api/v1/appointments/{}", created["id"].as_str().unwrap()), &owner)
        .await;
    assert_eq!(status, StatusCode::OK);

    common::cleanup(app).await;
}

#[tokio::test]
async fn chat_conversation_runs_the_requested_function() {
    let app = common::spawn_app().await;
    let token = app.signup("ada@test.com").await;

    let (conversation, status) = app
        .post_auth(
            "/api/v1/chat",
            &token,
            &json!({ "messages": [{ "role": "user", "content": "What can you do?" }] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{conversation}");
    assert_eq!(conversation["initialResponse"]["function_call"]["name"], "getAppInfo");
    assert_eq!(conversation["functionCall"]["result"]["version"], "1.0.0");
    assert_eq!(conversation["finalResponse"]["content"], "done");

    let (_, status) = app
        .post_auth("/api/v1/chat", &token, &json!({ "messages": [] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    common::cleanup(app).await;
}

#[tokio::test]
async fn chat_is_rate_limited_per_user() {
    let app = common::spawn_app_with(|c| c.chat_rate_limit = 1).await;
    let ada = app.signup("ada@test.com").await;
    let grace = app.signup("grace@test.com").await;

    let message = json!({
        "message": {
            "role": "assistant",
            "content": null,
            "function_call": { "name": "getAppInfo", "arguments": "" }
        }
    });
    let (_, status) = app.post_auth("/api/v1/chat/function", &ada, &message).await;
    assert_eq!(status, StatusCode::OK);
    let (_, status) = app.post_auth("/api/v1/chat/function", &ada, &message).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    let (_, status) = app.post_auth("/api/v1/chat/function", &grace, &message).await;
    assert_eq!(status, StatusCode::OK);

    common::cleanup(app).await;
}

#[tokio::test]
async fn chat_without_llm_is_unavailable() {
    let app = common::spawn_app_with(|c| c.llm = None).await;
    let token = app.signup("ada@test.com").await;

    let (_, status) = app
        .post_auth(
            "/api/v1/chat",
            &token,
            &json!({ "messages": [{ "role": "user", "content": "hi" }] }),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    common::cleanup(app).await;
}

// ── Invoicing ───────────────────────────────────────────────────

#[tokio::test]
async fn single_invoice_needs_a_client_email() {
    let app = common::spawn_app().await;
    let token = app.signup("ada@test.com").await;

    let appt = app
        .create_appointment(
            &token,
            &json!({
                "title": "Session",
                "start_time": "2025-05-01T09:00:00Z",
                "end_time": "2025-05-01T10:00:00Z",
                "client_name": "Alan Turing",
                "price": 50
            }),
        )
        .await;
    let id = appt["id"].as_str().unwrap();

    let (body, status) = app
        .post_auth("/api/v1/invoices/send", &token, &json!({ "appointment_id": id }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Client must have an email");

    app.post_auth(
        "/api/v1/clients",
        &token,
        &json!({ "name": "Alan Turing", "email": "alan@example.com" }),
    )
    .await;

    let (sent, status) = app
        .post_auth("/api/v1/invoices/send", &token, &json!({ "appointment_id": id }))
        .await;
    assert_eq!(status, StatusCode::OK, "{sent}");
    assert_eq!(sent["status"], "Invoice Sent");
    assert_eq!(sent["invoiceId"], "INV1");

    let (billed, _) = app.get_auth(&format!("/api/v1/appointments/{id}"), &token).await;
    assert_eq!(billed["billing_status"], "billed");

    common::cleanup(app).await;
}

#[tokio::test]
async fn bulk_invoice_records_the_sent_invoice() {
    let app = common::spawn_app().await;
    let token = app.signup("ada@test.com").await;
    let other = app.signup("mallory@test.com").await;

    let mut ids = Vec::new();
    for start in ["2025-05-01T09:00:00Z", "2025-05-08T09:00:00Z"] {
        let end = start.replace("T09", "T10");
        let appt = app
            .create_appointment(
                &token,
                &json!({
                    "title": "Session",
                    "start_time": start,
                    "end_time": end,
                    "client_name": "Grace Hopper",
                    "price": 50
                }),
            )
            .await;
        ids.push(appt["id"].clone());
    }

    let (_, status) = app
        .post_auth(
            "/api/v1/invoices/bulk",
            &other,
            &json!({ "appointment_ids": ids, "client_name": "Grace Hopper", "amount": 100 }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (sent, status) = app
        .post_auth(
            "/api/v1/invoices/bulk",
            &token,
            &json!({ "appointment_ids": ids, "client_name": "Grace Hopper", "amount": 100 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{sent}");
    assert_eq!(sent["squareInvoiceId"], "INV1");
    assert_eq!(
        sent["squareInvoiceUrl"],
        "https://squareupsandbox.com/dashboard/invoices/INV1"
    );

    let (invoices, _) = app.get_auth("/api/v1/invoices", &token).await;
    let invoices = invoices.as_array().unwrap();
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0]["status"], "sent");
    assert_eq!(invoices[0]["id"], sent["invoiceId"]);
    assert_eq!(invoices[0]["appointment_ids"].as_array().unwrap().len(), 2);

    let (status_view, status) = app.get_auth("/api/v1/invoices/square/INV1", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(status_view["status"], "UNPAID");
    assert_eq!(status_view["paymentStatus"], 5000);

    let (_, status) = app.get_auth("/api/v1/invoices/square/missing", &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    common::cleanup(app).await;
}

#[tokio::test]
async fn invoicing_without_square_is_unavailable() {
    let app = common::spawn_app_with(|c| c.square = None).await;
    let token = app.signup("ada@test.com").await;

    let (_, status) = app
        .post_auth(
            "/api/v1/invoices/send",
            &token,
            &json!({ "appointment_id": uuid::Uuid::new_v4() }),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (invoices, status) = app.get_auth("/api/v1/invoices", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert!(invoices.as_array().unwrap().is_empty());

    common::cleanup(app).await;
}
