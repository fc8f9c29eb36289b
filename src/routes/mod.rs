pub mod admin;
pub mod analytics;
pub mod appointment_types;
pub mod appointments;
pub mod auth;
pub mod chat;
pub mod clients;
pub mod invoices;
pub mod locations;
pub mod organizations;

use axum::Router;
use axum::routing::{get, post, put};

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // Auth
        .route("/api/v1/auth/register", post(auth::register))
        .route("/api/v1/auth/login", post(auth::login))
        .route("/api/v1/auth/refresh", post(auth::refresh))
        .route("/api/v1/auth/logout", post(auth::logout))
        .route("/api/v1/auth/me", get(auth::me))
        // Appointments
        .route(
            "/api/v1/appointments",
            get(appointments::list).post(appointments::create),
        )
        .route(
            "/api/v1/appointments/{id}",
            get(appointments::get)
                .put(appointments::update)
                .delete(appointments::delete),
        )
        .route(
            "/api/v1/appointments/{id}/status",
            put(appointments::update_status),
        )
        // Clients
        .route("/api/v1/clients", get(clients::list).post(clients::create))
        .route("/api/v1/clients/import", post(clients::import))
        .route(
            "/api/v1/clients/{id}",
            get(clients::get).put(clients::update).delete(clients::delete),
        )
        // Organizations
        .route("/api/v1/organizations", post(organizations::create))
        .route("/api/v1/organizations/{id}", get(organizations::get))
        .route("/api/v1/organizations/{id}/join", post(organizations::join))
        .route(
            "/api/v1/organizations/{id}/access-code",
            post(organizations::regenerate_access_code),
        )
        // Catalog
        .route(
            "/api/v1/appointment-types",
            get(appointment_types::list).post(appointment_types::create),
        )
        .route(
            "/api/v1/appointment-types/{id}",
            put(appointment_types::update).delete(appointment_types::delete),
        )
        .route(
            "/api/v1/locations",
            get(locations::list).post(locations::create),
        )
        .route(
            "/api/v1/locations/{id}",
            put(locations::update).delete(locations::delete),
        )
        // Admin
        .route("/api/v1/admin/status", get(admin::status))
        .route("/api/v1/admin/users", get(admin::list_users))
        .route("/api/v1/admin/users/{id}/role", put(admin::update_role))
        .route(
            "/api/v1/admin/users/{id}/organization",
            put(admin::update_organization),
        )
        .route("/api/v1/admin/users/{id}/approve", post(admin::approve))
        .route(
            "/api/v1/admin/organizations",
            get(admin::list_organizations).post(admin::create_organization),
        )
        .route("/api/v1/admin/appointments", get(admin::list_appointments))
        .route("/api/v1/admin/audit", get(admin::list_audit_events))
        // Analytics
        .route("/api/v1/analytics/summary", get(analytics::summary))
        .route("/api/v1/analytics/financial", get(analytics::financial))
        .route(
            "/api/v1/analytics/organizations/{id}",
            get(analytics::organization),
        )
        .route("/api/v1/analytics/users/{id}", get(analytics::user))
        .route("/api/v1/analytics/locations/{id}", get(analytics::location))
        // Invoices
        .route("/api/v1/invoices", get(invoices::list))
        .route("/api/v1/invoices/send", post(invoices::send))
        .route("/api/v1/invoices/bulk", post(invoices::send_bulk))
        .route(
            "/api/v1/invoices/square/{square_invoice_id}",
            get(invoices::square_status),
        )
        // Chat
        .route("/api/v1/chat", post(chat::converse))
        .route("/api/v1/chat/function", post(chat::function))
}
