use serde_json::{Value, json};

pub const APP_NAME: &str = "BookSmartly";
pub const APP_VERSION: &str = "1.0.0";

/// Static description of the application for the assistant to draw on.
pub fn describe() -> Value {
    json!({
        "name": APP_NAME,
        "version": APP_VERSION,
        "routes": [
            { "path": "/", "description": "Home page with dashboard overview" },
            { "path": "/appointments", "description": "View and manage appointments" },
            { "path": "/calendar", "description": "Calendar view (day/week/month)" },
            { "path": "/clients", "description": "Client management and import" },
            { "path": "/analytics", "description": "Financial and appointment analytics" },
            { "path": "/admin", "description": "Admin settings and user management" },
            { "path": "/admin/users", "description": "User management" },
            { "path": "/admin/settings", "description": "Application settings" },
            { "path": "/admin/analytics", "description": "Advanced analytics for admins" }
        ],
        "features": [
            "Calendar views (day/week/month)",
            "Appointment creation, editing, and cancellation",
            "Client management and CSV import",
            "Role-based access control",
            "Financial analytics by organization, user, and location",
            "Square invoicing",
            "User management",
            "Organization management"
        ],
        "roles": [
            { "name": "super_admin", "description": "Full access to all features and organizations" },
            { "name": "org_admin", "description": "Full access to their organization" },
            { "name": "user", "description": "Limited access based on permissions" }
        ],
        "entities": [
            "users", "organizations", "user_roles", "appointments",
            "appointment_types", "locations", "clients", "invoices"
        ]
    })
}
