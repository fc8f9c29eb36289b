mod appointment;
mod appointment_type;
mod audit_event;
mod client;
mod invoice;
mod location;
mod organization;
mod refresh_token;
mod user;
mod user_role;

pub use appointment::{Appointment, AppointmentStatus, BillingStatus};
pub use appointment_type::AppointmentType;
pub use audit_event::AuditEvent;
pub use client::Client;
pub use invoice::{Invoice, InvoiceStatus};
pub use location::Location;
pub use organization::Organization;
pub use refresh_token::RefreshToken;
pub use user::User;
pub use user_role::{Role, UserRole};
