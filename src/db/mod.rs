pub mod appointment_types;
pub mod appointments;
pub mod audit;
pub mod clients;
pub mod invoices;
pub mod locations;
pub mod organizations;
pub mod refresh_tokens;
pub mod user_roles;
pub mod users;
