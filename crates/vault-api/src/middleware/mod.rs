//! Request middleware

pub mod admin_key;

pub use admin_key::require_admin_key;
