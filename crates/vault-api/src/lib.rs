//! # Vault API
//! 
//! Administrative HTTP surface: handlers, admin-key middleware, response envelope and router.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
