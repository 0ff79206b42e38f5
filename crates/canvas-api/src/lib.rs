//! API layer for Canvas Billing
//!
//! HTTP handlers for generation requests, credit balances and weekly reports.

#![forbid(unsafe_code)]
#![warn(clippy::all, missing_docs)]

pub mod dto;
pub mod handlers;
pub mod state;

pub use dto::ApiResponse;
pub use handlers::configure;
pub use state::AppState;
