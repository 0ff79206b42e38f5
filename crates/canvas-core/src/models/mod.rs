//! Domain models for Canvas Billing
//!
//! This module contains all the core domain models used throughout the application.

pub mod generation;
pub mod report;
pub mod transaction;
pub mod user;

pub use generation::{
    GenerationOutcome, GenerationRequest, GenerationStatus, ImageModel, MODEL_A_PLACEHOLDER_URL,
    MODEL_B_PLACEHOLDER_URL,
};
pub use report::{percentage, Breakdown, CategoryStats, Report, ReportWindow, REPORT_WINDOW_DAYS};
pub use transaction::{LedgerTransaction, TransactionType};
pub use user::User;
