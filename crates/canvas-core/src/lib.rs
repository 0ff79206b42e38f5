//! Canvas Billing Core Library
//!
//! This crate provides the foundational types, traits, and error handling
//! for the Canvas Billing system. It includes:
//!
//! - Domain models (User, LedgerTransaction, GenerationRequest, Report)
//! - The immutable image catalog (styles, colors, sizes and their cost)
//! - Store and repository traits, including the atomic unit seam
//! - Unified error handling with HTTP response mapping
//! - Application configuration

pub mod catalog;
pub mod config;
pub mod error;
pub mod models;
pub mod traits;

pub use catalog::Catalog;
pub use config::AppConfig;
pub use error::AppError;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
