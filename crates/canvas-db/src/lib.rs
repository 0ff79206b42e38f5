//! Canvas Billing Database Layer
//!
//! This crate provides the storage backends for the Canvas Billing system.
//! It includes:
//!
//! - Connection pool management and embedded migrations with sqlx
//! - `PgStore`, implementing every repository trait and the atomic ledger unit
//!   on PostgreSQL row locks
//! - `MemoryStore`, the same contract held in process memory

pub mod memory;
pub mod pool;
pub mod repositories;

pub use memory::{MemoryStore, MemoryUnit};
pub use pool::{create_pool, health_check, run_migrations};
pub use repositories::{PgLedgerUnit, PgStore};

// Re-export commonly used types
pub use canvas_core::{AppError, AppResult};
pub use sqlx::PgPool;
