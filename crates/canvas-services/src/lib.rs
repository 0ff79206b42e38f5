//! Business logic services for Canvas Billing
//!
//! This crate contains the services that orchestrate credit accounting,
//! image generation and weekly reporting.
//!
//! # Architecture
//!
//! Services are designed to be composable and testable:
//! - Each service is generic over a `LedgerStore` backend
//! - Services are wrapped in Arc for safe sharing across async tasks
//! - All operations are instrumented with tracing
//! - Comprehensive error handling with AppError
//!
//! # Services
//!
//! - `CreditLedger` - Atomic deduct/refund and balance history
//! - `GenerationLifecycle` - One generation request end to end
//! - `SimulatedGenerator` - Placeholder image generator
//! - `CatalogCache` - Process-wide catalog snapshot
//! - `ReportService` - Weekly aggregation and anomaly detection
//! - `WeeklySchedule` - Monday 09:00 UTC trigger computation

pub mod aggregator;
pub mod anomaly;
pub mod atomic;
pub mod catalog_cache;
pub mod ledger;
pub mod lifecycle;
pub mod reporting;
pub mod schedule;
pub mod simulator;

pub use aggregator::ReportAccumulator;
pub use anomaly::{detect_anomalies, BASELINE_MESSAGE, NO_ANOMALIES_MESSAGE};
pub use atomic::{with_atomic_unit, AtomicOperation, RetryPolicy};
pub use catalog_cache::CatalogCache;
pub use ledger::{CreditHistory, CreditLedger, RefundOutcome};
pub use lifecycle::{GenerationInput, GenerationLifecycle, GenerationReceipt};
pub use reporting::ReportService;
pub use schedule::WeeklySchedule;
pub use simulator::SimulatedGenerator;

/// Business logic constants
pub mod constants {
    /// Attempts per atomic unit before a write conflict becomes fatal
    pub const ATOMIC_RETRY_ATTEMPTS: u32 = 5;

    /// Linear backoff step between conflicting attempts in milliseconds
    pub const ATOMIC_RETRY_BACKOFF_MS: u64 = 25;

    /// Upper bound on one simulator call in seconds
    pub const GENERATION_TIMEOUT_SECS: u64 = 30;

    /// Simulator failure probability
    pub const SIMULATED_FAILURE_RATE: f64 = 0.05;

    /// Longest prompt accepted
    pub const MAX_PROMPT_CHARS: usize = 2000;
}
