//! Data Transfer Objects (DTOs) for API requests and responses

pub mod common;
pub mod credits;
pub mod generation;
pub mod report;

pub use common::*;
pub use credits::*;
pub use generation::*;
pub use report::*;
