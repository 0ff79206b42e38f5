//! Generation catalog
//!
//! Read-only lookup of valid style, color and size identifiers plus the
//! credit cost of each size.

use crate::error::AppError;
use crate::AppResult;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Styles available in a fresh deployment
pub const DEFAULT_STYLES: [&str; 6] = [
    "anime",
    "realistic",
    "sketch",
    "cyberpunk",
    "watercolor",
    "oil-painting",
];

/// Colors available in a fresh deployment
pub const DEFAULT_COLORS: [&str; 5] = ["vibrant", "monochrome", "neon", "pastel", "earth-tones"];

/// Sizes and their credit costs in a fresh deployment
pub const DEFAULT_SIZES: [(&str, i64); 3] = [("512x512", 1), ("1024x1024", 3), ("1024x1792", 4)];

/// Immutable catalog snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub styles: BTreeSet<String>,
    pub colors: BTreeSet<String>,
    pub sizes: BTreeMap<String, i64>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(
            DEFAULT_STYLES.iter().copied(),
            DEFAULT_COLORS.iter().copied(),
            DEFAULT_SIZES.iter().copied(),
        )
    }
}

impl Catalog {
    pub fn new<S, C, Z, T>(styles: S, colors: C, sizes: Z) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
        Z: IntoIterator<Item = (T, i64)>,
        T: Into<String>,
    {
        Self {
            styles: styles.into_iter().map(Into::into).collect(),
            colors: colors.into_iter().map(Into::into).collect(),
            sizes: sizes.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn is_valid_style(&self, style: &str) -> bool {
        self.styles.contains(style)
    }

    pub fn is_valid_color(&self, color: &str) -> bool {
        self.colors.contains(color)
    }

    /// Credit cost of `size`, `None` for unknown sizes
    pub fn cost_for(&self, size: &str) -> Option<i64> {
        self.sizes.get(size).copied()
    }

    /// Validate style, color and size, returning the cost of `size`
    pub fn price(&self, style: &str, color: &str, size: &str) -> AppResult<i64> {
        if !self.is_valid_style(style) {
            return Err(AppError::Validation(format!("Invalid style: {}", style)));
        }
        if !self.is_valid_color(color) {
            return Err(AppError::Validation(format!("Invalid color: {}", color)));
        }
        self.cost_for(size)
            .ok_or_else(|| AppError::Validation(format!("Invalid size: {}", size)))
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty() && self.colors.is_empty() && self.sizes.is_empty()
    }
}
