//! Simulated image generator
//!
//! Stands in for the real models: fails with a configurable probability and
//! otherwise returns the model's placeholder image.

use async_trait::async_trait;
use canvas_core::{
    models::{GenerationOutcome, ImageModel},
    traits::ImageGenerator,
};
use rand::Rng;
use tracing::debug;

use crate::constants::SIMULATED_FAILURE_RATE;

/// Placeholder generator
#[derive(Debug, Clone, Copy)]
pub struct SimulatedGenerator {
    failure_rate: f64,
}

impl Default for SimulatedGenerator {
    fn default() -> Self {
        Self::new(SIMULATED_FAILURE_RATE)
    }
}

impl SimulatedGenerator {
    /// `failure_rate` is clamped to `[0, 1]`
    pub fn new(failure_rate: f64) -> Self {
        Self {
            failure_rate: if failure_rate.is_nan() {
                0.0
            } else {
                failure_rate.clamp(0.0, 1.0)
            },
        }
    }

    pub fn failure_rate(&self) -> f64 {
        self.failure_rate
    }
}

#[async_trait]
impl ImageGenerator for SimulatedGenerator {
    async fn generate(&self, model: ImageModel) -> GenerationOutcome {
        let roll: f64 = rand::thread_rng().gen();

        if roll < self.failure_rate {
            debug!(%model, roll, "Simulated generation failure");
            GenerationOutcome::failure(format!("Simulated failure for {}", model))
        } else {
            GenerationOutcome::success(model.placeholder_url())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvas_core::models::{MODEL_A_PLACEHOLDER_URL, MODEL_B_PLACEHOLDER_URL};

    #[tokio::test]
    async fn test_never_fails_at_zero_rate() {
        let generator = SimulatedGenerator::new(0.0);
        for _ in 0..100 {
            assert_eq!(
                generator.generate(ImageModel::ModelA).await,
                GenerationOutcome::success(MODEL_A_PLACEHOLDER_URL)
            );
        }
        assert_eq!(
            generator.generate(ImageModel::ModelB).await,
            GenerationOutcome::success(MODEL_B_PLACEHOLDER_URL)
        );
    }

    #[tokio::test]
    async fn test_always_fails_at_full_rate() {
        let generator = SimulatedGenerator::new(1.0);
        for _ in 0..100 {
            assert!(!generator.generate(ImageModel::ModelB).await.is_success());
        }
    }

    #[test]
    fn test_rate_is_clamped() {
        assert_eq!(SimulatedGenerator::new(7.0).failure_rate(), 1.0);
        assert_eq!(SimulatedGenerator::new(-1.0).failure_rate(), 0.0);
        assert_eq!(SimulatedGenerator::default().failure_rate(), 0.05);
    }
}
