//! Generation request lifecycle
//!
//! Drives one request from validation to a terminal state:
//!
//! 1. validate input against the catalog and price it
//! 2. deduct credits and create the request in `Pending` (one atomic unit)
//! 3. call the generator, outside any unit
//! 4. on success mark `Completed`; on failure refund, then mark `Failed`

use canvas_core::{
    models::{GenerationOutcome, GenerationRequest, ImageModel},
    traits::{GenerationRequestRepository, ImageGenerator, LedgerStore},
    AppError, AppResult,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::catalog_cache::CatalogCache;
use crate::constants::{GENERATION_TIMEOUT_SECS, MAX_PROMPT_CHARS};
use crate::ledger::{CreditLedger, RefundOutcome};

/// Raw generation request input
///
/// Every field is optional here so that absent and empty values are both
/// reported as missing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationInput {
    pub user_id: Option<String>,
    pub model: Option<String>,
    pub style: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub prompt: Option<String>,
}

/// Successful generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationReceipt {
    pub request_id: Uuid,
    pub deducted_credits: i64,
    pub image_url: String,
}

/// Orchestrates one generation request end to end
pub struct GenerationLifecycle<S: LedgerStore> {
    store: Arc<S>,
    ledger: Arc<CreditLedger<S>>,
    catalog: Arc<CatalogCache>,
    generator: Arc<dyn ImageGenerator>,
    timeout: Duration,
}

impl<S: LedgerStore> GenerationLifecycle<S> {
    /// Create a new lifecycle
    pub fn new(
        store: Arc<S>,
        ledger: Arc<CreditLedger<S>>,
        catalog: Arc<CatalogCache>,
        generator: Arc<dyn ImageGenerator>,
    ) -> Self {
        Self {
            store,
            ledger,
            catalog,
            generator,
            timeout: Duration::from_secs(GENERATION_TIMEOUT_SECS),
        }
    }

    /// Bound each generator call by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validate and price the input, touching no state
    pub fn prepare(&self, input: GenerationInput) -> AppResult<GenerationRequest> {
        let mut missing = Vec::new();
        let mut required = |value: Option<String>, name: &'static str| {
            match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
                Some(v) => v,
                None => {
                    missing.push(name);
                    String::new()
                }
            }
        };

        let user_id = required(input.user_id, "userId");
        let model = required(input.model, "model");
        let style = required(input.style, "style");
        let color = required(input.color, "color");
        let size = required(input.size, "size");

        if !missing.is_empty() {
            return Err(AppError::MissingField(missing.join(", ")));
        }

        let model = ImageModel::from_str(&model)
            .ok_or_else(|| AppError::Validation(format!("Invalid model: {}", model)))?;

        let cost = self.catalog.current().price(&style, &color, &size)?;

        let prompt = input.prompt.filter(|p| !p.trim().is_empty());
        if let Some(p) = &prompt {
            if p.chars().count() > MAX_PROMPT_CHARS {
                return Err(AppError::Validation(format!(
                    "Prompt exceeds {} characters",
                    MAX_PROMPT_CHARS
                )));
            }
        }

        Ok(GenerationRequest::pending(
            user_id, model, style, color, size, prompt, cost,
        ))
    }

    /// Handle one generation request
    ///
    /// # Errors
    ///
    /// - `MissingField` / `Validation` before anything is charged
    /// - `UserNotFound` / `InsufficientCredits` from the deduction
    /// - `GenerationFailed` once the generator failed and the charge was refunded
    /// - `RefundFailed` if the generator failed and the refund could not be written
    #[instrument(skip(self, input))]
    pub async fn create(&self, input: GenerationInput) -> AppResult<GenerationReceipt> {
        let request = self.prepare(input)?;
        let request = self.ledger.deduct(request).await?;

        info!(
            request_id = %request.id,
            user_id = %request.user_id,
            model = %request.model,
            cost = request.cost,
            "Generation request charged"
        );

        match self.invoke_generator(request.model).await {
            GenerationOutcome::Success { image_url } => {
                self.store
                    .mark_completed(request.id, &image_url)
                    .await
                    .map_err(|e| finalize_error(request.id, "completed", e))?;

                info!(request_id = %request.id, "Generation completed");

                Ok(GenerationReceipt {
                    request_id: request.id,
                    deducted_credits: request.cost,
                    image_url,
                })
            }
            GenerationOutcome::Failure { error: reason } => {
                warn!(request_id = %request.id, "Generation failed: {}", reason);
                self.refund_failed(&request, reason).await
            }
        }
    }

    async fn refund_failed(
        &self,
        request: &GenerationRequest,
        reason: String,
    ) -> AppResult<GenerationReceipt> {
        match self
            .ledger
            .refund(&request.user_id, request.cost, request.id)
            .await
        {
            Ok(RefundOutcome::Refunded { .. }) | Ok(RefundOutcome::AlreadyRefunded) => {}
            Err(e) => {
                error!(
                    request_id = %request.id,
                    user_id = %request.user_id,
                    cost = request.cost,
                    "Refund failed, credits remain deducted: {}",
                    e
                );
                return Err(AppError::RefundFailed {
                    request_id: request.id,
                    reason: e.to_string(),
                });
            }
        }

        self.store
            .mark_failed(request.id, &reason)
            .await
            .map_err(|e| finalize_error(request.id, "failed", e))?;

        Err(AppError::GenerationFailed {
            request_id: request.id,
            reason,
        })
    }

    async fn invoke_generator(&self, model: ImageModel) -> GenerationOutcome {
        match tokio::time::timeout(self.timeout, self.generator.generate(model)).await {
            Ok(outcome) => outcome,
            Err(_) => GenerationOutcome::failure(format!(
                "Generation timed out after {} ms",
                self.timeout.as_millis()
            )),
        }
    }

    /// Look up a generation request
    #[instrument(skip(self))]
    pub async fn find(&self, id: Uuid) -> AppResult<GenerationRequest> {
        self.store
            .find_generation_request(id)
            .await?
            .ok_or_else(|| AppError::GenerationRequestNotFound(id.to_string()))
    }
}

fn finalize_error(request_id: Uuid, status: &str, err: AppError) -> AppError {
    error!(%request_id, "Failed to mark generation request {}: {}", status, err);
    AppError::Internal(format!(
        "Failed to mark generation request {} as {}: {}",
        request_id, status, err
    ))
}
