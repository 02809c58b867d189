//! The metric record entity.
//!
//! One record is produced per completed external call (success or failure)
//! and persisted once to both storage tiers. Records are never mutated after
//! creation; they are only created and eventually deleted.

use serde::{Deserialize, Serialize};

use crate::errors::{CallStatsError, Result};
use crate::impl_domain_status_conversions;

/// Outcome of the external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Success,
    Error,
    Timeout,
}

impl_domain_status_conversions!(CallStatus {
    Success => "success",
    Error => "error",
    Timeout => "timeout",
});

impl CallStatus {
    /// Only `Success` counts towards the success rate.
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Shape of the prompt sent to the external service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    Text,
    Image,
    Audio,
    Document,
    Multimodal,
}

impl_domain_status_conversions!(InputFormat {
    Text => "text",
    Image => "image",
    Audio => "audio",
    Document => "document",
    Multimodal => "multimodal",
});

impl Default for InputFormat {
    fn default() -> Self {
        Self::Text
    }
}

/// Indexed columns that support equality lookups in the durable store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Provider,
    Model,
    Status,
}

impl_domain_status_conversions!(Dimension {
    Provider => "provider",
    Model => "model",
    Status => "status",
});

/// Persisted telemetry for a single external call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRecord {
    /// Unique ID, assigned by the coordinator at write time
    pub id: String,
    /// Epoch milliseconds when the call completed
    pub timestamp: i64,
    pub provider: String,
    pub model: String,
    pub input_format: InputFormat,
    pub status: CallStatus,
    /// Wall-clock latency in milliseconds
    pub latency: u64,
    /// Conventionally `prompt_tokens + completion_tokens`, not enforced
    pub tokens_used: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    /// Estimated cost in USD
    pub estimated_cost: f64,
    /// Prompt length in characters
    pub prompt_length: u64,
    /// Response length in characters
    pub response_length: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Model-reported confidence in `0.0..=1.0`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl MetricRecord {
    /// Value of the given indexed dimension, as stored.
    pub fn dimension_value(&self, dimension: Dimension) -> String {
        match dimension {
            Dimension::Provider => self.provider.clone(),
            Dimension::Model => self.model.clone(),
            Dimension::Status => self.status.to_string(),
        }
    }
}

/// A metric record as supplied by the recording caller (no `id` yet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMetricRecord {
    pub timestamp: i64,
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub input_format: InputFormat,
    pub status: CallStatus,
    pub latency: u64,
    #[serde(default)]
    pub tokens_used: u64,
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub estimated_cost: f64,
    #[serde(default)]
    pub prompt_length: u64,
    #[serde(default)]
    pub response_length: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl NewMetricRecord {
    /// Minimal record for a call; token, cost and length fields start at zero.
    pub fn new(
        timestamp: i64,
        provider: impl Into<String>,
        model: impl Into<String>,
        status: CallStatus,
        latency: u64,
    ) -> Self {
        Self {
            timestamp,
            provider: provider.into(),
            model: model.into(),
            input_format: InputFormat::default(),
            status,
            latency,
            tokens_used: 0,
            prompt_tokens: 0,
            completion_tokens: 0,
            estimated_cost: 0.0,
            prompt_length: 0,
            response_length: 0,
            error_message: None,
            confidence: None,
        }
    }

    /// Set prompt/completion tokens; `tokens_used` becomes their sum.
    #[must_use]
    pub fn with_tokens(mut self, prompt_tokens: u64, completion_tokens: u64) -> Self {
        self.prompt_tokens = prompt_tokens;
        self.completion_tokens = completion_tokens;
        self.tokens_used = prompt_tokens.saturating_add(completion_tokens);
        self
    }

    #[must_use]
    pub fn with_cost(mut self, estimated_cost: f64) -> Self {
        self.estimated_cost = estimated_cost;
        self
    }

    #[must_use]
    pub fn with_input_format(mut self, input_format: InputFormat) -> Self {
        self.input_format = input_format;
        self
    }

    #[must_use]
    pub fn with_lengths(mut self, prompt_length: u64, response_length: u64) -> Self {
        self.prompt_length = prompt_length;
        self.response_length = response_length;
        self
    }

    #[must_use]
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Reject values that can never come out of a real call.
    pub fn validate(&self) -> Result<()> {
        if self.provider.trim().is_empty() {
            return Err(CallStatsError::InvalidInput("provider must not be empty".into()));
        }
        if self.model.trim().is_empty() {
            return Err(CallStatsError::InvalidInput("model must not be empty".into()));
        }
        if !self.estimated_cost.is_finite() || self.estimated_cost < 0.0 {
            return Err(CallStatsError::InvalidInput(format!(
                "estimated cost must be a non-negative number, got {}",
                self.estimated_cost
            )));
        }
        if let Some(confidence) = self.confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(CallStatsError::InvalidInput(format!(
                    "confidence must be within 0..=1, got {confidence}"
                )));
            }
        }
        Ok(())
    }

    /// Attach the storage-assigned identifier.
    pub fn into_record(self, id: impl Into<String>) -> MetricRecord {
        MetricRecord {
            id: id.into(),
            timestamp: self.timestamp,
            provider: self.provider,
            model: self.model,
            input_format: self.input_format,
            status: self.status,
            latency: self.latency,
            tokens_used: self.tokens_used,
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            estimated_cost: self.estimated_cost,
            prompt_length: self.prompt_length,
            response_length: self.response_length,
            error_message: self.error_message,
            confidence: self.confidence,
        }
    }
}
