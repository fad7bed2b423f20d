//! Token-to-cost accounting for model invocations. Records flow to the
//! `UsageRecorder` port fire-and-forget; nothing on the decision path ever
//! blocks on metering.

use std::sync::{Arc, Mutex};

use cartly_core::ports::{UsageRecord, UsageRecorder};

use crate::llm::TokenUsage;

struct ModelPricing {
    prefix: &'static str,
    input_per_million_usd: f64,
    output_per_million_usd: f64,
}

// Per-million-token USD rates. Unknown models fall back to the last entry.
const PRICING: &[ModelPricing] = &[
    ModelPricing { prefix: "gpt-4o-mini", input_per_million_usd: 0.15, output_per_million_usd: 0.6 },
    ModelPricing { prefix: "gpt-4o", input_per_million_usd: 2.5, output_per_million_usd: 10.0 },
    ModelPricing { prefix: "claude-3-5-haiku", input_per_million_usd: 0.8, output_per_million_usd: 4.0 },
    ModelPricing { prefix: "claude", input_per_million_usd: 3.0, output_per_million_usd: 15.0 },
    ModelPricing { prefix: "", input_per_million_usd: 0.0, output_per_million_usd: 0.0 },
];

pub fn estimate_cost_usd(model: &str, usage: &TokenUsage) -> f64 {
    let pricing = PRICING
        .iter()
        .find(|candidate| model.starts_with(candidate.prefix))
        .unwrap_or(&PRICING[PRICING.len() - 1]);

    f64::from(usage.input_tokens) * pricing.input_per_million_usd / 1_000_000.0
        + f64::from(usage.output_tokens) * pricing.output_per_million_usd / 1_000_000.0
}

/// Test/in-process recorder in the mold of `InMemoryAuditSink`.
#[derive(Clone, Default)]
pub struct InMemoryUsageRecorder {
    records: Arc<Mutex<Vec<UsageRecord>>>,
}

impl InMemoryUsageRecorder {
    pub fn records(&self) -> Vec<UsageRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl UsageRecorder for InMemoryUsageRecorder {
    fn record(&self, record: UsageRecord) {
        match self.records.lock() {
            Ok(mut records) => records.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }
}

/// Production recorder: structured log lines an external metering pipeline
/// scrapes. Keeps the port non-blocking.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogUsageRecorder;

impl UsageRecorder for LogUsageRecorder {
    fn record(&self, record: UsageRecord) {
        tracing::info!(
            event_name = "usage.recorded",
            conversation_id = %record.conversation_id.0,
            kind = ?record.kind,
            model = %record.model,
            input_tokens = record.input_tokens,
            output_tokens = record.output_tokens,
            cost_usd = record.cost_usd,
            "model usage recorded"
        );
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use cartly_core::domain::conversation::ConversationId;
    use cartly_core::ports::{UsageKind, UsageRecord, UsageRecorder};

    use crate::llm::TokenUsage;

    use super::{estimate_cost_usd, InMemoryUsageRecorder};

    #[test]
    fn known_model_costs_follow_the_table() {
        let usage = TokenUsage { input_tokens: 1_000_000, output_tokens: 1_000_000 };
        let cost = estimate_cost_usd("gpt-4o-mini", &usage);
        assert!((cost - 0.75).abs() < 1e-9);
    }

    #[test]
    fn unknown_model_costs_nothing() {
        let usage = TokenUsage { input_tokens: 5_000, output_tokens: 5_000 };
        assert_eq!(estimate_cost_usd("llama3.1", &usage), 0.0);
    }

    #[test]
    fn in_memory_recorder_collects_records() {
        let recorder = InMemoryUsageRecorder::default();
        recorder.record(UsageRecord {
            conversation_id: ConversationId("wa-1".to_string()),
            kind: UsageKind::DirectorDecision,
            model: "gpt-4o-mini".to_string(),
            input_tokens: 100,
            output_tokens: 20,
            cost_usd: 0.0001,
            recorded_at: Utc::now(),
        });

        assert_eq!(recorder.records().len(), 1);
    }
}
