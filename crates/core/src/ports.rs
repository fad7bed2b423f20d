//! Capability boundaries the decision core consumes. Persistence, product
//! data, outbound delivery, and cost metering are external collaborators;
//! the core only ever talks to these traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::conversation::{ConversationContext, ConversationId};
use crate::domain::order::{OrderDraft, OrderId, OrderSummary};
use crate::domain::product::{ProductId, ProductSummary};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("storage failure: {0}")]
pub struct StorageFailure(pub String);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("delivery failure: {0}")]
pub struct DeliveryFailure(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnRole {
    Customer,
    Bot,
    Operator,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub text: String,
    pub occurred_at: DateTime<Utc>,
}

/// Conversation row access. The row is an opaque key-value contract:
/// `{ id, current_state, context, last_message_at }` plus a turn log used
/// as rolling history for the AI Director.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn load(&self, id: &ConversationId)
        -> Result<Option<ConversationContext>, StorageFailure>;
    async fn save(
        &self,
        id: &ConversationId,
        context: &ConversationContext,
    ) -> Result<(), StorageFailure>;
    async fn append_turn(
        &self,
        id: &ConversationId,
        turn: ConversationTurn,
    ) -> Result<(), StorageFailure>;
    async fn recent_turns(
        &self,
        id: &ConversationId,
        limit: u32,
    ) -> Result<Vec<ConversationTurn>, StorageFailure>;
}

/// Read-only product catalog access. An empty query returns the active
/// catalog snapshot.
#[async_trait]
pub trait ProductLookup: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<ProductSummary>, StorageFailure>;
    async fn find(&self, id: &ProductId) -> Result<Option<ProductSummary>, StorageFailure>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create(&self, draft: OrderDraft) -> Result<OrderId, StorageFailure>;
    async fn find_latest_by_phone(
        &self,
        phone: &str,
    ) -> Result<Option<OrderSummary>, StorageFailure>;
}

/// Outbound delivery to the messaging platform.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_text(&self, id: &ConversationId, text: &str) -> Result<(), DeliveryFailure>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UsageKind {
    DirectorDecision,
    ToolRound,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub conversation_id: ConversationId,
    pub kind: UsageKind,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost_usd: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Cost metering. Fire-and-forget: implementations must never block the
/// decision path or surface errors into it.
pub trait UsageRecorder: Send + Sync {
    fn record(&self, record: UsageRecord);
}
