use serde::{Deserialize, Serialize};

use crate::domain::conversation::ConversationState;
use crate::domain::product::ProductId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionSource {
    FastLane,
    Director,
    Fallback,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartRequest {
    pub product_id: ProductId,
    pub variant: Option<String>,
    pub quantity: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextField {
    CustomerName,
    CustomerPhone,
    CustomerAddress,
}

impl ContextField {
    pub fn field_key(&self) -> &'static str {
        match self {
            Self::CustomerName => "customer_name",
            Self::CustomerPhone => "customer_phone",
            Self::CustomerAddress => "customer_address",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextUpdate {
    pub field: ContextField,
    pub value: String,
}

/// The action part of a decision. Each variant carries exactly the payload
/// that action needs; invalid field combinations are unrepresentable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DecisionAction {
    Reply,
    AddToCart { items: Vec<CartRequest> },
    UpdateContext { updates: Vec<ContextUpdate> },
    CreateOrder { name: Option<String>, phone: Option<String>, address: Option<String> },
    EscalateToHuman { reason: String },
    Clarify,
}

impl DecisionAction {
    pub fn action_key(&self) -> &'static str {
        match self {
            Self::Reply => "reply",
            Self::AddToCart { .. } => "add_to_cart",
            Self::UpdateContext { .. } => "update_context",
            Self::CreateOrder { .. } => "create_order",
            Self::EscalateToHuman { .. } => "escalate_to_human",
            Self::Clarify => "clarify",
        }
    }
}

/// A proposed decision. Proposals are never applied directly; everything the
/// model produces must pass the Action Validator first, and Fast Lane
/// proposals are constrained by construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DirectorDecision {
    pub action: DecisionAction,
    pub target_state: ConversationState,
    pub reply: String,
    pub confidence: f32,
    pub source: DecisionSource,
}

impl DirectorDecision {
    pub fn fast_lane(
        action: DecisionAction,
        target_state: ConversationState,
        reply: impl Into<String>,
    ) -> Self {
        Self {
            action,
            target_state,
            reply: reply.into(),
            confidence: 1.0,
            source: DecisionSource::FastLane,
        }
    }

    pub fn fallback(
        action: DecisionAction,
        target_state: ConversationState,
        reply: impl Into<String>,
    ) -> Self {
        Self {
            action,
            target_state,
            reply: reply.into(),
            confidence: 1.0,
            source: DecisionSource::Fallback,
        }
    }
}
