//! AI Director: produces a structured decision when the Fast Lane could
//! not, by delegating understanding to a language model constrained to the
//! enumerated action vocabulary. Tool calls are resolved synchronously and
//! fed back, with a hard ceiling on round trips; transport trouble,
//! timeouts, and schema violations all collapse into `Unavailable` so the
//! Orchestrator can substitute a safe reply.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use cartly_core::domain::conversation::{
    ConversationContext, ConversationId, ConversationState, PendingImage,
};
use cartly_core::domain::decision::{
    CartRequest, ContextField, ContextUpdate, DecisionAction, DecisionSource, DirectorDecision,
};
use cartly_core::domain::product::{ProductId, ProductSummary};
use cartly_core::ports::{ConversationTurn, TurnRole, UsageKind, UsageRecord, UsageRecorder};

use crate::llm::{ChatMessage, CompletionRequest, LlmClient, TokenUsage};
use crate::metering::estimate_cost_usd;
use crate::tools::ToolRegistry;

/// Ceiling on model round trips per message. Exceeding it forces
/// termination with a clarification.
pub const MAX_TOOL_ROUNDS: u32 = 3;

#[derive(Debug, Error)]
pub enum DirectorError {
    #[error("model unavailable: {0}")]
    Unavailable(String),
}

pub struct DirectorInput<'a> {
    pub conversation_id: &'a ConversationId,
    pub text: &'a str,
    pub context: &'a ConversationContext,
    pub history: &'a [ConversationTurn],
    pub catalog: &'a [ProductSummary],
    pub pending_images: &'a [PendingImage],
}

pub struct Director {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    usage: Arc<dyn UsageRecorder>,
    model: String,
    timeout: Duration,
    max_tokens: u32,
}

impl Director {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        usage: Arc<dyn UsageRecorder>,
        model: impl Into<String>,
        timeout: Duration,
        max_tokens: u32,
    ) -> Self {
        Self { llm, tools, usage, model: model.into(), timeout, max_tokens }
    }

    pub async fn decide(
        &self,
        input: DirectorInput<'_>,
    ) -> Result<DirectorDecision, DirectorError> {
        let mut messages = build_messages(&input);
        let tool_specs = self.tools.specs();

        for round in 0..=MAX_TOOL_ROUNDS {
            let request = CompletionRequest {
                messages: messages.clone(),
                tools: tool_specs.clone(),
                max_tokens: self.max_tokens,
            };

            let response = tokio::time::timeout(self.timeout, self.llm.complete(request))
                .await
                .map_err(|_| {
                    DirectorError::Unavailable(format!(
                        "model call exceeded {}s timeout",
                        self.timeout.as_secs()
                    ))
                })?
                .map_err(|error| DirectorError::Unavailable(error.to_string()))?;

            self.record_usage(input.conversation_id, round, &response.usage);

            if !response.tool_calls.is_empty() {
                if round == MAX_TOOL_ROUNDS {
                    warn!(
                        event_name = "director.tool_budget_exhausted",
                        conversation_id = %input.conversation_id.0,
                        "tool round ceiling hit, forcing clarification"
                    );
                    break;
                }

                for call in response.tool_calls {
                    let result = match self.tools.execute(&call.name, call.arguments.clone()).await
                    {
                        Ok(value) => value.to_string(),
                        Err(error) => json!({ "error": error.to_string() }).to_string(),
                    };
                    debug!(
                        event_name = "director.tool_resolved",
                        conversation_id = %input.conversation_id.0,
                        tool = %call.name,
                        "tool call resolved"
                    );
                    messages.push(ChatMessage::assistant(format!(
                        "[tool call] {} {}",
                        call.name, call.arguments
                    )));
                    messages.push(ChatMessage::tool_result(call.id, result));
                }
                continue;
            }

            let content = response.content.unwrap_or_default();
            if content.trim().is_empty() {
                return Err(DirectorError::Unavailable(
                    "model returned an empty decision".to_string(),
                ));
            }

            return parse_decision(&content, input.context.state);
        }

        Ok(clarify_default(input.context.state))
    }

    fn record_usage(&self, conversation_id: &ConversationId, round: u32, usage: &TokenUsage) {
        let kind = if round == 0 { UsageKind::DirectorDecision } else { UsageKind::ToolRound };
        self.usage.record(UsageRecord {
            conversation_id: conversation_id.clone(),
            kind,
            model: self.model.clone(),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            cost_usd: estimate_cost_usd(&self.model, usage),
            recorded_at: Utc::now(),
        });
    }
}

fn clarify_default(state: ConversationState) -> DirectorDecision {
    DirectorDecision {
        action: DecisionAction::Clarify,
        target_state: state,
        reply: "I want to make sure I get this right. Could you tell me a bit more about what \
                you need?"
            .to_string(),
        confidence: 1.0,
        source: DecisionSource::Director,
    }
}

fn build_messages(input: &DirectorInput<'_>) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(system_prompt(input))];

    for turn in input.history {
        match turn.role {
            TurnRole::Customer => messages.push(ChatMessage::user(turn.text.clone())),
            TurnRole::Bot | TurnRole::Operator => {
                messages.push(ChatMessage::assistant(turn.text.clone()))
            }
        }
    }

    let mut current = input.text.to_string();
    if !input.pending_images.is_empty() {
        current.push_str(&format!(
            "\n[customer sent {} product photo(s) earlier",
            input.pending_images.len()
        ));
        for image in input.pending_images {
            if let Some(caption) = &image.caption {
                current.push_str(&format!("; caption: {caption}"));
            }
        }
        current.push(']');
    }
    messages.push(ChatMessage::user(current));

    messages
}

fn system_prompt(input: &DirectorInput<'_>) -> String {
    let mut prompt = String::from(
        "You are the decision engine of a conversational commerce assistant.\n\
         Answer every customer message with exactly ONE decision as strict JSON, no prose, no \
         markdown.\n\
         Schema: {\"action\": string, \"target_state\": string, \"reply\": string, \
         \"confidence\": number 0..1, ...action fields}\n\
         Actions:\n\
         - reply: just answer; no extra fields\n\
         - add_to_cart: items: [{product_id, variant?, quantity}]\n\
         - update_context: updates: [{field: name|phone|address, value}]\n\
         - create_order: name?, phone?, address? (omit fields already on file)\n\
         - escalate_to_human: reason\n\
         - clarify: ask the customer to be more specific\n\
         States: greeting | browsing | awaiting_name | awaiting_phone | awaiting_address | \
         confirming_order | order_placed | human_handoff | idle\n\
         Only reference product ids from the catalog below. Use the tools to check stock, \
         order status, or delivery fees before committing to an answer.\n\nCatalog:\n",
    );

    for product in input.catalog {
        prompt.push_str(&format!(
            "- {}: {}, Tk {}, stock {}\n",
            product.id.0, product.name, product.unit_price, product.stock
        ));
    }

    prompt.push_str(&format!("\nCurrent state: {:?}\n", input.context.state));
    if !input.context.cart.is_empty() {
        prompt.push_str("Cart:\n");
        for item in &input.context.cart {
            prompt.push_str(&format!(
                "- {} x{} @ Tk {}\n",
                item.product_id.0, item.quantity, item.unit_price
            ));
        }
    }
    let customer = &input.context.customer;
    prompt.push_str(&format!(
        "Customer on file: name={}, phone={}, address={}\n",
        customer.name.as_deref().unwrap_or("-"),
        customer.phone.as_deref().unwrap_or("-"),
        customer.address.as_deref().unwrap_or("-"),
    ));

    prompt
}

#[derive(Deserialize)]
struct DecisionWire {
    action: String,
    #[serde(default)]
    target_state: Option<String>,
    #[serde(default)]
    reply: String,
    confidence: f32,
    #[serde(default)]
    items: Vec<ItemWire>,
    #[serde(default)]
    updates: Vec<UpdateWire>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize)]
struct ItemWire {
    product_id: String,
    #[serde(default)]
    variant: Option<String>,
    #[serde(default = "default_quantity")]
    quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Deserialize)]
struct UpdateWire {
    field: String,
    value: String,
}

fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

fn parse_decision(
    content: &str,
    current_state: ConversationState,
) -> Result<DirectorDecision, DirectorError> {
    let wire: DecisionWire = serde_json::from_str(strip_code_fences(content)).map_err(|error| {
        DirectorError::Unavailable(format!("decision did not match the schema: {error}"))
    })?;

    let target_state = match wire.target_state.as_deref() {
        None => current_state,
        Some(raw) => parse_state(raw)?,
    };

    let action = match wire.action.as_str() {
        "reply" => DecisionAction::Reply,
        "clarify" => DecisionAction::Clarify,
        "escalate_to_human" => DecisionAction::EscalateToHuman {
            reason: wire.reason.unwrap_or_else(|| "model requested escalation".to_string()),
        },
        "add_to_cart" => DecisionAction::AddToCart {
            items: wire
                .items
                .into_iter()
                .map(|item| CartRequest {
                    product_id: ProductId(item.product_id),
                    variant: item.variant,
                    quantity: item.quantity,
                })
                .collect(),
        },
        "update_context" => {
            let updates = wire
                .updates
                .into_iter()
                .map(|update| {
                    let field = match update.field.as_str() {
                        "name" => ContextField::CustomerName,
                        "phone" => ContextField::CustomerPhone,
                        "address" => ContextField::CustomerAddress,
                        other => {
                            return Err(DirectorError::Unavailable(format!(
                                "unknown context field `{other}`"
                            )))
                        }
                    };
                    Ok(ContextUpdate { field, value: update.value })
                })
                .collect::<Result<Vec<_>, DirectorError>>()?;
            DecisionAction::UpdateContext { updates }
        }
        "create_order" => DecisionAction::CreateOrder {
            name: wire.name,
            phone: wire.phone,
            address: wire.address,
        },
        other => {
            return Err(DirectorError::Unavailable(format!("unknown action `{other}`")));
        }
    };

    Ok(DirectorDecision {
        action,
        target_state,
        reply: wire.reply,
        confidence: wire.confidence.clamp(0.0, 1.0),
        source: DecisionSource::Director,
    })
}

fn parse_state(raw: &str) -> Result<ConversationState, DirectorError> {
    match raw {
        "greeting" => Ok(ConversationState::Greeting),
        "browsing" => Ok(ConversationState::Browsing),
        "awaiting_name" => Ok(ConversationState::AwaitingName),
        "awaiting_phone" => Ok(ConversationState::AwaitingPhone),
        "awaiting_address" => Ok(ConversationState::AwaitingAddress),
        "confirming_order" => Ok(ConversationState::ConfirmingOrder),
        "order_placed" => Ok(ConversationState::OrderPlaced),
        "human_handoff" => Ok(ConversationState::HumanHandoff),
        "idle" => Ok(ConversationState::Idle),
        other => Err(DirectorError::Unavailable(format!("unknown state `{other}`"))),
    }
}
