//! The Orchestrator sequences every component for one inbound message:
//! load context, try the Fast Lane, fall back to the AI Director, validate,
//! execute, persist, reply. It is the only component in the core that
//! performs I/O, and a single conversation is serialized end to end by the
//! Processing Lock Manager.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use cartly_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use cartly_core::config::DeliveryConfig;
use cartly_core::context::{apply_update, transition_context};
use cartly_core::domain::conversation::{
    CartItem, ConversationContext, ConversationId, ConversationState, PendingImage,
};
use cartly_core::domain::decision::{DecisionAction, DirectorDecision};
use cartly_core::domain::order::{OrderDraft, OrderLine};
use cartly_core::errors::{ApplicationError, DomainError};
use cartly_core::ports::{
    ConversationStore, ConversationTurn, MessageSender, OrderStore, ProductLookup, TurnRole,
};

use crate::director::{Director, DirectorError, DirectorInput};
use crate::fastlane::FastLane;
use crate::lock::{LockType, ProcessingLockManager};
use crate::validator::{ActionValidator, ValidatedDecision, ValidationOutcome};

#[derive(Clone, Debug)]
pub struct OrchestratorSettings {
    pub bot_lock_ttl: Duration,
    pub owner_wait_timeout: Duration,
    pub history_turns: u32,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            bot_lock_ttl: Duration::from_secs(30),
            owner_wait_timeout: Duration::from_millis(2_000),
            history_turns: 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundAttachment {
    pub media_id: String,
    pub caption: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub conversation_id: ConversationId,
    pub text: Option<String>,
    pub attachments: Vec<InboundAttachment>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub reply_sent: bool,
    pub new_state: ConversationState,
    pub flagged_for_human: bool,
}

pub struct Orchestrator {
    store: Arc<dyn ConversationStore>,
    products: Arc<dyn ProductLookup>,
    orders: Arc<dyn OrderStore>,
    sender: Arc<dyn MessageSender>,
    audit: Arc<dyn AuditSink>,
    locks: Arc<ProcessingLockManager>,
    fast_lane: FastLane,
    director: Director,
    validator: ActionValidator,
    delivery: DeliveryConfig,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ConversationStore>,
        products: Arc<dyn ProductLookup>,
        orders: Arc<dyn OrderStore>,
        sender: Arc<dyn MessageSender>,
        audit: Arc<dyn AuditSink>,
        locks: Arc<ProcessingLockManager>,
        fast_lane: FastLane,
        director: Director,
        validator: ActionValidator,
        delivery: DeliveryConfig,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            store,
            products,
            orders,
            sender,
            audit,
            locks,
            fast_lane,
            director,
            validator,
            delivery,
            settings,
        }
    }

    /// The single entry point the webhook handler invokes per inbound
    /// message.
    pub async fn process_inbound_message(
        &self,
        inbound: InboundMessage,
    ) -> Result<ProcessOutcome, ApplicationError> {
        let correlation_id = Uuid::new_v4().to_string();
        let id = &inbound.conversation_id;

        let mut context = self
            .store
            .load(id)
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?
            .unwrap_or_default();

        let text = inbound.text.as_deref().map(str::trim).unwrap_or_default().to_string();

        // Image-only messages are acknowledged and held back; reasoning
        // about them is deferred to the next text message.
        if text.is_empty() && !inbound.attachments.is_empty() {
            for attachment in &inbound.attachments {
                context.push_pending_image(PendingImage {
                    media_id: attachment.media_id.clone(),
                    caption: attachment.caption.clone(),
                    received_at: Utc::now(),
                });
            }
            self.store
                .save(id, &context)
                .await
                .map_err(|error| self.persistence_failure(id, &correlation_id, error))?;

            let reply_sent = self
                .send_reply(id, "Got the photo! Tell me what you'd like to know about it.")
                .await;
            return Ok(ProcessOutcome {
                reply_sent,
                new_state: context.state,
                flagged_for_human: false,
            });
        }

        if text.is_empty() {
            return Ok(ProcessOutcome {
                reply_sent: false,
                new_state: context.state,
                flagged_for_human: false,
            });
        }

        // The bot lock covers everything from routing to reply. If an
        // operator holds the conversation, skip entirely and flag it.
        if !self.locks.acquire(&id.0, LockType::BotProcessing, self.settings.bot_lock_ttl) {
            info!(
                event_name = "orchestrator.lock_contention",
                conversation_id = %id.0,
                correlation_id = %correlation_id,
                "conversation is locked, flagging for manual response"
            );
            self.audit.emit(AuditEvent::new(
                Some(id.clone()),
                correlation_id,
                "lock.contention_skip",
                AuditCategory::Lock,
                "orchestrator",
                AuditOutcome::Rejected,
            ));
            return Ok(ProcessOutcome {
                reply_sent: false,
                new_state: context.state,
                flagged_for_human: true,
            });
        }

        let result = self.process_locked(id, &text, context, &correlation_id).await;
        self.locks.release(&id.0);
        result
    }

    async fn process_locked(
        &self,
        id: &ConversationId,
        text: &str,
        mut context: ConversationContext,
        correlation_id: &str,
    ) -> Result<ProcessOutcome, ApplicationError> {
        if let Err(error) = self
            .store
            .append_turn(
                id,
                ConversationTurn {
                    role: TurnRole::Customer,
                    text: text.to_string(),
                    occurred_at: Utc::now(),
                },
            )
            .await
        {
            warn!(
                event_name = "orchestrator.turn_log_failed",
                conversation_id = %id.0,
                error = %error,
                "could not append inbound turn"
            );
        }

        let mut flagged_for_human = false;

        let decision = match self.fast_lane.route(text, &context) {
            Some(decision) => {
                self.audit.emit(
                    AuditEvent::new(
                        Some(id.clone()),
                        correlation_id,
                        "fastlane.pattern_matched",
                        AuditCategory::FastLane,
                        "fast-lane",
                        AuditOutcome::Success,
                    )
                    .with_metadata("action", decision.action.action_key()),
                );
                decision
            }
            None => match self.invoke_director(id, text, &context).await? {
                Ok(decision) => {
                    // The director has read the queued images; drop them so
                    // they cannot influence a later, unrelated message.
                    context.pending_images.clear();
                    self.audit.emit(
                        AuditEvent::new(
                            Some(id.clone()),
                            correlation_id,
                            "director.decided",
                            AuditCategory::Director,
                            "ai-director",
                            AuditOutcome::Success,
                        )
                        .with_metadata("action", decision.action.action_key())
                        .with_metadata("confidence", decision.confidence.to_string()),
                    );
                    decision
                }
                Err(DirectorError::Unavailable(detail)) => {
                    warn!(
                        event_name = "director.unavailable",
                        conversation_id = %id.0,
                        correlation_id = %correlation_id,
                        error = %detail,
                        "model unavailable, substituting safe fallback"
                    );
                    self.audit.emit(
                        AuditEvent::new(
                            Some(id.clone()),
                            correlation_id,
                            "director.unavailable",
                            AuditCategory::Director,
                            "ai-director",
                            AuditOutcome::Failed,
                        )
                        .with_metadata("error", detail.clone()),
                    );
                    flagged_for_human = true;
                    DirectorDecision::fallback(
                        DecisionAction::EscalateToHuman {
                            reason: format!("model unavailable: {detail}"),
                        },
                        ConversationState::HumanHandoff,
                        "Sorry, I'm having a little trouble right now. One of our team members \
                         will follow up with you shortly.",
                    )
                }
            },
        };

        let validated = match self.validator.validate(decision, &context).await? {
            ValidationOutcome::Accepted(validated) => validated,
            ValidationOutcome::Rejected(reason) => {
                info!(
                    event_name = "validator.rejected",
                    conversation_id = %id.0,
                    correlation_id = %correlation_id,
                    reason_code = reason.reason_code(),
                    "decision rejected, substituting deterministic fallback"
                );
                self.audit.emit(
                    AuditEvent::new(
                        Some(id.clone()),
                        correlation_id,
                        "validation.rejected",
                        AuditCategory::Validation,
                        "action-validator",
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("reason_code", reason.reason_code()),
                );
                ValidatedDecision::constrained(reason.fallback(&context))
            }
        };

        let decision = validated.into_inner();
        if matches!(decision.action, DecisionAction::EscalateToHuman { .. }) {
            flagged_for_human = true;
        }

        self.execute_action(id, &decision, &mut context, correlation_id).await?;

        let (next, cleared) = transition_context(&context, decision.target_state);
        if context.state != next.state || !cleared.is_empty() {
            self.audit.emit(
                AuditEvent::new(
                    Some(id.clone()),
                    correlation_id,
                    "transition.applied",
                    AuditCategory::Transition,
                    "context-manager",
                    AuditOutcome::Success,
                )
                .with_metadata("from", format!("{:?}", context.state))
                .with_metadata("to", format!("{:?}", next.state))
                .with_metadata("cleared", format!("{cleared:?}")),
            );
        }

        self.store
            .save(id, &next)
            .await
            .map_err(|error| self.persistence_failure(id, correlation_id, error))?;

        let reply_sent = self.send_reply(id, &decision.reply).await;
        if !reply_sent {
            flagged_for_human = true;
        }

        Ok(ProcessOutcome { reply_sent, new_state: next.state, flagged_for_human })
    }

    /// Operator override: forces a state change through the same clearing
    /// policy as normal flow execution. The operator path waits briefly for
    /// an in-flight bot lock, then proceeds regardless.
    pub async fn force_state(
        &self,
        id: &ConversationId,
        target: ConversationState,
    ) -> Result<ConversationState, ApplicationError> {
        let correlation_id = Uuid::new_v4().to_string();

        if self.locks.is_locked(&id.0).is_some() {
            let released =
                self.locks.wait_for_release(&id.0, self.settings.owner_wait_timeout).await;
            if !released {
                warn!(
                    event_name = "orchestrator.owner_override_while_locked",
                    conversation_id = %id.0,
                    "bot lock still held after wait, proceeding with operator override"
                );
            }
        }

        let acquired =
            self.locks.acquire(&id.0, LockType::OwnerSending, self.settings.bot_lock_ttl);

        let result = async {
            let context = self
                .store
                .load(id)
                .await
                .map_err(|error| ApplicationError::Persistence(error.to_string()))?
                .unwrap_or_default();

            let (next, cleared) = transition_context(&context, target);
            self.store
                .save(id, &next)
                .await
                .map_err(|error| self.persistence_failure(id, &correlation_id, error))?;

            self.audit.emit(
                AuditEvent::new(
                    Some(id.clone()),
                    correlation_id.clone(),
                    "transition.forced",
                    AuditCategory::Transition,
                    "operator",
                    AuditOutcome::Success,
                )
                .with_metadata("to", format!("{target:?}"))
                .with_metadata("cleared", format!("{cleared:?}")),
            );

            Ok(next.state)
        }
        .await;

        if acquired {
            self.locks.release(&id.0);
        }
        result
    }

    async fn invoke_director(
        &self,
        id: &ConversationId,
        text: &str,
        context: &ConversationContext,
    ) -> Result<Result<DirectorDecision, DirectorError>, ApplicationError> {
        let history = match self.store.recent_turns(id, self.settings.history_turns).await {
            Ok(history) => history,
            Err(error) => {
                warn!(
                    event_name = "orchestrator.history_unavailable",
                    conversation_id = %id.0,
                    error = %error,
                    "proceeding without rolling history"
                );
                Vec::new()
            }
        };

        let catalog = self
            .products
            .search("")
            .await
            .map_err(|error| ApplicationError::Integration(error.to_string()))?;

        let pending_images: Vec<PendingImage> =
            context.pending_images.iter().cloned().collect();

        Ok(self
            .director
            .decide(DirectorInput {
                conversation_id: id,
                text,
                context,
                history: &history,
                catalog: &catalog,
                pending_images: &pending_images,
            })
            .await)
    }

    async fn execute_action(
        &self,
        id: &ConversationId,
        decision: &DirectorDecision,
        context: &mut ConversationContext,
        correlation_id: &str,
    ) -> Result<(), ApplicationError> {
        match &decision.action {
            DecisionAction::Reply
            | DecisionAction::Clarify
            | DecisionAction::EscalateToHuman { .. } => Ok(()),
            DecisionAction::UpdateContext { updates } => {
                for update in updates {
                    apply_update(context, update);
                }
                Ok(())
            }
            DecisionAction::AddToCart { items } => {
                for item in items {
                    let product = self
                        .products
                        .find(&item.product_id)
                        .await
                        .map_err(|error| ApplicationError::Integration(error.to_string()))?
                        .ok_or_else(|| {
                            ApplicationError::Integration(format!(
                                "product `{}` disappeared between validation and execution",
                                item.product_id.0
                            ))
                        })?;
                    let unit_price =
                        product.price_for(item.variant.as_deref()).ok_or_else(|| {
                            ApplicationError::Integration(format!(
                                "variant pricing for `{}` is unavailable",
                                item.product_id.0
                            ))
                        })?;

                    let existing = context.cart.iter_mut().find(|line| {
                        line.product_id == item.product_id && line.variant == item.variant
                    });
                    match existing {
                        Some(line) => line.quantity += item.quantity,
                        None => context.cart.push(CartItem {
                            product_id: item.product_id.clone(),
                            variant: item.variant.clone(),
                            quantity: item.quantity,
                            unit_price,
                        }),
                    }
                }
                Ok(())
            }
            DecisionAction::CreateOrder { name, phone, address } => {
                let customer_name = name
                    .clone()
                    .or_else(|| context.customer.name.clone())
                    .ok_or_else(|| missing_order_field("name"))?;
                let customer_phone = phone
                    .clone()
                    .or_else(|| context.customer.phone.clone())
                    .ok_or_else(|| missing_order_field("phone"))?;
                let customer_address = address
                    .clone()
                    .or_else(|| context.customer.address.clone())
                    .ok_or_else(|| missing_order_field("address"))?;

                let draft = OrderDraft {
                    conversation_id: id.0.clone(),
                    customer_name: customer_name.clone(),
                    phone: customer_phone.clone(),
                    address: customer_address.clone(),
                    lines: context
                        .cart
                        .iter()
                        .map(|item| OrderLine {
                            product_id: item.product_id.clone(),
                            variant: item.variant.clone(),
                            quantity: item.quantity,
                            unit_price: item.unit_price,
                        })
                        .collect(),
                    delivery_fee: Decimal::new(
                        self.delivery.fee_cents_for(&customer_address),
                        2,
                    ),
                };
                let total = draft.total();

                let order_id = self
                    .orders
                    .create(draft)
                    .await
                    .map_err(|error| self.persistence_failure(id, correlation_id, error))?;

                info!(
                    event_name = "order.created",
                    conversation_id = %id.0,
                    correlation_id = %correlation_id,
                    order_id = %order_id.0,
                    total = %total,
                    "order created from conversation"
                );
                self.audit.emit(
                    AuditEvent::new(
                        Some(id.clone()),
                        correlation_id,
                        "order.created",
                        AuditCategory::Persistence,
                        "orchestrator",
                        AuditOutcome::Success,
                    )
                    .with_metadata("order_id", order_id.0)
                    .with_metadata("total", total.to_string()),
                );

                // Payload-supplied fields become part of the durable
                // customer record.
                context.customer.name = Some(customer_name);
                context.customer.phone = Some(customer_phone);
                context.customer.address = Some(customer_address);

                Ok(())
            }
        }
    }

    async fn send_reply(&self, id: &ConversationId, text: &str) -> bool {
        match self.sender.send_text(id, text).await {
            Ok(()) => {
                if let Err(error) = self
                    .store
                    .append_turn(
                        id,
                        ConversationTurn {
                            role: TurnRole::Bot,
                            text: text.to_string(),
                            occurred_at: Utc::now(),
                        },
                    )
                    .await
                {
                    warn!(
                        event_name = "orchestrator.turn_log_failed",
                        conversation_id = %id.0,
                        error = %error,
                        "could not append outbound turn"
                    );
                }
                true
            }
            Err(error) => {
                warn!(
                    event_name = "delivery.send_failed",
                    conversation_id = %id.0,
                    error = %error,
                    "reply could not be delivered"
                );
                false
            }
        }
    }

    fn persistence_failure(
        &self,
        id: &ConversationId,
        correlation_id: &str,
        error: impl std::fmt::Display,
    ) -> ApplicationError {
        self.audit.emit(
            AuditEvent::new(
                Some(id.clone()),
                correlation_id,
                "persistence.write_failed",
                AuditCategory::Persistence,
                "orchestrator",
                AuditOutcome::Failed,
            )
            .with_metadata("error", error.to_string()),
        );
        ApplicationError::Persistence(error.to_string())
    }
}

fn missing_order_field(field: &str) -> ApplicationError {
    // The validator guarantees completeness before execution, so hitting
    // this means an internal invariant broke.
    ApplicationError::Domain(DomainError::InvariantViolation(format!(
        "create_order executed without `{field}`"
    )))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use cartly_core::audit::InMemoryAuditSink;
    use cartly_core::config::DeliveryConfig;
    use cartly_core::domain::conversation::{
        CartItem, ConversationContext, ConversationId, ConversationState,
    };
    use cartly_core::domain::product::{ProductId, ProductSummary};
    use cartly_core::ports::{
        ConversationStore, DeliveryFailure, MessageSender, ProductLookup,
    };
    use cartly_db::{InMemoryConversationStore, InMemoryOrderStore, InMemoryProductLookup};

    use crate::director::Director;
    use crate::fastlane::FastLane;
    use crate::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, TokenUsage};
    use crate::lock::{LockType, ProcessingLockManager};
    use crate::metering::InMemoryUsageRecorder;
    use crate::tools::ToolRegistry;
    use crate::validator::ActionValidator;

    use super::{
        InboundAttachment, InboundMessage, Orchestrator, OrchestratorSettings, ProcessOutcome,
    };

    struct ScriptedLlmClient {
        responses: Mutex<VecDeque<Result<CompletionResponse, LlmError>>>,
    }

    impl ScriptedLlmClient {
        fn new(responses: Vec<Result<CompletionResponse, LlmError>>) -> Self {
            Self { responses: Mutex::new(responses.into()) }
        }

        fn unreachable() -> Self {
            Self::new(Vec::new())
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlmClient {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            let next = {
                let mut responses = self.responses.lock().expect("scripted responses");
                responses.pop_front()
            };
            next.unwrap_or_else(|| Err(LlmError::Transport("no scripted response".to_string())))
        }
    }

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingSender {
        fn failing() -> Self {
            Self { sent: Mutex::new(Vec::new()), fail: true }
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().expect("sent messages").clone()
        }
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        async fn send_text(&self, _id: &ConversationId, text: &str) -> Result<(), DeliveryFailure> {
            if self.fail {
                return Err(DeliveryFailure("simulated outage".to_string()));
            }
            self.sent.lock().expect("sent messages").push(text.to_string());
            Ok(())
        }
    }

    fn catalog() -> Vec<ProductSummary> {
        vec![ProductSummary {
            id: ProductId("shirt-classic".to_string()),
            name: "Classic Shirt".to_string(),
            unit_price: Decimal::new(79_900, 2),
            stock: 12,
            variants: Vec::new(),
            active: true,
        }]
    }

    struct Harness {
        orchestrator: Orchestrator,
        store: Arc<InMemoryConversationStore>,
        orders: Arc<InMemoryOrderStore>,
        sender: Arc<RecordingSender>,
        usage: InMemoryUsageRecorder,
        locks: Arc<ProcessingLockManager>,
        audit: InMemoryAuditSink,
    }

    fn harness(llm: ScriptedLlmClient, sender: RecordingSender) -> Harness {
        let store = Arc::new(InMemoryConversationStore::default());
        let orders = Arc::new(InMemoryOrderStore::default());
        let products: Arc<dyn ProductLookup> =
            Arc::new(InMemoryProductLookup::with_products(catalog()));
        let sender = Arc::new(sender);
        let usage = InMemoryUsageRecorder::default();
        let audit = InMemoryAuditSink::default();
        let locks = Arc::new(ProcessingLockManager::with_system_clock());
        let delivery = DeliveryConfig {
            in_city_fee_cents: 6_000,
            out_of_city_fee_cents: 12_000,
            city_keywords: vec!["dhaka".to_string()],
        };

        let director = Director::new(
            Arc::new(llm),
            Arc::new(ToolRegistry::default()),
            Arc::new(usage.clone()),
            "gpt-4o-mini",
            Duration::from_millis(250),
            256,
        );

        let orchestrator = Orchestrator::new(
            Arc::clone(&store) as Arc<dyn ConversationStore>,
            Arc::clone(&products),
            Arc::clone(&orders) as _,
            Arc::clone(&sender) as _,
            Arc::new(audit.clone()),
            Arc::clone(&locks),
            FastLane::new(delivery.clone()),
            director,
            ActionValidator::new(Arc::clone(&products)),
            delivery,
            OrchestratorSettings {
                bot_lock_ttl: Duration::from_secs(30),
                owner_wait_timeout: Duration::from_millis(100),
                history_turns: 10,
            },
        );

        Harness { orchestrator, store, orders, sender, usage, locks, audit }
    }

    fn text_message(id: &str, text: &str) -> InboundMessage {
        InboundMessage {
            conversation_id: ConversationId(id.to_string()),
            text: Some(text.to_string()),
            attachments: Vec::new(),
        }
    }

    async fn seed_context(harness: &Harness, id: &str, context: &ConversationContext) {
        harness.store.save(&ConversationId(id.to_string()), context).await.expect("seed");
    }

    fn awaiting_phone_context() -> ConversationContext {
        let mut context = ConversationContext::default();
        context.state = ConversationState::AwaitingPhone;
        context.customer.name = Some("Rahim Uddin".to_string());
        context.cart.push(CartItem {
            product_id: ProductId("shirt-classic".to_string()),
            variant: None,
            quantity: 1,
            unit_price: Decimal::new(79_900, 2),
        });
        context
    }

    #[tokio::test]
    async fn bare_phone_resolves_in_the_fast_lane_with_zero_ai_usage() {
        let harness = harness(ScriptedLlmClient::unreachable(), RecordingSender::default());
        seed_context(&harness, "wa-1", &awaiting_phone_context()).await;

        let outcome = harness
            .orchestrator
            .process_inbound_message(text_message("wa-1", "01712345678"))
            .await
            .expect("processed");

        assert_eq!(
            outcome,
            ProcessOutcome {
                reply_sent: true,
                new_state: ConversationState::AwaitingAddress,
                flagged_for_human: false,
            }
        );

        let saved = harness
            .store
            .load(&ConversationId("wa-1".to_string()))
            .await
            .expect("load")
            .expect("saved");
        assert_eq!(saved.customer.phone.as_deref(), Some("01712345678"));
        assert!(harness.usage.records().is_empty(), "fast lane must not cost AI tokens");
    }

    #[tokio::test]
    async fn held_bot_lock_skips_processing_and_flags_for_human() {
        let harness = harness(ScriptedLlmClient::unreachable(), RecordingSender::default());
        seed_context(&harness, "wa-1", &awaiting_phone_context()).await;

        harness.locks.acquire("wa-1", LockType::BotProcessing, Duration::from_secs(30));

        let outcome = harness
            .orchestrator
            .process_inbound_message(text_message("wa-1", "01712345678"))
            .await
            .expect("processed");

        assert!(outcome.flagged_for_human);
        assert!(!outcome.reply_sent);
        assert!(harness.sender.sent().is_empty(), "no reply may be sent while locked");
    }

    #[tokio::test]
    async fn low_confidence_director_decision_becomes_a_clarification() {
        let harness = harness(
            ScriptedLlmClient::new(vec![Ok(CompletionResponse {
                content: Some(
                    r#"{"action":"add_to_cart","target_state":"browsing","reply":"Added 5 shirts!","confidence":0.3,"items":[{"product_id":"shirt-classic","quantity":5}]}"#
                        .to_string(),
                ),
                tool_calls: Vec::new(),
                usage: TokenUsage { input_tokens: 100, output_tokens: 30 },
            })]),
            RecordingSender::default(),
        );

        let mut context = ConversationContext::default();
        context.state = ConversationState::Browsing;
        seed_context(&harness, "wa-1", &context).await;

        let outcome = harness
            .orchestrator
            .process_inbound_message(text_message("wa-1", "maybe shirts or something?"))
            .await
            .expect("processed");

        assert!(outcome.reply_sent);
        assert!(!outcome.flagged_for_human);

        let saved = harness
            .store
            .load(&ConversationId("wa-1".to_string()))
            .await
            .expect("load")
            .expect("saved");
        assert!(saved.cart.is_empty(), "the shaky proposal must not execute");

        let sent = harness.sender.sent();
        assert_eq!(sent.len(), 1);
        assert!(!sent[0].contains("Added"), "model's reply must not be used");
    }

    #[tokio::test]
    async fn model_outage_yields_apology_and_escalation_flag() {
        let harness = harness(
            ScriptedLlmClient::new(vec![Err(LlmError::Transport("boom".to_string()))]),
            RecordingSender::default(),
        );

        let mut context = ConversationContext::default();
        context.state = ConversationState::Browsing;
        seed_context(&harness, "wa-1", &context).await;

        let outcome = harness
            .orchestrator
            .process_inbound_message(text_message("wa-1", "something the fast lane cannot parse"))
            .await
            .expect("processed");

        assert!(outcome.flagged_for_human);
        assert_eq!(outcome.new_state, ConversationState::HumanHandoff);
        assert!(harness.sender.sent()[0].contains("Sorry"));
    }

    #[tokio::test]
    async fn image_only_message_is_queued_and_acknowledged() {
        let harness = harness(ScriptedLlmClient::unreachable(), RecordingSender::default());

        let outcome = harness
            .orchestrator
            .process_inbound_message(InboundMessage {
                conversation_id: ConversationId("wa-1".to_string()),
                text: None,
                attachments: vec![InboundAttachment {
                    media_id: "media-1".to_string(),
                    caption: Some("do you have this?".to_string()),
                }],
            })
            .await
            .expect("processed");

        assert!(outcome.reply_sent);
        assert!(!outcome.flagged_for_human);
        assert!(harness.usage.records().is_empty(), "image intake must not call the model");

        let saved = harness
            .store
            .load(&ConversationId("wa-1".to_string()))
            .await
            .expect("load")
            .expect("saved");
        assert_eq!(saved.pending_images.len(), 1);
    }

    #[tokio::test]
    async fn confirmed_order_is_created_and_cart_cleared() {
        let harness = harness(ScriptedLlmClient::unreachable(), RecordingSender::default());

        let mut context = awaiting_phone_context();
        context.state = ConversationState::ConfirmingOrder;
        context.customer.phone = Some("01712345678".to_string());
        context.customer.address = Some("House 12, Dhanmondi, Dhaka".to_string());
        seed_context(&harness, "wa-1", &context).await;

        let outcome = harness
            .orchestrator
            .process_inbound_message(text_message("wa-1", "yes"))
            .await
            .expect("processed");

        assert_eq!(outcome.new_state, ConversationState::OrderPlaced);

        let orders = harness.orders.created_orders().await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].phone, "01712345678");
        assert_eq!(orders[0].delivery_fee, Decimal::new(6_000, 2));

        let saved = harness
            .store
            .load(&ConversationId("wa-1".to_string()))
            .await
            .expect("load")
            .expect("saved");
        assert!(saved.cart.is_empty(), "order placement clears the cart");
    }

    #[tokio::test]
    async fn delivery_outage_flags_but_does_not_error() {
        let harness = harness(ScriptedLlmClient::unreachable(), RecordingSender::failing());
        seed_context(&harness, "wa-1", &awaiting_phone_context()).await;

        let outcome = harness
            .orchestrator
            .process_inbound_message(text_message("wa-1", "01712345678"))
            .await
            .expect("processed despite send failure");

        assert!(!outcome.reply_sent);
        assert!(outcome.flagged_for_human);

        // State was persisted before the send attempt.
        let saved = harness
            .store
            .load(&ConversationId("wa-1".to_string()))
            .await
            .expect("load")
            .expect("saved");
        assert_eq!(saved.state, ConversationState::AwaitingAddress);
    }

    #[tokio::test]
    async fn operator_override_uses_the_clearing_policy() {
        let harness = harness(ScriptedLlmClient::unreachable(), RecordingSender::default());

        let mut context = awaiting_phone_context();
        context.customer.phone = Some("01712345678".to_string());
        seed_context(&harness, "wa-1", &context).await;

        let new_state = harness
            .orchestrator
            .force_state(&ConversationId("wa-1".to_string()), ConversationState::Browsing)
            .await
            .expect("forced");

        assert_eq!(new_state, ConversationState::Browsing);
        let saved = harness
            .store
            .load(&ConversationId("wa-1".to_string()))
            .await
            .expect("load")
            .expect("saved");
        assert_eq!(saved.customer.phone, None, "staged fields cleared on forced transition");
        assert!(harness.locks.is_locked("wa-1").is_none(), "override releases its lock");
    }

    #[tokio::test]
    async fn validation_rejection_is_audited_with_a_reason_code() {
        let harness = harness(
            ScriptedLlmClient::new(vec![Ok(CompletionResponse {
                content: Some(
                    r#"{"action":"add_to_cart","target_state":"browsing","reply":"Done","confidence":0.95,"items":[{"product_id":"imaginary-hoodie","quantity":1}]}"#
                        .to_string(),
                ),
                tool_calls: Vec::new(),
                usage: TokenUsage { input_tokens: 90, output_tokens: 25 },
            })]),
            RecordingSender::default(),
        );

        let mut context = ConversationContext::default();
        context.state = ConversationState::Browsing;
        seed_context(&harness, "wa-1", &context).await;

        harness
            .orchestrator
            .process_inbound_message(text_message("wa-1", "give me the hoodie"))
            .await
            .expect("processed");

        let events = harness.audit.events();
        let rejection = events
            .iter()
            .find(|event| event.event_type == "validation.rejected")
            .expect("rejection audited");
        assert_eq!(
            rejection.metadata.get("reason_code").map(String::as_str),
            Some("unknown_product")
        );
    }
}
