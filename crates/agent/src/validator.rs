//! Action Validator: the safety gate between what the model proposed and
//! what actually happens. Fast Lane decisions pass through unchanged (they
//! are constrained by construction); everything from the AI Director is
//! checked here before it can touch context, cart, or orders.

use std::sync::Arc;

use thiserror::Error;

use cartly_core::domain::conversation::{ConversationContext, ConversationState};
use cartly_core::domain::decision::{
    ContextField, DecisionAction, DecisionSource, DirectorDecision,
};
use cartly_core::domain::product::ProductId;
use cartly_core::errors::ApplicationError;
use cartly_core::ports::ProductLookup;

use crate::fastlane::is_valid_phone;

/// Proposals below this confidence are rejected outright, no matter how
/// plausible the rest of the decision looks.
pub const MIN_CONFIDENCE: f32 = 0.6;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum RejectionReason {
    #[error("confidence {confidence} is below the acting threshold")]
    LowConfidence { confidence: f32 },
    #[error("illegal transition from {from:?} to {to:?}")]
    IllegalTransition { from: ConversationState, to: ConversationState },
    #[error("product `{product_id:?}` does not exist")]
    UnknownProduct { product_id: ProductId },
    #[error("product `{product_id:?}` has no variant `{variant}`")]
    UnknownVariant { product_id: ProductId, variant: String },
    #[error("quantity {quantity} for `{product_id:?}` is not orderable")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },
    #[error("`{product_id:?}` has {available} in stock, {requested} requested")]
    OutOfStock { product_id: ProductId, requested: u32, available: u32 },
    #[error("order is missing required fields: {missing:?}")]
    MissingOrderFields { missing: Vec<&'static str> },
    #[error("`{value}` is not an accepted phone number")]
    MalformedPhone { value: String },
    #[error("update for {field:?} carries an empty value")]
    EmptyFieldValue { field: ContextField },
    #[error("create_order was proposed with an empty cart")]
    EmptyCart,
}

impl RejectionReason {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::LowConfidence { .. } => "low_confidence",
            Self::IllegalTransition { .. } => "illegal_transition",
            Self::UnknownProduct { .. } => "unknown_product",
            Self::UnknownVariant { .. } => "unknown_variant",
            Self::InvalidQuantity { .. } => "invalid_quantity",
            Self::OutOfStock { .. } => "out_of_stock",
            Self::MissingOrderFields { .. } => "missing_order_fields",
            Self::MalformedPhone { .. } => "malformed_phone",
            Self::EmptyFieldValue { .. } => "empty_field_value",
            Self::EmptyCart => "empty_cart",
        }
    }

    /// The deterministic substitute used when a proposal is rejected. The
    /// customer always gets a coherent reply; the raw rejection never
    /// reaches them.
    pub fn fallback(&self, context: &ConversationContext) -> DirectorDecision {
        let stay = context.state;
        let target_or_stay = |target: ConversationState| {
            if context.state.can_transition_to(target) {
                target
            } else {
                stay
            }
        };

        match self {
            Self::MissingOrderFields { missing } => {
                let (target, ask) = match missing.first().copied() {
                    Some("name") => {
                        (ConversationState::AwaitingName, "I still need your name for the order.")
                    }
                    Some("phone") => (
                        ConversationState::AwaitingPhone,
                        "I still need your phone number for the order.",
                    ),
                    _ => (
                        ConversationState::AwaitingAddress,
                        "I still need your delivery address for the order.",
                    ),
                };
                DirectorDecision::fallback(DecisionAction::Clarify, target_or_stay(target), ask)
            }
            Self::MalformedPhone { .. } => DirectorDecision::fallback(
                DecisionAction::Clarify,
                target_or_stay(ConversationState::AwaitingPhone),
                "That phone number doesn't look right. Please send an 11-digit number like \
                 01712345678.",
            ),
            Self::UnknownProduct { .. } | Self::UnknownVariant { .. } => {
                DirectorDecision::fallback(
                    DecisionAction::Clarify,
                    stay,
                    "I couldn't find that item in our catalog. Want me to show you what's \
                     available?",
                )
            }
            Self::OutOfStock { .. } => DirectorDecision::fallback(
                DecisionAction::Reply,
                stay,
                "Sorry, we don't have enough of that item in stock right now. Would you like a \
                 smaller quantity or something similar?",
            ),
            Self::EmptyCart => DirectorDecision::fallback(
                DecisionAction::Reply,
                target_or_stay(ConversationState::Browsing),
                "Your cart is empty, so there is nothing to order yet. Tell me what you'd like!",
            ),
            Self::LowConfidence { .. }
            | Self::IllegalTransition { .. }
            | Self::InvalidQuantity { .. }
            | Self::EmptyFieldValue { .. } => DirectorDecision::fallback(
                DecisionAction::Clarify,
                stay,
                "Sorry, I didn't quite get that. Could you say it a bit differently?",
            ),
        }
    }
}

/// A decision that passed validation (or was constrained by construction).
/// Execution only ever accepts this newtype.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedDecision(DirectorDecision);

impl ValidatedDecision {
    pub(crate) fn constrained(decision: DirectorDecision) -> Self {
        Self(decision)
    }

    pub fn decision(&self) -> &DirectorDecision {
        &self.0
    }

    pub fn into_inner(self) -> DirectorDecision {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ValidationOutcome {
    Accepted(ValidatedDecision),
    Rejected(RejectionReason),
}

pub struct ActionValidator {
    products: Arc<dyn ProductLookup>,
}

impl ActionValidator {
    pub fn new(products: Arc<dyn ProductLookup>) -> Self {
        Self { products }
    }

    /// Runs every check against the proposal. Checks are independent; the
    /// first failure wins. A product-lookup outage is not a rejection; it
    /// propagates as an integration failure.
    pub async fn validate(
        &self,
        decision: DirectorDecision,
        context: &ConversationContext,
    ) -> Result<ValidationOutcome, ApplicationError> {
        if decision.source == DecisionSource::FastLane {
            return Ok(ValidationOutcome::Accepted(ValidatedDecision(decision)));
        }

        if decision.confidence < MIN_CONFIDENCE {
            return Ok(ValidationOutcome::Rejected(RejectionReason::LowConfidence {
                confidence: decision.confidence,
            }));
        }

        if !context.state.can_transition_to(decision.target_state) {
            return Ok(ValidationOutcome::Rejected(RejectionReason::IllegalTransition {
                from: context.state,
                to: decision.target_state,
            }));
        }

        if let Some(reason) = self.check_action(&decision.action, context).await? {
            return Ok(ValidationOutcome::Rejected(reason));
        }

        Ok(ValidationOutcome::Accepted(ValidatedDecision(decision)))
    }

    async fn check_action(
        &self,
        action: &DecisionAction,
        context: &ConversationContext,
    ) -> Result<Option<RejectionReason>, ApplicationError> {
        match action {
            DecisionAction::AddToCart { items } => {
                for item in items {
                    if item.quantity == 0 {
                        return Ok(Some(RejectionReason::InvalidQuantity {
                            product_id: item.product_id.clone(),
                            quantity: item.quantity,
                        }));
                    }
                    if let Some(reason) = self
                        .check_stock(&item.product_id, item.variant.as_deref(), item.quantity)
                        .await?
                    {
                        return Ok(Some(reason));
                    }
                }
                Ok(None)
            }
            DecisionAction::UpdateContext { updates } => {
                for update in updates {
                    if update.value.trim().is_empty() {
                        return Ok(Some(RejectionReason::EmptyFieldValue { field: update.field }));
                    }
                    if update.field == ContextField::CustomerPhone
                        && !is_valid_phone(&update.value)
                    {
                        return Ok(Some(RejectionReason::MalformedPhone {
                            value: update.value.clone(),
                        }));
                    }
                }
                Ok(None)
            }
            DecisionAction::CreateOrder { name, phone, address } => {
                if context.cart.is_empty() {
                    return Ok(Some(RejectionReason::EmptyCart));
                }

                let name = name.as_deref().or(context.customer.name.as_deref());
                let phone = phone.as_deref().or(context.customer.phone.as_deref());
                let address = address.as_deref().or(context.customer.address.as_deref());

                let mut missing = Vec::new();
                if name.map_or(true, |value| value.trim().is_empty()) {
                    missing.push("name");
                }
                if phone.map_or(true, |value| value.trim().is_empty()) {
                    missing.push("phone");
                }
                if address.map_or(true, |value| value.trim().is_empty()) {
                    missing.push("address");
                }
                if !missing.is_empty() {
                    return Ok(Some(RejectionReason::MissingOrderFields { missing }));
                }

                let phone = phone.unwrap_or_default();
                if !is_valid_phone(phone) {
                    return Ok(Some(RejectionReason::MalformedPhone {
                        value: phone.to_string(),
                    }));
                }

                // Stock may have moved since the items were carted;
                // re-verify every line before money changes hands.
                for item in &context.cart {
                    if let Some(reason) = self
                        .check_stock(&item.product_id, item.variant.as_deref(), item.quantity)
                        .await?
                    {
                        return Ok(Some(reason));
                    }
                }
                Ok(None)
            }
            DecisionAction::Reply
            | DecisionAction::EscalateToHuman { .. }
            | DecisionAction::Clarify => Ok(None),
        }
    }

    async fn check_stock(
        &self,
        product_id: &ProductId,
        variant: Option<&str>,
        quantity: u32,
    ) -> Result<Option<RejectionReason>, ApplicationError> {
        let product = self
            .products
            .find(product_id)
            .await
            .map_err(|error| ApplicationError::Integration(error.to_string()))?;

        let Some(product) = product else {
            return Ok(Some(RejectionReason::UnknownProduct { product_id: product_id.clone() }));
        };

        if let Some(variant_name) = variant {
            if !product.has_variant(variant_name) {
                return Ok(Some(RejectionReason::UnknownVariant {
                    product_id: product_id.clone(),
                    variant: variant_name.to_string(),
                }));
            }
        }

        let available = product.available_stock(variant);
        if available < quantity {
            return Ok(Some(RejectionReason::OutOfStock {
                product_id: product_id.clone(),
                requested: quantity,
                available,
            }));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;

    use cartly_core::domain::conversation::{CartItem, ConversationContext, ConversationState};
    use cartly_core::domain::decision::{
        CartRequest, ContextField, ContextUpdate, DecisionAction, DecisionSource, DirectorDecision,
    };
    use cartly_core::domain::product::{ProductId, ProductSummary, ProductVariant};
    use cartly_db::InMemoryProductLookup;

    use super::{ActionValidator, RejectionReason, ValidationOutcome};

    fn catalog() -> Arc<InMemoryProductLookup> {
        Arc::new(InMemoryProductLookup::with_products(vec![ProductSummary {
            id: ProductId("shirt-classic".to_string()),
            name: "Classic Shirt".to_string(),
            unit_price: Decimal::new(79_900, 2),
            stock: 5,
            variants: vec![ProductVariant {
                name: "red / L".to_string(),
                stock: 2,
                unit_price: Decimal::new(84_900, 2),
            }],
            active: true,
        }]))
    }

    fn director_decision(action: DecisionAction, target: ConversationState) -> DirectorDecision {
        DirectorDecision {
            action,
            target_state: target,
            reply: "sounds good".to_string(),
            confidence: 0.9,
            source: DecisionSource::Director,
        }
    }

    fn context_with_cart(state: ConversationState) -> ConversationContext {
        let mut context = ConversationContext::default();
        context.state = state;
        context.cart.push(CartItem {
            product_id: ProductId("shirt-classic".to_string()),
            variant: None,
            quantity: 1,
            unit_price: Decimal::new(79_900, 2),
        });
        context
    }

    async fn expect_rejection(
        decision: DirectorDecision,
        context: &ConversationContext,
    ) -> RejectionReason {
        let validator = ActionValidator::new(catalog());
        match validator.validate(decision, context).await.expect("validate") {
            ValidationOutcome::Rejected(reason) => reason,
            ValidationOutcome::Accepted(accepted) => {
                panic!("expected rejection, got {:?}", accepted.decision())
            }
        }
    }

    #[tokio::test]
    async fn create_order_missing_phone_and_address_is_rejected() {
        let mut context = context_with_cart(ConversationState::ConfirmingOrder);
        context.customer.name = Some("Rahim Uddin".to_string());

        let reason = expect_rejection(
            director_decision(
                DecisionAction::CreateOrder { name: None, phone: None, address: None },
                ConversationState::OrderPlaced,
            ),
            &context,
        )
        .await;

        assert_eq!(
            reason,
            RejectionReason::MissingOrderFields { missing: vec!["phone", "address"] }
        );
    }

    #[tokio::test]
    async fn create_order_can_complete_fields_from_its_payload() {
        let mut context = context_with_cart(ConversationState::ConfirmingOrder);
        context.customer.name = Some("Rahim Uddin".to_string());
        context.customer.phone = Some("01712345678".to_string());

        let validator = ActionValidator::new(catalog());
        let outcome = validator
            .validate(
                director_decision(
                    DecisionAction::CreateOrder {
                        name: None,
                        phone: None,
                        address: Some("House 12, Dhanmondi, Dhaka".to_string()),
                    },
                    ConversationState::OrderPlaced,
                ),
                &context,
            )
            .await
            .expect("validate");

        assert!(matches!(outcome, ValidationOutcome::Accepted(_)));
    }

    #[tokio::test]
    async fn hallucinated_product_is_rejected_even_at_full_confidence() {
        let context = ConversationContext::default();
        let mut decision = director_decision(
            DecisionAction::AddToCart {
                items: vec![CartRequest {
                    product_id: ProductId("imaginary-hoodie".to_string()),
                    variant: None,
                    quantity: 1,
                }],
            },
            ConversationState::Browsing,
        );
        decision.confidence = 1.0;

        let reason = expect_rejection(decision, &context).await;
        assert_eq!(reason.reason_code(), "unknown_product");
    }

    #[tokio::test]
    async fn low_confidence_rejects_regardless_of_other_checks() {
        let context = ConversationContext::default();
        let mut decision = director_decision(DecisionAction::Reply, ConversationState::Browsing);
        decision.confidence = 0.3;

        let reason = expect_rejection(decision, &context).await;
        assert_eq!(reason, RejectionReason::LowConfidence { confidence: 0.3 });
    }

    #[tokio::test]
    async fn illegal_transition_is_rejected() {
        let context = ConversationContext::default();
        let decision = director_decision(DecisionAction::Reply, ConversationState::OrderPlaced);

        let reason = expect_rejection(decision, &context).await;
        assert_eq!(reason.reason_code(), "illegal_transition");
    }

    #[tokio::test]
    async fn out_of_stock_variant_is_rejected() {
        let context = ConversationContext::default();
        let decision = director_decision(
            DecisionAction::AddToCart {
                items: vec![CartRequest {
                    product_id: ProductId("shirt-classic".to_string()),
                    variant: Some("red / L".to_string()),
                    quantity: 3,
                }],
            },
            ConversationState::Browsing,
        );

        let reason = expect_rejection(decision, &context).await;
        assert_eq!(
            reason,
            RejectionReason::OutOfStock {
                product_id: ProductId("shirt-classic".to_string()),
                requested: 3,
                available: 2,
            }
        );
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected() {
        let context = ConversationContext::default();
        let decision = director_decision(
            DecisionAction::AddToCart {
                items: vec![CartRequest {
                    product_id: ProductId("shirt-classic".to_string()),
                    variant: None,
                    quantity: 0,
                }],
            },
            ConversationState::Browsing,
        );

        let reason = expect_rejection(decision, &context).await;
        assert_eq!(reason.reason_code(), "invalid_quantity");
    }

    #[tokio::test]
    async fn malformed_phone_update_is_rejected() {
        let mut context = ConversationContext::default();
        context.state = ConversationState::AwaitingPhone;

        let decision = director_decision(
            DecisionAction::UpdateContext {
                updates: vec![ContextUpdate {
                    field: ContextField::CustomerPhone,
                    value: "12345".to_string(),
                }],
            },
            ConversationState::AwaitingAddress,
        );

        let reason = expect_rejection(decision, &context).await;
        assert_eq!(reason, RejectionReason::MalformedPhone { value: "12345".to_string() });
    }

    #[tokio::test]
    async fn fast_lane_decisions_pass_through_unchanged() {
        let context = ConversationContext::default();
        let decision = DirectorDecision::fast_lane(
            DecisionAction::Reply,
            ConversationState::Greeting,
            "Hello!",
        );

        let validator = ActionValidator::new(catalog());
        let outcome = validator.validate(decision.clone(), &context).await.expect("validate");

        match outcome {
            ValidationOutcome::Accepted(accepted) => {
                assert_eq!(accepted.into_inner(), decision);
            }
            ValidationOutcome::Rejected(reason) => panic!("unexpected rejection: {reason:?}"),
        }
    }

    #[tokio::test]
    async fn missing_field_fallback_asks_for_that_field() {
        let mut context = context_with_cart(ConversationState::ConfirmingOrder);
        context.customer.name = Some("Rahim Uddin".to_string());
        context.customer.address = Some("House 12, Dhanmondi, Dhaka".to_string());

        let reason = RejectionReason::MissingOrderFields { missing: vec!["phone"] };
        let fallback = reason.fallback(&context);

        assert_eq!(fallback.target_state, ConversationState::AwaitingPhone);
        assert_eq!(fallback.source, DecisionSource::Fallback);
        assert!(fallback.reply.contains("phone number"));
    }

    #[tokio::test]
    async fn fallback_never_targets_an_illegal_state() {
        let mut context = ConversationContext::default();
        context.state = ConversationState::HumanHandoff;

        let reason = RejectionReason::MalformedPhone { value: "x".to_string() };
        let fallback = reason.fallback(&context);

        // HumanHandoff cannot reach AwaitingPhone, so the fallback stays put.
        assert_eq!(fallback.target_state, ConversationState::HumanHandoff);
    }
}
