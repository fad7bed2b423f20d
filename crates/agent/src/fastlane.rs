//! Fast Lane: deterministic pattern routing for the common, low-ambiguity
//! messages. A hit here resolves the message with zero model cost; a miss
//! escalates to the AI Director.
//!
//! Priority is fixed: interruption intents always run first so a customer
//! can exit any flow, then patterns specific to the current state, then the
//! generic patterns (greeting, item selection).

use rust_decimal::Decimal;

use cartly_core::config::DeliveryConfig;
use cartly_core::domain::conversation::{ConversationContext, ConversationState};
use cartly_core::domain::decision::{
    CartRequest, ContextField, ContextUpdate, DecisionAction, DirectorDecision,
};

pub struct FastLane {
    delivery: DeliveryConfig,
}

impl FastLane {
    pub fn new(delivery: DeliveryConfig) -> Self {
        Self { delivery }
    }

    /// Routes a message to a decision, or `None` to escalate to the AI
    /// Director. Never mutates the context; it only proposes.
    pub fn route(&self, text: &str, context: &ConversationContext) -> Option<DirectorDecision> {
        let normalized = normalize_text(text);
        if normalized.is_empty() {
            return None;
        }

        if let Some(decision) = route_interruption(&normalized, context) {
            return Some(decision);
        }

        let state_specific = match context.state {
            ConversationState::ConfirmingOrder => self.route_confirmation(&normalized, context),
            ConversationState::AwaitingPhone => route_phone(text),
            ConversationState::AwaitingAddress => self.route_address(text, context),
            ConversationState::AwaitingName => route_name(text),
            _ => None,
        };
        if let Some(decision) = state_specific {
            return Some(decision);
        }

        if let Some(decision) = route_greeting(&normalized, context) {
            return Some(decision);
        }
        if let Some(decision) = route_item_selection(&normalized, context) {
            return Some(decision);
        }
        if let Some(decision) = route_take_all(&normalized, context) {
            return Some(decision);
        }

        None
    }

    fn route_confirmation(
        &self,
        normalized: &str,
        context: &ConversationContext,
    ) -> Option<DirectorDecision> {
        if is_affirmative(normalized) {
            if context.cart.is_empty() {
                return Some(DirectorDecision::fast_lane(
                    DecisionAction::Reply,
                    ConversationState::Browsing,
                    "Your cart is empty, so there is nothing to order yet. Tell me what you'd like!",
                ));
            }

            // Confirmation can only create an order once every customer
            // field is on file; otherwise redirect to the first gap.
            if let Some(decision) = redirect_for_missing_field(context) {
                return Some(decision);
            }

            let address = context.customer.address.as_deref().unwrap_or_default();
            let fee = Decimal::new(self.delivery.fee_cents_for(address), 2);
            let total = context.cart_total() + fee;
            return Some(DirectorDecision::fast_lane(
                DecisionAction::CreateOrder { name: None, phone: None, address: None },
                ConversationState::OrderPlaced,
                format!(
                    "Perfect! Your order of Tk {total} (including Tk {fee} delivery) is placed. \
                     We'll reach you on {} before delivery. Thank you!",
                    context.customer.phone.as_deref().unwrap_or("your number"),
                ),
            ));
        }

        if is_negative(normalized) {
            return Some(DirectorDecision::fast_lane(
                DecisionAction::Reply,
                ConversationState::Browsing,
                "Okay, I won't place the order. Your cart is saved, so tell me if you'd like to \
                 change anything.",
            ));
        }

        None
    }

    fn route_address(&self, text: &str, context: &ConversationContext) -> Option<DirectorDecision> {
        let trimmed = text.trim();
        if !is_plausible_address(trimmed) {
            return None;
        }

        let fee = Decimal::new(self.delivery.fee_cents_for(trimmed), 2);
        let total = context.cart_total() + fee;
        let summary = cart_summary(context);

        Some(DirectorDecision::fast_lane(
            DecisionAction::UpdateContext {
                updates: vec![ContextUpdate {
                    field: ContextField::CustomerAddress,
                    value: trimmed.to_string(),
                }],
            },
            ConversationState::ConfirmingOrder,
            format!(
                "Here is your order:\n{summary}Delivery: Tk {fee}\nTotal: Tk {total}\n\
                 Shall I place the order? (yes/no)"
            ),
        ))
    }
}

fn route_interruption(
    normalized: &str,
    context: &ConversationContext,
) -> Option<DirectorDecision> {
    if wants_human(normalized) {
        return Some(DirectorDecision::fast_lane(
            DecisionAction::EscalateToHuman { reason: "customer asked for a person".to_string() },
            ConversationState::HumanHandoff,
            "Of course. I'm connecting you with one of our team members. \
             Someone will reply here shortly.",
        ));
    }

    if is_cancel(normalized) {
        let reply = if context.state == ConversationState::Browsing {
            "No problem. Tell me whenever you'd like to see something."
        } else {
            "No problem. I've cancelled that. You can keep browsing or ask me anything."
        };
        return Some(DirectorDecision::fast_lane(
            DecisionAction::Reply,
            ConversationState::Browsing,
            reply,
        ));
    }

    None
}

fn route_phone(text: &str) -> Option<DirectorDecision> {
    let phone = normalize_phone(text)?;

    Some(DirectorDecision::fast_lane(
        DecisionAction::UpdateContext {
            updates: vec![ContextUpdate { field: ContextField::CustomerPhone, value: phone }],
        },
        ConversationState::AwaitingAddress,
        "Got it! Now the full delivery address, please.",
    ))
}

fn route_name(text: &str) -> Option<DirectorDecision> {
    let trimmed = text.trim();
    if !is_plausible_name(trimmed) {
        return None;
    }

    Some(DirectorDecision::fast_lane(
        DecisionAction::UpdateContext {
            updates: vec![ContextUpdate {
                field: ContextField::CustomerName,
                value: trimmed.to_string(),
            }],
        },
        ConversationState::AwaitingPhone,
        format!("Thanks, {trimmed}! What's your phone number?"),
    ))
}

fn route_greeting(normalized: &str, context: &ConversationContext) -> Option<DirectorDecision> {
    if !is_greeting(normalized) {
        return None;
    }

    let target = match context.state {
        ConversationState::Greeting
        | ConversationState::Idle
        | ConversationState::OrderPlaced => ConversationState::Greeting,
        ConversationState::Browsing => ConversationState::Browsing,
        // Mid-checkout greetings are ambiguous; let the Director read them.
        _ => return None,
    };

    Some(DirectorDecision::fast_lane(
        DecisionAction::Reply,
        target,
        "Hello! Welcome to our shop. Tell me what you're looking for, or send a photo of a \
         product you like.",
    ))
}

fn route_item_selection(
    normalized: &str,
    context: &ConversationContext,
) -> Option<DirectorDecision> {
    if !selection_state(context.state) || context.shown_products.is_empty() {
        return None;
    }

    let index: usize = normalized.parse().ok()?;
    if index == 0 || index > context.shown_products.len() {
        return None;
    }

    let chosen = &context.shown_products[index - 1];
    Some(DirectorDecision::fast_lane(
        DecisionAction::AddToCart {
            items: vec![CartRequest {
                product_id: chosen.product_id.clone(),
                variant: None,
                quantity: 1,
            }],
        },
        ConversationState::Browsing,
        format!(
            "Added {} to your cart. Anything else, or shall we check out?",
            chosen.display_name
        ),
    ))
}

fn route_take_all(normalized: &str, context: &ConversationContext) -> Option<DirectorDecision> {
    if !selection_state(context.state) || context.shown_products.is_empty() {
        return None;
    }
    if !is_take_all(normalized) {
        return None;
    }

    let items = context
        .shown_products
        .iter()
        .map(|shown| CartRequest { product_id: shown.product_id.clone(), variant: None, quantity: 1 })
        .collect();

    Some(DirectorDecision::fast_lane(
        DecisionAction::AddToCart { items },
        ConversationState::Browsing,
        format!(
            "Great, added all {} items to your cart. Anything else, or shall we check out?",
            context.shown_products.len()
        ),
    ))
}

/// Redirects a confirmation towards the first missing customer field, so a
/// "yes" can never turn into a partially specified order.
fn redirect_for_missing_field(context: &ConversationContext) -> Option<DirectorDecision> {
    if context.customer.name.is_none() {
        return Some(DirectorDecision::fast_lane(
            DecisionAction::Clarify,
            ConversationState::AwaitingName,
            "Almost there. I still need your name for the order.",
        ));
    }
    if context.customer.phone.is_none() {
        return Some(DirectorDecision::fast_lane(
            DecisionAction::Clarify,
            ConversationState::AwaitingPhone,
            "Almost there. I still need your phone number for the order.",
        ));
    }
    if context.customer.address.is_none() {
        return Some(DirectorDecision::fast_lane(
            DecisionAction::Clarify,
            ConversationState::AwaitingAddress,
            "Almost there. I still need your delivery address.",
        ));
    }
    None
}

fn selection_state(state: ConversationState) -> bool {
    matches!(
        state,
        ConversationState::Greeting
            | ConversationState::Browsing
            | ConversationState::Idle
            | ConversationState::OrderPlaced
    )
}

fn cart_summary(context: &ConversationContext) -> String {
    let mut summary = String::new();
    for item in &context.cart {
        let name = item.variant.as_ref().map_or_else(
            || item.product_id.0.clone(),
            |variant| format!("{} ({variant})", item.product_id.0),
        );
        summary.push_str(&format!("- {name} x{} = Tk {}\n", item.quantity, item.line_total()));
    }
    summary
}

fn normalize_text(text: &str) -> String {
    text.trim().to_ascii_lowercase()
}

fn is_affirmative(normalized: &str) -> bool {
    matches!(
        normalized,
        "yes" | "y" | "yeah" | "yep" | "ok" | "okay" | "confirm" | "confirmed" | "sure" | "done"
            | "ji" | "hmm" | "right"
    )
}

fn is_negative(normalized: &str) -> bool {
    matches!(normalized, "no" | "n" | "nope" | "nah" | "not now" | "later")
}

fn is_cancel(normalized: &str) -> bool {
    let exact = matches!(normalized, "cancel" | "stop" | "restart" | "reset" | "start over" | "menu");
    exact || normalized.starts_with("cancel ")
}

fn wants_human(normalized: &str) -> bool {
    const HUMAN_PHRASES: &[&str] =
        &["human", "real person", "talk to someone", "agent", "operator", "customer care"];
    HUMAN_PHRASES.iter().any(|phrase| normalized.contains(phrase))
}

fn is_greeting(normalized: &str) -> bool {
    let first = normalized.split_whitespace().next().unwrap_or_default();
    matches!(
        first,
        "hi" | "hello" | "hey" | "hlw" | "salam" | "assalamualaikum" | "asalamualaikum"
    ) && normalized.split_whitespace().count() <= 3
}

fn is_take_all(normalized: &str) -> bool {
    matches!(normalized, "all" | "take all" | "i want all" | "i'll take all" | "everything")
        || normalized.contains("all of these")
        || normalized.contains("all of them")
}

/// Accepts local `01XXXXXXXXX` numbers and the `+880`/`880` international
/// form, with spaces, dashes, and parentheses tolerated.
pub fn normalize_phone(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed
        .chars()
        .any(|ch| !(ch.is_ascii_digit() || matches!(ch, ' ' | '-' | '+' | '(' | ')')))
    {
        return None;
    }

    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if digits.len() == 11 && digits.starts_with("01") {
        return Some(digits);
    }
    if digits.len() == 13 && digits.starts_with("8801") {
        return Some(format!("0{}", &digits[3..]));
    }

    None
}

pub fn is_valid_phone(text: &str) -> bool {
    normalize_phone(text).is_some()
}

fn is_plausible_address(text: &str) -> bool {
    if text.len() < 10 || is_valid_phone(text) {
        return false;
    }
    text.split_whitespace().count() >= 2
}

fn is_plausible_name(text: &str) -> bool {
    let token_count = text.split_whitespace().count();
    if token_count == 0 || token_count > 4 || text.len() > 48 {
        return false;
    }
    if is_greeting(&normalize_text(text)) || is_affirmative(&normalize_text(text)) {
        return false;
    }
    text.chars().all(|ch| ch.is_alphabetic() || matches!(ch, ' ' | '.' | '-' | '\''))
}
