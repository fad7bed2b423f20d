//! Context Manager: computes the next conversation context for a state
//! transition and reports exactly which fields were dropped, so stale data
//! from an abandoned flow can never resurface in the next one.

use serde::{Deserialize, Serialize};

use crate::domain::conversation::{ConversationContext, ConversationState};
use crate::domain::decision::{ContextField, ContextUpdate};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClearedField {
    Cart,
    CustomerName,
    CustomerPhone,
    CustomerAddress,
    ShownProducts,
    PendingImages,
    Scratch,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct ClearingPolicy {
    cart: bool,
    customer_name: bool,
    customer_phone: bool,
    customer_address: bool,
    shown_products: bool,
    pending_images: bool,
    scratch: bool,
}

/// The fixed clearing policy applied when *entering* each state. The match
/// is total: declaring a new state without deciding its policy is a compile
/// error, not a runtime guess.
fn clearing_policy(state: ConversationState) -> ClearingPolicy {
    use ConversationState::{
        AwaitingAddress, AwaitingName, AwaitingPhone, Browsing, ConfirmingOrder, Greeting,
        HumanHandoff, Idle, OrderPlaced,
    };

    match state {
        Greeting => ClearingPolicy { shown_products: true, scratch: true, ..Default::default() },
        // Returning to browsing abandons any checkout in progress: staged
        // customer fields must not leak into a later checkout.
        Browsing => ClearingPolicy {
            customer_name: true,
            customer_phone: true,
            customer_address: true,
            ..Default::default()
        },
        AwaitingName | AwaitingPhone | AwaitingAddress | ConfirmingOrder => {
            ClearingPolicy::default()
        }
        OrderPlaced => ClearingPolicy {
            cart: true,
            shown_products: true,
            scratch: true,
            ..Default::default()
        },
        HumanHandoff => ClearingPolicy { scratch: true, ..Default::default() },
        Idle => ClearingPolicy {
            cart: true,
            shown_products: true,
            pending_images: true,
            scratch: true,
            ..Default::default()
        },
    }
}

/// Computes the next context for a transition into `target`.
///
/// Pure and deterministic: identical inputs always produce identical output.
/// `cleared` reports only fields whose value was actually dropped, which
/// makes the function idempotent: applying the same transition twice
/// returns the same context and an empty `cleared` list.
pub fn transition_context(
    current: &ConversationContext,
    target: ConversationState,
) -> (ConversationContext, Vec<ClearedField>) {
    let policy = clearing_policy(target);
    let mut next = current.clone();
    let mut cleared = Vec::new();

    next.state = target;

    if policy.cart && !next.cart.is_empty() {
        next.cart.clear();
        cleared.push(ClearedField::Cart);
    }
    if policy.customer_name && next.customer.name.take().is_some() {
        cleared.push(ClearedField::CustomerName);
    }
    if policy.customer_phone && next.customer.phone.take().is_some() {
        cleared.push(ClearedField::CustomerPhone);
    }
    if policy.customer_address && next.customer.address.take().is_some() {
        cleared.push(ClearedField::CustomerAddress);
    }
    if policy.shown_products && !next.shown_products.is_empty() {
        next.shown_products.clear();
        cleared.push(ClearedField::ShownProducts);
    }
    if policy.pending_images && !next.pending_images.is_empty() {
        next.pending_images.clear();
        cleared.push(ClearedField::PendingImages);
    }
    if policy.scratch && !next.scratch.is_empty() {
        next.scratch.clear();
        cleared.push(ClearedField::Scratch);
    }

    (next, cleared)
}

/// Applies a single validated field update to the context. Values arrive
/// here only after the Action Validator has accepted them.
pub fn apply_update(context: &mut ConversationContext, update: &ContextUpdate) {
    match update.field {
        ContextField::CustomerName => context.customer.name = Some(update.value.clone()),
        ContextField::CustomerPhone => context.customer.phone = Some(update.value.clone()),
        ContextField::CustomerAddress => context.customer.address = Some(update.value.clone()),
    }
}
