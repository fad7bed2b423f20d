use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;

/// Pending images held back for the next text message. Oldest entries are
/// dropped once the queue is full.
pub const MAX_PENDING_IMAGES: usize = 5;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConversationState {
    Greeting,
    Browsing,
    AwaitingName,
    AwaitingPhone,
    AwaitingAddress,
    ConfirmingOrder,
    OrderPlaced,
    HumanHandoff,
    Idle,
}

impl ConversationState {
    /// Explicit adjacency table for the conversation flow. Staying in the
    /// current state is always legal (plain replies do not move the flow),
    /// and every state may escalate to a human or be parked idle.
    pub fn can_transition_to(&self, next: ConversationState) -> bool {
        use ConversationState::{
            AwaitingAddress, AwaitingName, AwaitingPhone, Browsing, ConfirmingOrder, Greeting,
            HumanHandoff, Idle, OrderPlaced,
        };

        if *self == next {
            return true;
        }

        matches!(
            (self, next),
            (_, HumanHandoff)
                | (_, Idle)
                | (Greeting, Browsing)
                | (Browsing, AwaitingName)
                | (Browsing, AwaitingPhone)
                | (Browsing, ConfirmingOrder)
                | (AwaitingName, AwaitingPhone)
                | (AwaitingName, Browsing)
                | (AwaitingPhone, AwaitingAddress)
                | (AwaitingPhone, Browsing)
                | (AwaitingAddress, ConfirmingOrder)
                | (AwaitingAddress, Browsing)
                | (ConfirmingOrder, OrderPlaced)
                | (ConfirmingOrder, Browsing)
                | (ConfirmingOrder, AwaitingName)
                | (ConfirmingOrder, AwaitingPhone)
                | (ConfirmingOrder, AwaitingAddress)
                | (OrderPlaced, Browsing)
                | (OrderPlaced, Greeting)
                | (HumanHandoff, Browsing)
                | (Idle, Greeting)
                | (Idle, Browsing)
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub variant: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl CartItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl CustomerDetails {
    pub fn is_complete(&self) -> bool {
        self.name.is_some() && self.phone.is_some() && self.address.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingImage {
    pub media_id: String,
    pub caption: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// One entry of the last product list presented to the customer. Numeric
/// item selection ("2") resolves against this list, in display order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShownProduct {
    pub product_id: ProductId,
    pub display_name: String,
}

/// The full working memory for one conversation. Persisted as an opaque
/// JSON value in the conversation row; the Orchestrator re-reads the latest
/// value before every mutation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub state: ConversationState,
    pub cart: Vec<CartItem>,
    pub customer: CustomerDetails,
    pub pending_images: VecDeque<PendingImage>,
    pub shown_products: Vec<ShownProduct>,
    pub scratch: BTreeMap<String, String>,
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self {
            state: ConversationState::Greeting,
            cart: Vec::new(),
            customer: CustomerDetails::default(),
            pending_images: VecDeque::new(),
            shown_products: Vec::new(),
            scratch: BTreeMap::new(),
        }
    }
}

impl ConversationContext {
    pub fn cart_total(&self) -> Decimal {
        self.cart.iter().map(CartItem::line_total).sum()
    }

    /// Appends an image to the bounded queue, dropping the oldest entry
    /// when the cap is reached.
    pub fn push_pending_image(&mut self, image: PendingImage) {
        if self.pending_images.len() >= MAX_PENDING_IMAGES {
            self.pending_images.pop_front();
        }
        self.pending_images.push_back(image);
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::domain::product::ProductId;

    use super::{
        CartItem, ConversationContext, ConversationState, PendingImage, MAX_PENDING_IMAGES,
    };

    #[test]
    fn checkout_chain_is_legal() {
        use ConversationState::{
            AwaitingAddress, AwaitingName, AwaitingPhone, Browsing, ConfirmingOrder, OrderPlaced,
        };

        assert!(Browsing.can_transition_to(AwaitingName));
        assert!(AwaitingName.can_transition_to(AwaitingPhone));
        assert!(AwaitingPhone.can_transition_to(AwaitingAddress));
        assert!(AwaitingAddress.can_transition_to(ConfirmingOrder));
        assert!(ConfirmingOrder.can_transition_to(OrderPlaced));
    }

    #[test]
    fn blocks_skipping_straight_to_order_placed() {
        assert!(!ConversationState::Greeting.can_transition_to(ConversationState::OrderPlaced));
        assert!(!ConversationState::AwaitingPhone.can_transition_to(ConversationState::OrderPlaced));
    }

    #[test]
    fn any_state_can_escalate_or_go_idle() {
        for state in [
            ConversationState::Greeting,
            ConversationState::AwaitingAddress,
            ConversationState::ConfirmingOrder,
            ConversationState::OrderPlaced,
        ] {
            assert!(state.can_transition_to(ConversationState::HumanHandoff));
            assert!(state.can_transition_to(ConversationState::Idle));
        }
    }

    #[test]
    fn self_transition_is_always_legal() {
        assert!(ConversationState::AwaitingPhone.can_transition_to(ConversationState::AwaitingPhone));
    }

    #[test]
    fn pending_image_queue_drops_oldest_on_overflow() {
        let mut context = ConversationContext::default();
        for index in 0..(MAX_PENDING_IMAGES + 2) {
            context.push_pending_image(PendingImage {
                media_id: format!("media-{index}"),
                caption: None,
                received_at: Utc::now(),
            });
        }

        assert_eq!(context.pending_images.len(), MAX_PENDING_IMAGES);
        assert_eq!(context.pending_images.front().map(|image| image.media_id.as_str()), Some("media-2"));
        assert_eq!(context.pending_images.back().map(|image| image.media_id.as_str()), Some("media-6"));
    }

    #[test]
    fn cart_total_sums_line_totals() {
        let mut context = ConversationContext::default();
        context.cart.push(CartItem {
            product_id: ProductId("shirt-classic".to_string()),
            variant: None,
            quantity: 3,
            unit_price: Decimal::new(50_000, 2),
        });
        context.cart.push(CartItem {
            product_id: ProductId("cap-plain".to_string()),
            variant: Some("black".to_string()),
            quantity: 1,
            unit_price: Decimal::new(24_900, 2),
        });

        assert_eq!(context.cart_total(), Decimal::new(174_900, 2));
    }
}
