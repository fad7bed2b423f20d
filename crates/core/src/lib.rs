pub mod audit;
pub mod config;
pub mod context;
pub mod domain;
pub mod errors;
pub mod ports;

pub use audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use context::{apply_update, transition_context, ClearedField};
pub use domain::conversation::{
    CartItem, ConversationContext, ConversationId, ConversationState, CustomerDetails,
    PendingImage, ShownProduct, MAX_PENDING_IMAGES,
};
pub use domain::decision::{
    CartRequest, ContextField, ContextUpdate, DecisionAction, DecisionSource, DirectorDecision,
};
pub use domain::order::{OrderDraft, OrderId, OrderLine, OrderStatus, OrderSummary};
pub use domain::product::{ProductId, ProductSummary, ProductVariant};
pub use errors::{ApplicationError, DomainError};
pub use ports::{
    ConversationStore, ConversationTurn, DeliveryFailure, MessageSender, OrderStore,
    ProductLookup, StorageFailure, TurnRole, UsageKind, UsageRecord, UsageRecorder,
};
