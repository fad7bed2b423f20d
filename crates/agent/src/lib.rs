//! The decision core of the cartly conversational commerce agent.
//!
//! Per inbound message the pipeline is:
//! 1. **Fast Lane** (`fastlane`): deterministic pattern routing, no model
//!    cost for the common cases
//! 2. **AI Director** (`director`): schema-constrained model decision when
//!    the Fast Lane misses
//! 3. **Action Validator** (`validator`): the guard layer nothing from the
//!    model bypasses
//! 4. **Orchestrator** (`orchestrator`): the only I/O component; loads
//!    context, executes validated decisions, persists, replies
//!
//! The **Processing Lock Manager** (`lock`) serializes the bot and human
//! operators on a single conversation; distinct conversations never
//! contend.
//!
//! # Safety principle
//!
//! The model only ever *proposes*. It cannot change conversation state,
//! touch the cart, or place an order except through a decision that passed
//! the validator, and every decision is bounded by the explicit state
//! adjacency table in `cartly-core`.

pub mod director;
pub mod fastlane;
pub mod llm;
pub mod llm_http;
pub mod lock;
pub mod metering;
pub mod orchestrator;
pub mod tools;
pub mod validator;

pub use director::{Director, DirectorError, DirectorInput, MAX_TOOL_ROUNDS};
pub use fastlane::FastLane;
pub use llm::{ChatMessage, CompletionRequest, CompletionResponse, LlmClient, LlmError};
pub use llm_http::HttpLlmClient;
pub use lock::{Clock, LockInfo, LockType, ManualClock, ProcessingLockManager, SystemClock};
pub use metering::{InMemoryUsageRecorder, LogUsageRecorder};
pub use orchestrator::{
    InboundAttachment, InboundMessage, Orchestrator, OrchestratorSettings, ProcessOutcome,
};
pub use tools::{DeliveryFeeTool, OrderStatusTool, StockLookupTool, Tool, ToolRegistry};
pub use validator::{ActionValidator, RejectionReason, ValidationOutcome, MIN_CONFIDENCE};
