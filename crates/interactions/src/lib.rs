//! Interaction routing and execution
//!
//! The stateful half of the interaction layer:
//! - **Registry** (`registry`) - the command/component/modal tree built at
//!   process start, and resolution of inbound interactions against it
//! - **Handlers** (`handler`) - the cooperative handler contract: a task
//!   emitting outgoing messages over a bounded channel
//! - **Engine** (`engine`) - the per-interaction state machine enforcing
//!   the acknowledgement deadline and the one-create-many-followups rule
//! - **Checks** (`checks`) - ordered predicates evaluated before handlers
//! - **State** (`state`) - the TTL correlation store bridging multi-step
//!   flows across otherwise stateless webhook calls
//! - **Reports** (`reports`) - failure persistence with operator-facing
//!   error ids

pub mod checks;
pub mod engine;
pub mod handler;
pub mod registry;
pub mod reports;
pub mod state;

pub use engine::{DeliveryError, Engine, ResponseDelivery};
pub use handler::{Args, HandlerContext, HandlerError, InteractionHandler, Responder};
pub use registry::{Registry, RegistryError};
pub use state::{CorrelationStore, WaitTimeout};
