//! Chat front-end for taskbot.
//!
//! - **Events** (`events`) - raw inbound updates and their normalized `Situation`
//! - **Registry** (`registry`) - command key → handler tables for text and button callbacks
//! - **Dispatcher** (`dispatcher`) - literal → dialog cursor → localized label resolution
//! - **Runner** (`runner`) - update loop with reconnect backoff and per-event scheduling
//! - **Markup** (`markup`) - reply and inline keyboards
//! - **Transport** (`transport`) - outbound message sink
//! - **Handlers** (`handlers`) - registration, team and task dialogs
//!
//! ```text
//! UpdateSource → UpdateRunner → Dispatcher → Handler → repositories / sessions
//!                                               ↓
//!                                         ChatTransport
//! ```

pub mod dispatcher;
pub mod events;
pub mod handlers;
pub mod markup;
pub mod registry;
pub mod runner;
pub mod transport;

pub use dispatcher::{DispatchOutcome, Dispatcher, DropReason, Resolution};
pub use handlers::{callback_registry, message_registry, BotService, BotServiceParts};
pub use events::{normalize, InboundEvent, Normalized, Payload, SenderProfile, Situation};
pub use registry::{bind, CallbackRegistry, Handler, HandlerError, HandlerRegistry, MessageRegistry};
pub use runner::{ChannelSource, ReconnectPolicy, RunnerError, UpdateRunner, UpdateSource};
pub use transport::{ChatTransport, NoopTransport, OutboundMessage, TransportError};
