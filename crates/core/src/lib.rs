//! # Branchloom Core
//!
//! Domain types, collaborator traits, and error definitions for the
//! Branchloom conversation engine. This crate has **no engine logic**: it
//! defines the model that the tree, context and store crates work against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (macro engine, summarizer, session store) is
//! defined as a trait here. Implementations live in their respective crates,
//! so callers can swap them and tests can use stubs.

pub mod error;
pub mod macros;
pub mod message;
pub mod preset;
pub mod session;
pub mod store;
pub mod summarizer;

// Re-export key types at crate root for ergonomics
pub use error::{CollaboratorError, Error, Result, StoreError};
pub use macros::{MacroContext, MacroEngine};
pub use message::{
    AssembledMessage, MessageNode, NodeId, NodeStatus, Provenance, Role, SourceType, WireMessage,
};
pub use preset::{
    AgentTemplate, AnchorPosition, AnchorTarget, InjectionStrategy, PresetKind, PresetMessage,
};
pub use session::{ConversationSession, SessionId, SessionSummary};
pub use store::SessionStore;
pub use summarizer::Summarizer;
