//! Context assembly pipeline.
//!
//! Turns a session, a target node, an agent template and an optional user
//! profile into the exact ordered message list sent to a model backend.
//!
//! | Stage | Module | Notes |
//! |-------|--------|-------|
//! | Classification | [`classifier`] | skeleton / depth / anchor, malformed strategies dropped |
//! | Anchor + depth placement | [`injection`] | anchors first, depth counted from the end |
//! | History compression | [`limiter`] | truncate or summarize, recent turns protected |
//! | Orchestration | [`assembler`] | single async pass, provenance kept |

pub mod assembler;
pub mod classifier;
pub mod injection;
pub mod limiter;
pub mod macros;
pub mod token;

pub use assembler::{AssembledContext, AssemblyMeta, ContextAssembler, ContextError};
pub use classifier::{
    AnchorInjections, ClassifiedPreset, ClassifiedPresets, DepthInjection, InjectionGroup, classify,
};
pub use injection::{AnchorSpan, apply_anchor_injections, apply_depth_injections};
pub use limiter::{CompressionPlan, ContextLimiter, LimiterOutcome};
pub use macros::{PassthroughMacros, VariableMacros};
