//! Frame Pipeline
//!
//! A configurable frame-processing pipeline: stages are registered by name,
//! assembled into chains from a topology document and run over frames taken
//! from a bounded buffer, sharing intermediate results through a keyed tray.
//!
//! This crate re-exports the workspace crates:
//! - [`core`]: configuration tree, tray, stage contract, registry, assembler
//!   and run loop
//! - [`stages`]: the vision stages and [`stages::register_all_stages`]
//! - [`common`]: shared frame and tag types

pub use frame_pipeline_common as common;
pub use frame_pipeline_core as core;
pub use frame_pipeline_stages as stages;

pub use frame_pipeline_core::{
    ConfigTree, Frame, FrameBuffer, Pipeline, PipelineError, Stage, StageError, StageOutcome,
    StageRegistry, Tag, TerminateFlag, Tray, DEFAULT_OUTPUT_KEY,
};

/// Registry with every stage of [`stages`] registered
pub fn default_registry() -> StageRegistry {
    let mut registry = StageRegistry::new();
    stages::register_all_stages(&mut registry);
    registry
}
