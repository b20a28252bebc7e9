//! Frame Pipeline Core - configurable stage chains over a shared tray
//!
//! A pipeline is assembled from a topology document (which stages run, and
//! which are grouped under `Parallel`) and a settings document (opaque
//! per-stage configuration). Frames are consumed from a bounded buffer fed by
//! an external producer; for every frame each sub-pipeline runs its stages in
//! order, passing intermediate results through the [`Tray`].

pub mod assembler;
pub mod config;
pub mod error;
pub mod frame_buffer;
pub mod pipeline;
pub mod registry;
pub mod stage;
pub mod tray;

pub use assembler::{assemble, PARALLEL_KEY};
pub use config::ConfigTree;
pub use error::{ConfigError, PipelineError, StageError, TrayError};
pub use frame_buffer::{FrameBuffer, TerminateFlag};
pub use frame_pipeline_common::{Frame, Tag};
pub use pipeline::{Pipeline, PipelineOptions, RunStats, SubPipeline, DEFAULT_OUTPUT_KEY};
pub use registry::{ConfigurableStage, StageFactory, StageRegistry};
pub use stage::{run_stage, Stage, StageOutcome};
pub use tray::{History, Tray, DEFAULT_HISTORY_CAPACITY};
