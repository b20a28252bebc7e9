//! Pipeline: owns the assembled stage chains and the tray, and consumes frames

use crate::assembler::assemble;
use crate::config::ConfigTree;
use crate::error::{ConfigError, PipelineError};
use crate::frame_buffer::{FrameBuffer, TerminateFlag};
use crate::registry::StageRegistry;
use crate::stage::{run_stage, Stage, StageOutcome};
use crate::tray::{Tray, DEFAULT_HISTORY_CAPACITY};
use crate::Frame;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Tray key frames are published under when the caller has no preference
pub const DEFAULT_OUTPUT_KEY: &str = "source";

/// Pipeline-level options, read from the `Pipeline` node of the settings document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Capacity of every tray history slot
    pub history_capacity: usize,
    /// Longest blocking wait on an empty buffer before re-checking termination
    pub idle_poll: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            idle_poll: Duration::from_millis(5),
        }
    }
}

impl PipelineOptions {
    pub fn from_settings(settings: &ConfigTree) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let idle_poll_ms = settings.get_or(
            "Pipeline.idle_poll_ms",
            defaults.idle_poll.as_millis() as u64,
        )?;

        Ok(Self {
            history_capacity: settings
                .get_or("Pipeline.history_capacity", defaults.history_capacity)?,
            idle_poll: Duration::from_millis(idle_poll_ms.max(1)),
        })
    }
}

/// One ordered chain of stages
#[derive(Default)]
pub struct SubPipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl SubPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stage: Box<dyn Stage>) {
        self.stages.push(stage);
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run the chain in order, stopping at the first stage that asks to
    pub fn run(&mut self, tray: &mut Tray) -> Result<StageOutcome, PipelineError> {
        for stage in self.stages.iter_mut() {
            match run_stage(stage.as_mut(), tray) {
                Ok(StageOutcome::Continue) => {}
                Ok(StageOutcome::StopChain) => {
                    debug!("Stage {} stopped its chain", stage.name());
                    return Ok(StageOutcome::StopChain);
                }
                Err(source) => {
                    return Err(PipelineError::StageFailed {
                        stage: stage.name().to_string(),
                        source,
                    })
                }
            }
        }
        Ok(StageOutcome::Continue)
    }
}

impl std::fmt::Debug for SubPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubPipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// Statistics from one [`Pipeline::try_run`] call
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub frames_processed: u64,
    /// Sub-pipeline runs cut short by a stage returning `StopChain`
    pub chains_stopped: u64,
    /// Frames the buffer evicted while this run was consuming
    pub frames_dropped: u64,
}

/// An assembled pipeline
///
/// Sub-pipelines run one after another on the calling thread for every frame;
/// the `Parallel` grouping only decides which stages share a chain.
pub struct Pipeline {
    sub_pipelines: Vec<SubPipeline>,
    tray: Tray,
    source: Option<FrameBuffer>,
    options: PipelineOptions,
}

impl Pipeline {
    /// Assemble a pipeline from a topology document and a settings document
    ///
    /// Invalid `Pipeline.*` options fall back to their defaults.
    pub fn new(registry: &StageRegistry, topology: &ConfigTree, settings: &ConfigTree) -> Self {
        let options = PipelineOptions::from_settings(settings).unwrap_or_else(|e| {
            warn!("Ignoring pipeline options: {}", e);
            PipelineOptions::default()
        });
        Self::with_options(registry, topology, settings, options)
    }

    pub fn with_options(
        registry: &StageRegistry,
        topology: &ConfigTree,
        settings: &ConfigTree,
        options: PipelineOptions,
    ) -> Self {
        let sub_pipelines = assemble(registry, topology, settings);

        info!(
            "Pipeline assembled: {} sub-pipelines, {} stages",
            sub_pipelines.len(),
            sub_pipelines.iter().map(SubPipeline::len).sum::<usize>()
        );

        Self {
            sub_pipelines,
            tray: Tray::with_history_capacity(options.history_capacity),
            source: None,
            options,
        }
    }

    /// Bind the buffer frames are consumed from, replacing any previous one
    pub fn register_source_buffer(&mut self, buffer: &FrameBuffer) {
        if self.source.is_some() {
            debug!("Replacing registered source buffer");
        }
        self.source = Some(buffer.clone());
    }

    pub fn sub_pipelines(&self) -> &[SubPipeline] {
        &self.sub_pipelines
    }

    pub fn tray(&self) -> &Tray {
        &self.tray
    }

    pub fn tray_mut(&mut self) -> &mut Tray {
        &mut self.tray
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Consume frames until termination is requested and the buffer is drained
    ///
    /// Returns false when `terminate` is `None`, no buffer is registered, or a
    /// stage failed; true on a clean termination.
    pub fn run(&mut self, terminate: Option<&TerminateFlag>, output_key: &str) -> bool {
        match self.try_run(terminate, output_key) {
            Ok(stats) => {
                info!(
                    "Pipeline finished: {} frames processed, {} chains stopped, {} frames dropped",
                    stats.frames_processed, stats.chains_stopped, stats.frames_dropped
                );
                true
            }
            Err(PipelineError::StageFailed { stage, source }) => {
                error!("Pipeline run failed in stage {}: {}", stage, source);
                false
            }
            Err(e) => {
                error!("Pipeline run failed: {}", e);
                false
            }
        }
    }

    /// [`Pipeline::run`] with the failure and run statistics exposed
    pub fn try_run(
        &mut self,
        terminate: Option<&TerminateFlag>,
        output_key: &str,
    ) -> Result<RunStats, PipelineError> {
        let terminate = terminate.ok_or(PipelineError::TerminationHandleMissing)?;
        let source = self.source.clone().ok_or(PipelineError::NoSourceBuffer)?;

        let start = Instant::now();
        let dropped_before = source.dropped();
        let mut stats = RunStats::default();

        loop {
            let frame = match source.pop() {
                Some(frame) => frame,
                // A frame pushed just before the request is visible once the request is
                None if terminate.is_requested() => match source.pop() {
                    Some(frame) => frame,
                    None => break,
                },
                None => match source.pop_timeout(self.options.idle_poll) {
                    Some(frame) => frame,
                    None => continue,
                },
            };

            if self.process_frame(frame, output_key)? == StageOutcome::StopChain {
                stats.chains_stopped += 1;
            }
            stats.frames_processed += 1;
        }

        stats.frames_dropped = source.dropped().saturating_sub(dropped_before);
        debug!("Run loop exited after {:?}", start.elapsed());
        Ok(stats)
    }

    /// Publish `frame` under `output_key` and run every sub-pipeline over it
    ///
    /// Returns `StopChain` when at least one sub-pipeline was cut short.
    pub fn process_frame(
        &mut self,
        frame: Frame,
        output_key: &str,
    ) -> Result<StageOutcome, PipelineError> {
        debug!("Processing frame {}", frame.number);
        self.tray.set(output_key, frame)?;

        let mut outcome = StageOutcome::Continue;
        for sub_pipeline in &mut self.sub_pipelines {
            if sub_pipeline.run(&mut self.tray)? == StageOutcome::StopChain {
                outcome = StageOutcome::StopChain;
            }
        }
        Ok(outcome)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("sub_pipelines", &self.sub_pipelines)
            .field("tray", &self.tray)
            .field("has_source", &self.source.is_some())
            .field("options", &self.options)
            .finish()
    }
}
