//! Run command - feed image files through an assembled pipeline

use anyhow::{Context as _, Result};
use clap::Args;
use frame_pipeline_core::{
    ConfigTree, Frame, FrameBuffer, Pipeline, StageRegistry, TerminateFlag, DEFAULT_OUTPUT_KEY,
};
use frame_pipeline_stages::register_all_stages;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Args)]
pub struct RunCommand {
    /// Image files, one frame each, in stream order
    #[arg(value_name = "IMAGE", required = true)]
    inputs: Vec<PathBuf>,

    /// Topology document (YAML or JSON)
    #[arg(short, long)]
    topology: PathBuf,

    /// Settings document (YAML or JSON)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Frames the buffer holds before the oldest is dropped
    #[arg(long, default_value = "16")]
    buffer_capacity: usize,

    /// Tray key frames are published under
    #[arg(long, default_value = DEFAULT_OUTPUT_KEY)]
    output_key: String,
}

impl RunCommand {
    pub fn execute(self) -> Result<()> {
        let start = Instant::now();

        let topology = ConfigTree::from_file(&self.topology).with_context(|| {
            format!("Failed to load topology from {}", self.topology.display())
        })?;
        let settings = match &self.settings {
            Some(path) => ConfigTree::from_file(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => ConfigTree::new(),
        };

        let mut registry = StageRegistry::new();
        register_all_stages(&mut registry);

        let mut pipeline = Pipeline::new(&registry, &topology, &settings);
        let buffer = FrameBuffer::new(self.buffer_capacity);
        pipeline.register_source_buffer(&buffer);

        let terminate = TerminateFlag::new();
        let producer = {
            let buffer = buffer.clone();
            let terminate = terminate.clone();
            let inputs = self.inputs;
            thread::Builder::new()
                .name("frame-producer".into())
                .spawn(move || {
                    let mut produced = 0u64;
                    for path in &inputs {
                        match image::open(path) {
                            Ok(image) => {
                                buffer.push(Frame::new(produced, image));
                                produced += 1;
                            }
                            Err(e) => warn!("Skipping {}: {}", path.display(), e),
                        }
                    }
                    terminate.request();
                    produced
                })
                .context("Failed to spawn producer thread")?
        };

        let succeeded = pipeline.run(Some(&terminate), &self.output_key);

        let produced = producer
            .join()
            .map_err(|_| anyhow::anyhow!("Producer thread panicked"))?;
        if buffer.dropped() > 0 {
            warn!("{} frames dropped by the full buffer", buffer.dropped());
        }

        if !succeeded {
            anyhow::bail!("Pipeline stopped on a stage failure");
        }

        info!(
            "Processed {} frames in {:.3}s",
            produced.saturating_sub(buffer.dropped()),
            start.elapsed().as_secs_f64()
        );
        Ok(())
    }
}
