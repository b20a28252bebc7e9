//! Turns a topology document into sub-pipelines
//!
//! Top-level entries that name a registered stage go, in document order, into
//! one implicit sub-pipeline (always the first). Every top-level `Parallel`
//! entry becomes one more sub-pipeline built from its direct children that
//! name a registered stage. `Parallel` has no meaning below the top level, and
//! keys that match nothing are skipped.

use crate::config::ConfigTree;
use crate::pipeline::SubPipeline;
use crate::registry::StageRegistry;
use crate::stage::Stage;
use tracing::{debug, warn};

/// Topology key that opens a separate sub-pipeline
pub const PARALLEL_KEY: &str = "Parallel";

/// Build the sub-pipelines for `topology`, passing `settings` to every factory
pub fn assemble(
    registry: &StageRegistry,
    topology: &ConfigTree,
    settings: &ConfigTree,
) -> Vec<SubPipeline> {
    let mut implicit = SubPipeline::new();
    let mut groups = Vec::new();

    for (key, child) in topology.children() {
        if key == PARALLEL_KEY {
            groups.push(build_chain(registry, child, settings));
        } else if let Some(stage) = instantiate(registry, key, settings) {
            implicit.push(stage);
        }
    }

    let mut sub_pipelines = Vec::with_capacity(1 + groups.len());
    sub_pipelines.push(implicit);
    sub_pipelines.extend(groups);
    sub_pipelines
}

/// One flat chain from the direct children of `node`
fn build_chain(registry: &StageRegistry, node: &ConfigTree, settings: &ConfigTree) -> SubPipeline {
    let mut chain = SubPipeline::new();
    for (key, _) in node.children() {
        if let Some(stage) = instantiate(registry, key, settings) {
            chain.push(stage);
        }
    }
    chain
}

fn instantiate(registry: &StageRegistry, key: &str, settings: &ConfigTree) -> Option<Box<dyn Stage>> {
    let Some(factory) = registry.lookup(key) else {
        warn!("Skipping unknown topology entry: {}", key);
        return None;
    };

    let stage = factory.create(key, settings);
    if stage.is_none() {
        debug!("Stage {} declined construction", key);
    }
    stage
}
