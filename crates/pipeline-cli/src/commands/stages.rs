//! Stage listing command

use anyhow::Result;
use frame_pipeline_core::StageRegistry;
use frame_pipeline_stages::register_all_stages;

pub fn list_stages() -> Result<()> {
    let mut registry = StageRegistry::new();
    register_all_stages(&mut registry);

    println!("Registered stages:");
    for name in registry.names() {
        println!("  {name}");
    }
    Ok(())
}
