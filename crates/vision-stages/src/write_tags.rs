//! Persist tags as a JSON array

use crate::keys;
use crate::settings::value_or;
use frame_pipeline_common::ProcessingError;
use frame_pipeline_core::{
    ConfigTree, ConfigurableStage, Stage, StageError, StageOutcome, Tag, Tray,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Rewrites the file at `path` (default `tags.json`) with the pretty-printed
/// `tags` list whenever it has grown since the last write. A tray without
/// tags writes nothing.
pub struct WriteTagsStage {
    name: String,
    path: PathBuf,
    written: usize,
}

impl ConfigurableStage for WriteTagsStage {
    fn from_settings(name: &str, settings: &ConfigTree) -> Result<Self, StageError> {
        let path: String = value_or(settings, name, "path", "tags.json".to_string())?;
        if path.is_empty() {
            return Err(StageError::InvalidSettings("path must not be empty".into()));
        }

        Ok(Self {
            name: name.to_string(),
            path: PathBuf::from(path),
            written: 0,
        })
    }
}

impl WriteTagsStage {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_tags(path: &Path, tags: &[Tag]) -> Result<(), ProcessingError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, tags)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

impl Stage for WriteTagsStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, tray: &mut Tray) -> Result<StageOutcome, StageError> {
        let Some(tags) = tray.get_ref::<Vec<Tag>>(keys::TAGS)? else {
            return Ok(StageOutcome::Continue);
        };
        if tags.len() == self.written {
            return Ok(StageOutcome::Continue);
        }

        write_tags(&self.path, tags)?;
        debug!("Wrote {} tags to {}", tags.len(), self.path.display());
        if self.written == 0 {
            info!("Writing tags to {}", self.path.display());
        }
        self.written = tags.len();
        Ok(StageOutcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frame_pipeline_core::run_stage;
    use tempfile::tempdir;

    fn tag(frame_number: u64) -> Tag {
        Tag {
            frame_number,
            frame_class: 0,
            descriptor: vec![0.5, 0.5],
            cluster_radius: 0.25,
        }
    }

    fn stage_for(path: &Path) -> WriteTagsStage {
        let settings = ConfigTree::new().with_child(
            "WriteTagsStage",
            ConfigTree::new().with_child("path", ConfigTree::leaf(path.to_string_lossy())),
        );
        WriteTagsStage::from_settings("WriteTagsStage", &settings).unwrap()
    }

    #[test]
    fn test_writes_tags_when_they_change() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tags.json");
        let mut stage = stage_for(&path);
        let mut tray = Tray::new();

        run_stage(&mut stage, &mut tray).unwrap();
        assert!(!path.exists());

        tray.set(keys::TAGS, vec![tag(0)]).unwrap();
        run_stage(&mut stage, &mut tray).unwrap();
        tray.get_mut::<Vec<Tag>>(keys::TAGS).unwrap().unwrap().push(tag(4));
        run_stage(&mut stage, &mut tray).unwrap();

        let written: Vec<Tag> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, vec![tag(0), tag(4)]);
    }

    #[test]
    fn test_unwritable_path_is_fatal() {
        let dir = tempdir().unwrap();
        let mut stage = stage_for(&dir.path().join("missing").join("tags.json"));
        let mut tray = Tray::new();
        tray.set(keys::TAGS, vec![tag(0)]).unwrap();

        assert!(matches!(
            run_stage(&mut stage, &mut tray),
            Err(StageError::Processing(ProcessingError::IoError(_)))
        ));
    }

    #[test]
    fn test_default_path() {
        let stage = WriteTagsStage::from_settings("WriteTagsStage", &ConfigTree::new()).unwrap();
        assert_eq!(stage.path(), Path::new("tags.json"));
    }
}
