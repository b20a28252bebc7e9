//! Helpers shared by the stage constructors and bodies

use frame_pipeline_core::{ConfigTree, StageError, Tray};
use std::any::Any;
use std::fmt::Display;
use std::str::FromStr;

/// Parse `<stage>.<field>` from the settings document, or use `default`
pub(crate) fn value_or<T>(
    settings: &ConfigTree,
    stage: &str,
    field: &str,
    default: T,
) -> Result<T, StageError>
where
    T: FromStr,
    T::Err: Display,
{
    Ok(settings.get_or(&format!("{stage}.{field}"), default)?)
}

/// Tray keys an image stage reads from and writes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ImageKeys {
    pub input: String,
    pub output: String,
}

impl ImageKeys {
    pub(crate) fn from_settings(
        settings: &ConfigTree,
        stage: &str,
        default_input: &str,
        default_output: &str,
    ) -> Self {
        let key = |field: &str, default: &str| {
            settings
                .get_str(&format!("{stage}.{field}"))
                .filter(|value| !value.is_empty())
                .unwrap_or(default)
                .to_string()
        };

        Self {
            input: key("input_key", default_input),
            output: key("output_key", default_output),
        }
    }
}

/// Borrow a value the stage cannot run without
pub(crate) fn require<'a, T: Any>(tray: &'a Tray, key: &str) -> Result<&'a T, StageError> {
    tray.get_ref::<T>(key)?
        .ok_or_else(|| StageError::MissingInput(key.to_string()))
}
