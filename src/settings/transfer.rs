// restorectl/src/settings/transfer.rs
//! Settings exchange text: `<preferred destination>;<name patterns JSON>`.
use thiserror::Error;

use super::{SettingsError, SettingsStore};
use crate::naming::{NamePatterns, PatternError};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Invalid settings format. Semicolon must separate fields.")]
    MissingSeparator,

    #[error("First field must contain integer number.")]
    NotInteger,

    #[error("First field must contain positive number.")]
    Negative,

    #[error("Second field must contain valid JSON array: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Second field contains an unusable name pattern: {0}")]
    InvalidPattern(#[source] PatternError),

    #[error(transparent)]
    Store(#[from] SettingsError),
}

pub fn export_settings(store: &dyn SettingsStore) -> Result<String, SettingsError> {
    let destination = match store.preferred_destination()? {
        Some(index) => index.to_string(),
        None => "null".to_string(),
    };
    let patterns = serde_json::to_string(&store.name_patterns()?).map_err(|source| SettingsError::Json {
        path: "<export>".into(),
        source,
    })?;
    Ok(format!("{};{}", destination, patterns))
}

/// Parses exchange text without touching any store.
pub fn parse_settings(text: &str) -> Result<(Option<usize>, NamePatterns), ImportError> {
    let (first, second) = text.split_once(';').ok_or(ImportError::MissingSeparator)?;

    let first = first.trim();
    let destination = if first == "null" {
        None
    } else {
        let value: i64 = first.parse().map_err(|_| ImportError::NotInteger)?;
        if value < 0 {
            return Err(ImportError::Negative);
        }
        Some(usize::try_from(value).map_err(|_| ImportError::NotInteger)?)
    };

    let patterns: NamePatterns = serde_json::from_str(second.trim()).map_err(ImportError::InvalidJson)?;
    patterns.validate().map_err(ImportError::InvalidPattern)?;

    Ok((destination, patterns))
}

/// Replaces both settings, or neither when the text is rejected.
pub fn import_settings(store: &mut dyn SettingsStore, text: &str) -> Result<(), ImportError> {
    let (destination, patterns) = parse_settings(text)?;
    store.replace_all(destination, &patterns)?;
    tracing::info!(
        destination = ?destination,
        patterns = patterns.len(),
        "Settings imported"
    );
    Ok(())
}
