//! Local and remote recipe sources for brewsync.
//!
//! Each store yields its own raw record shape. [`SourceRecord`] closes over
//! the three shapes and [`SourceRecord::into_canonical`] dispatches to the
//! store's translation, so defaulting rules never leak into the shared model.

pub mod annotations;
pub mod export;
pub mod kbh;
pub mod localtime;

use brewsync_shared::{Brew, Recipe, Result};

pub use annotations::Annotations;
pub use export::{ExportFile, ExportRecord};
pub use kbh::{KbhDatabase, LogRecord};

/// A recipe with the brew session the source holds for it, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    pub recipe: Recipe,
    pub brew: Option<Brew>,
}

/// A raw record from one of the three recipe stores.
#[derive(Debug, Clone)]
pub enum SourceRecord {
    /// A batch of the relational brewing log.
    Log(LogRecord),
    /// A recipe element of an XML export.
    Export(ExportRecord),
    /// A recipe object returned by the remote service.
    Remote(serde_json::Value),
}

impl SourceRecord {
    /// Short name of the originating store.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Log(_) => "log",
            Self::Export(_) => "export",
            Self::Remote(_) => "remote",
        }
    }

    /// The record's recipe name, empty when it has none.
    pub fn name(&self) -> &str {
        match self {
            Self::Log(record) => &record.batch.name,
            Self::Export(record) => record.name(),
            Self::Remote(value) => value
                .get("name")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default(),
        }
    }

    /// Translate into the canonical model.
    pub fn into_canonical(self) -> Result<CanonicalRecord> {
        match self {
            Self::Log(record) => Ok(kbh::project::canonical(&record)),
            Self::Export(record) => export::project::canonical(&record),
            Self::Remote(value) => Ok(CanonicalRecord {
                recipe: Recipe::from_value(value)?,
                brew: None,
            }),
        }
    }
}
