//! XML recipe exports written by desktop brewing software.
//!
//! The file is read into a raw nested mapping first (element → object,
//! repeated child → array, leaf → string, names upper-cased) so the
//! translation in [`project`] can address fields by path.

pub mod project;

use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::events::Event;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use brewsync_shared::{BrewSyncError, NamePattern, Result};

use crate::CanonicalRecord;

/// One `RECIPE` element of an export, as a raw mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRecord {
    pub raw: Value,
}

impl ExportRecord {
    /// The recipe's `NAME`, empty when missing.
    pub fn name(&self) -> &str {
        self.raw.get("NAME").and_then(Value::as_str).unwrap_or_default()
    }
}

/// A parsed export file.
#[derive(Debug, Clone)]
pub struct ExportFile {
    path: PathBuf,
    records: Vec<ExportRecord>,
}

impl ExportFile {
    /// Read and parse an export file.
    pub async fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(BrewSyncError::MissingSource(format!(
                "export file {} does not exist",
                path.display()
            )));
        }
        let xml = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| BrewSyncError::io(path, e))?;
        let mut file = Self::parse(&xml)?;
        file.path = path.to_path_buf();
        Ok(file)
    }

    /// Parse export XML held in memory.
    pub fn parse(xml: &str) -> Result<Self> {
        let tree = xml_to_value(xml)?;
        let recipes = tree
            .get("RECIPES")
            .and_then(|r| r.get("RECIPE"))
            .cloned()
            .unwrap_or(Value::Null);
        let records: Vec<ExportRecord> = match recipes {
            Value::Array(items) => items.into_iter().map(|raw| ExportRecord { raw }).collect(),
            Value::Object(_) => vec![ExportRecord { raw: recipes }],
            _ => {
                warn!("export contains no RECIPES/RECIPE elements");
                Vec::new()
            }
        };
        debug!(count = records.len(), "parsed export");
        Ok(Self {
            path: PathBuf::new(),
            records,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw records whose name matches `pattern`.
    pub fn records(&self, pattern: &NamePattern) -> Vec<&ExportRecord> {
        self.records
            .iter()
            .filter(|r| pattern.matches(r.name()))
            .collect()
    }

    /// Canonical recipes of all matching records.
    pub fn recipes(&self, pattern: &NamePattern) -> Result<Vec<CanonicalRecord>> {
        self.records(pattern)
            .into_iter()
            .map(project::canonical)
            .collect()
    }

    /// Canonical recipe of the single matching record.
    pub fn recipe(&self, pattern: &NamePattern) -> Result<CanonicalRecord> {
        let records = self.records(pattern);
        match records.as_slice() {
            [one] => project::canonical(one),
            _ => {
                warn!(pattern = pattern.as_str(), count = records.len(), "pattern did not select a unique recipe");
                Err(BrewSyncError::AmbiguousMatch {
                    pattern: pattern.as_str().to_string(),
                    count: records.len(),
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// XML → mapping
// ---------------------------------------------------------------------------

struct Open {
    name: String,
    children: Map<String, Value>,
    text: String,
}

impl Open {
    fn new(name: &[u8]) -> Self {
        Self {
            name: String::from_utf8_lossy(name).to_uppercase(),
            children: Map::new(),
            text: String::new(),
        }
    }

    fn into_value(self) -> (String, Value) {
        let value = if self.children.is_empty() {
            Value::String(self.text)
        } else {
            Value::Object(self.children)
        };
        (self.name, value)
    }
}

/// Add a child, turning repeated names into arrays.
fn insert_child(parent: &mut Map<String, Value>, name: String, value: Value) {
    match parent.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            parent.insert(name, value);
        }
    }
}

fn parse_err(e: impl std::fmt::Display) -> BrewSyncError {
    BrewSyncError::parse(format!("invalid export XML: {e}"))
}

/// Convert an XML document into a nested mapping rooted at the document element.
pub fn xml_to_value(xml: &str) -> Result<Value> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut root = Map::new();
    let mut stack: Vec<Open> = Vec::new();
    loop {
        match reader.read_event().map_err(parse_err)? {
            Event::Start(e) => stack.push(Open::new(e.name().as_ref())),
            Event::Empty(e) => {
                let (name, value) = Open::new(e.name().as_ref()).into_value();
                match stack.last_mut() {
                    Some(parent) => insert_child(&mut parent.children, name, value),
                    None => insert_child(&mut root, name, value),
                }
            }
            Event::Text(t) => {
                if let Some(open) = stack.last_mut() {
                    open.text.push_str(&t.unescape().map_err(parse_err)?);
                }
            }
            Event::CData(c) => {
                if let Some(open) = stack.last_mut() {
                    open.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(_) => {
                let Some(open) = stack.pop() else {
                    return Err(parse_err("unbalanced end tag"));
                };
                let (name, value) = open.into_value();
                match stack.last_mut() {
                    Some(parent) => insert_child(&mut parent.children, name, value),
                    None => insert_child(&mut root, name, value),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if !stack.is_empty() {
        return Err(parse_err("unexpected end of document"));
    }
    Ok(Value::Object(root))
}
