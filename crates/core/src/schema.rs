//! Type-metadata oracle consumed by the engine.
//!
//! The oracle is shared process-wide and read-only from the engine's side:
//! the engine asks whether metadata is loaded, looks up declared attribute
//! types while parsing, and listens for "something changed" notifications.

use crate::error::{ParamsError, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{PoisonError, RwLock};
use tokio::sync::broadcast;

/// Payload-free notification that the type metadata was (re)initialised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaChanged;

pub trait SchemaOracle: Send + Sync {
    /// Whether type metadata is loaded
    fn is_ready(&self) -> bool;

    /// Subscribe to change notifications. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<SchemaChanged>;

    /// Declared type name of `type_code.qualifier`, if known
    fn attribute_type(&self, type_code: &str, qualifier: &str) -> Option<String>;
}

/// Serializable description of a schema: type code → qualifier → type name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default = "default_ready")]
    pub ready: bool,

    #[serde(default)]
    pub types: BTreeMap<String, BTreeMap<String, String>>,
}

const fn default_ready() -> bool {
    true
}

impl Default for SchemaDocument {
    fn default() -> Self {
        Self {
            ready: default_ready(),
            types: BTreeMap::new(),
        }
    }
}

impl SchemaDocument {
    /// Load from a `.toml` file, or JSON for any other extension
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        if is_toml {
            Ok(toml::from_str(&raw)?)
        } else {
            Ok(serde_json::from_str(&raw)?)
        }
    }

    /// Builder: declare one attribute
    #[must_use]
    pub fn attribute(
        mut self,
        type_code: impl Into<String>,
        qualifier: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        self.types
            .entry(type_code.into())
            .or_default()
            .insert(qualifier.into(), type_name.into());
        self
    }

    fn validate(&self) -> Result<()> {
        for (type_code, attributes) in &self.types {
            if type_code.trim().is_empty() {
                return Err(ParamsError::schema("empty type code"));
            }
            if let Some((qualifier, _)) = attributes.iter().find(|(q, _)| q.trim().is_empty()) {
                return Err(ParamsError::schema(format!(
                    "empty attribute qualifier {qualifier:?} in type {type_code}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct SchemaState {
    ready: bool,
    generation: u64,
    // lowercased type code → lowercased qualifier → declared type name
    types: HashMap<String, HashMap<String, String>>,
}

/// In-memory oracle; lookups are case-insensitive like type codes are.
#[derive(Debug)]
pub struct InMemorySchema {
    state: RwLock<SchemaState>,
    changes: broadcast::Sender<SchemaChanged>,
}

impl Default for InMemorySchema {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySchema {
    /// An uninitialised schema
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            state: RwLock::new(SchemaState::default()),
            changes,
        }
    }

    pub fn from_document(document: SchemaDocument) -> Result<Self> {
        let schema = Self::new();
        schema.install(document)?;
        Ok(schema)
    }

    /// Replace the metadata and notify subscribers
    pub fn install(&self, document: SchemaDocument) -> Result<()> {
        document.validate()?;
        let types = document
            .types
            .into_iter()
            .map(|(code, attributes)| {
                let attributes = attributes
                    .into_iter()
                    .map(|(qualifier, type_name)| (qualifier.to_lowercase(), type_name))
                    .collect();
                (code.to_lowercase(), attributes)
            })
            .collect();
        let generation = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.types = types;
            state.ready = document.ready;
            state.generation += 1;
            state.generation
        };
        info!(
            "Schema installed (generation {generation}, ready={})",
            document.ready
        );
        self.notify();
        Ok(())
    }

    /// Flip readiness and notify subscribers
    pub fn set_ready(&self, ready: bool) {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.ready = ready;
            state.generation += 1;
        }
        self.notify();
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    fn notify(&self) {
        // No subscribers is fine
        let _ = self.changes.send(SchemaChanged);
    }
}

impl SchemaOracle for InMemorySchema {
    fn is_ready(&self) -> bool {
        self.state.read().unwrap_or_else(PoisonError::into_inner).ready
    }

    fn subscribe(&self) -> broadcast::Receiver<SchemaChanged> {
        self.changes.subscribe()
    }

    fn attribute_type(&self, type_code: &str, qualifier: &str) -> Option<String> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .types
            .get(&type_code.to_lowercase())?
            .get(&qualifier.to_lowercase())
            .cloned()
    }
}
