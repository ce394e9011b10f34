//! Name-keyed parameter store that survives re-extraction.

use crate::classifier::TypeClassifier;
use crate::codec::{self, DisplayValue};
use crate::error::{ParamsError, Result};
use crate::types::{Parameter, PlaceholderOccurrence};
use std::collections::HashMap;

/// Insertion-ordered mapping of name → parameter with unique names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterMap {
    entries: Vec<Parameter>,
    index: HashMap<String, usize>,
}

impl ParameterMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.index.get(name).map(|&at| &self.entries[at])
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.entries.iter()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<Parameter> {
        self.entries.clone()
    }

    /// Append unless the name is already present; returns whether it was added
    fn insert_new(&mut self, parameter: Parameter) -> bool {
        if self.index.contains_key(&parameter.name) {
            return false;
        }
        self.index.insert(parameter.name.clone(), self.entries.len());
        self.entries.push(parameter);
        true
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        let at = *self.index.get(name)?;
        self.entries.get_mut(at)
    }
}

/// Reconcile freshly extracted occurrences with what was held before.
///
/// Keeps the first occurrence of each name, recomputes its kind, carries the
/// previous value over (conformed to the new kind) and drops names no longer
/// present. Idempotent for a fixed `fresh`.
#[must_use]
pub fn merge(previous: &ParameterMap, fresh: &[PlaceholderOccurrence]) -> ParameterMap {
    let mut merged = ParameterMap::new();
    for occurrence in fresh {
        if merged.contains(&occurrence.name) {
            continue;
        }
        let kind = TypeClassifier::classify(occurrence.declared_kind.as_deref());
        let value = previous.get(&occurrence.name).map_or_else(
            || codec::default_value(kind).to_string(),
            |held| codec::conform(kind, &held.value),
        );
        merged.insert_new(Parameter::new(occurrence.name.clone(), value, kind));
    }
    merged
}

/// Parameter state owned by one editor
#[derive(Debug, Clone, Default)]
pub struct ParameterCache {
    current: ParameterMap,
}

impl ParameterCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn current(&self) -> &ParameterMap {
        &self.current
    }

    /// Merge a new extraction; the result becomes the basis of the next one
    pub fn reconcile(&mut self, fresh: &[PlaceholderOccurrence]) -> &ParameterMap {
        self.current = merge(&self.current, fresh);
        &self.current
    }

    /// Run the kind's edit codec and store the canonical value
    pub fn set_value(&mut self, name: &str, display: &DisplayValue) -> Result<String> {
        let parameter = self
            .current
            .get_mut(name)
            .ok_or_else(|| ParamsError::unknown_parameter(name))?;
        let canonical = codec::encode(parameter.kind, display)?;
        parameter.value.clone_from(&canonical);
        Ok(canonical)
    }
}
