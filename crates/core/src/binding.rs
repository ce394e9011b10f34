use crate::cache::ParameterMap;
use crate::types::PlaceholderOccurrence;
use serde::Serialize;

/// Inline annotation shown after a placeholder in the editor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlayHint {
    pub name: String,
    /// Byte offset right after the placeholder
    pub offset: usize,
    pub label: String,
    pub tooltip: String,
}

/// Substitute canonical values for placeholders.
///
/// Placeholders without a value, or unknown to `parameters`, stay as written.
#[must_use]
pub fn bind_query(
    text: &str,
    occurrences: &[PlaceholderOccurrence],
    parameters: &ParameterMap,
) -> String {
    let mut bound = text.to_string();
    for occurrence in occurrences.iter().rev() {
        let Some(parameter) = parameters.get(&occurrence.name) else {
            continue;
        };
        if parameter.value.is_empty() {
            continue;
        }
        let range = occurrence.range;
        if range.end > bound.len() {
            continue;
        }
        bound.replace_range(range.start..range.end, &parameter.value);
    }
    bound
}

/// One hint per occurrence whose parameter has something to show
#[must_use]
pub fn inlay_hints(
    occurrences: &[PlaceholderOccurrence],
    parameters: &ParameterMap,
) -> Vec<InlayHint> {
    occurrences
        .iter()
        .filter_map(|occurrence| {
            let parameter = parameters.get(&occurrence.name)?;
            let shown = parameter.presentation_value();
            if shown.trim().is_empty() {
                return None;
            }
            Some(InlayHint {
                name: parameter.name.clone(),
                offset: occurrence.range.end,
                label: format!("= {shown}"),
                tooltip: format!("SQL value: {}", parameter.value),
            })
        })
        .collect()
}
