use crate::types::ValueKind;

const INTEGER_TYPES: &[&str] = &[
    "int",
    "long",
    "short",
    "byte",
    "float",
    "double",
    "java.lang.Integer",
    "java.lang.Long",
    "java.lang.Short",
    "java.lang.Byte",
    "java.lang.Float",
    "java.lang.Double",
];

const BOOLEAN_TYPES: &[&str] = &["boolean", "java.lang.Boolean"];

const TEMPORAL_TYPES: &[&str] = &["java.util.Date", "java.sql.Timestamp", "java.sql.Date"];

// Primary keys are bound as raw numbers, not quoted literals
const VERBATIM_TYPES: &[&str] = &["de.hybris.platform.core.PK", "PK"];

pub struct TypeClassifier;

impl TypeClassifier {
    /// Map a declared type name to a value kind. Never fails: anything not in
    /// the table, including no hint at all, is text.
    #[must_use]
    pub fn classify(declared_kind: Option<&str>) -> ValueKind {
        let Some(name) = declared_kind.map(str::trim) else {
            return ValueKind::Text;
        };
        if INTEGER_TYPES.contains(&name) {
            ValueKind::Integer
        } else if BOOLEAN_TYPES.contains(&name) {
            ValueKind::Boolean
        } else if TEMPORAL_TYPES.contains(&name) {
            ValueKind::Temporal
        } else if VERBATIM_TYPES.contains(&name) {
            ValueKind::Unknown
        } else {
            ValueKind::Text
        }
    }
}
