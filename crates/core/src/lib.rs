//! # Query Parameters
//!
//! Placeholder binding for FlexibleSearch-style queries.
//!
//! ## Features
//!
//! - **Placeholder extraction** aware of aliases, joins and sub-queries
//! - **Typed parameters** classified from the declared attribute type
//! - **Value preservation** across edits of the query text
//! - **Schema-driven refresh** debounced and coalesced per editor
//!
//! ## Architecture
//!
//! ```text
//! QueryDocument ──> PlaceholderParser ──> PlaceholderOccurrence[]
//!                        │                      │
//!                  SchemaOracle           TypeClassifier
//!                        │                      │
//!                        │              ParameterCache::reconcile
//!                        │                      │
//!                        └──> Bridge ──> ParameterEngine ──> ParameterSnapshot
//!                                               │
//!                                      bind_query / inlay_hints
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use qparams_core::{EngineConfig, InMemorySchema, ParameterEngine, SchemaDocument, SharedDocument};
//! use std::sync::Arc;
//!
//! # async fn example() -> qparams_core::Result<()> {
//! let schema = SchemaDocument::default().attribute("Product", "code", "java.lang.String");
//! let schema = Arc::new(InMemorySchema::from_document(schema)?);
//! let document = Arc::new(SharedDocument::new("SELECT {pk} FROM {Product} WHERE {code} = ?code"));
//!
//! let engine = ParameterEngine::start(document, schema, EngineConfig::default())?;
//! engine.toggle_visibility();
//! engine.set_value("code", "camera")?;
//! assert_eq!(
//!     engine.query_with_bound_values(),
//!     "SELECT {pk} FROM {Product} WHERE {code} = 'camera'"
//! );
//! # Ok(())
//! # }
//! ```

mod binding;
mod bridge;
mod cache;
mod classifier;
pub mod codec;
mod config;
mod document;
mod engine;
mod error;
mod extractor;
mod lexer;
mod schema;
mod types;

pub use binding::{bind_query, inlay_hints, InlayHint};
pub use cache::{merge, ParameterCache, ParameterMap};
pub use classifier::TypeClassifier;
pub use codec::DisplayValue;
pub use config::EngineConfig;
pub use document::{DocumentSnapshot, QueryDocument, SharedDocument};
pub use engine::{
    PanelView, ParameterEngine, ParameterSnapshot, ParameterView, PassOutcome, PassReason,
    PassStamp, PassUpdate, SchemaReadiness,
};
pub use error::{ParamsError, ParseError, Result};
pub use extractor::{extract, FlexibleSearchParser, PlaceholderParser};
pub use schema::{InMemorySchema, SchemaChanged, SchemaDocument, SchemaOracle};
pub use types::{Parameter, PlaceholderOccurrence, TextRange, ValueKind};
