//! Panel lifecycle controller.
//!
//! Owns the parameter cache of one editor and decides when a pass
//! (extract → classify → merge) runs: when the schema reports a change, when
//! the panel is shown, and when the host reports a document edit while the
//! panel is visible. Consumers read an atomically swapped
//! [`ParameterSnapshot`]; a merge in progress is never observable.

use crate::binding::{self, InlayHint};
use crate::bridge::Bridge;
use crate::cache::{ParameterCache, ParameterMap};
use crate::codec::{self, DisplayValue};
use crate::config::EngineConfig;
use crate::document::QueryDocument;
use crate::error::{ParamsError, Result};
use crate::extractor::{extract, FlexibleSearchParser, PlaceholderParser};
use crate::schema::SchemaOracle;
use crate::types::{Parameter, ValueKind};
use log::{debug, info};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Instant, SystemTime};
use tokio::sync::{broadcast, watch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaReadiness {
    Uninitialized,
    Ready,
}

impl SchemaReadiness {
    const fn from_ready(ready: bool) -> Self {
        if ready {
            Self::Ready
        } else {
            Self::Uninitialized
        }
    }
}

/// Inputs a pass was computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PassStamp {
    pub revision: u64,
    pub generation: u64,
}

impl PassStamp {
    /// Both inputs no newer than `other`, and not the same inputs
    #[must_use]
    pub fn is_older_than(&self, other: &Self) -> bool {
        self != other && self.revision <= other.revision && self.generation <= other.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassReason {
    SchemaChanged,
    PanelShown,
    DocumentChanged,
    Explicit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Cache replaced with the result of this pass
    Merged(PassStamp),
    /// Same inputs already merged or in flight
    Coalesced,
    /// Schema not initialised; nothing extracted
    NotReady,
    /// Text does not parse; the held parameters stay as they were
    ParseUnavailable,
    /// A pass over newer inputs committed first
    Superseded,
    Disposed,
}

/// Broadcast after every committed pass
#[derive(Debug, Clone)]
pub struct PassUpdate {
    pub stamp: PassStamp,
    pub reason: PassReason,
    pub parameter_count: usize,
    pub duration_ms: u64,
    pub completed_at: SystemTime,
}

/// Consistent, read-only view of the engine state
#[derive(Debug, Clone)]
pub struct ParameterSnapshot {
    pub readiness: SchemaReadiness,
    pub visible: bool,
    pub parameters: ParameterMap,
    pub stamp: Option<PassStamp>,
    pub passes: u64,
}

impl ParameterSnapshot {
    /// Parameters to expose; always empty while the schema is not ready
    #[must_use]
    pub fn exposed(&self) -> Vec<Parameter> {
        match self.readiness {
            SchemaReadiness::Ready => self.parameters.to_vec(),
            SchemaReadiness::Uninitialized => Vec::new(),
        }
    }
}

/// What the rendering layer should show for one parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterView {
    pub name: String,
    pub kind: ValueKind,
    pub value: String,
    pub display: DisplayValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "parameters", rename_all = "snake_case")]
pub enum PanelView {
    Hidden,
    /// Type metadata still loading
    NotReady,
    NoParameters,
    Parameters(Vec<ParameterView>),
}

struct EngineState {
    cache: ParameterCache,
    readiness: SchemaReadiness,
    generation: u64,
    visible: bool,
    last_stamp: Option<PassStamp>,
    in_flight: Option<PassStamp>,
    passes: u64,
    disposed: bool,
}

pub(crate) struct EngineInner {
    document: Arc<dyn QueryDocument>,
    schema: Arc<dyn SchemaOracle>,
    parser: Arc<dyn PlaceholderParser>,
    state: Mutex<EngineState>,
    snapshot_tx: watch::Sender<Arc<ParameterSnapshot>>,
    update_tx: broadcast::Sender<PassUpdate>,
    bridge: Mutex<Option<Bridge>>,
}

/// Parameter binding engine for one editor. Cheap to clone.
#[derive(Clone)]
pub struct ParameterEngine {
    inner: Arc<EngineInner>,
}

impl ParameterEngine {
    /// Start an engine with the built-in FlexibleSearch parser.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        document: Arc<dyn QueryDocument>,
        schema: Arc<dyn SchemaOracle>,
        config: EngineConfig,
    ) -> Result<Self> {
        let parser = Arc::new(FlexibleSearchParser::new(config.marker));
        Self::start_with_parser(document, schema, parser, config)
    }

    pub fn start_with_parser(
        document: Arc<dyn QueryDocument>,
        schema: Arc<dyn SchemaOracle>,
        parser: Arc<dyn PlaceholderParser>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ParamsError::NoRuntime(e.to_string()))?;

        // Subscribe before sampling readiness so no transition slips between.
        let changes = schema.subscribe();
        let readiness = SchemaReadiness::from_ready(schema.is_ready());

        let state = EngineState {
            cache: ParameterCache::new(),
            readiness,
            generation: 0,
            visible: config.initially_visible,
            last_stamp: None,
            in_flight: None,
            passes: 0,
            disposed: false,
        };
        let (snapshot_tx, _) = watch::channel(Arc::new(snapshot_of(&state)));
        let (update_tx, _) = broadcast::channel(config.update_capacity);

        let inner = Arc::new(EngineInner {
            document,
            schema,
            parser,
            state: Mutex::new(state),
            snapshot_tx,
            update_tx,
            bridge: Mutex::new(None),
        });

        let bridge = Bridge::spawn(&runtime, Arc::downgrade(&inner), changes, config.debounce());
        *lock(&inner.bridge) = Some(bridge);

        debug!("Parameter engine started (readiness {readiness:?})");
        if config.initially_visible {
            inner.run_pass(PassReason::PanelShown, true);
        }
        Ok(Self { inner })
    }

    /// Parameters in source order; empty while the schema is not ready
    #[must_use]
    pub fn parameters(&self) -> Vec<Parameter> {
        self.snapshot().exposed()
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<ParameterSnapshot> {
        self.inner.snapshot_tx.borrow().clone()
    }

    /// Stream of snapshots, replaced atomically on every change
    #[must_use]
    pub fn snapshot_stream(&self) -> watch::Receiver<Arc<ParameterSnapshot>> {
        self.inner.snapshot_tx.subscribe()
    }

    #[must_use]
    pub fn subscribe_updates(&self) -> broadcast::Receiver<PassUpdate> {
        self.inner.update_tx.subscribe()
    }

    #[must_use]
    pub fn readiness(&self) -> SchemaReadiness {
        self.snapshot().readiness
    }

    #[must_use]
    pub fn is_panel_visible(&self) -> bool {
        self.snapshot().visible
    }

    /// Flip panel visibility. Showing the panel runs one pass.
    pub fn toggle_visibility(&self) -> bool {
        let visible = {
            let mut state = lock(&self.inner.state);
            if state.disposed {
                return false;
            }
            state.visible = !state.visible;
            self.inner.publish(&state);
            state.visible
        };
        debug!("Parameter panel {}", if visible { "shown" } else { "hidden" });
        if visible {
            self.inner.run_pass(PassReason::PanelShown, true);
        }
        visible
    }

    /// Host hook for text edits; recomputes only while the panel is shown.
    pub fn document_changed(&self) -> Option<PassOutcome> {
        if !self.is_panel_visible() {
            return None;
        }
        Some(self.inner.run_pass(PassReason::DocumentChanged, false))
    }

    /// Run a pass now unless these inputs were already merged
    pub fn refresh(&self) -> PassOutcome {
        self.inner.run_pass(PassReason::Explicit, false)
    }

    /// Store an edited value after running the kind's codec
    pub fn set_value(&self, name: &str, display: impl Into<DisplayValue>) -> Result<String> {
        let display = display.into();
        self.inner.edit(name, |_| Ok(display))
    }

    /// Like [`set_value`](Self::set_value), parsing free text for the kind
    pub fn set_display_text(&self, name: &str, raw: &str) -> Result<String> {
        self.inner.edit(name, |kind| codec::parse_display(kind, raw))
    }

    #[must_use]
    pub fn view(&self) -> PanelView {
        let snapshot = self.snapshot();
        if !snapshot.visible {
            return PanelView::Hidden;
        }
        if snapshot.readiness == SchemaReadiness::Uninitialized {
            return PanelView::NotReady;
        }
        if snapshot.parameters.is_empty() {
            return PanelView::NoParameters;
        }
        PanelView::Parameters(
            snapshot
                .parameters
                .iter()
                .map(|p| ParameterView {
                    name: p.name.clone(),
                    kind: p.kind,
                    value: p.value.clone(),
                    display: codec::decode(p.kind, &p.value),
                })
                .collect(),
        )
    }

    /// Current query text with canonical values substituted
    #[must_use]
    pub fn query_with_bound_values(&self) -> String {
        let document = self.inner.document.snapshot();
        let snapshot = self.snapshot();
        if snapshot.readiness == SchemaReadiness::Uninitialized {
            return document.text.to_string();
        }
        match extract(
            self.inner.parser.as_ref(),
            &document.text,
            self.inner.schema.as_ref(),
        ) {
            Some(occurrences) => {
                binding::bind_query(&document.text, &occurrences, &snapshot.parameters)
            }
            None => document.text.to_string(),
        }
    }

    /// Value annotations for every placeholder in the current text
    #[must_use]
    pub fn inlay_hints(&self) -> Vec<InlayHint> {
        let snapshot = self.snapshot();
        if snapshot.readiness == SchemaReadiness::Uninitialized {
            return Vec::new();
        }
        let document = self.inner.document.snapshot();
        extract(
            self.inner.parser.as_ref(),
            &document.text,
            self.inner.schema.as_ref(),
        )
        .map(|occurrences| binding::inlay_hints(&occurrences, &snapshot.parameters))
        .unwrap_or_default()
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        lock(&self.inner.state).disposed
    }

    /// Tear down: stop listening for schema changes and discard any pass in
    /// flight. Later edits fail with [`ParamsError::Disposed`].
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl Drop for ParameterEngine {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1 {
            self.inner.dispose();
        }
    }
}

impl EngineInner {
    pub(crate) fn on_schema_changed(&self) {
        let ready = self.schema.is_ready();
        {
            let mut state = lock(&self.state);
            if state.disposed {
                return;
            }
            state.generation += 1;
            let readiness = SchemaReadiness::from_ready(ready);
            if state.readiness != readiness {
                info!("Schema readiness {:?} -> {readiness:?}", state.readiness);
                state.readiness = readiness;
                self.publish(&state);
            }
        }
        if ready {
            self.run_pass(PassReason::SchemaChanged, false);
        }
    }

    fn run_pass(&self, reason: PassReason, force: bool) -> PassOutcome {
        let (stamp, document) = {
            let mut state = lock(&self.state);
            if state.disposed {
                return PassOutcome::Disposed;
            }
            // Readiness only moves on schema notifications
            if state.readiness == SchemaReadiness::Uninitialized {
                debug!("Skipping {reason:?} pass, schema not ready");
                return PassOutcome::NotReady;
            }

            let document = self.document.snapshot();
            let stamp = PassStamp {
                revision: document.revision,
                generation: state.generation,
            };
            if !force && (state.last_stamp == Some(stamp) || state.in_flight == Some(stamp)) {
                debug!("Coalesced {reason:?} pass for {stamp:?}");
                return PassOutcome::Coalesced;
            }
            state.in_flight = Some(stamp);
            (stamp, document)
        };

        let started = Instant::now();
        let occurrences = extract(self.parser.as_ref(), &document.text, self.schema.as_ref());

        let mut state = lock(&self.state);
        if state.in_flight == Some(stamp) {
            state.in_flight = None;
        }
        if state.disposed {
            debug!("Discarding {reason:?} pass, engine disposed");
            return PassOutcome::Disposed;
        }
        if state.last_stamp.is_some_and(|last| stamp.is_older_than(&last)) {
            debug!("Discarding {reason:?} pass for {stamp:?}, newer inputs already merged");
            return PassOutcome::Superseded;
        }
        let Some(occurrences) = occurrences else {
            debug!("Keeping parameters, text at revision {} does not parse", stamp.revision);
            return PassOutcome::ParseUnavailable;
        };

        let parameter_count = state.cache.reconcile(&occurrences).len();
        state.last_stamp = Some(stamp);
        state.passes += 1;
        self.publish(&state);
        drop(state);

        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = started.elapsed().as_millis() as u64;
        debug!("{reason:?} pass merged {parameter_count} parameters for {stamp:?}");
        let _ = self.update_tx.send(PassUpdate {
            stamp,
            reason,
            parameter_count,
            duration_ms,
            completed_at: SystemTime::now(),
        });
        PassOutcome::Merged(stamp)
    }

    fn edit(
        &self,
        name: &str,
        to_display: impl FnOnce(ValueKind) -> Result<DisplayValue>,
    ) -> Result<String> {
        let mut state = lock(&self.state);
        if state.disposed {
            return Err(ParamsError::Disposed);
        }
        if state.readiness == SchemaReadiness::Uninitialized {
            return Err(ParamsError::unknown_parameter(name));
        }
        let kind = state
            .cache
            .current()
            .get(name)
            .map(|p| p.kind)
            .ok_or_else(|| ParamsError::unknown_parameter(name))?;
        let display = to_display(kind)?;
        let canonical = state.cache.set_value(name, &display)?;
        self.publish(&state);
        Ok(canonical)
    }

    fn publish(&self, state: &EngineState) {
        self.snapshot_tx.send_replace(Arc::new(snapshot_of(state)));
    }

    fn dispose(&self) {
        {
            let mut state = lock(&self.state);
            if state.disposed {
                return;
            }
            state.disposed = true;
        }
        // Dropping the bridge aborts its task and releases the subscription
        let bridge = lock(&self.bridge).take();
        drop(bridge);
        debug!("Parameter engine disposed");
    }
}

fn snapshot_of(state: &EngineState) -> ParameterSnapshot {
    ParameterSnapshot {
        readiness: state.readiness,
        visible: state.visible,
        parameters: state.cache.current().clone(),
        stamp: state.last_stamp,
        passes: state.passes,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
