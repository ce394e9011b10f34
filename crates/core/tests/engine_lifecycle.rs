use pretty_assertions::assert_eq;
use qparams_core::{
    DisplayValue, EngineConfig, FlexibleSearchParser, InMemorySchema, PanelView, Parameter,
    ParameterEngine, ParamsError, ParseError, PassOutcome, PassReason, PassUpdate,
    PlaceholderOccurrence, PlaceholderParser, SchemaDocument, SchemaOracle, SchemaReadiness,
    SharedDocument, ValueKind,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;

const PLAIN: &str = "SELECT * FROM T WHERE id = ?id AND active = ?flag";
const TYPED: &str = "SELECT {pk} FROM {Product} WHERE {creationtime} >= ?since AND {approved} = ?ok AND {stock} > ?min AND {code} = ?code";

fn catalog() -> SchemaDocument {
    SchemaDocument::default()
        .attribute("Product", "code", "java.lang.String")
        .attribute("Product", "approved", "java.lang.Boolean")
        .attribute("Product", "creationtime", "java.util.Date")
        .attribute("Product", "stock", "int")
}

fn ready_schema() -> Arc<InMemorySchema> {
    Arc::new(InMemorySchema::from_document(catalog()).unwrap())
}

fn visible() -> EngineConfig {
    EngineConfig {
        initially_visible: true,
        ..EngineConfig::immediate()
    }
}

async fn next_update(updates: &mut broadcast::Receiver<PassUpdate>) -> PassUpdate {
    timeout(Duration::from_secs(2), updates.recv())
        .await
        .expect("pass update in time")
        .expect("update channel open")
}

async fn assert_quiet(updates: &mut broadcast::Receiver<PassUpdate>) {
    assert!(
        timeout(Duration::from_millis(100), updates.recv()).await.is_err(),
        "unexpected extra pass"
    );
}

/// Runs a one-shot hook in the middle of extraction
struct HookedParser {
    inner: FlexibleSearchParser,
    hook: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl HookedParser {
    fn new() -> Self {
        Self {
            inner: FlexibleSearchParser::default(),
            hook: Mutex::new(None),
        }
    }

    fn arm(&self, hook: impl FnOnce() + Send + 'static) {
        *self.hook.lock().unwrap() = Some(Box::new(hook));
    }
}

impl PlaceholderParser for HookedParser {
    fn parse_placeholders(
        &self,
        text: &str,
        schema: &dyn SchemaOracle,
    ) -> Result<Vec<PlaceholderOccurrence>, ParseError> {
        let hook = self.hook.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
        self.inner.parse_placeholders(text, schema)
    }
}

#[tokio::test]
async fn first_pass_without_hints_yields_text_parameters() {
    let schema = Arc::new(InMemorySchema::from_document(SchemaDocument::default()).unwrap());
    let document = Arc::new(SharedDocument::new(PLAIN));
    let engine = ParameterEngine::start(document, schema, visible()).unwrap();

    assert_eq!(
        engine.parameters(),
        vec![
            Parameter::new("id", "", ValueKind::Text),
            Parameter::new("flag", "", ValueKind::Text),
        ]
    );
}

#[tokio::test]
async fn edited_value_survives_reextraction() {
    let document = Arc::new(SharedDocument::new(PLAIN));
    let engine = ParameterEngine::start(document.clone(), ready_schema(), visible()).unwrap();

    assert_eq!(engine.set_value("id", "abc").unwrap(), "'abc'");
    document.set_text(PLAIN);
    assert!(matches!(engine.document_changed(), Some(PassOutcome::Merged(_))));

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.parameters.get("id").unwrap().value, "'abc'");
    let PanelView::Parameters(views) = engine.view() else {
        panic!("expected parameter list");
    };
    assert_eq!(views[0].display, DisplayValue::from("abc"));
}

#[tokio::test]
async fn schema_ready_while_visible_runs_exactly_one_pass() {
    let schema = Arc::new(InMemorySchema::new());
    let document = Arc::new(SharedDocument::new(TYPED));
    let engine = ParameterEngine::start(document, schema.clone(), EngineConfig::immediate()).unwrap();
    let mut updates = engine.subscribe_updates();

    assert!(engine.toggle_visibility());
    assert_eq!(engine.view(), PanelView::NotReady);
    assert!(engine.parameters().is_empty());
    assert_eq!(engine.snapshot().passes, 0);

    schema.install(catalog()).unwrap();
    let update = next_update(&mut updates).await;
    assert_eq!(update.reason, PassReason::SchemaChanged);
    assert_eq!(update.parameter_count, 4);
    assert_quiet(&mut updates).await;

    assert_eq!(engine.readiness(), SchemaReadiness::Ready);
    assert_eq!(engine.snapshot().passes, 1);
    let kinds: Vec<_> = engine.parameters().into_iter().map(|p| p.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ValueKind::Temporal,
            ValueKind::Boolean,
            ValueKind::Integer,
            ValueKind::Text
        ]
    );
}

#[tokio::test]
async fn schema_change_recomputes_hidden_panel() {
    let schema = Arc::new(InMemorySchema::new());
    let document = Arc::new(SharedDocument::new(TYPED));
    let engine = ParameterEngine::start(document, schema.clone(), EngineConfig::immediate()).unwrap();
    let mut updates = engine.subscribe_updates();

    schema.install(catalog()).unwrap();
    next_update(&mut updates).await;
    assert!(!engine.is_panel_visible());
    assert_eq!(engine.view(), PanelView::Hidden);
    assert_eq!(engine.parameters().len(), 4);
}

#[tokio::test]
async fn readiness_loss_hides_parameters() {
    let schema = ready_schema();
    let document = Arc::new(SharedDocument::new(TYPED));
    let engine = ParameterEngine::start(document, schema.clone(), visible()).unwrap();
    let mut stream = engine.snapshot_stream();
    assert_eq!(engine.parameters().len(), 4);

    schema.set_ready(false);
    timeout(
        Duration::from_secs(2),
        stream.wait_for(|s| s.readiness == SchemaReadiness::Uninitialized),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(engine.parameters().is_empty());
    assert_eq!(engine.view(), PanelView::NotReady);
    assert_eq!(engine.query_with_bound_values(), TYPED);
    assert!(engine.inlay_hints().is_empty());
}

#[tokio::test]
async fn burst_of_notifications_runs_one_pass() {
    let schema = ready_schema();
    let document = Arc::new(SharedDocument::new(TYPED));
    let engine = ParameterEngine::start(document, schema.clone(), visible()).unwrap();
    let mut updates = engine.subscribe_updates();
    assert_eq!(engine.snapshot().passes, 1);

    for _ in 0..3 {
        schema.set_ready(true);
    }
    next_update(&mut updates).await;
    assert_quiet(&mut updates).await;
    assert_eq!(engine.snapshot().passes, 2);
}

#[tokio::test]
async fn identical_inputs_are_coalesced() {
    let document = Arc::new(SharedDocument::new(TYPED));
    let engine = ParameterEngine::start(document.clone(), ready_schema(), visible()).unwrap();
    let before = engine.snapshot();

    assert_eq!(engine.refresh(), PassOutcome::Coalesced);
    assert_eq!(engine.document_changed(), Some(PassOutcome::Coalesced));

    document.set_text(TYPED);
    assert!(matches!(engine.refresh(), PassOutcome::Merged(_)));
    assert_eq!(engine.snapshot().parameters, before.parameters);
}

#[tokio::test]
async fn toggling_forces_a_pass_and_hiding_does_not() {
    let document = Arc::new(SharedDocument::new(PLAIN));
    let engine = ParameterEngine::start(document.clone(), ready_schema(), EngineConfig::immediate()).unwrap();
    assert_eq!(engine.snapshot().passes, 0);

    assert!(engine.toggle_visibility());
    assert_eq!(engine.snapshot().passes, 1);
    assert!(!engine.toggle_visibility());
    assert_eq!(engine.snapshot().passes, 1);

    document.set_text("SELECT * FROM T WHERE id = ?id");
    assert_eq!(engine.document_changed(), None);
    assert_eq!(engine.parameters().len(), 2);

    assert!(engine.toggle_visibility());
    assert_eq!(engine.snapshot().passes, 2);
    assert_eq!(engine.parameters().len(), 1);

    assert!(!engine.toggle_visibility());
    assert!(engine.toggle_visibility());
    assert_eq!(engine.snapshot().passes, 3);
}

#[tokio::test]
async fn vanished_names_drop_and_duplicates_fold() {
    let document = Arc::new(SharedDocument::new("SELECT * FROM T WHERE a = ?x OR b = ?x OR c = ?y"));
    let engine = ParameterEngine::start(document.clone(), ready_schema(), visible()).unwrap();
    assert_eq!(
        engine.parameters().iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
        vec!["x", "y"]
    );

    engine.set_value("y", "keep").unwrap();
    document.set_text("SELECT * FROM T WHERE c = ?y");
    engine.document_changed();
    assert_eq!(
        engine.parameters(),
        vec![Parameter::new("y", "'keep'", ValueKind::Text)]
    );
}

#[tokio::test]
async fn typed_edits_and_bound_query() {
    let document = Arc::new(SharedDocument::new(TYPED));
    let engine = ParameterEngine::start(document, ready_schema(), visible()).unwrap();

    assert_eq!(
        engine.set_display_text("since", "2024-03-01 12:30:00.250").unwrap(),
        "1709296200250"
    );
    assert_eq!(engine.set_display_text("ok", "yes").unwrap(), "1");
    assert_eq!(engine.set_display_text("min", "10").unwrap(), "10");
    assert!(matches!(
        engine.set_display_text("min", "ten"),
        Err(ParamsError::InvalidValue { .. })
    ));
    assert!(matches!(
        engine.set_value("missing", "x"),
        Err(ParamsError::UnknownParameter(_))
    ));

    assert_eq!(
        engine.query_with_bound_values(),
        "SELECT {pk} FROM {Product} WHERE {creationtime} >= 1709296200250 AND {approved} = 1 AND {stock} > 10 AND {code} = ?code"
    );

    let hints = engine.inlay_hints();
    let labels: Vec<_> = hints.iter().map(|h| h.label.as_str()).collect();
    assert_eq!(
        labels,
        vec!["= 2024-03-01 12:30:00.250", "= true", "= 10"]
    );
}

#[tokio::test]
async fn query_without_parameters() {
    let document = Arc::new(SharedDocument::new("SELECT {pk} FROM {Product}"));
    let engine = ParameterEngine::start(document, ready_schema(), visible()).unwrap();
    assert_eq!(engine.view(), PanelView::NoParameters);
}

#[tokio::test]
async fn dispose_during_extraction_discards_result() {
    let parser = Arc::new(HookedParser::new());
    let document = Arc::new(SharedDocument::new(PLAIN));
    let engine = ParameterEngine::start_with_parser(
        document.clone(),
        ready_schema(),
        parser.clone(),
        visible(),
    )
    .unwrap();
    let mut updates = engine.subscribe_updates();
    let before = engine.snapshot();

    let handle = engine.clone();
    parser.arm(move || handle.dispose());
    document.set_text("SELECT * FROM T WHERE other = ?other");

    assert_eq!(engine.refresh(), PassOutcome::Disposed);
    assert!(engine.is_disposed());
    assert_eq!(engine.snapshot().parameters, before.parameters);
    assert!(updates.try_recv().is_err());
    assert!(matches!(engine.set_value("id", "x"), Err(ParamsError::Disposed)));
    assert_eq!(engine.refresh(), PassOutcome::Disposed);
}

#[tokio::test]
async fn older_pass_is_superseded_by_newer_input() {
    let parser = Arc::new(HookedParser::new());
    let document = Arc::new(SharedDocument::new(PLAIN));
    let engine = ParameterEngine::start_with_parser(
        document.clone(),
        ready_schema(),
        parser.clone(),
        visible(),
    )
    .unwrap();

    document.set_text("SELECT * FROM T WHERE a = ?first");
    let handle = engine.clone();
    let doc = document.clone();
    parser.arm(move || {
        doc.set_text("SELECT * FROM T WHERE b = ?second");
        assert!(matches!(handle.refresh(), PassOutcome::Merged(_)));
    });

    assert_eq!(engine.refresh(), PassOutcome::Superseded);
    assert_eq!(
        engine.parameters(),
        vec![Parameter::new("second", "", ValueKind::Text)]
    );
}

#[tokio::test]
async fn dropping_last_handle_stops_listening() {
    let schema = ready_schema();
    let document = Arc::new(SharedDocument::new(PLAIN));
    let engine = ParameterEngine::start(document, schema.clone(), visible()).unwrap();
    let mut stream = engine.snapshot_stream();
    drop(engine);

    schema.set_ready(true);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(stream.has_changed().is_err());
}

#[tokio::test]
async fn rejects_invalid_config() {
    let document = Arc::new(SharedDocument::new(PLAIN));
    let config = EngineConfig {
        update_capacity: 0,
        ..EngineConfig::default()
    };
    assert!(matches!(
        ParameterEngine::start(document, ready_schema(), config),
        Err(ParamsError::InvalidConfig(_))
    ));
}

#[tokio::test]
async fn unparseable_text_keeps_entered_values() {
    let document = Arc::new(SharedDocument::new(PLAIN));
    let engine = ParameterEngine::start(document.clone(), ready_schema(), visible()).unwrap();
    let mut updates = engine.subscribe_updates();
    engine.set_value("id", "abc").unwrap();

    let broken = format!("{PLAIN} AND x = '");
    document.set_text(broken.as_str());
    assert_eq!(engine.document_changed(), Some(PassOutcome::ParseUnavailable));
    assert_eq!(
        engine.parameters(),
        vec![
            Parameter::new("id", "'abc'", ValueKind::Text),
            Parameter::new("flag", "", ValueKind::Text),
        ]
    );
    assert_eq!(engine.query_with_bound_values(), broken);
    assert!(engine.inlay_hints().is_empty());
    assert!(updates.try_recv().is_err());

    document.set_text(PLAIN);
    assert!(matches!(engine.document_changed(), Some(PassOutcome::Merged(_))));
    assert_eq!(engine.snapshot().parameters.get("id").unwrap().value, "'abc'");
}

#[tokio::test]
async fn readiness_waits_for_the_notification() {
    let schema = Arc::new(InMemorySchema::new());
    let document = Arc::new(SharedDocument::new(TYPED));
    let config = EngineConfig {
        initially_visible: true,
        debounce_ms: 50,
        ..EngineConfig::default()
    };
    let engine = ParameterEngine::start(document, schema.clone(), config).unwrap();
    let mut updates = engine.subscribe_updates();

    schema.install(catalog()).unwrap();
    assert_eq!(engine.refresh(), PassOutcome::NotReady);
    assert!(!engine.toggle_visibility());
    assert!(engine.toggle_visibility());
    assert_eq!(engine.view(), PanelView::NotReady);

    let update = next_update(&mut updates).await;
    assert_eq!(update.reason, PassReason::SchemaChanged);
    assert_quiet(&mut updates).await;
    assert_eq!(engine.snapshot().passes, 1);
    assert_eq!(engine.parameters().len(), 4);
}
