use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use qparams_core::{
    EngineConfig, InMemorySchema, PanelView, ParameterEngine, SchemaDocument, SharedDocument,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "qparams")]
#[command(about = "Inspect and bind FlexibleSearch query parameters", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the parameters of a query
    Params {
        #[command(flatten)]
        input: InputArgs,

        /// Output JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the query with parameter values substituted
    Bind {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Print the value annotations shown after each placeholder
    Hints {
        #[command(flatten)]
        input: InputArgs,

        /// Output JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct InputArgs {
    /// File holding the query text
    #[arg(long)]
    query: PathBuf,

    /// Schema file (.json or .toml) with declared attribute types
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Parameter value as typed in the panel (repeatable)
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    assignments: Vec<(String, String)>,

    /// Placeholder marker
    #[arg(long, default_value_t = '?')]
    marker: char,
}

fn parse_assignment(raw: &str) -> std::result::Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {raw:?}"))?;
    let name = name.trim().trim_start_matches('?');
    if name.is_empty() {
        return Err(format!("missing parameter name in {raw:?}"));
    }
    Ok((name.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Params { input, json } => {
            let engine = open(&input)?;
            print_view(&engine.view(), json)?;
        }
        Commands::Bind { input } => {
            let engine = open(&input)?;
            println!("{}", engine.query_with_bound_values());
        }
        Commands::Hints { input, json } => {
            let engine = open(&input)?;
            let hints = engine.inlay_hints();
            if json {
                println!("{}", serde_json::to_string_pretty(&hints)?);
            } else {
                for hint in hints {
                    println!("{}\t{}\t{}", hint.offset, hint.name, hint.label);
                }
            }
        }
    }

    Ok(())
}

/// Load inputs, run the first pass with the panel shown and apply `--set`s
fn open(input: &InputArgs) -> Result<ParameterEngine> {
    let query = fs::read_to_string(&input.query)
        .with_context(|| format!("Failed to read query {}", input.query.display()))?;
    let schema = match &input.schema {
        Some(path) => SchemaDocument::load(path)
            .with_context(|| format!("Failed to load schema {}", path.display()))?,
        None => SchemaDocument::default(),
    };
    let schema = Arc::new(InMemorySchema::from_document(schema)?);
    let document = Arc::new(SharedDocument::new(query.trim_end()));

    let config = EngineConfig {
        marker: input.marker,
        initially_visible: true,
        ..EngineConfig::immediate()
    };
    let engine = ParameterEngine::start(document, schema, config)?;
    log::debug!("Extracted {} parameters", engine.parameters().len());

    for (name, value) in &input.assignments {
        let canonical = engine
            .set_display_text(name, value)
            .with_context(|| format!("Cannot set parameter {name}"))?;
        log::debug!("{name} = {canonical}");
    }
    Ok(engine)
}

fn print_view(view: &PanelView, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(view)?);
        return Ok(());
    }
    match view {
        PanelView::Hidden => {}
        PanelView::NotReady => println!("Initializing type system"),
        PanelView::NoParameters => println!("Query doesn't have parameters"),
        PanelView::Parameters(parameters) => {
            for parameter in parameters {
                let shown = qparams_core::codec::presentation(parameter.kind, &parameter.value);
                println!("{}\t{}\t{}", parameter.name, parameter.kind, shown);
            }
        }
    }
    Ok(())
}
