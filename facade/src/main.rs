//! vigil-synth - runs a synthesis plan and writes the artifact graph

use anyhow::{Context, Result};
use clap::{Arg, Command};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vigil_facade::{MonitoringFacadeBuilder, SynthesisPlan, VigilConfig, VERSION};

fn main() -> Result<()> {
    let matches = Command::new("vigil-synth")
        .version(VERSION)
        .about("Synthesize alarms and dashboards from a monitoring plan")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path (defaults to config/ and VIGIL__ variables)"),
        )
        .arg(
            Arg::new("plan")
                .short('p')
                .long("plan")
                .value_name("FILE")
                .help("YAML synthesis plan")
                .required(true),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Write the artifact graph here instead of stdout"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)")
                .default_value("info"),
        )
        .get_matches();

    let log_level = matches
        .get_one::<String>("log-level")
        .map(String::as_str)
        .unwrap_or("info");
    init_logging(log_level);

    info!(version = VERSION, "vigil-synth starting");

    let config = match matches.get_one::<String>("config") {
        Some(path) => {
            info!("Loading config from: {}", path);
            VigilConfig::from_file(path).with_context(|| format!("failed to load config {}", path))?
        }
        None => VigilConfig::load().context("failed to load layered config")?,
    };

    let plan_path = matches
        .get_one::<String>("plan")
        .context("missing --plan")?;
    let plan = SynthesisPlan::from_file(plan_path).with_context(|| format!("failed to read plan {}", plan_path))?;

    let mut facade = MonitoringFacadeBuilder::new(config)
        .build()
        .context("invalid configuration")?;
    plan.apply(&mut facade).context("synthesis plan failed")?;
    let graph = facade.synthesize().context("failed to finalize synthesis")?;

    let json = graph.to_json_pretty()?;
    match matches.get_one::<String>("output") {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("failed to write {}", path))?;
            info!(
                path = %path,
                alarms = graph.alarms.len(),
                composites = graph.composite_alarms.len(),
                dashboards = graph.dashboards.len(),
                "Wrote artifact graph"
            );
        }
        None => println!("{}", json),
    }

    Ok(())
}

fn init_logging(log_level: &str) {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => {
            eprintln!("Invalid log level: {}. Using 'info'", log_level);
            tracing::Level::INFO
        }
    };

    // logs go to stderr so the graph on stdout stays parseable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                // target prefix match covers vigil_core, vigil_dashboard, vigil_facade and the binary
                .unwrap_or_else(|_| format!("vigil={}", level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
