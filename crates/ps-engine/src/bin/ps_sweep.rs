use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ps_data::{load_sweep, InputLoader};
use ps_engine::SweepPlan;
use ps_sweep::ParameterApplier;
use ps_types::{ParameterMetadata, SweepConfig};
use serde_json::Value;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ps-sweep")]
#[command(about = "Expand parameter ranges and apply sampled values to a process model")]
struct Args {
    /// Log level (debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the expanded sweep of a range table as JSON
    Expand {
        /// Range table (.csv or .json)
        ranges: PathBuf,
    },
    /// Print the ordered sweep points of a range table
    Plan {
        ranges: PathBuf,

        /// Sweep configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Apply one value to a model and print the result
    Apply {
        /// Serialized model instance (JSON)
        #[arg(short, long)]
        model: PathBuf,

        #[arg(short = 'p', long)]
        label: String,

        #[arg(short, long, allow_negative_numbers = true)]
        value: f64,

        /// Parameter metadata as a JSON object
        #[arg(long)]
        metadata: Option<String>,

        /// Opaque context forwarded to the update routine (JSON)
        #[arg(long)]
        context: Option<String>,
    },
}

fn init_logging(level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ps_sweep={level},ps_engine={level},ps_data={level}")));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    match args.command {
        Command::Expand { ranges } => {
            let sweep = load_sweep(&ranges)
                .with_context(|| format!("expanding {}", ranges.display()))?;
            println!("{}", serde_json::to_string_pretty(&sweep)?);
        }
        Command::Plan { ranges, config } => {
            let config = match config {
                Some(path) => InputLoader::new().load_config_json(&path)?,
                None => SweepConfig::default(),
            };
            let sweep = load_sweep(&ranges)
                .with_context(|| format!("expanding {}", ranges.display()))?;
            let plan = SweepPlan::from_sweep(&sweep).limited(config.max_points);
            tracing::info!("{} points across {} axes", plan.len(), sweep.len());
            println!("{}", serde_json::to_string_pretty(&plan.points)?);
        }
        Command::Apply {
            model,
            label,
            value,
            metadata,
            context,
        } => {
            let mut instance = InputLoader::new().load_model_json(&model)?;
            let metadata: ParameterMetadata = match metadata {
                Some(text) => serde_json::from_str(&text).context("parsing --metadata")?,
                None => ParameterMetadata::default(),
            };
            let context: Option<Value> = context
                .map(|text| serde_json::from_str(&text))
                .transpose()
                .context("parsing --context")?;

            let applier = ParameterApplier::standard();
            applier.prepare(&mut instance, [label.as_str()])?;
            applier.apply(&mut instance, &label, value, Some(&metadata), context.as_ref())?;
            println!("{}", serde_json::to_string_pretty(&instance)?);
        }
    }

    Ok(())
}
