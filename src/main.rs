//! Autoprep - Main Entry Point
//!
//! Training-time preprocessing CLI. The serving process is embedded by the
//! application that owns a model engine; see `autoprep::server::run_server`.

use std::path::Path;

use clap::{Parser, Subcommand};
use tracing::info;

use autoprep::artifacts::ServingContext;
use autoprep::classify::DEFAULT_DROP_THRESHOLD;
use autoprep::trainer::{TaskKind, Trainer};

#[derive(Parser)]
#[command(name = "autoprep", about = "Train/serve-consistent tabular preprocessing")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean a training dataset and write the schema/constants artifacts
    Prepare {
        /// Path to the training data (CSV)
        #[arg(long)]
        data: String,
        /// Label column name
        #[arg(long)]
        label: String,
        /// Task kind: classify or regress
        #[arg(long, default_value = "classify")]
        task: String,
        /// Missing-fraction threshold at which a column is dropped
        #[arg(long, default_value_t = DEFAULT_DROP_THRESHOLD)]
        drop_threshold: f64,
        /// Columns to force to categorical after the automatic pass
        #[arg(long)]
        categorical: Vec<String>,
        /// Id column, excluded from features and round-tripped at serving
        #[arg(long)]
        index: Option<String>,
        /// Location where the externally trained model will live
        #[arg(long)]
        model_path: String,
        /// Directory receiving the artifact pair
        #[arg(long, default_value = "config")]
        out_dir: String,
        /// Optional path for the cleaned dataset (CSV)
        #[arg(long)]
        cleaned: Option<String>,
    },
    /// Summarize a persisted artifact pair
    Inspect {
        #[arg(long, default_value = "config")]
        config_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "autoprep=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Prepare {
            data,
            label,
            task,
            drop_threshold,
            categorical,
            index,
            model_path,
            out_dir,
            cleaned,
        } => {
            let task: TaskKind = task.parse()?;
            let mut trainer = Trainer::from_path(&data, task)?;
            trainer.set_label(&label)?;
            trainer.clean(drop_threshold)?;
            if !categorical.is_empty() {
                trainer.set_categorical(&categorical)?;
            }
            let (schema, _) =
                trainer.write_artifacts(&model_path, index.as_deref(), Path::new(&out_dir))?;
            if let Some(path) = cleaned {
                trainer.save_cleaned(&path)?;
                info!(path = %path, "cleaned dataset written");
            }
            info!(
                version = %schema.version,
                features = schema.features.len(),
                "preparation complete"
            );
        }
        Commands::Inspect { config_dir } => {
            let ctx = ServingContext::load(Path::new(&config_dir))?;
            println!("version:   {}", ctx.version());
            println!("model:     {}", ctx.schema.model_path);
            println!("label:     {}", ctx.schema.label);
            println!("index:     {}", ctx.schema.index.as_deref().unwrap_or("-"));
            println!("features:  {}", ctx.schema.features.join(", "));
            println!("constants: {}", ctx.constants.values.len());
            println!("labels:    {}", ctx.label_map.len());
        }
    }

    Ok(())
}
