use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::PublishConfig;
use crate::dropbox::DropboxClient;
use crate::load_config::load_config;
use crate::pdf::PdfConverter;
use crate::pipeline::{Pipeline, PublishReport};
use crate::replay::{replay_row, Sheet};
use crate::store::TemplateDirStore;
use crate::submission::SubmissionRecord;

/// CLI for form-publish: render form submissions to PDF and file them per submitter.
#[derive(Parser)]
#[clap(
    name = "form-publish",
    version,
    about = "Render form submissions into documents and publish them to remote storage"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Publish one submission read from a JSON file (label -> answers)
    Publish {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Path to the submission JSON file
        #[clap(long)]
        submission: PathBuf,
    },
    /// Publish one row of a CSV export of the response sheet again
    Replay {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Path to the CSV export
        #[clap(long)]
        sheet: PathBuf,
        /// Sheet row number; row 1 is the header
        #[clap(long)]
        row: usize,
    },
}

fn read_submission(path: &Path) -> Result<SubmissionRecord> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read submission file {}", path.display()))?;
    let record: SubmissionRecord = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse submission JSON {}", path.display()))?;
    tracing::info!(path = %path.display(), fields = record.len(), "Read submission");
    Ok(record)
}

struct Collaborators {
    store: TemplateDirStore,
    converter: PdfConverter,
    backend: DropboxClient,
}

impl Collaborators {
    fn from_config(config: &PublishConfig) -> Self {
        Self {
            store: TemplateDirStore::new(&config.templates_dir),
            converter: PdfConverter::default(),
            backend: DropboxClient::from_config(&config.storage),
        }
    }

    fn pipeline<'a>(&'a self, config: &'a PublishConfig) -> Result<Pipeline<'a>> {
        Ok(Pipeline::new(
            config,
            &self.store,
            &self.converter,
            &self.backend,
        )?)
    }
}

fn print_report(report: &PublishReport) {
    println!("Publish complete.\nReport:");
    println!("{:#?}", report);
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let result = match cli.command {
        Commands::Publish { config, submission } => {
            let config = load_config(config)?;
            let record = read_submission(&submission)?;
            let collaborators = Collaborators::from_config(&config);
            let pipeline = collaborators.pipeline(&config)?;
            println!("Publish starting...");
            pipeline.run(&record).await
        }
        Commands::Replay { config, sheet, row } => {
            let config = load_config(config)?;
            let sheet = Sheet::from_path(&sheet)?;
            // Reject the selection before any collaborator is built.
            sheet.record_at(row)?;
            let collaborators = Collaborators::from_config(&config);
            let pipeline = collaborators.pipeline(&config)?;
            println!("Replay of row {row} starting...");
            replay_row(&pipeline, &sheet, row).await
        }
    };

    match result {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            tracing::error!(kind = e.kind(), error = %e, "Publishing failed");
            eprintln!("[ERROR] Publishing failed: {}", e);
            Err(e.into())
        }
    }
}
