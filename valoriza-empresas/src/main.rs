//! valoriza-empresas - command-line entry point
//!
//! Consolidates one RUC against the scraping service and prints the
//! decision as JSON on stdout. Logs go to stderr.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use valoriza_common::config::load_config_with_source;
use valoriza_common::logging::init_tracing;
use valoriza_empresas::sources::{ManualInput, ScraperServiceAdapter, SourceAdapter};
use valoriza_empresas::{ConsolidationConfig, ConsolidationOrchestrator, ConsolidationRequest};

/// Command-line arguments for valoriza-empresas
#[derive(Parser, Debug)]
#[command(name = "valoriza-empresas")]
#[command(about = "Consolida datos de empresas desde SUNAT, OSCE y formulario manual")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Consolidate a RUC and print the creation decision
    Consolidar {
        ruc: String,

        /// JSON file with the manual form
        #[arg(long)]
        manual: Option<PathBuf>,

        /// Rank manual data ahead of the registries
        #[arg(long)]
        priorizar_manual: bool,

        /// Require estado and at least one representative
        #[arg(long)]
        estricta: bool,

        /// Reject records missing razon_social, direccion or representatives
        #[arg(long)]
        sin_parciales: bool,
    },

    /// Check a RUC and preview registry data
    ValidarRuc { ruc: String },
}

fn read_manual(path: &Path) -> Result<ManualInput> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manual form {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse manual form {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (toml_config, config_source) =
        load_config_with_source(args.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&toml_config.logging).context("Failed to initialize logging")?;
    match &config_source {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => info!("No config file found, using defaults"),
    }

    let config = ConsolidationConfig::from_toml(&toml_config.consolidacion)
        .context("Invalid [consolidacion] configuration")?;

    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(ScraperServiceAdapter::sunat(&toml_config.scraper).context("SUNAT adapter")?),
        Arc::new(ScraperServiceAdapter::osce(&toml_config.scraper).context("OSCE adapter")?),
    ];
    info!(
        scraper = %toml_config.scraper.base_url,
        priority = ?config.priority,
        "Orchestrator ready"
    );
    let orchestrator = ConsolidationOrchestrator::new(config, adapters);

    let output = match args.command {
        Command::Consolidar {
            ruc,
            manual,
            priorizar_manual,
            estricta,
            sin_parciales,
        } => {
            let mut request = ConsolidationRequest::new(ruc);
            if let Some(path) = manual {
                request = request.with_manual(read_manual(&path)?);
            }
            request.priorizar_manual = priorizar_manual;
            request.validacion_estricta = estricta;
            request.permitir_datos_parciales = !sin_parciales;

            let decision = orchestrator.consolidate(&request).await;
            serde_json::to_string_pretty(&decision)?
        }
        Command::ValidarRuc { ruc } => {
            let check = orchestrator.validar_ruc(&ruc).await;
            serde_json::to_string_pretty(&check)?
        }
    };

    println!("{}", output);
    Ok(())
}
