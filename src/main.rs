//! PhishFinder command-line analyzer
//!
//! Runs one streaming analysis and prints the NDJSON events to stdout.
//! Logs go to stderr so the output can be piped.
//!
//! Usage:
//!   phishfinder test@scam-domain.xyz
//!   phishfinder https://login.example.net --pro
//!   cat message.eml | phishfinder - --basic

use clap::{Arg, ArgAction, Command};
use eyre::{bail, Result};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

use phishfinder::utils::constants::APP_VERSION;
use phishfinder::{AnalysisPipeline, AnalysisRequest, AppConfig, ModelTier, PromptVariant, StreamEvent};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let matches = Command::new("phishfinder")
        .version(APP_VERSION)
        .about("Phishing-risk analysis for URLs, domains, email addresses and raw email source")
        .arg(
            Arg::new("indicator")
                .help("Indicator to analyze, or '-' to read raw email source from stdin")
                .required(true),
        )
        .arg(
            Arg::new("pro")
                .long("pro")
                .help("Use the thorough model tier")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("basic")
                .long("basic")
                .help("Skip the generated security alert and social post")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let indicator = match matches.get_one::<String>("indicator").map(String::as_str) {
        Some("-") => {
            let mut source = String::new();
            tokio::io::stdin().read_to_string(&mut source).await?;
            source
        }
        Some(value) => value.to_string(),
        None => bail!("missing indicator"),
    };

    let tier = if matches.get_flag("pro") {
        ModelTier::Thorough
    } else {
        ModelTier::Fast
    };
    let variant = if matches.get_flag("basic") {
        PromptVariant::Basic
    } else {
        PromptVariant::Full
    };

    let config = AppConfig::from_env()?;
    let request = AnalysisRequest::new(indicator, tier)?;
    let pipeline = Arc::new(AnalysisPipeline::from_config(&config)?);

    let mut events = AnalysisPipeline::stream(pipeline, request, variant);
    let mut failed = false;
    while let Some(event) = events.recv().await {
        failed |= matches!(event, StreamEvent::Error(_));
        print!("{}", event.to_ndjson_line());
    }

    if failed {
        bail!("analysis failed");
    }
    Ok(())
}
