//! CLI entry point for fileportal-edge: runs one portal handler on one
//! event.
//!
//! The event JSON is read from `--input` (stdin by default) and the
//! handler's result JSON is written to stdout.  Logs go to stderr.  A
//! misconfigured origin or an unreadable event exits with status 1.

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::io::Read;
use std::path::PathBuf;

use fileportal::config::Config;
use fileportal::edge::event::{outcome_to_json, ApiEvent, EdgeEvent};
use fileportal::handlers::decorator::ResponseDecorator;
use fileportal::handlers::router::RequestRouter;
use fileportal::handlers::upload::UploadUrlIssuer;
use fileportal::listing::ListingTemplate;
use fileportal::logging::{init_tracing, LogOutput};

#[derive(Parser)]
#[command(name = "fileportal-edge", about = "Run a file portal edge handler on one event")]
struct Cli {
    /// YAML configuration; defaults apply when absent.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Event file, or `-` for stdin.
    #[arg(long, global = true, default_value = "-")]
    input: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Route a CloudFront origin-request event
    OriginRequest,
    /// Decorate a CloudFront origin-response event
    OriginResponse,
    /// Answer an API-Gateway upload URL event
    UploadUrl,
}

fn main() {
    let cli = Cli::parse();
    let rc = match run(cli) {
        Ok(output) => {
            println!("{output}");
            0
        }
        Err(e) => {
            eprintln!("fileportal-edge: {e:#}");
            1
        }
    };
    std::process::exit(rc);
}

fn run(cli: Cli) -> anyhow::Result<String> {
    let config = match &cli.config {
        Some(path) => fileportal::config::load_config(path)?,
        None => Config::default(),
    };
    init_tracing(&config.logging, LogOutput::Stderr)?;

    let input = read_input(&cli.input)?;
    let runtime = tokio::runtime::Runtime::new()?;
    let output = runtime.block_on(dispatch(&cli.command, &config, &input))?;
    Ok(serde_json::to_string(&output)?)
}

async fn dispatch(command: &Commands, config: &Config, input: &str) -> anyhow::Result<Value> {
    match command {
        Commands::OriginRequest => {
            let store = fileportal::storage::from_config(&config.storage).await?;
            let router = RequestRouter::new(
                store,
                ListingTemplate::new(config.edge.listing_title.clone()),
            );
            let request = EdgeEvent::from_json(input)?.request()?;
            let outcome = router.route(request).await?;
            Ok(outcome_to_json(&outcome)?)
        }
        Commands::OriginResponse => {
            let event = EdgeEvent::from_json(input)?;
            Ok(ResponseDecorator.decorate_event(&event)?)
        }
        Commands::UploadUrl => {
            let store = fileportal::storage::from_config(&config.storage).await?;
            let issuer = UploadUrlIssuer::from_env(store, &config.upload.bucket_env)?;
            let event = ApiEvent::from_json(input)?;
            let response = issuer.handle(&event.query()).await;
            Ok(serde_json::to_value(response)?)
        }
    }
}

fn read_input(input: &str) -> anyhow::Result<String> {
    if input == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        Ok(std::fs::read_to_string(input)?)
    }
}
