//! # flatgist CLI Interface (Module)
//!
//! Command parsing and orchestration for the `flatgist` binary. Flattening,
//! sanitizing and the publish pipeline live in [`flatgist_core`]; this module
//! resolves settings, picks the concrete [`GistClient`] and prints results.
//!
//! For programmatic or integration use, call [`run`] with a constructed [`Cli`].

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use flatgist_core::config::{CollisionPolicy, UndecodablePolicy};
use flatgist_core::contract::PublishOutcome;
use flatgist_core::flatten::{flatten, FlattenOutput};
use flatgist_core::pipeline::{flatten_and_publish, preflight, validate_token, PublishSettings};
use std::path::PathBuf;

use crate::load_config::{
    file_layer, resolve_check_inputs, resolve_flatten_config, resolve_publish_inputs,
    Environment, FileConfig, Layers,
};
use crate::prompt::prompter_for;
use crate::upload::GistClient;

/// CLI for flatgist: flatten a directory tree and publish it as a GitHub Gist.
#[derive(Parser)]
#[clap(
    name = "flatgist",
    version,
    about = "Flatten a directory tree into uniquely named files and publish them as a GitHub Gist"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Stage flattened copies of the source tree without publishing
    Flatten(FlattenArgs),
    /// Flatten the source tree and publish it as a gist
    Publish(PublishArgs),
    /// Report API connection status and rate limit
    Check(CheckArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct FlattenArgs {
    /// Directory to flatten [env: SOURCE_DIR] [default: ./src]
    #[clap(long)]
    pub source_dir: Option<PathBuf>,

    /// Where flattened copies are written [env: OUTPUT_DIR] [default: ./output]
    #[clap(long)]
    pub staging_dir: Option<PathBuf>,

    /// Maximum number of files to process [env: MAX_FILES] [default: 3]
    #[clap(long)]
    pub max_files: Option<usize>,

    /// Directory name to skip at any depth; repeat for several [default: __pycache__]
    #[clap(long = "ignore", value_name = "NAME")]
    pub ignore: Vec<String>,

    /// overwrite, suffix or error [default: overwrite]
    #[clap(long, value_name = "POLICY")]
    pub on_collision: Option<CollisionPolicy>,

    /// abort or skip [default: abort]
    #[clap(long, value_name = "POLICY")]
    pub on_undecodable: Option<UndecodablePolicy>,

    /// YAML file with default settings
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Never prompt; fall back to defaults instead
    #[clap(long)]
    pub no_input: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct PublishArgs {
    #[clap(flatten)]
    pub flatten: FlattenArgs,

    /// Gist description [env: PROJECT_NAME] [default: flatgist]
    #[clap(long)]
    pub description: Option<String>,

    /// GitHub token [env: GITHUB_TOKEN]
    #[clap(long)]
    pub token: Option<String>,

    /// GitHub API base URL [env: GITHUB_API_URL]
    #[clap(long)]
    pub api_url: Option<String>,

    /// Do not query API status and rate limit before publishing
    #[clap(long)]
    pub skip_preflight: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct CheckArgs {
    /// GitHub token [env: GITHUB_TOKEN]
    #[clap(long)]
    pub token: Option<String>,

    /// GitHub API base URL [env: GITHUB_API_URL]
    #[clap(long)]
    pub api_url: Option<String>,

    /// Never prompt for the token
    #[clap(long)]
    pub no_input: bool,
}

/// Async CLI entrypoint shared by main() and integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    let env = Environment::from_process();
    let cwd = std::env::current_dir().context("failed to determine current directory")?;

    match cli.command {
        Commands::Flatten(args) => {
            let file = file_layer(&args)?;
            let prompter = prompter_for(args.no_input);
            let layers = Layers {
                env: &env,
                file: &file,
                prompter: prompter.as_ref(),
                cwd: &cwd,
            };
            let config = resolve_flatten_config(&args, &layers)?;
            config.trace_loaded();
            tracing::info!(command = "flatten", "Starting flatten");

            let output = flatten(&config).map_err(|e| {
                tracing::error!(command = "flatten", error = %e, "Flatten failed");
                e
            })?;
            print_flatten_summary(&output);
            Ok(())
        }
        Commands::Publish(args) => {
            let file = file_layer(&args.flatten)?;
            let prompter = prompter_for(args.flatten.no_input);
            let layers = Layers {
                env: &env,
                file: &file,
                prompter: prompter.as_ref(),
                cwd: &cwd,
            };
            let inputs = resolve_publish_inputs(&args, &layers)?;
            inputs.flatten.trace_loaded();
            validate_token(&inputs.token)?;
            tracing::info!(command = "publish", api_url = %inputs.api_url, "Starting publish");

            let client = GistClient::new(inputs.api_url.clone()).map_err(|e| anyhow!(e))?;
            let settings = PublishSettings {
                description: inputs.description,
                token: inputs.token,
                preflight: !args.skip_preflight,
            };
            let report = flatten_and_publish(&inputs.flatten, &settings, &client)
                .await
                .map_err(|e| {
                    tracing::error!(command = "publish", error = %e, "Publish failed");
                    e
                })?;

            if let Some(preflight) = &report.preflight {
                println!("Test GitHub API connection status code: {}", preflight.status);
                println!(
                    "Rate Limit Status: {}/{} remaining (resets at {})",
                    preflight.rate_limit.remaining,
                    preflight.rate_limit.limit,
                    preflight.rate_limit.reset
                );
            }
            print_flatten_summary(&report.flattened);

            match report.outcome {
                None => {
                    println!("No files were added to the Gist.");
                    Ok(())
                }
                Some(PublishOutcome::Created { url }) => {
                    println!("Gist created successfully!");
                    println!("Gist URL: {url}");
                    Ok(())
                }
                Some(PublishOutcome::Rejected { message }) => Err(anyhow!(message)),
            }
        }
        Commands::Check(args) => {
            let file = FileConfig::default();
            let prompter = prompter_for(args.no_input);
            let layers = Layers {
                env: &env,
                file: &file,
                prompter: prompter.as_ref(),
                cwd: &cwd,
            };
            let inputs = resolve_check_inputs(&args, &layers)?;
            validate_token(&inputs.token)?;

            let client = GistClient::new(inputs.api_url).map_err(|e| anyhow!(e))?;
            let status = preflight(&client, &inputs.token).await?;
            println!("Test GitHub API connection status code: {}", status.status);
            println!(
                "Rate Limit Status: {}/{} remaining, {} used (resets at {})",
                status.rate_limit.remaining,
                status.rate_limit.limit,
                status.rate_limit.used,
                status.rate_limit.reset
            );
            Ok(())
        }
    }
}

fn print_flatten_summary(output: &FlattenOutput) {
    for file in &output.processed {
        println!(
            "Prepared for upload: {} as {}",
            file.source_path.display(),
            file.flat_name
        );
    }
    for collision in &output.collisions {
        println!(
            "Warning: {} and {} both flatten to {} (stored as {})",
            collision.first.display(),
            collision.second.display(),
            collision.flat_name,
            collision.stored_as
        );
    }
    for skipped in &output.skipped {
        println!("Skipped (not UTF-8): {}", skipped.display());
    }
}
