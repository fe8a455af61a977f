//! PPR CLI - command line tool for the partial prerendering engine.
//!
//! Commands:
//! - `ppr build` - Prerender every route and print the build report
//! - `ppr render` - Serve one request and print the response
//! - `ppr routes` - List routes
//! - `ppr config` - Show configuration

mod commands;
mod config;
mod context;
mod output;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use ppr_server::prelude::logging;

use commands::{BuildArgs, ConfigArgs, RenderArgs, RoutesArgs};

/// PPR CLI - prerender and serve partially prerendered pages
#[derive(Parser)]
#[command(name = "ppr")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prerender every route and store the shells
    Build(BuildArgs),

    /// Serve a request and print the response
    Render(RenderArgs),

    /// List routes
    Routes(RoutesArgs),

    /// Show configuration
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let output = output::Output::new(cli.verbose, cli.json);
    let ctx = context::Context::load(cli.config.as_deref(), output)?;

    let mut settings = ctx.config.logging.clone();
    if ctx.output.is_verbose() {
        settings = settings.verbose();
    }
    logging::init(&settings).context("Failed to initialize logging")?;

    let result = match cli.command {
        Commands::Build(args) => commands::build::run(args, &ctx).await,
        Commands::Render(args) => commands::render::run(args, &ctx).await,
        Commands::Routes(args) => commands::routes::run(args, &ctx).await,
        Commands::Config(args) => commands::config::run(args, &ctx).await,
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
