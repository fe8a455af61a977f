//! Show configuration.

use anyhow::{Context as _, Result};

use super::ConfigArgs;
use crate::config::generate_default_config;
use crate::context::Context;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    if args.default {
        print!("{}", generate_default_config());
        return Ok(());
    }

    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    match &ctx.config_path {
        Some(path) => ctx.output.info(&format!("Loaded from {}", path.display())),
        None => ctx.output.info("No config file found, using defaults"),
    }
    let content = toml::to_string_pretty(&ctx.config).context("Failed to format config")?;
    print!("{}", content);
    Ok(())
}
