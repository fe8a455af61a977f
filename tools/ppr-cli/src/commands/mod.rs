//! CLI command implementations.

pub mod build;
pub mod config;
pub mod render;
pub mod routes;

use clap::Args;

/// Arguments for the build command.
#[derive(Args)]
pub struct BuildArgs {
    /// Build id used in shell cache keys (default: from config).
    #[arg(short, long)]
    pub build_id: Option<String>,
}

/// Arguments for the render command.
#[derive(Args)]
pub struct RenderArgs {
    /// Pathname to request.
    pub pathname: String,

    /// Request cookie as name=value; may be repeated.
    #[arg(short, long = "cookie", value_name = "NAME=VALUE")]
    pub cookies: Vec<String>,

    /// Render in development mode.
    #[arg(long)]
    pub dev: bool,

    /// Request the complete page in one body.
    #[arg(long)]
    pub full_page: bool,

    /// Number of times to send the request.
    #[arg(short, long, default_value = "1")]
    pub repeat: usize,

    /// Print streamed chunks separately instead of the final document.
    #[arg(long)]
    pub chunks: bool,

    /// Build id used in shell cache keys (default: from config).
    #[arg(short, long)]
    pub build_id: Option<String>,
}

/// Arguments for the routes command.
#[derive(Args)]
pub struct RoutesArgs {
    /// Only list routes taking part in partial prerendering.
    #[arg(long)]
    pub ppr_only: bool,
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    /// Print the default config file instead of the loaded one.
    #[arg(long)]
    pub default: bool,
}
