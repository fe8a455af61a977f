//! Prerender every route of the demo workload.

use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::Utc;
use ppr_server::prelude::MemoryWriter;

use super::BuildArgs;
use crate::context::Context;
use crate::output::{format_millis, kind_badge};

/// Run the build command.
pub async fn run(args: BuildArgs, ctx: &Context) -> Result<()> {
    let engine = ctx.engine(args.build_id.as_deref(), false);
    let writer = Arc::new(MemoryWriter::new());
    let server = ctx.server(engine.clone(), writer.clone())?;

    ctx.output.header("Prerendering routes");
    ctx.output.kv("Build id", &engine.build_id);
    ctx.output.kv("Routes", &server.routes().len().to_string());

    let started = std::time::Instant::now();
    let report = server.prerender_all().await;
    let elapsed = started.elapsed();
    tracing::info!(
        routes = report.routes.len(),
        failures = report.failures().count(),
        elapsed_ms = elapsed.as_millis() as u64,
        "prerendered routes"
    );

    for block in writer.blocks() {
        ctx.output.warn(&block);
    }

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({
            "build_id": engine.build_id,
            "generated_at": Utc::now(),
            "routes": report.routes,
            "diagnostics": writer.blocks(),
            "metrics": server.metrics(),
        }));
    } else {
        println!();
        ctx.output.raw(&report.render());
        for route in &report.routes {
            ctx.output.debug(&format!(
                "{} {} holes={} intercepted={}",
                kind_badge(route.kind()),
                route.pathname,
                route.holes,
                route.intercepted
            ));
        }
    }

    let failures = report.failures().count();
    if failures > 0 {
        bail!("{} route(s) failed to prerender", failures);
    }

    ctx.output.success(&format!(
        "Prerendered {} routes in {}",
        report.routes.len(),
        format_millis(elapsed)
    ));
    Ok(())
}
