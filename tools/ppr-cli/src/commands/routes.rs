//! List the routes of the demo workload.

use anyhow::Result;
use ppr_server::prelude::Runtime;
use serde::Serialize;

use super::RoutesArgs;
use crate::context::Context;

#[derive(Serialize)]
struct RouteRow<'a> {
    pathname: &'a str,
    runtime: &'static str,
    ppr: bool,
}

/// Run the routes command.
pub async fn run(args: RoutesArgs, ctx: &Context) -> Result<()> {
    let routes = ppr_demo::routes()?;
    let rows: Vec<RouteRow<'_>> = routes
        .iter()
        .filter(|route| !args.ppr_only || route.ppr())
        .map(|route| RouteRow {
            pathname: route.pathname(),
            runtime: match route.config().runtime {
                Runtime::Node => "node",
                Runtime::Edge => "edge",
            },
            ppr: route.ppr(),
        })
        .collect();

    if ctx.output.is_json() {
        ctx.output.json(&rows);
        return Ok(());
    }

    ctx.output.header("Routes");
    let width = rows.iter().map(|r| r.pathname.len()).max().unwrap_or(8);
    ctx.output.table_row(&["PATHNAME", "RUNTIME", "PPR"], &[width, 7, 3]);
    for row in &rows {
        let ppr = if row.ppr { "yes" } else { "no" };
        ctx.output
            .table_row(&[row.pathname, row.runtime, ppr], &[width, 7, 3]);
    }
    ctx.output.info(&format!("{} routes", rows.len()));
    Ok(())
}
