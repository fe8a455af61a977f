//! Serve a request against the demo workload and print the response.

use std::sync::Arc;

use anyhow::{anyhow, Context as _, Result};
use ppr_server::prelude::{reconstruct, ClientKind, PageRequest, StderrWriter};

use super::RenderArgs;
use crate::context::Context;

/// Run the render command.
pub async fn run(args: RenderArgs, ctx: &Context) -> Result<()> {
    let cookies = args
        .cookies
        .iter()
        .map(|cookie| parse_cookie(cookie))
        .collect::<Result<Vec<_>>>()?;

    let engine = ctx.engine(args.build_id.as_deref(), args.dev);
    let server = ctx.server(engine, Arc::new(StderrWriter))?;
    let mut responses = Vec::new();

    for attempt in 1..=args.repeat.max(1) {
        let mut request = PageRequest::new(args.pathname.as_str());
        for (name, value) in &cookies {
            request = request.with_cookie(name.as_str(), value.as_str());
        }
        if args.full_page {
            request = request.with_client(ClientKind::FullPage);
        }

        let response = server.handle(request).await;
        let status = response.status();
        tracing::debug!(
            attempt,
            pathname = %args.pathname,
            status = status.as_u16(),
            "rendered request"
        );
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let streaming = response.is_streaming();
        let chunks = response
            .chunks()
            .await
            .context("Failed to read response body")?;

        if ctx.output.is_json() {
            responses.push(serde_json::json!({
                "status": status.as_u16(),
                "headers": headers,
                "streaming": streaming,
                "chunks": chunks,
            }));
            continue;
        }

        ctx.output.header(&format!("Response {} ({})", attempt, status));
        for (name, value) in &headers {
            ctx.output.kv(name, value);
        }
        println!();
        if args.chunks {
            for (i, chunk) in chunks.iter().enumerate() {
                println!("--- chunk {} ---\n{}", i, chunk);
            }
        } else {
            let document = reconstruct(&chunks)
                .context("Failed to rebuild streamed document")?;
            println!("{}", document);
        }
    }

    if ctx.output.is_json() {
        ctx.output.json(&responses);
    } else {
        ctx.output.debug(&format!("metrics: {}", server.metrics().to_json()));
    }
    Ok(())
}

fn parse_cookie(cookie: &str) -> Result<(String, String)> {
    let (name, value) = cookie
        .split_once('=')
        .ok_or_else(|| anyhow!("Invalid cookie '{}', expected NAME=VALUE", cookie))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cookie() {
        assert_eq!(
            parse_cookie("session=1").unwrap(),
            ("session".to_string(), "1".to_string())
        );
        assert!(parse_cookie("session").is_err());
    }
}
