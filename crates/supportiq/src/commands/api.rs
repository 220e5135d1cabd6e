//! Backend commands - authenticated requests and dashboard data.

use anyhow::{Result, bail};
use clap::Args;
use console::Style;
use supportiq_client::{ApiRequest, ApiResponse, Error as ClientError, ListItem, ListQuery, Method};

use super::Context;

/// Arguments for the request command.
#[derive(Args, Debug)]
pub struct RequestArgs {
    /// HTTP method (GET, POST, PUT, PATCH, DELETE)
    pub method: Method,

    /// Path relative to the configured base URL, or an absolute URL
    pub url: String,

    /// JSON request body
    #[arg(short, long)]
    pub data: Option<String>,

    /// Extra header as 'Name: value' (repeatable)
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,
}

/// Arguments for the list command.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Show a single call instead of the list
    pub id: Option<String>,

    /// Maximum items to return
    #[arg(short = 'n', long)]
    pub page_size: Option<usize>,

    /// Continuation token from a previous page
    #[arg(long)]
    pub next_token: Option<String>,

    /// Backend filter expression
    #[arg(short, long)]
    pub filter: Option<String>,
}

/// Run the request command.
pub async fn run_request(args: RequestArgs, ctx: &Context) -> Result<()> {
    let mut request = ApiRequest::new(args.method, args.url);
    if let Some(data) = &args.data {
        let body: serde_json::Value = serde_json::from_str(data)
            .map_err(|e| anyhow::anyhow!("--data is not valid JSON: {}", e))?;
        request = request.body(body);
    }
    for header in &args.headers {
        let Some((name, value)) = header.split_once(':') else {
            bail!("header '{}' must look like 'Name: value'", header);
        };
        request = request.header(name.trim(), value.trim())?;
    }

    let client = ctx.api_client()?;
    let response = client.request(request).await.map_err(explain)?;
    print_response(&response, ctx)
}

/// Run the list command.
pub async fn run_list(args: ListArgs, ctx: &Context) -> Result<()> {
    let calls = ctx.api_client()?.calls();

    if let Some(id) = &args.id {
        let item = calls.get(id).await.map_err(explain)?;
        if ctx.json_output {
            println!("{}", serde_json::to_string_pretty(&item)?);
        } else {
            print_item_detail(&item);
        }
        return Ok(());
    }

    let page = calls
        .list(ListQuery {
            page_size: args.page_size,
            next_token: args.next_token,
            filter: args.filter,
        })
        .await
        .map_err(explain)?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!("Calls ({} of {}):", page.items.len(), page.total_count);
    println!();
    println!("  {:<40} {:<12} CREATED", "NAME", "CONFIDENCE");
    println!("  {}", "-".repeat(75));
    for item in &page.items {
        let confidence = item
            .confidence
            .map(|c| format!("{:.2}", c))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<40} {:<12} {}",
            truncate(item.label(), 40),
            confidence,
            dim.apply_to(item.created_at.as_deref().unwrap_or("-"))
        );
    }
    if let Some(token) = &page.next_token {
        println!();
        println!("More results: supportiq list --next-token {}", token);
    }
    Ok(())
}

/// Run the entities command.
pub async fn run_entities(ctx: &Context) -> Result<()> {
    let entities = ctx.api_client()?.calls().entities().await.map_err(explain)?;
    println!("{}", serde_json::to_string_pretty(&entities)?);
    Ok(())
}

fn print_response(response: &ApiResponse, ctx: &Context) -> Result<()> {
    match response {
        ApiResponse::Json(value) if ctx.json_output => {
            println!("{}", serde_json::to_string(value)?)
        }
        other => println!("{}", other),
    }
    Ok(())
}

fn print_item_detail(item: &ListItem) {
    let dim = Style::new().dim();
    println!("{}", console::style(item.label()).bold());
    if let Some(id) = &item.id {
        println!("  {} {}", dim.apply_to("ID:"), id);
    }
    if let Some(uri) = &item.uri {
        println!("  {} {}", dim.apply_to("Recording:"), uri);
    }
    if let Some(confidence) = item.confidence {
        println!("  {} {:.2}", dim.apply_to("Confidence:"), confidence);
    }
    if let Some(created) = &item.created_at {
        println!("  {} {}", dim.apply_to("Created:"), created);
    }
    for (key, value) in &item.extra {
        println!("  {} {}", dim.apply_to(format!("{}:", key)), value);
    }
}

/// Attach a next step to errors the user can fix by signing in.
fn explain(err: ClientError) -> anyhow::Error {
    if err.is_auth_error() {
        anyhow::anyhow!("{}\nRun 'supportiq auth login' to sign in again.", err)
    } else {
        err.into()
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
