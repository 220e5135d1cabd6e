//! Auth command - sign-in and credential management.

use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use chrono::Utc;
use clap::{Args, Subcommand};
use console::style;
use serde_json::json;
use supportiq_auth::session::FlowSessionStore;
use supportiq_auth::{AuthError, AuthFlow, CallbackQuery, TokenKind, TokenStatus};

use super::Context;
use crate::browser::BrowserNavigator;
use crate::callback_server::CallbackListener;

/// Arguments for the auth command.
#[derive(Args, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Sign in through the identity provider in your browser
    Login {
        /// Sign in again even if a valid token is stored
        #[arg(long)]
        force: bool,

        /// Print the sign-in URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,

        /// Don't listen for the redirect; finish with 'auth callback' instead
        #[arg(long)]
        manual: bool,
    },

    /// Finish a sign-in from the URL the browser was redirected to
    Callback {
        /// Full redirect URL, including its query string
        url: String,
    },

    /// Show stored tokens and their expiry
    Status,

    /// Clear stored tokens and any unfinished sign-in
    Logout,
}

/// Run the auth command.
pub async fn run(args: AuthArgs, ctx: &Context) -> Result<()> {
    match args.command {
        AuthCommand::Login {
            force,
            no_browser,
            manual,
        } => cmd_login(force, no_browser, manual, ctx).await,
        AuthCommand::Callback { url } => cmd_callback(&url, ctx).await,
        AuthCommand::Status => cmd_status(ctx),
        AuthCommand::Logout => cmd_logout(ctx),
    }
}

async fn cmd_login(force: bool, no_browser: bool, manual: bool, ctx: &Context) -> Result<()> {
    // Check if already authenticated
    if !force && let Some(status) = valid_bearer(ctx)? {
        if ctx.json_output {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "authenticated": true,
                    "token": status.kind,
                    "expires_in": status.expires_in_display(),
                }))?
            );
            return Ok(());
        }
        println!(
            "Already signed in ({} expires in {})",
            status.kind.label(),
            status.expires_in_display()
        );
        println!("Run 'supportiq auth login --force' to sign in again.");
        return Ok(());
    }

    let auth = ctx.config.auth();
    let flow = ctx.auth_flow(Arc::new(BrowserNavigator {
        print_only: no_browser,
        json_output: ctx.json_output,
    }))?;

    if manual {
        flow.start_flow()?;
        if ctx.json_output {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "pending_sign_in": true,
                    "next": "supportiq auth callback '<redirect-url>'",
                }))?
            );
            return Ok(());
        }
        println!("After signing in, copy the full address from the browser and run:");
        println!();
        println!("  supportiq auth callback '<redirect-url>'");
        return Ok(());
    }

    // Bind before redirecting so the browser never hits a closed port
    let listener = CallbackListener::bind(&auth.redirect_uri()?).await?;
    flow.start_flow()?;

    let expected_state = FlowSessionStore::new(ctx.store())
        .load()?
        .state
        .context("The sign-in state was not recorded")?;
    let query = listener
        .wait(&expected_state, auth.callback_timeout())
        .await?;
    finish_sign_in(&flow, &query, ctx).await
}

async fn cmd_callback(url: &str, ctx: &Context) -> Result<()> {
    let query = CallbackQuery::from_url(url)?;
    let flow = ctx.auth_flow(Arc::new(BrowserNavigator::default()))?;
    finish_sign_in(&flow, &query, ctx).await
}

async fn finish_sign_in(flow: &AuthFlow, query: &CallbackQuery, ctx: &Context) -> Result<()> {
    match flow.handle_callback(query).await {
        Ok(Some(tokens)) => {
            if ctx.json_output {
                let issued: Vec<&str> = TokenKind::ALL
                    .into_iter()
                    .filter(|kind| tokens.get(*kind).is_some())
                    .map(|kind| kind.storage_key())
                    .collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "authenticated": true,
                        "tokens": issued,
                        "expires_in": tokens.expires_in,
                    }))?
                );
            } else {
                println!("{}", style("Signed in.").green().bold());
                if let Some(secs) = tokens.expires_in {
                    println!("Token expires in: {} seconds", secs);
                }
            }
            Ok(())
        }
        Ok(None) => bail!("The redirect carried neither an authorization code nor an error"),
        Err(AuthError::ProviderDenied { error, description }) => match description {
            Some(description) => bail!("Sign-in was denied: {} ({})", error, description),
            None => bail!("Sign-in was denied: {}", error),
        },
        Err(AuthError::StateMismatch) => bail!(
            "This redirect does not belong to the current sign-in. \
             Run 'supportiq auth login' again."
        ),
        Err(e) => Err(e.into()),
    }
}

fn cmd_status(ctx: &Context) -> Result<()> {
    let statuses = ctx.tokens().status_at(Utc::now())?;
    let pending = FlowSessionStore::new(ctx.store()).is_pending()?;

    if ctx.json_output {
        print_status_json(&statuses, pending)
    } else {
        print_status_table(&statuses, pending, ctx.verbose);
        Ok(())
    }
}

fn print_status_json(statuses: &[TokenStatus], pending: bool) -> Result<()> {
    let tokens: Vec<_> = statuses
        .iter()
        .map(|s| {
            let claims = s.claims.as_ref();
            json!({
                "kind": s.kind,
                "present": s.present,
                "expired": s.is_expired,
                "expires_at": claims.and_then(|c| c.expires_at()).map(|t| t.to_rfc3339()),
                "issuer": claims.and_then(|c| c.iss.clone()),
                "scope": claims.and_then(|c| c.scope.clone()),
                "email": claims.and_then(|c| c.email.clone()),
            })
        })
        .collect();

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "pending_sign_in": pending,
            "tokens": tokens,
        }))?
    );
    Ok(())
}

fn print_status_table(statuses: &[TokenStatus], pending: bool, verbose: bool) {
    println!("{}", style("Authentication Status").bold());
    println!("---------------------");

    if statuses.iter().all(|s| !s.present) {
        println!("Not signed in");
        println!("  Run 'supportiq auth login' to sign in");
    }

    for status in statuses.iter().filter(|s| s.present) {
        let expiry = status.expires_in_display();
        let expiry = if status.is_expired {
            style(expiry).red().to_string()
        } else {
            expiry
        };
        println!("{}: {}", status.kind.label(), expiry);

        if let Some(claims) = &status.claims {
            if let Some(email) = &claims.email {
                println!("  User: {}", email);
            }
            if let Some(scope) = &claims.scope {
                println!("  Scope: {}", scope);
            }
            if verbose {
                if let Some(iss) = &claims.iss {
                    println!("  Issuer: {}", iss);
                }
                if let Some(aud) = claims.audience() {
                    println!("  Audience: {}", aud);
                }
                if let Some(issued) = claims.issued_at() {
                    println!("  Issued: {}", issued.to_rfc3339());
                }
            }
        }
    }

    if pending {
        println!();
        println!("A sign-in is in progress (waiting for the provider's redirect).");
    }
}

fn cmd_logout(ctx: &Context) -> Result<()> {
    let had_tokens = ctx.tokens().has_tokens()?;

    match ctx.auth_flow(Arc::new(BrowserNavigator::default())) {
        Ok(flow) => flow.logout()?,
        Err(e) => {
            // Incomplete [auth] config must not prevent clearing credentials
            tracing::debug!(error = %e, "Clearing stores directly");
            ctx.tokens().clear()?;
            FlowSessionStore::new(ctx.store()).clear()?;
        }
    }

    if had_tokens {
        println!("Signed out. Stored tokens removed.");
    } else {
        println!("No stored tokens found.");
    }
    Ok(())
}

/// The first stored, unexpired bearer token (ID or access), if any.
fn valid_bearer(ctx: &Context) -> Result<Option<TokenStatus>> {
    let statuses = ctx.tokens().status_at(Utc::now())?;
    Ok(statuses
        .into_iter()
        .find(|s| s.kind != TokenKind::Refresh && s.present && !s.is_expired))
}
