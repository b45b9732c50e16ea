//! Auth command - Manage the tokens used to reach the administration server
//!
//! Tokens are issued by the admin application's own sign-in flow; this
//! command only stores, inspects and removes them in the system keyring.

use anyhow::{Context, Result};
use clap::Subcommand;
use serde_json::json;
use sitesync_core::domain::TokenPair;
use sitesync_core::ports::ITokenStore;
use tracing::info;

use super::{token_store, CliContext};
use crate::output::OutputFormatter;

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Store an access token (and optionally a refresh token)
    Set {
        /// Bearer token sent with every request
        #[arg(long)]
        access_token: String,
        /// Token used to obtain a new access token after a 401
        #[arg(long, default_value = "")]
        refresh_token: String,
    },
    /// Show whether tokens are stored
    Status,
    /// Remove stored tokens
    Logout,
}

impl AuthCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let store = token_store();

        match self {
            AuthCommand::Set {
                access_token,
                refresh_token,
            } => set(store.as_ref(), formatter.as_ref(), access_token, refresh_token),
            AuthCommand::Status => status(store.as_ref(), formatter.as_ref(), ctx.is_json()),
            AuthCommand::Logout => logout(store.as_ref(), formatter.as_ref()),
        }
    }
}

fn set(
    store: &dyn ITokenStore,
    formatter: &dyn OutputFormatter,
    access_token: &str,
    refresh_token: &str,
) -> Result<()> {
    let access_token = access_token.trim();
    if access_token.is_empty() {
        formatter.error("Access token must not be empty");
        return Ok(());
    }

    let tokens = TokenPair::new(access_token, refresh_token.trim());
    store
        .set(&tokens)
        .context("Failed to store tokens in keyring")?;
    info!(has_refresh_token = !tokens.refresh_token.is_empty(), "Tokens stored");

    formatter.success("Tokens stored in the system keyring");
    if tokens.refresh_token.is_empty() {
        formatter.warn("No refresh token given; an expired session will need 'sitesync auth set' again");
    }
    Ok(())
}

fn status(store: &dyn ITokenStore, formatter: &dyn OutputFormatter, json: bool) -> Result<()> {
    let tokens = store.get().context("Failed to read keyring")?;
    let has_access = tokens.as_ref().is_some_and(TokenPair::has_access_token);
    let has_refresh = tokens
        .as_ref()
        .is_some_and(|t| !t.refresh_token.is_empty());

    if json {
        formatter.print_json(&json!({
            "authenticated": has_access,
            "refreshToken": has_refresh,
        }));
    } else if has_access {
        formatter.success("Access token stored");
        formatter.info(&format!(
            "Refresh token: {}",
            if has_refresh { "stored" } else { "missing" }
        ));
    } else {
        formatter.warn("Not authenticated. Run 'sitesync auth set --access-token <TOKEN>'.");
    }
    Ok(())
}

fn logout(store: &dyn ITokenStore, formatter: &dyn OutputFormatter) -> Result<()> {
    store
        .clear()
        .context("Failed to clear tokens from keyring")?;
    info!("Tokens cleared");
    formatter.success("Logged out");
    Ok(())
}
