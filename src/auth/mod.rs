//! Bearer token handling
//!
//! Tokens are issued elsewhere; this module only stores, clears and reports them.

pub mod tokens;

use anyhow::Result;

use crate::config::Config;
pub use tokens::{Credential, StoredToken, TokenStore};

/// Store a bearer token in the config file.
pub fn login(token: &str, expires_in: Option<u64>) -> Result<()> {
    let mut config = Config::load()?;
    if Credential::new(token).is_none() {
        anyhow::bail!("Token must not be empty");
    }
    config.set_token(token.to_string(), expires_in);
    config.save()?;
    tracing::info!("Token stored");
    println!("Logged in.");
    Ok(())
}

/// Remove the stored token.
pub fn logout() -> Result<()> {
    let mut config = Config::load()?;
    config.clear_tokens();
    config.save()?;
    println!("Logged out.");
    Ok(())
}

/// Print endpoint, identity and token state.
pub fn status(config: &Config) -> Result<()> {
    println!("Endpoint: {}", config.endpoint());
    match (&config.sender_id, &config.sender_role) {
        (Some(id), Some(role)) => println!("Identity: {} ({})", id, role),
        _ => println!("Identity: (not set, run `duochat whoami`)"),
    }
    match config.get_token() {
        None => println!("Token:    none (run `duochat login`)"),
        Some(tok) if tok.is_expired() => println!("Token:    expired"),
        Some(tok) => match tok.expires_at {
            Some(exp) => {
                let at = chrono::DateTime::from_timestamp(exp, 0)
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| exp.to_string());
                println!("Token:    valid until {}", at);
            }
            None => println!("Token:    valid"),
        },
    }
    Ok(())
}
