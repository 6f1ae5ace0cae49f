//! CLI session command handlers for login, status, and logout.

use crate::auth::StorageScope;
use crate::config::RelayConfig;
use crate::session::AuthenticatedClient;

use super::LoginArgs;

/// Handle `bearer-relay login`.
pub async fn handle_login(
    config: RelayConfig,
    args: &LoginArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = AuthenticatedClient::new(config)?;
    client.login(&args.email, &args.password, args.scope).await?;
    println!("✅ Logged in as {}", args.email);
    if args.scope == StorageScope::Ephemeral {
        println!("   Credentials are ephemeral and end with this process.");
    } else {
        println!("   Credentials saved under {}", client.config().storage_dir.display());
    }
    Ok(())
}

/// Handle `bearer-relay status`.
pub async fn handle_status(config: RelayConfig) -> Result<(), Box<dyn std::error::Error>> {
    let client = AuthenticatedClient::new(config)?;
    match client.credentials()? {
        Some(_) => println!("✅ Logged in ({} scope)", client.scope()),
        None => println!("❌ Not logged in"),
    }
    println!("   API: {}", client.config().base_url);
    Ok(())
}

/// Handle `bearer-relay logout`.
pub async fn handle_logout(config: RelayConfig) -> Result<(), Box<dyn std::error::Error>> {
    let client = AuthenticatedClient::new(config)?;
    let had_session = client.credentials()?.is_some();
    client.logout().await?;
    if had_session {
        println!("✅ Logged out");
    } else {
        println!("No stored session; nothing to revoke");
    }
    Ok(())
}
