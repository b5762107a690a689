/*
[INPUT]:  A built WalletManager and subcommand arguments
[OUTPUT]: Human-readable reports of strategies and connection state
[POS]:    CLI layer - non-interactive subcommands
[UPDATE]: When the manager surface or report format changes
*/

use anyhow::{Context, Result};
use console::style;
use tokio_util::sync::CancellationToken;
use tracing::info;

use wallet_kit::types::encode_b64url;
use wallet_kit::{ConnectionState, WalletManager};

pub fn list_strategies(manager: &WalletManager) {
    let active = manager.state();
    for meta in manager.strategies() {
        let marker = if active.strategy_id() == Some(meta.id.as_str()) {
            style("*").green().to_string()
        } else {
            " ".to_string()
        };
        println!(
            "{marker} {:<16} {:<20} {:?}",
            style(&meta.id).bold(),
            meta.name,
            meta.kind
        );
    }
}

fn print_state(state: &ConnectionState) {
    match (state.strategy_id(), state.address.as_deref()) {
        (Some(id), Some(address)) if state.connected => {
            println!(
                "{} {} via {}",
                style("connected").green().bold(),
                style(address).cyan(),
                id
            );
            if !state.permissions.is_empty() {
                let permissions: Vec<&str> = state.permissions.iter().map(String::as_str).collect();
                println!("  permissions: {}", permissions.join(", "));
            }
        }
        (Some(id), _) => println!("{} (strategy {id})", style("disconnected").yellow()),
        (None, _) => println!("{}", style("no strategy selected").dim()),
    }
}

/// Restore the cached session and report it
pub async fn status(manager: &WalletManager) -> Result<()> {
    manager.auto_reconnect().await;
    print_state(&manager.state());

    if let Some(auth) = manager.get_auth_data().await {
        println!("  account: {} ({})", auth.user_id, auth.provider);
        if let Some(email) = manager.get_email().await {
            println!("  email: {email}");
        }
        for wallet in manager.get_connected_wallets().await {
            println!("  linked: {} {}", wallet.address, wallet.strategy.unwrap_or_default());
        }
    }
    Ok(())
}

pub async fn connect(manager: &WalletManager, id: &str, permissions: &[String]) -> Result<()> {
    manager.set_strategy(id)?;
    let permissions = (!permissions.is_empty()).then_some(permissions);
    manager
        .connect(permissions)
        .await
        .with_context(|| format!("connect with {id}"))?;
    print_state(&manager.state());
    Ok(())
}

pub async fn disconnect(manager: &WalletManager) -> Result<()> {
    if manager.auto_reconnect().await {
        manager.disconnect().await.context("disconnect")?;
    } else {
        // nothing live to tear down; drop the stale hint
        manager.cache().clear().await.context("clear session cache")?;
    }
    print_state(&manager.state());
    Ok(())
}

pub async fn reconnect(manager: &WalletManager) -> Result<()> {
    if !manager.auto_reconnect().await {
        println!("{}", style("no session to restore").yellow());
    }
    print_state(&manager.state());
    Ok(())
}

/// Sign a UTF-8 message with the restored session
pub async fn sign_message(manager: &WalletManager, message: &str) -> Result<()> {
    if !manager.auto_reconnect().await {
        anyhow::bail!("not connected; run `connect` first");
    }
    let signature = manager
        .signature(message.as_bytes())
        .await
        .context("sign message")?;
    println!("{}", encode_b64url(&signature));
    Ok(())
}

/// Print every state change until shutdown is requested
pub async fn watch(manager: &WalletManager, shutdown: CancellationToken) -> Result<()> {
    let subscription = manager.subscribe(|state| {
        info!(
            connected = state.connected,
            address = state.address.as_deref().unwrap_or("-"),
            strategy = state.strategy_id().unwrap_or("-"),
            "connection changed"
        );
        print_state(state);
    });

    manager.auto_reconnect().await;
    print_state(&manager.state());

    shutdown.cancelled().await;
    subscription.unsubscribe();
    Ok(())
}
