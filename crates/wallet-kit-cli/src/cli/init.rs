/*
[INPUT]:  Interactive user input via CLI
[OUTPUT]: Generated YAML configuration file
[POS]:    CLI initialization layer
[UPDATE]: When KitConfig schema changes
*/

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Password, theme::ColorfulTheme};
use std::path::PathBuf;

use wallet_kit::AppInfo;
use wallet_kit::types::DEFAULT_PERMISSIONS;
use wallet_kit_cli::config::{DemoExtensionConfig, KitConfig, WAuthConfig};

pub fn run_init(output: PathBuf) -> Result<()> {
    println!("{}", style("Welcome to wallet-kit init").bold().cyan());
    println!(
        "{}",
        style("This will guide you through creating a wallet-kit configuration.").dim()
    );

    let theme = ColorfulTheme::default();
    let defaults = KitConfig::default();

    let app_name: String = Input::with_theme(&theme)
        .with_prompt("Application name shown by wallets")
        .default(defaults.app.name.clone())
        .interact_text()?;

    let cache_path: String = Input::with_theme(&theme)
        .with_prompt("Session cache file")
        .default(defaults.cache_path.display().to_string())
        .interact_text()?;

    println!("\n{}", style("--- WAuth ---").bold());
    let base_url: String = Input::with_theme(&theme)
        .with_prompt("WAuth server")
        .default(defaults.wauth.base_url.clone())
        .interact_text()?;
    let redirect_url: String = Input::with_theme(&theme)
        .with_prompt("OAuth redirect URL")
        .default(defaults.wauth.redirect_url.clone())
        .interact_text()?;

    println!("\n{}", style("--- Strategies ---").bold());
    let eth_private_key = if Confirm::with_theme(&theme)
        .with_prompt("Enable the Ethereum bridge with a local key?")
        .default(false)
        .interact()?
    {
        let key: String = Password::with_theme(&theme)
            .with_prompt("Ethereum private key (hex)")
            .interact()?;
        Some(key)
    } else {
        None
    };

    let demo_extension = if Confirm::with_theme(&theme)
        .with_prompt("Use an in-memory demo extension for the native strategy?")
        .default(false)
        .interact()?
    {
        let address: String = Input::with_theme(&theme)
            .with_prompt("Demo wallet address")
            .interact_text()?;
        let public_key: String = Input::with_theme(&theme)
            .with_prompt("Demo wallet public key")
            .interact_text()?;
        Some(DemoExtensionConfig {
            address,
            public_key,
        })
    } else {
        None
    };

    let config = KitConfig {
        app: AppInfo {
            name: app_name,
            logo: None,
        },
        cache_path: PathBuf::from(cache_path),
        wauth: WAuthConfig {
            base_url,
            redirect_url,
        },
        permissions: DEFAULT_PERMISSIONS.iter().map(|p| p.to_string()).collect(),
        eth_private_key,
        demo_extension,
        ..defaults
    };
    config.validate().context("generated config is invalid")?;

    let yaml = serde_yaml::to_string(&config).context("failed to serialize config to YAML")?;

    std::fs::write(&output, yaml)
        .context(format!("failed to write config to {}", output.display()))?;

    println!("\n{}", style("SUCCESS!").bold().green());
    println!(
        "Configuration written to: {}",
        style(output.display()).cyan()
    );

    Ok(())
}
