//! Import accounts from a text file, one per line, into a named category.
//!
//! The passkey is taken from a settings file so the same value the dashboard
//! login stored can be reused.
//!
//! Run with:
//! ```bash
//! cargo run --example bulk_import -- settings.json mail accounts.txt
//! ```

use account_hub::bulk::parse_bulk_input;
use account_hub::options::{DEFAULT_BASE_URL, ENV_BASE_URL};
use account_hub::settings::SettingsStore;
use account_hub::{ClientOptions, HubClient};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(settings_path), Some(category), Some(input)) = (args.next(), args.next(), args.next()) else {
        return Err("usage: bulk_import <settings.json> <category> <accounts.txt>".into());
    };

    let settings = SettingsStore::new(settings_path).load()?;
    let base_url = std::env::var(ENV_BASE_URL).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    let client = HubClient::new(ClientOptions::from_settings(base_url, &settings))?;

    if !client.check_passkey().await? {
        return Err("passkey rejected by the server".into());
    }

    let entries = parse_bulk_input(&std::fs::read_to_string(&input)?);
    let category = client.ensure_category(&category).await?;
    let result = client.add_accounts_bulk(category.id, &entries).await?;

    println!(
        "Imported {} accounts into {:?} ({} already present)",
        result.count, category.name, result.skipped
    );
    Ok(())
}
