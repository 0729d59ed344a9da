//! Delete the used accounts of a category and print progress as it streams in.
//!
//! Run with:
//! ```bash
//! export ACCOUNT_HUB_URL="http://localhost:8080"
//! export ACCOUNT_HUB_PASSKEY="your-passkey"
//! cargo run --example delete_progress -- <category_id>
//! ```

use account_hub::{ClientOptions, DeleteFilter, HubClient, ProgressEvent};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("account_hub=debug")))
        .init();

    let category_id: u64 = std::env::args()
        .nth(1)
        .ok_or("usage: delete_progress <category_id>")?
        .parse()?;

    let client = HubClient::new(ClientOptions::from_env()?)?;

    let summary = client
        .delete_accounts(DeleteFilter::used(category_id), |event: &ProgressEvent| {
            match event.counts() {
                Some(progress) => println!("deleted {}/{}", progress.deleted, progress.total),
                None => println!("progress: {}", event.0),
            }
        })
        .await?;

    println!("\nDone: {} of {} accounts deleted", summary.deleted, summary.total);
    Ok(())
}
