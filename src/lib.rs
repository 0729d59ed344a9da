//! # account_hub - Account Hub client library
//!
//! An async client for the account hub server, which stores accounts in
//! categories, hands them out on request and validates them with per-category
//! scripts.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Typed request/response models for every dashboard endpoint
//! - Incremental decoding of the streamed bulk delete, with progress callbacks
//! - Explicit configuration: passkey, timeout and proxy are passed in, never
//!   read from ambient state
//!
//! ## Modules
//!
//! - **`sse`**: line buffer and decoder for the `text/event-stream` delete reply
//! - **`client`**: [`HubClient`] and [`ClientError`]
//! - **`options`** / **`settings`**: client configuration and its persisted form
//! - **`router`** / **`layout`**: dashboard route guard and shell state
//!
//! ## Example
//! ```no_run
//! use account_hub::{ClientOptions, DeleteFilter, HubClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = HubClient::new(ClientOptions::from_env()?)?;
//!
//!     let category = client.ensure_category("mail").await?;
//!     let summary = client
//!         .delete_accounts(DeleteFilter::banned(category.id), |event| {
//!             println!("progress: {:?}", event.counts());
//!         })
//!         .await?;
//!     println!("deleted {}/{}", summary.deleted, summary.total);
//!     Ok(())
//! }
//! ```

pub mod bulk;
pub mod client;
pub mod http;
pub mod layout;
pub mod model;
pub mod options;
pub mod router;
pub mod settings;
pub mod sse;

// Re-exports for convenience
pub use client::{ClientError, HubClient};
pub use model::{DeleteFilter, DeleteSummary, ProgressEvent};
pub use options::{ClientOptions, SecretString};
pub use sse::{decode_delete_stream, DeleteStreamDecoder, LineBuffer};
