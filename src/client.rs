//! The account hub REST client and its error type.

use std::path::Path;

use nonempty::NonEmpty;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::bulk::batches;
use crate::http::{add_extra_headers, add_passkey, build_http_client};
use crate::model::{
    Account, AccountPage, AccountStats, ApiCallRecord, BulkAddResult, Category, CommandOutput,
    DeleteFilter, DeleteSummary, ErrorBody, GlobalStats, PackageInfo, PackageListing, ProgressEvent,
    StatusUpdate, ValidationRun, ValidationSettings, ValidationTestResult,
};
use crate::options::ClientOptions;
use crate::sse::DeleteResponseExt;

/// Largest number of accounts the server hands out per fetch.
pub const MAX_FETCH_COUNT: u32 = 1000;

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Stream decode error: {0}")]
    Decode(String),

    #[error("API error ({status}): {message}")]
    Api { status: StatusCode, message: String },

    #[error("Server error: {0}")]
    Server(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Whether the server rejected the passkey.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Api { status, .. } if *status == StatusCode::UNAUTHORIZED)
    }

    /// Turn a non-success reply body into an error, preferring the server's
    /// `{"error": ...}` message.
    fn from_response_body(status: StatusCode, body: &str) -> Self {
        let message = match serde_json::from_str::<ErrorBody>(body) {
            Ok(error_body) => error_body.error,
            Err(_) if body.trim().is_empty() => status.canonical_reason().unwrap_or("no body").to_string(),
            Err(_) => body.to_string(),
        };
        ClientError::Api { status, message }
    }

    /// Like [`from_response_body`](Self::from_response_body), for a body that
    /// may have failed to download. An unreadable body yields the canonical
    /// reason for `status`.
    fn from_response_read<E: std::fmt::Display>(status: StatusCode, body: Result<String, E>) -> Self {
        match body {
            Ok(body) => Self::from_response_body(status, &body),
            Err(e) => {
                debug!(%status, error = %e, "could not read error reply body");
                Self::from_response_body(status, "")
            }
        }
    }
}

/// Client for the account hub `/api` endpoints.
///
/// Cloning is cheap; clones share the connection pool.
///
/// # Example
/// ```no_run
/// use account_hub::{ClientOptions, DeleteFilter, HubClient};
///
/// # async fn run() -> Result<(), account_hub::ClientError> {
/// let client = HubClient::new(ClientOptions::new("http://localhost:8080").with_passkey("pk"))?;
/// let summary = client
///     .delete_accounts(DeleteFilter::used(1), |event| {
///         if let Some(progress) = event.counts() {
///             println!("{}/{}", progress.deleted, progress.total);
///         }
///     })
///     .await?;
/// println!("deleted {} of {}", summary.deleted, summary.total);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HubClient {
    http: reqwest::Client,
    options: ClientOptions,
}

impl HubClient {
    /// Create a client from explicit options.
    pub fn new(options: ClientOptions) -> Result<Self, ClientError> {
        let http = build_http_client(&options)?;
        Ok(Self { http, options })
    }

    /// Create a client configured from `ACCOUNT_HUB_*` environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientOptions::from_env()?)
    }

    /// The options this client was built with.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        debug!(%method, path, "account hub request");
        let req = self.http.request(method, self.options.api_url(path));
        let req = add_passkey(req, &self.options.passkey);
        add_extra_headers(req, &self.options.extra_headers)
    }

    /// Send a request and fail on a non-success status.
    async fn send(req: RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let response = req.send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(ClientError::from_response_read(status, response.text().await));
        }

        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, ClientError> {
        let body = Self::send(req).await?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Send a request whose reply only carries a confirmation message.
    async fn send_unit(req: RequestBuilder) -> Result<(), ClientError> {
        Self::send(req).await?;
        Ok(())
    }

    /// Liveness probe.
    pub async fn health(&self) -> Result<(), ClientError> {
        Self::send_unit(self.request(Method::GET, "/health")).await
    }

    /// Check whether the configured passkey is accepted.
    ///
    /// Returns `Ok(false)` on 401; other failures, including rate limiting
    /// after repeated wrong attempts, are errors.
    pub async fn check_passkey(&self) -> Result<bool, ClientError> {
        match Self::send(self.request(Method::GET, "/categories")).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_unauthorized() => Ok(false),
            Err(e) => Err(e),
        }
    }

    // Categories

    pub async fn create_category(&self, name: &str) -> Result<Category, ClientError> {
        Self::send_json(self.request(Method::POST, "/categories").json(&json!({ "name": name }))).await
    }

    /// Return the category named `name`, creating it if needed.
    pub async fn ensure_category(&self, name: &str) -> Result<Category, ClientError> {
        Self::send_json(self.request(Method::POST, "/categories/ensure").json(&json!({ "name": name }))).await
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, ClientError> {
        Self::send_json(self.request(Method::GET, "/categories")).await
    }

    pub async fn get_category(&self, id: u64) -> Result<Category, ClientError> {
        Self::send_json(self.request(Method::GET, &format!("/categories/{}", id))).await
    }

    /// Delete a category together with all of its accounts.
    pub async fn delete_category(&self, id: u64) -> Result<(), ClientError> {
        Self::send_unit(self.request(Method::DELETE, &format!("/categories/{}", id))).await
    }

    /// Replace the validation script and its schedule.
    pub async fn update_validation(&self, id: u64, settings: &ValidationSettings) -> Result<(), ClientError> {
        let settings = settings.clone().normalized();
        Self::send_unit(
            self.request(Method::PUT, &format!("/categories/{}/validation", id))
                .json(&settings),
        )
        .await
    }

    /// Run `script` once against a sample account without storing anything.
    pub async fn test_validation_script(
        &self,
        id: u64,
        script: &str,
        test_account: &str,
    ) -> Result<ValidationTestResult, ClientError> {
        Self::send_json(
            self.request(Method::POST, &format!("/categories/{}/validation/test", id))
                .json(&json!({ "script": script, "test_account": test_account })),
        )
        .await
    }

    /// The 20 most recent validation runs, newest first.
    pub async fn list_validation_runs(&self, id: u64) -> Result<Vec<ValidationRun>, ClientError> {
        Self::send_json(self.request(Method::GET, &format!("/categories/{}/validation/runs", id))).await
    }

    /// Start a validation pass immediately instead of waiting for the schedule.
    pub async fn run_validation_now(&self, id: u64) -> Result<(), ClientError> {
        Self::send_unit(self.request(Method::POST, &format!("/categories/{}/validation/run", id))).await
    }

    pub async fn validation_run_log(&self, run_id: u64) -> Result<String, ClientError> {
        #[derive(serde::Deserialize)]
        struct RunLog {
            #[serde(default)]
            log: String,
        }

        let run_log: RunLog =
            Self::send_json(self.request(Method::GET, &format!("/validation/runs/{}/log", run_id))).await?;
        Ok(run_log.log)
    }

    // Packages of the validation environment

    pub async fn list_packages(&self, id: u64) -> Result<Vec<PackageInfo>, ClientError> {
        let listing: PackageListing =
            Self::send_json(self.request(Method::GET, &format!("/categories/{}/packages", id))).await?;
        Ok(listing.into())
    }

    pub async fn install_package(&self, id: u64, package: &str) -> Result<CommandOutput, ClientError> {
        validate_package_name(package)?;
        Self::send_json(
            self.request(Method::POST, &format!("/categories/{}/packages/install", id))
                .json(&json!({ "package": package })),
        )
        .await
    }

    pub async fn uninstall_package(&self, id: u64, package: &str) -> Result<CommandOutput, ClientError> {
        validate_package_name(package)?;
        Self::send_json(
            self.request(Method::POST, &format!("/categories/{}/packages/uninstall", id))
                .json(&json!({ "package": package })),
        )
        .await
    }

    /// Upload a `requirements.txt` and install everything it lists.
    pub async fn install_requirements(&self, id: u64, path: impl AsRef<Path>) -> Result<CommandOutput, ClientError> {
        let path = path.as_ref();
        let contents = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "requirements.txt".to_string());

        let part = reqwest::multipart::Part::bytes(contents)
            .file_name(file_name)
            .mime_str("text/plain")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        Self::send_json(
            self.request(Method::POST, &format!("/categories/{}/packages/requirements", id))
                .multipart(form),
        )
        .await
    }

    // Fetch history

    /// Recorded calls to the fetch endpoint for a category, newest first.
    pub async fn api_call_history(&self, id: u64) -> Result<Vec<ApiCallRecord>, ClientError> {
        Self::send_json(self.request(Method::GET, &format!("/categories/{}/history", id))).await
    }

    /// Set how many history records the server keeps. Zero means the server default.
    pub async fn update_history_limit(&self, id: u64, limit: u32) -> Result<(), ClientError> {
        Self::send_unit(
            self.request(Method::PUT, &format!("/categories/{}/history-limit", id))
                .json(&json!({ "history_limit": limit })),
        )
        .await
    }

    // Accounts

    /// Add one account. A duplicate in the same category is a 409 error.
    pub async fn add_account(&self, category_id: u64, data: &str) -> Result<Account, ClientError> {
        Self::send_json(
            self.request(Method::POST, "/accounts")
                .json(&json!({ "category_id": category_id, "data": data })),
        )
        .await
    }

    /// Add many accounts, split into server-sized batches.
    ///
    /// Batches are sent one after the other; the first failing batch stops
    /// the import and earlier batches stay committed.
    pub async fn add_accounts_bulk(&self, category_id: u64, data: &[String]) -> Result<BulkAddResult, ClientError> {
        let mut result = BulkAddResult::default();

        for batch in batches(data) {
            let batch_result: BulkAddResult = Self::send_json(
                self.request(Method::POST, "/accounts/bulk")
                    .json(&json!({ "category_id": category_id, "data": batch })),
            )
            .await?;
            debug!(added = batch_result.count, skipped = batch_result.skipped, "bulk batch stored");
            result += batch_result;
        }

        Ok(result)
    }

    /// One page of a category's accounts. Pages start at 1.
    pub async fn list_accounts(&self, category_id: u64, page: u32, limit: u32) -> Result<AccountPage, ClientError> {
        Self::send_json(
            self.request(Method::GET, &format!("/accounts/{}", category_id))
                .query(&[("page", page), ("limit", limit)]),
        )
        .await
    }

    /// Take up to `count` available accounts; the server marks them used.
    pub async fn fetch_accounts(&self, category_id: u64, count: u32) -> Result<Vec<Account>, ClientError> {
        let count = count.clamp(1, MAX_FETCH_COUNT);
        Self::send_json(
            self.request(Method::POST, "/accounts/fetch")
                .json(&json!({ "category_id": category_id, "count": count })),
        )
        .await
    }

    /// Set status flags on the given accounts.
    pub async fn update_accounts(&self, ids: &NonEmpty<u64>, update: StatusUpdate) -> Result<(), ClientError> {
        let ids: Vec<u64> = ids.iter().copied().collect();
        let mut body = serde_json::to_value(update)?;
        body["ids"] = json!(ids);
        Self::send_unit(self.request(Method::PUT, "/accounts/update").json(&body)).await
    }

    /// Delete the accounts matched by `filter`, reporting progress as the
    /// server works through them.
    ///
    /// When nothing matches, the server answers with plain JSON and
    /// `on_progress` is never called.
    pub async fn delete_accounts<F>(&self, filter: DeleteFilter, on_progress: F) -> Result<DeleteSummary, ClientError>
    where
        F: FnMut(&ProgressEvent) + Send,
    {
        let response = Self::send(self.request(Method::DELETE, "/accounts").json(&filter)).await?;
        response.delete_summary(on_progress).await
    }

    /// Delete the given accounts, in batches of at most
    /// [`MAX_BULK_ITEMS`](crate::bulk::MAX_BULK_ITEMS) ids. Returns the
    /// number of accounts removed.
    ///
    /// Batches are sent one after the other; a failing batch stops the delete
    /// and earlier batches stay deleted.
    pub async fn delete_accounts_by_ids(&self, ids: &NonEmpty<u64>) -> Result<u64, ClientError> {
        let ids: Vec<u64> = ids.iter().copied().collect();
        let mut deleted = 0;

        for batch in batches(&ids) {
            let reply: DeleteSummary = Self::send_json(
                self.request(Method::DELETE, "/accounts/by-ids")
                    .json(&json!({ "ids": batch })),
            )
            .await?;
            debug!(deleted = reply.deleted, "id batch deleted");
            deleted += reply.deleted;
        }

        Ok(deleted)
    }

    pub async fn account_stats(&self, category_id: u64) -> Result<AccountStats, ClientError> {
        Self::send_json(self.request(Method::GET, &format!("/accounts/{}/stats", category_id))).await
    }

    pub async fn global_stats(&self) -> Result<GlobalStats, ClientError> {
        Self::send_json(self.request(Method::GET, "/stats")).await
    }
}

/// Package names the server accepts: ASCII letters, digits, `.`, `_` and `-`.
pub fn validate_package_name(name: &str) -> Result<(), ClientError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(ClientError::InvalidInput(format!("invalid package name: {:?}", name)))
    }
}
