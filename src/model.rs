//! Request and response bodies exchanged with the account hub server.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::ops::AddAssign;

/// Cron expression the server falls back to for scheduled validation.
pub const DEFAULT_VALIDATION_CRON: &str = "0 0 * * *";

/// Go encodes empty slices as `null`; read those as empty vectors.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// A named group of accounts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub validation_script: String,
    #[serde(default)]
    pub validation_concurrency: u32,
    #[serde(default)]
    pub validation_cron: String,
    #[serde(default)]
    pub history_limit: u32,
    #[serde(default)]
    pub last_validated_at: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// A stored account credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: u64,
    pub category_id: u64,
    #[serde(default)]
    pub used: bool,
    #[serde(default)]
    pub banned: bool,
    pub data: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// One page of accounts in a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountPage {
    #[serde(deserialize_with = "null_as_empty")]
    pub data: Vec<Account>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

/// Outcome of a bulk insert. Duplicates are skipped by the server.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BulkAddResult {
    pub count: u64,
    pub skipped: u64,
}

impl AddAssign for BulkAddResult {
    fn add_assign(&mut self, other: Self) {
        self.count += other.count;
        self.skipped += other.skipped;
    }
}

/// Account totals by status.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub total: u64,
    pub available: u64,
    pub used: u64,
    pub banned: u64,
}

/// Number of accounts touched on a given day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateCount {
    pub date: String,
    pub count: u64,
}

/// Per-day series used by the dashboard charts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsChart {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub added: Vec<DateCount>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub used: Vec<DateCount>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub banned: Vec<DateCount>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub available: Vec<DateCount>,
}

/// Statistics for a single category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountStats {
    #[serde(flatten)]
    pub chart: StatsChart,
    pub counts: StatusCounts,
}

/// Statistics across all categories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalStats {
    pub accounts: StatusCounts,
    pub categories: u64,
    pub chart: StatsChart,
}

/// Validation script configuration of a category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationSettings {
    pub validation_script: String,
    pub validation_concurrency: u32,
    pub validation_cron: String,
}

impl ValidationSettings {
    /// Settings with concurrency 1 and the daily default schedule.
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            validation_script: script.into(),
            validation_concurrency: 1,
            validation_cron: DEFAULT_VALIDATION_CRON.to_string(),
        }
    }

    /// Set how many accounts are validated in parallel.
    pub fn with_concurrency(mut self, concurrency: u32) -> Self {
        self.validation_concurrency = concurrency;
        self
    }

    /// Set the cron schedule.
    pub fn with_cron(mut self, cron: impl Into<String>) -> Self {
        self.validation_cron = cron.into();
        self
    }

    /// Apply the same floor and fallback the server applies.
    pub fn normalized(mut self) -> Self {
        self.validation_concurrency = self.validation_concurrency.max(1);
        if self.validation_cron.trim().is_empty() {
            self.validation_cron = DEFAULT_VALIDATION_CRON.to_string();
        }
        self
    }
}

/// A past or running validation pass over a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRun {
    pub id: u64,
    pub category_id: u64,
    pub status: String,
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub processed_count: u64,
    #[serde(default)]
    pub banned_count: u64,
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub log: String,
    pub started_at: String,
    #[serde(default)]
    pub finished_at: Option<String>,
}

/// Result of running a validation script against one sample account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationTestResult {
    pub success: bool,
    #[serde(default)]
    pub used: Option<bool>,
    #[serde(default)]
    pub banned: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
}

/// An installed Python package in a category's environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
}

/// The package listing is a bare array, or `{"packages": []}` when the
/// environment could not be inspected.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum PackageListing {
    List(Vec<PackageInfo>),
    Wrapped {
        #[serde(deserialize_with = "null_as_empty")]
        packages: Vec<PackageInfo>,
    },
}

impl From<PackageListing> for Vec<PackageInfo> {
    fn from(listing: PackageListing) -> Self {
        match listing {
            PackageListing::List(packages) | PackageListing::Wrapped { packages } => packages,
        }
    }
}

/// Combined output of a package manager command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    #[serde(default)]
    pub output: String,
}

/// One recorded call to the account fetch API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCallRecord {
    pub id: u64,
    pub category_id: u64,
    pub endpoint: String,
    pub method: String,
    #[serde(default)]
    pub request: String,
    #[serde(default)]
    pub request_ip: String,
    pub status_code: u16,
    pub created_at: String,
}

/// Which accounts of a category a bulk delete removes.
///
/// With neither flag set every account of the category is removed; with both
/// set, accounts that are used or banned are removed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteFilter {
    pub category_id: u64,
    pub used: bool,
    pub banned: bool,
}

impl DeleteFilter {
    /// Every account in the category.
    pub fn all(category_id: u64) -> Self {
        Self { category_id, used: false, banned: false }
    }

    /// Only accounts marked used.
    pub fn used(category_id: u64) -> Self {
        Self { category_id, used: true, banned: false }
    }

    /// Only accounts marked banned.
    pub fn banned(category_id: u64) -> Self {
        Self { category_id, used: false, banned: true }
    }
}

/// Status flags to set on a selection of accounts. Unset flags are left alone.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banned: Option<bool>,
}

/// Final counters of a bulk delete.
///
/// The streamed done record carries `deleted`; the plain JSON reply carries
/// `count`. Missing fields read as zero.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "RawDeleteSummary")]
pub struct DeleteSummary {
    pub deleted: u64,
    pub total: u64,
}

/// Wire form of [`DeleteSummary`]; `deleted` takes precedence over `count`.
#[derive(Deserialize)]
struct RawDeleteSummary {
    #[serde(default)]
    deleted: Option<u64>,
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    total: Option<u64>,
}

impl From<RawDeleteSummary> for DeleteSummary {
    fn from(raw: RawDeleteSummary) -> Self {
        Self {
            deleted: raw.deleted.or(raw.count).unwrap_or_default(),
            total: raw.total.unwrap_or_default(),
        }
    }
}

/// Payload of one streamed progress record.
///
/// The shape belongs to the server; the delete stream sends `{deleted, total}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressEvent(pub Value);

impl ProgressEvent {
    /// Read `{deleted, total}` counters if the payload has them.
    pub fn counts(&self) -> Option<DeleteSummary> {
        let deleted = self.0.get("deleted")?.as_u64()?;
        let total = self.0.get("total")?.as_u64()?;
        Some(DeleteSummary { deleted, total })
    }
}

/// Body of an error reply, and of an `error` record in the delete stream.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}
