//! # FitManager
//!
//! Client core of a personal fitness dashboard: session handling against the
//! FitManager REST API and aggregation of body weight, hydration and
//! macro-nutrient entries into chart-ready series.
//!
//! ## Features
//!
//! - **Session lifecycle**: persisted bearer token, logout on any 401
//! - **Gated account changes**: profile update and account deletion re-check credentials
//! - **Mutate-then-refetch**: every write returns a freshly read snapshot
//! - **Day bucketing**: one configurable zone, sum and last-value policies
//!
//! ## Modules
//!
//! - [`session`]: token store and re-authentication gate
//! - [`api`]: HTTP client for the remote API
//! - [`metrics`]: per-kind entry repositories
//! - [`aggregate`]: pure day keys and series
//! - [`dashboard`]: summary and page view-models
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fitmanager::aggregate::DayZone;
//! use fitmanager::config::Config;
//! use fitmanager::dashboard::DashboardComposer;
//! use fitmanager::session::{Credentials, FileTokenSlot, NoopNavigator, SessionStore};
//! use fitmanager::ApiClient;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     let session = Arc::new(SessionStore::new(FileTokenSlot::new(config.session.token_path())));
//!     let client = ApiClient::new(&config.api, session, Arc::new(NoopNavigator))?;
//!
//!     client.login(&Credentials::new("u", "p")).await?;
//!
//!     let composer = DashboardComposer::new(client, DayZone::Local, config.goals.clone());
//!     let summary = composer.load(chrono::Utc::now()).await?;
//!     println!("Hydration today: {} ml", summary.today_hydration_ml);
//!
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod api;
pub mod config;
pub mod dashboard;
pub mod metrics;
pub mod profile;
pub mod session;
pub mod wire;

#[cfg(test)]
pub(crate) mod testing;

// Re-export top-level types for convenience
pub use aggregate::{DayPoint, DayPolicy, DayZone, MacroPoint};

pub use api::{ApiClient, ApiError, ApiResult, ErrorKind};

pub use config::{Config, ConfigError, LoggingConfig};

pub use dashboard::views::{ChartData, MetricPage, PageView, RequestSequencer};
pub use dashboard::{DashboardComposer, DashboardSummary};

pub use metrics::{
    Entry, Hydration, MacroTotals, Macros, MetricKind, MetricRepository, MutationError,
    RefreshCause, Snapshot, Weight,
};

pub use profile::{ProfileService, ProfileUpdate, Sex, UserProfile};

pub use session::{
    Credentials, FileTokenSlot, GateError, GateOutcome, Navigator, PendingAction, ReauthGate,
    SessionStore,
};
