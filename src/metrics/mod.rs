//! Metric Data Access
//!
//! Typed access to the per-user time-series collections kept by the remote
//! API: body weight, hydration and macro-nutrient intake.
//!
//! ## Architecture
//!
//! - **types**: entry, payload and kind definitions
//! - **repository**: list / create / delete against the remote store, always
//!   returning a freshly fetched [`Snapshot`]

mod repository;
mod types;

pub use repository::{MetricRepository, MutationError, MutationResult, RefreshCause, Snapshot};
pub use types::{
    Entry, Hydration, HydrationEntry, HydrationPayload, MacroEntry, MacroPayload, MacroTotals,
    Macros, MetricKind, ScalarEntry, Weight, WeightEntry, WeightPayload,
};
