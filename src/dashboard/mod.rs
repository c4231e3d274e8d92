//! Dashboard
//!
//! Builds the summary view-model shown after login, either from the
//! dedicated `GET /dashboard` endpoint or from the individual metric lists.
//! The page view-models for the individual metrics live in [`views`].
//!
//! A dashboard that cannot be loaded is treated as an invalid session: the
//! user is logged out and sent back to the login screen.

pub mod views;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregate::{self, DayZone};
use crate::api::dto::DashboardResponse;
use crate::api::{ApiClient, ApiError, ApiResult};
use crate::config::GoalsConfig;
use crate::metrics::{
    Hydration, HydrationEntry, MacroEntry, MacroTotals, Macros, MetricRepository, Weight,
    WeightEntry,
};
use crate::profile::{ProfileService, UserProfile};

/// Summary view-model of the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub profile: UserProfile,
    /// Most recent weight (kg); `None` renders as "unknown"
    pub latest_weight: Option<f64>,
    /// Most recent macro entry, or zeros when there is none
    pub macros: MacroTotals,
    /// True when `macros` is the zero placeholder
    pub macros_placeholder: bool,
    /// Hydration logged today (ml)
    pub today_hydration_ml: f64,
    /// Today's hydration against the configured scale, in `[0, 1]`
    pub hydration_progress: f64,
    pub hydration_recommended_ml: f64,
    pub generated_at: DateTime<Utc>,
}

impl DashboardSummary {
    /// Macro split for the pie chart, `None` when there is nothing to show
    pub fn macro_chart(&self) -> Option<MacroTotals> {
        if self.macros_placeholder {
            None
        } else {
            Some(self.macros.shares())
        }
    }

    /// Weight still to lose (positive) or gain (negative) to reach the target
    pub fn distance_to_target(&self) -> Option<f64> {
        Some(self.latest_weight? - self.profile.target_weight?)
    }

    fn assemble(
        profile: UserProfile,
        latest_weight: Option<f64>,
        latest_macros: Option<MacroTotals>,
        today_hydration_ml: f64,
        now: DateTime<Utc>,
        goals: &GoalsConfig,
    ) -> Self {
        Self {
            profile,
            latest_weight,
            macros: latest_macros.unwrap_or_default(),
            macros_placeholder: latest_macros.is_none(),
            today_hydration_ml,
            hydration_progress: aggregate::progress(today_hydration_ml, goals.hydration_scale_ml),
            hydration_recommended_ml: goals.hydration_recommended_ml,
            generated_at: now,
        }
    }
}

/// Compose a summary from raw entry lists
pub fn compose(
    profile: UserProfile,
    weights: &[WeightEntry],
    macros: &[MacroEntry],
    hydrations: &[HydrationEntry],
    now: DateTime<Utc>,
    zone: DayZone,
    goals: &GoalsConfig,
) -> DashboardSummary {
    DashboardSummary::assemble(
        profile,
        aggregate::latest(weights).map(|w| w.weight),
        aggregate::latest(macros).map(MacroEntry::totals),
        aggregate::today_total(hydrations, now, zone),
        now,
        goals,
    )
}

/// Loads the dashboard for the logged-in user
#[derive(Clone)]
pub struct DashboardComposer {
    api: ApiClient,
    zone: DayZone,
    goals: GoalsConfig,
}

impl DashboardComposer {
    pub fn new(api: ApiClient, zone: DayZone, goals: GoalsConfig) -> Self {
        Self { api, zone, goals }
    }

    pub fn zone(&self) -> DayZone {
        self.zone
    }

    /// Compose with this composer's zone and goals
    pub fn compose(
        &self,
        profile: UserProfile,
        weights: &[WeightEntry],
        macros: &[MacroEntry],
        hydrations: &[HydrationEntry],
        now: DateTime<Utc>,
    ) -> DashboardSummary {
        compose(profile, weights, macros, hydrations, now, self.zone, &self.goals)
    }

    /// Load through `GET /dashboard`
    pub async fn load(&self, now: DateTime<Utc>) -> ApiResult<DashboardSummary> {
        let response: DashboardResponse = self.api.get("/dashboard").await.map_err(|e| self.reject(e))?;

        let today = response
            .today_hydration_total
            .or_else(|| response.latest_hydration.as_ref().map(|h| h.amount))
            .unwrap_or(0.0);

        Ok(DashboardSummary::assemble(
            response.user,
            response.latest_weight.map(|w| w.weight),
            response.latest_macros.as_ref().map(MacroEntry::totals),
            today,
            now,
            &self.goals,
        ))
    }

    /// Load the profile and the three metric lists and compose locally
    pub async fn load_from_metrics(&self, now: DateTime<Utc>) -> ApiResult<DashboardSummary> {
        let profiles = ProfileService::new(self.api.clone());
        let weights = MetricRepository::<Weight>::new(self.api.clone());
        let macros = MetricRepository::<Macros>::new(self.api.clone());
        let hydrations = MetricRepository::<Hydration>::new(self.api.clone());

        let fetched = tokio::try_join!(profiles.fetch(), weights.list(), macros.list(), hydrations.list());
        let (profile, weights, macros, hydrations) = fetched.map_err(|e| self.reject(e))?;

        Ok(self.compose(
            profile,
            weights.entries(),
            macros.entries(),
            hydrations.entries(),
            now,
        ))
    }

    /// Any load failure ends the session
    fn reject(&self, err: ApiError) -> ApiError {
        tracing::error!(error = %err, "Failed to load dashboard");
        // Auth failures were already handled by the client
        if !err.is_auth() {
            self.api.expire_session();
        }
        err
    }
}
