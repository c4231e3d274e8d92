//! Metric page view-models
//!
//! One [`MetricPage`] per metric kind: the entry table, the chart series,
//! and the entry form with its error message. Every call re-reads the
//! remote list through the repository, and a [`RequestSequencer`] makes
//! sure the view reflects the most recently *started* call, not the last
//! one to finish.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::aggregate::{self, DayPoint, DayPolicy, DayZone, MacroPoint};
use crate::api::ApiClient;
use crate::metrics::{
    Hydration, HydrationEntry, HydrationPayload, MacroEntry, MacroPayload, MacroTotals, Macros,
    MetricKind, MetricRepository, MutationError, MutationResult, Snapshot, Weight, WeightEntry,
    WeightPayload,
};

/// Amount added by the hydration quick-add button (ml)
pub const QUICK_ADD_ML: f64 = 100.0;

const INVALID_NUMBER: &str = "Please enter a valid number";

/// Monotonic ticket source for in-flight requests
#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: AtomicU64,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request; supersedes every earlier ticket
    pub fn begin(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket
    }
}

/// Chart input: either nothing to draw or the points to draw
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "points", rename_all = "snake_case")]
pub enum ChartData<T> {
    NoData,
    Points(Vec<T>),
}

impl<T> ChartData<T> {
    pub fn from_points(points: Vec<T>) -> Self {
        if points.is_empty() {
            ChartData::NoData
        } else {
            ChartData::Points(points)
        }
    }

    pub fn points(&self) -> &[T] {
        match self {
            ChartData::NoData => &[],
            ChartData::Points(points) => points,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ChartData::NoData)
    }
}

/// Raw macro form fields as typed by the user
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MacroForm {
    pub protein: String,
    pub carbs: String,
    pub fats: String,
}

impl MacroForm {
    pub fn new(protein: impl Into<String>, carbs: impl Into<String>, fats: impl Into<String>) -> Self {
        Self {
            protein: protein.into(),
            carbs: carbs.into(),
            fats: fats.into(),
        }
    }
}

/// Form input plus the message shown next to it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormState<F> {
    pub input: F,
    pub error: Option<String>,
}

/// Parse a weight field; blank or non-numeric input is refused locally
pub fn parse_weight(input: &str) -> Result<f64, String> {
    input
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| INVALID_NUMBER.to_string())
}

/// Parse a hydration amount; blank input means a quick-add
pub fn parse_hydration(input: &str) -> Result<f64, String> {
    if input.trim().is_empty() {
        return Ok(QUICK_ADD_ML);
    }
    parse_weight(input)
}

/// Lenient numeric field: blank or invalid counts as zero
pub fn parse_lenient(input: &str) -> f64 {
    input
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Per-kind page behaviour: form parsing and chart shape
pub trait PageKind: MetricKind {
    type Point: Debug + Clone + Serialize + Send + Sync;
    type Form: Debug + Clone + Default + Send + Sync;

    fn parse_form(form: &Self::Form, now: DateTime<Utc>) -> Result<Self::Payload, String>;

    fn chart(entries: &[Self::Entry], zone: DayZone) -> Vec<Self::Point>;
}

impl PageKind for Weight {
    type Point = DayPoint;
    type Form = String;

    fn parse_form(form: &String, now: DateTime<Utc>) -> Result<WeightPayload, String> {
        Ok(WeightPayload {
            weight: parse_weight(form)?,
            date: now,
        })
    }

    fn chart(entries: &[WeightEntry], zone: DayZone) -> Vec<DayPoint> {
        aggregate::daily_series(entries, DayPolicy::Last, zone)
    }
}

impl PageKind for Hydration {
    type Point = DayPoint;
    type Form = String;

    fn parse_form(form: &String, now: DateTime<Utc>) -> Result<HydrationPayload, String> {
        Ok(HydrationPayload {
            amount: parse_hydration(form)?,
            date: now,
        })
    }

    fn chart(entries: &[HydrationEntry], zone: DayZone) -> Vec<DayPoint> {
        aggregate::daily_series(entries, DayPolicy::Sum, zone)
    }
}

impl PageKind for Macros {
    type Point = MacroPoint;
    type Form = MacroForm;

    fn parse_form(form: &MacroForm, now: DateTime<Utc>) -> Result<MacroPayload, String> {
        Ok(MacroPayload {
            protein: parse_lenient(&form.protein),
            carbs: parse_lenient(&form.carbs),
            fats: parse_lenient(&form.fats),
            date: now,
        })
    }

    fn chart(entries: &[MacroEntry], zone: DayZone) -> Vec<MacroPoint> {
        aggregate::macro_series(entries, zone)
    }
}

/// Everything a metric page renders
#[derive(Debug)]
pub struct PageView<K: PageKind> {
    /// Entries in the order the store returned them
    pub entries: Vec<K::Entry>,
    pub chart: ChartData<K::Point>,
    pub form: FormState<K::Form>,
    pub fetched_at: Option<DateTime<Utc>>,
    /// The last read failed; `entries` is empty rather than known to be empty
    pub unavailable: bool,
}

impl<K: PageKind> Default for PageView<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            chart: ChartData::NoData,
            form: FormState::default(),
            fetched_at: None,
            unavailable: false,
        }
    }
}

impl<K: PageKind> Clone for PageView<K> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            chart: self.chart.clone(),
            form: self.form.clone(),
            fetched_at: self.fetched_at,
            unavailable: self.unavailable,
        }
    }
}

/// View-model of one metric page
pub struct MetricPage<K: PageKind> {
    repo: MetricRepository<K>,
    zone: DayZone,
    sequencer: RequestSequencer,
    view: Mutex<PageView<K>>,
}

impl<K: PageKind> MetricPage<K> {
    pub fn new(api: ApiClient, zone: DayZone) -> Self {
        Self {
            repo: MetricRepository::new(api),
            zone,
            sequencer: RequestSequencer::new(),
            view: Mutex::new(PageView::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PageView<K>> {
        self.view.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current view
    pub fn view(&self) -> PageView<K> {
        self.lock().clone()
    }

    pub fn zone(&self) -> DayZone {
        self.zone
    }

    /// Install a fresh snapshot if `ticket` is still the latest request
    fn apply(&self, ticket: u64, snapshot: Snapshot<K::Entry>) -> bool {
        if !self.sequencer.is_current(ticket) {
            tracing::debug!(kind = K::NAME, ticket, "Discarding superseded result");
            return false;
        }
        let chart = ChartData::from_points(K::chart(snapshot.entries(), self.zone));
        let mut view = self.lock();
        view.fetched_at = Some(snapshot.fetched_at());
        view.entries = snapshot.into_entries();
        view.chart = chart;
        view.unavailable = false;
        true
    }

    /// Show an empty, unavailable list if `ticket` is still the latest request
    fn mark_unavailable(&self, ticket: u64) {
        if !self.sequencer.is_current(ticket) {
            return;
        }
        let mut view = self.lock();
        view.entries.clear();
        view.chart = ChartData::NoData;
        view.unavailable = true;
    }

    /// Re-read the list; a failure shows an empty page
    pub async fn refresh(&self) -> bool {
        let ticket = self.sequencer.begin();
        match self.repo.list().await {
            Ok(snapshot) => self.apply(ticket, snapshot),
            Err(e) => {
                tracing::warn!(kind = K::NAME, error = %e, "Failed to fetch entries");
                self.mark_unavailable(ticket);
                false
            }
        }
    }

    /// Validate and submit the form
    ///
    /// Once the store has accepted the entry the form is cleared, even if
    /// the list could not be re-read afterwards. When the store refuses it,
    /// the input is kept and the error message set.
    pub async fn submit(&self, form: K::Form) -> bool {
        let payload = match K::parse_form(&form, Utc::now()) {
            Ok(payload) => payload,
            Err(message) => {
                self.lock().form = FormState {
                    input: form,
                    error: Some(message),
                };
                return false;
            }
        };

        let ticket = self.sequencer.begin();
        match self.repo.create(&payload).await {
            Ok(snapshot) => {
                self.lock().form = FormState::default();
                self.apply(ticket, snapshot);
                true
            }
            Err(MutationError::RefetchFailed(_)) => {
                self.lock().form = FormState::default();
                self.mark_unavailable(ticket);
                true
            }
            Err(MutationError::Failed(e)) => {
                tracing::error!(kind = K::NAME, error = %e, "Failed to add entry");
                self.lock().form = FormState {
                    input: form,
                    error: Some(e.user_message(K::SUBJECT)),
                };
                false
            }
        }
    }

    /// Delete one entry from the table
    pub async fn remove(&self, id: &str) -> bool {
        let ticket = self.sequencer.begin();
        let result = self.repo.delete_by_id(id).await;
        self.finish_delete(ticket, result)
    }

    /// Delete the most recent entry, if any
    pub async fn remove_most_recent(&self) -> bool {
        let ticket = self.sequencer.begin();
        let result = self.repo.delete_most_recent().await;
        self.finish_delete(ticket, result)
    }

    fn finish_delete(&self, ticket: u64, result: MutationResult<Snapshot<K::Entry>>) -> bool {
        match result {
            Ok(snapshot) => self.apply(ticket, snapshot),
            Err(MutationError::RefetchFailed(_)) => {
                self.mark_unavailable(ticket);
                true
            }
            Err(MutationError::Failed(e)) => {
                tracing::error!(kind = K::NAME, error = %e, "Failed to delete entry");
                false
            }
        }
    }
}

impl MetricPage<Hydration> {
    /// Hydration logged on the day containing `now` (ml)
    pub fn today_total(&self, now: DateTime<Utc>) -> f64 {
        aggregate::today_total(&self.lock().entries, now, self.zone)
    }

    /// Today's total against `scale_ml`, in `[0, 1]`
    pub fn today_progress(&self, now: DateTime<Utc>, scale_ml: f64) -> f64 {
        aggregate::progress(self.today_total(now), scale_ml)
    }
}

impl MetricPage<Macros> {
    /// Percentage split of the most recent entry, for the pie chart
    pub fn latest_split(&self) -> Option<MacroTotals> {
        aggregate::latest(&self.lock().entries).map(|e| e.totals().shares())
    }
}
