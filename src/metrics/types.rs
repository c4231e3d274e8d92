//! Metric kinds and entry types
//!
//! This module defines the three kinds of time-series data tracked by the
//! client:
//! - `Weight`: body weight in kg, one scalar per entry
//! - `Hydration`: water intake in ml, one scalar per entry
//! - `Macros`: protein/carbs/fats in grams, a triple per entry
//!
//! Entries are owned by the remote store and immutable once created.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::wire;

/// Anything with a remote id and a timestamp
pub trait Entry: Debug + Clone + DeserializeOwned + Serialize + Send + Sync + 'static {
    fn id(&self) -> &str;
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Entry carrying a single numeric value
pub trait ScalarEntry: Entry {
    fn value(&self) -> f64;
}

/// A category of time-series data with its own path, payload and policy
pub trait MetricKind: Send + Sync + 'static {
    type Entry: Entry;
    type Payload: Serialize + Debug + Send + Sync;

    /// Human-readable name used in logs and messages
    const NAME: &'static str;
    /// Collection path on the remote API
    const PATH: &'static str;
    /// Whether the store answers `?last=true` with the most recent entry
    const SERVER_LATEST: bool;
    /// What a rejected submission is called in user-facing messages
    const SUBJECT: &'static str;
}

/// Body weight
#[derive(Debug, Clone, Copy, Default)]
pub struct Weight;

/// Water intake
#[derive(Debug, Clone, Copy, Default)]
pub struct Hydration;

/// Macro-nutrient intake
#[derive(Debug, Clone, Copy, Default)]
pub struct Macros;

impl MetricKind for Weight {
    type Entry = WeightEntry;
    type Payload = WeightPayload;
    const NAME: &'static str = "weight";
    const PATH: &'static str = "/weights";
    const SERVER_LATEST: bool = false;
    const SUBJECT: &'static str = "weight";
}

impl MetricKind for Hydration {
    type Entry = HydrationEntry;
    type Payload = HydrationPayload;
    const NAME: &'static str = "hydration";
    const PATH: &'static str = "/hydrations";
    const SERVER_LATEST: bool = true;
    const SUBJECT: &'static str = "amount";
}

impl MetricKind for Macros {
    type Entry = MacroEntry;
    type Payload = MacroPayload;
    const NAME: &'static str = "macros";
    const PATH: &'static str = "/macros";
    const SERVER_LATEST: bool = false;
    const SUBJECT: &'static str = "values";
}

/// A recorded body weight (kg)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightEntry {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default, deserialize_with = "wire::lenient_f64")]
    pub weight: f64,
    #[serde(alias = "timestamp")]
    pub date: DateTime<Utc>,
}

/// A recorded water intake (ml)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HydrationEntry {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default, deserialize_with = "wire::lenient_f64")]
    pub amount: f64,
    #[serde(alias = "timestamp")]
    pub date: DateTime<Utc>,
}

/// A recorded macro-nutrient intake (g)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MacroEntry {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default, deserialize_with = "wire::lenient_f64")]
    pub protein: f64,
    #[serde(default, deserialize_with = "wire::lenient_f64")]
    pub carbs: f64,
    #[serde(default, deserialize_with = "wire::lenient_f64")]
    pub fats: f64,
    #[serde(alias = "timestamp")]
    pub date: DateTime<Utc>,
}

impl MacroEntry {
    pub fn totals(&self) -> MacroTotals {
        MacroTotals {
            protein: self.protein,
            carbs: self.carbs,
            fats: self.fats,
        }
    }
}

impl Entry for WeightEntry {
    fn id(&self) -> &str {
        &self.id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.date
    }
}

impl ScalarEntry for WeightEntry {
    fn value(&self) -> f64 {
        self.weight
    }
}

impl Entry for HydrationEntry {
    fn id(&self) -> &str {
        &self.id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.date
    }
}

impl ScalarEntry for HydrationEntry {
    fn value(&self) -> f64 {
        self.amount
    }
}

impl Entry for MacroEntry {
    fn id(&self) -> &str {
        &self.id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.date
    }
}

/// Protein/carbs/fats triple (g)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct MacroTotals {
    pub protein: f64,
    pub carbs: f64,
    pub fats: f64,
}

impl MacroTotals {
    pub fn total(&self) -> f64 {
        self.protein + self.carbs + self.fats
    }

    /// Percentage split for a pie chart; all zero when nothing was logged
    pub fn shares(&self) -> MacroTotals {
        let total = self.total();
        if total <= 0.0 {
            return MacroTotals::default();
        }
        MacroTotals {
            protein: self.protein / total * 100.0,
            carbs: self.carbs / total * 100.0,
            fats: self.fats / total * 100.0,
        }
    }
}

/// `POST /weights` body
#[derive(Debug, Clone, Serialize)]
pub struct WeightPayload {
    pub weight: f64,
    pub date: DateTime<Utc>,
}

/// `POST /hydrations` body
#[derive(Debug, Clone, Serialize)]
pub struct HydrationPayload {
    pub amount: f64,
    pub date: DateTime<Utc>,
}

/// `POST /macros` body
#[derive(Debug, Clone, Serialize)]
pub struct MacroPayload {
    pub protein: f64,
    pub carbs: f64,
    pub fats: f64,
    pub date: DateTime<Utc>,
}

impl WeightPayload {
    pub fn now(weight: f64) -> Self {
        Self {
            weight,
            date: Utc::now(),
        }
    }
}

impl HydrationPayload {
    pub fn now(amount: f64) -> Self {
        Self {
            amount,
            date: Utc::now(),
        }
    }
}

impl MacroPayload {
    pub fn now(protein: f64, carbs: f64, fats: f64) -> Self {
        Self {
            protein,
            carbs,
            fats,
            date: Utc::now(),
        }
    }
}
