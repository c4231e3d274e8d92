//! Aggregation
//!
//! Pure transforms from raw, unordered metric entries to day-bucketed
//! aggregates and chart-ready series. Nothing here touches the network or
//! the clock: "now" and the day zone are always passed in.
//!
//! ## Policies
//!
//! - **Sum**: all values of a day are added (hydration)
//! - **Last**: the value with the greatest timestamp wins (weight); on equal
//!   timestamps the entry appearing later in the input wins

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::metrics::{Entry, MacroEntry, ScalarEntry};

/// Zone in which timestamps are cut into calendar days
///
/// One zone applies to every metric kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayZone {
    /// The machine's local zone
    #[default]
    Local,
    Utc,
    Fixed(FixedOffset),
}

impl DayZone {
    pub fn day_key(&self, ts: DateTime<Utc>) -> NaiveDate {
        match self {
            DayZone::Local => ts.with_timezone(&chrono::Local).date_naive(),
            DayZone::Utc => ts.date_naive(),
            DayZone::Fixed(offset) => ts.with_timezone(offset).date_naive(),
        }
    }
}

impl FromStr for DayZone {
    type Err = String;

    /// Accepts `local`, `utc` or an offset such as `+02:00`, `-0530`, `+9`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "local" | "" => return Ok(DayZone::Local),
            "utc" | "z" | "gmt" => return Ok(DayZone::Utc),
            _ => {}
        }

        let invalid = || format!("Invalid timezone '{}': use local, utc or +HH:MM", s);
        let (sign, rest) = match s.as_bytes().first() {
            Some(b'+') => (1, &s[1..]),
            Some(b'-') => (-1, &s[1..]),
            _ => return Err(invalid()),
        };
        let digits: String = rest.chars().filter(|c| *c != ':').collect();
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let (hours, minutes) = match digits.len() {
            1 | 2 => (digits.parse::<i32>(), Ok(0)),
            4 => (digits[..2].parse::<i32>(), digits[2..].parse::<i32>()),
            _ => return Err(invalid()),
        };
        let (hours, minutes) = (hours.map_err(|_| invalid())?, minutes.map_err(|_| invalid())?);
        if minutes >= 60 {
            return Err(invalid());
        }

        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(DayZone::Fixed)
            .ok_or_else(invalid)
    }
}

impl fmt::Display for DayZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayZone::Local => write!(f, "local"),
            DayZone::Utc => write!(f, "utc"),
            DayZone::Fixed(offset) => write!(f, "{}", offset),
        }
    }
}

/// Calendar day of `ts` in `zone`
pub fn day_key(ts: DateTime<Utc>, zone: DayZone) -> NaiveDate {
    zone.day_key(ts)
}

/// How same-day values collapse into one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayPolicy {
    Sum,
    Last,
}

impl DayPolicy {
    /// Collapse one day's entries, given in input order
    pub fn reduce<E: ScalarEntry>(&self, entries: &[&E]) -> f64 {
        match self {
            DayPolicy::Sum => entries.iter().map(|e| e.value()).sum(),
            DayPolicy::Last => entries
                .iter()
                .max_by_key(|e| e.timestamp())
                .map(|e| e.value())
                .unwrap_or(0.0),
        }
    }
}

/// One day of a scalar series
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DayPoint {
    pub day: NaiveDate,
    pub value: f64,
}

/// One macro entry placed on the chart
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacroPoint {
    pub day: NaiveDate,
    pub timestamp: DateTime<Utc>,
    pub protein: f64,
    pub carbs: f64,
    pub fats: f64,
}

/// Sum of values logged on the day containing `now`
pub fn today_total<E: ScalarEntry>(entries: &[E], now: DateTime<Utc>, zone: DayZone) -> f64 {
    let today = zone.day_key(now);
    entries
        .iter()
        .filter(|e| zone.day_key(e.timestamp()) == today)
        .map(|e| e.value())
        .sum()
}

/// One point per distinct day, ascending by day
pub fn daily_series<E: ScalarEntry>(entries: &[E], policy: DayPolicy, zone: DayZone) -> Vec<DayPoint> {
    let mut buckets: BTreeMap<NaiveDate, Vec<&E>> = BTreeMap::new();
    for entry in entries {
        buckets.entry(zone.day_key(entry.timestamp())).or_default().push(entry);
    }

    buckets
        .into_iter()
        .map(|(day, bucket)| DayPoint {
            day,
            value: policy.reduce(&bucket),
        })
        .collect()
}

/// One point per macro entry, ascending by timestamp, never aggregated
pub fn macro_series(entries: &[MacroEntry], zone: DayZone) -> Vec<MacroPoint> {
    let mut sorted: Vec<&MacroEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| e.date);

    sorted
        .into_iter()
        .map(|e| MacroPoint {
            day: zone.day_key(e.date),
            timestamp: e.date,
            protein: e.protein,
            carbs: e.carbs,
            fats: e.fats,
        })
        .collect()
}

/// Entry with the greatest timestamp; later in the input wins a tie
pub fn latest<E: Entry>(entries: &[E]) -> Option<&E> {
    entries.iter().max_by_key(|e| e.timestamp())
}

/// Fraction of `scale` reached by `total`, clamped to `[0, 1]`
pub fn progress(total: f64, scale: f64) -> f64 {
    if !total.is_finite() || !scale.is_finite() || scale <= 0.0 {
        return 0.0;
    }
    (total / scale).clamp(0.0, 1.0)
}
