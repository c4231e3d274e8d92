//! Data Transfer Objects
//!
//! Request and response bodies of the auth and dashboard endpoints. Metric
//! entry shapes live in [`crate::metrics`].

use serde::{Deserialize, Serialize};

use crate::metrics::{HydrationEntry, MacroEntry, WeightEntry};
use crate::profile::UserProfile;
use crate::wire;

/// `POST /auth/register` body
#[derive(Serialize)]
pub struct RegisterRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

/// `{token}` returned by login and register
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// `POST /auth/verify` response
#[derive(Debug, Deserialize)]
pub struct VerifyResponse {
    #[serde(default)]
    pub verified: bool,
}

/// `GET /dashboard` response
///
/// Older API versions send the latest hydration entry instead of today's
/// total; both are accepted.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub user: UserProfile,
    #[serde(default, deserialize_with = "wire::optional_lenient")]
    pub latest_weight: Option<WeightEntry>,
    #[serde(default, deserialize_with = "wire::optional_lenient")]
    pub latest_macros: Option<MacroEntry>,
    #[serde(default, deserialize_with = "wire::optional_f64")]
    pub today_hydration_total: Option<f64>,
    #[serde(default, deserialize_with = "wire::optional_lenient")]
    pub latest_hydration: Option<HydrationEntry>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Extract a human-readable message from an error response body
///
/// Accepts `{"message": ..}`, `{"error": ..}` or plain text.
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed
            .message
            .or(parsed.error)
            .unwrap_or_else(|| body.trim().to_string()),
        Err(_) => body.trim().to_string(),
    }
}
