//! User Profile
//!
//! The profile record and the account operations that mutate it. Update and
//! delete are sensitive: callers go through [`crate::session::ReauthGate`],
//! which drives this service through the [`AccountApi`] trait.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::api::{ApiClient, ApiResult};
use crate::session::{AccountApi, Credentials};
use crate::wire;

/// Biological sex as stored by the remote API
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "O")]
    Other,
}

impl Sex {
    pub fn code(&self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
            Sex::Other => "O",
        }
    }
}

impl std::str::FromStr for Sex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "M" | "MALE" => Ok(Sex::Male),
            "F" | "FEMALE" => Ok(Sex::Female),
            "O" | "OTHER" => Ok(Sex::Other),
            other => Err(format!("Unknown sex '{}': use M, F or O", other)),
        }
    }
}

impl std::fmt::Display for Sex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sex::Male => write!(f, "Male"),
            Sex::Female => write!(f, "Female"),
            Sex::Other => write!(f, "Other"),
        }
    }
}

fn optional_sex<'de, D>(deserializer: D) -> Result<Option<Sex>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_str().and_then(|s| s.parse().ok()))
}

/// Profile record owned by the remote store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub username: String,
    /// Read-only from the client
    #[serde(default)]
    pub email: String,
    #[serde(default, deserialize_with = "wire::optional_date")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default, deserialize_with = "optional_sex")]
    pub sex: Option<Sex>,
    /// Centimetres
    #[serde(default, deserialize_with = "wire::optional_f64")]
    pub height: Option<f64>,
    /// Kilograms
    #[serde(default, deserialize_with = "wire::optional_f64")]
    pub initial_weight: Option<f64>,
    /// Kilograms
    #[serde(default, deserialize_with = "wire::optional_f64")]
    pub target_weight: Option<f64>,
    #[serde(default, deserialize_with = "wire::optional_u32")]
    pub workouts_per_week: Option<u32>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Replacement values for every client-mutable profile field
///
/// `email` is deliberately absent: it cannot be changed from the client.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub username: String,
    pub date_of_birth: Option<NaiveDate>,
    pub sex: Option<Sex>,
    pub height: Option<f64>,
    pub initial_weight: Option<f64>,
    pub target_weight: Option<f64>,
    pub workouts_per_week: Option<u32>,
}

impl From<&UserProfile> for ProfileUpdate {
    fn from(profile: &UserProfile) -> Self {
        Self {
            username: profile.username.clone(),
            date_of_birth: profile.date_of_birth,
            sex: profile.sex,
            height: profile.height,
            initial_weight: profile.initial_weight,
            target_weight: profile.target_weight,
            workouts_per_week: profile.workouts_per_week,
        }
    }
}

impl ProfileUpdate {
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn date_of_birth(mut self, date: NaiveDate) -> Self {
        self.date_of_birth = Some(date);
        self
    }

    pub fn sex(mut self, sex: Sex) -> Self {
        self.sex = Some(sex);
        self
    }

    pub fn height(mut self, cm: f64) -> Self {
        self.height = Some(cm);
        self
    }

    pub fn initial_weight(mut self, kg: f64) -> Self {
        self.initial_weight = Some(kg);
        self
    }

    pub fn target_weight(mut self, kg: f64) -> Self {
        self.target_weight = Some(kg);
        self
    }

    pub fn workouts_per_week(mut self, count: u32) -> Self {
        self.workouts_per_week = Some(count);
        self
    }
}

/// Profile endpoints of the remote API
#[derive(Clone)]
pub struct ProfileService {
    api: ApiClient,
}

impl ProfileService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// `GET /user`
    pub async fn fetch(&self) -> ApiResult<UserProfile> {
        self.api.get("/user").await
    }

    /// `PUT /user`, returning the stored profile
    pub async fn update(&self, update: &ProfileUpdate) -> ApiResult<UserProfile> {
        let profile = self.api.put("/user", update).await?;
        tracing::info!("Profile updated");
        Ok(profile)
    }

    /// `DELETE /user`
    pub async fn delete_account(&self) -> ApiResult<()> {
        self.api.delete("/user").await?;
        tracing::info!("Account deleted");
        Ok(())
    }
}

#[async_trait]
impl AccountApi for ProfileService {
    async fn verify(&self, credentials: &Credentials) -> ApiResult<bool> {
        self.api.verify(credentials).await
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> ApiResult<UserProfile> {
        self.update(update).await
    }

    async fn delete_account(&self) -> ApiResult<()> {
        ProfileService::delete_account(self).await
    }
}
