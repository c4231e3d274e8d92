//! FitManager REST API Client
//!
//! HTTP client for the remote FitManager API.
//!
//! # Endpoints
//!
//! ## Auth (no bearer token)
//! - `POST /auth/login` - Exchange credentials for a token
//! - `POST /auth/register` - Create an account and receive a token
//! - `POST /auth/verify` - Check credentials for a gated action
//!
//! ## Metrics
//! - `GET/POST /weights`, `DELETE /weights/:id`
//! - `GET/POST /hydrations`, `DELETE /hydrations/:id`, `GET /hydrations?last=true`
//! - `GET/POST /macros`, `DELETE /macros/:id`
//!
//! ## Account
//! - `GET /dashboard` - Composed summary
//! - `GET/PUT/DELETE /user` - Profile
//!
//! Every authenticated request carries `Authorization: Bearer <token>`.
//! A 401 on such a request ends the session and sends the user to login.

mod auth;
pub mod dto;
pub mod error;

pub use error::{ApiError, ApiResult, ErrorKind};

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ApiConfig;
use crate::session::{Navigator, SessionStore};

/// Header carrying the per-request correlation id
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Client for the remote FitManager API
///
/// Cheap to clone: the underlying connection pool, session and navigator
/// are shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Arc<SessionStore>,
    navigator: Arc<dyn Navigator>,
}

impl ApiClient {
    /// Create a client from configuration
    pub fn new(
        config: &ApiConfig,
        session: Arc<SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session,
            navigator,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    /// End the session and hand control to the login screen
    pub fn expire_session(&self) {
        tracing::warn!("Session rejected by the API, returning to login");
        self.session.logout();
        self.navigator.to_login();
    }

    fn request(&self, method: Method, path: &str) -> (RequestBuilder, String) {
        let request_id = uuid::Uuid::new_v4().to_string();
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(request_id = %request_id, method = %method, path = %path, "Sending request");

        let builder = self
            .client
            .request(method, url)
            .header(REQUEST_ID_HEADER, request_id.as_str());
        (builder, request_id)
    }

    /// Send a bearer-authenticated request and classify the response
    async fn send_authenticated<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> ApiResult<Response> {
        let token = match self.session.current_token() {
            Some(token) => token,
            None => {
                tracing::warn!(path = %path, "Authenticated call without a session");
                self.navigator.to_login();
                return Err(ApiError::NotLoggedIn);
            }
        };

        let (mut builder, request_id) = self.request(method, path);
        builder = builder.bearer_auth(token);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let result = self.finish(builder, &request_id, path).await;
        if let Err(e) = &result {
            if e.is_auth() {
                self.expire_session();
            }
        }
        result
    }

    /// Send a request without credentials (auth routes)
    async fn send_public<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ApiResult<Response> {
        let (builder, request_id) = self.request(Method::POST, path);
        self.finish(builder.json(body), &request_id, path).await
    }

    async fn finish(&self, builder: RequestBuilder, request_id: &str, path: &str) -> ApiResult<Response> {
        let response = builder.send().await.map_err(|e| {
            tracing::error!(request_id = %request_id, path = %path, error = %e, "Request failed");
            ApiError::Transport(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let err = ApiError::from_status(status, dto::error_message(&text));
        tracing::warn!(
            request_id = %request_id,
            path = %path,
            status = status.as_u16(),
            error = %err,
            "API call rejected"
        );
        Err(err)
    }

    /// `GET` a JSON resource
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let response = self.send_authenticated::<()>(Method::GET, path, None).await?;
        Ok(response.json().await?)
    }

    /// `POST` a JSON body, ignoring the response body
    pub async fn post<B: Serialize>(&self, path: &str, body: &B) -> ApiResult<()> {
        self.send_authenticated(Method::POST, path, Some(body)).await?;
        Ok(())
    }

    /// `PUT` a JSON body and decode the response
    pub async fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> ApiResult<T> {
        let response = self.send_authenticated(Method::PUT, path, Some(body)).await?;
        Ok(response.json().await?)
    }

    /// `DELETE` a resource
    pub async fn delete(&self, path: &str) -> ApiResult<()> {
        self.send_authenticated::<()>(Method::DELETE, path, None).await?;
        Ok(())
    }
}
