//! Auth endpoints
//!
//! Login and register start a session; verify only answers whether the
//! credentials are valid and never touches the current session.

use super::dto::{RegisterRequest, TokenResponse, VerifyResponse};
use super::{ApiClient, ApiError, ApiResult, ErrorKind};
use crate::session::Credentials;

impl ApiClient {
    /// `POST /auth/login`, storing the issued token on success
    pub async fn login(&self, credentials: &Credentials) -> ApiResult<()> {
        let response = self
            .send_public("/auth/login", credentials)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::Validation | ErrorKind::Authentication => {
                    ApiError::Authentication("Invalid username or password".to_string())
                }
                ErrorKind::Transport => e,
            })?;

        let body: TokenResponse = response.json().await?;
        self.session().login(body.token);
        tracing::info!(username = %credentials.username, "Logged in");
        Ok(())
    }

    /// `POST /auth/register`, storing the issued token on success
    pub async fn register(&self, username: &str, email: &str, password: &str) -> ApiResult<()> {
        let request = RegisterRequest {
            username,
            email,
            password,
        };
        let response = self.send_public("/auth/register", &request).await?;

        let body: TokenResponse = response.json().await?;
        self.session().login(body.token);
        tracing::info!(username = %username, "Registered new account");
        Ok(())
    }

    /// `POST /auth/verify`
    ///
    /// A 401 from the endpoint counts as "not verified" rather than as an
    /// expired session.
    pub async fn verify(&self, credentials: &Credentials) -> ApiResult<bool> {
        let response = match self.send_public("/auth/verify", credentials).await {
            Ok(response) => response,
            Err(ApiError::Authentication(_)) => return Ok(false),
            Err(e) => return Err(e),
        };

        let body: VerifyResponse = response.json().await?;
        Ok(body.verified)
    }

    /// End the session locally
    pub fn logout(&self) {
        self.session().logout();
    }
}
