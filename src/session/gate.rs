//! Re-authentication Gate
//!
//! Sensitive account mutations (profile update, account deletion) run only
//! after the user re-enters their credentials, even with a valid session.
//!
//! ```text
//! Idle --request_action--> AwaitingConfirmation --confirm/cancel--> Idle
//! ```
//!
//! Only one gated action is in flight: a second `request_action` replaces
//! the pending one.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use super::{Credentials, Navigator, SessionStore};
use crate::api::{ApiError, ApiResult};
use crate::profile::{ProfileUpdate, UserProfile};

/// Account operations the gate dispatches to
#[async_trait]
pub trait AccountApi: Send + Sync {
    /// Check credentials without touching the current session
    async fn verify(&self, credentials: &Credentials) -> ApiResult<bool>;

    async fn update_profile(&self, update: &ProfileUpdate) -> ApiResult<UserProfile>;

    async fn delete_account(&self) -> ApiResult<()>;
}

/// Action waiting for credential confirmation
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PendingAction {
    #[default]
    None,
    Update(ProfileUpdate),
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    AwaitingConfirmation,
}

/// What a confirmed action did
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    Updated(UserProfile),
    Deleted,
}

#[derive(Error, Debug)]
pub enum GateError {
    #[error("No action is awaiting confirmation")]
    NothingPending,

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Guard in front of [`AccountApi`] mutations
pub struct ReauthGate<A: AccountApi> {
    account: A,
    session: Arc<SessionStore>,
    navigator: Arc<dyn Navigator>,
    pending: Mutex<PendingAction>,
}

impl<A: AccountApi> ReauthGate<A> {
    pub fn new(account: A, session: Arc<SessionStore>, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            account,
            session,
            navigator,
            pending: Mutex::new(PendingAction::None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PendingAction> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record the action and wait for credentials; nothing runs yet
    pub fn request_action(&self, action: PendingAction) {
        tracing::debug!(?action, "Gated action requested");
        *self.lock() = action;
    }

    /// Drop the pending action without running it
    pub fn cancel(&self) {
        *self.lock() = PendingAction::None;
    }

    pub fn pending(&self) -> PendingAction {
        self.lock().clone()
    }

    pub fn state(&self) -> GateState {
        match *self.lock() {
            PendingAction::None => GateState::Idle,
            _ => GateState::AwaitingConfirmation,
        }
    }

    /// Verify `credentials` and, if they check out, run the pending action
    ///
    /// The pending action and the credentials are consumed on every path,
    /// so the gate is back to `Idle` however this call ends.
    pub async fn confirm(&self, credentials: Credentials) -> Result<GateOutcome, GateError> {
        let action = std::mem::take(&mut *self.lock());
        let result = self.dispatch(action, &credentials).await;
        drop(credentials);

        match &result {
            Ok(GateOutcome::Updated(_)) => tracing::info!("Gated profile update completed"),
            Ok(GateOutcome::Deleted) => tracing::info!("Gated account deletion completed"),
            Err(e) => tracing::warn!("Gated action failed: {}", e),
        }
        result
    }

    async fn dispatch(
        &self,
        action: PendingAction,
        credentials: &Credentials,
    ) -> Result<GateOutcome, GateError> {
        if action == PendingAction::None {
            return Err(GateError::NothingPending);
        }

        if !self.account.verify(credentials).await? {
            return Err(ApiError::Authentication("Invalid credentials".to_string()).into());
        }

        match action {
            PendingAction::Update(update) => {
                let profile = self.account.update_profile(&update).await?;
                Ok(GateOutcome::Updated(profile))
            }
            PendingAction::Delete => {
                self.account.delete_account().await?;
                self.session.logout();
                self.navigator.to_login();
                Ok(GateOutcome::Deleted)
            }
            PendingAction::None => Err(GateError::NothingPending),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::RecordingNavigator;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeAccount {
        verify_calls: AtomicUsize,
        updates: AtomicUsize,
        deletes: AtomicUsize,
        fail_delete: bool,
        verify_unreachable: bool,
    }

    #[async_trait]
    impl AccountApi for FakeAccount {
        async fn verify(&self, credentials: &Credentials) -> ApiResult<bool> {
            self.verify_calls.fetch_add(1, Ordering::SeqCst);
            if self.verify_unreachable {
                return Err(ApiError::Status {
                    status: 503,
                    message: "down".into(),
                });
            }
            Ok(credentials.username == "u" && credentials.password == "p")
        }

        async fn update_profile(&self, update: &ProfileUpdate) -> ApiResult<UserProfile> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            Ok(UserProfile {
                username: update.username.clone(),
                email: "u@example.com".into(),
                date_of_birth: update.date_of_birth,
                sex: update.sex,
                height: update.height,
                initial_weight: update.initial_weight,
                target_weight: update.target_weight,
                workouts_per_week: update.workouts_per_week,
                updated_at: None,
            })
        }

        async fn delete_account(&self) -> ApiResult<()> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            if self.fail_delete {
                return Err(ApiError::Status {
                    status: 500,
                    message: "boom".into(),
                });
            }
            Ok(())
        }
    }

    fn update() -> ProfileUpdate {
        ProfileUpdate {
            username: "u2".into(),
            date_of_birth: None,
            sex: None,
            height: Some(180.0),
            initial_weight: None,
            target_weight: Some(75.0),
            workouts_per_week: Some(4),
        }
    }

    fn gate(account: FakeAccount) -> (ReauthGate<FakeAccount>, Arc<SessionStore>, Arc<RecordingNavigator>) {
        let session = Arc::new(SessionStore::in_memory());
        session.login("tok");
        let nav = Arc::new(RecordingNavigator::new());
        let gate = ReauthGate::new(account, Arc::clone(&session), nav.clone());
        (gate, session, nav)
    }

    #[tokio::test]
    async fn test_request_does_not_execute() {
        let (gate, _, _) = gate(FakeAccount::default());
        gate.request_action(PendingAction::Delete);

        assert_eq!(gate.state(), GateState::AwaitingConfirmation);
        assert_eq!(gate.account.deletes.load(Ordering::SeqCst), 0);
        assert_eq!(gate.account.verify_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_confirm_update() {
        let (gate, session, nav) = gate(FakeAccount::default());
        gate.request_action(PendingAction::Update(update()));

        let outcome = gate.confirm(Credentials::new("u", "p")).await.unwrap();
        match outcome {
            GateOutcome::Updated(profile) => {
                assert_eq!(profile.username, "u2");
                assert_eq!(profile.target_weight, Some(75.0));
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        assert_eq!(gate.state(), GateState::Idle);
        assert!(session.is_authenticated());
        assert_eq!(nav.redirects(), 0);
    }

    #[tokio::test]
    async fn test_invalid_credentials_leave_account_untouched() {
        let (gate, session, nav) = gate(FakeAccount::default());
        gate.request_action(PendingAction::Delete);

        let err = gate.confirm(Credentials::new("u", "wrong")).await.unwrap_err();
        assert!(matches!(err, GateError::Api(ApiError::Authentication(_))));

        assert_eq!(gate.account.deletes.load(Ordering::SeqCst), 0);
        assert_eq!(gate.pending(), PendingAction::None);
        assert!(session.is_authenticated());
        assert_eq!(nav.redirects(), 0);
    }

    #[tokio::test]
    async fn test_confirm_delete_logs_out_and_redirects() {
        let (gate, session, nav) = gate(FakeAccount::default());
        gate.request_action(PendingAction::Delete);

        let outcome = gate.confirm(Credentials::new("u", "p")).await.unwrap();
        assert_eq!(outcome, GateOutcome::Deleted);
        assert_eq!(gate.account.deletes.load(Ordering::SeqCst), 1);
        assert!(!session.is_authenticated());
        assert_eq!(nav.redirects(), 1);
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_session_and_resets_gate() {
        let (gate, session, nav) = gate(FakeAccount {
            fail_delete: true,
            ..Default::default()
        });
        gate.request_action(PendingAction::Delete);

        let err = gate.confirm(Credentials::new("u", "p")).await.unwrap_err();
        assert!(matches!(err, GateError::Api(ApiError::Status { status: 500, .. })));
        assert_eq!(gate.state(), GateState::Idle);
        assert!(session.is_authenticated());
        assert_eq!(nav.redirects(), 0);
    }

    #[tokio::test]
    async fn test_verify_transport_failure_resets_gate() {
        let (gate, _, _) = gate(FakeAccount {
            verify_unreachable: true,
            ..Default::default()
        });
        gate.request_action(PendingAction::Update(update()));

        assert!(gate.confirm(Credentials::new("u", "p")).await.is_err());
        assert_eq!(gate.state(), GateState::Idle);
        assert_eq!(gate.account.updates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_second_request_overwrites() {
        let (gate, _, _) = gate(FakeAccount::default());
        gate.request_action(PendingAction::Delete);
        gate.request_action(PendingAction::Update(update()));

        let outcome = gate.confirm(Credentials::new("u", "p")).await.unwrap();
        assert!(matches!(outcome, GateOutcome::Updated(_)));
        assert_eq!(gate.account.deletes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_and_nothing_pending() {
        let (gate, _, _) = gate(FakeAccount::default());
        gate.request_action(PendingAction::Delete);
        gate.cancel();
        assert_eq!(gate.state(), GateState::Idle);

        let err = gate.confirm(Credentials::new("u", "p")).await.unwrap_err();
        assert!(matches!(err, GateError::NothingPending));
        assert_eq!(gate.account.verify_calls.load(Ordering::SeqCst), 0);
    }
}
