use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use salesdesk_core::UserId;

use crate::identity::{DatasetProfile, IdentityContext};

/// Bearer credential issued by the backend's auth service.
///
/// `Debug` never prints the token itself.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Signed-in session (transport-agnostic).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub email: String,
    pub access_token: AccessToken,
    pub refresh_token: Option<AccessToken>,
    /// Dataset claim carried in the session's app metadata.
    #[serde(default)]
    pub dataset: DatasetProfile,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session has expired")]
    Expired,

    #[error("session has an empty access token")]
    MissingToken,
}

impl Session {
    pub fn new(user_id: UserId, email: impl Into<String>, access_token: AccessToken) -> Self {
        Self {
            user_id,
            email: email.into(),
            access_token,
            refresh_token: None,
            dataset: DatasetProfile::default(),
            expires_at: None,
        }
    }

    pub fn with_dataset(mut self, dataset: DatasetProfile) -> Self {
        self.dataset = dataset;
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// The part of the session used to scope remote queries.
    pub fn identity(&self) -> IdentityContext {
        IdentityContext {
            user_id: self.user_id,
            email: self.email.clone(),
            dataset: self.dataset,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }

    /// Deterministically check that the session is usable at `now`.
    ///
    /// Refreshing an expired session is the auth service's job.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), SessionError> {
        if self.access_token.expose().trim().is_empty() {
            return Err(SessionError::MissingToken);
        }
        if self.is_expired(now) {
            return Err(SessionError::Expired);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session() -> Session {
        Session::new(UserId::new(), "rep@shop.example", AccessToken::new("tok"))
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let rendered = format!("{:?}", session());
        assert!(!rendered.contains("tok\""));
        assert!(rendered.contains("AccessToken(***)"));
    }

    #[test]
    fn session_without_expiry_is_valid() {
        assert_eq!(session().validate(Utc::now()), Ok(()));
    }

    #[test]
    fn expired_session_is_rejected() {
        let now = Utc::now();
        let s = session().with_expiry(now - Duration::seconds(1));
        assert_eq!(s.validate(now), Err(SessionError::Expired));
    }

    #[test]
    fn blank_token_is_rejected() {
        let s = Session::new(UserId::new(), "x", AccessToken::new("  "));
        assert_eq!(s.validate(Utc::now()), Err(SessionError::MissingToken));
    }

    #[test]
    fn identity_carries_dataset_claim() {
        let s = session().with_dataset(DatasetProfile::Demo);
        let identity = s.identity();
        assert_eq!(identity.user_id, s.user_id);
        assert_eq!(identity.dataset, DatasetProfile::Demo);
    }

    #[test]
    fn missing_dataset_claim_deserializes_as_standard() {
        let json = serde_json::json!({
            "user_id": UserId::new(),
            "email": "a@b.c",
            "access_token": "t",
            "refresh_token": null,
            "expires_at": null
        });
        let s: Session = serde_json::from_value(json).unwrap();
        assert_eq!(s.dataset, DatasetProfile::Standard);
    }
}
