// src/models/exchange.rs
//! Presentation-exchange data model.
//!
//! One `PresentationExchange` represents a single in-flight or completed
//! verification, correlating an OIDC authorization attempt with the
//! asynchronous exchange held by the credential agent. It is scoped to one
//! authentication attempt and never shared across attempts.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle of one authentication attempt.
///
/// Transitions are strictly sequential within an attempt:
/// `Created → Invited → (Presented | TimedOut) → (Verified | Failed | Revoked)`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeState {
    /// Presentation request created with the agent.
    Created,
    /// Out-of-band invitation issued; waiting on the wallet.
    Invited,
    /// The agent reported a presentation; verification in progress.
    Presented,
    /// No presentation arrived before the configured deadline. Terminal.
    TimedOut,
    /// Presentation checked out and a subject identifier was derived.
    /// Terminal, success.
    Verified,
    /// Gateway failure or an invalid presentation. Terminal.
    Failed,
    /// The presented credential references a revoked registry entry.
    /// Terminal, treated as authentication failure.
    Revoked,
}

impl ExchangeState {
    /// Whether the state admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExchangeState::TimedOut
                | ExchangeState::Verified
                | ExchangeState::Failed
                | ExchangeState::Revoked
        )
    }
}

/// One in-flight or completed verification attempt.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PresentationExchange {
    /// Exchange identifier assigned by the credential agent.
    pub pres_ex_id: String,

    /// Identifier of the OIDC authorization attempt this exchange belongs to.
    pub auth_request_id: String,

    /// Raw presentation-request record returned by the agent at creation
    /// time; forwarded verbatim inside the out-of-band invitation.
    pub request_payload: Value,

    /// Current position in the attempt lifecycle.
    pub state: ExchangeState,

    /// Revealed attributes, populated once the presentation verifies.
    pub claims: Option<BTreeMap<String, String>>,

    /// Revocation-registry identifiers referenced by the presented
    /// credential.
    pub rev_reg_ids: Vec<String>,

    /// Stable subject identifier derived from the claims, populated on
    /// `Verified`.
    pub subject: Option<String>,

    /// When the attempt started.
    pub created_at: DateTime<Utc>,

    /// Hard deadline after which a pending attempt times out.
    pub expires_at: DateTime<Utc>,
}

impl PresentationExchange {
    /// Starts a fresh exchange in the `Created` state.
    pub fn new(
        pres_ex_id: String,
        auth_request_id: String,
        request_payload: Value,
        deadline_secs: i64,
    ) -> Self {
        let now = Utc::now();
        PresentationExchange {
            pres_ex_id,
            auth_request_id,
            request_payload,
            state: ExchangeState::Created,
            claims: None,
            rev_reg_ids: Vec::new(),
            subject: None,
            created_at: now,
            expires_at: now + chrono::Duration::seconds(deadline_secs),
        }
    }

    /// Whether the attempt-level deadline has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!ExchangeState::Created.is_terminal());
        assert!(!ExchangeState::Invited.is_terminal());
        assert!(!ExchangeState::Presented.is_terminal());
        assert!(ExchangeState::TimedOut.is_terminal());
        assert!(ExchangeState::Verified.is_terminal());
        assert!(ExchangeState::Failed.is_terminal());
        assert!(ExchangeState::Revoked.is_terminal());
    }

    #[test]
    fn deadline_expiry() {
        let exchange = PresentationExchange::new(
            "pres-ex-1".into(),
            "auth-1".into(),
            serde_json::json!({}),
            0,
        );
        assert!(exchange.is_expired(Utc::now() + chrono::Duration::seconds(1)));

        let exchange = PresentationExchange::new(
            "pres-ex-2".into(),
            "auth-2".into(),
            serde_json::json!({}),
            300,
        );
        assert!(!exchange.is_expired(Utc::now()));
    }
}
