// src/services/orchestrator.rs
//! Presentation-exchange orchestrator.
//!
//! Drives the state machine that ties one OIDC authorization attempt to
//! one credential-agent exchange:
//!
//! `Created → Invited → (Presented | TimedOut) → (Verified | Failed | Revoked)`
//!
//! The orchestrator only consumes completion events (here surfaced by
//! polling the agent record); how those events are delivered is the
//! caller's concern. Gateway failures become a terminal `Failed` state
//! and the original error is surfaced unchanged; retry policy, if any,
//! belongs to the caller driving the OIDC flow.

use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use serde_json::Value;

use crate::agent::models::{InvitationRecord, PresentationRecord};
use crate::agent::AgentClient;
use crate::error::{Error, Result};
use crate::models::exchange::{ExchangeState, PresentationExchange};
use crate::oidc::SubjectIdentifierFactory;
use crate::storage::ExchangeStore;

/// Static policy for every attempt this orchestrator runs.
pub struct OrchestratorConfig {
    /// Proof requirements forwarded verbatim to the agent; what gets
    /// requested is deployment policy.
    pub proof_request: Value,
    /// Whether invitations reference the agent's public DID.
    pub use_public_did: bool,
    /// Attempt-level deadline, distinct from the gateway's per-call
    /// timeout.
    pub deadline_secs: i64,
}

/// Orchestrates presentation exchanges for authentication attempts.
///
/// Attempts are independent units of work: the only state shared between
/// them is the agent client and the exchange store, both of which are
/// safe for concurrent use.
pub struct PresentationOrchestrator {
    agent: Arc<AgentClient>,
    store: Arc<dyn ExchangeStore>,
    subjects: SubjectIdentifierFactory,
    config: OrchestratorConfig,
}

impl PresentationOrchestrator {
    pub fn new(
        agent: Arc<AgentClient>,
        store: Arc<dyn ExchangeStore>,
        subjects: SubjectIdentifierFactory,
        config: OrchestratorConfig,
    ) -> Self {
        PresentationOrchestrator {
            agent,
            store,
            subjects,
            config,
        }
    }

    /// Starts a new attempt: creates the presentation request with the
    /// agent, then wraps it in an out-of-band invitation for the end
    /// user's wallet.
    ///
    /// # Errors
    /// `AgentUnavailable` if either gateway call fails. A failure before
    /// the agent assigned an exchange id leaves nothing behind; a failure
    /// afterwards records the attempt as terminally `Failed`. No
    /// invitation is produced in either case.
    pub async fn start(
        &self,
        auth_request_id: &str,
    ) -> Result<(PresentationExchange, InvitationRecord)> {
        let created = self
            .agent
            .create_presentation_request(&self.config.proof_request)
            .await?;

        let mut exchange = PresentationExchange::new(
            created.pres_ex_id.clone(),
            auth_request_id.to_string(),
            created.record.clone(),
            self.config.deadline_secs,
        );
        self.store.put(exchange.clone()).await?;

        // A public-DID invitation only works if the agent actually holds
        // a public DID; resolve it up front so a misconfigured agent
        // fails the attempt instead of handing out a dead invitation.
        if self.config.use_public_did {
            match self.agent.get_wallet_did(true).await {
                Ok(did) => info!("invitation will reference public DID {}", did.did),
                Err(e) => {
                    warn!("public DID lookup failed: {}", e);
                    self.transition(exchange, ExchangeState::Failed).await?;
                    return Err(e);
                }
            }
        }

        let invitation = match self
            .agent
            .create_oob_invitation(&created.record, self.config.use_public_did)
            .await
        {
            Ok(invitation) => invitation,
            Err(e) => {
                warn!("invitation creation failed for {}: {}", exchange.pres_ex_id, e);
                self.transition(exchange, ExchangeState::Failed).await?;
                return Err(e);
            }
        };

        let exchange = self.transition(exchange, ExchangeState::Invited).await?;
        info!(
            "attempt {} invited via exchange {}",
            auth_request_id, exchange.pres_ex_id
        );
        Ok((exchange, invitation))
    }

    /// Consumes the agent's current view of an exchange and advances the
    /// attempt. Safe to call repeatedly; terminal states are sticky and
    /// the deadline is enforced before anything else.
    ///
    /// # Errors
    /// `NotFound` for an unknown exchange; `AgentUnavailable` if a
    /// gateway call fails (the attempt is then terminally `Failed`).
    pub async fn poll(&self, pres_ex_id: &str) -> Result<PresentationExchange> {
        let exchange = self.lookup(pres_ex_id).await?;
        if exchange.state.is_terminal() {
            return Ok(exchange);
        }

        if exchange.is_expired(Utc::now()) {
            info!("attempt {} timed out", exchange.auth_request_id);
            return self.transition(exchange, ExchangeState::TimedOut).await;
        }

        let record = match self.agent.get_presentation_record(pres_ex_id).await {
            Ok(record) => record,
            Err(e) => {
                warn!("record fetch failed for {}: {}", pres_ex_id, e);
                self.transition(exchange, ExchangeState::Failed).await?;
                return Err(e);
            }
        };

        if record.abandoned() {
            return self.transition(exchange, ExchangeState::Failed).await;
        }
        if !record.presentation_received() {
            return Ok(exchange);
        }

        self.verify_presentation(exchange, &record).await
    }

    /// Current attempt state without contacting the agent, with the
    /// deadline still enforced.
    pub async fn status(&self, pres_ex_id: &str) -> Result<PresentationExchange> {
        let exchange = self.lookup(pres_ex_id).await?;
        if !exchange.state.is_terminal() && exchange.is_expired(Utc::now()) {
            return self.transition(exchange, ExchangeState::TimedOut).await;
        }
        Ok(exchange)
    }

    /// Handles a received presentation: revocation checks first, then the
    /// agent's own verdict, then claim derivation and subject
    /// computation.
    async fn verify_presentation(
        &self,
        exchange: PresentationExchange,
        record: &PresentationRecord,
    ) -> Result<PresentationExchange> {
        let mut exchange = self.transition(exchange, ExchangeState::Presented).await?;
        exchange.rev_reg_ids = record.revocation_registry_ids();
        self.store.put(exchange.clone()).await?;

        let rev_reg_ids = exchange.rev_reg_ids.clone();
        for rev_reg_id in &rev_reg_ids {
            match self.agent.is_revoked(rev_reg_id).await {
                Ok(true) => {
                    warn!(
                        "attempt {} presented a credential revoked in {}",
                        exchange.auth_request_id, rev_reg_id
                    );
                    return self.transition(exchange, ExchangeState::Revoked).await;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("revocation check failed for {}: {}", rev_reg_id, e);
                    self.transition(exchange, ExchangeState::Failed).await?;
                    return Err(e);
                }
            }
        }

        if record.verified_flag() == Some(false) {
            warn!(
                "agent rejected the presentation for attempt {}",
                exchange.auth_request_id
            );
            return self.transition(exchange, ExchangeState::Failed).await;
        }

        let claims = record.revealed_attributes();
        exchange.subject = Some(self.subjects.subject_for(&claims));
        exchange.claims = Some(claims);
        info!("attempt {} verified", exchange.auth_request_id);
        self.transition(exchange, ExchangeState::Verified).await
    }

    async fn lookup(&self, pres_ex_id: &str) -> Result<PresentationExchange> {
        self.store
            .get(pres_ex_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("exchange '{}'", pres_ex_id)))
    }

    async fn transition(
        &self,
        mut exchange: PresentationExchange,
        next: ExchangeState,
    ) -> Result<PresentationExchange> {
        exchange.state = next;
        self.store.put(exchange.clone()).await?;
        Ok(exchange)
    }
}
