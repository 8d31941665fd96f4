// src/agent/models.rs
//! Wire models for the credential agent's REST admin API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// A DID held by the agent's wallet; either the public DID or one of the
/// locally managed DIDs. Read-only reference.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WalletDid {
    pub did: String,
    #[serde(default)]
    pub verkey: Option<String>,
    #[serde(default)]
    pub posture: Option<String>,
}

/// Result of creating a presentation request with the agent.
///
/// The raw record is kept alongside the extracted exchange id because the
/// out-of-band invitation embeds it verbatim as an attachment.
#[derive(Debug, Clone)]
pub struct CreatePresentationResponse {
    pub pres_ex_id: String,
    pub record: Value,
}

impl CreatePresentationResponse {
    /// Extracts the exchange handle from a raw create-request response.
    pub fn from_value(record: Value) -> Result<Self> {
        let pres_ex_id = record
            .get("pres_ex_id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::AgentUnavailable("create-request response missing pres_ex_id".into())
            })?
            .to_string();
        Ok(CreatePresentationResponse { pres_ex_id, record })
    }
}

/// Out-of-band invitation returned by the agent, rendered to the end user
/// as a QR code or deep link by the relying party's frontend.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InvitationRecord {
    pub invitation_url: String,
    pub invitation: Value,
    #[serde(default)]
    pub invi_msg_id: Option<String>,
}

/// Presentation-exchange record as reported by the agent.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PresentationRecord {
    pub pres_ex_id: String,
    pub state: String,
    /// The agent reports its own verification verdict as the strings
    /// "true" / "false".
    #[serde(default)]
    pub verified: Option<String>,
    #[serde(default)]
    pub by_format: Value,
}

impl PresentationRecord {
    /// Whether the wallet has delivered a presentation for this exchange.
    pub fn presentation_received(&self) -> bool {
        matches!(self.state.as_str(), "presentation-received" | "done")
    }

    /// Whether the wallet walked away from the exchange.
    pub fn abandoned(&self) -> bool {
        self.state == "abandoned"
    }

    /// The agent's own verification verdict, if it has produced one.
    pub fn verified_flag(&self) -> Option<bool> {
        self.verified.as_deref().map(|v| v == "true")
    }

    /// Revocation-registry identifiers referenced by the presented
    /// credential. Credentials issued without revocation support carry a
    /// null registry id and are skipped.
    pub fn revocation_registry_ids(&self) -> Vec<String> {
        self.by_format
            .pointer("/pres/indy/identifiers")
            .and_then(Value::as_array)
            .map(|identifiers| {
                identifiers
                    .iter()
                    .filter_map(|entry| entry.get("rev_reg_id"))
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Revealed attributes of the presentation, as attribute-name →
    /// raw-value pairs. Covers both individually requested attributes and
    /// attribute groups.
    pub fn revealed_attributes(&self) -> BTreeMap<String, String> {
        let mut attributes = BTreeMap::new();

        if let Some(revealed) = self
            .by_format
            .pointer("/pres/indy/requested_proof/revealed_attrs")
            .and_then(Value::as_object)
        {
            for (referent, entry) in revealed {
                if let Some(raw) = entry.get("raw").and_then(Value::as_str) {
                    attributes.insert(referent.clone(), raw.to_string());
                }
            }
        }

        if let Some(groups) = self
            .by_format
            .pointer("/pres/indy/requested_proof/revealed_attr_groups")
            .and_then(Value::as_object)
        {
            for group in groups.values() {
                if let Some(values) = group.get("values").and_then(Value::as_object) {
                    for (name, entry) in values {
                        if let Some(raw) = entry.get("raw").and_then(Value::as_str) {
                            attributes.insert(name.clone(), raw.to_string());
                        }
                    }
                }
            }
        }

        attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record_with_by_format(by_format: Value) -> PresentationRecord {
        PresentationRecord {
            pres_ex_id: "pres-ex-1".into(),
            state: "done".into(),
            verified: Some("true".into()),
            by_format,
        }
    }

    #[test]
    fn extracts_revealed_attributes_and_groups() {
        let record = record_with_by_format(json!({
            "pres": {
                "indy": {
                    "requested_proof": {
                        "revealed_attrs": {
                            "email": {"raw": "alice@example.com"}
                        },
                        "revealed_attr_groups": {
                            "group_0": {
                                "values": {
                                    "first_name": {"raw": "Alice"},
                                    "last_name": {"raw": "Jones"}
                                }
                            }
                        }
                    }
                }
            }
        }));

        let attrs = record.revealed_attributes();
        assert_eq!(attrs.get("email").unwrap(), "alice@example.com");
        assert_eq!(attrs.get("first_name").unwrap(), "Alice");
        assert_eq!(attrs.get("last_name").unwrap(), "Jones");
    }

    #[test]
    fn skips_null_revocation_registry_ids() {
        let record = record_with_by_format(json!({
            "pres": {
                "indy": {
                    "identifiers": [
                        {"schema_id": "s1", "rev_reg_id": "reg-1"},
                        {"schema_id": "s2", "rev_reg_id": null}
                    ]
                }
            }
        }));

        assert_eq!(record.revocation_registry_ids(), vec!["reg-1".to_string()]);
    }

    #[test]
    fn create_response_requires_exchange_id() {
        let err = CreatePresentationResponse::from_value(json!({"state": "request-sent"}));
        assert!(err.is_err());

        let ok = CreatePresentationResponse::from_value(
            json!({"pres_ex_id": "abc-123", "state": "request-sent"}),
        )
        .unwrap();
        assert_eq!(ok.pres_ex_id, "abc-123");
    }
}
