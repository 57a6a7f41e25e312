//! Signaling wire contract and channel boundary
//!
//! Every message is one JSON object tagged by `type`:
//!
//! ```text
//! { "type": "register",  "id": "<id>" }
//! { "type": "offer",     "MyId": "<offerer>",  "answererId": "<id>", "sdp": "<SDP>" }
//! { "type": "answer",    "MyId": "<answerer>", "offererId": "<id>",  "sdp": "<SDP>" }
//! { "type": "candidate", "MyId": "<sender>",   "targetId": "<id>",   "candidate": "<line>", "mid": "<mid>" }
//! ```
//!
//! The target field is optional on inbound messages since a relay may strip it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::types::PeerIdentity;

pub mod memory;
pub mod tcp;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignalingEnvelope {
    Register {
        id: PeerIdentity,
    },
    Offer {
        #[serde(rename = "MyId")]
        sender: PeerIdentity,
        #[serde(rename = "answererId", default, skip_serializing_if = "Option::is_none")]
        target: Option<PeerIdentity>,
        sdp: String,
    },
    Answer {
        #[serde(rename = "MyId")]
        sender: PeerIdentity,
        #[serde(rename = "offererId", default, skip_serializing_if = "Option::is_none")]
        target: Option<PeerIdentity>,
        sdp: String,
    },
    Candidate {
        #[serde(rename = "MyId")]
        sender: PeerIdentity,
        #[serde(rename = "targetId", default, skip_serializing_if = "Option::is_none")]
        target: Option<PeerIdentity>,
        candidate: String,
        #[serde(default)]
        mid: String,
    },
}

impl SignalingEnvelope {
    pub fn register(id: PeerIdentity) -> Self {
        SignalingEnvelope::Register { id }
    }

    pub fn offer(sender: PeerIdentity, target: PeerIdentity, sdp: impl Into<String>) -> Self {
        SignalingEnvelope::Offer {
            sender,
            target: Some(target),
            sdp: sdp.into(),
        }
    }

    pub fn answer(sender: PeerIdentity, target: PeerIdentity, sdp: impl Into<String>) -> Self {
        SignalingEnvelope::Answer {
            sender,
            target: Some(target),
            sdp: sdp.into(),
        }
    }

    pub fn candidate(
        sender: PeerIdentity,
        target: PeerIdentity,
        candidate: impl Into<String>,
        mid: impl Into<String>,
    ) -> Self {
        SignalingEnvelope::Candidate {
            sender,
            target: Some(target),
            candidate: candidate.into(),
            mid: mid.into(),
        }
    }

    /// The `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            SignalingEnvelope::Register { .. } => "register",
            SignalingEnvelope::Offer { .. } => "offer",
            SignalingEnvelope::Answer { .. } => "answer",
            SignalingEnvelope::Candidate { .. } => "candidate",
        }
    }

    /// Originating identity; for `register` the identity being registered
    pub fn sender(&self) -> &PeerIdentity {
        match self {
            SignalingEnvelope::Register { id } => id,
            SignalingEnvelope::Offer { sender, .. }
            | SignalingEnvelope::Answer { sender, .. }
            | SignalingEnvelope::Candidate { sender, .. } => sender,
        }
    }

    pub fn target(&self) -> Option<&PeerIdentity> {
        match self {
            SignalingEnvelope::Register { .. } => None,
            SignalingEnvelope::Offer { target, .. }
            | SignalingEnvelope::Answer { target, .. }
            | SignalingEnvelope::Candidate { target, .. } => target.as_ref(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Reliable, ordered message channel to the rendezvous server.
///
/// Framing, reconnection and acknowledgement belong to the implementation.
#[async_trait]
pub trait SignalingChannel: Send + Sync {
    /// Queue one serialized envelope for delivery
    async fn send(&self, message: String) -> Result<()>;
}
