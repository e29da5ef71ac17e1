//! Id types threaded through the signaling core.
//!
//! Conference and participant ids are client-chosen strings (§3); session ids are
//! server-generated, one per bidirectional channel.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ConferenceId = String;
pub type ParticipantId = String;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        SessionId(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}
