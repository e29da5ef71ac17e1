//! C7 — AdminSurface: operator-facing operations over the Registry (§4.7).
//!
//! Grounded on the teacher's `control_schema.rs` admin operations (`register_room`/
//! `unregister_room`/`stats`), re-expressed as plain async methods now that the GraphQL schema
//! layer is dropped (see DESIGN.md). No HTTP layer is wired up here — out of scope per §1; a CLI
//! or a future HTTP handler calls these directly.

use std::sync::Arc;

use serde::Serialize;

use crate::error::CoreError;
use crate::registry::Registry;

pub struct AdminSurface {
    registry: Arc<Registry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConferenceSummary {
    pub conference_id: String,
    pub participant_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub conference_count: usize,
    pub total_participants: usize,
}

impl AdminSurface {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub async fn list_conferences(&self) -> Vec<ConferenceSummary> {
        let mut out = Vec::new();
        for conference in self.registry.list_conferences().await {
            out.push(ConferenceSummary {
                conference_id: conference.id.clone(),
                participant_count: conference.participant_count().await,
            });
        }
        out
    }

    pub async fn list_participants(&self, conference_id: &str) -> Result<Vec<String>, CoreError> {
        let conference = self
            .registry
            .get_conference(conference_id)
            .await
            .ok_or_else(|| CoreError::not_found(format!("conference {}", conference_id)))?;
        Ok(conference.participant_ids().await)
    }

    pub async fn get_stats(&self) -> Stats {
        let conferences = self.registry.list_conferences().await;
        let mut total_participants = 0;
        for conference in &conferences {
            total_participants += conference.participant_count().await;
        }
        Stats {
            conference_count: conferences.len(),
            total_participants,
        }
    }

    /// Forces the given participant's session closed, triggering the normal leave path.
    pub async fn kick_participant(&self, conference_id: &str, participant_id: &str) -> Result<(), CoreError> {
        self.registry.kick_participant(conference_id, participant_id).await
    }

    /// Kicks all members then deletes the conference.
    pub async fn close_conference(&self, conference_id: &str, reason: &str) -> Result<(), CoreError> {
        self.registry.close_conference(conference_id, reason).await
    }
}
