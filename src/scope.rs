//! Tenant scoping for retrieval and generation calls.
//!
//! Every query into the shared stores carries a [`ChunkScope`] built at the
//! boundary of the call. Deeper layers never widen the scope they were given.

use crate::error::{ReferatError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The scope a retrieval or generation call operates in.
///
/// A scope always names the owning organization. When `meeting_id` is set,
/// the call is restricted to that single meeting; otherwise it spans all
/// non-deleted meetings of the organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkScope {
    /// Owning organization.
    pub organization_id: Uuid,
    /// Optional restriction to a single meeting.
    pub meeting_id: Option<Uuid>,
}

impl ChunkScope {
    /// Scope covering every meeting of an organization.
    pub fn organization(organization_id: Uuid) -> Self {
        Self {
            organization_id,
            meeting_id: None,
        }
    }

    /// Scope restricted to one meeting.
    pub fn meeting(organization_id: Uuid, meeting_id: Uuid) -> Self {
        Self {
            organization_id,
            meeting_id: Some(meeting_id),
        }
    }

    /// Validate that the scope names a real organization.
    pub fn validate(&self) -> Result<()> {
        if self.organization_id.is_nil() {
            return Err(ReferatError::Validation(
                "scope requires a non-nil organization id".to_string(),
            ));
        }
        if let Some(meeting_id) = self.meeting_id {
            if meeting_id.is_nil() {
                return Err(ReferatError::Validation(
                    "scoped meeting id must be non-nil".to_string(),
                ));
            }
        }
        Ok(())
    }
}
