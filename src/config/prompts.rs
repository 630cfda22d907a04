//! Prompt templates for Referat.
//!
//! The defaults work out of the box; deployments can override them through
//! the settings file.

use serde::{Deserialize, Serialize};

/// System instruction templates for grounded answering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Prompts {
    /// System instructions for answering within one meeting.
    pub meeting_system: String,
    /// System instructions for answering across an organization's meetings.
    pub cross_meeting_system: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            meeting_system: r#"You are a meeting assistant that answers questions about one specific meeting.

Guidelines:
- Answer using only the provided meeting context
- Cite sources with the meeting title and timestamp, e.g. [Weekly Sync @ 12:34]
- If the context does not contain the answer, say so clearly
- Be concise and concrete; quote the transcript when it helps"#
                .to_string(),

            cross_meeting_system: r#"You are a meeting assistant that answers questions across all of the user's meetings.

Guidelines:
- Answer using only the provided context from meeting transcripts
- Cite sources with the meeting title and timestamp, e.g. [Weekly Sync @ 12:34]
- When several meetings are relevant, synthesize across them and name each one
- If the context does not contain the answer, say so clearly"#
                .to_string(),
        }
    }
}

impl Prompts {
    /// The system prompt for a session, depending on its scope.
    pub fn system_for_scope(&self, single_meeting: bool) -> &str {
        if single_meeting {
            &self.meeting_system
        } else {
            &self.cross_meeting_system
        }
    }
}
