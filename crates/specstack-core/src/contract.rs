//! Envelopes a command emits to ask the trusted host for a privileged action.
//!
//! A command never performs the action itself. It writes exactly one
//! envelope as a single JSON line on its error channel and exits with the
//! code reserved for that envelope kind. Any other non-zero exit is an
//! ordinary failure and never carries an envelope.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Exit codes
// ---------------------------------------------------------------------------

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_PR_SUGGESTION: i32 = 2;
pub const EXIT_IMPORT_PROMPT: i32 = 3;

// ---------------------------------------------------------------------------
// EnvelopeKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnvelopeKind {
    PrSuggestion,
    ImportPrompt,
}

impl EnvelopeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EnvelopeKind::PrSuggestion => "pr-suggestion",
            EnvelopeKind::ImportPrompt => "import-prompt",
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            EnvelopeKind::PrSuggestion => EXIT_PR_SUGGESTION,
            EnvelopeKind::ImportPrompt => EXIT_IMPORT_PROMPT,
        }
    }

    /// The envelope kind an exit code reserves, if any.
    pub fn from_exit_code(code: i32) -> Option<Self> {
        match code {
            EXIT_PR_SUGGESTION => Some(EnvelopeKind::PrSuggestion),
            EXIT_IMPORT_PROMPT => Some(EnvelopeKind::ImportPrompt),
            _ => None,
        }
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrSuggestion {
    pub title: String,
    pub description: String,
    pub base: String,
    pub spec_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportCandidate {
    pub branch_name: String,
    pub base_branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPrompt {
    pub branches: Vec<ImportCandidate>,
    pub available_specs: Vec<String>,
}

// ---------------------------------------------------------------------------
// ContractEnvelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ContractEnvelope {
    PrSuggestion(PrSuggestion),
    ImportPrompt(ImportPrompt),
}

impl ContractEnvelope {
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            ContractEnvelope::PrSuggestion(_) => EnvelopeKind::PrSuggestion,
            ContractEnvelope::ImportPrompt(_) => EnvelopeKind::ImportPrompt,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }

    /// Single-line JSON form written to the error channel.
    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
