use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StackError {
    #[error(
        "registry corrupt at {}: {reason}; fix or restore the file by hand, it is never rewritten automatically",
        path.display()
    )]
    RegistryCorrupt { path: PathBuf, reason: String },

    #[error(
        "concurrent write conflict: expected registry version {expected}, found {found}; re-run the command"
    )]
    ConcurrentWriteConflict { expected: u64, found: u64 },

    #[error("cycle detected: {}; the base graph must stay acyclic, choose a base outside this chain", chain.join(" -> "))]
    CycleDetected { chain: Vec<String> },

    #[error("base not found: '{base}' is neither tracked nor trunk; available bases: {}", available.join(", "))]
    BaseNotFound { base: String, available: Vec<String> },

    #[error("branch not found: {0}")]
    BranchNotFound(String),

    #[error("branch already tracked: {0}; branch names must be unique, use 'update' to change it")]
    BranchExists(String),

    #[error("invalid branch name '{0}': must be a valid git ref name and differ from the trunk name")]
    InvalidBranchName(String),

    #[error("invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("invalid status '{0}': expected active, submitted or merged")]
    InvalidStatus(String),

    #[error("cannot submit '{branch}': {reason}")]
    NotSubmittable { branch: String, reason: String },

    #[error("contract schema violation: {0}")]
    ContractSchemaViolation(String),

    #[error("version control query failed: {0}")]
    VersionControlQuery(String),

    #[error("invalid upstream pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StackError>;
