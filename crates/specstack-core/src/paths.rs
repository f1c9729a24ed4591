use crate::error::{Result, StackError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const STACK_DIR: &str = ".specstack";
pub const REGISTRY_FILE: &str = ".specstack/branches.json";
pub const EVENTS_FILE: &str = ".specstack/events.jsonl";
pub const CONFIG_FILE: &str = ".specstack/config.yaml";
pub const VC_FACTS_FILE: &str = ".specstack/vc-facts.json";

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Absolute locations of every file this tool reads or writes for one
/// repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub root: PathBuf,
    pub registry: PathBuf,
    pub events: PathBuf,
    pub config: PathBuf,
    pub vc_facts: PathBuf,
}

impl Layout {
    pub fn for_root(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            registry: root.join(REGISTRY_FILE),
            events: root.join(EVENTS_FILE),
            config: root.join(CONFIG_FILE),
            vc_facts: root.join(VC_FACTS_FILE),
        }
    }

    pub fn specs_dir(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }
}

// ---------------------------------------------------------------------------
// Branch name validation
// ---------------------------------------------------------------------------

static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9._/\-]*$").expect("branch name regex is valid")
    })
}

/// Check `name` against the subset of git ref-name rules a tracked branch
/// must satisfy. Rejects the trunk name so a record never shadows trunk.
pub fn validate_branch_name(name: &str, trunk: &str) -> Result<()> {
    let bad = name.is_empty()
        || name.len() > 200
        || name == trunk
        || !name_re().is_match(name)
        || name.contains("..")
        || name.contains("//")
        || name.ends_with('/')
        || name.ends_with('.')
        || name.ends_with(".lock")
        || name.split('/').any(|c| c.starts_with('.'));
    if bad {
        return Err(StackError::InvalidBranchName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
