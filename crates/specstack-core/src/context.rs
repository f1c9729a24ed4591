use crate::config::Config;
use crate::error::Result;
use crate::paths::Layout;
use crate::registry::RegistryStore;
use crate::vcs::FactsFile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const ENV_HOST: &str = "SPECSTACK_HOST";
pub const ENV_SPEC: &str = "SPECSTACK_SPEC";
pub const ENV_VC_FACTS: &str = "SPECSTACK_VC_FACTS";

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

/// Who invoked the command. Operations behave the same either way; the
/// host is only recorded in audit records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Host {
    Assistant,
    Direct,
}

// ---------------------------------------------------------------------------
// InvocationContext
// ---------------------------------------------------------------------------

/// Everything an operation may learn about its environment, resolved once
/// at startup and passed explicitly.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub layout: Layout,
    pub config: Config,
    pub host: Host,
    pub env: BTreeMap<String, String>,
}

impl InvocationContext {
    pub fn new<I, K, V>(root: &Path, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let env: BTreeMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let layout = Layout::for_root(root);
        let config = Config::load(&layout.config)?;
        let host = match env.get(ENV_HOST).map(String::as_str) {
            Some("assistant") => Host::Assistant,
            _ => Host::Direct,
        };
        Ok(Self {
            layout,
            config,
            host,
            env,
        })
    }

    pub fn trunk(&self) -> &str {
        &self.config.trunk
    }

    pub fn store(&self) -> RegistryStore {
        RegistryStore::new(&self.layout.registry)
    }

    pub fn facts_path(&self) -> PathBuf {
        match self.env.get(ENV_VC_FACTS) {
            Some(p) if !p.is_empty() => {
                let p = PathBuf::from(p);
                if p.is_absolute() {
                    p
                } else {
                    self.layout.root.join(p)
                }
            }
            _ => self.layout.vc_facts.clone(),
        }
    }

    pub fn facts_file(&self) -> FactsFile {
        FactsFile::new(self.facts_path())
    }

    /// Spec id to assume when the caller gives none.
    pub fn default_spec(&self) -> Option<String> {
        self.env
            .get(ENV_SPEC)
            .filter(|s| !s.trim().is_empty())
            .cloned()
    }
}
