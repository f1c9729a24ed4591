//! Immutable dependency view over a registry snapshot.
//!
//! Trunk is the implicit root. Every operation here is a pure function of
//! the snapshot taken by [`DependencyGraph::build`]; mutations are applied
//! to a `RegistryDocument` by the caller after validation passes.

use crate::error::{Result, StackError};
use crate::registry::RegistryDocument;
use crate::types::BaseRef;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: BTreeMap<String, BaseRef>,
    children: BTreeMap<String, Vec<String>>,
    trunk_children: Vec<String>,
}

impl DependencyGraph {
    pub fn build(doc: &RegistryDocument) -> Self {
        let mut graph = Self::default();
        for (name, branch) in &doc.branches {
            graph.edges.insert(name.clone(), branch.base_name.clone());
            match &branch.base_name {
                BaseRef::Trunk => graph.trunk_children.push(name.clone()),
                BaseRef::Branch(base) => graph
                    .children
                    .entry(base.clone())
                    .or_default()
                    .push(name.clone()),
            }
        }
        graph
    }

    pub fn contains(&self, name: &str) -> bool {
        self.edges.contains_key(name)
    }

    pub fn base_of(&self, name: &str) -> Option<&BaseRef> {
        self.edges.get(name)
    }

    /// Direct dependents of `name`, sorted by name.
    pub fn dependents(&self, name: &str) -> &[String] {
        self.children.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Trunk is always a valid base; otherwise a live record is required.
    pub fn validate_base_exists(&self, base: &BaseRef) -> bool {
        match base {
            BaseRef::Trunk => true,
            BaseRef::Branch(name) => self.contains(name),
        }
    }

    /// True when `name`'s base is neither trunk nor a live record.
    pub fn is_orphaned(&self, name: &str) -> bool {
        matches!(self.edges.get(name), Some(BaseRef::Branch(base)) if !self.contains(base))
    }

    pub fn would_create_cycle(&self, candidate: &str, candidate_base: &BaseRef) -> bool {
        self.cycle_chain(candidate, candidate_base).is_some()
    }

    /// Walk from `candidate_base` toward trunk. If `candidate` is reached
    /// first, return the chain `candidate -> base -> ... -> candidate`.
    pub fn cycle_chain(&self, candidate: &str, candidate_base: &BaseRef) -> Option<Vec<String>> {
        let mut chain = vec![candidate.to_string()];
        let mut seen = BTreeSet::new();
        let mut cursor = candidate_base.branch_name();
        while let Some(name) = cursor {
            chain.push(name.to_string());
            if name == candidate {
                return Some(chain);
            }
            if !seen.insert(name) {
                // Pre-existing loop that does not pass through the candidate.
                return None;
            }
            cursor = self.edges.get(name).and_then(|b| b.branch_name());
        }
        None
    }

    /// Validate giving `name` the base `base`: the base must exist and the
    /// new edge must not close a loop.
    pub fn check_base(&self, name: &str, base: &BaseRef, trunk: &str) -> Result<()> {
        if let Some(chain) = self.cycle_chain(name, base) {
            return Err(StackError::CycleDetected { chain });
        }
        if !self.validate_base_exists(base) {
            return Err(StackError::BaseNotFound {
                base: base.to_string(),
                available: self.available_bases(name, trunk),
            });
        }
        Ok(())
    }

    /// Bases `name` could legally use: trunk plus every record that is not
    /// `name` itself or one of its descendants.
    pub fn available_bases(&self, name: &str, trunk: &str) -> Vec<String> {
        let excluded = self.descendants_inclusive(name);
        let mut out = vec![trunk.to_string()];
        out.extend(self.edges.keys().filter(|k| !excluded.contains(*k)).cloned());
        out
    }

    fn descendants_inclusive(&self, name: &str) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        let mut queue = VecDeque::from([name.to_string()]);
        while let Some(n) = queue.pop_front() {
            if out.insert(n.clone()) {
                queue.extend(self.dependents(&n).iter().cloned());
            }
        }
        out
    }

    /// Fail with the offending chain if the snapshot contains any cycle.
    pub fn ensure_acyclic(&self) -> Result<()> {
        let mut cleared: BTreeSet<&str> = BTreeSet::new();
        for start in self.edges.keys() {
            let mut path: Vec<&str> = Vec::new();
            let mut cursor = Some(start.as_str());
            while let Some(name) = cursor {
                if cleared.contains(name) || !self.contains(name) {
                    break;
                }
                if let Some(pos) = path.iter().position(|p| *p == name) {
                    let mut chain: Vec<String> = path[pos..].iter().map(|s| s.to_string()).collect();
                    chain.push(name.to_string());
                    return Err(StackError::CycleDetected { chain });
                }
                path.push(name);
                cursor = self.edges.get(name).and_then(|b| b.branch_name());
            }
            cleared.extend(path);
        }
        Ok(())
    }

    /// Records in stable topological order: trunk-adjacent branches first,
    /// then breadth-first outward, siblings by name. Orphaned records and
    /// their dependents follow the trunk-rooted forest.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        self.ensure_acyclic()?;

        let mut order = Vec::with_capacity(self.edges.len());
        let mut roots: Vec<String> = self.trunk_children.clone();
        roots.sort();
        self.breadth_first(roots, &mut order);

        let orphans: Vec<String> = self
            .edges
            .keys()
            .filter(|n| self.is_orphaned(n))
            .cloned()
            .collect();
        self.breadth_first(orphans, &mut order);
        Ok(order)
    }

    fn breadth_first(&self, roots: Vec<String>, order: &mut Vec<String>) {
        let mut queue: VecDeque<String> = roots.into();
        while let Some(name) = queue.pop_front() {
            let mut kids = self.dependents(&name).to_vec();
            kids.sort();
            queue.extend(kids);
            order.push(name);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::Branch;

    fn doc(edges: &[(&str, Option<&str>)]) -> RegistryDocument {
        let mut d = RegistryDocument::new();
        for (name, base) in edges {
            let base = match base {
                Some(b) => BaseRef::Branch(b.to_string()),
                None => BaseRef::Trunk,
            };
            d.insert(Branch::new(*name, base));
        }
        d
    }

    fn base(name: &str) -> BaseRef {
        BaseRef::Branch(name.to_string())
    }

    #[test]
    fn self_base_is_a_cycle() {
        let g = DependencyGraph::build(&doc(&[("x", None)]));
        assert!(g.would_create_cycle("x", &base("x")));
        assert_eq!(g.cycle_chain("x", &base("x")).unwrap(), vec!["x", "x"]);
    }

    #[test]
    fn retroactive_rebase_onto_descendant_is_a_cycle() {
        let g = DependencyGraph::build(&doc(&[
            ("x", None),
            ("y", Some("x")),
            ("z", Some("y")),
            ("w", Some("z")),
        ]));
        let chain = g.cycle_chain("x", &base("w")).unwrap();
        assert_eq!(chain, vec!["x", "w", "z", "y", "x"]);
        assert!(!g.would_create_cycle("w", &base("x")));
        assert!(!g.would_create_cycle("x", &BaseRef::Trunk));
    }

    #[test]
    fn new_branch_on_existing_is_fine() {
        let g = DependencyGraph::build(&doc(&[("x", None)]));
        assert!(!g.would_create_cycle("y", &base("x")));
        g.check_base("y", &base("x"), "main").unwrap();
    }

    #[test]
    fn base_exists_rules() {
        let g = DependencyGraph::build(&doc(&[("x", None)]));
        assert!(g.validate_base_exists(&BaseRef::Trunk));
        assert!(g.validate_base_exists(&base("x")));
        assert!(!g.validate_base_exists(&base("ghost")));
    }

    #[test]
    fn check_base_missing_lists_available() {
        let g = DependencyGraph::build(&doc(&[("x", None), ("y", Some("x"))]));
        match g.check_base("x", &base("ghost"), "main") {
            Err(StackError::BaseNotFound { base, available }) => {
                assert_eq!(base, "ghost");
                // x and its descendant y are not legal bases for x.
                assert_eq!(available, vec!["main"]);
            }
            other => panic!("expected BaseNotFound, got {other:?}"),
        }
    }

    #[test]
    fn topological_order_is_breadth_first_from_trunk() {
        let g = DependencyGraph::build(&doc(&[
            ("z", Some("y")),
            ("b", None),
            ("y", Some("x")),
            ("x", None),
            ("c", Some("b")),
        ]));
        assert_eq!(g.topological_order().unwrap(), vec!["b", "x", "c", "y", "z"]);
    }

    #[test]
    fn orphans_are_detected_and_ordered_last() {
        let g = DependencyGraph::build(&doc(&[
            ("a", None),
            ("lost", Some("deleted")),
            ("child", Some("lost")),
        ]));
        assert!(g.is_orphaned("lost"));
        assert!(!g.is_orphaned("child"));
        assert!(!g.is_orphaned("a"));
        assert_eq!(g.topological_order().unwrap(), vec!["a", "lost", "child"]);
    }

    #[test]
    fn persisted_cycle_is_fatal() {
        let g = DependencyGraph::build(&doc(&[
            ("ok", None),
            ("p", Some("q")),
            ("q", Some("r")),
            ("r", Some("p")),
        ]));
        match g.ensure_acyclic() {
            Err(StackError::CycleDetected { chain }) => {
                assert_eq!(chain.first(), chain.last());
                assert_eq!(chain.len(), 4);
            }
            other => panic!("expected CycleDetected, got {other:?}"),
        }
        assert!(g.topological_order().is_err());
    }

    #[test]
    fn cycle_walk_terminates_on_unrelated_loop() {
        let g = DependencyGraph::build(&doc(&[("p", Some("q")), ("q", Some("p"))]));
        assert!(!g.would_create_cycle("new", &base("p")));
    }
}
