//! Merged flamegraph trees derived from raw CPU profiles.

use serde::{Deserialize, Serialize};

use std::collections::{HashMap, HashSet};

use crate::{FlameError, FlameResult, ProfileNode, RawProfile};

const ANONYMOUS: &str = "(anonymous)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlameNode {
    pub name: String,
    /// Microseconds, inclusive of the whole subtree.
    #[serde(rename = "executionTime")]
    pub execution_time: u64,
    #[serde(default)]
    pub children: Vec<FlameNode>,
}

impl FlameNode {
    pub fn new(name: impl Into<String>, execution_time: u64, children: Vec<FlameNode>) -> Self {
        Self {
            name: name.into(),
            execution_time,
            children,
        }
    }

    /// Normalizes a raw profile into a flamegraph. Siblings sharing a name are
    /// merged; children keep first-seen order.
    pub fn from_profile(profile: &RawProfile) -> FlameResult<Self> {
        let by_id = profile.index()?;
        let self_times = profile.self_times()?;
        let root = profile.root()?;
        let mut on_path = HashSet::new();
        build(root, &by_id, &self_times, &mut on_path)
    }

    pub fn total_time(&self) -> u64 {
        self.execution_time
    }

    pub fn self_time(&self) -> u64 {
        let children = self
            .children
            .iter()
            .fold(0u64, |acc, c| acc.saturating_add(c.execution_time));
        self.execution_time.saturating_sub(children)
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(FlameNode::node_count).sum::<usize>()
    }

    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(FlameNode::depth).max().unwrap_or(0)
    }

    /// Folded-stack lines (`a;b;c weight`) weighted by self time.
    pub fn folded(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack = Vec::new();
        fold_into(self, &mut stack, &mut out);
        out
    }

    fn absorb(&mut self, other: FlameNode) {
        self.execution_time = self.execution_time.saturating_add(other.execution_time);
        for child in other.children {
            push_merged(&mut self.children, child);
        }
    }
}

fn build(
    node: &ProfileNode,
    by_id: &HashMap<u64, &ProfileNode>,
    self_times: &HashMap<u64, u64>,
    on_path: &mut HashSet<u64>,
) -> FlameResult<FlameNode> {
    if !on_path.insert(node.id) {
        return Err(FlameError::InvalidProfile(format!(
            "cycle through node {}",
            node.id
        )));
    }
    let mut children = Vec::new();
    for child_id in &node.children {
        let child = by_id.get(child_id).ok_or_else(|| {
            FlameError::InvalidProfile(format!("unknown child {child_id}"))
        })?;
        push_merged(&mut children, build(child, by_id, self_times, on_path)?);
    }
    on_path.remove(&node.id);

    let own = self_times.get(&node.id).copied().unwrap_or(0);
    let total = children
        .iter()
        .try_fold(own, |acc, c| acc.checked_add(c.execution_time))
        .ok_or_else(|| {
            FlameError::InvalidProfile(format!("execution time of node {} overflows", node.id))
        })?;
    let name = if node.call_frame.function_name.is_empty() {
        ANONYMOUS.to_string()
    } else {
        node.call_frame.function_name.clone()
    };
    Ok(FlameNode::new(name, total, children))
}

fn push_merged(siblings: &mut Vec<FlameNode>, node: FlameNode) {
    match siblings.iter_mut().find(|s| s.name == node.name) {
        Some(existing) => existing.absorb(node),
        None => siblings.push(node),
    }
}

fn fold_into(node: &FlameNode, stack: &mut Vec<String>, out: &mut Vec<String>) {
    stack.push(node.name.clone());
    let weight = node.self_time();
    if weight > 0 {
        out.push(format!("{} {weight}", stack.join(";")));
    }
    for child in &node.children {
        fold_into(child, stack, out);
    }
    stack.pop();
}
