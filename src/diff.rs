//! Flamegraph comparison between a previous and a current representative run.
//!
//! Deltas are `previous - current` in microseconds: a positive delta means the
//! current run spent less time in that slice.

use serde::{Deserialize, Serialize};

use crate::FlameNode;

pub const NO_PREVIOUS: &str = "no previous";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffMode {
    /// Children paired by index; depth is one counter shared by the whole walk.
    #[default]
    Positional,
    /// Children paired by name; slices keyed by their full path from the root.
    Path,
}

impl clap::ValueEnum for DiffMode {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Positional, Self::Path]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(match self {
            Self::Positional => clap::builder::PossibleValue::new("positional"),
            Self::Path => clap::builder::PossibleValue::new("path"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaEntry {
    #[serde(rename = "sliceId")]
    pub slice_id: String,
    pub name: String,
    pub depth: usize,
    #[serde(rename = "executionTimeDelta")]
    pub delta: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DiffOutcome {
    Unavailable { reason: String },
    Compared { mode: DiffMode, entries: Vec<DeltaEntry> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub entries: usize,
    #[serde(rename = "totalDelta")]
    pub total_delta: i64,
    #[serde(rename = "largestRegression", skip_serializing_if = "Option::is_none")]
    pub largest_regression: Option<DeltaEntry>,
    #[serde(rename = "largestImprovement", skip_serializing_if = "Option::is_none")]
    pub largest_improvement: Option<DeltaEntry>,
}

impl DiffOutcome {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn entries(&self) -> &[DeltaEntry] {
        match self {
            Self::Unavailable { .. } => &[],
            Self::Compared { entries, .. } => entries,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Compared { .. })
    }

    pub fn summary(&self) -> DiffSummary {
        let entries = self.entries();
        DiffSummary {
            entries: entries.len(),
            total_delta: entries.iter().fold(0i64, |acc, e| acc.saturating_add(e.delta)),
            largest_regression: entries
                .iter()
                .filter(|e| e.delta < 0)
                .min_by_key(|e| e.delta)
                .cloned(),
            largest_improvement: entries
                .iter()
                .filter(|e| e.delta > 0)
                .max_by_key(|e| e.delta)
                .cloned(),
        }
    }
}

pub fn diff(previous: Option<&FlameNode>, current: &FlameNode, mode: DiffMode) -> DiffOutcome {
    let Some(previous) = previous else {
        return DiffOutcome::unavailable(NO_PREVIOUS);
    };
    let mut entries = Vec::new();
    match mode {
        DiffMode::Positional => {
            let mut depth = 0;
            walk_positional(previous, current, &mut depth, &mut entries);
        }
        DiffMode::Path => {
            let mut path = vec![current.name.clone()];
            walk_path(previous, current, &mut path, &mut entries);
        }
    }
    DiffOutcome::Compared { mode, entries }
}

fn delta(previous: &FlameNode, current: &FlameNode) -> i64 {
    let d = i128::from(previous.execution_time) - i128::from(current.execution_time);
    d.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

fn walk_positional(
    previous: &FlameNode,
    current: &FlameNode,
    depth: &mut usize,
    out: &mut Vec<DeltaEntry>,
) {
    // Leaves compare no sibling list and leave the counter alone.
    if previous.children.is_empty() || current.children.is_empty() {
        return;
    }
    for (p, c) in previous.children.iter().zip(current.children.iter()) {
        if p.name == c.name {
            out.push(DeltaEntry {
                slice_id: format!("{}@{}", p.name, *depth),
                name: p.name.clone(),
                depth: *depth,
                delta: delta(p, c),
            });
        }
        walk_positional(p, c, depth, out);
    }
    *depth += 1;
}

fn walk_path(
    previous: &FlameNode,
    current: &FlameNode,
    path: &mut Vec<String>,
    out: &mut Vec<DeltaEntry>,
) {
    for c in &current.children {
        let Some(p) = previous.children.iter().find(|p| p.name == c.name) else {
            continue;
        };
        path.push(c.name.clone());
        out.push(DeltaEntry {
            slice_id: path.join(";"),
            name: c.name.clone(),
            depth: path.len() - 1,
            delta: delta(p, c),
        });
        walk_path(p, c, path, out);
        path.pop();
    }
}
