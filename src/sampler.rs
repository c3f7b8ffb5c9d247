//! Repeated sequential profiling of one target.

use serde::Serialize;

use crate::{FlameError, FlameNode, FlameResult, PageTiming, Probe, RawProfile};

#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub index: usize,
    pub title: String,
    pub profile: RawProfile,
    pub flame: FlameNode,
    pub timing: Option<PageTiming>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunBrief {
    pub index: usize,
    pub title: String,
    #[serde(rename = "executionTime")]
    pub execution_time: u64,
}

impl RunRecord {
    pub fn brief(&self) -> RunBrief {
        RunBrief {
            index: self.index,
            title: self.title.clone(),
            execution_time: self.flame.execution_time,
        }
    }
}

/// Runs collected by one invocation. Never shared between invocations.
#[derive(Debug, Clone, Default)]
pub struct SampleBatch {
    pub target: String,
    pub runs: Vec<RunRecord>,
}

impl SampleBatch {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            runs: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn briefs(&self) -> Vec<RunBrief> {
        self.runs.iter().map(RunRecord::brief).collect()
    }
}

/// Profiles `target` exactly `count` times, one run after another. The first
/// probe failure aborts the whole batch.
pub fn run_samples<P: Probe + ?Sized>(
    probe: &mut P,
    target: &str,
    count: usize,
) -> FlameResult<SampleBatch> {
    if count == 0 {
        return Err(FlameError::InvalidArgument(
            "sample count must be at least 1".to_string(),
        ));
    }
    let mut batch = SampleBatch::new(target);
    for index in 0..count {
        let out = probe.probe(target).map_err(|e| FlameError::Probe {
            run: index,
            message: e.to_string(),
        })?;
        let flame = FlameNode::from_profile(&out.profile).map_err(|e| FlameError::Probe {
            run: index,
            message: e.to_string(),
        })?;
        tracing::info!(
            run = index,
            title = %out.title,
            execution_time_us = flame.execution_time,
            nodes = flame.node_count(),
            "profiled {target}"
        );
        if let Some(timing) = &out.timing {
            tracing::info!(
                run = index,
                dom_complete_ms = timing.dom_complete_ms,
                load_event_ms = timing.load_event_ms,
                "page timing"
            );
        }
        batch.runs.push(RunRecord {
            index,
            title: out.title,
            profile: out.profile,
            flame,
            timing: out.timing,
        });
    }
    Ok(batch)
}
