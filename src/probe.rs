//! Probe contract and adapters.
//!
//! A probe owns whatever drives the target (usually a headless browser) and
//! hands back one CPU profile per call. The crate never talks to the browser
//! itself.

use serde::{Deserialize, Serialize};

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::{FlameError, FlameResult, RawProfile};

const TARGET_PLACEHOLDER: &str = "{target}";

pub trait Probe {
    fn probe(&mut self, target: &str) -> FlameResult<ProbeOutput>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutput {
    pub title: String,
    pub profile: RawProfile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<PageTiming>,
}

/// Navigation timing, both measured from `navigationStart`. Negative when the
/// event had not fired yet at capture time (its timestamp was still 0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageTiming {
    #[serde(rename = "domCompleteMs")]
    pub dom_complete_ms: i64,
    #[serde(rename = "loadEventMs")]
    pub load_event_ms: i64,
}

impl PageTiming {
    pub fn load_fired(&self) -> bool {
        self.load_event_ms >= 0
    }
}

/// Runs an external driver and reads a JSON [`ProbeOutput`] from its stdout.
#[derive(Debug, Clone)]
pub struct CommandProbe {
    program: String,
    args: Vec<String>,
}

impl CommandProbe {
    pub fn new(argv: &[String]) -> FlameResult<Self> {
        let (program, args) = argv.split_first().ok_or_else(|| {
            FlameError::Config("probe.command must name a program".to_string())
        })?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn args_for(&self, target: &str) -> Vec<String> {
        let mut substituted = false;
        let mut out = self
            .args
            .iter()
            .map(|a| {
                if a.contains(TARGET_PLACEHOLDER) {
                    substituted = true;
                    a.replace(TARGET_PLACEHOLDER, target)
                } else {
                    a.clone()
                }
            })
            .collect::<Vec<_>>();
        if !substituted {
            out.push(target.to_string());
        }
        out
    }
}

impl Probe for CommandProbe {
    fn probe(&mut self, target: &str) -> FlameResult<ProbeOutput> {
        let args = self.args_for(target);
        tracing::debug!("probe: {} {}", self.program, args.join(" "));
        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| FlameError::Command(format!("failed to spawn {}: {e}", self.program)))?;
        if !output.status.success() {
            return Err(FlameError::Command(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let out: ProbeOutput = serde_json::from_slice(&output.stdout)?;
        out.profile.index()?;
        Ok(out)
    }
}

/// Serves pre-recorded `.cpuprofile` files in order, one per call.
#[derive(Debug, Clone)]
pub struct ReplayProbe {
    queue: VecDeque<PathBuf>,
}

impl ReplayProbe {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            queue: paths.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl Probe for ReplayProbe {
    fn probe(&mut self, _target: &str) -> FlameResult<ProbeOutput> {
        let path = self.queue.pop_front().ok_or_else(|| {
            FlameError::InvalidArgument("replay probe has no recorded profiles left".to_string())
        })?;
        let profile = RawProfile::from_json(&std::fs::read(&path)?)?;
        let title = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("replay")
            .to_string();
        Ok(ProbeOutput {
            title,
            profile,
            timing: None,
        })
    }
}
