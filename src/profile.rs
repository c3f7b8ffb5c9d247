//! Raw CPU profile model (the DevTools `.cpuprofile` document).

use serde::{Deserialize, Serialize};

use std::collections::{HashMap, HashSet};

use crate::{FlameError, FlameResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawProfile {
    pub nodes: Vec<ProfileNode>,
    /// Microseconds.
    #[serde(rename = "startTime")]
    pub start_time: i64,
    /// Microseconds.
    #[serde(rename = "endTime")]
    pub end_time: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<u64>,
    #[serde(rename = "timeDeltas", default, skip_serializing_if = "Vec::is_empty")]
    pub time_deltas: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileNode {
    pub id: u64,
    #[serde(rename = "callFrame")]
    pub call_frame: CallFrame,
    #[serde(rename = "hitCount", default)]
    pub hit_count: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallFrame {
    #[serde(rename = "functionName", default)]
    pub function_name: String,
    #[serde(rename = "scriptId", default)]
    pub script_id: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "lineNumber", default)]
    pub line_number: i64,
    #[serde(rename = "columnNumber", default)]
    pub column_number: i64,
}

impl RawProfile {
    pub fn from_json(bytes: &[u8]) -> FlameResult<Self> {
        let profile: RawProfile = serde_json::from_slice(bytes)?;
        profile.index()?;
        Ok(profile)
    }

    pub fn to_json(&self) -> FlameResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// blake3 of the serialized document.
    pub fn content_hash(&self) -> FlameResult<String> {
        Ok(blake3::hash(&self.to_json()?).to_hex().to_string())
    }

    /// Nodes by id. Fails on duplicate ids, dangling child references or a
    /// node listed under more than one parent.
    pub fn index(&self) -> FlameResult<HashMap<u64, &ProfileNode>> {
        let mut by_id = HashMap::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if by_id.insert(node.id, node).is_some() {
                return Err(FlameError::InvalidProfile(format!(
                    "duplicate node id {}",
                    node.id
                )));
            }
        }
        for node in &self.nodes {
            if let Some(missing) = node.children.iter().find(|c| !by_id.contains_key(*c)) {
                return Err(FlameError::InvalidProfile(format!(
                    "node {} references unknown child {missing}",
                    node.id
                )));
            }
        }
        let mut parented = HashSet::with_capacity(self.nodes.len());
        for child in self.nodes.iter().flat_map(|n| n.children.iter()) {
            if !parented.insert(*child) {
                return Err(FlameError::InvalidProfile(format!(
                    "node {child} has multiple parents"
                )));
            }
        }
        Ok(by_id)
    }

    /// The first node (document order) that is nobody's child.
    pub fn root(&self) -> FlameResult<&ProfileNode> {
        let child_ids: HashSet<u64> = self
            .nodes
            .iter()
            .flat_map(|n| n.children.iter().copied())
            .collect();
        self.nodes
            .iter()
            .find(|n| !child_ids.contains(&n.id))
            .ok_or_else(|| FlameError::InvalidProfile("profile has no root node".to_string()))
    }

    /// Self time per node id, in microseconds.
    ///
    /// Sample `i` lasts until sample `i + 1`; the final sample runs to
    /// `endTime`. Profiles without a sample stream fall back to spreading
    /// the wall time evenly over `hitCount`.
    pub fn self_times(&self) -> FlameResult<HashMap<u64, u64>> {
        let by_id = self.index()?;
        let mut out: HashMap<u64, u64> = self.nodes.iter().map(|n| (n.id, 0)).collect();

        if self.samples.is_empty() {
            let hits = self
                .nodes
                .iter()
                .try_fold(0u64, |acc, n| acc.checked_add(n.hit_count))
                .ok_or_else(|| overflow("total hit count"))?;
            if hits == 0 {
                return Ok(out);
            }
            let wall = self
                .end_time
                .checked_sub(self.start_time)
                .ok_or_else(|| overflow("endTime - startTime"))?;
            let interval = wall.max(0) as u64 / hits;
            for node in &self.nodes {
                out.insert(node.id, node.hit_count.saturating_mul(interval));
            }
            return Ok(out);
        }

        if self.samples.len() != self.time_deltas.len() {
            return Err(FlameError::InvalidProfile(format!(
                "{} samples but {} time deltas",
                self.samples.len(),
                self.time_deltas.len()
            )));
        }

        let mut ts = self.start_time;
        for (i, id) in self.samples.iter().enumerate() {
            if !by_id.contains_key(id) {
                return Err(FlameError::InvalidProfile(format!(
                    "sample {i} references unknown node {id}"
                )));
            }
            ts = ts
                .checked_add(self.time_deltas[i])
                .ok_or_else(|| overflow("sample timestamp"))?;
            let duration = match self.time_deltas.get(i + 1) {
                Some(next) => *next,
                None => self
                    .end_time
                    .checked_sub(ts)
                    .ok_or_else(|| overflow("endTime - last sample"))?,
            };
            if let Some(slot) = out.get_mut(id) {
                *slot = slot
                    .checked_add(duration.max(0) as u64)
                    .ok_or_else(|| overflow("self time"))?;
            }
        }
        Ok(out)
    }
}

fn overflow(what: &str) -> FlameError {
    FlameError::InvalidProfile(format!("{what} overflows"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn node(id: u64, name: &str, hits: u64, children: &[u64]) -> ProfileNode {
        ProfileNode {
            id,
            call_frame: CallFrame {
                function_name: name.to_string(),
                script_id: "0".to_string(),
                url: String::new(),
                line_number: -1,
                column_number: -1,
            },
            hit_count: hits,
            children: children.to_vec(),
        }
    }

    fn sampled() -> RawProfile {
        RawProfile {
            nodes: vec![
                node(1, "(root)", 0, &[2, 3]),
                node(2, "main", 0, &[4]),
                node(3, "(idle)", 0, &[]),
                node(4, "render", 0, &[]),
            ],
            start_time: 1_000,
            end_time: 1_100,
            samples: vec![2, 4, 4, 3],
            time_deltas: vec![0, 10, 30, 20],
        }
    }

    #[test]
    fn self_times_follow_sample_stream() {
        let times = sampled().self_times().expect("self times");
        assert_eq!(times[&2], 10);
        assert_eq!(times[&4], 30 + 20);
        assert_eq!(times[&3], 1_100 - 1_060);
        assert_eq!(times[&1], 0);
    }

    #[test]
    fn self_times_fall_back_to_hit_count() {
        let profile = RawProfile {
            nodes: vec![node(1, "(root)", 0, &[2]), node(2, "main", 4, &[])],
            start_time: 0,
            end_time: 400,
            samples: Vec::new(),
            time_deltas: Vec::new(),
        };
        let times = profile.self_times().expect("self times");
        assert_eq!(times[&2], 400);
    }

    #[test]
    fn root_is_first_unreferenced_node() {
        let profile = sampled();
        assert_eq!(profile.root().expect("root").id, 1);
    }

    #[test]
    fn dangling_child_is_rejected() {
        let mut profile = sampled();
        profile.nodes[0].children.push(99);
        let err = profile.self_times().expect_err("dangling child");
        assert!(matches!(err, FlameError::InvalidProfile(_)));
    }

    #[test]
    fn extreme_timestamps_are_invalid_not_a_panic() {
        let profile = RawProfile {
            nodes: vec![node(1, "(root)", 0, &[2]), node(2, "main", 1, &[])],
            start_time: i64::MIN,
            end_time: i64::MAX,
            samples: Vec::new(),
            time_deltas: Vec::new(),
        };
        let err = profile.self_times().expect_err("wall time overflow");
        assert!(matches!(err, FlameError::InvalidProfile(_)));

        let mut profile = sampled();
        profile.time_deltas[1] = i64::MAX;
        let err = profile.self_times().expect_err("timestamp overflow");
        assert!(matches!(err, FlameError::InvalidProfile(_)));
    }

    #[test]
    fn shared_child_is_rejected() {
        let profile = RawProfile {
            nodes: vec![
                node(1, "(root)", 0, &[2, 3]),
                node(2, "a", 0, &[4]),
                node(3, "b", 0, &[4]),
                node(4, "leaf", 1, &[]),
            ],
            start_time: 0,
            end_time: 100,
            samples: Vec::new(),
            time_deltas: Vec::new(),
        };
        let err = profile.index().expect_err("two parents");
        assert!(err.to_string().contains("node 4 has multiple parents"));
    }

    #[test]
    fn parses_devtools_document() {
        let doc = br#"{
            "nodes": [
                {"id":1,"callFrame":{"functionName":"(root)","scriptId":"0","url":"","lineNumber":-1,"columnNumber":-1},"hitCount":0,"children":[2]},
                {"id":2,"callFrame":{"functionName":"","scriptId":"7","url":"https://x/app.js","lineNumber":3,"columnNumber":9},"hitCount":2,"positionTicks":[]}
            ],
            "startTime": 10,
            "endTime": 30,
            "samples": [2, 2],
            "timeDeltas": [0, 10]
        }"#;
        let profile = RawProfile::from_json(doc).expect("parse");
        assert_eq!(profile.nodes.len(), 2);
        assert_eq!(profile.nodes[1].call_frame.url, "https://x/app.js");
        assert_eq!(profile.self_times().expect("self")[&2], 20);
    }

    #[test]
    fn content_hash_is_stable() {
        let a = sampled().content_hash().expect("hash");
        let b = sampled().content_hash().expect("hash");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }
}
