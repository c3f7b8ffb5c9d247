//! Invocation boundary: sample, compare against the stored baseline, store.

use serde::{Deserialize, Serialize};

use crate::{
    DiffMode, DiffOutcome, FlameResult, PageTiming, Probe, ProfileStore, RunBrief, SampleBatch,
    diff, run_samples, select_representative,
};

pub const DEFAULT_SAMPLES: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invocation {
    pub target: String,
}

#[derive(Debug, Clone, Copy)]
pub struct InvokeOptions {
    pub samples: usize,
    pub mode: DiffMode,
}

impl Default for InvokeOptions {
    fn default() -> Self {
        Self {
            samples: DEFAULT_SAMPLES,
            mode: DiffMode::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum InvocationResponse {
    Success(Box<ProfileReport>),
    Failure(FailureReport),
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileReport {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub target: String,
    pub title: String,
    pub diff: DiffOutcome,
    /// Where the representative profile was stored, or why storing failed.
    #[serde(rename = "currentProfile")]
    pub current_profile: String,
    #[serde(rename = "previousProfile")]
    pub previous_profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing: Option<PageTiming>,
    pub samples: Vec<RunBrief>,
    pub representative: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl InvocationResponse {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Success(r) => r.status_code,
            Self::Failure(f) => f.status_code,
        }
    }
}

pub fn invoke<P, S>(
    request: &Invocation,
    probe: &mut P,
    store: &S,
    options: InvokeOptions,
) -> InvocationResponse
where
    P: Probe + ?Sized,
    S: ProfileStore + ?Sized,
{
    match profile_target(request, probe, store, options) {
        Ok(report) => InvocationResponse::Success(Box::new(report)),
        Err(err) => {
            tracing::error!("failed to profile {}: {err}", request.target);
            InvocationResponse::Failure(FailureReport {
                status_code: 500,
                body: format!("failed to profile {}: {err}", request.target),
            })
        }
    }
}

fn profile_target<P, S>(
    request: &Invocation,
    probe: &mut P,
    store: &S,
    options: InvokeOptions,
) -> FlameResult<ProfileReport>
where
    P: Probe + ?Sized,
    S: ProfileStore + ?Sized,
{
    let batch = run_samples(probe, &request.target, options.samples)?;
    compare_and_store(&batch, store, options.mode)
}

/// Aggregates an already collected batch against the store.
pub fn compare_and_store<S>(
    batch: &SampleBatch,
    store: &S,
    mode: DiffMode,
) -> FlameResult<ProfileReport>
where
    S: ProfileStore + ?Sized,
{
    let previous = match store.get_latest() {
        Ok(p) => p,
        Err(err) => {
            tracing::warn!("could not read previous profile, skipping diff: {err}");
            None
        }
    };
    let previous_flame = match &previous {
        Some(stored) => match crate::FlameNode::from_profile(&stored.profile) {
            Ok(flame) => Some(flame),
            Err(err) => {
                tracing::warn!("previous profile {} is unusable: {err}", stored.location);
                None
            }
        },
        None => None,
    };

    let rep = select_representative(&batch.runs)?;
    tracing::info!(
        run = rep.index,
        execution_time_us = rep.flame.execution_time,
        "selected representative of {} runs",
        batch.len()
    );

    let outcome = diff(previous_flame.as_ref(), &rep.flame, mode);
    if outcome.is_available() {
        let summary = outcome.summary();
        tracing::info!(
            entries = summary.entries,
            total_delta_us = summary.total_delta,
            "compared against {}",
            previous.as_ref().map(|p| p.location.as_str()).unwrap_or("-")
        );
    }

    let current_profile = match store.put(&rep.profile) {
        Ok(loc) => loc.location,
        Err(err) => {
            tracing::warn!("failed to store profile: {err}");
            format!("failed to store profile: {err}")
        }
    };

    Ok(ProfileReport {
        status_code: 200,
        target: batch.target.clone(),
        title: rep.title.clone(),
        diff: outcome,
        current_profile,
        previous_profile: previous.map(|p| p.location),
        timing: rep.timing,
        samples: batch.briefs(),
        representative: rep.index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::tests::node;
    use crate::sampler::tests::{ScriptedProbe, profile_lasting};
    use crate::{FlameError, FsStore, RawProfile, StoredLocation, StoredProfile};

    fn temp_store(name: &str) -> FsStore {
        FsStore::new(
            std::env::temp_dir().join(format!("flamecheck-handler-{name}-{}", uuid::Uuid::new_v4())),
        )
    }

    struct BrokenStore;

    impl ProfileStore for BrokenStore {
        fn get_latest(&self) -> FlameResult<Option<StoredProfile>> {
            Err(FlameError::Store("bucket unreachable".to_string()))
        }

        fn put(&self, _profile: &RawProfile) -> FlameResult<StoredLocation> {
            Err(FlameError::Store("access denied".to_string()))
        }
    }

    /// Serves a previous profile whose tree cannot be built, writes to `inner`.
    struct UnusablePreviousStore {
        inner: FsStore,
    }

    impl ProfileStore for UnusablePreviousStore {
        fn get_latest(&self) -> FlameResult<Option<StoredProfile>> {
            let profile = RawProfile {
                nodes: vec![
                    node(1, "(root)", 0, &[2]),
                    node(2, "main", 1, &[3]),
                    node(3, "loop", 1, &[2]),
                ],
                start_time: 0,
                end_time: 100,
                samples: Vec::new(),
                time_deltas: Vec::new(),
            };
            Ok(Some(StoredProfile {
                location: "profile-1.cpuprofile".to_string(),
                profile,
            }))
        }

        fn put(&self, profile: &RawProfile) -> FlameResult<StoredLocation> {
            self.inner.put(profile)
        }
    }

    fn request() -> Invocation {
        Invocation {
            target: "https://example.test/".to_string(),
        }
    }

    #[test]
    fn first_invocation_has_no_diff_and_stores_median() {
        let store = temp_store("first");
        let mut probe = ScriptedProbe::new(&[30, 10, 20]);
        let resp = invoke(&request(), &mut probe, &store, InvokeOptions::default());
        let InvocationResponse::Success(report) = resp else {
            panic!("expected success");
        };
        assert_eq!(report.status_code, 200);
        assert!(!report.diff.is_available());
        assert!(report.previous_profile.is_none());
        assert_eq!(report.representative, 2);
        assert_eq!(report.samples.len(), 3);
        let stored = store.get_latest().expect("get").expect("some");
        assert_eq!(stored.profile, profile_lasting(20));
        assert_eq!(stored.location, report.current_profile);
    }

    #[test]
    fn second_invocation_diffs_against_first() {
        let store = temp_store("second");
        let mut probe = ScriptedProbe::new(&[30, 10, 20]);
        invoke(&request(), &mut probe, &store, InvokeOptions::default());

        let mut probe = ScriptedProbe::new(&[12, 15, 18]);
        let resp = invoke(&request(), &mut probe, &store, InvokeOptions::default());
        let InvocationResponse::Success(report) = resp else {
            panic!("expected success");
        };
        assert!(report.previous_profile.is_some());
        let entries = report.diff.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "main");
        assert_eq!(entries[0].delta, 20 - 15);
    }

    #[test]
    fn probe_failure_is_a_500_naming_the_target() {
        let store = temp_store("fail");
        let mut probe = ScriptedProbe::new(&[1, 2, 3]);
        probe.fail_at = Some(0);
        let resp = invoke(&request(), &mut probe, &store, InvokeOptions::default());
        assert_eq!(resp.status_code(), 500);
        let InvocationResponse::Failure(f) = resp else {
            panic!("expected failure");
        };
        assert!(f.body.contains("https://example.test/"));
        assert!(f.body.contains("navigation timed out"));
        assert!(store.get_latest().expect("get").is_none());
    }

    #[test]
    fn zero_samples_is_a_500() {
        let store = temp_store("zero");
        let mut probe = ScriptedProbe::new(&[1]);
        let options = InvokeOptions {
            samples: 0,
            ..InvokeOptions::default()
        };
        let resp = invoke(&request(), &mut probe, &store, options);
        assert_eq!(resp.status_code(), 500);
    }

    #[test]
    fn store_failures_degrade_instead_of_failing() {
        let mut probe = ScriptedProbe::new(&[30, 10, 20]);
        let resp = invoke(&request(), &mut probe, &BrokenStore, InvokeOptions::default());
        let InvocationResponse::Success(report) = resp else {
            panic!("expected success");
        };
        assert!(!report.diff.is_available());
        assert!(report.current_profile.contains("access denied"));
    }

    #[test]
    fn unusable_previous_profile_skips_the_diff() {
        let store = UnusablePreviousStore {
            inner: temp_store("cyclic"),
        };
        let mut probe = ScriptedProbe::new(&[30, 10, 20]);
        let resp = invoke(&request(), &mut probe, &store, InvokeOptions::default());
        let InvocationResponse::Success(report) = resp else {
            panic!("expected success");
        };
        assert_eq!(report.status_code, 200);
        assert_eq!(report.diff, DiffOutcome::unavailable(crate::NO_PREVIOUS));
        assert_eq!(report.previous_profile.as_deref(), Some("profile-1.cpuprofile"));
        let stored = store.inner.get_latest().expect("get").expect("some");
        assert_eq!(stored.profile, profile_lasting(20));
    }

    #[test]
    fn success_payload_uses_camel_case_keys() {
        let store = temp_store("json");
        let mut probe = ScriptedProbe::new(&[5]);
        let options = InvokeOptions {
            samples: 1,
            ..InvokeOptions::default()
        };
        let resp = invoke(&request(), &mut probe, &store, options);
        let value = serde_json::to_value(&resp).expect("json");
        assert_eq!(value["statusCode"], 200);
        assert_eq!(value["diff"]["status"], "unavailable");
        assert_eq!(value["diff"]["reason"], "no previous");
        assert!(value["previousProfile"].is_null());
        assert!(value["currentProfile"].is_string());
    }
}
