//! Representative-run selection.

use crate::{FlameError, FlameResult, RunRecord};

/// Picks the run at index `len / 2` after a stable ascending sort on total
/// execution time. Ties keep their sampling order.
pub fn select_representative(runs: &[RunRecord]) -> FlameResult<&RunRecord> {
    if runs.is_empty() {
        return Err(FlameError::EmptyInput);
    }
    let mut ordered: Vec<&RunRecord> = runs.iter().collect();
    ordered.sort_by_key(|r| r.flame.execution_time);
    Ok(ordered[ordered.len() / 2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_samples;
    use crate::sampler::tests::ScriptedProbe;

    fn runs(durations: &[i64]) -> Vec<RunRecord> {
        let mut probe = ScriptedProbe::new(durations);
        run_samples(&mut probe, "t", durations.len())
            .expect("batch")
            .runs
    }

    #[test]
    fn odd_count_picks_middle() {
        let runs = runs(&[30, 10, 20]);
        let rep = select_representative(&runs).expect("rep");
        assert_eq!(rep.flame.execution_time, 20);
        assert_eq!(rep.index, 2);
    }

    #[test]
    fn even_count_picks_upper_median() {
        let runs = runs(&[10, 20, 30, 40]);
        let rep = select_representative(&runs).expect("rep");
        assert_eq!(rep.flame.execution_time, 30);
    }

    #[test]
    fn ties_resolve_to_the_same_run() {
        let runs = runs(&[5, 5, 5, 5, 5]);
        let first = select_representative(&runs).expect("rep").index;
        for _ in 0..10 {
            assert_eq!(select_representative(&runs).expect("rep").index, first);
        }
        assert_eq!(first, 2);
    }

    #[test]
    fn single_run_is_its_own_median() {
        let runs = runs(&[7]);
        assert_eq!(select_representative(&runs).expect("rep").index, 0);
    }

    #[test]
    fn empty_input_is_an_error() {
        let err = select_representative(&[]).expect_err("empty");
        assert!(matches!(err, FlameError::EmptyInput));
    }
}
