// src/report/aggregator.rs

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::debug;

use crate::errors::AggregationError;
use crate::report::fragment::{CoverageRecord, Metric, ReportFragment};
use crate::types::ModuleId;

/// Covered/missed counter pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counter {
    pub covered: u64,
    pub missed: u64,
}

impl Counter {
    pub fn total(&self) -> u64 {
        self.covered + self.missed
    }

    /// Covered fraction in `[0, 1]`; 0 for an empty counter.
    pub fn ratio(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.covered as f64 / total as f64,
        }
    }

    fn add(&mut self, other: Counter) {
        self.covered += other.covered;
        self.missed += other.missed;
    }

    /// Merge two observations of the same range: the larger total wins and
    /// a unit covered by either side counts as covered.
    fn union(self, other: Counter) -> Counter {
        let total = self.total().max(other.total());
        let covered = self.covered.max(other.covered).min(total);
        Counter {
            covered,
            missed: total - covered,
        }
    }
}

impl From<&CoverageRecord> for Counter {
    fn from(record: &CoverageRecord) -> Self {
        Counter {
            covered: record.covered,
            missed: record.missed,
        }
    }
}

pub type MetricTotals = BTreeMap<Metric, Counter>;

/// Merged coverage of a build.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregatedReport {
    /// Totals per metric across all modules.
    pub totals: MetricTotals,
    pub modules: BTreeMap<ModuleId, MetricTotals>,
    pub sources: BTreeMap<String, MetricTotals>,
    /// Number of fragments merged.
    pub fragments: usize,
}

impl AggregatedReport {
    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }
}

#[derive(Debug, Default)]
struct AggregatorState {
    fragments: BTreeMap<ModuleId, Vec<ReportFragment>>,
    successes: usize,
}

/// Collects report fragments from finishing tasks and merges them.
///
/// `collect` and `record_success` may be called concurrently from task
/// runners; the mapping is guarded by a mutex and only ever appended to.
#[derive(Debug, Default)]
pub struct ReportAggregator {
    state: Mutex<AggregatorState>,
}

type RangeKey = (Metric, String, u32, u32);

impl ReportAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, AggregatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn collect(&self, fragment: ReportFragment) {
        debug!(
            module = %fragment.module,
            task = %fragment.task,
            records = fragment.records.len(),
            "report fragment collected"
        );
        self.state()
            .fragments
            .entry(fragment.module.clone())
            .or_default()
            .push(fragment);
    }

    /// Note that a task completed successfully.
    pub fn record_success(&self) {
        self.state().successes += 1;
    }

    pub fn fragment_count(&self) -> usize {
        self.state().fragments.values().map(Vec::len).sum()
    }

    pub fn success_count(&self) -> usize {
        self.state().successes
    }

    /// Merge every collected fragment.
    ///
    /// Records sharing `(metric, source, start, end)` are unioned before
    /// summing, so a range reported by several tasks counts once. Calling
    /// this repeatedly gives the same result.
    pub fn merge(&self) -> Result<AggregatedReport, AggregationError> {
        let state = self.state();
        let fragment_count: usize = state.fragments.values().map(Vec::len).sum();
        if fragment_count == 0 && state.successes == 0 {
            return Err(AggregationError::NoFragments);
        }

        let mut report = AggregatedReport {
            fragments: fragment_count,
            ..AggregatedReport::default()
        };
        let mut global: HashMap<RangeKey, Counter> = HashMap::new();

        for (module, fragments) in &state.fragments {
            let mut ranges: HashMap<RangeKey, Counter> = HashMap::new();
            for record in fragments.iter().flat_map(|f| &f.records) {
                let key = (record.metric, record.source.clone(), record.start, record.end);
                let counter = Counter::from(record);
                ranges
                    .entry(key.clone())
                    .and_modify(|c| *c = c.union(counter))
                    .or_insert(counter);
                global
                    .entry(key)
                    .and_modify(|c| *c = c.union(counter))
                    .or_insert(counter);
            }

            let totals = report.modules.entry(module.clone()).or_default();
            for ((metric, _, _, _), counter) in &ranges {
                totals.entry(*metric).or_default().add(*counter);
            }
        }

        for ((metric, source, _, _), counter) in &global {
            report.totals.entry(*metric).or_default().add(*counter);
            report
                .sources
                .entry(source.clone())
                .or_default()
                .entry(*metric)
                .or_default()
                .add(*counter);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(module: &str, records: Vec<CoverageRecord>) -> ReportFragment {
        ReportFragment::new(ModuleId::new(module).task("test"), records)
    }

    #[test]
    fn overlapping_ranges_are_unioned() {
        let agg = ReportAggregator::new();
        agg.collect(fragment(
            "core",
            vec![CoverageRecord::new(Metric::Line, "A.java", (1, 5), 3, 2)],
        ));
        agg.collect(fragment(
            "core",
            vec![
                CoverageRecord::new(Metric::Line, "A.java", (1, 5), 4, 1),
                CoverageRecord::new(Metric::Line, "B.java", (1, 2), 0, 2),
            ],
        ));

        let report = agg.merge().unwrap();
        assert_eq!(report.fragments, 2);
        assert_eq!(report.totals[&Metric::Line], Counter { covered: 4, missed: 3 });
        assert_eq!(
            report.sources["A.java"][&Metric::Line],
            Counter { covered: 4, missed: 1 }
        );
    }

    #[test]
    fn merge_is_idempotent() {
        let agg = ReportAggregator::new();
        agg.collect(fragment(
            "api",
            vec![CoverageRecord::new(Metric::Branch, "Api.java", (3, 9), 1, 3)],
        ));
        assert_eq!(agg.merge().unwrap(), agg.merge().unwrap());
    }

    #[test]
    fn nothing_to_merge() {
        let agg = ReportAggregator::new();
        assert_eq!(agg.merge(), Err(AggregationError::NoFragments));

        agg.record_success();
        let report = agg.merge().unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn ratio_of_empty_counter_is_zero() {
        assert_eq!(Counter::default().ratio(), 0.0);
        assert_eq!(Counter { covered: 1, missed: 3 }.ratio(), 0.25);
    }
}
