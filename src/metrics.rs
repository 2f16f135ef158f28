use serde::Serialize;
use std::collections::BTreeMap;

/// Pipeline stages, used as metric keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Dedup,
    Repair,
    DateNormalize,
    Balance,
    Translate,
    Clean,
    Keywords,
    Themes,
}

/// Structured counter sink passed explicitly into each stage, replacing
/// ad-hoc prints. Serialized to metrics.json at the end of a run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct PipelineMetrics {
    counters: BTreeMap<Stage, BTreeMap<&'static str, u64>>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&mut self, stage: Stage, counter: &'static str, n: u64) {
        *self
            .counters
            .entry(stage)
            .or_default()
            .entry(counter)
            .or_insert(0) += n;
    }

    pub fn get(&self, stage: Stage, counter: &str) -> u64 {
        self.counters
            .get(&stage)
            .and_then(|m| m.get(counter))
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_per_stage() {
        let mut m = PipelineMetrics::new();
        m.incr(Stage::Dedup, "removed", 3);
        m.incr(Stage::Dedup, "removed", 2);
        m.incr(Stage::Repair, "dropped", 1);
        assert_eq!(m.get(Stage::Dedup, "removed"), 5);
        assert_eq!(m.get(Stage::Repair, "dropped"), 1);
        assert_eq!(m.get(Stage::Repair, "repaired"), 0);
    }
}
