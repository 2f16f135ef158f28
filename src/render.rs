use itertools::Itertools;
use std::collections::BTreeMap;

use crate::metrics::{PipelineMetrics, Stage};
use crate::models::Review;
use crate::themes::themes_display;

/// Human-readable run summary: per-bank counts, theme distribution, and the
/// headline stage counters.
pub fn render_summary(reviews: &[Review], metrics: &PipelineMetrics) -> String {
    let mut md = String::new();
    md.push_str("# Review Pipeline Summary\n\n");

    md.push_str("## Reviews per bank\n");
    let mut bank_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for r in reviews {
        *bank_counts.entry(r.bank.as_str()).or_insert(0) += 1;
    }
    for (bank, count) in &bank_counts {
        md.push_str(&format!("- {}: {} reviews\n", bank, count));
    }
    md.push_str(&format!("- Total: {} reviews\n\n", reviews.len()));

    md.push_str("## Theme distribution\n");
    for bank in bank_counts.keys() {
        md.push_str(&format!("**{}**\n", bank));
        let counts = reviews
            .iter()
            .filter(|r| r.bank == *bank)
            .flat_map(|r| themes_display(r).split(';').map(str::to_string).collect::<Vec<_>>())
            .counts();
        for (theme, count) in counts.iter().sorted_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0))) {
            md.push_str(&format!("- {}: {}\n", theme, count));
        }
        md.push('\n');
    }

    md.push_str("## Stage counters\n");
    md.push_str(&format!(
        "- duplicates removed: {}\n- rows repaired: {}\n- rows dropped (repair): {}\n- rows dropped (dates): {}\n- translated: {}\n- translation fallbacks: {}\n",
        metrics.get(Stage::Dedup, "removed"),
        metrics.get(Stage::Repair, "repaired"),
        metrics.get(Stage::Repair, "dropped"),
        metrics.get(Stage::DateNormalize, "dropped"),
        metrics.get(Stage::Translate, "translated"),
        metrics.get(Stage::Translate, "fallback_original"),
    ));

    md
}
