//! Prometheus text exposition format.
//!
//! Renders outcome samples into the Prometheus text exposition format
//! for scraping by a Prometheus server or compatible agent.

use crate::collector::{ERROR_OUTCOME, OutcomeSample};

/// Render outcome samples into Prometheus text format.
///
/// Applied actions and skips go to `pinwheel_reconcile_outcomes_total`;
/// errors go to `pinwheel_reconcile_errors_total` labelled by kind.
pub fn render_prometheus(samples: &[OutcomeSample]) -> String {
    let mut out = String::new();

    out.push_str("# HELP pinwheel_reconcile_outcomes_total Publish events handled, by outcome.\n");
    out.push_str("# TYPE pinwheel_reconcile_outcomes_total counter\n");
    for s in samples.iter().filter(|s| s.outcome != ERROR_OUTCOME) {
        out.push_str(&format!(
            "pinwheel_reconcile_outcomes_total{{outcome=\"{}\",reason=\"{}\"}} {}\n",
            s.outcome, s.reason, s.count
        ));
    }

    out.push_str("# HELP pinwheel_reconcile_errors_total Publish events that failed, by error kind.\n");
    out.push_str("# TYPE pinwheel_reconcile_errors_total counter\n");
    for s in samples.iter().filter(|s| s.outcome == ERROR_OUTCOME) {
        out.push_str(&format!(
            "pinwheel_reconcile_errors_total{{kind=\"{}\"}} {}\n",
            s.reason, s.count
        ));
    }

    out
}
