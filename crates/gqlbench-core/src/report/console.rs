use crate::engine::evaluation::{LevelSummary, RunSummary};

pub fn print_level_summary(s: &LevelSummary) {
    eprintln!("\n{}", "=".repeat(40));
    eprintln!("Results for {}:", s.level);
    eprintln!("  - Samples    : {}", s.samples);
    eprintln!("  - EA (Acc)   : {:.2}%", s.accuracy * 100.0);
    eprintln!(
        "  - EA (valid) : {:.2}%  ({} gold failures)",
        s.accuracy_excluding_gold_failures * 100.0,
        s.gold_failures
    );
    if s.skipped > 0 || s.pred_failures > 0 {
        eprintln!(
            "  - Skipped    : {}  Pred errors: {}",
            s.skipped, s.pred_failures
        );
    }
    for (name, value) in &s.metrics {
        eprintln!("  - {:<11}: {}", name, value);
    }
}

pub fn print_run_summary(summary: &RunSummary) {
    let took = summary.finished_at - summary.started_at;
    eprintln!("\n{}", "=".repeat(40));
    eprintln!(
        "Evaluation finished on graph '{}' ({} comparison, {:.1}s)",
        summary.graph,
        summary.comparison,
        took.num_milliseconds() as f64 / 1000.0
    );
    eprintln!("{:<20} {:>8} {:>8} {:>9}", "level", "samples", "correct", "accuracy");
    for l in &summary.levels {
        eprintln!(
            "{:<20} {:>8} {:>8} {:>8.2}%",
            l.level,
            l.samples,
            l.correct,
            l.accuracy * 100.0
        );
    }
}
