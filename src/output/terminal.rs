//! Terminal output formatting with colors and box drawing.

use colored::Colorize;

use crate::driver::{RunState, RunSummary};

/// Multipoles listed in the summary table before it is elided.
const MAX_TABLE_ROWS: usize = 12;

/// Format a run summary for human-readable terminal output.
pub fn format_summary(summary: &RunSummary) -> String {
    let mut output = String::new();

    let header = match (summary.state, summary.cancelled) {
        (RunState::Done, false) => format!("{} {}", "\u{2713}".green().bold(), "CHAIN COMPLETE".green().bold()),
        (RunState::Done, true) => format!("{} {}", "\u{25A0}".yellow().bold(), "CHAIN STOPPED".yellow().bold()),
        _ => format!("{} {}", "\u{2717}".red().bold(), "CHAIN FAILED".red().bold()),
    };

    output.push_str(&format_box_top());
    output.push_str(&format_box_line(&header));
    output.push_str(&format_box_separator());

    output.push_str(&format_box_line(&format!(
        "Job {}  data_seed {}  prior_seed {}  lmax {}",
        summary.jobid, summary.data_seed, summary.prior_seed, summary.lmax
    )));
    output.push_str(&format_box_line(&format!(
        "Iterations: {} (from {})  written: {}",
        summary.iterations_run, summary.first_iteration, summary.samples_written
    )));
    output.push_str(&format_box_line(&format!(
        "Precompute {:.2} s  per iteration {:.3} s  total {:.2} s",
        summary.precompute_seconds, summary.average_iteration_seconds, summary.total_seconds
    )));

    let problems = format!(
        "Non-converged: {}  clamped: {}  failed writes: {}",
        summary.nonconverged.len(),
        summary.clamped_draws,
        summary.failed_writes.len()
    );
    let clean = summary.nonconverged.is_empty() && summary.failed_writes.is_empty();
    output.push_str(&format_box_line(&if clean {
        problems.green().to_string()
    } else {
        problems.yellow().to_string()
    }));

    if !summary.spectrum.is_empty() {
        output.push_str(&format_box_separator());
        output.push_str(&format_box_line(
            &format!("{:>4} {:>12} {:>12} {:>7} {:>8}", "ell", "mean C_l", "std", "rho_1", "ESS")
                .bold()
                .to_string(),
        ));
        for row in summary.spectrum.iter().take(MAX_TABLE_ROWS) {
            let line = format!(
                "{:>4} {:>12.4e} {:>12.4e} {:>7.3} {:>8.1}",
                row.ell, row.mean, row.std_dev, row.autocorr_lag1, row.ess
            );
            output.push_str(&format_box_line(&line));
        }
        if summary.spectrum.len() > MAX_TABLE_ROWS {
            let more = format!("... {} more multipoles", summary.spectrum.len() - MAX_TABLE_ROWS);
            output.push_str(&format_box_line(&more.dimmed().to_string()));
        }
    }

    output.push_str(&format_box_bottom());
    output
}

// Box drawing helpers

const BOX_WIDTH: usize = 64;

fn format_box_top() -> String {
    format!("\u{250C}{}\u{2510}\n", "\u{2500}".repeat(BOX_WIDTH))
}

fn format_box_bottom() -> String {
    format!("\u{2514}{}\u{2518}\n", "\u{2500}".repeat(BOX_WIDTH))
}

fn format_box_separator() -> String {
    format!("\u{251C}{}\u{2524}\n", "\u{2500}".repeat(BOX_WIDTH))
}

fn format_box_line(content: &str) -> String {
    let visible_len = strip_ansi_codes(content).chars().count();
    let padding = (BOX_WIDTH - 2).saturating_sub(visible_len);
    format!("\u{2502} {}{} \u{2502}\n", content, " ".repeat(padding))
}

/// Strip ANSI escape codes for length calculation.
fn strip_ansi_codes(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use cl_sampler_core::statistics::EllSummary;

    fn summary(state: RunState, cancelled: bool, lmax: usize) -> RunSummary {
        RunSummary {
            jobid: 2,
            data_seed: 10,
            prior_seed: 20,
            lmax,
            state,
            first_iteration: 0,
            iterations_run: 20,
            samples_written: 20,
            failed_writes: vec![],
            nonconverged: vec![],
            clamped_draws: 0,
            cancelled,
            precompute_seconds: 1.25,
            average_iteration_seconds: 0.5,
            total_seconds: 11.25,
            final_cl: vec![1.0; lmax + 1],
            spectrum: (0..=lmax)
                .map(|ell| EllSummary {
                    ell,
                    mean: 100.0 / (ell + 1) as f64,
                    std_dev: 1.0,
                    autocorr_lag1: 0.1,
                    ess: 18.0,
                    count: 20,
                })
                .collect(),
        }
    }

    #[test]
    fn test_format_complete_run() {
        let output = format_summary(&summary(RunState::Done, false, 4));
        assert!(output.contains("CHAIN COMPLETE"));
        assert!(output.contains("Iterations: 20"));
        assert!(output.contains("1.0000e2"));
    }

    #[test]
    fn test_format_stopped_and_failed() {
        assert!(format_summary(&summary(RunState::Done, true, 2)).contains("CHAIN STOPPED"));
        assert!(format_summary(&summary(RunState::Failed, false, 2)).contains("CHAIN FAILED"));
    }

    #[test]
    fn test_long_spectrum_is_elided() {
        let output = format_summary(&summary(RunState::Done, false, 20));
        assert!(output.contains("9 more multipoles"));
    }

    #[test]
    fn test_lines_have_equal_width() {
        colored::control::set_override(false);
        let output = format_summary(&summary(RunState::Done, false, 3));
        let widths: Vec<usize> = output.lines().map(|l| l.chars().count()).collect();
        assert!(widths.iter().all(|&w| w == BOX_WIDTH + 2));
    }

    #[test]
    fn test_strip_ansi_codes() {
        assert_eq!(strip_ansi_codes("\x1b[32mgreen\x1b[0m"), "green");
    }
}
