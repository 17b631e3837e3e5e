//! Rendering: severity-colored diagnostics to stderr and an `indicatif`
//! progress bar across compilation units — a plain batch-compiler summary,
//! not an interactive menu ("a human-readable summary ... diagnostics are
//! emitted in source order, grouped by file").

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use nestml_core::{Diagnostic, DiagnosticSummary, Severity};

use crate::pipeline::UnitReport;

/// A progress bar tracking one tick per compilation unit, styled the way
/// this workspace has always styled them.
pub fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("█▓░"),
    );
    pb
}

/// Print one unit's diagnostics, in the order C1-C8 produced them, each
/// colored by severity.
pub fn render_unit(report: &UnitReport) {
    for diagnostic in &report.diagnostics {
        eprintln!("{}: {}", report.file.display().to_string().dimmed(), render_diagnostic(diagnostic));
    }
}

fn render_diagnostic(diagnostic: &Diagnostic) -> String {
    let severity = match diagnostic.severity {
        Severity::Info => "INFO".blue(),
        Severity::Warn => "WARN".yellow(),
        Severity::Error => "ERROR".red(),
        Severity::Fatal => "FATAL".red().bold(),
    };
    format!("[{severity}] {} ({}): {}", diagnostic.code, diagnostic.range, diagnostic.message)
}

/// The one-line tally printed after every unit has been rendered.
pub fn render_summary(summary: &DiagnosticSummary) {
    let line = format!(
        "{} info, {} warn, {} error, {} fatal ({} total)",
        summary.info,
        summary.warn,
        summary.error,
        summary.fatal,
        summary.total()
    );
    if summary.fatal > 0 || summary.error > 0 {
        eprintln!("{}", line.red());
    } else if summary.warn > 0 {
        eprintln!("{}", line.yellow());
    } else {
        eprintln!("{}", line.green());
    }
}
