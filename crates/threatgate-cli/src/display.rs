use colored::*;
use threatgate_core::gate::GateReport;
use threatgate_core::posture::{Insights, PostureGrade};
use threatgate_core::register::Severity;
use threatgate_core::report::violation_line;
use threatgate_core::triage::{ScanSeverity, TriageSummary};

/// Print a gate report to the terminal.
pub fn print_gate_report(report: &GateReport) {
    println!();
    println!(
        "{}",
        format!(
            " threatgate v{} — Checking {}",
            env!("CARGO_PKG_VERSION"),
            report.source_file
        )
        .bold()
    );
    println!();

    println!(" {}", "Register".bold().underline());
    println!(" {} {} threats", "|-".dimmed(), report.total_threats);
    println!(
        " {} Open: {} critical, {} high, {} medium, {} low",
        "|-".dimmed(),
        count(report.open_count(Severity::Critical), Severity::Critical),
        count(report.open_count(Severity::High), Severity::High),
        report.open_count(Severity::Medium),
        report.open_count(Severity::Low),
    );
    println!();

    if report.passed {
        println!(
            " {} Threat model validation passed: no open high/critical risks found.",
            "PASS".green().bold()
        );
        println!();
        return;
    }

    println!(
        " {} High/Critical threats still Open in {}",
        " FAIL ".on_red().white().bold(),
        report.source_file
    );
    println!();
    for violation in &report.violations {
        let tag = severity_tag(violation.severity);
        println!(" {} {}", tag, violation_line(violation));
        if let Some(stride) = violation.stride {
            println!("   {} STRIDE: {}", "|".dimmed(), stride.label().dimmed());
        }
    }
    println!();
    println!(
        " Result: {} ({} blocking)",
        "FAIL".red().bold(),
        report.violations.len()
    );
    println!();
}

fn severity_tag(severity: Severity) -> String {
    let symbol = format!(" {} ", severity.symbol());
    match severity {
        Severity::Critical => symbol.on_red().white().bold().to_string(),
        Severity::High => symbol.on_yellow().black().bold().to_string(),
        Severity::Medium => symbol.on_blue().white().bold().to_string(),
        Severity::Low => symbol.dimmed().to_string(),
    }
}

fn count(n: usize, severity: Severity) -> String {
    if n == 0 {
        return "0".to_string();
    }
    match severity {
        Severity::Critical => n.to_string().red().bold().to_string(),
        Severity::High => n.to_string().yellow().bold().to_string(),
        _ => n.to_string(),
    }
}

/// Print the triage table to the terminal.
pub fn print_triage(summary: &TriageSummary) {
    println!();
    println!("{}", " threatgate Security Triage".bold());
    println!();

    println!(
        " {:<10} {:>8} {:>6} {:>6} {:>5} {:>5}",
        "Tool".bold(),
        "CRITICAL",
        "HIGH",
        "MEDIUM",
        "LOW",
        "INFO"
    );
    for row in &summary.by_tool {
        let name = if row.found {
            row.tool.label().to_string()
        } else {
            format!("{}", row.tool.label().dimmed())
        };
        println!(
            " {:<10} {:>8} {:>6} {:>6} {:>5} {:>5}",
            name,
            row.counts.get(ScanSeverity::Critical),
            row.counts.get(ScanSeverity::High),
            row.counts.get(ScanSeverity::Medium),
            row.counts.get(ScanSeverity::Low),
            row.counts.get(ScanSeverity::Info),
        );
    }
    println!(" {}", "=".repeat(48).dimmed());

    let totals = summary.totals();
    println!(
        " {:<10} {:>8} {:>6} {:>6} {:>5} {:>5}",
        "Total".bold(),
        totals.critical,
        totals.high,
        totals.medium,
        totals.low,
        totals.info
    );
    println!();

    if !summary.highlights.is_empty() {
        println!(" {}", "High-Risk Highlights".bold().underline());
        for h in summary.highlights.iter().take(10) {
            println!(" {} {}", "|-".dimmed(), h);
        }
        if summary.highlights.len() > 10 {
            println!(
                " {} ... and {} more",
                "|-".dimmed(),
                summary.highlights.len() - 10
            );
        }
        println!();
    }
}

/// Print the posture score.
pub fn print_insights(insights: &Insights) {
    let grade = match insights.grade {
        PostureGrade::Excellent => insights.grade.label().green().bold(),
        PostureGrade::Good => insights.grade.label().green(),
        PostureGrade::NeedsAttention => insights.grade.label().yellow().bold(),
        PostureGrade::Poor => insights.grade.label().red().bold(),
    };

    println!();
    println!(" {}", "Security Posture".bold().underline());
    println!(
        " {} Score: {}/100 ({})",
        "|-".dimmed(),
        insights.score.to_string().bold(),
        grade
    );
    println!(
        " {} Findings: {} critical, {} high, {} medium, {} low, {} info",
        "|-".dimmed(),
        insights.counts.critical,
        insights.counts.high,
        insights.counts.medium,
        insights.counts.low,
        insights.counts.info
    );

    let len = insights.history.len();
    if len >= 2 {
        let prev = insights.history[len - 2].score as i64;
        let delta = insights.score as i64 - prev;
        let delta_str = match delta {
            d if d > 0 => format!("+{}", d).green().to_string(),
            d if d < 0 => d.to_string().red().to_string(),
            _ => "±0".dimmed().to_string(),
        };
        println!(
            " {} Change since last run: {}",
            "|-".dimmed(),
            delta_str
        );
    }
    println!();
}
