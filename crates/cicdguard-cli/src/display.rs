use cicdguard_core::ingest::IngestReport;
use cicdguard_core::report::{ScanReport, VulnerabilityRow};
use cicdguard_core::rules::Severity;
use cicdguard_core::Platform;
use colored::*;

/// Print the counters of one ingestion pass.
pub fn print_ingest_summary(target: &str, report: &IngestReport) {
    println!();
    println!(
        "{}",
        format!(" cicdguard v{} — Scanned {}", env!("CARGO_PKG_VERSION"), target).bold()
    );
    println!();
    println!(" {}", "Summary".bold().underline());
    println!(" {} Nodes written:      {}", "|-".dimmed(), report.nodes_written);
    println!(" {} Edges created:      {}", "|-".dimmed(), report.edges_created);
    println!(
        " {} Findings recorded:  {}",
        "|-".dimmed(),
        if report.findings_recorded > 0 {
            report.findings_recorded.to_string().red().bold().to_string()
        } else {
            "0".to_string()
        }
    );
    println!(" {} Skipped:            {}", "|-".dimmed(), report.skipped);

    if !report.problems.is_empty() {
        println!();
        println!(" {}", "Problems".bold().underline());
        for problem in &report.problems {
            println!(" {} {}", "!".yellow().bold(), problem);
        }
    }
    println!();
}

fn severity_label(severity: Option<Severity>) -> ColoredString {
    match severity {
        Some(Severity::Critical) => "CRITICAL".red().bold(),
        Some(Severity::High) => "HIGH".red(),
        Some(Severity::Medium) => "MEDIUM".yellow(),
        Some(Severity::Low) => "LOW".blue(),
        Some(Severity::Info) => "INFO".white(),
        None => "UNKNOWN".dimmed(),
    }
}

fn print_row(row: &VulnerabilityRow) {
    println!(
        " {} [{}] {}",
        row.vuln_id.bold(),
        severity_label(row.severity),
        row.title
    );
    println!("   {} {}", "|".dimmed(), row.description);
    println!("   {} Technology: {}", "|".dimmed(), row.technology.cyan());
    println!("   {} Artifact:   {}", "|".dimmed(), row.artifact);
    if !row.further_read.is_empty() {
        println!("   {} Read more:  {}", "|".dimmed(), row.further_read.dimmed());
    }
}

/// Print the vulnerability table.
pub fn print_vulnerabilities(report: &ScanReport) {
    println!();
    println!(
        "{}",
        format!(
            " cicdguard v{} — {} nodes, {} edges",
            env!("CARGO_PKG_VERSION"),
            report.total_nodes,
            report.total_edges
        )
        .bold()
    );
    println!();
    println!(" {}", "=".repeat(60).dimmed());
    println!();

    if report.rows.is_empty() {
        println!(" {} No vulnerabilities recorded.", "OK".green().bold());
    } else {
        for row in &report.rows {
            print_row(row);
            println!();
        }
    }

    println!(" {}", "=".repeat(60).dimmed());
    println!();

    let counts = &report.severity_counts;
    println!(
        " {} Findings: {} critical, {} high, {} medium, {} low, {} info",
        "|-".dimmed(),
        if counts.critical > 0 {
            counts.critical.to_string().red().bold().to_string()
        } else {
            "0".to_string()
        },
        if counts.high > 0 {
            counts.high.to_string().yellow().bold().to_string()
        } else {
            "0".to_string()
        },
        counts.medium,
        counts.low,
        counts.info,
    );
    if counts.unknown > 0 {
        println!(" {} Unknown rule IDs: {}", "|-".dimmed(), counts.unknown);
    }
    println!(
        " {} Generated at {}",
        "|-".dimmed(),
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();
}

pub fn print_reset(platform: Platform, removed: usize) {
    println!(
        " {} Removed {} {} node(s)",
        "OK".green().bold(),
        removed,
        platform.name().cyan()
    );
}
