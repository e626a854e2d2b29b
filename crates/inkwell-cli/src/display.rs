//! Display utilities for CLI output
//!
//! Colored output for entries, drafts and sync results.

use chrono::{Local, TimeZone};
use colored::*;

use inkwell_core::{Draft, EntryFields, Version};
use inkwell_sync::SyncReport;

/// Print success message
pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Print error message
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg);
}

/// Print info message
pub fn print_info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print warning message
pub fn print_warning(msg: &str) {
    println!("{} {}", "!".yellow().bold(), msg);
}

fn format_millis(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(time) => time.format("%Y-%m-%d %H:%M").to_string(),
        None => format!("{}ms", millis),
    }
}

fn title_or_placeholder(fields: &EntryFields) -> ColoredString {
    if fields.title.is_empty() {
        "(untitled)".dimmed().italic()
    } else {
        fields.title.yellow()
    }
}

fn print_fields(fields: &EntryFields) {
    println!("{}: {}", "Title".bold(), title_or_placeholder(fields));
    println!("{}: {}", "Date".dimmed(), fields.date);
    if let Some(location) = &fields.location {
        let place = location
            .place_name
            .clone()
            .unwrap_or_else(|| format!("{:.4}, {:.4}", location.latitude, location.longitude));
        println!("{}: {}", "Place".dimmed(), place);
    }
    if let Some(weather) = &fields.weather {
        match weather.temperature_celsius {
            Some(celsius) => println!(
                "{}: {}, {:.1}°C",
                "Weather".dimmed(),
                weather.condition,
                celsius
            ),
            None => println!("{}: {}", "Weather".dimmed(), weather.condition),
        }
    }
    println!();
    if fields.content.is_empty() {
        println!("{}", "(empty)".dimmed().italic());
    } else {
        println!("{}", fields.content);
    }
}

/// Print an entry version in detail
pub fn print_version(version: &Version) {
    println!("{}", "─".repeat(50).dimmed());
    print_fields(&version.fields);
    println!();
    println!("{}: {}", "Entry".dimmed(), version.diary_id);
    println!(
        "{}: {} ({})",
        "Version".dimmed(),
        version.id.short(),
        format_millis(version.created_at_millis)
    );
    println!("{}", "─".repeat(50).dimmed());
}

/// Print a draft in detail
pub fn print_draft(draft: &Draft) {
    println!("{}", "─".repeat(50).dimmed());
    print_fields(&draft.fields);
    println!();
    println!("{}: {}", "Entry".dimmed(), draft.diary_id);
    println!(
        "{}: {}",
        "Saved".dimmed(),
        format_millis(draft.updated_at_millis)
    );
    if let Some(seal) = draft.seal_info() {
        println!(
            "{}: {} (commits as {})",
            "Sealed".cyan(),
            format_millis(seal.sealed_at_millis),
            seal.pending_version_id.short()
        );
    }
    println!("{}", "─".repeat(50).dimmed());
}

/// Print live entries in list format
pub fn print_entry_list(versions: &[Version]) {
    if versions.is_empty() {
        println!("{}", "No entries yet. Write one with 'inkwell new'".dimmed());
        return;
    }

    println!("{}", format!("Entries ({}):", versions.len()).bold());
    for version in versions {
        let preview = version.fields.preview(40);
        println!(
            "  {} {} {} - {}",
            version.fields.date.to_string().cyan(),
            title_or_placeholder(&version.fields),
            format!("({})", version.diary_id.short()).dimmed(),
            preview.dimmed()
        );
    }
}

/// Print drafts in list format
pub fn print_draft_list(drafts: &[Draft]) {
    if drafts.is_empty() {
        println!("{}", "No drafts".dimmed());
        return;
    }

    println!("{}", format!("Drafts ({}):", drafts.len()).bold());
    for draft in drafts {
        let state = if draft.is_sealed() {
            "sealed".cyan()
        } else {
            "editing".yellow()
        };
        println!(
            "  {} {} {} [{}]",
            draft.fields.date.to_string().cyan(),
            title_or_placeholder(&draft.fields),
            format!("({})", draft.diary_id.short()).dimmed(),
            state
        );
    }
}

/// Print every version of an entry, oldest first
pub fn print_history(versions: &[Version]) {
    if versions.is_empty() {
        println!("{}", "No history".dimmed());
        return;
    }

    println!("{}", format!("History ({} versions):", versions.len()).bold());
    for (index, version) in versions.iter().enumerate() {
        let marker = if version.is_archived() {
            "deleted".red()
        } else {
            "edit".green()
        };
        println!(
            "  {} {} {} {} - {}",
            format!("[{}]", index + 1).cyan(),
            format_millis(version.created_at_millis),
            format!("({})", version.id.short()).dimmed(),
            marker,
            title_or_placeholder(&version.fields)
        );
    }
}

/// Print the outcome of a sync run
pub fn print_sync_report(report: &SyncReport) {
    print_success("Sync complete");
    if report.drafts_committed > 0 || report.drafts_failed > 0 {
        print_info(&format!(
            "Committed {} sealed drafts ({} failed)",
            report.drafts_committed, report.drafts_failed
        ));
    }
    print_info(&format!("Uploaded {} versions", report.versions_uploaded));
    print_info(&format!(
        "Peers: {} seen, {} imported, {} failed",
        report.peers_seen, report.peers_imported, report.peers_failed
    ));
    print_info(&format!(
        "Merged {} new versions, {} entries changed",
        report.versions_imported, report.heads_changed
    ));
    if report.peers_failed > 0 {
        print_warning("Some peer streams could not be imported, run with -v for details");
    }
}
