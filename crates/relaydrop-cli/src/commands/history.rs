//! History command implementation.

use std::path::Path;

use anyhow::{Context, Result};

use relaydrop_core::file::format_bytes;
use relaydrop_core::history::{HistoryStore, TransferHistoryEntry};

use super::HistoryArgs;

/// Run the history command.
pub async fn run(args: HistoryArgs, config_path: Option<&Path>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let mut store =
        HistoryStore::load_with_config(config.history).context("Failed to load history")?;

    if args.clear {
        store.clear().context("Failed to clear history")?;
        println!("  Transfer history cleared.");
        return Ok(());
    }

    let entries = store.list(Some(args.limit));

    if args.json {
        let output = serde_json::json!({ "transfers": entries });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    display_entries(entries);
    Ok(())
}

fn display_entries(entries: &[TransferHistoryEntry]) {
    println!();
    println!("Recent Transfers:");
    println!("{}", "─".repeat(78));

    if entries.is_empty() {
        println!("  (no transfers recorded)");
        println!("{}", "─".repeat(78));
        return;
    }

    println!(
        "  {:<19} {:<9} {:<11} {:<20} {:>9} {:<9}",
        "Date", "Direction", "Peer", "File", "Size", "State"
    );
    for entry in entries {
        println!("  {}", table_row(entry));
        if let Some(error) = &entry.error_message {
            println!("      {error}");
        }
    }
    println!("{}", "─".repeat(78));
}

fn table_row(entry: &TransferHistoryEntry) -> String {
    format!(
        "{:<19} {:<9} {:<11} {:<20} {:>9} {:<9}",
        entry.formatted_timestamp(),
        entry.direction.to_string(),
        entry.peer.to_string(),
        truncate(&entry.file_name, 20),
        format_bytes(entry.size),
        entry.state.to_string(),
    )
}

fn truncate(name: &str, width: usize) -> String {
    if name.chars().count() <= width {
        return name.to_string();
    }
    let kept: String = name.chars().take(width.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaydrop_core::history::TransferDirection;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short.txt", 20), "short.txt");
        assert_eq!(truncate("a-very-long-file-name.tar.gz", 12), "a-very-lo...");
    }

    #[test]
    fn test_table_row() {
        let entry = TransferHistoryEntry::new(
            TransferDirection::Received,
            "User-00001".into(),
            "doc.pdf".to_string(),
            1536,
        );
        let row = table_row(&entry);
        assert!(row.contains("User-00001"));
        assert!(row.contains("doc.pdf"));
        assert!(row.contains("1.5 KB"));
    }
}
