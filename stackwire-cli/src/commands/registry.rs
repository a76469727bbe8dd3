//! `stackwire registry` commands for inspecting and repairing entries.

use anyhow::{bail, Result};
use colored::Colorize;
use stackwire_core::{registry, Config, Registry, RegistryEntry, RegistryKey};
use std::time::SystemTime;
use tabled::{settings::Style, Table, Tabled};

const OPERATOR: &str = "operator";

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "KEY")]
    key: String,
    #[tabled(rename = "VALUE")]
    value: String,
    #[tabled(rename = "KIND")]
    kind: String,
    #[tabled(rename = "OWNER")]
    owner: String,
    #[tabled(rename = "UPDATED")]
    updated: String,
}

pub async fn get(config: &Config, environment: &str, key: &str) -> Result<()> {
    let key = RegistryKey::parse(key)?;
    let registry = registry::open(config, environment).await?;
    println!("{}", registry.get(&key).await?);
    Ok(())
}

/// Write an entry by hand. Entries written here are owned by the operator,
/// not by any stack.
pub async fn put(
    config: &Config,
    environment: &str,
    key: &str,
    values: &[String],
    list: bool,
) -> Result<()> {
    let key = RegistryKey::parse(key)?;
    let entry = if list {
        RegistryEntry::list(key, values)?
    } else {
        match values {
            [value] => RegistryEntry::scalar(key, value.as_str()),
            _ => bail!("Expected a single value; pass --list to store {} items", values.len()),
        }
    };

    let registry = registry::open(config, environment).await?;
    let key = entry.key.clone();
    registry.put_entry(entry.owned_by(OPERATOR)).await?;
    println!("{} {} written", "✓".green().bold(), key);
    Ok(())
}

pub async fn list(config: &Config, environment: &str, prefix: &str) -> Result<()> {
    let registry = registry::open(config, environment).await?;
    let entries = registry.list(prefix).await?;

    if entries.is_empty() {
        println!("No entries under {}", prefix);
        return Ok(());
    }

    let now = SystemTime::now();
    let rows: Vec<EntryRow> = entries
        .into_iter()
        .map(|entry| EntryRow {
            key: entry.key.to_string(),
            value: entry.value,
            kind: entry.kind.to_string(),
            owner: entry.owner.unwrap_or_else(|| "-".to_string()),
            updated: format_age(now, entry.updated_at),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{}", table);

    Ok(())
}

/// Remove an entry. Consumers of the key fail (hard) or skip it (soft) on
/// their next deployment.
pub async fn rm(config: &Config, environment: &str, key: &str) -> Result<()> {
    let key = RegistryKey::parse(key)?;
    let registry = registry::open(config, environment).await?;

    if registry.delete(&key).await? {
        println!("{} {} removed", "✓".green().bold(), key);
    } else {
        println!("{} {} was not set", "-".dimmed(), key);
    }
    Ok(())
}

fn format_age(now: SystemTime, then: SystemTime) -> String {
    let Ok(age) = now.duration_since(then) else {
        return "just now".to_string();
    };
    let secs = age.as_secs();
    match secs {
        0..=59 => format!("{}s ago", secs),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86399 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86400),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_format_age() {
        let now = SystemTime::now();
        assert_eq!(format_age(now, now - Duration::from_secs(5)), "5s ago");
        assert_eq!(format_age(now, now - Duration::from_secs(120)), "2m ago");
        assert_eq!(format_age(now, now - Duration::from_secs(7200)), "2h ago");
        assert_eq!(format_age(now, now - Duration::from_secs(172800)), "2d ago");
        assert_eq!(format_age(now, now + Duration::from_secs(10)), "just now");
    }
}
