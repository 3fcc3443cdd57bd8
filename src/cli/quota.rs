//! Quota status and reset command handler.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};

use chatgate::config::Config;
use chatgate::quota::{DeviceUsage, QuotaStore};

use super::QuotaSubcommand;

/// Handle `chatgate quota` subcommands.
pub(crate) fn cmd_quota(config: &Config, action: QuotaSubcommand) -> Result<()> {
    let path = config.quota.resolved_db_path();
    let store = QuotaStore::open(&path, config.quota.daily_limit)
        .with_context(|| format!("Failed to open quota store: {}", path.display()))?;
    let today = Utc::now().date_naive();

    match action {
        QuotaSubcommand::Status { device_id } => {
            let rows: Vec<DeviceUsage> = match device_id {
                Some(id) => store.usage(&id)?.into_iter().collect(),
                None => store.snapshot()?,
            };
            print!("{}", format_status(&rows, store.daily_limit(), today));
        }
        QuotaSubcommand::Reset { device_id } => match device_id {
            Some(id) => {
                if store.reset_device(&id)? {
                    println!("Reset quota usage for: {}", id);
                } else {
                    println!("No quota usage recorded for: {}", id);
                }
            }
            None => {
                let removed = store.reset_all()?;
                println!("Reset quota usage for {} device(s).", removed);
            }
        },
    }

    Ok(())
}

/// Render a usage table. Counters from an earlier day count as zero today.
fn format_status(rows: &[DeviceUsage], daily_limit: u32, today: NaiveDate) -> String {
    if rows.is_empty() {
        return "No quota usage recorded.\n".to_string();
    }

    let mut out = format!(
        "{:<38} {:<8} {:<10} {:<12}\n",
        "Device", "Today", "Remaining", "Last Request"
    );
    out.push_str(&"-".repeat(70));
    out.push('\n');

    for usage in rows {
        let used = if usage.last_request_date == today {
            usage.request_count
        } else {
            0
        };
        out.push_str(&format!(
            "{:<38} {:<8} {:<10} {:<12}\n",
            usage.device_id,
            used,
            daily_limit.saturating_sub(used),
            usage.last_request_date,
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn test_quota_status_empty() {
        let dir = TempDir::new().unwrap();
        let store = QuotaStore::open(&dir.path().join("quota.db"), 10).unwrap();
        let rows = store.snapshot().unwrap();
        assert_eq!(format_status(&rows, 10, day(1)), "No quota usage recorded.\n");
    }

    #[test]
    fn test_quota_status_counts_only_today() {
        let dir = TempDir::new().unwrap();
        let store = QuotaStore::open(&dir.path().join("quota.db"), 10).unwrap();
        for _ in 0..3 {
            store.check_and_increment("today-device", day(2)).unwrap();
        }
        store.check_and_increment("stale-device", day(1)).unwrap();

        let text = format_status(&store.snapshot().unwrap(), 10, day(2));
        let today_line = text.lines().find(|l| l.starts_with("today-device")).unwrap();
        let stale_line = text.lines().find(|l| l.starts_with("stale-device")).unwrap();
        let today_cols: Vec<_> = today_line.split_whitespace().collect();
        let stale_cols: Vec<_> = stale_line.split_whitespace().collect();
        assert_eq!(&today_cols[1..3], ["3", "7"]);
        assert_eq!(&stale_cols[1..3], ["0", "10"]);
    }

    #[test]
    fn test_quota_reset_device_via_command() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quota.db");
        {
            let store = QuotaStore::open(&path, 10).unwrap();
            store.check_and_increment("abc", Utc::now().date_naive()).unwrap();
            store.check_and_increment("xyz", Utc::now().date_naive()).unwrap();
        }

        let mut config = Config::default();
        config.quota.db_path = Some(path.clone());
        cmd_quota(
            &config,
            QuotaSubcommand::Reset {
                device_id: Some("abc".into()),
            },
        )
        .unwrap();

        let store = QuotaStore::open(&path, 10).unwrap();
        assert!(store.usage("abc").unwrap().is_none());
        assert!(store.usage("xyz").unwrap().is_some());
    }

    #[test]
    fn test_quota_reset_matches_device_id_exactly() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quota.db");
        {
            let store = QuotaStore::open(&path, 10).unwrap();
            store.check_and_increment("abc", day(1)).unwrap();
        }

        let mut config = Config::default();
        config.quota.db_path = Some(path.clone());
        cmd_quota(
            &config,
            QuotaSubcommand::Reset {
                device_id: Some(" abc ".into()),
            },
        )
        .unwrap();

        let store = QuotaStore::open(&path, 10).unwrap();
        assert!(store.usage("abc").unwrap().is_some());
    }

    #[test]
    fn test_quota_reset_all_via_command() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quota.db");
        {
            let store = QuotaStore::open(&path, 10).unwrap();
            store.check_and_increment("abc", day(1)).unwrap();
            store.check_and_increment("xyz", day(1)).unwrap();
        }

        let mut config = Config::default();
        config.quota.db_path = Some(path.clone());
        cmd_quota(&config, QuotaSubcommand::Reset { device_id: None }).unwrap();

        let store = QuotaStore::open(&path, 10).unwrap();
        assert!(store.snapshot().unwrap().is_empty());
    }
}
