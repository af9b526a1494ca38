use anyhow::{Result, bail};
use chrono::{Local, TimeDelta};

use healthdump_core::service::HealthService;

use super::helpers::{print_goals_table, print_json};

pub(crate) fn cmd_goals(svc: &HealthService, days: i64, json: bool) -> Result<()> {
    if days <= 0 {
        bail!("--days must be positive");
    }
    let goals = svc.goals(days)?;

    if json {
        return print_json(&goals);
    }
    let since = TimeDelta::try_days(days)
        .and_then(|span| Local::now().date_naive().checked_sub_signed(span));
    match since {
        Some(since) => println!("Goals from the average since {since} ({days} days)\n"),
        None => println!("Goals from the average of every stored day\n"),
    }
    print_goals_table(&goals);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goals_accepts_huge_window() {
        let svc = HealthService::new_in_memory().unwrap();
        assert!(cmd_goals(&svc, 100_000_000, false).is_ok());
        assert!(cmd_goals(&svc, i64::MAX, true).is_ok());
        assert!(cmd_goals(&svc, 0, false).is_err());
    }
}
