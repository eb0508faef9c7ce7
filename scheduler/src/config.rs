//! TOML schedule configuration (§4.13): four cron triggers plus a
//! telegram-notifier toggle. `ScheduleConfig::default()` is the
//! disabled-mode fallback the scheduler falls back to when no config file
//! is present, so status/history/trigger calls still have something to
//! answer with.

use std::path::Path;

use serde::Deserialize;

use crate::errors::{Result, SchedulerError};

#[derive(Debug, Clone, Deserialize)]
pub struct DailyTrigger {
    #[serde(default)]
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
    #[serde(default = "default_true")]
    pub enrich: bool,
}

impl Default for DailyTrigger {
    fn default() -> Self {
        Self {
            hour: 1,
            minute: 0,
            enrich: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeeklyTrigger {
    /// ISO weekday, 1 (Monday) .. 7 (Sunday).
    #[serde(default = "default_weekly_day")]
    pub day: u32,
    #[serde(default)]
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
}

impl Default for WeeklyTrigger {
    fn default() -> Self {
        Self {
            day: default_weekly_day(),
            hour: 2,
            minute: 0,
        }
    }
}

fn default_weekly_day() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonthlyTrigger {
    #[serde(default = "default_monthly_day")]
    pub day: u32,
    #[serde(default)]
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
}

impl Default for MonthlyTrigger {
    fn default() -> Self {
        Self {
            day: default_monthly_day(),
            hour: 3,
            minute: 0,
        }
    }
}

fn default_monthly_day() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct YearlyTrigger {
    #[serde(default = "default_yearly_month")]
    pub month: u32,
    #[serde(default = "default_yearly_day")]
    pub day: u32,
    #[serde(default)]
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
}

impl Default for YearlyTrigger {
    fn default() -> Self {
        Self {
            month: default_yearly_month(),
            day: default_yearly_day(),
            hour: 4,
            minute: 0,
        }
    }
}

fn default_yearly_month() -> u32 {
    1
}

fn default_yearly_day() -> u32 {
    2
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramTrigger {
    #[serde(default)]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

fn default_timezone() -> String {
    "UTC".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub daily: DailyTrigger,
    #[serde(default)]
    pub weekly: WeeklyTrigger,
    #[serde(default)]
    pub monthly: MonthlyTrigger,
    #[serde(default)]
    pub yearly: YearlyTrigger,
    #[serde(default)]
    pub telegram: TelegramTrigger,
}

impl Default for ScheduleConfig {
    /// The disabled-mode fallback (§4.13): `enabled = false`, every other
    /// field at its documented default so a caller can still inspect the
    /// shape without a config file on disk.
    fn default() -> Self {
        Self {
            enabled: false,
            timezone: default_timezone(),
            daily: DailyTrigger::default(),
            weekly: WeeklyTrigger::default(),
            monthly: MonthlyTrigger::default(),
            yearly: YearlyTrigger::default(),
            telegram: TelegramTrigger::default(),
        }
    }
}

impl ScheduleConfig {
    pub async fn from_toml(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(SchedulerError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        toml::from_str(&raw).map_err(|source| SchedulerError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `sec min hour day-of-month month day-of-week` 6-field cron
    /// expression the `cron` crate parses, at second 0.
    pub fn daily_cron(&self) -> String {
        format!("0 {} {} * * *", self.daily.minute, self.daily.hour)
    }

    pub fn weekly_cron(&self) -> String {
        // `cron` numbers Sunday as 0; ISO weekday 7 (Sunday) maps to 0.
        let dow = self.weekly.day % 7;
        format!("0 {} {} * * {dow}", self.weekly.minute, self.weekly.hour)
    }

    pub fn monthly_cron(&self) -> String {
        format!("0 {} {} {} * *", self.monthly.minute, self.monthly.hour, self.monthly.day)
    }

    pub fn yearly_cron(&self) -> String {
        format!(
            "0 {} {} {} {} *",
            self.yearly.minute, self.yearly.hour, self.yearly.day, self.yearly.month
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_disabled() {
        let cfg = ScheduleConfig::default();
        assert!(!cfg.enabled);
        assert_eq!(cfg.timezone, "UTC");
    }

    #[test]
    fn parses_a_full_schedule() {
        let raw = r#"
            enabled = true
            timezone = "Asia/Seoul"

            [daily]
            hour = 1
            minute = 30

            [weekly]
            day = 1
            hour = 2

            [monthly]
            day = 1
            hour = 3

            [yearly]
            month = 1
            day = 2
            hour = 4

            [telegram]
            enabled = true
        "#;
        let cfg: ScheduleConfig = toml::from_str(raw).unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.daily.minute, 30);
        assert!(cfg.telegram.enabled);
        assert_eq!(cfg.daily_cron(), "0 30 1 * * *");
    }
}
