//! Per-user settings and their portable export format.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{aisle::Aisle, week::DayOfWeek};

pub const EXPORT_VERSION: u32 = 1;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static regex compiles"));

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email.trim())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitSystem {
    #[default]
    Imperial,
    Metric,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    pub recipients: Vec<String>,
    pub service_id: Option<String>,
    pub template_id: Option<String>,
    pub public_key: Option<String>,
}

impl EmailSettings {
    pub fn is_configured(&self) -> bool {
        [&self.service_id, &self.template_id, &self.public_key]
            .iter()
            .all(|v| v.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarSettings {
    pub time_zone: String,
    pub event_time: NaiveTime,
    pub duration_minutes: u32,
    pub attendees: Vec<String>,
    pub excluded_days: Vec<DayOfWeek>,
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            time_zone: "UTC".to_string(),
            event_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
            duration_minutes: 60,
            attendees: Vec::new(),
            excluded_days: Vec::new(),
        }
    }
}

impl CalendarSettings {
    pub fn tz(&self) -> Result<Tz, SettingsError> {
        self.time_zone
            .parse()
            .map_err(|_| SettingsError::UnknownTimeZone(self.time_zone.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cooks: Vec<String>,
    pub default_servings: i32,
    pub unit_system: UnitSystem,
    /// Overrides the store walk order on shopping lists.
    pub category_order: Option<Vec<Aisle>>,
    pub email: EmailSettings,
    pub calendar: CalendarSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cooks: vec!["Me".to_string()],
            default_servings: 4,
            unit_system: UnitSystem::default(),
            category_order: None,
            email: EmailSettings::default(),
            calendar: CalendarSettings::default(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),
    #[error("Unknown time zone: {0}")]
    UnknownTimeZone(String),
    #[error("Default servings must be greater than zero")]
    InvalidServings,
    #[error("Event duration must be between 1 and 1440 minutes")]
    InvalidDuration,
}

impl Settings {
    /// Tidies names and addresses, then checks everything that can be wrong.
    pub fn validate(mut self) -> Result<Self, SettingsError> {
        self.cooks = self
            .cooks
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        for list in [&mut self.email.recipients, &mut self.calendar.attendees] {
            *list = list
                .iter()
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect();

            if let Some(bad) = list.iter().find(|e| !is_valid_email(e)) {
                return Err(SettingsError::InvalidEmail(bad.clone()));
            }
        }

        if self.default_servings <= 0 {
            return Err(SettingsError::InvalidServings);
        }
        if self.calendar.duration_minutes == 0 || self.calendar.duration_minutes > 24 * 60 {
            return Err(SettingsError::InvalidDuration);
        }
        self.calendar.tz()?;

        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsExport {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub settings: Settings,
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Settings file is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Unsupported settings file version {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error(transparent)]
    Invalid(#[from] SettingsError),
}

pub fn export(settings: &Settings, now: DateTime<Utc>) -> SettingsExport {
    SettingsExport {
        version: EXPORT_VERSION,
        exported_at: now,
        settings: settings.clone(),
    }
}

pub fn import(json: &str) -> Result<Settings, ImportError> {
    #[derive(Deserialize)]
    struct Versioned {
        version: u32,
    }

    // Check the version first so future formats fail with a useful message
    let Versioned { version } = serde_json::from_str(json)?;
    if version != EXPORT_VERSION {
        return Err(ImportError::UnsupportedVersion(version));
    }

    let export: SettingsExport = serde_json::from_str(json)?;
    Ok(export.settings.validate()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails() {
        assert!(is_valid_email("sam@example.com"));
        assert!(is_valid_email("  sam+meals@mail.example.co.uk "));
        assert!(!is_valid_email("sam@example"));
        assert!(!is_valid_email("sam example@x.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn partial_documents_take_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"cooks": ["Sam", "Alex"]}"#).unwrap();

        assert_eq!(settings.cooks, vec!["Sam", "Alex"]);
        assert_eq!(settings.default_servings, 4);
        assert_eq!(settings.calendar.time_zone, "UTC");
        assert_eq!(settings.calendar.event_time, NaiveTime::from_hms_opt(18, 0, 0).unwrap());
    }

    #[test]
    fn validation() {
        let mut settings = Settings::default();
        settings.email.recipients = vec![" sam@example.com ".to_string(), String::new()];
        settings.cooks = vec!["  Sam ".to_string(), "   ".to_string()];
        let settings = settings.validate().unwrap();
        assert_eq!(settings.email.recipients, vec!["sam@example.com"]);
        assert_eq!(settings.cooks, vec!["Sam"]);

        let mut bad_email = Settings::default();
        bad_email.calendar.attendees = vec!["nope".to_string()];
        assert_eq!(
            bad_email.validate(),
            Err(SettingsError::InvalidEmail("nope".to_string()))
        );

        let mut bad_zone = Settings::default();
        bad_zone.calendar.time_zone = "Mars/Olympus_Mons".to_string();
        assert!(matches!(bad_zone.validate(), Err(SettingsError::UnknownTimeZone(_))));
    }

    #[test]
    fn export_then_import() {
        let mut settings = Settings::default();
        settings.calendar.time_zone = "America/New_York".to_string();
        settings.email.recipients = vec!["sam@example.com".to_string()];

        let json = serde_json::to_string(&export(&settings, Utc::now())).unwrap();

        assert_eq!(import(&json).unwrap(), settings);
    }

    #[test]
    fn import_rejects() {
        assert!(matches!(import("not json"), Err(ImportError::Malformed(_))));
        assert!(matches!(
            import(r#"{"version": 2, "exported_at": "2025-12-08T00:00:00Z", "settings": {}}"#),
            Err(ImportError::UnsupportedVersion(2))
        ));
        assert!(matches!(
            import(r#"{"version": 1, "exported_at": "2025-12-08T00:00:00Z", "settings": {"default_servings": 0}}"#),
            Err(ImportError::Invalid(SettingsError::InvalidServings))
        ));
        assert!(matches!(import(r#"{"version": 1}"#), Err(ImportError::Malformed(_))));
    }

    #[test]
    fn email_settings_need_every_key() {
        let mut email = EmailSettings::default();
        assert!(!email.is_configured());

        email.service_id = Some("service_x".to_string());
        email.template_id = Some("template_y".to_string());
        email.public_key = Some(" ".to_string());
        assert!(!email.is_configured());

        email.public_key = Some("pk".to_string());
        assert!(email.is_configured());
    }
}
