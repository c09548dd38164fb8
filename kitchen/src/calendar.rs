use std::fmt::Write;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{
    settings::{CalendarSettings, SettingsError},
    week::{date_for, DayOfWeek},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecipe {
    pub title: String,
    pub prep_time: Option<String>,
    pub cook_time: Option<String>,
    pub servings: Option<i32>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedMeal {
    pub day: DayOfWeek,
    pub cook: Option<String>,
    pub recipe: EventRecipe,
}

/// Local wall-clock time plus the zone it is in, as Google Calendar takes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    pub date_time: String,
    pub time_zone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    pub email: String,
}

/// Body of a Calendar API `events.insert` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub summary: String,
    pub description: String,
    pub start: EventTime,
    pub end: EventTime,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attendees: Vec<Attendee>,
}

fn or_na(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("N/A")
}

pub fn describe(recipe: &EventRecipe) -> String {
    let servings = recipe.servings.map(|s| s.to_string());
    let mut desc = format!(
        "Prep Time: {} | Cook Time: {} | Servings: {}\n\n",
        or_na(recipe.prep_time.as_deref()),
        or_na(recipe.cook_time.as_deref()),
        or_na(servings.as_deref()),
    );

    desc.push_str("INGREDIENTS:\n");
    for line in &recipe.ingredients {
        let _ = writeln!(desc, "- {line}");
    }

    desc.push_str("\nINSTRUCTIONS:\n");
    for (i, step) in recipe.instructions.iter().enumerate() {
        let _ = writeln!(desc, "{}. {step}", i + 1);
    }

    if let Some(url) = &recipe.source_url {
        let _ = write!(desc, "\nSource: {url}");
    }

    desc
}

/// One event per planned meal, at the configured dinner time on that day.
///
/// Days the user excluded from their calendar are skipped.
pub fn build_events(
    week_start: NaiveDate,
    meals: &[PlannedMeal],
    settings: &CalendarSettings,
) -> Result<Vec<CalendarEvent>, SettingsError> {
    let tz = settings.tz()?;
    let duration = Duration::minutes(i64::from(settings.duration_minutes));
    let attendees: Vec<Attendee> = settings
        .attendees
        .iter()
        .map(|email| Attendee {
            email: email.clone(),
        })
        .collect();

    let at = |date_time: chrono::NaiveDateTime| EventTime {
        date_time: date_time.format("%Y-%m-%dT%H:%M:%S").to_string(),
        time_zone: tz.name().to_string(),
    };

    Ok(meals
        .iter()
        .filter(|meal| !settings.excluded_days.contains(&meal.day))
        .map(|meal| {
            let start = date_for(week_start, meal.day).and_time(settings.event_time);
            let summary = match meal.cook.as_deref().map(str::trim) {
                Some(cook) if !cook.is_empty() => format!("{cook}: {}", meal.recipe.title),
                _ => meal.recipe.title.clone(),
            };

            CalendarEvent {
                summary,
                description: describe(&meal.recipe),
                start: at(start),
                end: at(start + duration),
                attendees: attendees.clone(),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;

    fn meal(day: DayOfWeek, cook: Option<&str>) -> PlannedMeal {
        PlannedMeal {
            day,
            cook: cook.map(ToString::to_string),
            recipe: EventRecipe {
                title: "Chili".to_string(),
                prep_time: Some("15 min".to_string()),
                cook_time: None,
                servings: Some(4),
                ingredients: vec!["1 lb beef".to_string(), "1 onion".to_string()],
                instructions: vec!["Brown".to_string(), "Simmer".to_string()],
                source_url: Some("https://example.com/chili".to_string()),
            },
        }
    }

    #[test]
    fn events_land_on_their_day() {
        let settings = CalendarSettings {
            time_zone: "America/Chicago".to_string(),
            event_time: NaiveTime::from_hms_opt(17, 30, 0).unwrap(),
            duration_minutes: 90,
            attendees: vec!["alex@example.com".to_string()],
            excluded_days: vec![DayOfWeek::Friday],
        };
        let week_start: NaiveDate = "2025-12-08".parse().unwrap();

        let events = build_events(
            week_start,
            &[
                meal(DayOfWeek::Tuesday, Some("Sam")),
                meal(DayOfWeek::Friday, Some("Alex")),
                meal(DayOfWeek::Sunday, None),
            ],
            &settings,
        )
        .unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].summary, "Sam: Chili");
        assert_eq!(events[0].start.date_time, "2025-12-09T17:30:00");
        assert_eq!(events[0].end.date_time, "2025-12-09T19:00:00");
        assert_eq!(events[0].start.time_zone, "America/Chicago");
        assert_eq!(events[0].attendees[0].email, "alex@example.com");
        assert_eq!(events[1].summary, "Chili");
        assert_eq!(events[1].start.date_time, "2025-12-14T17:30:00");
    }

    #[test]
    fn descriptions() {
        let desc = describe(&meal(DayOfWeek::Monday, None).recipe);

        assert!(desc.starts_with("Prep Time: 15 min | Cook Time: N/A | Servings: 4\n\nINGREDIENTS:\n- 1 lb beef\n- 1 onion\n"));
        assert!(desc.contains("\nINSTRUCTIONS:\n1. Brown\n2. Simmer\n"));
        assert!(desc.ends_with("Source: https://example.com/chili"));
    }

    #[test]
    fn wire_format() {
        let events = build_events(
            "2025-12-08".parse().unwrap(),
            &[meal(DayOfWeek::Monday, None)],
            &CalendarSettings::default(),
        )
        .unwrap();

        let json = serde_json::to_value(&events[0]).unwrap();
        assert_eq!(json["start"]["dateTime"], "2025-12-08T18:00:00");
        assert_eq!(json["start"]["timeZone"], "UTC");
        assert!(json.get("attendees").is_none());
    }

    #[test]
    fn bad_time_zone() {
        let settings = CalendarSettings {
            time_zone: "Nowhere/Special".to_string(),
            ..CalendarSettings::default()
        };

        assert!(build_events("2025-12-08".parse().unwrap(), &[], &settings).is_err());
    }
}
