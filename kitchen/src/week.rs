use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type), sqlx(type_name = "text"))]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    /// Days after Monday, 0..=6.
    pub fn offset(self) -> i64 {
        match self {
            DayOfWeek::Monday => 0,
            DayOfWeek::Tuesday => 1,
            DayOfWeek::Wednesday => 2,
            DayOfWeek::Thursday => 3,
            DayOfWeek::Friday => 4,
            DayOfWeek::Saturday => 5,
            DayOfWeek::Sunday => 6,
        }
    }

    pub fn of(date: NaiveDate) -> Self {
        Self::ALL[date.weekday().num_days_from_monday() as usize]
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FromStr for DayOfWeek {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|d| {
                let name = d.to_string().to_lowercase();
                name == lower || (lower.len() >= 3 && name.starts_with(&lower))
            })
            .ok_or_else(|| format!("Unknown day of week: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "text", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MealType::Breakfast => write!(f, "breakfast"),
            MealType::Lunch => write!(f, "lunch"),
            MealType::Dinner => write!(f, "dinner"),
            MealType::Snack => write!(f, "snack"),
        }
    }
}

impl FromStr for MealType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "breakfast" => Ok(MealType::Breakfast),
            "lunch" => Ok(MealType::Lunch),
            "dinner" => Ok(MealType::Dinner),
            "snack" => Ok(MealType::Snack),
            _ => Err(format!("Unknown meal type: {s}")),
        }
    }
}

/// Monday of the week containing `date`.
pub fn week_start_for(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

pub fn date_for(week_start: NaiveDate, day: DayOfWeek) -> NaiveDate {
    week_start_for(week_start) + Duration::days(day.offset())
}

/// `"Dec 8 - Dec 14, 2025"`, or with both years when the week straddles New Year.
pub fn format_week_range(week_start: NaiveDate) -> String {
    let start = week_start_for(week_start);
    let end = start + Duration::days(6);

    if start.year() == end.year() {
        format!("{} - {}", start.format("%b %-d"), end.format("%b %-d, %Y"))
    } else {
        format!("{} - {}", start.format("%b %-d, %Y"), end.format("%b %-d, %Y"))
    }
}

/// Seven buckets, Monday first, each in the order items were given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekGrid<T>(pub BTreeMap<DayOfWeek, Vec<T>>);

impl<T> WeekGrid<T> {
    pub fn day(&self, day: DayOfWeek) -> &[T] {
        self.0.get(&day).map_or(&[], Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DayOfWeek, &T)> {
        self.0
            .iter()
            .flat_map(|(day, items)| items.iter().map(move |item| (*day, item)))
    }

    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn group_by_day<T>(
    items: impl IntoIterator<Item = T>,
    day_of: impl Fn(&T) -> DayOfWeek,
) -> WeekGrid<T> {
    let mut grid: BTreeMap<DayOfWeek, Vec<T>> =
        DayOfWeek::ALL.iter().map(|d| (*d, Vec::new())).collect();

    for item in items {
        grid.entry(day_of(&item)).or_default().push(item);
    }

    WeekGrid(grid)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub day: DayOfWeek,
    pub cook: Option<String>,
    pub recipe: String,
}

/// Flattens a grid into one row per assignment, Monday first.
pub fn schedule<T>(
    grid: &WeekGrid<T>,
    describe: impl Fn(&T) -> (Option<String>, String),
) -> Vec<ScheduleEntry> {
    grid.iter()
        .map(|(day, item)| {
            let (cook, recipe) = describe(item);
            ScheduleEntry { day, cook, recipe }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepetitionWarning {
    pub recipe_id: Uuid,
    pub title: String,
    pub weeks: Vec<NaiveDate>,
}

/// Recipes planned in more than one of the given weeks, most repeated first.
pub fn repetition_warnings(weeks: &[(NaiveDate, Vec<(Uuid, String)>)]) -> Vec<RepetitionWarning> {
    let mut seen: BTreeMap<Uuid, RepetitionWarning> = BTreeMap::new();

    for (week_start, recipes) in weeks {
        for (recipe_id, title) in recipes {
            let warning = seen.entry(*recipe_id).or_insert_with(|| RepetitionWarning {
                recipe_id: *recipe_id,
                title: title.clone(),
                weeks: Vec::new(),
            });

            if !warning.weeks.contains(week_start) {
                warning.weeks.push(*week_start);
            }
        }
    }

    let mut warnings: Vec<_> = seen.into_values().filter(|w| w.weeks.len() > 1).collect();
    for warning in &mut warnings {
        warning.weeks.sort();
    }
    warnings.sort_by(|a, b| {
        b.weeks
            .len()
            .cmp(&a.weeks.len())
            .then_with(|| a.title.cmp(&b.title))
    });

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn week_starts_on_monday() {
        assert_eq!(week_start_for(date("2025-12-08")), date("2025-12-08"));
        assert_eq!(week_start_for(date("2025-12-11")), date("2025-12-08"));
        assert_eq!(week_start_for(date("2025-12-14")), date("2025-12-08"));
        assert_eq!(week_start_for(date("2025-12-15")), date("2025-12-15"));

        assert_eq!(date_for(date("2025-12-08"), DayOfWeek::Sunday), date("2025-12-14"));
        assert_eq!(DayOfWeek::of(date("2025-12-10")), DayOfWeek::Wednesday);
    }

    #[test]
    fn week_ranges() {
        assert_eq!(format_week_range(date("2025-12-10")), "Dec 8 - Dec 14, 2025");
        assert_eq!(
            format_week_range(date("2025-12-29")),
            "Dec 29, 2025 - Jan 4, 2026"
        );
    }

    #[test]
    fn days_parse_loosely() {
        assert_eq!("monday".parse::<DayOfWeek>().unwrap(), DayOfWeek::Monday);
        assert_eq!("Thu".parse::<DayOfWeek>().unwrap(), DayOfWeek::Thursday);
        assert!("Funday".parse::<DayOfWeek>().is_err());
        assert!("s".parse::<DayOfWeek>().is_err());
        assert_eq!(
            serde_json::to_string(&DayOfWeek::Friday).unwrap(),
            "\"Friday\""
        );
    }

    #[test]
    fn grid_has_every_day() {
        let items = vec![
            (DayOfWeek::Wednesday, "tacos"),
            (DayOfWeek::Monday, "soup"),
            (DayOfWeek::Wednesday, "salad"),
        ];

        let grid = group_by_day(items, |(day, _)| *day);

        assert_eq!(grid.0.len(), 7);
        assert_eq!(grid.len(), 3);
        assert!(grid.day(DayOfWeek::Sunday).is_empty());
        let wednesday: Vec<_> = grid.day(DayOfWeek::Wednesday).iter().map(|(_, r)| *r).collect();
        assert_eq!(wednesday, vec!["tacos", "salad"]);

        let order: Vec<_> = grid.iter().map(|(_, (_, r))| *r).collect();
        assert_eq!(order, vec!["soup", "tacos", "salad"]);

        let rows = schedule(&grid, |(_, r)| (None, (*r).to_string()));
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].day, DayOfWeek::Monday);
        assert_eq!(rows[2].recipe, "salad");
    }

    #[test]
    fn repeated_recipes_are_flagged() {
        let chili = Uuid::new_v4();
        let curry = Uuid::new_v4();
        let pasta = Uuid::new_v4();

        let weeks = vec![
            (
                date("2025-12-01"),
                vec![(chili, "Chili".to_string()), (curry, "Curry".to_string())],
            ),
            (
                date("2025-12-08"),
                vec![(chili, "Chili".to_string()), (chili, "Chili".to_string())],
            ),
            (
                date("2025-12-15"),
                vec![
                    (chili, "Chili".to_string()),
                    (curry, "Curry".to_string()),
                    (pasta, "Pasta".to_string()),
                ],
            ),
        ];

        let warnings = repetition_warnings(&weeks);

        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].title, "Chili");
        assert_eq!(warnings[0].weeks.len(), 3);
        assert_eq!(warnings[1].title, "Curry");
        assert_eq!(
            warnings[1].weeks,
            vec![date("2025-12-01"), date("2025-12-15")]
        );
    }
}
