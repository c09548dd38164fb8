use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::week::{DayOfWeek, MealType};

/// One slot of a saved week, detached from any particular plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateAssignment {
    pub recipe_id: Uuid,
    pub day_of_week: DayOfWeek,
    #[serde(default)]
    pub cook: Option<String>,
    #[serde(default)]
    pub meal_type: Option<MealType>,
    #[serde(default)]
    pub serving_size: Option<i32>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template name must not be empty")]
    EmptyName,
    #[error("template name must be at most {max} characters")]
    NameTooLong { max: usize },
}

const MAX_NAME_LEN: usize = 100;

pub fn validate_name(name: &str) -> Result<String, TemplateError> {
    let name = name.trim();

    if name.is_empty() {
        return Err(TemplateError::EmptyName);
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(TemplateError::NameTooLong { max: MAX_NAME_LEN });
    }

    Ok(name.to_string())
}

/// Captures a week's assignments, Monday first, keeping their order within a day.
pub fn snapshot<'a>(
    assignments: impl IntoIterator<Item = &'a TemplateAssignment>,
) -> Vec<TemplateAssignment> {
    let mut slots: Vec<TemplateAssignment> = assignments.into_iter().cloned().collect();
    slots.sort_by_key(|a| a.day_of_week);
    slots
}

/// What applying a template does to a week. The week's current assignments are
/// always replaced by `slots`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyPlan {
    pub slots: Vec<TemplateAssignment>,
    /// Slots whose recipe was deleted or is no longer visible to the applying user.
    pub skipped: usize,
}

/// Keeps the slots whose recipe exists and the applying user may see, in
/// template order.
pub fn plan_apply(
    template: &[TemplateAssignment],
    accessible_recipe_ids: &HashSet<Uuid>,
) -> ApplyPlan {
    let slots: Vec<TemplateAssignment> = template
        .iter()
        .filter(|a| accessible_recipe_ids.contains(&a.recipe_id))
        .cloned()
        .collect();

    ApplyPlan {
        skipped: template.len() - slots.len(),
        slots,
    }
}

/// Slots of a week to copy into another, limited to `days` when given.
pub fn select_days(
    week: &[TemplateAssignment],
    days: Option<&[DayOfWeek]>,
) -> Vec<TemplateAssignment> {
    week.iter()
        .filter(|a| days.map_or(true, |days| days.contains(&a.day_of_week)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(recipe_id: Uuid, day: DayOfWeek, cook: &str) -> TemplateAssignment {
        TemplateAssignment {
            recipe_id,
            day_of_week: day,
            cook: Some(cook.to_string()),
            meal_type: Some(MealType::Dinner),
            serving_size: None,
        }
    }

    #[test]
    fn names() {
        assert_eq!(validate_name("  Busy week  ").unwrap(), "Busy week");
        assert_eq!(validate_name("   "), Err(TemplateError::EmptyName));
        assert!(validate_name(&"x".repeat(101)).is_err());
    }

    #[test]
    fn snapshot_orders_by_day() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let week = vec![
            slot(a, DayOfWeek::Friday, "Sam"),
            slot(b, DayOfWeek::Monday, "Alex"),
            slot(c, DayOfWeek::Friday, "Alex"),
        ];

        let saved = snapshot(&week);

        let order: Vec<_> = saved.iter().map(|s| s.recipe_id).collect();
        assert_eq!(order, vec![b, a, c]);
    }

    #[test]
    fn inaccessible_recipes_are_dropped() {
        let (kept, gone) = (Uuid::new_v4(), Uuid::new_v4());
        let template = vec![
            slot(kept, DayOfWeek::Monday, "Sam"),
            slot(gone, DayOfWeek::Tuesday, "Sam"),
        ];
        let accessible = HashSet::from([kept]);

        let plan = plan_apply(&template, &accessible);

        assert_eq!(plan.slots.len(), 1);
        assert_eq!(plan.slots[0].recipe_id, kept);
        assert_eq!(plan.skipped, 1);

        let nothing = plan_apply(&template, &HashSet::new());
        assert!(nothing.slots.is_empty());
        assert_eq!(nothing.skipped, 2);
    }

    #[test]
    fn applying_twice_gives_the_same_week() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let template = vec![
            slot(a, DayOfWeek::Monday, "Sam"),
            slot(b, DayOfWeek::Thursday, "Alex"),
        ];
        let accessible = HashSet::from([a, b]);

        let first = plan_apply(&template, &accessible);
        let second = plan_apply(&template, &accessible);

        assert_eq!(first, second);
        assert_eq!(first.slots, template);
        assert_eq!(first.skipped, 0);
    }

    #[test]
    fn copying_selected_days() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let week = vec![
            slot(a, DayOfWeek::Monday, "Sam"),
            slot(b, DayOfWeek::Wednesday, "Alex"),
            slot(c, DayOfWeek::Friday, "Sam"),
        ];

        assert_eq!(select_days(&week, None), week);

        let picked = select_days(&week, Some(&[DayOfWeek::Friday, DayOfWeek::Monday]));
        let ids: Vec<_> = picked.iter().map(|s| s.recipe_id).collect();
        assert_eq!(ids, vec![a, c]);

        assert!(select_days(&week, Some(&[DayOfWeek::Sunday])).is_empty());
    }

    #[test]
    fn stored_json_shape() {
        let json = serde_json::json!([{
            "recipe_id": "6f1d7d62-3f0e-4b3c-9f3c-0d8f3f6e2b11",
            "day_of_week": "Wednesday"
        }]);

        let slots: Vec<TemplateAssignment> = serde_json::from_value(json).unwrap();

        assert_eq!(slots[0].day_of_week, DayOfWeek::Wednesday);
        assert_eq!(slots[0].cook, None);
    }
}
