//! Weekly shopping lists.
//!
//! Every assigned recipe is scaled to its serving size, split into parsed lines
//! and merged by normalized ingredient name. The resulting items are grouped by
//! aisle in store order so the list can be rendered straight into an email, a
//! printout or the interactive checklist.

use std::collections::{BTreeMap, HashSet};

use maud::{html, Markup, PreEscaped, DOCTYPE};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    aisle::{categorize, Aisle},
    ingredient::{
        convert_unit, format_quantity, normalize_ingredient_name, parse_ingredient,
        preferred_unit, scale_ingredient, units_convertible,
    },
    pantry::PantryLookup,
    week::{DayOfWeek, ScheduleEntry},
};

/// A recipe as it is assigned in a given week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedRecipe {
    pub recipe_id: Uuid,
    pub title: String,
    pub ingredients: Vec<String>,
    pub base_servings: Option<i32>,
    pub serving_size: Option<i32>,
    pub day: DayOfWeek,
    pub cook: Option<String>,
}

impl PlannedRecipe {
    fn scale_factor(&self) -> f64 {
        match (self.base_servings, self.serving_size) {
            (Some(base), Some(wanted)) if base > 0 && wanted > 0 => {
                f64::from(wanted) / f64::from(base)
            }
            _ => 1.0,
        }
    }
}

/// Something added to a week's list by hand rather than from a recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraItem {
    pub extra_item_id: Uuid,
    pub ingredient: String,
    pub quantity: Option<String>,
    /// Categorized from the ingredient when not given.
    pub aisle: Option<Aisle>,
}

impl ExtraItem {
    /// Check-off key, distinct from any merged ingredient key.
    pub fn key(&self) -> String {
        extra_key(self.extra_item_id)
    }
}

pub fn extra_key(extra_item_id: Uuid) -> String {
    format!("extra-{extra_item_id}")
}

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Items already at home are left off the list when set.
    pub pantry: Option<PantryLookup>,
    /// Keys of items the household has ticked off.
    pub checked: HashSet<String>,
    /// Aisles listed here come first, in this order; the rest follow in store order.
    pub aisle_order: Option<Vec<Aisle>>,
    /// Hand-added items. They are never merged with recipe ingredients or
    /// dropped for being in the pantry.
    pub extras: Vec<ExtraItem>,
}

fn section_rank(aisle: Aisle, custom: Option<&[Aisle]>) -> usize {
    custom
        .and_then(|order| order.iter().position(|a| *a == aisle))
        .unwrap_or_else(|| Aisle::ORDER.len() + aisle.position())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingItem {
    pub key: String,
    pub name: String,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub aisle: Aisle,
    pub recipes: Vec<String>,
    pub checked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_item_id: Option<Uuid>,
}

impl ShoppingItem {
    /// `"1 1/2 cup"`, or empty when there is nothing to measure.
    pub fn amount(&self) -> String {
        match (self.quantity, &self.unit) {
            (Some(q), Some(unit)) => format!("{} {unit}", format_quantity(q)),
            (Some(q), None) => format_quantity(q),
            (None, _) => String::new(),
        }
    }

    pub fn line(&self) -> String {
        let amount = self.amount();
        if amount.is_empty() {
            self.name.clone()
        } else {
            format!("{amount} {}", self.name)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingSection {
    pub aisle: Aisle,
    pub items: Vec<ShoppingItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingList {
    pub sections: Vec<ShoppingSection>,
    pub schedule: Vec<ScheduleEntry>,
    pub item_count: usize,
    pub recipe_count: usize,
    /// Keys left off because the pantry already has them.
    pub skipped: Vec<String>,
}

impl ShoppingList {
    pub fn items(&self) -> impl Iterator<Item = &ShoppingItem> {
        self.sections.iter().flat_map(|s| s.items.iter())
    }
}

struct Accumulator {
    item: ShoppingItem,
    summed: bool,
}

impl Accumulator {
    fn absorb(&mut self, quantity: Option<f64>, unit: Option<&str>, recipe: &str) {
        if let (Some(existing), Some(extra)) = (self.item.quantity, quantity) {
            match (self.item.unit.as_deref(), unit) {
                (None, None) => {
                    self.item.quantity = Some(existing + extra);
                    self.summed = true;
                }
                (Some(have), Some(new)) if units_convertible(have, new) => {
                    if let Some(converted) = convert_unit(extra, new, have) {
                        self.item.quantity = Some(existing + converted);
                        self.summed = true;
                    }
                }
                // Different kinds of measure, keep the first
                _ => {}
            }
        } else if self.item.quantity.is_none() && quantity.is_some() {
            self.item.quantity = quantity;
            self.item.unit = unit.map(ToString::to_string);
        }

        if !self.item.recipes.iter().any(|r| r == recipe) {
            self.item.recipes.push(recipe.to_string());
        }
    }

    fn finish(mut self) -> ShoppingItem {
        if self.summed {
            if let (Some(q), Some(unit)) = (self.item.quantity, self.item.unit.as_deref()) {
                let (q, unit) = preferred_unit(q, unit);
                self.item.quantity = Some(q);
                self.item.unit = Some(unit);
            }
        }
        self.item
    }
}

#[tracing::instrument(skip_all, fields(recipes = planned.len()))]
pub fn generate(planned: &[PlannedRecipe], options: &GenerateOptions) -> ShoppingList {
    let mut merged: BTreeMap<String, Accumulator> = BTreeMap::new();
    let mut skipped: Vec<String> = Vec::new();

    for recipe in planned {
        let factor = recipe.scale_factor();

        for line in &recipe.ingredients {
            if line.trim().is_empty() {
                continue;
            }

            let parsed = parse_ingredient(&scale_ingredient(line, factor));
            let key = match normalize_ingredient_name(&parsed.name) {
                k if k.is_empty() => parsed.name.trim().to_lowercase(),
                k => k,
            };
            if key.is_empty() {
                continue;
            }

            if options
                .pantry
                .as_ref()
                .is_some_and(|pantry| pantry.contains(&parsed.name))
            {
                if !skipped.contains(&key) {
                    skipped.push(key);
                }
                continue;
            }

            match merged.get_mut(&key) {
                Some(acc) => acc.absorb(parsed.quantity, parsed.unit.as_deref(), &recipe.title),
                None => {
                    let item = ShoppingItem {
                        aisle: categorize(&parsed.name),
                        checked: options.checked.contains(&key),
                        key: key.clone(),
                        name: parsed.name.clone(),
                        quantity: parsed.quantity,
                        unit: parsed.unit.clone(),
                        recipes: vec![recipe.title.clone()],
                        extra_item_id: None,
                    };
                    merged.insert(
                        key,
                        Accumulator {
                            item,
                            summed: false,
                        },
                    );
                }
            }
        }
    }

    let mut by_aisle: BTreeMap<usize, Vec<ShoppingItem>> = BTreeMap::new();
    for acc in merged.into_values() {
        let item = acc.finish();
        let rank = section_rank(item.aisle, options.aisle_order.as_deref());
        by_aisle.entry(rank).or_default().push(item);
    }

    for extra in &options.extras {
        let item = extra_item(extra, &options.checked);
        let rank = section_rank(item.aisle, options.aisle_order.as_deref());
        by_aisle.entry(rank).or_default().push(item);
    }

    let sections: Vec<ShoppingSection> = by_aisle
        .into_values()
        .filter_map(|items| {
            let aisle = items.first()?.aisle;
            Some(ShoppingSection { aisle, items })
        })
        .collect();

    let mut schedule: Vec<ScheduleEntry> = planned
        .iter()
        .map(|r| ScheduleEntry {
            day: r.day,
            cook: r.cook.clone(),
            recipe: r.title.clone(),
        })
        .collect();
    schedule.sort_by_key(|e| e.day);

    let recipe_count = planned
        .iter()
        .map(|r| r.recipe_id)
        .collect::<HashSet<_>>()
        .len();
    let item_count = sections.iter().map(|s| s.items.len()).sum();

    skipped.sort();

    tracing::debug!(item_count, recipe_count, "Generated shopping list");

    ShoppingList {
        sections,
        schedule,
        item_count,
        recipe_count,
        skipped,
    }
}

fn extra_item(extra: &ExtraItem, checked: &HashSet<String>) -> ShoppingItem {
    let line = match extra.quantity.as_deref().map(str::trim) {
        Some(quantity) if !quantity.is_empty() => format!("{quantity} {}", extra.ingredient),
        _ => extra.ingredient.clone(),
    };
    let parsed = parse_ingredient(&line);
    let key = extra.key();

    ShoppingItem {
        aisle: extra
            .aisle
            .unwrap_or_else(|| categorize(&extra.ingredient)),
        checked: checked.contains(&key),
        key,
        name: if parsed.name.trim().is_empty() {
            extra.ingredient.trim().to_string()
        } else {
            parsed.name
        },
        quantity: parsed.quantity,
        unit: parsed.unit,
        recipes: Vec::new(),
        extra_item_id: Some(extra.extra_item_id),
    }
}

pub fn to_markdown(list: &ShoppingList, week_range: &str) -> String {
    let mut out = format!("# Shopping List - Week of {week_range}\n\n");

    if !list.schedule.is_empty() {
        out.push_str("## Schedule\n\n| Day | Cook | Recipe |\n|-----|------|--------|\n");
        for entry in &list.schedule {
            out.push_str(&format!(
                "| {} | {} | {} |\n",
                entry.day,
                entry.cook.as_deref().unwrap_or("-"),
                entry.recipe
            ));
        }
        out.push('\n');
    }

    out.push_str(&format!(
        "{} items from {} recipes\n",
        list.item_count, list.recipe_count
    ));

    for section in &list.sections {
        out.push_str(&format!("\n## {}\n\n", section.aisle));
        for item in &section.items {
            let check = if item.checked { "x" } else { " " };
            if item.recipes.is_empty() {
                out.push_str(&format!("- [{check}] {}\n", item.line()));
            } else {
                out.push_str(&format!(
                    "- [{check}] {} _({})_\n",
                    item.line(),
                    item.recipes.join(", ")
                ));
            }
        }
    }

    out
}

pub fn to_text(list: &ShoppingList, week_range: &str) -> String {
    let mut out = format!(
        "SHOPPING LIST\nWeek of {week_range}\n{} items from {} recipes\n",
        list.item_count, list.recipe_count
    );

    if !list.schedule.is_empty() {
        out.push_str("\nSCHEDULE\n");
        for entry in &list.schedule {
            match &entry.cook {
                Some(cook) => out.push_str(&format!("{}: {} ({cook})\n", entry.day, entry.recipe)),
                None => out.push_str(&format!("{}: {}\n", entry.day, entry.recipe)),
            }
        }
    }

    for section in &list.sections {
        out.push_str(&format!("\n{}\n", section.aisle.name().to_uppercase()));
        for item in &section.items {
            let check = if item.checked { "☑" } else { "☐" };
            out.push_str(&format!("{check} {}\n", item.line()));
        }
    }

    out
}

pub fn schedule_table(schedule: &[ScheduleEntry]) -> Markup {
    html! {
        table.schedule {
            thead { tr { th { "Day" } th { "Cook" } th { "Recipe" } } }
            tbody {
                @for entry in schedule {
                    tr {
                        td { (entry.day) }
                        td { (entry.cook.as_deref().unwrap_or("-")) }
                        td { (entry.recipe) }
                    }
                }
            }
        }
    }
}

/// The list body without the page chrome, used inside emails.
pub fn sections_html(list: &ShoppingList) -> Markup {
    html! {
        @for section in &list.sections {
            h2 { (section.aisle) }
            ul {
                @for item in &section.items {
                    li.checked[item.checked] {
                        (PreEscaped(if item.checked { "&#9745;" } else { "&#9744;" }))
                        " "
                        strong { (item.amount()) }
                        " "
                        (item.name)
                        @if !item.recipes.is_empty() {
                            small { " (" (item.recipes.join(", ")) ")" }
                        }
                    }
                }
            }
        }
    }
}

pub fn to_html(list: &ShoppingList, week_range: &str) -> String {
    let page = html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { "Shopping List - Week of " (week_range) }
            }
            body {
                h1 { "Shopping List" }
                p { "Week of " (week_range) }
                p { (list.item_count) " items from " (list.recipe_count) " recipes" }
                @if !list.schedule.is_empty() {
                    (schedule_table(&list.schedule))
                }
                (sections_html(list))
            }
        }
    };

    page.into_string()
}
