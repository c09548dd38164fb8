//! Ingredient line parsing and scaling.
//!
//! Lines look like `"1 1/2 cups flour"`, `"2-3 cloves garlic"` or `"Salt to taste"`.
//! A leading quantity (integer, decimal, fraction, mixed number or range) and an
//! optional known unit are pulled off the front; everything else is the name.
//! Lines without a leading quantity are never rewritten.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

const COMMON_FRACTIONS: [(&str, f64); 6] = [
    ("1/8", 0.125),
    ("1/4", 0.25),
    ("1/3", 1.0 / 3.0),
    ("1/2", 0.5),
    ("2/3", 2.0 / 3.0),
    ("3/4", 0.75),
];

const TOLERANCE: f64 = 0.01;

static MIXED_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s+(\d+)/(\d+)").expect("static regex compiles"));
static FRACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)/(\d+)").expect("static regex compiles"));
static RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*[-–]\s*(\d+(?:\.\d+)?)").expect("static regex compiles")
});
static DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d*\.?\d+").expect("static regex compiles"));
static LEADING_QUANTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([\d\s/.\-–]+)\s+").expect("static regex compiles"));
static LEADING_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z]+\.?)\s+").expect("static regex compiles"));
static PARENTHETICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(.*?\)").expect("static regex compiles"));
static DESCRIPTORS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(fresh|frozen|dried|chopped|diced|sliced|minced|crushed|ground|shredded|grated|peeled|boneless|skinless|raw|cooked|uncooked|organic|finely|roughly|coarsely)\b",
    )
    .expect("static regex compiles")
});
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex compiles"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedIngredient {
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub name: String,
    pub original: String,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ScaleError {
    #[error("servings must be greater than zero, got {0}")]
    InvalidServings(f64),
}

fn replace_vulgar_fractions(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        let replacement = match c {
            '½' => " 1/2",
            '¼' => " 1/4",
            '¾' => " 3/4",
            '⅓' => " 1/3",
            '⅔' => " 2/3",
            '⅛' => " 1/8",
            _ => {
                out.push(c);
                continue;
            }
        };
        out.push_str(replacement);
    }
    out
}

fn fraction_value(numerator: &str, denominator: &str) -> Option<f64> {
    let numerator: f64 = numerator.parse().ok()?;
    let denominator: f64 = denominator.parse().ok()?;

    if denominator == 0.0 {
        return None;
    }

    Some(numerator / denominator)
}

/// Handles `"2"`, `"1/2"`, `"1 1/2"`, `"2.5"` and `"2-3"` (midpoint).
pub fn parse_quantity(text: &str) -> Option<f64> {
    let text = replace_vulgar_fractions(text);
    let text = text.trim();

    if let Some(caps) = MIXED_NUMBER.captures(text) {
        let whole: f64 = caps[1].parse().ok()?;
        return Some(whole + fraction_value(&caps[2], &caps[3])?);
    }

    if let Some(caps) = FRACTION.captures(text) {
        return fraction_value(&caps[1], &caps[2]);
    }

    if let Some(caps) = RANGE.captures(text) {
        let low: f64 = caps[1].parse().ok()?;
        let high: f64 = caps[2].parse().ok()?;
        return Some((low + high) / 2.0);
    }

    DECIMAL.find(text).and_then(|m| m.as_str().parse().ok())
}

fn common_fraction(value: f64) -> Option<&'static str> {
    COMMON_FRACTIONS
        .iter()
        .find(|(_, decimal)| (value - decimal).abs() < TOLERANCE)
        .map(|(s, _)| *s)
}

/// Renders a quantity the way a cook writes it: `"1/3"`, `"2"`, `"1 1/2"`, `"0.15"`.
pub fn format_quantity(value: f64) -> String {
    if let Some(fraction) = common_fraction(value) {
        return fraction.to_string();
    }

    if (value - value.round()).abs() < TOLERANCE {
        return format!("{}", value.round() as i64);
    }

    let whole = value.floor();
    if let Some(fraction) = common_fraction(value - whole) {
        return if whole > 0.0 {
            format!("{} {fraction}", whole as i64)
        } else {
            fraction.to_string()
        };
    }

    let fixed = format!("{value:.2}");
    fixed.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn canonical_unit(raw: &str) -> Option<&'static str> {
    // Capital T is the old shorthand for tablespoon
    if raw == "T" || raw == "T." {
        return Some("tbsp");
    }

    let lower = raw.trim().to_lowercase();
    let lower = lower.strip_suffix('.').unwrap_or(&lower);

    let unit = match lower {
        "t" | "tsp" | "teaspoon" | "teaspoons" => "tsp",
        "tbs" | "tbsp" | "tablespoon" | "tablespoons" => "tbsp",
        "c" | "cup" | "cups" => "cup",
        "oz" | "ounce" | "ounces" => "oz",
        "lb" | "lbs" | "pound" | "pounds" => "lb",
        "g" | "gram" | "grams" => "g",
        "kg" | "kilogram" | "kilograms" => "kg",
        "ml" | "milliliter" | "milliliters" => "ml",
        "l" | "liter" | "liters" => "l",
        "pint" | "pints" => "pint",
        "quart" | "quarts" => "quart",
        "gallon" | "gallons" => "gallon",
        "clove" | "cloves" => "clove",
        "can" | "cans" => "can",
        "package" | "packages" | "pkg" => "package",
        "bunch" | "bunches" => "bunch",
        "head" | "heads" => "head",
        "slice" | "slices" => "slice",
        "piece" | "pieces" => "piece",
        "large" => "large",
        "medium" => "medium",
        "small" => "small",
        _ => return None,
    };

    Some(unit)
}

/// Canonical spelling of a unit, or the lower-cased input when the unit is unknown.
pub fn normalize_unit(unit: &str) -> String {
    canonical_unit(unit.trim()).map_or_else(
        || {
            let lower = unit.trim().to_lowercase();
            lower.strip_suffix('.').unwrap_or(&lower).to_string()
        },
        ToString::to_string,
    )
}

fn ml_per_unit(unit: &str) -> Option<f64> {
    Some(match unit {
        "ml" => 1.0,
        "l" => 1000.0,
        "tsp" => 4.929,
        "tbsp" => 14.787,
        "cup" => 236.588,
        "pint" => 473.176,
        "quart" => 946.353,
        "gallon" => 3785.41,
        _ => return None,
    })
}

fn grams_per_unit(unit: &str) -> Option<f64> {
    Some(match unit {
        "g" => 1.0,
        "kg" => 1000.0,
        "oz" => 28.3495,
        "lb" => 453.592,
        _ => return None,
    })
}

pub fn units_convertible(a: &str, b: &str) -> bool {
    let (a, b) = (normalize_unit(a), normalize_unit(b));

    a == b
        || (ml_per_unit(&a).is_some() && ml_per_unit(&b).is_some())
        || (grams_per_unit(&a).is_some() && grams_per_unit(&b).is_some())
}

/// `None` when the units measure different things.
pub fn convert_unit(quantity: f64, from: &str, to: &str) -> Option<f64> {
    let (from, to) = (normalize_unit(from), normalize_unit(to));

    if from == to {
        return Some(quantity);
    }

    if let (Some(f), Some(t)) = (ml_per_unit(&from), ml_per_unit(&to)) {
        return Some(quantity * f / t);
    }

    if let (Some(f), Some(t)) = (grams_per_unit(&from), grams_per_unit(&to)) {
        return Some(quantity * f / t);
    }

    None
}

/// Re-expresses a quantity in the most readable unit of its family (48 tsp becomes 1 cup).
pub fn preferred_unit(quantity: f64, unit: &str) -> (f64, String) {
    let unit = normalize_unit(unit);

    if let Some(factor) = ml_per_unit(&unit) {
        let ml = quantity * factor;
        let target = if ml >= 236.588 {
            "cup"
        } else if ml >= 14.787 {
            "tbsp"
        } else {
            "tsp"
        };
        return (ml / ml_per_unit(target).unwrap_or(1.0), target.to_string());
    }

    if let Some(factor) = grams_per_unit(&unit) {
        let grams = quantity * factor;
        let target = if grams >= 453.592 {
            "lb"
        } else if grams >= 28.3495 {
            "oz"
        } else {
            "g"
        };
        return (grams / grams_per_unit(target).unwrap_or(1.0), target.to_string());
    }

    (quantity, unit)
}

pub fn parse_ingredient(line: &str) -> ParsedIngredient {
    let normalized = replace_vulgar_fractions(line);
    let trimmed = normalized.trim();

    let no_quantity = || ParsedIngredient {
        quantity: None,
        unit: None,
        name: line.trim().to_string(),
        original: line.to_string(),
    };

    let Some(caps) = LEADING_QUANTITY.captures(trimmed) else {
        return no_quantity();
    };

    let quantity_text = caps[1].trim();
    if !quantity_text.chars().any(|c| c.is_ascii_digit()) {
        return no_quantity();
    }

    let Some(quantity) = parse_quantity(quantity_text) else {
        return no_quantity();
    };

    let rest = trimmed[caps[0].len()..].trim();

    if let Some(unit_caps) = LEADING_WORD.captures(rest) {
        if canonical_unit(&unit_caps[1]).is_some() {
            return ParsedIngredient {
                quantity: Some(quantity),
                unit: Some(unit_caps[1].to_string()),
                name: rest[unit_caps[0].len()..].trim().to_string(),
                original: line.to_string(),
            };
        }
    }

    ParsedIngredient {
        quantity: Some(quantity),
        unit: None,
        name: rest.to_string(),
        original: line.to_string(),
    }
}

/// Multiplies the leading quantity; "to taste" style lines come back untouched.
pub fn scale_ingredient(line: &str, factor: f64) -> String {
    let parsed = parse_ingredient(line);

    let Some(quantity) = parsed.quantity else {
        return line.to_string();
    };

    let scaled = format_quantity(quantity * factor);

    match parsed.unit {
        Some(unit) => format!("{scaled} {unit} {}", parsed.name),
        None => format!("{scaled} {}", parsed.name),
    }
}

pub fn scale_ingredients(
    lines: &[String],
    from_servings: f64,
    to_servings: f64,
) -> Result<Vec<String>, ScaleError> {
    for servings in [from_servings, to_servings] {
        if servings.is_nan() || servings <= 0.0 {
            return Err(ScaleError::InvalidServings(servings));
        }
    }

    let factor = to_servings / from_servings;

    Ok(lines
        .iter()
        .map(|line| scale_ingredient(line, factor))
        .collect())
}

/// Key used to decide two lines are "the same thing" on a shopping list.
pub fn normalize_ingredient_name(name: &str) -> String {
    let lower = name.to_lowercase();
    let without_comment = lower.split(',').next().unwrap_or_default();
    let without_notes = PARENTHETICAL.replace_all(without_comment, "");
    let without_descriptors = DESCRIPTORS.replace_all(&without_notes, "");
    let collapsed = WHITESPACE.replace_all(without_descriptors.trim(), " ");

    singularize(&collapsed)
}

fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{stem}y");
    }
    if let Some(stem) = word.strip_suffix("ves") {
        return format!("{stem}f");
    }
    if let Some(stem) = word.strip_suffix("oes") {
        return format!("{stem}o");
    }
    if word.ends_with("ses") || word.ends_with("ss") {
        return word.to_string();
    }
    if let Some(stem) = word.strip_suffix('s') {
        return stem.to_string();
    }

    word.to_string()
}
