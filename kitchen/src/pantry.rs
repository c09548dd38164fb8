use std::{collections::HashSet, fmt, str::FromStr, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ingredient::{normalize_ingredient_name, parse_ingredient};

/// Photo detections below this are discarded.
pub const MIN_CONFIDENCE: f64 = 0.8;
pub const MAX_SCAN_BYTES: usize = 5 * 1024 * 1024;
pub const SCAN_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];
pub const SUGGESTION_LIMIT: usize = 5;

macro_rules! text_enum {
    ($name:ident, $what:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[cfg_attr(
            feature = "sqlx",
            derive(sqlx::Type),
            sqlx(type_name = "text", rename_all = "snake_case")
        )]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!(concat!("Unknown ", $what, ": {}"), s)),
                }
            }
        }

    };
}

text_enum!(PantrySource, "pantry source", {
    Manual => "manual",
    Scan => "scan",
    Barcode => "barcode",
});

text_enum!(ScanStatus, "scan status", {
    Processing => "processing",
    Completed => "completed",
    Failed => "failed",
});

text_enum!(ScanType, "scan type", {
    Fridge => "fridge",
    Pantry => "pantry",
    Receipt => "receipt",
    Other => "other",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedItem {
    pub ingredient: String,
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub confidence: f64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScanUploadError {
    #[error("Unsupported image type {0}, expected JPEG, PNG or WebP")]
    UnsupportedType(String),
    #[error("Image is {0} bytes, the limit is 5 MB")]
    TooLarge(usize),
    #[error("Image is empty")]
    Empty,
}

pub fn validate_scan_upload(mime: &str, len: usize) -> Result<(), ScanUploadError> {
    if !SCAN_MIME_TYPES.contains(&mime) {
        return Err(ScanUploadError::UnsupportedType(mime.to_string()));
    }
    if len == 0 {
        return Err(ScanUploadError::Empty);
    }
    if len > MAX_SCAN_BYTES {
        return Err(ScanUploadError::TooLarge(len));
    }
    Ok(())
}

static JSON_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[.*\]").expect("static regex compiles"));

/// Pulls the JSON array out of a model reply that may wrap it in prose or code fences.
///
/// A reply without an array means nothing was recognized.
pub fn parse_detected_items(reply: &str) -> Result<Vec<DetectedItem>, serde_json::Error> {
    let Some(array) = JSON_ARRAY.find(reply) else {
        return Ok(Vec::new());
    };

    let items: Vec<DetectedItem> = serde_json::from_str(array.as_str())?;

    Ok(items
        .into_iter()
        .filter(|item| item.confidence >= MIN_CONFIDENCE && !item.ingredient.trim().is_empty())
        .collect())
}

/// Normalized names of everything in a household's pantry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PantryLookup(HashSet<String>);

impl PantryLookup {
    pub fn new<S: AsRef<str>>(names: impl IntoIterator<Item = S>) -> Self {
        Self(
            names
                .into_iter()
                .map(|n| normalize_ingredient_name(n.as_ref()))
                .filter(|n| !n.is_empty())
                .collect(),
        )
    }

    pub fn contains(&self, ingredient: &str) -> bool {
        self.0.contains(&normalize_ingredient_name(ingredient))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn loosely_has(&self, ingredient: &str) -> bool {
        !ingredient.is_empty()
            && self
                .0
                .iter()
                .any(|have| ingredient.contains(have.as_str()) || have.contains(ingredient))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecipe {
    pub recipe_id: Uuid,
    pub title: String,
    pub prep_time: Option<String>,
    pub cook_time: Option<String>,
    pub ingredients: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeSuggestion {
    pub recipe_id: Uuid,
    pub title: String,
    pub prep_time: Option<String>,
    pub cook_time: Option<String>,
    pub matching_ingredients: usize,
    pub total_ingredients: usize,
    pub missing_ingredients: usize,
    pub score: f64,
}

/// Ranks recipes by the share of their ingredients already on hand.
pub fn suggest_recipes(
    pantry: &PantryLookup,
    recipes: &[CandidateRecipe],
    limit: usize,
) -> Vec<RecipeSuggestion> {
    let mut suggestions: Vec<RecipeSuggestion> = recipes
        .iter()
        .filter_map(|recipe| {
            let names: Vec<String> = recipe
                .ingredients
                .iter()
                .filter(|line| !line.trim().is_empty())
                .map(|line| normalize_ingredient_name(&parse_ingredient(line).name))
                .collect();

            let total = names.len();
            let matching = names.iter().filter(|n| pantry.loosely_has(n)).count();
            if matching == 0 {
                return None;
            }

            Some(RecipeSuggestion {
                recipe_id: recipe.recipe_id,
                title: recipe.title.clone(),
                prep_time: recipe.prep_time.clone(),
                cook_time: recipe.cook_time.clone(),
                matching_ingredients: matching,
                total_ingredients: total,
                missing_ingredients: total - matching,
                score: matching as f64 / total as f64,
            })
        })
        .collect();

    suggestions.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.title.cmp(&b.title))
    });
    suggestions.truncate(limit);

    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detections_are_filtered_by_confidence() {
        let reply = r#"Here is what I found:
```json
[
  {"ingredient": "milk", "quantity": "1 gallon", "category": "Dairy", "confidence": 0.95},
  {"ingredient": "eggs", "category": "Dairy", "confidence": 0.8},
  {"ingredient": "mystery jar", "confidence": 0.4}
]
```"#;

        let items = parse_detected_items(reply).unwrap();

        let names: Vec<_> = items.iter().map(|i| i.ingredient.as_str()).collect();
        assert_eq!(names, vec!["milk", "eggs"]);
        assert_eq!(items[1].quantity, None);
    }

    #[test]
    fn replies_without_arrays() {
        assert!(parse_detected_items("I can't see any food.").unwrap().is_empty());
        assert!(parse_detected_items("[]").unwrap().is_empty());
        assert!(parse_detected_items("[{\"nope\": true}]").is_err());
    }

    #[test]
    fn uploads() {
        assert!(validate_scan_upload("image/png", 1024).is_ok());
        assert_eq!(
            validate_scan_upload("image/gif", 1024),
            Err(ScanUploadError::UnsupportedType("image/gif".to_string()))
        );
        assert_eq!(
            validate_scan_upload("image/jpeg", MAX_SCAN_BYTES + 1),
            Err(ScanUploadError::TooLarge(MAX_SCAN_BYTES + 1))
        );
        assert_eq!(validate_scan_upload("image/webp", 0), Err(ScanUploadError::Empty));
    }

    #[test]
    fn lookup_normalizes() {
        let pantry = PantryLookup::new(["Fresh Tomatoes", "eggs", ""]);

        assert_eq!(pantry.len(), 2);
        assert!(pantry.contains("tomato"));
        assert!(pantry.contains("Eggs"));
        assert!(!pantry.contains("milk"));
    }

    #[test]
    fn suggestions_rank_by_share_on_hand() {
        let pantry = PantryLookup::new(["egg", "cheddar cheese", "spinach"]);
        let recipe = |title: &str, ingredients: &[&str]| CandidateRecipe {
            recipe_id: Uuid::new_v4(),
            title: title.to_string(),
            prep_time: None,
            cook_time: Some("10 min".to_string()),
            ingredients: ingredients.iter().map(ToString::to_string).collect(),
        };

        let recipes = vec![
            recipe("Omelette", &["3 eggs", "1/4 cup cheese", "1 cup spinach"]),
            recipe("Quiche", &["4 eggs", "1 pie crust", "1 cup milk", "1 onion"]),
            recipe("Toast", &["2 slices bread"]),
            recipe("Frittata", &["6 eggs", "2 potatoes"]),
        ];

        let suggestions = suggest_recipes(&pantry, &recipes, SUGGESTION_LIMIT);

        let titles: Vec<_> = suggestions.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Omelette", "Frittata", "Quiche"]);
        assert_eq!(suggestions[0].matching_ingredients, 3);
        assert_eq!(suggestions[2].missing_ingredients, 3);

        assert_eq!(suggest_recipes(&pantry, &recipes, 1).len(), 1);
    }

    #[test]
    fn text_enums() {
        assert_eq!("barcode".parse::<PantrySource>().unwrap(), PantrySource::Barcode);
        assert_eq!(ScanStatus::Processing.to_string(), "processing");
        assert!("photo".parse::<ScanType>().is_err());
        assert_eq!(
            serde_json::to_string(&ScanType::Fridge).unwrap(),
            "\"fridge\""
        );
    }
}
