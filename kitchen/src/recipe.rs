use std::fmt::Write;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MAX_TITLE_LEN: usize = 200;

/// A recipe as submitted by a user, before it is stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeDraft {
    pub title: String,
    pub recipe_type: Option<String>,
    pub category: Option<String>,
    pub prep_time: Option<String>,
    pub cook_time: Option<String>,
    pub servings: Option<i32>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub tags: Vec<String>,
    pub source_url: Option<String>,
    pub notes: Option<String>,
    pub is_public: bool,
    pub is_shared_with_household: bool,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Title is required")]
    MissingTitle,
    #[error("Title must be at most 200 characters")]
    TitleTooLong,
    #[error("Servings must be greater than zero, got {0}")]
    InvalidServings(i32),
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn non_blank_lines(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

impl RecipeDraft {
    /// Trims and tidies the draft, rejecting it when it can't be stored.
    pub fn validate(self) -> Result<Self, ValidationError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(ValidationError::MissingTitle);
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(ValidationError::TitleTooLong);
        }

        if let Some(servings) = self.servings {
            if servings <= 0 {
                return Err(ValidationError::InvalidServings(servings));
            }
        }

        let tags = self
            .tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .unique()
            .collect();

        Ok(Self {
            title,
            recipe_type: blank_to_none(self.recipe_type),
            category: blank_to_none(self.category),
            prep_time: blank_to_none(self.prep_time),
            cook_time: blank_to_none(self.cook_time),
            servings: self.servings,
            ingredients: non_blank_lines(self.ingredients),
            instructions: non_blank_lines(self.instructions),
            tags,
            source_url: blank_to_none(self.source_url),
            notes: blank_to_none(self.notes),
            is_public: self.is_public,
            is_shared_with_household: self.is_shared_with_household,
        })
    }
}

/// What a viewer may do with a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    None,
    View,
    Edit,
}

/// Who owns a recipe and how widely it is shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownership {
    pub user_id: Uuid,
    pub household_id: Option<Uuid>,
    pub is_shared_with_household: bool,
    pub is_public: bool,
}

impl Access {
    pub fn for_viewer(recipe: Ownership, viewer_id: Uuid, viewer_household: Option<Uuid>) -> Self {
        if recipe.user_id == viewer_id {
            return Access::Edit;
        }

        let same_household = recipe.household_id.is_some() && recipe.household_id == viewer_household;
        if (same_household && recipe.is_shared_with_household) || recipe.is_public {
            return Access::View;
        }

        Access::None
    }

    pub fn can_view(self) -> bool {
        self >= Access::View
    }

    pub fn can_edit(self) -> bool {
        self == Access::Edit
    }
}

/// Markdown export, suitable for pasting into notes apps.
pub fn to_markdown(recipe: &RecipeDraft) -> String {
    let mut out = format!("# {}\n\n", recipe.title);

    let servings = recipe.servings.map(|s| s.to_string());
    let tags = (!recipe.tags.is_empty()).then(|| recipe.tags.join(", "));
    let meta = [
        ("Type", recipe.recipe_type.as_deref()),
        ("Category", recipe.category.as_deref()),
        ("Prep time", recipe.prep_time.as_deref()),
        ("Cook time", recipe.cook_time.as_deref()),
        ("Servings", servings.as_deref()),
        ("Tags", tags.as_deref()),
        ("Source", recipe.source_url.as_deref()),
    ];

    let mut any_meta = false;
    for (label, value) in meta {
        if let Some(value) = value {
            let _ = writeln!(out, "- **{label}:** {value}");
            any_meta = true;
        }
    }
    if any_meta {
        out.push('\n');
    }

    out.push_str("## Ingredients\n\n");
    for line in &recipe.ingredients {
        let _ = writeln!(out, "- {line}");
    }

    out.push_str("\n## Instructions\n\n");
    for (i, step) in recipe.instructions.iter().enumerate() {
        let _ = writeln!(out, "{}. {step}", i + 1);
    }

    if let Some(notes) = &recipe.notes {
        let _ = write!(out, "\n## Notes\n\n{notes}\n");
    }

    out
}

/// `"Mom's Best Chili!"` becomes `"moms-best-chili.md"`.
pub fn markdown_filename(title: &str) -> String {
    let slug = title
        .to_lowercase()
        .chars()
        .filter(|c| *c != '\'')
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|part| !part.is_empty())
        .join("-");

    if slug.is_empty() {
        "recipe.md".to_string()
    } else {
        format!("{slug}.md")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> RecipeDraft {
        RecipeDraft {
            title: "  Weeknight Chili ".to_string(),
            prep_time: Some("15 min".to_string()),
            cook_time: Some("  ".to_string()),
            servings: Some(4),
            ingredients: vec!["1 lb ground beef".to_string(), "  ".to_string(), "1 onion".to_string()],
            instructions: vec!["Brown the beef".to_string(), "Simmer".to_string()],
            tags: vec!["Dinner".to_string(), "dinner ".to_string(), "Spicy".to_string()],
            ..RecipeDraft::default()
        }
    }

    #[test]
    fn validation_tidies_drafts() {
        let recipe = draft().validate().unwrap();

        assert_eq!(recipe.title, "Weeknight Chili");
        assert_eq!(recipe.cook_time, None);
        assert_eq!(recipe.ingredients.len(), 2);
        assert_eq!(recipe.tags, vec!["dinner", "spicy"]);
    }

    #[test]
    fn validation_rejects() {
        let mut untitled = draft();
        untitled.title = "   ".to_string();
        assert_eq!(untitled.validate(), Err(ValidationError::MissingTitle));

        let mut empty = draft();
        empty.servings = Some(0);
        assert_eq!(empty.validate(), Err(ValidationError::InvalidServings(0)));

        let mut long = draft();
        long.title = "a".repeat(201);
        assert_eq!(long.validate(), Err(ValidationError::TitleTooLong));
    }

    #[test]
    fn access_levels() {
        let owner = Uuid::new_v4();
        let housemate = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let household = Some(Uuid::new_v4());

        let private = Ownership {
            user_id: owner,
            household_id: household,
            is_shared_with_household: false,
            is_public: false,
        };
        let shared = Ownership {
            is_shared_with_household: true,
            ..private
        };
        let public = Ownership {
            is_public: true,
            ..private
        };

        assert_eq!(Access::for_viewer(private, owner, household), Access::Edit);
        assert_eq!(Access::for_viewer(private, housemate, household), Access::None);
        assert_eq!(Access::for_viewer(shared, housemate, household), Access::View);
        assert_eq!(Access::for_viewer(shared, stranger, Some(Uuid::new_v4())), Access::None);
        assert_eq!(Access::for_viewer(public, stranger, None), Access::View);

        assert!(Access::View.can_view());
        assert!(!Access::View.can_edit());
        assert!(!Access::None.can_view());
    }

    #[test]
    fn markdown_export() {
        let recipe = draft().validate().unwrap();

        let markdown = to_markdown(&recipe);

        assert!(markdown.starts_with("# Weeknight Chili\n\n- **Prep time:** 15 min\n- **Servings:** 4\n"));
        assert!(markdown.contains("## Ingredients\n\n- 1 lb ground beef\n- 1 onion\n"));
        assert!(markdown.contains("## Instructions\n\n1. Brown the beef\n2. Simmer\n"));
        assert!(!markdown.contains("## Notes"));
    }

    #[test]
    fn filenames() {
        assert_eq!(markdown_filename("Mom's Best Chili!"), "moms-best-chili.md");
        assert_eq!(markdown_filename("  Pad Thai (v2) "), "pad-thai-v2.md");
        assert_eq!(markdown_filename("!!!"), "recipe.md");
    }
}
