use std::{fmt, str::FromStr, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Grocery store section an ingredient is shopped from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type), sqlx(type_name = "text"))]
pub enum Aisle {
    #[serde(rename = "Produce")]
    Produce,
    #[serde(rename = "Meat & Seafood")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Meat & Seafood"))]
    MeatSeafood,
    #[serde(rename = "Dairy & Eggs")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Dairy & Eggs"))]
    DairyEggs,
    #[serde(rename = "Bakery")]
    Bakery,
    #[serde(rename = "Pantry")]
    Pantry,
    #[serde(rename = "Frozen")]
    Frozen,
    #[serde(rename = "Spices")]
    Spices,
    #[serde(rename = "Condiments")]
    Condiments,
    #[serde(rename = "Beverages")]
    Beverages,
    #[serde(rename = "Other")]
    Other,
}

impl Aisle {
    /// Walk order of a store, also the order keyword matching is attempted in.
    pub const ORDER: [Aisle; 10] = [
        Aisle::Produce,
        Aisle::MeatSeafood,
        Aisle::DairyEggs,
        Aisle::Bakery,
        Aisle::Pantry,
        Aisle::Frozen,
        Aisle::Spices,
        Aisle::Condiments,
        Aisle::Beverages,
        Aisle::Other,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Aisle::Produce => "Produce",
            Aisle::MeatSeafood => "Meat & Seafood",
            Aisle::DairyEggs => "Dairy & Eggs",
            Aisle::Bakery => "Bakery",
            Aisle::Pantry => "Pantry",
            Aisle::Frozen => "Frozen",
            Aisle::Spices => "Spices",
            Aisle::Condiments => "Condiments",
            Aisle::Beverages => "Beverages",
            Aisle::Other => "Other",
        }
    }

    pub fn position(self) -> usize {
        Self::ORDER
            .iter()
            .position(|a| *a == self)
            .unwrap_or(Self::ORDER.len())
    }

    fn keywords(self) -> &'static [&'static str] {
        match self {
            Aisle::Produce => &[
                "lettuce",
                "tomato",
                "onion",
                "garlic",
                "pepper",
                "carrot",
                "celery",
                "potato",
                "spinach",
                "kale",
                "broccoli",
                "cauliflower",
                "cucumber",
                "zucchini",
                "squash",
                "mushroom",
                "apple",
                "banana",
                "orange",
                "lemon",
                "lime",
                "berry",
                "fruit",
                "vegetable",
                "herb",
                "basil",
                "cilantro",
                "parsley",
                "mint",
                "avocado",
            ],
            Aisle::MeatSeafood => &[
                "chicken", "beef", "pork", "lamb", "turkey", "fish", "salmon", "shrimp", "bacon",
                "sausage", "steak", "ground", "meat", "seafood", "tuna", "cod", "tilapia",
            ],
            Aisle::DairyEggs => &[
                "milk",
                "cheese",
                "butter",
                "cream",
                "yogurt",
                "egg",
                "sour cream",
                "cottage",
                "ricotta",
                "mozzarella",
                "cheddar",
                "parmesan",
            ],
            Aisle::Bakery => &[
                "bread",
                "roll",
                "bun",
                "bagel",
                "tortilla",
                "pita",
                "croissant",
                "muffin",
                "baguette",
            ],
            Aisle::Pantry => &[
                "flour",
                "sugar",
                "rice",
                "pasta",
                "noodle",
                "oil",
                "vinegar",
                "sauce",
                "broth",
                "stock",
                "can",
                "bean",
                "lentil",
                "chickpea",
                "oat",
                "cereal",
                "honey",
                "maple",
                "soy sauce",
                "sriracha",
            ],
            Aisle::Frozen => &["frozen", "ice cream"],
            Aisle::Spices => &[
                "salt",
                "pepper",
                "cumin",
                "paprika",
                "oregano",
                "thyme",
                "rosemary",
                "cinnamon",
                "nutmeg",
                "ginger",
                "turmeric",
                "chili",
                "cayenne",
                "spice",
                "seasoning",
                "fennel",
                "cardamom",
                "coriander",
                "clove",
                "allspice",
                "anise",
                "caraway",
                "dill",
                "mustard seed",
            ],
            Aisle::Condiments => &[
                "ketchup",
                "mustard",
                "mayo",
                "mayonnaise",
                "relish",
                "hot sauce",
                "bbq",
                "dressing",
                "salsa",
            ],
            // Matched as whole words, see `BEVERAGES`
            Aisle::Beverages | Aisle::Other => &[],
        }
    }
}

// "tea" must not match "teaspoon"
static BEVERAGES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(juice|soda|water|coffee|tea|wine|beer)\b").expect("static regex compiles")
});

impl fmt::Display for Aisle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Aisle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ORDER
            .iter()
            .copied()
            .find(|a| a.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown aisle: {s}"))
    }
}

/// First aisle in [`Aisle::ORDER`] with a keyword hit wins; nothing matching lands in `Other`.
pub fn categorize(ingredient: &str) -> Aisle {
    let lower = ingredient.to_lowercase();

    for aisle in Aisle::ORDER {
        let hit = match aisle {
            Aisle::Beverages => BEVERAGES.is_match(&lower),
            Aisle::Other => true,
            _ => aisle.keywords().iter().any(|k| lower.contains(k)),
        };

        if hit {
            return aisle;
        }
    }

    Aisle::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produce_and_meat() {
        assert_eq!(categorize("2 Roma tomatoes, diced"), Aisle::Produce);
        assert_eq!(categorize("1 lb boneless chicken thighs"), Aisle::MeatSeafood);
        assert_eq!(categorize("1 lb ground turkey"), Aisle::MeatSeafood);
    }

    #[test]
    fn first_match_wins() {
        // pepper is a produce keyword before it is a spice keyword
        assert_eq!(categorize("black pepper"), Aisle::Produce);
        // cream is dairy before the frozen aisle is consulted
        assert_eq!(categorize("vanilla ice cream"), Aisle::DairyEggs);
        assert_eq!(categorize("orange juice"), Aisle::Produce);
    }

    #[test]
    fn beverages_need_whole_words() {
        assert_eq!(categorize("1 bottle sparkling water"), Aisle::Beverages);
        assert_eq!(categorize("2 bags green tea"), Aisle::Beverages);
        assert_eq!(categorize("1 teaspoon vanilla extract"), Aisle::Other);
    }

    #[test]
    fn everything_lands_somewhere() {
        for input in ["", "   ", "zzz", "xanthan gum", "¯\\_(ツ)_/¯"] {
            assert_eq!(categorize(input), Aisle::Other);
        }

        assert_eq!(categorize("Whole MILK"), Aisle::DairyEggs);
        assert_eq!(categorize("6 bagels"), Aisle::Bakery);
        assert_eq!(categorize("2 cups flour"), Aisle::Pantry);
        assert_eq!(categorize("frozen peas"), Aisle::Frozen);
        assert_eq!(categorize("1 tsp kosher salt"), Aisle::Spices);
        assert_eq!(categorize("ketchup"), Aisle::Condiments);
    }

    #[test]
    fn deterministic() {
        let inputs = ["1 cup rice", "salmon fillet", "dijon mustard", "nothing useful"];
        for input in inputs {
            assert_eq!(categorize(input), categorize(input));
        }
    }

    #[test]
    fn names_round_trip() {
        for aisle in Aisle::ORDER {
            assert_eq!(aisle.name().parse::<Aisle>().unwrap(), aisle);
            assert_eq!(
                serde_json::to_string(&aisle).unwrap(),
                format!("\"{}\"", aisle.name())
            );
        }
        assert!("Hardware".parse::<Aisle>().is_err());
    }
}
