use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::quantity::parse_quantity;
use super::recipe::RecipeWithIngredients;

/// Decimal places kept on a consolidated quantity. Sums stay exact until
/// this last step, so only repeating fractions like `1/3` are rounded.
pub const QUANTITY_SCALE: i64 = 6;

/// How two ingredients are decided to be the same grocery item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyMode {
    /// Exact, case-sensitive match on item name and unit.
    #[default]
    #[serde(rename = "exact")]
    Exact,
    /// Match after trimming, collapsing whitespace and lowercasing.
    #[serde(rename = "normalized")]
    Normalized,
}

impl fmt::Display for KeyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMode::Exact => write!(f, "exact"),
            KeyMode::Normalized => write!(f, "normalized"),
        }
    }
}

impl std::str::FromStr for KeyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(KeyMode::Exact),
            "normalized" => Ok(KeyMode::Normalized),
            _ => Err(format!("Unknown grocery key mode: {s}")),
        }
    }
}

impl KeyMode {
    fn key(self, item_name: &str, unit: &str) -> (String, String) {
        match self {
            KeyMode::Exact => (item_name.to_owned(), unit.to_owned()),
            KeyMode::Normalized => (normalize(item_name), normalize(unit)),
        }
    }
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// One ingredient as the recipe store hands it over. `quantity` is free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngredientLine {
    pub item_name: String,
    pub quantity: String,
    pub unit_of_measurement: String,
    pub notes: Option<String>,
}

/// A recipe's ingredient list. `ingredients` is `None` when the list was
/// missing altogether, which is a malformed input rather than an empty recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidationSource {
    pub recipe_id: Uuid,
    pub ingredients: Option<Vec<IngredientLine>>,
}

impl From<&RecipeWithIngredients> for ConsolidationSource {
    fn from(recipe: &RecipeWithIngredients) -> Self {
        Self {
            recipe_id: recipe.recipe.recipe_id,
            ingredients: Some(
                recipe
                    .ingredients
                    .iter()
                    .map(|i| IngredientLine {
                        item_name: i.item_name.clone(),
                        quantity: i.quantity.clone(),
                        unit_of_measurement: i.unit_of_measurement.clone(),
                        notes: i.notes.clone(),
                    })
                    .collect(),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroceryItemDraft {
    pub item_name: String,
    pub quantity: BigDecimal,
    pub unit_of_measurement: String,
}

/// An ingredient whose quantity could not be evaluated and counted as zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityWarning {
    pub recipe_id: Uuid,
    pub item_name: String,
    pub quantity: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Consolidation {
    pub items: Vec<GroceryItemDraft>,
    pub warnings: Vec<QuantityWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsolidationError {
    #[error("recipe {recipe_id} is missing its ingredient list")]
    MissingIngredients { recipe_id: Uuid },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Consolidator {
    key_mode: KeyMode,
}

impl Consolidator {
    pub fn new(key_mode: KeyMode) -> Self {
        Self { key_mode }
    }

    pub fn key_mode(&self) -> KeyMode {
        self.key_mode
    }

    /// Merges the ingredient lists of `sources` into grocery items.
    ///
    /// Items are keyed on (item name, unit) according to the configured
    /// [`KeyMode`] and come out in the order each key was first seen. A
    /// quantity that does not evaluate contributes zero and is reported in
    /// [`Consolidation::warnings`]; only a missing ingredient list fails.
    #[tracing::instrument(skip_all, fields(recipes = sources.len(), key_mode = %self.key_mode))]
    pub fn consolidate(
        &self,
        sources: &[ConsolidationSource],
    ) -> Result<Consolidation, ConsolidationError> {
        let mut positions: HashMap<(String, String), usize> = HashMap::new();
        let mut consolidation = Consolidation::default();

        for source in sources {
            let ingredients =
                source
                    .ingredients
                    .as_ref()
                    .ok_or(ConsolidationError::MissingIngredients {
                        recipe_id: source.recipe_id,
                    })?;

            for ingredient in ingredients {
                let contribution = match parse_quantity(&ingredient.quantity) {
                    Ok(value) => value,
                    Err(err) => {
                        tracing::warn!(
                            recipe_id = %source.recipe_id,
                            item_name = %ingredient.item_name,
                            quantity = %ingredient.quantity,
                            error = %err,
                            "Invalid quantity, counting it as zero"
                        );
                        consolidation.warnings.push(QuantityWarning {
                            recipe_id: source.recipe_id,
                            item_name: ingredient.item_name.clone(),
                            quantity: ingredient.quantity.clone(),
                            reason: err.to_string(),
                        });
                        BigDecimal::zero()
                    }
                };

                let key = self
                    .key_mode
                    .key(&ingredient.item_name, &ingredient.unit_of_measurement);
                match positions.entry(key) {
                    Entry::Occupied(entry) => {
                        consolidation.items[*entry.get()].quantity += contribution;
                    }
                    Entry::Vacant(entry) => {
                        entry.insert(consolidation.items.len());
                        consolidation.items.push(GroceryItemDraft {
                            item_name: ingredient.item_name.clone(),
                            quantity: contribution,
                            unit_of_measurement: ingredient.unit_of_measurement.clone(),
                        });
                    }
                }
            }
        }

        for item in &mut consolidation.items {
            item.quantity = tidy(&item.quantity);
        }

        tracing::debug!(
            items = consolidation.items.len(),
            warnings = consolidation.warnings.len(),
            "Consolidated ingredients"
        );

        Ok(consolidation)
    }
}

/// Rounds to [`QUANTITY_SCALE`] and drops trailing fractional zeros, keeping
/// whole numbers at scale zero so they print without an exponent.
fn tidy(quantity: &BigDecimal) -> BigDecimal {
    let rounded = quantity.round(QUANTITY_SCALE).normalized();
    let (_, scale) = rounded.as_bigint_and_exponent();
    if scale < 0 {
        rounded.with_scale(0)
    } else {
        rounded
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn line(item_name: &str, quantity: &str, unit: &str) -> IngredientLine {
        IngredientLine {
            item_name: item_name.to_string(),
            quantity: quantity.to_string(),
            unit_of_measurement: unit.to_string(),
            notes: None,
        }
    }

    fn source(lines: Vec<IngredientLine>) -> ConsolidationSource {
        ConsolidationSource {
            recipe_id: Uuid::new_v4(),
            ingredients: Some(lines),
        }
    }

    fn draft(item_name: &str, quantity: &str, unit: &str) -> GroceryItemDraft {
        GroceryItemDraft {
            item_name: item_name.to_string(),
            quantity: dec(quantity),
            unit_of_measurement: unit.to_string(),
        }
    }

    #[test]
    fn merges_across_recipes_in_first_seen_order() {
        let recipes = vec![
            source(vec![line("flour", "1", "cup")]),
            source(vec![line("flour", "0.5", "cup"), line("salt", "1", "tsp")]),
        ];

        let result = Consolidator::default().consolidate(&recipes).unwrap();

        assert_eq!(
            result.items,
            vec![draft("flour", "1.5", "cup"), draft("salt", "1", "tsp")]
        );
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn sums_decimal_quantities() {
        let recipes = vec![
            source(vec![line("sugar", "2", "cup")]),
            source(vec![line("sugar", "1.5", "cup")]),
        ];

        let result = Consolidator::default().consolidate(&recipes).unwrap();

        assert_eq!(result.items, vec![draft("sugar", "3.5", "cup")]);
    }

    #[test]
    fn keeps_different_units_apart() {
        let recipes = vec![source(vec![
            line("butter", "2", "tbsp"),
            line("butter", "1", "cup"),
        ])];

        let result = Consolidator::default().consolidate(&recipes).unwrap();

        assert_eq!(
            result.items,
            vec![draft("butter", "2", "tbsp"), draft("butter", "1", "cup")]
        );
    }

    #[test]
    fn unparseable_quantity_counts_as_zero_with_warning() {
        let recipe = source(vec![
            line("eggs", "2", "whole"),
            line("eggs", "abc", "whole"),
            line("pepper", "to taste", ""),
            line("milk", "1/2", "cup"),
        ]);
        let recipe_id = recipe.recipe_id;

        let result = Consolidator::default().consolidate(&[recipe]).unwrap();

        assert_eq!(
            result.items,
            vec![
                draft("eggs", "2", "whole"),
                draft("pepper", "0", ""),
                draft("milk", "0.5", "cup"),
            ]
        );
        assert_eq!(result.warnings.len(), 2);
        assert_eq!(result.warnings[0].recipe_id, recipe_id);
        assert_eq!(result.warnings[0].item_name, "eggs");
        assert_eq!(result.warnings[0].quantity, "abc");
        assert_eq!(result.warnings[1].item_name, "pepper");
    }

    #[test]
    fn empty_input_gives_empty_list() {
        let result = Consolidator::default().consolidate(&[]).unwrap();

        assert!(result.items.is_empty());
        assert!(result.warnings.is_empty());

        let result = Consolidator::default()
            .consolidate(&[source(vec![])])
            .unwrap();
        assert!(result.items.is_empty());
    }

    #[test]
    fn missing_ingredient_list_is_invalid_input() {
        let recipe_id = Uuid::new_v4();
        let recipes = vec![
            source(vec![line("flour", "1", "cup")]),
            ConsolidationSource {
                recipe_id,
                ingredients: None,
            },
        ];

        let err = Consolidator::default().consolidate(&recipes).unwrap_err();

        assert_eq!(err, ConsolidationError::MissingIngredients { recipe_id });
    }

    #[test]
    fn exact_mode_is_case_sensitive() {
        let recipes = vec![source(vec![
            line("Flour", "1", "cup"),
            line("flour", "1", "Cup"),
            line("flour", "1", "cup"),
        ])];

        let result = Consolidator::new(KeyMode::Exact)
            .consolidate(&recipes)
            .unwrap();

        assert_eq!(result.items.len(), 3);
    }

    #[test]
    fn normalized_mode_merges_formatting_differences() {
        let recipes = vec![
            source(vec![line("Brown  Sugar", "1", "Cup")]),
            source(vec![line(" brown sugar", "2", "cup ")]),
        ];

        let result = Consolidator::new(KeyMode::Normalized)
            .consolidate(&recipes)
            .unwrap();

        assert_eq!(result.items, vec![draft("Brown  Sugar", "3", "Cup")]);
    }

    #[test]
    fn repeated_consolidation_is_deterministic() {
        let recipes = vec![
            source(vec![
                line("onion", "1", "whole"),
                line("garlic", "3", "clove"),
                line("olive oil", "2", "tbsp"),
            ]),
            source(vec![
                line("garlic", "2", "clove"),
                line("tomato", "4", "whole"),
                line("onion", "1/2", "whole"),
            ]),
        ];
        let consolidator = Consolidator::default();

        let first = consolidator.consolidate(&recipes).unwrap();
        let second = consolidator.consolidate(&recipes).unwrap();

        assert_eq!(first, second);
        let names: Vec<&str> = first.items.iter().map(|i| i.item_name.as_str()).collect();
        assert_eq!(names, vec!["onion", "garlic", "olive oil", "tomato"]);
        assert_eq!(first.items[0].quantity, dec("1.5"));
        assert_eq!(first.items[1].quantity, dec("5"));
    }

    #[test]
    fn decimal_sums_have_no_binary_noise() {
        let recipes = vec![
            source(vec![line("milk", "0.1", "cup")]),
            source(vec![line("milk", "0.2", "cup")]),
        ];

        let result = Consolidator::default().consolidate(&recipes).unwrap();

        assert_eq!(result.items, vec![draft("milk", "0.3", "cup")]);
        assert_eq!(result.items[0].quantity.to_string(), "0.3");
    }

    #[test]
    fn huge_quantities_sum_exactly() {
        let nines = "9".repeat(200);
        let recipes = vec![
            source(vec![line("milk", &nines, "cup")]),
            source(vec![line("milk", &nines, "cup")]),
        ];

        let result = Consolidator::default().consolidate(&recipes).unwrap();

        assert!(result.warnings.is_empty());
        assert_eq!(result.items[0].quantity, dec(&nines) * BigDecimal::from(2));

        let json = serde_json::to_string(&result.items[0]).unwrap();
        let back: GroceryItemDraft = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result.items[0]);
    }

    #[test]
    fn repeating_fractions_round_at_the_end() {
        let recipes = vec![source(vec![
            line("flour", "1/3", "cup"),
            line("flour", "1/3", "cup"),
            line("flour", "1/3", "cup"),
            line("sugar", "2/3", "cup"),
        ])];

        let result = Consolidator::default().consolidate(&recipes).unwrap();

        assert_eq!(result.items[0].quantity.to_string(), "1");
        assert_eq!(result.items[1].quantity.to_string(), "0.666667");
    }

    #[test]
    fn key_mode_from_str() {
        assert_eq!("exact".parse::<KeyMode>(), Ok(KeyMode::Exact));
        assert_eq!("normalized".parse::<KeyMode>(), Ok(KeyMode::Normalized));
        assert!("fuzzy".parse::<KeyMode>().is_err());
    }
}
