use uuid::Uuid;

pub mod consolidate;
pub mod grocery;
pub mod ingredients;
pub mod inventory;
pub mod meal_planning;
pub mod quantity;
pub mod recipe;

pub use consolidate::{
    Consolidation, ConsolidationError, ConsolidationSource, Consolidator, GroceryItemDraft,
    IngredientLine, KeyMode, QuantityWarning,
};
pub use grocery::{GroceryList, GroceryListItem};
pub use ingredients::{Ingredient, NewIngredient};
pub use inventory::{CategoryGroup, InventoryCategory, InventoryItem, InventoryUpdate, NewInventoryItem};
pub use meal_planning::{MealPlan, MealPlanCreated, MealPlanRecipe, MealPlanWithRecipes, NewMealPlan};
pub use quantity::{parse_quantity, QuantityError};
pub use recipe::{NewRecipe, Recipe, RecipeWithIngredients};

/// Failures of the cooking workflows that callers need to tell apart.
#[derive(Debug, thiserror::Error)]
pub enum CookingError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("database operation failed")]
    Persistence(#[from] sqlx::Error),

    /// The meal plan rows were written but the grocery list insert failed.
    /// The surrounding transaction is rolled back, so nothing is left behind,
    /// and the caller can retry the whole request.
    #[error("grocery list creation failed; meal plan was rolled back")]
    GroceryListCreation {
        #[source]
        source: sqlx::Error,
    },
}

impl CookingError {
    pub fn code(&self) -> &'static str {
        match self {
            CookingError::InvalidInput(_) => "invalid_input",
            CookingError::NotFound { .. } => "not_found",
            CookingError::Persistence(_) => "persistence",
            CookingError::GroceryListCreation { .. } => "grocery_list_creation_failed",
        }
    }
}

impl From<ConsolidationError> for CookingError {
    fn from(err: ConsolidationError) -> Self {
        CookingError::InvalidInput(err.to_string())
    }
}
