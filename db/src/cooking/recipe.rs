use std::collections::HashMap;

use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::ingredients::{Ingredient, NewIngredient};
use super::CookingError;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Recipe {
    pub recipe_id: Uuid,
    pub title: String,
    pub instructions: Vec<String>,
    pub prep_time: i32, // minutes
    pub cook_time: i32, // minutes
    pub serving_size: i32,
    pub calories_per_serving: Option<i32>,
    pub img_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeWithIngredients {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub ingredients: Vec<Ingredient>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecipe {
    pub title: String,
    #[serde(default, deserialize_with = "instruction_steps")]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub ingredients: Vec<NewIngredient>,
    #[serde(default)]
    pub prep_time: i32,
    #[serde(default)]
    pub cook_time: i32,
    #[serde(default = "default_serving_size")]
    pub serving_size: i32,
    #[serde(default)]
    pub calories_per_serving: Option<i32>,
    #[serde(default)]
    pub img_url: Option<String>,
}

fn default_serving_size() -> i32 {
    1
}

/// Instructions arrive either as a list of steps or as one block of text with
/// a step per line.
fn instruction_steps<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Steps(Vec<String>),
        Text(String),
    }

    let steps = match Raw::deserialize(deserializer)? {
        Raw::Steps(steps) => steps,
        Raw::Text(text) => text.lines().map(str::to_owned).collect(),
    };

    Ok(steps
        .into_iter()
        .map(|step| step.trim().to_owned())
        .filter(|step| !step.is_empty())
        .collect())
}

impl NewRecipe {
    pub fn validate(&self) -> Result<(), CookingError> {
        if self.title.trim().is_empty() {
            return Err(CookingError::InvalidInput(
                "recipe title must not be empty".to_string(),
            ));
        }
        if self.prep_time < 0 || self.cook_time < 0 {
            return Err(CookingError::InvalidInput(
                "prep and cook times must not be negative".to_string(),
            ));
        }
        if self.serving_size < 1 {
            return Err(CookingError::InvalidInput(
                "serving size must be at least 1".to_string(),
            ));
        }
        if let Some(position) = self
            .ingredients
            .iter()
            .position(|i| i.item_name.trim().is_empty())
        {
            return Err(CookingError::InvalidInput(format!(
                "ingredient {} is missing an item name",
                position + 1
            )));
        }

        Ok(())
    }
}

const RECIPE_COLUMNS: &str = "
    recipe_id,
    title,
    instructions,
    prep_time,
    cook_time,
    serving_size,
    calories_per_serving,
    img_url,
    created_at,
    updated_at
";

impl Recipe {
    /// Inserts the recipe and its ingredients in one transaction.
    #[tracing::instrument(skip(pool, new_recipe), fields(title = %new_recipe.title), err)]
    pub async fn create(
        pool: &PgPool,
        new_recipe: NewRecipe,
    ) -> Result<RecipeWithIngredients, CookingError> {
        new_recipe.validate()?;

        let mut transaction = pool.begin().await?;

        let recipe = sqlx::query_as::<_, Recipe>(&format!(
            "
            INSERT INTO recipes (
                title, instructions, prep_time, cook_time,
                serving_size, calories_per_serving, img_url
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {RECIPE_COLUMNS}
            "
        ))
        .bind(new_recipe.title.trim())
        .bind(&new_recipe.instructions)
        .bind(new_recipe.prep_time)
        .bind(new_recipe.cook_time)
        .bind(new_recipe.serving_size)
        .bind(new_recipe.calories_per_serving)
        .bind(&new_recipe.img_url)
        .fetch_one(&mut *transaction)
        .await?;

        let ingredients =
            Ingredient::insert_for_recipe(&mut transaction, recipe.recipe_id, &new_recipe.ingredients)
                .await?;

        transaction.commit().await?;

        tracing::info!(recipe_id = %recipe.recipe_id, "Created recipe");

        Ok(RecipeWithIngredients {
            recipe,
            ingredients,
        })
    }

    pub async fn get_by_id(pool: &PgPool, recipe_id: Uuid) -> Result<Option<RecipeWithIngredients>> {
        let mut conn = pool.acquire().await?;
        let mut found = Self::load_with_ingredients(&mut conn, &[recipe_id]).await?;

        Ok(found.remove(&recipe_id))
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<RecipeWithIngredients>> {
        let mut conn = pool.acquire().await?;

        let recipes = sqlx::query_as::<_, Recipe>(&format!(
            "
            SELECT {RECIPE_COLUMNS}
            FROM recipes
            ORDER BY created_at, recipe_id
            "
        ))
        .fetch_all(&mut *conn)
        .await?;

        let ids: Vec<Uuid> = recipes.iter().map(|r| r.recipe_id).collect();
        let mut by_recipe = group_ingredients(Ingredient::get_by_recipes(&mut conn, &ids).await?);

        Ok(recipes
            .into_iter()
            .map(|recipe| {
                let ingredients = by_recipe.remove(&recipe.recipe_id).unwrap_or_default();
                RecipeWithIngredients {
                    recipe,
                    ingredients,
                }
            })
            .collect())
    }

    /// Loads the given recipes with their ingredients, keyed by id. Ids that
    /// do not exist are simply absent from the map.
    pub(crate) async fn load_with_ingredients(
        conn: &mut PgConnection,
        recipe_ids: &[Uuid],
    ) -> sqlx::Result<HashMap<Uuid, RecipeWithIngredients>> {
        let recipes = sqlx::query_as::<_, Recipe>(&format!(
            "
            SELECT {RECIPE_COLUMNS}
            FROM recipes
            WHERE recipe_id = ANY($1)
            "
        ))
        .bind(recipe_ids)
        .fetch_all(&mut *conn)
        .await?;

        let mut by_recipe = group_ingredients(Ingredient::get_by_recipes(conn, recipe_ids).await?);

        Ok(recipes
            .into_iter()
            .map(|recipe| {
                let ingredients = by_recipe.remove(&recipe.recipe_id).unwrap_or_default();
                (
                    recipe.recipe_id,
                    RecipeWithIngredients {
                        recipe,
                        ingredients,
                    },
                )
            })
            .collect())
    }
}

fn group_ingredients(ingredients: Vec<Ingredient>) -> HashMap<Uuid, Vec<Ingredient>> {
    let mut by_recipe: HashMap<Uuid, Vec<Ingredient>> = HashMap::new();
    for ingredient in ingredients {
        by_recipe
            .entry(ingredient.recipe_id)
            .or_default()
            .push(ingredient);
    }
    by_recipe
}
