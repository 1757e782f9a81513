use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::consolidate::{ConsolidationSource, Consolidator, QuantityWarning};
use super::grocery::GroceryList;
use super::recipe::Recipe;
use super::CookingError;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MealPlan {
    pub meal_plan_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// The slice of a recipe shown alongside a meal plan.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MealPlanRecipe {
    pub recipe_id: Uuid,
    pub title: String,
    pub img_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealPlanWithRecipes {
    #[serde(flatten)]
    pub meal_plan: MealPlan,
    pub recipes: Vec<MealPlanRecipe>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMealPlan {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub recipe_ids: Vec<Uuid>,
}

impl NewMealPlan {
    pub fn validate(&self) -> Result<(), CookingError> {
        if self.end_date < self.start_date {
            return Err(CookingError::InvalidInput(format!(
                "end date {} is before start date {}",
                self.end_date, self.start_date
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MealPlanCreated {
    pub meal_plan: MealPlan,
    pub grocery_list: GroceryList,
    pub warnings: Vec<QuantityWarning>,
}

#[derive(sqlx::FromRow)]
struct PlannedRecipeRow {
    meal_plan_id: Uuid,
    recipe_id: Uuid,
    title: String,
    img_url: Option<String>,
}

/// Builds consolidation input for `recipe_ids` in the given order. Repeated
/// ids are kept, so a recipe planned twice counts twice.
pub(crate) async fn consolidation_sources(
    conn: &mut PgConnection,
    recipe_ids: &[Uuid],
) -> Result<Vec<ConsolidationSource>, CookingError> {
    let recipes = Recipe::load_with_ingredients(conn, recipe_ids).await?;

    recipe_ids
        .iter()
        .map(|id| {
            recipes
                .get(id)
                .map(ConsolidationSource::from)
                .ok_or(CookingError::NotFound {
                    entity: "recipe",
                    id: *id,
                })
        })
        .collect()
}

const MEAL_PLAN_COLUMNS: &str = "meal_plan_id, start_date, end_date, created_at";

impl MealPlan {
    /// Creates the meal plan, its recipe links and its grocery list in a
    /// single transaction.
    ///
    /// A failure while writing the grocery list is reported as
    /// [`CookingError::GroceryListCreation`] and rolls the meal plan back
    /// with it, so a meal plan never exists without its grocery list.
    #[tracing::instrument(
        skip(pool, consolidator),
        fields(recipes = new_plan.recipe_ids.len()),
        err
    )]
    pub async fn create_with_grocery_list(
        pool: &PgPool,
        new_plan: NewMealPlan,
        consolidator: &Consolidator,
    ) -> Result<MealPlanCreated, CookingError> {
        new_plan.validate()?;

        let mut transaction = pool.begin().await?;

        let sources = consolidation_sources(&mut transaction, &new_plan.recipe_ids).await?;

        let meal_plan = sqlx::query_as::<_, MealPlan>(&format!(
            "
            INSERT INTO meal_plans (start_date, end_date)
            VALUES ($1, $2)
            RETURNING {MEAL_PLAN_COLUMNS}
            "
        ))
        .bind(new_plan.start_date)
        .bind(new_plan.end_date)
        .fetch_one(&mut *transaction)
        .await?;

        let positions: Vec<i32> = (0..new_plan.recipe_ids.len())
            .map(|p| i32::try_from(p).unwrap_or(i32::MAX))
            .collect();
        sqlx::query(
            "
            INSERT INTO meal_plan_recipes (meal_plan_id, recipe_id, position)
            SELECT $1, recipe_id, position
            FROM UNNEST($2::uuid[], $3::int4[]) AS t (recipe_id, position)
            ",
        )
        .bind(meal_plan.meal_plan_id)
        .bind(&new_plan.recipe_ids)
        .bind(positions)
        .execute(&mut *transaction)
        .await?;

        let consolidation = consolidator.consolidate(&sources)?;

        let inserted =
            GroceryList::insert(&mut transaction, meal_plan.meal_plan_id, &consolidation.items)
                .await;
        let grocery_list = match inserted {
            Ok(list) => list,
            Err(source) => {
                tracing::error!(
                    meal_plan_id = %meal_plan.meal_plan_id,
                    error = %source,
                    "Grocery list creation failed, rolling back meal plan"
                );
                if let Err(rollback_error) = transaction.rollback().await {
                    tracing::error!(error = %rollback_error, "Rollback failed");
                }
                return Err(CookingError::GroceryListCreation { source });
            }
        };

        transaction.commit().await?;

        tracing::info!(
            meal_plan_id = %meal_plan.meal_plan_id,
            grocery_list_id = %grocery_list.grocery_list_id,
            items = grocery_list.items.len(),
            warnings = consolidation.warnings.len(),
            "Created meal plan"
        );

        Ok(MealPlanCreated {
            meal_plan,
            grocery_list,
            warnings: consolidation.warnings,
        })
    }

    pub async fn get_by_id(pool: &PgPool, meal_plan_id: Uuid) -> Result<Option<Self>> {
        let meal_plan = sqlx::query_as::<_, MealPlan>(&format!(
            "
            SELECT {MEAL_PLAN_COLUMNS}
            FROM meal_plans
            WHERE meal_plan_id = $1
            "
        ))
        .bind(meal_plan_id)
        .fetch_optional(pool)
        .await?;

        Ok(meal_plan)
    }

    pub(crate) async fn recipe_ids(
        conn: &mut PgConnection,
        meal_plan_id: Uuid,
    ) -> sqlx::Result<Vec<Uuid>> {
        sqlx::query_scalar(
            "
            SELECT recipe_id
            FROM meal_plan_recipes
            WHERE meal_plan_id = $1
            ORDER BY position
            ",
        )
        .bind(meal_plan_id)
        .fetch_all(conn)
        .await
    }

    /// All meal plans, most recent start date first, each with its recipes in
    /// the order they were added.
    pub async fn list_with_recipes(pool: &PgPool) -> Result<Vec<MealPlanWithRecipes>> {
        let mut conn = pool.acquire().await?;

        let meal_plans = sqlx::query_as::<_, MealPlan>(&format!(
            "
            SELECT {MEAL_PLAN_COLUMNS}
            FROM meal_plans
            ORDER BY start_date DESC, created_at DESC
            "
        ))
        .fetch_all(&mut *conn)
        .await?;

        let ids: Vec<Uuid> = meal_plans.iter().map(|p| p.meal_plan_id).collect();
        let rows = sqlx::query_as::<_, PlannedRecipeRow>(
            "
            SELECT mpr.meal_plan_id, r.recipe_id, r.title, r.img_url
            FROM meal_plan_recipes mpr
            JOIN recipes r ON r.recipe_id = mpr.recipe_id
            WHERE mpr.meal_plan_id = ANY($1)
            ORDER BY mpr.meal_plan_id, mpr.position
            ",
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

        let mut by_plan: HashMap<Uuid, Vec<MealPlanRecipe>> = HashMap::new();
        for row in rows {
            by_plan
                .entry(row.meal_plan_id)
                .or_default()
                .push(MealPlanRecipe {
                    recipe_id: row.recipe_id,
                    title: row.title,
                    img_url: row.img_url,
                });
        }

        Ok(meal_plans
            .into_iter()
            .map(|meal_plan| {
                let recipes = by_plan.remove(&meal_plan.meal_plan_id).unwrap_or_default();
                MealPlanWithRecipes { meal_plan, recipes }
            })
            .collect())
    }

    /// Deletes the plan; its recipe links and grocery list go with it.
    /// Returns whether a plan was deleted.
    #[tracing::instrument(skip(pool), err)]
    pub async fn delete(pool: &PgPool, meal_plan_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM meal_plans WHERE meal_plan_id = $1")
            .bind(meal_plan_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use bigdecimal::BigDecimal;

    use super::*;
    use crate::cooking::{NewIngredient, NewRecipe};

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    async fn recipe(pool: &PgPool, title: &str, ingredients: &[(&str, &str, &str)]) -> Uuid {
        let new_recipe = NewRecipe {
            title: title.to_string(),
            instructions: vec!["Cook".to_string()],
            ingredients: ingredients
                .iter()
                .map(|(item_name, quantity, unit)| NewIngredient {
                    item_name: (*item_name).to_string(),
                    quantity: (*quantity).to_string(),
                    unit_of_measurement: (*unit).to_string(),
                    notes: None,
                })
                .collect(),
            prep_time: 5,
            cook_time: 20,
            serving_size: 2,
            calories_per_serving: None,
            img_url: Some(format!("https://img.example/{title}.jpg")),
        };

        Recipe::create(pool, new_recipe).await.unwrap().recipe.recipe_id
    }

    fn plan(recipe_ids: Vec<Uuid>) -> NewMealPlan {
        NewMealPlan {
            start_date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            recipe_ids,
        }
    }

    async fn count(pool: &PgPool, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test]
    async fn creates_plan_with_consolidated_grocery_list(pool: PgPool) {
        let a = recipe(&pool, "A", &[("flour", "1", "cup")]).await;
        let b = recipe(&pool, "B", &[("flour", "0.5", "cup"), ("salt", "1", "tsp")]).await;

        let created =
            MealPlan::create_with_grocery_list(&pool, plan(vec![a, b]), &Consolidator::default())
                .await
                .unwrap();

        let items: Vec<(&str, BigDecimal, &str)> = created
            .grocery_list
            .items
            .iter()
            .map(|i| {
                (
                    i.item_name.as_str(),
                    i.quantity.clone(),
                    i.unit_of_measurement.as_str(),
                )
            })
            .collect();
        assert_eq!(items, vec![("flour", dec("1.5"), "cup"), ("salt", dec("1"), "tsp")]);
        assert!(created.warnings.is_empty());

        let stored = GroceryList::get_by_meal_plan(&pool, created.meal_plan.meal_plan_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.grocery_list_id, created.grocery_list.grocery_list_id);
        assert_eq!(stored.items.len(), 2);
        assert_eq!(stored.items[0].item_name, "flour");
        assert_eq!(stored.items[1].item_name, "salt");
    }

    #[sqlx::test]
    async fn empty_plan_gets_an_empty_grocery_list(pool: PgPool) {
        let created =
            MealPlan::create_with_grocery_list(&pool, plan(vec![]), &Consolidator::default())
                .await
                .unwrap();

        assert!(created.grocery_list.items.is_empty());

        let stored = GroceryList::get_by_meal_plan(&pool, created.meal_plan.meal_plan_id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.items.is_empty());
    }

    #[sqlx::test]
    async fn unparseable_quantities_are_reported_not_fatal(pool: PgPool) {
        let a = recipe(&pool, "A", &[("eggs", "abc", "whole"), ("milk", "1/2", "cup")]).await;
        let b = recipe(&pool, "B", &[("eggs", "2", "whole")]).await;

        let created =
            MealPlan::create_with_grocery_list(&pool, plan(vec![a, b]), &Consolidator::default())
                .await
                .unwrap();

        assert_eq!(created.grocery_list.items.len(), 2);
        assert_eq!(created.grocery_list.items[0].item_name, "eggs");
        assert_eq!(created.grocery_list.items[0].quantity, dec("2"));
        assert_eq!(created.grocery_list.items[1].quantity, dec("0.5"));
        assert_eq!(created.warnings.len(), 1);
        assert_eq!(created.warnings[0].recipe_id, a);
    }

    #[sqlx::test]
    async fn planning_a_recipe_twice_counts_it_twice(pool: PgPool) {
        let a = recipe(&pool, "A", &[("rice", "1", "cup")]).await;

        let created =
            MealPlan::create_with_grocery_list(&pool, plan(vec![a, a]), &Consolidator::default())
                .await
                .unwrap();

        assert_eq!(created.grocery_list.items[0].quantity, dec("2"));

        let plans = MealPlan::list_with_recipes(&pool).await.unwrap();
        assert_eq!(plans[0].recipes.len(), 2);
    }

    #[sqlx::test]
    async fn unknown_recipe_is_not_found_and_nothing_is_saved(pool: PgPool) {
        let a = recipe(&pool, "A", &[("rice", "1", "cup")]).await;
        let missing = Uuid::new_v4();

        let err = MealPlan::create_with_grocery_list(
            &pool,
            plan(vec![a, missing]),
            &Consolidator::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            CookingError::NotFound { entity: "recipe", id } if id == missing
        ));
        assert_eq!(count(&pool, "meal_plans").await, 0);
    }

    #[sqlx::test]
    async fn end_before_start_is_invalid(pool: PgPool) {
        let mut new_plan = plan(vec![]);
        new_plan.end_date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let err =
            MealPlan::create_with_grocery_list(&pool, new_plan, &Consolidator::default())
                .await
                .unwrap_err();

        assert!(matches!(err, CookingError::InvalidInput(_)));
        assert_eq!(count(&pool, "meal_plans").await, 0);
    }

    #[sqlx::test]
    async fn grocery_list_failure_is_distinct_and_rolls_back_the_plan(pool: PgPool) {
        let a = recipe(&pool, "A", &[("flour", "1", "cup")]).await;

        sqlx::query(
            "
            CREATE FUNCTION reject_grocery_lists() RETURNS trigger AS $$
            BEGIN
                RAISE EXCEPTION 'grocery lists are unavailable';
            END;
            $$ LANGUAGE plpgsql
            ",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "
            CREATE TRIGGER reject_grocery_lists
            BEFORE INSERT ON grocery_lists
            FOR EACH ROW EXECUTE FUNCTION reject_grocery_lists()
            ",
        )
        .execute(&pool)
        .await
        .unwrap();

        let err = MealPlan::create_with_grocery_list(&pool, plan(vec![a]), &Consolidator::default())
            .await
            .unwrap_err();

        assert!(matches!(err, CookingError::GroceryListCreation { .. }));
        assert_eq!(err.code(), "grocery_list_creation_failed");
        assert_eq!(count(&pool, "meal_plans").await, 0);
        assert_eq!(count(&pool, "meal_plan_recipes").await, 0);
        assert_eq!(count(&pool, "grocery_lists").await, 0);
    }

    #[sqlx::test]
    async fn list_orders_plans_and_recipes(pool: PgPool) {
        let a = recipe(&pool, "A", &[]).await;
        let b = recipe(&pool, "B", &[]).await;

        MealPlan::create_with_grocery_list(&pool, plan(vec![b, a]), &Consolidator::default())
            .await
            .unwrap();
        let mut later = plan(vec![a]);
        later.start_date = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        later.end_date = NaiveDate::from_ymd_opt(2024, 4, 7).unwrap();
        MealPlan::create_with_grocery_list(&pool, later, &Consolidator::default())
            .await
            .unwrap();
        MealPlan::create_with_grocery_list(&pool, plan(vec![]), &Consolidator::default())
            .await
            .unwrap();

        let plans = MealPlan::list_with_recipes(&pool).await.unwrap();

        assert_eq!(plans.len(), 3);
        assert_eq!(
            plans[0].meal_plan.start_date,
            NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()
        );
        let titles: Vec<Vec<&str>> = plans
            .iter()
            .map(|p| p.recipes.iter().map(|r| r.title.as_str()).collect())
            .collect();
        assert!(titles.contains(&vec!["B", "A"]));
        assert!(titles.contains(&vec![]));
        assert_eq!(plans[0].recipes[0].img_url.as_deref(), Some("https://img.example/A.jpg"));
    }

    #[sqlx::test]
    async fn delete_cascades_to_grocery_list(pool: PgPool) {
        let a = recipe(&pool, "A", &[("flour", "1", "cup")]).await;
        let created =
            MealPlan::create_with_grocery_list(&pool, plan(vec![a]), &Consolidator::default())
                .await
                .unwrap();
        let meal_plan_id = created.meal_plan.meal_plan_id;

        assert!(MealPlan::delete(&pool, meal_plan_id).await.unwrap());

        assert!(MealPlan::get_by_id(&pool, meal_plan_id).await.unwrap().is_none());
        assert!(GroceryList::get_by_meal_plan(&pool, meal_plan_id)
            .await
            .unwrap()
            .is_none());
        assert_eq!(count(&pool, "grocery_list_items").await, 0);
        assert_eq!(count(&pool, "meal_plan_recipes").await, 0);
        assert!(!MealPlan::delete(&pool, meal_plan_id).await.unwrap());
    }
}
