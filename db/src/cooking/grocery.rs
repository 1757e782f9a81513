use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::consolidate::{Consolidator, GroceryItemDraft, QuantityWarning};
use super::meal_planning::{consolidation_sources, MealPlan};
use super::CookingError;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GroceryListItem {
    pub grocery_list_item_id: Uuid,
    pub grocery_list_id: Uuid,
    pub item_name: String,
    pub quantity: BigDecimal,
    pub unit_of_measurement: String,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroceryList {
    pub grocery_list_id: Uuid,
    pub meal_plan_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub items: Vec<GroceryListItem>,
}

#[derive(sqlx::FromRow)]
struct GroceryListRow {
    grocery_list_id: Uuid,
    meal_plan_id: Uuid,
    created_at: DateTime<Utc>,
}

impl GroceryList {
    /// Writes a list and its items for `meal_plan_id`. Items keep the order
    /// of `items`.
    pub(crate) async fn insert(
        conn: &mut PgConnection,
        meal_plan_id: Uuid,
        items: &[GroceryItemDraft],
    ) -> sqlx::Result<Self> {
        let row = sqlx::query_as::<_, GroceryListRow>(
            "
            INSERT INTO grocery_lists (meal_plan_id)
            VALUES ($1)
            RETURNING grocery_list_id, meal_plan_id, created_at
            ",
        )
        .bind(meal_plan_id)
        .fetch_one(&mut *conn)
        .await?;

        let names: Vec<String> = items.iter().map(|i| i.item_name.clone()).collect();
        let quantities: Vec<BigDecimal> = items.iter().map(|i| i.quantity.clone()).collect();
        let units: Vec<String> = items
            .iter()
            .map(|i| i.unit_of_measurement.clone())
            .collect();
        let positions: Vec<i32> = (0..items.len())
            .map(|p| i32::try_from(p).unwrap_or(i32::MAX))
            .collect();

        sqlx::query(
            "
            INSERT INTO grocery_list_items (
                grocery_list_id, item_name, quantity, unit_of_measurement, position
            )
            SELECT $1, item_name, quantity, unit_of_measurement, position
            FROM UNNEST($2::text[], $3::numeric[], $4::text[], $5::int4[])
                AS t (item_name, quantity, unit_of_measurement, position)
            ",
        )
        .bind(row.grocery_list_id)
        .bind(names)
        .bind(quantities)
        .bind(units)
        .bind(positions)
        .execute(&mut *conn)
        .await?;

        let items = Self::items(conn, row.grocery_list_id).await?;

        Ok(Self {
            grocery_list_id: row.grocery_list_id,
            meal_plan_id: row.meal_plan_id,
            created_at: row.created_at,
            items,
        })
    }

    async fn items(
        conn: &mut PgConnection,
        grocery_list_id: Uuid,
    ) -> sqlx::Result<Vec<GroceryListItem>> {
        sqlx::query_as::<_, GroceryListItem>(
            "
            SELECT
                grocery_list_item_id,
                grocery_list_id,
                item_name,
                quantity,
                unit_of_measurement,
                position
            FROM grocery_list_items
            WHERE grocery_list_id = $1
            ORDER BY position
            ",
        )
        .bind(grocery_list_id)
        .fetch_all(conn)
        .await
    }

    pub async fn get_by_meal_plan(pool: &PgPool, meal_plan_id: Uuid) -> Result<Option<Self>> {
        let mut conn = pool.acquire().await?;

        let row = sqlx::query_as::<_, GroceryListRow>(
            "
            SELECT grocery_list_id, meal_plan_id, created_at
            FROM grocery_lists
            WHERE meal_plan_id = $1
            ",
        )
        .bind(meal_plan_id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = Self::items(&mut conn, row.grocery_list_id).await?;

        Ok(Some(Self {
            grocery_list_id: row.grocery_list_id,
            meal_plan_id: row.meal_plan_id,
            created_at: row.created_at,
            items,
        }))
    }

    /// Rebuilds the grocery list of an existing meal plan from the recipes
    /// stored against it, replacing any list it already has.
    #[tracing::instrument(skip(pool, consolidator), err)]
    pub async fn regenerate_for_meal_plan(
        pool: &PgPool,
        meal_plan_id: Uuid,
        consolidator: &Consolidator,
    ) -> Result<(Self, Vec<QuantityWarning>), CookingError> {
        let mut transaction = pool.begin().await?;

        let locked: Option<Uuid> = sqlx::query_scalar(
            "SELECT meal_plan_id FROM meal_plans WHERE meal_plan_id = $1 FOR UPDATE",
        )
        .bind(meal_plan_id)
        .fetch_optional(&mut *transaction)
        .await?;
        if locked.is_none() {
            return Err(CookingError::NotFound {
                entity: "meal plan",
                id: meal_plan_id,
            });
        }

        let recipe_ids = MealPlan::recipe_ids(&mut transaction, meal_plan_id).await?;
        let sources = consolidation_sources(&mut transaction, &recipe_ids).await?;
        let consolidation = consolidator.consolidate(&sources)?;

        sqlx::query("DELETE FROM grocery_lists WHERE meal_plan_id = $1")
            .bind(meal_plan_id)
            .execute(&mut *transaction)
            .await?;

        let inserted = Self::insert(&mut transaction, meal_plan_id, &consolidation.items).await;
        let grocery_list = match inserted {
            Ok(list) => list,
            Err(source) => {
                tracing::error!(%meal_plan_id, error = %source, "Failed to write grocery list");
                return Err(CookingError::GroceryListCreation { source });
            }
        };

        transaction.commit().await?;

        tracing::info!(
            %meal_plan_id,
            items = grocery_list.items.len(),
            "Regenerated grocery list"
        );

        Ok((grocery_list, consolidation.warnings))
    }
}
