use serde::{Deserialize, Deserializer, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Ingredient {
    pub ingredient_id: Uuid,
    pub recipe_id: Uuid,
    pub item_name: String,
    pub quantity: String,
    pub unit_of_measurement: String,
    pub notes: Option<String>,
    pub display_order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewIngredient {
    pub item_name: String,
    #[serde(default, deserialize_with = "quantity_text")]
    pub quantity: String,
    #[serde(default)]
    pub unit_of_measurement: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Clients send quantities both as JSON strings (`"1/2"`) and numbers (`2`).
/// Either way the text is stored as typed.
fn quantity_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Integer(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Integer(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
    })
}

const INGREDIENT_COLUMNS: &str = "
    ingredient_id,
    recipe_id,
    item_name,
    quantity,
    unit_of_measurement,
    notes,
    display_order
";

impl Ingredient {
    pub(crate) async fn insert_for_recipe(
        conn: &mut PgConnection,
        recipe_id: Uuid,
        ingredients: &[NewIngredient],
    ) -> sqlx::Result<Vec<Self>> {
        let mut inserted = Vec::with_capacity(ingredients.len());

        for (position, ingredient) in ingredients.iter().enumerate() {
            let display_order = i32::try_from(position).unwrap_or(i32::MAX);
            let row = sqlx::query_as::<_, Ingredient>(&format!(
                "
                INSERT INTO ingredients (
                    recipe_id, item_name, quantity, unit_of_measurement, notes, display_order
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING {INGREDIENT_COLUMNS}
                "
            ))
            .bind(recipe_id)
            .bind(&ingredient.item_name)
            .bind(&ingredient.quantity)
            .bind(&ingredient.unit_of_measurement)
            .bind(&ingredient.notes)
            .bind(display_order)
            .fetch_one(&mut *conn)
            .await?;

            inserted.push(row);
        }

        Ok(inserted)
    }

    pub(crate) async fn get_by_recipes(
        conn: &mut PgConnection,
        recipe_ids: &[Uuid],
    ) -> sqlx::Result<Vec<Self>> {
        sqlx::query_as::<_, Ingredient>(&format!(
            "
            SELECT {INGREDIENT_COLUMNS}
            FROM ingredients
            WHERE recipe_id = ANY($1)
            ORDER BY recipe_id, display_order
            "
        ))
        .bind(recipe_ids)
        .fetch_all(conn)
        .await
    }
}
