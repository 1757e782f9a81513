use std::collections::BTreeMap;
use std::fmt;

use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, NaiveDate, Utc};
use color_eyre::Result;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{PgPool, Type};
use uuid::Uuid;

use super::CookingError;

/// Pantry categories. Declaration order is the order groups are listed in.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[sqlx(type_name = "text")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InventoryCategory {
    Fruits,
    Vegetables,
    Dairy,
    Meats,
    Grains,
    CannedGoods,
    FrozenFoods,
    Snacks,
    Beverages,
    Baking,
    Spices,
    Condiments,
    ReadyToEat,
    Other,
}

impl InventoryCategory {
    pub const ALL: [InventoryCategory; 14] = [
        InventoryCategory::Fruits,
        InventoryCategory::Vegetables,
        InventoryCategory::Dairy,
        InventoryCategory::Meats,
        InventoryCategory::Grains,
        InventoryCategory::CannedGoods,
        InventoryCategory::FrozenFoods,
        InventoryCategory::Snacks,
        InventoryCategory::Beverages,
        InventoryCategory::Baking,
        InventoryCategory::Spices,
        InventoryCategory::Condiments,
        InventoryCategory::ReadyToEat,
        InventoryCategory::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            InventoryCategory::Fruits => "Fruits",
            InventoryCategory::Vegetables => "Vegetables",
            InventoryCategory::Dairy => "Dairy",
            InventoryCategory::Meats => "Meats",
            InventoryCategory::Grains => "Grains & Cereals",
            InventoryCategory::CannedGoods => "Canned Goods",
            InventoryCategory::FrozenFoods => "Frozen Foods",
            InventoryCategory::Snacks => "Snacks",
            InventoryCategory::Beverages => "Beverages",
            InventoryCategory::Baking => "Baking Essentials",
            InventoryCategory::Spices => "Spices & Herbs",
            InventoryCategory::Condiments => "Condiments & Sauces",
            InventoryCategory::ReadyToEat => "Ready To Eat Meals",
            InventoryCategory::Other => "Other",
        }
    }
}

impl fmt::Display for InventoryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InventoryCategory::Fruits => write!(f, "FRUITS"),
            InventoryCategory::Vegetables => write!(f, "VEGETABLES"),
            InventoryCategory::Dairy => write!(f, "DAIRY"),
            InventoryCategory::Meats => write!(f, "MEATS"),
            InventoryCategory::Grains => write!(f, "GRAINS"),
            InventoryCategory::CannedGoods => write!(f, "CANNED_GOODS"),
            InventoryCategory::FrozenFoods => write!(f, "FROZEN_FOODS"),
            InventoryCategory::Snacks => write!(f, "SNACKS"),
            InventoryCategory::Beverages => write!(f, "BEVERAGES"),
            InventoryCategory::Baking => write!(f, "BAKING"),
            InventoryCategory::Spices => write!(f, "SPICES"),
            InventoryCategory::Condiments => write!(f, "CONDIMENTS"),
            InventoryCategory::ReadyToEat => write!(f, "READY_TO_EAT"),
            InventoryCategory::Other => write!(f, "OTHER"),
        }
    }
}

impl std::str::FromStr for InventoryCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InventoryCategory::ALL
            .into_iter()
            .find(|category| category.to_string() == s)
            .ok_or_else(|| format!("Unknown inventory category: {s}"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct InventoryItem {
    pub inventory_item_id: Uuid,
    pub item_name: String,
    pub category: InventoryCategory,
    pub quantity: BigDecimal,
    pub unit_of_measurement: String,
    pub purchase_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInventoryItem {
    pub item_name: String,
    pub category: InventoryCategory,
    #[serde(default)]
    pub quantity: BigDecimal,
    #[serde(default)]
    pub unit_of_measurement: String,
    #[serde(default)]
    pub purchase_date: Option<NaiveDate>,
    #[serde(default)]
    pub expiration_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A partial update; `None` fields keep their stored value.
///
/// The nullable columns take a nested option so an explicit JSON `null`
/// (`Some(None)`) clears the stored value while a missing key leaves it alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryUpdate {
    pub item_name: Option<String>,
    pub category: Option<InventoryCategory>,
    pub quantity: Option<BigDecimal>,
    pub unit_of_measurement: Option<String>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub purchase_date: Option<Option<NaiveDate>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub expiration_date: Option<Option<NaiveDate>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub notes: Option<Option<String>>,
}

/// Only runs when the key is present, so `null` becomes `Some(None)`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryGroup {
    pub category: InventoryCategory,
    pub label: &'static str,
    pub items: Vec<InventoryItem>,
}

fn check_quantity(quantity: &BigDecimal) -> Result<(), CookingError> {
    if *quantity >= BigDecimal::zero() {
        Ok(())
    } else {
        Err(CookingError::InvalidInput(
            "quantity must be a non-negative number".to_string(),
        ))
    }
}

fn check_item_name(item_name: &str) -> Result<(), CookingError> {
    if item_name.trim().is_empty() {
        Err(CookingError::InvalidInput(
            "item name must not be empty".to_string(),
        ))
    } else {
        Ok(())
    }
}

impl NewInventoryItem {
    pub fn validate(&self) -> Result<(), CookingError> {
        check_item_name(&self.item_name)?;
        check_quantity(&self.quantity)
    }
}

impl InventoryUpdate {
    pub fn validate(&self) -> Result<(), CookingError> {
        if let Some(item_name) = &self.item_name {
            check_item_name(item_name)?;
        }
        if let Some(quantity) = &self.quantity {
            check_quantity(quantity)?;
        }
        Ok(())
    }
}

const INVENTORY_COLUMNS: &str = "
    inventory_item_id,
    item_name,
    category,
    quantity,
    unit_of_measurement,
    purchase_date,
    expiration_date,
    notes,
    created_at,
    updated_at
";

impl InventoryItem {
    #[tracing::instrument(skip(pool), err)]
    pub async fn create(pool: &PgPool, item: NewInventoryItem) -> Result<Self, CookingError> {
        item.validate()?;

        let created = sqlx::query_as::<_, InventoryItem>(&format!(
            "
            INSERT INTO kitchen_inventory (
                item_name, category, quantity, unit_of_measurement,
                purchase_date, expiration_date, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {INVENTORY_COLUMNS}
            "
        ))
        .bind(item.item_name.trim())
        .bind(item.category.to_string())
        .bind(&item.quantity)
        .bind(&item.unit_of_measurement)
        .bind(item.purchase_date)
        .bind(item.expiration_date)
        .bind(&item.notes)
        .fetch_one(pool)
        .await?;

        Ok(created)
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Self>> {
        let items = sqlx::query_as::<_, InventoryItem>(&format!(
            "
            SELECT {INVENTORY_COLUMNS}
            FROM kitchen_inventory
            ORDER BY item_name, created_at
            "
        ))
        .fetch_all(pool)
        .await?;

        Ok(items)
    }

    pub async fn list_grouped(pool: &PgPool) -> Result<Vec<CategoryGroup>> {
        let items = Self::list(pool).await?;

        Ok(Self::group_by_category(items))
    }

    /// Groups items by category in category declaration order. Items keep
    /// their relative order inside a group and empty categories are left out.
    pub fn group_by_category(items: Vec<Self>) -> Vec<CategoryGroup> {
        let mut groups: BTreeMap<InventoryCategory, Vec<Self>> = BTreeMap::new();
        for item in items {
            groups.entry(item.category).or_default().push(item);
        }

        groups
            .into_iter()
            .map(|(category, items)| CategoryGroup {
                category,
                label: category.label(),
                items,
            })
            .collect()
    }

    /// Returns `None` when no item has the given id.
    #[tracing::instrument(skip(pool), err)]
    pub async fn update(
        pool: &PgPool,
        inventory_item_id: Uuid,
        changes: InventoryUpdate,
    ) -> Result<Option<Self>, CookingError> {
        changes.validate()?;

        let updated = sqlx::query_as::<_, InventoryItem>(&format!(
            "
            UPDATE kitchen_inventory
            SET item_name = COALESCE($2, item_name),
                category = COALESCE($3, category),
                quantity = COALESCE($4, quantity),
                unit_of_measurement = COALESCE($5, unit_of_measurement),
                purchase_date = CASE WHEN $6 THEN $7 ELSE purchase_date END,
                expiration_date = CASE WHEN $8 THEN $9 ELSE expiration_date END,
                notes = CASE WHEN $10 THEN $11 ELSE notes END,
                updated_at = NOW()
            WHERE inventory_item_id = $1
            RETURNING {INVENTORY_COLUMNS}
            "
        ))
        .bind(inventory_item_id)
        .bind(changes.item_name.as_deref().map(str::trim))
        .bind(changes.category.map(|c| c.to_string()))
        .bind(&changes.quantity)
        .bind(&changes.unit_of_measurement)
        .bind(changes.purchase_date.is_some())
        .bind(changes.purchase_date.flatten())
        .bind(changes.expiration_date.is_some())
        .bind(changes.expiration_date.flatten())
        .bind(changes.notes.is_some())
        .bind(changes.notes.flatten())
        .fetch_optional(pool)
        .await?;

        Ok(updated)
    }

    /// Returns whether a row was deleted.
    #[tracing::instrument(skip(pool), err)]
    pub async fn delete(pool: &PgPool, inventory_item_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM kitchen_inventory WHERE inventory_item_id = $1")
            .bind(inventory_item_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
