pub(crate) mod grocery_lists;
pub(crate) mod inventory;
pub(crate) mod meal_plans;
pub(crate) mod recipes;
