//! Activity records: meals eaten, money deposited, and money spent.
//!
//! Each record belongs to exactly one month and one user.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{patch_field, Record, Resource, Scope};
use crate::cache::Ttl;

/// Meal counts for one member on one day. Half meals are allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Meal {
    #[serde(alias = "_id")]
    pub id: String,
    pub month_id: String,
    pub user_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub breakfast: f64,
    #[serde(default)]
    pub lunch: f64,
    #[serde(default)]
    pub dinner: f64,
    pub created_at: DateTime<Utc>,
}

impl Meal {
    pub fn total(&self) -> f64 {
        self.breakfast + self.lunch + self.dinner
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMeal {
    pub month_id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub breakfast: f64,
    pub lunch: f64,
    pub dinner: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakfast: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lunch: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dinner: Option<f64>,
}

impl Record for Meal {
    const COLLECTION: &'static str = "meals";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Resource for Meal {
    type Draft = NewMeal;
    type Patch = MealPatch;

    const PATH: &'static str = "/meals";
    const ONE: &'static str = "meal";
    const MANY: &'static str = "meals";
    const TTL: Ttl = Ttl::Short;
    const AFFECTS_SUMMARIES: bool = true;

    fn scope(&self) -> Scope {
        Scope::Month(self.month_id.clone())
    }

    fn draft_scope(draft: &NewMeal) -> Scope {
        Scope::Month(draft.month_id.clone())
    }

    fn from_draft(id: String, created_at: DateTime<Utc>, draft: NewMeal) -> Self {
        Self {
            id,
            month_id: draft.month_id,
            user_id: draft.user_id,
            date: draft.date,
            breakfast: draft.breakfast,
            lunch: draft.lunch,
            dinner: draft.dinner,
            created_at,
        }
    }

    fn apply(&mut self, patch: MealPatch) {
        patch_field(&mut self.date, patch.date);
        patch_field(&mut self.breakfast, patch.breakfast);
        patch_field(&mut self.lunch, patch.lunch);
        patch_field(&mut self.dinner, patch.dinner);
    }
}

/// Money a member put into the mess fund.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Deposit {
    #[serde(alias = "_id")]
    pub id: String,
    pub month_id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDeposit {
    pub month_id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Record for Deposit {
    const COLLECTION: &'static str = "deposits";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Resource for Deposit {
    type Draft = NewDeposit;
    type Patch = DepositPatch;

    const PATH: &'static str = "/deposits";
    const ONE: &'static str = "deposit";
    const MANY: &'static str = "deposits";
    const TTL: Ttl = Ttl::Short;
    const AFFECTS_SUMMARIES: bool = true;

    fn scope(&self) -> Scope {
        Scope::Month(self.month_id.clone())
    }

    fn draft_scope(draft: &NewDeposit) -> Scope {
        Scope::Month(draft.month_id.clone())
    }

    fn from_draft(id: String, created_at: DateTime<Utc>, draft: NewDeposit) -> Self {
        Self {
            id,
            month_id: draft.month_id,
            user_id: draft.user_id,
            date: draft.date,
            amount: draft.amount,
            note: draft.note,
            created_at,
        }
    }

    fn apply(&mut self, patch: DepositPatch) {
        patch_field(&mut self.date, patch.date);
        patch_field(&mut self.amount, patch.amount);
        if patch.note.is_some() {
            self.note = patch.note;
        }
    }
}

/// Money spent on groceries for the shared meals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct MealCost {
    #[serde(alias = "_id")]
    pub id: String,
    pub month_id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMealCost {
    pub month_id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealCostPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Record for MealCost {
    const COLLECTION: &'static str = "meal_costs";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Resource for MealCost {
    type Draft = NewMealCost;
    type Patch = MealCostPatch;

    const PATH: &'static str = "/meal-costs";
    const ONE: &'static str = "mealCost";
    const MANY: &'static str = "mealCosts";
    const TTL: Ttl = Ttl::Short;
    const AFFECTS_SUMMARIES: bool = true;

    fn scope(&self) -> Scope {
        Scope::Month(self.month_id.clone())
    }

    fn draft_scope(draft: &NewMealCost) -> Scope {
        Scope::Month(draft.month_id.clone())
    }

    fn from_draft(id: String, created_at: DateTime<Utc>, draft: NewMealCost) -> Self {
        Self {
            id,
            month_id: draft.month_id,
            user_id: draft.user_id,
            date: draft.date,
            amount: draft.amount,
            description: draft.description,
            created_at,
        }
    }

    fn apply(&mut self, patch: MealCostPatch) {
        patch_field(&mut self.date, patch.date);
        patch_field(&mut self.amount, patch.amount);
        if patch.description.is_some() {
            self.description = patch.description;
        }
    }
}

/// Any non-grocery expense: either split across all members (`is_shared`)
/// or charged to the member who owns the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct OtherCost {
    #[serde(alias = "_id")]
    pub id: String,
    pub month_id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_shared: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOtherCost {
    pub month_id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_shared: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtherCostPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_shared: Option<bool>,
}

impl Record for OtherCost {
    const COLLECTION: &'static str = "other_costs";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Resource for OtherCost {
    type Draft = NewOtherCost;
    type Patch = OtherCostPatch;

    const PATH: &'static str = "/other-costs";
    const ONE: &'static str = "otherCost";
    const MANY: &'static str = "otherCosts";
    const TTL: Ttl = Ttl::Short;
    const AFFECTS_SUMMARIES: bool = true;

    fn scope(&self) -> Scope {
        Scope::Month(self.month_id.clone())
    }

    fn draft_scope(draft: &NewOtherCost) -> Scope {
        Scope::Month(draft.month_id.clone())
    }

    fn from_draft(id: String, created_at: DateTime<Utc>, draft: NewOtherCost) -> Self {
        Self {
            id,
            month_id: draft.month_id,
            user_id: draft.user_id,
            date: draft.date,
            amount: draft.amount,
            description: draft.description,
            is_shared: draft.is_shared,
            created_at,
        }
    }

    fn apply(&mut self, patch: OtherCostPatch) {
        patch_field(&mut self.date, patch.date);
        patch_field(&mut self.amount, patch.amount);
        patch_field(&mut self.is_shared, patch.is_shared);
        if patch.description.is_some() {
            self.description = patch.description;
        }
    }
}
