//! Data models for mess entities.
//!
//! This module contains all the data structures shared by the remote
//! client, the local store and the allocation engine:
//!
//! - `User`, `Mess`, `JoinRequest`: membership
//! - `Month`: billing periods, at most one active per mess
//! - `Meal`, `Deposit`, `MealCost`, `OtherCost`: activity records
//! - `Notice`, `Note`, `BazarDate`, `Notification`: auxiliary board records
//! - `MemberSummary`, `MonthSummary`: computed balances
//!
//! Every persisted entity implements [`Record`]; entities that follow the
//! generic list/create/update/delete contract also implement [`Resource`].

pub mod activity;
pub mod board;
pub mod membership;
pub mod month;
pub mod summary;

pub use activity::{
    Deposit, DepositPatch, Meal, MealCost, MealCostPatch, MealPatch, NewDeposit, NewMeal,
    NewMealCost, NewOtherCost, OtherCost, OtherCostPatch,
};
pub use board::{
    BazarDate, BazarDatePatch, NewBazarDate, NewNote, NewNotice, NewNotification, Note,
    NotePatch, Notice, NoticePatch, Notification, NotificationPatch,
};
pub use membership::{
    JoinRequest, JoinRequestPatch, JoinStatus, Mess, MessPatch, NewJoinRequest, NewMess,
    NewUser, Role, User, UserPatch,
};
pub use month::{Month, MonthPatch, NewMonth};
pub use summary::{MemberSummary, MonthSummary};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::cache::Ttl;

/// An entity stored as one element of a named local collection.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Fixed collection name, also the local file stem.
    const COLLECTION: &'static str;

    fn id(&self) -> &str;

    /// Adjust the rest of the collection after `changed` was inserted or
    /// updated. Runs inside the collection's write lock.
    fn reconcile(_records: &mut [Self], _changed: &Self) {}
}

/// Foreign key a resource list is filtered by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Mess(String),
    Month(String),
    User(String),
}

impl Scope {
    /// Query parameter name and value used by the remote list endpoints
    pub fn query_pair(&self) -> (&'static str, &str) {
        match self {
            Scope::Mess(id) => ("messId", id),
            Scope::Month(id) => ("monthId", id),
            Scope::User(id) => ("userId", id),
        }
    }

    /// Stable suffix for cache keys, e.g. `month:abc`
    pub fn cache_suffix(&self) -> String {
        match self {
            Scope::Mess(id) => format!("mess:{}", id),
            Scope::Month(id) => format!("month:{}", id),
            Scope::User(id) => format!("user:{}", id),
        }
    }

    pub fn month_id(&self) -> Option<&str> {
        match self {
            Scope::Month(id) => Some(id),
            _ => None,
        }
    }
}

/// An entity with the uniform remote/local CRUD contract.
///
/// `PATH` is the REST collection path; `ONE` and `MANY` are the payload
/// field names the remote wraps a single record or a list in.
pub trait Resource: Record {
    type Draft: Serialize + Clone + Send + Sync + 'static;
    type Patch: Serialize + Clone + Send + Sync + 'static;

    const PATH: &'static str;
    const ONE: &'static str;
    const MANY: &'static str;
    const TTL: Ttl = Ttl::Default;
    /// Writes change the derived month summaries.
    const AFFECTS_SUMMARIES: bool = false;

    fn scope(&self) -> Scope;
    fn draft_scope(draft: &Self::Draft) -> Scope;
    fn from_draft(id: String, created_at: DateTime<Utc>, draft: Self::Draft) -> Self;
    fn apply(&mut self, patch: Self::Patch);
}

/// Overwrite `target` when the patch carries a value.
pub(crate) fn patch_field<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}
