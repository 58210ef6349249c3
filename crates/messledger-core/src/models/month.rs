use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{patch_field, Record, Resource, Scope};
use crate::cache::Ttl;

/// A billing period of a mess. At most one month per mess is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Month {
    #[serde(alias = "_id")]
    pub id: String,
    pub mess_id: String,
    pub name: String,
    pub start_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMonth {
    pub mess_id: String,
    pub name: String,
    pub start_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
}

/// Setting `is_active` to true deactivates the other months of the mess.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl Record for Month {
    const COLLECTION: &'static str = "months";

    fn id(&self) -> &str {
        &self.id
    }

    /// Clears `is_active` on the other months of the same mess.
    fn reconcile(records: &mut [Self], changed: &Self) {
        if !changed.is_active {
            return;
        }
        for month in records
            .iter_mut()
            .filter(|m| m.mess_id == changed.mess_id && m.id != changed.id)
        {
            month.is_active = false;
        }
    }
}

impl Resource for Month {
    type Draft = NewMonth;
    type Patch = MonthPatch;

    const PATH: &'static str = "/months";
    const ONE: &'static str = "month";
    const MANY: &'static str = "months";
    const TTL: Ttl = Ttl::Long;
    const AFFECTS_SUMMARIES: bool = true;

    fn scope(&self) -> Scope {
        Scope::Mess(self.mess_id.clone())
    }

    fn draft_scope(draft: &NewMonth) -> Scope {
        Scope::Mess(draft.mess_id.clone())
    }

    fn from_draft(id: String, created_at: DateTime<Utc>, draft: NewMonth) -> Self {
        Self {
            id,
            mess_id: draft.mess_id,
            name: draft.name,
            start_date: draft.start_date,
            end_date: draft.end_date,
            is_active: draft.is_active,
            created_at,
        }
    }

    fn apply(&mut self, patch: MonthPatch) {
        patch_field(&mut self.name, patch.name);
        patch_field(&mut self.start_date, patch.start_date);
        patch_field(&mut self.is_active, patch.is_active);
        if patch.end_date.is_some() {
            self.end_date = patch.end_date;
        }
    }
}
