//! Auxiliary records shown on the mess board. They carry no money and do not
//! feed the allocation engine.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{patch_field, Record, Resource, Scope};
use crate::cache::Ttl;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Notice {
    #[serde(alias = "_id")]
    pub id: String,
    pub mess_id: String,
    pub title: String,
    pub content: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotice {
    pub mess_id: String,
    pub title: String,
    pub content: String,
    pub created_by: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Record for Notice {
    const COLLECTION: &'static str = "notices";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Resource for Notice {
    type Draft = NewNotice;
    type Patch = NoticePatch;

    const PATH: &'static str = "/notices";
    const ONE: &'static str = "notice";
    const MANY: &'static str = "notices";
    const TTL: Ttl = Ttl::Long;

    fn scope(&self) -> Scope {
        Scope::Mess(self.mess_id.clone())
    }

    fn draft_scope(draft: &NewNotice) -> Scope {
        Scope::Mess(draft.mess_id.clone())
    }

    fn from_draft(id: String, created_at: DateTime<Utc>, draft: NewNotice) -> Self {
        Self {
            id,
            mess_id: draft.mess_id,
            title: draft.title,
            content: draft.content,
            created_by: draft.created_by,
            created_at,
        }
    }

    fn apply(&mut self, patch: NoticePatch) {
        patch_field(&mut self.title, patch.title);
        patch_field(&mut self.content, patch.content);
    }
}

/// A private note a member keeps for the mess.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Note {
    #[serde(alias = "_id")]
    pub id: String,
    pub mess_id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNote {
    pub mess_id: String,
    pub user_id: String,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Record for Note {
    const COLLECTION: &'static str = "notes";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Resource for Note {
    type Draft = NewNote;
    type Patch = NotePatch;

    const PATH: &'static str = "/notes";
    const ONE: &'static str = "note";
    const MANY: &'static str = "notes";

    fn scope(&self) -> Scope {
        Scope::Mess(self.mess_id.clone())
    }

    fn draft_scope(draft: &NewNote) -> Scope {
        Scope::Mess(draft.mess_id.clone())
    }

    fn from_draft(id: String, created_at: DateTime<Utc>, draft: NewNote) -> Self {
        Self {
            id,
            mess_id: draft.mess_id,
            user_id: draft.user_id,
            title: draft.title,
            content: draft.content,
            created_at,
        }
    }

    fn apply(&mut self, patch: NotePatch) {
        patch_field(&mut self.title, patch.title);
        patch_field(&mut self.content, patch.content);
    }
}

/// The day a member is on grocery ("bazar") duty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct BazarDate {
    #[serde(alias = "_id")]
    pub id: String,
    pub mess_id: String,
    pub user_id: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBazarDate {
    pub mess_id: String,
    pub user_id: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BazarDatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Record for BazarDate {
    const COLLECTION: &'static str = "bazar_dates";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Resource for BazarDate {
    type Draft = NewBazarDate;
    type Patch = BazarDatePatch;

    const PATH: &'static str = "/bazar-dates";
    const ONE: &'static str = "bazarDate";
    const MANY: &'static str = "bazarDates";
    const TTL: Ttl = Ttl::Long;

    fn scope(&self) -> Scope {
        Scope::Mess(self.mess_id.clone())
    }

    fn draft_scope(draft: &NewBazarDate) -> Scope {
        Scope::Mess(draft.mess_id.clone())
    }

    fn from_draft(id: String, created_at: DateTime<Utc>, draft: NewBazarDate) -> Self {
        Self {
            id,
            mess_id: draft.mess_id,
            user_id: draft.user_id,
            date: draft.date,
            note: draft.note,
            created_at,
        }
    }

    fn apply(&mut self, patch: BazarDatePatch) {
        patch_field(&mut self.user_id, patch.user_id);
        patch_field(&mut self.date, patch.date);
        if patch.note.is_some() {
            self.note = patch.note;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Notification {
    #[serde(alias = "_id")]
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    pub user_id: String,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_read: Option<bool>,
}

impl Record for Notification {
    const COLLECTION: &'static str = "notifications";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Resource for Notification {
    type Draft = NewNotification;
    type Patch = NotificationPatch;

    const PATH: &'static str = "/notifications";
    const ONE: &'static str = "notification";
    const MANY: &'static str = "notifications";
    const TTL: Ttl = Ttl::Short;

    fn scope(&self) -> Scope {
        Scope::User(self.user_id.clone())
    }

    fn draft_scope(draft: &NewNotification) -> Scope {
        Scope::User(draft.user_id.clone())
    }

    fn from_draft(id: String, created_at: DateTime<Utc>, draft: NewNotification) -> Self {
        Self {
            id,
            user_id: draft.user_id,
            title: draft.title,
            message: draft.message,
            is_read: false,
            created_at,
        }
    }

    fn apply(&mut self, patch: NotificationPatch) {
        patch_field(&mut self.is_read, patch.is_read);
    }
}
