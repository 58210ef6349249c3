//! Membership models: users, messes and join requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{patch_field, Record, Resource, Scope};
use crate::cache::Ttl;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum Role {
    Manager,
    #[default]
    Member,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Manager => write!(f, "manager"),
            Role::Member => write!(f, "member"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct User {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub mess_id: Option<String>,
    #[serde(default)]
    pub is_approved: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl User {
    /// Counts towards the mess membership used for cost splitting
    pub fn is_current_member_of(&self, mess_id: &str) -> bool {
        self.is_approved && self.is_active && self.mess_id.as_deref() == Some(mess_id)
    }

    pub fn is_manager(&self) -> bool {
        self.role == Role::Manager
    }
}

impl Record for User {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Registration form. The password never reaches a persisted `User`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_approved: Option<bool>,
}

impl User {
    pub fn apply(&mut self, patch: UserPatch) {
        patch_field(&mut self.name, patch.name);
        patch_field(&mut self.is_active, patch.is_active);
        patch_field(&mut self.is_approved, patch.is_approved);
        if patch.phone.is_some() {
            self.phone = patch.phone;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Mess {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    /// Join code handed out to prospective members. Unique across messes.
    pub code: String,
    pub manager_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Record for Mess {
    const COLLECTION: &'static str = "messes";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMess {
    pub name: String,
    pub manager_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Mess {
    pub fn apply(&mut self, patch: MessPatch) {
        patch_field(&mut self.name, patch.name);
        if patch.address.is_some() {
            self.address = patch.address;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum JoinStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct JoinRequest {
    #[serde(alias = "_id")]
    pub id: String,
    pub user_id: String,
    pub mess_id: String,
    #[serde(default)]
    pub status: JoinStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJoinRequest {
    pub user_id: String,
    pub mess_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequestPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JoinStatus>,
}

impl Record for JoinRequest {
    const COLLECTION: &'static str = "join_requests";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Resource for JoinRequest {
    type Draft = NewJoinRequest;
    type Patch = JoinRequestPatch;

    const PATH: &'static str = "/join-requests";
    const ONE: &'static str = "joinRequest";
    const MANY: &'static str = "joinRequests";
    const TTL: Ttl = Ttl::Short;

    fn scope(&self) -> Scope {
        Scope::Mess(self.mess_id.clone())
    }

    fn draft_scope(draft: &NewJoinRequest) -> Scope {
        Scope::Mess(draft.mess_id.clone())
    }

    fn from_draft(id: String, created_at: DateTime<Utc>, draft: NewJoinRequest) -> Self {
        Self {
            id,
            user_id: draft.user_id,
            mess_id: draft.mess_id,
            status: JoinStatus::Pending,
            created_at,
        }
    }

    fn apply(&mut self, patch: JoinRequestPatch) {
        patch_field(&mut self.status, patch.status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(mess_id: Option<&str>, approved: bool, active: bool) -> User {
        User {
            id: "u1".to_string(),
            name: "Rahim".to_string(),
            email: "rahim@example.com".to_string(),
            phone: None,
            role: Role::Member,
            mess_id: mess_id.map(str::to_string),
            is_approved: approved,
            is_active: active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_current_member_requires_approval_activity_and_mess() {
        assert!(user(Some("x"), true, true).is_current_member_of("x"));
        assert!(!user(Some("x"), false, true).is_current_member_of("x"));
        assert!(!user(Some("x"), true, false).is_current_member_of("x"));
        assert!(!user(Some("y"), true, true).is_current_member_of("x"));
        assert!(!user(None, true, true).is_current_member_of("x"));
    }

    #[test]
    fn test_user_defaults_from_sparse_json() {
        let json = r#"{"_id":"u9","name":"Karim","email":"k@example.com","createdAt":"2024-01-01T00:00:00Z"}"#;
        let user: User = serde_json::from_str(json).expect("user should parse");
        assert_eq!(user.role, Role::Member);
        assert!(user.is_active);
        assert!(!user.is_approved);
        assert!(user.mess_id.is_none());
    }

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_string(&Role::Manager).unwrap(), "\"manager\"");
        assert_eq!(Role::Member.to_string(), "member");
    }
}
