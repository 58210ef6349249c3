use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::User;

/// Session lifetime in days, matching the remote token expiry.
const SESSION_EXPIRY_DAYS: i64 = 7;

/// The signed-in user, persisted in the local store's session slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub user: User,
    pub logged_in_at: DateTime<Utc>,
    /// True when the login was verified by the local store instead of
    /// the remote service.
    #[serde(default)]
    pub offline: bool,
}

impl SessionData {
    pub fn new(user: User, offline: bool) -> Self {
        Self {
            user,
            logged_in_at: Utc::now(),
            offline,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.logged_in_at + Duration::days(SESSION_EXPIRY_DAYS)
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.logged_in_at + Duration::days(SESSION_EXPIRY_DAYS) - Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn user() -> User {
        User {
            id: "u1".to_string(),
            name: "Rahim".to_string(),
            email: "rahim@example.com".to_string(),
            phone: None,
            role: Role::Member,
            mess_id: None,
            is_approved: false,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_session_expiry() {
        let fresh = SessionData::new(user(), false);
        assert!(!fresh.is_expired());
        assert!(fresh.time_until_expiry() > Duration::days(6));

        let mut old = SessionData::new(user(), true);
        old.logged_in_at = Utc::now() - Duration::days(8);
        assert!(old.is_expired());
    }
}
