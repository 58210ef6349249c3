//! Cache key naming.
//!
//! Summary keys start with the month id so that every summary derived from
//! one month can be dropped with a single prefix invalidation.

use crate::models::Scope;

/// Prefix shared by every derived summary.
pub const SUMMARY_PREFIX: &str = "summary:";

/// Prefix of single-user keys
pub const USER_PREFIX: &str = "user:";

/// Prefix of join-code lookups
pub const MESS_CODE_PREFIX: &str = "mess-code:";

/// List of `collection` records filtered by `scope`, e.g. `meals:month:abc`
pub fn list(collection: &str, scope: &Scope) -> String {
    format!("{}:{}", collection, scope.cache_suffix())
}

/// Prefix covering every list of `collection`
pub fn collection(collection: &str) -> String {
    format!("{}:", collection)
}

pub fn user(user_id: &str) -> String {
    format!("{}{}", USER_PREFIX, user_id)
}

pub fn mess(mess_id: &str) -> String {
    format!("mess:{}", mess_id)
}

pub fn mess_by_code(code: &str) -> String {
    format!("{}{}", MESS_CODE_PREFIX, code.trim().to_uppercase())
}

pub fn members(mess_id: &str) -> String {
    format!("users:mess:{}", mess_id)
}

pub fn active_month(mess_id: &str) -> String {
    format!("months:active:{}", mess_id)
}

pub fn month_summary(month_id: &str) -> String {
    format!("{}{}:month", SUMMARY_PREFIX, month_id)
}

pub fn member_summary(month_id: &str, user_id: &str) -> String {
    format!("{}{}:member:{}", SUMMARY_PREFIX, month_id, user_id)
}

pub fn all_members_summary(month_id: &str) -> String {
    format!("{}{}:members", SUMMARY_PREFIX, month_id)
}

/// Prefix covering every summary derived from `month_id`
pub fn summaries_of(month_id: &str) -> String {
    format!("{}{}:", SUMMARY_PREFIX, month_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_keys_share_month_prefix() {
        let prefix = summaries_of("m1");
        assert!(month_summary("m1").starts_with(&prefix));
        assert!(member_summary("m1", "u1").starts_with(&prefix));
        assert!(all_members_summary("m1").starts_with(&prefix));
        assert!(!member_summary("m10", "u1").starts_with(&prefix));
    }

    #[test]
    fn test_list_key_format() {
        let key = list("meals", &Scope::Month("abc".to_string()));
        assert_eq!(key, "meals:month:abc");
        assert!(key.starts_with(&collection("meals")));
        assert!(active_month("x").starts_with(&collection("months")));
    }

    #[test]
    fn test_user_keys_do_not_overlap_member_lists() {
        assert!(user("u1").starts_with(USER_PREFIX));
        assert!(!members("m1").starts_with(USER_PREFIX));
        assert!(members("m1").starts_with(&collection("users")));
        assert_eq!(mess_by_code(" ab12cd "), "mess-code:AB12CD");
    }
}
