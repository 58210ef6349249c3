//! Computed balance views produced by the allocation engine or returned by
//! the remote summary endpoints.

use serde::{Deserialize, Serialize};

/// One member's position for one month.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct MemberSummary {
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    pub month_id: String,
    pub total_meals: f64,
    pub total_deposit: f64,
    pub meal_rate: f64,
    pub meal_cost: f64,
    pub individual_cost: f64,
    /// This member's equal share of all shared costs.
    pub shared_cost: f64,
    pub total_cost: f64,
    /// Positive when the mess owes the member.
    pub balance: f64,
}

impl MemberSummary {
    pub fn owes(&self) -> bool {
        self.balance < 0.0
    }

    /// Copy with money fields rounded to cents for display
    pub fn rounded(&self) -> Self {
        Self {
            meal_rate: round_cents(self.meal_rate),
            meal_cost: round_cents(self.meal_cost),
            individual_cost: round_cents(self.individual_cost),
            shared_cost: round_cents(self.shared_cost),
            total_cost: round_cents(self.total_cost),
            total_deposit: round_cents(self.total_deposit),
            balance: round_cents(self.balance),
            ..self.clone()
        }
    }
}

/// Mess-wide totals for one month.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct MonthSummary {
    pub month_id: String,
    pub mess_id: String,
    pub total_meals: f64,
    pub total_deposit: f64,
    pub total_meal_cost: f64,
    pub total_individual_cost: f64,
    pub total_shared_cost: f64,
    pub total_expense: f64,
    pub meal_rate: f64,
    pub member_count: usize,
    pub mess_balance: f64,
}

pub(crate) fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(3.3333), 3.33);
        assert_eq!(round_cents(-2.004), -2.0);
        assert_eq!(round_cents(-2.006), -2.01);
        assert_eq!(round_cents(0.0), 0.0);
    }

    #[test]
    fn test_rounded_keeps_identity_fields() {
        let summary = MemberSummary {
            user_id: "u1".to_string(),
            month_id: "m1".to_string(),
            meal_rate: 33.33333,
            balance: -12.3456,
            ..Default::default()
        };
        let rounded = summary.rounded();
        assert_eq!(rounded.user_id, "u1");
        assert_eq!(rounded.meal_rate, 33.33);
        assert_eq!(rounded.balance, -12.35);
        assert!(rounded.owes());
    }
}
