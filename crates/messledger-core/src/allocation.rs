//! Cost allocation for one month of a mess.
//!
//! Meal costs are spread by meals eaten, at a single meal rate for the month.
//! Shared other-costs are split equally among the mess's current members,
//! individual other-costs are charged to the member who incurred them.
//!
//! Everything here is a pure function of a borrowed [`MonthLedger`]; the
//! same ledger always yields the same summaries.

use crate::models::{Deposit, Meal, MealCost, MemberSummary, MonthSummary, OtherCost, User};

/// Every record the allocation of one month needs.
///
/// Records of other months may be included; they are ignored. `members` is
/// the mess's user list, and only approved, active members of `mess_id`
/// take part in the shared-cost split.
#[derive(Debug, Clone, Copy)]
pub struct MonthLedger<'a> {
    pub month_id: &'a str,
    pub mess_id: &'a str,
    pub meals: &'a [Meal],
    pub deposits: &'a [Deposit],
    pub meal_costs: &'a [MealCost],
    pub other_costs: &'a [OtherCost],
    pub members: &'a [User],
}

impl<'a> MonthLedger<'a> {
    fn meals(&self) -> impl Iterator<Item = &'a Meal> + '_ {
        self.meals.iter().filter(move |m| m.month_id == self.month_id)
    }

    fn deposits(&self) -> impl Iterator<Item = &'a Deposit> + '_ {
        self.deposits.iter().filter(move |d| d.month_id == self.month_id)
    }

    fn meal_costs(&self) -> impl Iterator<Item = &'a MealCost> + '_ {
        self.meal_costs.iter().filter(move |c| c.month_id == self.month_id)
    }

    fn other_costs(&self) -> impl Iterator<Item = &'a OtherCost> + '_ {
        self.other_costs.iter().filter(move |c| c.month_id == self.month_id)
    }

    /// Approved, active members of the mess right now
    pub fn current_members(&self) -> impl Iterator<Item = &'a User> + '_ {
        self.members
            .iter()
            .filter(move |u| u.is_current_member_of(self.mess_id))
    }

    pub fn member_count(&self) -> usize {
        self.current_members().count()
    }

    fn total_meals(&self) -> f64 {
        self.meals().map(Meal::total).sum()
    }

    fn total_meal_cost(&self) -> f64 {
        self.meal_costs().map(|c| c.amount).sum()
    }

    fn total_shared_cost(&self) -> f64 {
        self.other_costs()
            .filter(|c| c.is_shared)
            .map(|c| c.amount)
            .sum()
    }

    /// Zero when nobody has eaten yet
    pub fn meal_rate(&self) -> f64 {
        let total_meals = self.total_meals();
        if total_meals > 0.0 {
            self.total_meal_cost() / total_meals
        } else {
            0.0
        }
    }

    /// One member's equal share of the shared costs
    pub fn shared_share(&self) -> f64 {
        self.total_shared_cost() / self.member_count().max(1) as f64
    }
}

/// Position of `user_id` in the ledger's month.
pub fn member_summary(ledger: &MonthLedger<'_>, user_id: &str) -> MemberSummary {
    let total_meals: f64 = ledger
        .meals()
        .filter(|m| m.user_id == user_id)
        .map(Meal::total)
        .sum();
    let total_deposit: f64 = ledger
        .deposits()
        .filter(|d| d.user_id == user_id)
        .map(|d| d.amount)
        .sum();
    let individual_cost: f64 = ledger
        .other_costs()
        .filter(|c| !c.is_shared && c.user_id == user_id)
        .map(|c| c.amount)
        .sum();

    let meal_rate = ledger.meal_rate();
    let meal_cost = total_meals * meal_rate;
    let shared_cost = ledger.shared_share();
    let total_cost = meal_cost + individual_cost + shared_cost;

    let user_name = ledger
        .members
        .iter()
        .find(|u| u.id == user_id)
        .map(|u| u.name.clone())
        .unwrap_or_default();

    MemberSummary {
        user_id: user_id.to_string(),
        user_name,
        month_id: ledger.month_id.to_string(),
        total_meals,
        total_deposit,
        meal_rate,
        meal_cost,
        individual_cost,
        shared_cost,
        total_cost,
        balance: total_deposit - total_cost,
    }
}

/// Mess-wide totals of the ledger's month.
pub fn month_summary(ledger: &MonthLedger<'_>) -> MonthSummary {
    let total_meal_cost = ledger.total_meal_cost();
    let total_individual_cost: f64 = ledger
        .other_costs()
        .filter(|c| !c.is_shared)
        .map(|c| c.amount)
        .sum();
    let total_shared_cost = ledger.total_shared_cost();
    let total_deposit: f64 = ledger.deposits().map(|d| d.amount).sum();
    let total_expense = total_meal_cost + total_individual_cost + total_shared_cost;

    MonthSummary {
        month_id: ledger.month_id.to_string(),
        mess_id: ledger.mess_id.to_string(),
        total_meals: ledger.total_meals(),
        total_deposit,
        total_meal_cost,
        total_individual_cost,
        total_shared_cost,
        total_expense,
        meal_rate: ledger.meal_rate(),
        member_count: ledger.member_count(),
        mess_balance: total_deposit - total_expense,
    }
}

/// [`member_summary`] for every current member, in member-list order.
pub fn all_members_summary(ledger: &MonthLedger<'_>) -> Vec<MemberSummary> {
    ledger
        .current_members()
        .map(|u| member_summary(ledger, &u.id))
        .collect()
}
