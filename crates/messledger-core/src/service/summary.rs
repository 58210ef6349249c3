//! Month and member balances.
//!
//! The remote computes summaries itself. Offline they are computed from the
//! local records with the allocation engine.

use super::{DataService, Served, ServiceError};
use crate::allocation::{self, MonthLedger};
use crate::api::ApiError;
use crate::cache::{keys, Ttl};
use crate::models::{
    Deposit, Meal, MealCost, MemberSummary, Month, MonthSummary, OtherCost, Scope, User,
};
use crate::store::LocalStore;

/// Owned copy of the local records of one month.
struct LocalLedger {
    month: Month,
    meals: Vec<Meal>,
    deposits: Vec<Deposit>,
    meal_costs: Vec<MealCost>,
    other_costs: Vec<OtherCost>,
    members: Vec<User>,
}

impl LocalLedger {
    async fn load(store: &LocalStore, month_id: &str) -> Result<Self, ServiceError> {
        let month = store
            .get::<Month>(month_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Month {}", month_id)))?;
        let scope = Scope::Month(month_id.to_string());

        Ok(Self {
            meals: store.list_scoped(&scope).await?,
            deposits: store.list_scoped(&scope).await?,
            meal_costs: store.list_scoped(&scope).await?,
            other_costs: store.list_scoped(&scope).await?,
            members: store.mess_users(&month.mess_id).await?,
            month,
        })
    }

    fn ledger(&self) -> MonthLedger<'_> {
        MonthLedger {
            month_id: &self.month.id,
            mess_id: &self.month.mess_id,
            meals: &self.meals,
            deposits: &self.deposits,
            meal_costs: &self.meal_costs,
            other_costs: &self.other_costs,
            members: &self.members,
        }
    }
}

impl DataService {
    pub async fn get_member_summary(&self, user_id: &str, month_id: &str) -> Served<MemberSummary> {
        let (remote_user, remote_month) = (user_id.to_string(), month_id.to_string());
        self.read(
            "get_member_summary",
            keys::member_summary(month_id, user_id),
            Ttl::Default,
            move |client| async move { client.member_summary(&remote_user, &remote_month).await },
            async {
                let local = LocalLedger::load(&self.store, month_id).await?;
                Ok::<_, ServiceError>(allocation::member_summary(&local.ledger(), user_id))
            },
        )
        .await
    }

    pub async fn get_month_summary(&self, month_id: &str) -> Served<MonthSummary> {
        let remote_month = month_id.to_string();
        self.read(
            "get_month_summary",
            keys::month_summary(month_id),
            Ttl::Default,
            move |client| async move { client.month_summary(&remote_month).await },
            async {
                let local = LocalLedger::load(&self.store, month_id).await?;
                Ok::<_, ServiceError>(allocation::month_summary(&local.ledger()))
            },
        )
        .await
    }

    /// Summaries of every approved, active member of the month's mess
    pub async fn get_all_members_summary(&self, month_id: &str) -> Served<Vec<MemberSummary>> {
        let remote_month = month_id.to_string();
        self.read(
            "get_all_members_summary",
            keys::all_members_summary(month_id),
            Ttl::Default,
            move |client| async move { client.all_members_summary(&remote_month).await },
            async {
                let local = LocalLedger::load(&self.store, month_id).await?;
                Ok::<_, ServiceError>(allocation::all_members_summary(&local.ledger()))
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{extract::State, routing::get, Json, Router};
    use chrono::NaiveDate;
    use serde_json::{json, Value};

    use super::super::testing::{local_service, remote_service, spawn_server};
    use super::*;
    use crate::models::{
        NewMeal, NewMealCost, NewMess, NewMonth, NewOtherCost, NewUser, UserPatch,
    };

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()
    }

    /// Mess with `members` approved users and an active month.
    async fn seed(service: &DataService, members: usize) -> (Month, Vec<User>) {
        let mut users = Vec::new();
        for i in 0..members {
            let user = service
                .register(NewUser {
                    name: format!("Member {}", i),
                    email: format!("member{}@example.com", i),
                    password: "pass1234".to_string(),
                    phone: None,
                })
                .await
                .ok()
                .unwrap();
            users.push(user);
        }

        let mess = service
            .create_mess(NewMess {
                name: "Hall 7".to_string(),
                manager_id: users[0].id.clone(),
                address: None,
            })
            .await
            .ok()
            .unwrap();
        for user in &users[1..] {
            service
                .store()
                .update(&user.id, |u: &mut User| {
                    u.mess_id = Some(mess.id.clone());
                    u.is_approved = true;
                })
                .await
                .unwrap();
        }

        let month = service
            .create_month(NewMonth {
                mess_id: mess.id.clone(),
                name: "April".to_string(),
                start_date: day(),
                end_date: None,
                is_active: true,
            })
            .await
            .ok()
            .unwrap();
        (month, users)
    }

    async fn add_meals(service: &DataService, month_id: &str, user_id: &str, lunches: f64) {
        service
            .create_meal(NewMeal {
                month_id: month_id.to_string(),
                user_id: user_id.to_string(),
                date: day(),
                breakfast: 0.0,
                lunch: lunches,
                dinner: 0.0,
            })
            .await
            .ok()
            .unwrap();
    }

    #[tokio::test]
    async fn test_offline_meal_rate_and_cost() {
        let (_dir, service) = local_service();
        let (month, users) = seed(&service, 2).await;

        add_meals(&service, &month.id, &users[0].id, 20.0).await;
        add_meals(&service, &month.id, &users[1].id, 80.0).await;
        service
            .create_meal_cost(NewMealCost {
                month_id: month.id.clone(),
                user_id: users[0].id.clone(),
                date: day(),
                amount: 300.0,
                description: None,
            })
            .await
            .ok()
            .unwrap();

        let summary = service.get_member_summary(&users[0].id, &month.id).await;
        assert!(summary.is_local());
        let summary = summary.ok().unwrap();
        assert!((summary.meal_rate - 3.0).abs() < 1e-9);
        assert!((summary.meal_cost - 60.0).abs() < 1e-9);

        let month_summary = service.get_month_summary(&month.id).await.ok().unwrap();
        assert_eq!(month_summary.member_count, 2);
        assert!((month_summary.total_meals - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_offline_shared_cost_uses_live_member_count() {
        let (_dir, service) = local_service();
        let (month, users) = seed(&service, 4).await;
        service
            .create_other_cost(NewOtherCost {
                month_id: month.id.clone(),
                user_id: users[0].id.clone(),
                date: day(),
                amount: 100.0,
                description: Some("Gas bill".to_string()),
                is_shared: true,
            })
            .await
            .ok()
            .unwrap();

        let all = service.get_all_members_summary(&month.id).await.ok().unwrap();
        assert_eq!(all.len(), 4);
        assert!(all.iter().all(|s| (s.shared_cost - 25.0).abs() < 1e-9));

        // Deactivating a member re-splits the same cost among the rest
        service
            .update_user(
                &users[3].id,
                UserPatch {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .ok()
            .unwrap();
        let all = service.get_all_members_summary(&month.id).await.ok().unwrap();
        assert_eq!(all.len(), 3);
        let total: f64 = all.iter().map(|s| s.shared_cost).sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_offline_summary_of_unknown_month_is_not_found() {
        let (_dir, service) = local_service();
        assert!(matches!(
            service.get_month_summary("nope").await,
            Served::Failed(ServiceError::Rejected(ApiError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_remote_summary_is_cached_until_a_write() {
        async fn health() -> Json<Value> {
            Json(json!({ "mongodb": "connected" }))
        }
        async fn summary(State(hits): State<Arc<AtomicUsize>>) -> Json<Value> {
            hits.fetch_add(1, Ordering::SeqCst);
            Json(json!({
                "success": true,
                "summary": {
                    "monthId": "mo1", "messId": "me1", "totalMeals": 100.0,
                    "totalDeposit": 500.0, "totalMealCost": 300.0,
                    "totalIndividualCost": 0.0, "totalSharedCost": 100.0,
                    "totalExpense": 400.0, "mealRate": 3.0, "memberCount": 4,
                    "messBalance": 100.0
                }
            }))
        }
        async fn created() -> Json<Value> {
            Json(json!({
                "success": true,
                "otherCost": {
                    "_id": "oc1", "monthId": "mo1", "userId": "u1", "date": "2024-04-01",
                    "amount": 10.0, "isShared": true, "createdAt": "2024-04-01T00:00:00Z"
                }
            }))
        }

        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/health", get(health))
            .route("/summary/month/{id}", get(summary))
            .route("/other-costs", axum::routing::post(created))
            .with_state(hits.clone());
        let url = spawn_server(app).await;
        let (_dir, service) = remote_service(&url);

        let first = service.get_month_summary("mo1").await;
        assert!(first.is_remote());
        assert_eq!(first.value().map(|s| s.member_count), Some(4));
        assert!(service.get_month_summary("mo1").await.is_remote());
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let cost = service
            .create_other_cost(NewOtherCost {
                month_id: "mo1".to_string(),
                user_id: "u1".to_string(),
                date: day(),
                amount: 10.0,
                description: None,
                is_shared: true,
            })
            .await;
        assert!(cost.is_remote());

        assert!(service.get_month_summary("mo1").await.is_remote());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
