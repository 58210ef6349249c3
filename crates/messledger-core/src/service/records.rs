//! Months, activity records and board records.
//!
//! These all follow the uniform list/create/update/delete contract of
//! [`Resource`](crate::models::Resource).

use super::{DataService, Served};
use crate::cache::{keys, Ttl};
use crate::models::{
    BazarDate, BazarDatePatch, Deposit, DepositPatch, Meal, MealCost, MealCostPatch, MealPatch,
    Month, MonthPatch, NewBazarDate, NewDeposit, NewMeal, NewMealCost, NewMonth, NewNote,
    NewNotice, NewNotification, NewOtherCost, Note, NotePatch, Notice, NoticePatch, Notification,
    NotificationPatch, OtherCost, OtherCostPatch, Resource, Scope,
};

fn mess(id: &str) -> Scope {
    Scope::Mess(id.to_string())
}

fn month(id: &str) -> Scope {
    Scope::Month(id.to_string())
}

impl DataService {
    // ===== Months =====

    pub async fn get_months(&self, mess_id: &str) -> Served<Vec<Month>> {
        self.list_resource("get_months", mess(mess_id)).await
    }

    pub async fn get_active_month(&self, mess_id: &str) -> Served<Option<Month>> {
        let remote_id = mess_id.to_string();
        self.read(
            "get_active_month",
            keys::active_month(mess_id),
            Ttl::Long,
            move |client| async move { client.active_month(&remote_id).await },
            self.store.active_month(mess_id),
        )
        .await
    }

    /// Create a month. An active month deactivates the mess's other months.
    pub async fn create_month(&self, new_month: NewMonth) -> Served<Month> {
        self.create_resource("create_month", new_month).await
    }

    pub async fn update_month(&self, id: &str, patch: MonthPatch) -> Served<Option<Month>> {
        self.update_resource("update_month", id, patch).await
    }

    pub async fn delete_month(&self, id: &str) -> Served<bool> {
        self.delete_resource::<Month>("delete_month", id).await
    }

    // ===== Meals =====

    pub async fn get_meals(&self, month_id: &str) -> Served<Vec<Meal>> {
        self.list_resource("get_meals", month(month_id)).await
    }

    pub async fn create_meal(&self, meal: NewMeal) -> Served<Meal> {
        self.create_resource("create_meal", meal).await
    }

    pub async fn update_meal(&self, id: &str, patch: MealPatch) -> Served<Option<Meal>> {
        self.update_resource("update_meal", id, patch).await
    }

    pub async fn delete_meal(&self, id: &str) -> Served<bool> {
        self.delete_resource::<Meal>("delete_meal", id).await
    }

    // ===== Deposits =====

    pub async fn get_deposits(&self, month_id: &str) -> Served<Vec<Deposit>> {
        self.list_resource("get_deposits", month(month_id)).await
    }

    pub async fn create_deposit(&self, deposit: NewDeposit) -> Served<Deposit> {
        self.create_resource("create_deposit", deposit).await
    }

    pub async fn update_deposit(&self, id: &str, patch: DepositPatch) -> Served<Option<Deposit>> {
        self.update_resource("update_deposit", id, patch).await
    }

    pub async fn delete_deposit(&self, id: &str) -> Served<bool> {
        self.delete_resource::<Deposit>("delete_deposit", id).await
    }

    // ===== Meal costs =====

    pub async fn get_meal_costs(&self, month_id: &str) -> Served<Vec<MealCost>> {
        self.list_resource("get_meal_costs", month(month_id)).await
    }

    pub async fn create_meal_cost(&self, cost: NewMealCost) -> Served<MealCost> {
        self.create_resource("create_meal_cost", cost).await
    }

    pub async fn update_meal_cost(
        &self,
        id: &str,
        patch: MealCostPatch,
    ) -> Served<Option<MealCost>> {
        self.update_resource("update_meal_cost", id, patch).await
    }

    pub async fn delete_meal_cost(&self, id: &str) -> Served<bool> {
        self.delete_resource::<MealCost>("delete_meal_cost", id).await
    }

    // ===== Other costs =====

    pub async fn get_other_costs(&self, month_id: &str) -> Served<Vec<OtherCost>> {
        self.list_resource("get_other_costs", month(month_id)).await
    }

    pub async fn create_other_cost(&self, cost: NewOtherCost) -> Served<OtherCost> {
        self.create_resource("create_other_cost", cost).await
    }

    pub async fn update_other_cost(
        &self,
        id: &str,
        patch: OtherCostPatch,
    ) -> Served<Option<OtherCost>> {
        self.update_resource("update_other_cost", id, patch).await
    }

    pub async fn delete_other_cost(&self, id: &str) -> Served<bool> {
        self.delete_resource::<OtherCost>("delete_other_cost", id).await
    }

    // ===== Notices =====

    pub async fn get_notices(&self, mess_id: &str) -> Served<Vec<Notice>> {
        self.list_resource("get_notices", mess(mess_id)).await
    }

    pub async fn create_notice(&self, notice: NewNotice) -> Served<Notice> {
        self.create_resource("create_notice", notice).await
    }

    pub async fn update_notice(&self, id: &str, patch: NoticePatch) -> Served<Option<Notice>> {
        self.update_resource("update_notice", id, patch).await
    }

    pub async fn delete_notice(&self, id: &str) -> Served<bool> {
        self.delete_resource::<Notice>("delete_notice", id).await
    }

    // ===== Notes =====

    pub async fn get_notes(&self, mess_id: &str) -> Served<Vec<Note>> {
        self.list_resource("get_notes", mess(mess_id)).await
    }

    pub async fn create_note(&self, note: NewNote) -> Served<Note> {
        self.create_resource("create_note", note).await
    }

    pub async fn update_note(&self, id: &str, patch: NotePatch) -> Served<Option<Note>> {
        self.update_resource("update_note", id, patch).await
    }

    pub async fn delete_note(&self, id: &str) -> Served<bool> {
        self.delete_resource::<Note>("delete_note", id).await
    }

    // ===== Bazar dates =====

    pub async fn get_bazar_dates(&self, mess_id: &str) -> Served<Vec<BazarDate>> {
        self.list_resource("get_bazar_dates", mess(mess_id)).await
    }

    pub async fn create_bazar_date(&self, date: NewBazarDate) -> Served<BazarDate> {
        self.create_resource("create_bazar_date", date).await
    }

    pub async fn update_bazar_date(
        &self,
        id: &str,
        patch: BazarDatePatch,
    ) -> Served<Option<BazarDate>> {
        self.update_resource("update_bazar_date", id, patch).await
    }

    pub async fn delete_bazar_date(&self, id: &str) -> Served<bool> {
        self.delete_resource::<BazarDate>("delete_bazar_date", id).await
    }

    // ===== Notifications =====

    pub async fn get_notifications(&self, user_id: &str) -> Served<Vec<Notification>> {
        self.list_resource("get_notifications", Scope::User(user_id.to_string()))
            .await
    }

    pub async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Served<Notification> {
        self.create_resource("create_notification", notification)
            .await
    }

    pub async fn update_notification(
        &self,
        id: &str,
        patch: NotificationPatch,
    ) -> Served<Option<Notification>> {
        self.update_resource("update_notification", id, patch).await
    }

    pub async fn delete_notification(&self, id: &str) -> Served<bool> {
        self.delete_resource::<Notification>("delete_notification", id)
            .await
    }

    pub async fn mark_notification_read(&self, id: &str) -> Served<Option<Notification>> {
        let served = self
            .write(
                "mark_notification_read",
                move |client| async move {
                    client.action::<Notification>(id, "read").await.map(Some)
                },
                self.store.apply_patch::<Notification>(
                    id,
                    NotificationPatch {
                        is_read: Some(true),
                    },
                ),
            )
            .await;
        if let Some(Some(notification)) = served.value() {
            self.invalidate_resource::<Notification>(Some(&notification.scope()));
        }
        served
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::super::testing::local_service;
    use super::*;

    fn new_month(name: &str, day: u32) -> NewMonth {
        NewMonth {
            mess_id: "mess-1".to_string(),
            name: name.to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            end_date: None,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_new_active_month_replaces_the_old_one() {
        let (_dir, service) = local_service();

        let a = service.create_month(new_month("January", 1)).await.ok().unwrap();
        assert_eq!(
            service.get_active_month("mess-1").await.ok().flatten().map(|m| m.id),
            Some(a.id.clone())
        );

        let b = service.create_month(new_month("February", 2)).await.ok().unwrap();
        let months = service.get_months("mess-1").await.ok().unwrap();
        let active: Vec<_> = months.iter().filter(|m| m.is_active).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, b.id);
        assert!(months.iter().any(|m| m.id == a.id && !m.is_active));
    }

    #[tokio::test]
    async fn test_activity_crud_offline() {
        let (_dir, service) = local_service();
        let deposit = service
            .create_deposit(NewDeposit {
                month_id: "mo".to_string(),
                user_id: "u1".to_string(),
                date: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
                amount: 1500.0,
                note: None,
            })
            .await
            .ok()
            .unwrap();

        let updated = service
            .update_deposit(
                &deposit.id,
                DepositPatch {
                    amount: Some(2000.0),
                    ..Default::default()
                },
            )
            .await;
        assert_eq!(updated.ok().flatten().map(|d| d.amount), Some(2000.0));

        assert_eq!(
            service.update_meal("missing", MealPatch::default()).await,
            Served::Local(None)
        );
        assert_eq!(service.delete_deposit(&deposit.id).await, Served::Local(true));
        assert_eq!(service.delete_deposit(&deposit.id).await, Served::Local(false));
        assert_eq!(service.get_deposits("mo").await, Served::Local(Vec::new()));
    }

    #[tokio::test]
    async fn test_mark_notification_read() {
        let (_dir, service) = local_service();
        let notification = service
            .create_notification(NewNotification {
                user_id: "u1".to_string(),
                title: "Bazar".to_string(),
                message: "Your bazar day is tomorrow".to_string(),
            })
            .await
            .ok()
            .unwrap();
        assert!(!notification.is_read);

        let read = service.mark_notification_read(&notification.id).await;
        assert_eq!(read.ok().flatten().map(|n| n.is_read), Some(true));
        assert_eq!(
            service.get_notifications("u1").await.ok().map(|n| n.len()),
            Some(1)
        );
        assert_eq!(service.get_notifications("u2").await, Served::Local(Vec::new()));
    }
}
