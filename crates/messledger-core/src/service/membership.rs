//! Users, messes and join requests.
//!
//! Membership changes move users in and out of the shared-cost split, so
//! every successful write here also drops all cached summaries.

use super::{DataService, Served, ServiceError};
use crate::api::{ApiError, RemoteError};
use crate::cache::{keys, Ttl};
use crate::models::{
    JoinRequest, Mess, MessPatch, NewJoinRequest, NewMess, Record, Resource, Scope, User,
    UserPatch,
};

impl DataService {
    fn invalidate_membership(&self) {
        self.cache.invalidate_prefix(keys::USER_PREFIX);
        self.cache.invalidate_prefix(&keys::collection(User::COLLECTION));
        self.cache.invalidate_prefix(keys::SUMMARY_PREFIX);
    }

    fn invalidate_mess(&self, mess_id: &str) {
        self.cache.invalidate(&keys::mess(mess_id));
        self.cache.invalidate_prefix(keys::MESS_CODE_PREFIX);
    }

    // ===== Users =====

    pub async fn get_user(&self, id: &str) -> Served<Option<User>> {
        let remote_id = id.to_string();
        self.read(
            "get_user",
            keys::user(id),
            Ttl::Default,
            move |client| async move { client.get_user(&remote_id).await.map(Some) },
            self.store.get::<User>(id),
        )
        .await
    }

    /// Every user attached to the mess, pending ones included
    pub async fn get_mess_members(&self, mess_id: &str) -> Served<Vec<User>> {
        let remote_id = mess_id.to_string();
        self.read(
            "get_mess_members",
            keys::members(mess_id),
            Ttl::Default,
            move |client| async move { client.list_members(&remote_id).await },
            self.store.mess_users(mess_id),
        )
        .await
    }

    pub async fn update_user(&self, id: &str, patch: UserPatch) -> Served<Option<User>> {
        let remote_patch = patch.clone();
        let served = self
            .write(
                "update_user",
                move |client| async move { client.update_user(id, &remote_patch).await.map(Some) },
                self.store.update(id, |user: &mut User| user.apply(patch)),
            )
            .await;
        if let Some(Some(_)) = served.value() {
            self.invalidate_membership();
        }
        served
    }

    /// Detach a member from their mess. `false` for the manager or an
    /// unknown user. The account itself is kept.
    pub async fn remove_member(&self, user_id: &str) -> Served<bool> {
        let served = self
            .write(
                "remove_member",
                move |client| async move {
                    let user = match client.get_user(user_id).await {
                        Ok(user) => user,
                        Err(RemoteError::Rejected(ApiError::NotFound(_))) => return Ok(false),
                        Err(e) => return Err(e),
                    };
                    if user.is_manager() {
                        return Ok(false);
                    }
                    client.detach_member(user_id).await.map(|_| true)
                },
                self.store.remove_member(user_id),
            )
            .await;
        if let Some(true) = served.value() {
            self.invalidate_membership();
        }
        served
    }

    /// Make `user_id` the manager of the mess; the previous manager becomes
    /// a member.
    pub async fn transfer_manager(&self, mess_id: &str, user_id: &str) -> Served<Option<Mess>> {
        let served = self
            .write(
                "transfer_manager",
                move |client| async move {
                    client.transfer_manager(mess_id, user_id).await.map(Some)
                },
                self.store.transfer_manager(mess_id, user_id),
            )
            .await;
        if let Some(Some(_)) = served.value() {
            self.invalidate_mess(mess_id);
            self.invalidate_membership();
        }
        served
    }

    // ===== Messes =====

    /// Create a mess; its creator becomes the manager. Rejected when the
    /// creator is unknown or already manages a mess.
    pub async fn create_mess(&self, new_mess: NewMess) -> Served<Mess> {
        let remote_mess = new_mess.clone();
        let served = self
            .write(
                "create_mess",
                move |client| async move { client.create_mess(&remote_mess).await },
                async {
                    self.store.create_mess(new_mess).await?.ok_or_else(|| {
                        ServiceError::Rejected(ApiError::Conflict(
                            "Manager is unknown or already manages a mess".to_string(),
                        ))
                    })
                },
            )
            .await;
        if !served.is_failed() {
            self.invalidate_membership();
        }
        served
    }

    pub async fn get_mess(&self, id: &str) -> Served<Option<Mess>> {
        let remote_id = id.to_string();
        self.read(
            "get_mess",
            keys::mess(id),
            Ttl::Long,
            move |client| async move { client.get_mess(&remote_id).await.map(Some) },
            self.store.get::<Mess>(id),
        )
        .await
    }

    /// Look up a mess by join code, ignoring case.
    pub async fn find_mess_by_code(&self, code: &str) -> Served<Option<Mess>> {
        let remote_code = code.trim().to_uppercase();
        self.read(
            "find_mess_by_code",
            keys::mess_by_code(code),
            Ttl::Long,
            move |client| async move { client.find_mess_by_code(&remote_code).await },
            self.store.find_mess_by_code(code),
        )
        .await
    }

    pub async fn update_mess(&self, id: &str, patch: MessPatch) -> Served<Option<Mess>> {
        let remote_patch = patch.clone();
        let served = self
            .write(
                "update_mess",
                move |client| async move { client.update_mess(id, &remote_patch).await.map(Some) },
                self.store.update(id, |mess: &mut Mess| mess.apply(patch)),
            )
            .await;
        if let Some(Some(_)) = served.value() {
            self.invalidate_mess(id);
        }
        served
    }

    pub async fn delete_mess(&self, id: &str) -> Served<bool> {
        let served = self
            .write(
                "delete_mess",
                move |client| async move { client.delete_mess(id).await.map(|()| true) },
                self.store.remove::<Mess>(id),
            )
            .await;
        if let Some(true) = served.value() {
            self.invalidate_mess(id);
            self.invalidate_membership();
        }
        served
    }

    // ===== Join requests =====

    pub async fn get_join_requests(&self, mess_id: &str) -> Served<Vec<JoinRequest>> {
        self.list_resource("get_join_requests", Scope::Mess(mess_id.to_string()))
            .await
    }

    pub async fn create_join_request(&self, request: NewJoinRequest) -> Served<JoinRequest> {
        self.create_resource("create_join_request", request).await
    }

    /// Approve the request and make its user a member of the mess.
    pub async fn approve_join_request(&self, id: &str) -> Served<Option<JoinRequest>> {
        let served = self
            .write(
                "approve_join_request",
                move |client| async move { client.action::<JoinRequest>(id, "approve").await.map(Some) },
                self.store.approve_join_request(id),
            )
            .await;
        self.after_join_decision(&served);
        served
    }

    pub async fn reject_join_request(&self, id: &str) -> Served<Option<JoinRequest>> {
        let served = self
            .write(
                "reject_join_request",
                move |client| async move { client.action::<JoinRequest>(id, "reject").await.map(Some) },
                self.store.reject_join_request(id),
            )
            .await;
        self.after_join_decision(&served);
        served
    }

    fn after_join_decision(&self, served: &Served<Option<JoinRequest>>) {
        if let Some(Some(request)) = served.value() {
            self.invalidate_resource::<JoinRequest>(Some(&request.scope()));
            self.invalidate_membership();
        }
    }
}
