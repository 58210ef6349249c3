//! Sign-in, registration and the current session.

use tracing::{info, warn};

use super::{DataService, Served, ServiceError};
use crate::api::{ApiError, AuthPayload};
use crate::auth::SessionData;
use crate::models::{NewUser, User};

impl DataService {
    /// Sign in remotely, or against the local credentials while offline.
    pub async fn login(&self, email: &str, password: &str) -> Served<User> {
        let served = self
            .write(
                "login",
                move |client| async move { client.login(email, password).await },
                async {
                    match self.store.verify_credentials(email, password).await? {
                        Some(user) => Ok(AuthPayload {
                            user,
                            token: String::new(),
                        }),
                        None => Err(ServiceError::Rejected(ApiError::Unauthorized(
                            "Invalid email or password".to_string(),
                        ))),
                    }
                },
            )
            .await;
        self.start_session(served).await
    }

    /// Create an account remotely, or in the local store while offline.
    pub async fn register(&self, new_user: NewUser) -> Served<User> {
        let remote_user = new_user.clone();
        let served = self
            .write(
                "register",
                move |client| async move { client.register(&remote_user).await },
                async {
                    match self.store.register_user(new_user).await? {
                        Some(user) => Ok(AuthPayload {
                            user,
                            token: String::new(),
                        }),
                        None => Err(ServiceError::Rejected(ApiError::Conflict(
                            "Email already registered".to_string(),
                        ))),
                    }
                },
            )
            .await;
        self.start_session(served).await
    }

    /// Keep the token and the session slot for a successful sign-in.
    async fn start_session(&self, served: Served<AuthPayload>) -> Served<User> {
        let offline = served.is_local();
        if let Some(payload) = served.value() {
            if !payload.token.is_empty() {
                if let Err(e) = self.tokens.set(&payload.token) {
                    warn!(error = %e, "Failed to store auth token");
                }
            }
            let session = SessionData::new(payload.user.clone(), offline);
            if let Err(e) = self.store.save_session(&session).await {
                warn!(error = %e, "Failed to save session");
            }
            info!(user = %payload.user.email, offline, "Signed in");
        }
        served.map(|payload| payload.user)
    }

    /// Forget the token, the session and everything cached.
    pub async fn logout(&self) -> Served<()> {
        if let Err(e) = self.tokens.clear() {
            warn!(error = %e, "Failed to clear auth token");
        }
        self.cache.clear();
        Served::from_local(self.store.clear_session().await)
    }

    /// The signed-in user, if the session has not expired.
    pub async fn current_user(&self) -> Served<Option<User>> {
        Served::from_local(
            self.store
                .load_session()
                .await
                .map(|session| session.map(|s| s.user)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::local_service;
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Nadia".to_string(),
            email: email.to_string(),
            password: "correct horse".to_string(),
            phone: Some("01700000000".to_string()),
        }
    }

    #[tokio::test]
    async fn test_offline_register_login_logout() {
        let (_dir, service) = local_service();

        let registered = service.register(new_user("nadia@example.com")).await;
        assert!(registered.is_local());
        let user = registered.ok().unwrap();

        let current = service.current_user().await.ok().flatten();
        assert_eq!(current.map(|u| u.id), Some(user.id.clone()));

        assert!(service.logout().await.is_local());
        assert_eq!(service.current_user().await, Served::Local(None));

        let login = service.login("nadia@example.com", "correct horse").await;
        assert_eq!(login.ok().map(|u| u.id), Some(user.id));
        let session = service.store().load_session().await.unwrap().unwrap();
        assert!(session.offline);
    }

    #[tokio::test]
    async fn test_offline_duplicate_and_bad_password_are_rejections() {
        let (_dir, service) = local_service();
        service.register(new_user("dup@example.com")).await;

        let again = service.register(new_user("DUP@example.com")).await;
        assert!(matches!(
            again,
            Served::Failed(ServiceError::Rejected(ApiError::Conflict(_)))
        ));

        let bad = service.login("dup@example.com", "wrong").await;
        assert!(matches!(
            bad,
            Served::Failed(ServiceError::Rejected(ApiError::Unauthorized(_)))
        ));
    }
}
