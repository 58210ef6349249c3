//! Remote-first data access with local fallback.
//!
//! `DataService` is the one entry point the UI talks to. For each operation
//! it asks the [`ConnectivityMonitor`] whether the remote may be used, calls
//! the [`RemoteClient`] (reads go through the [`ResponseCache`]) and, when
//! the remote turns out to be unreachable, runs the identical operation
//! against the [`LocalStore`]. Rejections from the remote are returned as
//! they are and never fall back.
//!
//! Every operation resolves to a [`Served`] value; nothing here returns
//! `Err` or panics.

mod auth;
mod membership;
mod records;
mod summary;

use std::future::Future;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::warn;

use crate::api::{ApiError, ConnectivityFailure, HealthStatus, RemoteClient, RemoteError};
use crate::auth::TokenStore;
use crate::cache::{keys, ResponseCache, Ttl};
use crate::config::Config;
use crate::connectivity::ConnectivityMonitor;
use crate::models::{Resource, Scope};
use crate::store::{LocalStore, StoreError};

/// Capacity of the data source event channel
const EVENT_CAPACITY: usize = 32;

/// Failure of an operation that no backend could serve.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// Deliberate rejection, from the remote or from a local check
    #[error(transparent)]
    Rejected(#[from] ApiError),

    #[error("Local storage failed: {0}")]
    Storage(String),
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        ServiceError::Storage(e.to_string())
    }
}

/// Outcome of a `DataService` operation, tagged with the backend that
/// served it.
#[derive(Debug, Clone, PartialEq)]
pub enum Served<T> {
    Remote(T),
    Local(T),
    Failed(ServiceError),
}

impl<T> Served<T> {
    fn from_local<E: Into<ServiceError>>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Served::Local(value),
            Err(e) => Served::Failed(e.into()),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Served::Remote(_))
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Served::Local(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Served::Failed(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Served::Remote(value) | Served::Local(value) => Some(value),
            Served::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ServiceError> {
        match self {
            Served::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<T, ServiceError> {
        match self {
            Served::Remote(value) | Served::Local(value) => Ok(value),
            Served::Failed(e) => Err(e),
        }
    }

    pub fn ok(self) -> Option<T> {
        self.into_result().ok()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Served<U> {
        match self {
            Served::Remote(value) => Served::Remote(f(value)),
            Served::Local(value) => Served::Local(f(value)),
            Served::Failed(e) => Served::Failed(e),
        }
    }
}

/// Data source changes announced to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSourceEvent {
    /// `operation` could not reach the remote and was served locally.
    FellBackToLocal { operation: &'static str, reason: String },
    /// A health check found the remote usable again.
    RemoteRestored,
}

pub struct DataService {
    monitor: Arc<ConnectivityMonitor>,
    remote: Option<RemoteClient>,
    cache: ResponseCache,
    store: Arc<LocalStore>,
    tokens: Arc<dyn TokenStore>,
    events: broadcast::Sender<DataSourceEvent>,
}

impl DataService {
    /// Assemble a service. `remote` should share `monitor` so that store
    /// status reported in responses reaches the same state.
    pub fn new(
        store: Arc<LocalStore>,
        remote: Option<RemoteClient>,
        monitor: Arc<ConnectivityMonitor>,
        tokens: Arc<dyn TokenStore>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            monitor,
            remote,
            cache: ResponseCache::new(),
            store,
            tokens,
            events,
        }
    }

    /// Service that never talks to a remote.
    pub fn local_only(store: Arc<LocalStore>, tokens: Arc<dyn TokenStore>) -> Self {
        Self::new(
            store,
            None,
            Arc::new(ConnectivityMonitor::local_only()),
            tokens,
        )
    }

    /// Build the full stack from configuration.
    pub fn from_config(config: &Config, tokens: Arc<dyn TokenStore>) -> anyhow::Result<Self> {
        let store = Arc::new(LocalStore::new(config.data_dir()?)?);
        let monitor = Arc::new(ConnectivityMonitor::new(
            config.remote_configured(),
            config.health_check_window(),
        ));

        let remote = match config.api_base_url.as_deref() {
            Some(url) if config.remote_configured() => Some(RemoteClient::new(
                url,
                config.request_timeout(),
                Arc::clone(&tokens),
                Arc::clone(&monitor),
            )?),
            _ => None,
        };

        Ok(Self::new(store, remote, monitor, tokens))
    }

    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.monitor
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DataSourceEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: DataSourceEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    // ===== Health =====

    /// Probe the remote and record the result. Without a remote both flags
    /// are false.
    pub async fn check_health(&self) -> HealthStatus {
        let Some(ref remote) = self.remote else {
            return HealthStatus {
                backend_available: false,
                data_store_connected: false,
            };
        };

        let was_remote = self.monitor.should_use_remote();
        let status = remote.health().await;
        self.monitor
            .record_health(status.data_store_connected, status.backend_available);

        if !was_remote && self.monitor.should_use_remote() {
            self.emit(DataSourceEvent::RemoteRestored);
        }
        status
    }

    /// The remote client, if the remote should serve the next operation.
    async fn route(&self) -> Option<&RemoteClient> {
        let remote = self.remote.as_ref()?;
        if !self.monitor.is_check_valid() {
            self.check_health().await;
        }
        self.monitor.should_use_remote().then_some(remote)
    }

    /// Readers sharing one failed fetch all land here; only the one that
    /// switched the data source announces it.
    fn fall_back(&self, operation: &'static str, failure: &ConnectivityFailure) {
        warn!(operation, error = %failure, "Remote unreachable, falling back to local store");
        if self.monitor.mark_unavailable() {
            self.emit(DataSourceEvent::FellBackToLocal {
                operation,
                reason: failure.to_string(),
            });
        }
    }

    // ===== Generic dispatch =====

    /// Cached read. `remote` gets its own client handle because the fetch
    /// may outlive this call while other callers wait on it.
    async fn read<T, RF, RFut, E>(
        &self,
        operation: &'static str,
        key: String,
        ttl: Ttl,
        remote: RF,
        local: impl Future<Output = Result<T, E>>,
    ) -> Served<T>
    where
        T: Serialize + DeserializeOwned,
        RF: FnOnce(RemoteClient) -> RFut + Send,
        RFut: Future<Output = Result<T, RemoteError>> + Send + 'static,
        E: Into<ServiceError>,
    {
        if let Some(client) = self.route().await {
            let client = client.clone();
            match self.cache.dedupe_request(&key, ttl, move || remote(client)).await {
                Ok(value) => return Served::Remote(value),
                Err(RemoteError::Rejected(e)) => return Served::Failed(e.into()),
                Err(RemoteError::Connectivity(failure)) => self.fall_back(operation, &failure),
            }
        }
        Served::from_local(local.await)
    }

    /// Uncached operation; writes and anything with side effects.
    async fn write<T, RF, RFut, E>(
        &self,
        operation: &'static str,
        remote: RF,
        local: impl Future<Output = Result<T, E>>,
    ) -> Served<T>
    where
        RF: FnOnce(RemoteClient) -> RFut,
        RFut: Future<Output = Result<T, RemoteError>>,
        E: Into<ServiceError>,
    {
        if let Some(client) = self.route().await {
            match remote(client.clone()).await {
                Ok(value) => return Served::Remote(value),
                Err(RemoteError::Rejected(e)) => return Served::Failed(e.into()),
                Err(RemoteError::Connectivity(failure)) => self.fall_back(operation, &failure),
            }
        }
        Served::from_local(local.await)
    }

    /// Drop every cached view a write to `R` can change. `scope` narrows the
    /// summaries dropped to one month when known.
    fn invalidate_resource<R: Resource>(&self, scope: Option<&Scope>) {
        self.cache.invalidate_prefix(&keys::collection(R::COLLECTION));
        if R::AFFECTS_SUMMARIES {
            match scope.and_then(Scope::month_id) {
                Some(month_id) => self.cache.invalidate_prefix(&keys::summaries_of(month_id)),
                None => self.cache.invalidate_prefix(keys::SUMMARY_PREFIX),
            }
        }
    }

    // ===== Generic resources =====

    async fn list_resource<R: Resource>(&self, operation: &'static str, scope: Scope) -> Served<Vec<R>> {
        let key = keys::list(R::COLLECTION, &scope);
        let remote_scope = scope.clone();
        self.read(
            operation,
            key,
            R::TTL,
            move |client| async move { client.list::<R>(&remote_scope).await },
            self.store.list_scoped::<R>(&scope),
        )
        .await
    }

    async fn create_resource<R: Resource>(&self, operation: &'static str, draft: R::Draft) -> Served<R> {
        let scope = R::draft_scope(&draft);
        let remote_draft = draft.clone();
        let served = self
            .write(
                operation,
                move |client| async move { client.create::<R>(&remote_draft).await },
                self.store.create::<R>(draft),
            )
            .await;
        if !served.is_failed() {
            self.invalidate_resource::<R>(Some(&scope));
        }
        served
    }

    async fn update_resource<R: Resource>(
        &self,
        operation: &'static str,
        id: &str,
        patch: R::Patch,
    ) -> Served<Option<R>> {
        let remote_patch = patch.clone();
        let served = self
            .write(
                operation,
                move |client| async move { client.update::<R>(id, &remote_patch).await.map(Some) },
                self.store.apply_patch::<R>(id, patch),
            )
            .await;
        if let Some(Some(record)) = served.value() {
            self.invalidate_resource::<R>(Some(&record.scope()));
        }
        served
    }

    async fn delete_resource<R: Resource>(&self, operation: &'static str, id: &str) -> Served<bool> {
        let served = self
            .write(
                operation,
                move |client| async move { client.delete::<R>(id).await.map(|()| true) },
                self.store.remove::<R>(id),
            )
            .await;
        if let Some(true) = served.value() {
            self.invalidate_resource::<R>(None);
        }
        served
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    use tempfile::TempDir;

    use super::DataService;
    use crate::api::RemoteClient;
    use crate::auth::MemoryTokenStore;
    use crate::connectivity::ConnectivityMonitor;
    use crate::store::LocalStore;

    /// Address nothing listens on
    pub const UNREACHABLE: &str = "http://127.0.0.1:1";

    pub fn local_service() -> (TempDir, DataService) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(LocalStore::new(dir.path().to_path_buf()).expect("store"));
        let service = DataService::local_only(store, Arc::new(MemoryTokenStore::new()));
        (dir, service)
    }

    /// Service pointed at `base_url`
    pub fn remote_service(base_url: &str) -> (TempDir, DataService) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(LocalStore::new(dir.path().to_path_buf()).expect("store"));
        let monitor = Arc::new(ConnectivityMonitor::new(true, Duration::from_secs(30)));
        let tokens = Arc::new(MemoryTokenStore::new());
        let remote = RemoteClient::new(
            base_url,
            Duration::from_secs(5),
            tokens.clone(),
            Arc::clone(&monitor),
        )
        .expect("client");
        let service = DataService::new(store, Some(remote), monitor, tokens);
        (dir, service)
    }

    /// Serve `app` on an ephemeral local port.
    pub async fn spawn_server(app: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr: SocketAddr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });
        format!("http://{}", addr)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{
        extract::State,
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use chrono::NaiveDate;
    use serde_json::{json, Value};
    use tokio::sync::broadcast::error::TryRecvError;

    use super::testing::{local_service, remote_service, spawn_server, UNREACHABLE};
    use super::*;
    use crate::models::{Meal, NewMeal, NewUser};

    fn new_meal(month_id: &str) -> NewMeal {
        NewMeal {
            month_id: month_id.to_string(),
            user_id: "u1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            breakfast: 1.0,
            lunch: 1.0,
            dinner: 1.0,
        }
    }

    fn meal_json(id: &str) -> Value {
        json!({
            "_id": id,
            "monthId": "mo1",
            "userId": "u1",
            "date": "2024-03-02",
            "breakfast": 1,
            "lunch": 0.5,
            "dinner": 1,
            "createdAt": "2024-03-02T08:00:00Z"
        })
    }

    async fn health() -> Json<Value> {
        Json(json!({ "status": "ok", "mongodb": "connected" }))
    }

    async fn list_meals(State(hits): State<Arc<AtomicUsize>>) -> Json<Value> {
        hits.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        Json(json!({ "success": true, "meals": [meal_json("r1")] }))
    }

    async fn create_meal(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        let mut meal = meal_json("r2");
        meal["monthId"] = body["monthId"].clone();
        (
            StatusCode::CREATED,
            Json(json!({ "success": true, "mongodb": "connected", "meal": meal })),
        )
    }

    fn meals_app(hits: Arc<AtomicUsize>) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/meals", get(list_meals).post(create_meal))
            .with_state(hits)
    }

    #[test]
    fn test_served_accessors() {
        let served: Served<u32> = Served::Local(3);
        assert!(served.is_local());
        assert_eq!(served.clone().map(|v| v * 2), Served::Local(6));
        assert_eq!(served.ok(), Some(3));

        let failed: Served<u32> = Served::Failed(ApiError::NotFound("x".to_string()).into());
        assert!(failed.is_failed());
        assert!(failed.value().is_none());
        assert_eq!(
            failed.into_result(),
            Err(ServiceError::Rejected(ApiError::NotFound("x".to_string())))
        );
    }

    #[tokio::test]
    async fn test_local_only_service_serves_locally() {
        let (_dir, service) = local_service();
        let created = service.create_meal(new_meal("mo1")).await;
        assert!(created.is_local());

        let meals = service.get_meals("mo1").await;
        assert!(meals.is_local());
        assert_eq!(meals.value().map(Vec::len), Some(1));
        assert!(!service.monitor().should_use_remote());
    }

    #[tokio::test]
    async fn test_remote_reads_are_cached_and_deduplicated() {
        let hits = Arc::new(AtomicUsize::new(0));
        let url = spawn_server(meals_app(hits.clone())).await;
        let (_dir, service) = remote_service(&url);

        let (a, b, c) = tokio::join!(
            service.get_meals("mo1"),
            service.get_meals("mo1"),
            service.get_meals("mo1")
        );
        assert!(a.is_remote());
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(service.cache().in_flight_count(), 0);

        let again = service.get_meals("mo1").await;
        assert!(again.is_remote());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_write_invalidates_cached_list() {
        let hits = Arc::new(AtomicUsize::new(0));
        let url = spawn_server(meals_app(hits.clone())).await;
        let (_dir, service) = remote_service(&url);

        assert!(service.get_meals("mo1").await.is_remote());
        let created = service.create_meal(new_meal("mo1")).await;
        assert!(created.is_remote());
        assert_eq!(created.value().map(|m: &Meal| m.id.as_str()), Some("r2"));

        assert!(service.get_meals("mo1").await.is_remote());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        // Remote writes are not mirrored locally
        assert!(service.store().list::<Meal>().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_falls_back_to_local() {
        let (_dir, service) = remote_service(UNREACHABLE);
        service
            .store()
            .create::<Meal>(new_meal("mo1"))
            .await
            .unwrap();
        // Pretend a previous check succeeded
        service.monitor().record_health(true, true);
        let mut events = service.subscribe();

        let meals = service.get_meals("mo1").await;
        assert!(meals.is_local());
        assert_eq!(meals.value().map(Vec::len), Some(1));
        assert!(!service.monitor().should_use_remote());

        match events.try_recv() {
            Ok(DataSourceEvent::FellBackToLocal { operation, .. }) => {
                assert_eq!(operation, "get_meals")
            }
            other => panic!("expected fallback event, got {:?}", other),
        }

        // Within the check window the local store is used without retrying
        assert!(service.get_meals("mo1").await.is_local());
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_shared_failed_fetch_reports_one_fallback() {
        async fn down() -> (StatusCode, Json<Value>) {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "success": false, "mongodb": "disconnected" })),
            )
        }
        let app = Router::new()
            .route("/health", get(health))
            .route("/meals", get(down));
        let url = spawn_server(app).await;
        let (_dir, service) = remote_service(&url);
        service.check_health().await;
        let mut events = service.subscribe();

        let (a, b, c) = tokio::join!(
            service.get_meals("mo1"),
            service.get_meals("mo1"),
            service.get_meals("mo1")
        );
        assert!(a.is_local() && b.is_local() && c.is_local());

        assert!(matches!(
            events.try_recv(),
            Ok(DataSourceEvent::FellBackToLocal { operation: "get_meals", .. })
        ));
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_disconnected_store_falls_back_to_local() {
        async fn down() -> (StatusCode, Json<Value>) {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "success": false, "message": "Database unavailable", "mongodb": "disconnected" })),
            )
        }
        let app = Router::new()
            .route("/health", get(health))
            .route("/meals", get(down).post(down));
        let url = spawn_server(app).await;
        let (_dir, service) = remote_service(&url);

        let created = service.create_meal(new_meal("mo1")).await;
        assert!(created.is_local());
        assert!(!service.monitor().should_use_remote());
        assert_eq!(service.store().list::<Meal>().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_remote_is_never_tried_without_a_valid_check() {
        let (_dir, service) = remote_service(UNREACHABLE);
        let mut events = service.subscribe();

        // The health probe fails first, so the read goes local without a fallback
        assert!(service.get_meals("mo1").await.is_local());
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
        assert!(service.monitor().is_check_valid());
    }

    #[tokio::test]
    async fn test_business_rejection_does_not_fall_back() {
        async fn conflict() -> (StatusCode, Json<Value>) {
            (
                StatusCode::CONFLICT,
                Json(json!({ "success": false, "message": "Email already registered", "mongodb": "connected" })),
            )
        }
        let app = Router::new()
            .route("/health", get(health))
            .route("/auth/register", post(conflict));
        let url = spawn_server(app).await;
        let (_dir, service) = remote_service(&url);
        let mut events = service.subscribe();

        let served = service
            .register(NewUser {
                name: "Karim".to_string(),
                email: "karim@example.com".to_string(),
                password: "secret12".to_string(),
                phone: None,
            })
            .await;

        assert_eq!(
            served,
            Served::Failed(ServiceError::Rejected(ApiError::Conflict(
                "Email already registered".to_string()
            )))
        );
        assert!(service.monitor().should_use_remote());
        assert!(matches!(events.try_recv(), Ok(DataSourceEvent::RemoteRestored)));
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
        assert!(service.store().list::<crate::models::User>().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_check_health_reports_restoration() {
        let hits = Arc::new(AtomicUsize::new(0));
        let url = spawn_server(meals_app(hits)).await;
        let (_dir, service) = remote_service(&url);
        service.monitor().mark_unavailable();
        let mut events = service.subscribe();

        let status = service.check_health().await;
        assert!(status.backend_available && status.data_store_connected);
        assert!(service.monitor().should_use_remote());
        assert_eq!(events.try_recv().ok(), Some(DataSourceEvent::RemoteRestored));
    }
}
