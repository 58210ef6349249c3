//! HTTP client for the mess backend REST API.
//!
//! This module provides the `RemoteClient` struct. Every call goes through
//! [`RemoteClient::send`], which classifies the outcome as either a
//! connectivity failure (the caller should fall back to the local store) or
//! an application rejection (the caller should show the error).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{ApiError, ApiRequest, ConnectivityFailure, RemoteError};
use crate::auth::TokenStore;
use crate::connectivity::ConnectivityMonitor;
use crate::models::{
    Mess, MessPatch, MemberSummary, MonthSummary, Month, NewMess, NewUser, Resource, Scope, User,
    UserPatch,
};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Value of the `mongodb` field when the backing store is reachable.
const STORE_CONNECTED: &str = "connected";

/// Parsed JSON body: the common envelope fields plus the named payloads.
#[derive(Debug, Default, Deserialize)]
pub struct ResponseBody {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    mongodb: Option<String>,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl ResponseBody {
    /// Whether the body reports the backing store as connected
    pub fn store_connected(&self) -> Option<bool> {
        self.mongodb.as_deref().map(|state| state == STORE_CONNECTED)
    }

    fn error_message(&self) -> Option<String> {
        if let Some(ref message) = self.message {
            return Some(message.clone());
        }
        match &self.error {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Object(obj)) => obj
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        }
    }

    /// Decode the payload carried under `field`, failing if it is absent.
    pub fn take<T: DeserializeOwned>(&mut self, field: &str) -> Result<T, RemoteError> {
        let value = self.fields.remove(field).ok_or_else(|| {
            ApiError::InvalidResponse(format!("Missing `{}` in response", field))
        })?;
        serde_json::from_value(value).map_err(|e| {
            ApiError::InvalidResponse(format!("Unexpected `{}` shape: {}", field, e)).into()
        })
    }

    /// Like [`take`](Self::take) but an absent or null field is `None`.
    pub fn take_optional<T: DeserializeOwned>(
        &mut self,
        field: &str,
    ) -> Result<Option<T>, RemoteError> {
        match self.fields.remove(field) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value).map(Some).map_err(|e| {
                ApiError::InvalidResponse(format!("Unexpected `{}` shape: {}", field, e)).into()
            }),
        }
    }
}

/// Result of `GET /health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthStatus {
    pub backend_available: bool,
    pub data_store_connected: bool,
}

/// Result of a successful login or registration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthPayload {
    pub user: User,
    pub token: String,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TransferManager<'a> {
    user_id: &'a str,
}

/// Body that detaches a user from their mess; `messId` is sent as `null`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DetachMember {
    mess_id: Option<String>,
    is_approved: bool,
}

/// Client for the mess backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct RemoteClient {
    client: Client,
    base_url: String,
    tokens: Arc<dyn TokenStore>,
    monitor: Arc<ConnectivityMonitor>,
}

impl RemoteClient {
    /// Create a client. `timeout` bounds every call including the body read.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        tokens: Arc<dyn TokenStore>,
        monitor: Arc<ConnectivityMonitor>,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
            monitor,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue a request and classify the outcome.
    ///
    /// Rate-limited calls are retried with exponential backoff before the
    /// rejection is reported.
    pub async fn send(&self, request: &ApiRequest) -> Result<ResponseBody, RemoteError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let mut builder = self.client.request(request.method.into(), &url);
            if !request.query.is_empty() {
                builder = builder.query(&request.query);
            }
            match self.tokens.get() {
                Some(token) => builder = builder.bearer_auth(token),
                None if request.auth_required => {
                    debug!(path = %request.path, "No token for authenticated request")
                }
                None => {}
            }
            if let Some(ref body) = request.body {
                builder = builder.json(body);
            }

            let response = builder.send().await.map_err(|e| {
                warn!(path = %request.path, error = %e, "Request failed in transport");
                ConnectivityFailure::from(e)
            })?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ApiError::RateLimited.into());
                }
                warn!(path = %request.path, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms *= 2; // Exponential backoff
                continue;
            }

            let text = response
                .text()
                .await
                .map_err(ConnectivityFailure::from)?;

            let body = Self::classify(status, &text)?;
            if body.store_connected() == Some(true) {
                self.monitor.record_health(true, true);
            }
            return Ok(body);
        }
    }

    /// Classify a received response.
    ///
    /// - body that is not JSON: connectivity failure
    /// - `mongodb` present and not connected: connectivity failure
    /// - non-success status or `success: false`: application rejection
    pub fn classify(status: StatusCode, text: &str) -> Result<ResponseBody, RemoteError> {
        let body: ResponseBody = if text.trim().is_empty() && status.is_success() {
            ResponseBody::default()
        } else {
            serde_json::from_str(text).map_err(|e| {
                ConnectivityFailure::Unparseable(format!(
                    "Status {}: {} ({})",
                    status,
                    ApiError::truncate_body(text),
                    e
                ))
            })?
        };

        if let Some(state) = body.mongodb.as_deref() {
            if state != STORE_CONNECTED {
                return Err(ConnectivityFailure::StoreDisconnected(state.to_string()).into());
            }
        }

        if !status.is_success() {
            let message = body
                .error_message()
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string());
            return Err(ApiError::from_status(status, &message).into());
        }
        if body.success == Some(false) {
            let message = body
                .error_message()
                .unwrap_or_else(|| "Request was not successful".to_string());
            return Err(ApiError::Validation(message).into());
        }

        Ok(body)
    }

    // ===== Health & Auth =====

    /// Probe `GET /health`. Never fails; unreachable means both flags false.
    pub async fn health(&self) -> HealthStatus {
        match self.send(&ApiRequest::get("/health").public()).await {
            Ok(body) => HealthStatus {
                backend_available: true,
                data_store_connected: body.store_connected().unwrap_or(false),
            },
            Err(RemoteError::Connectivity(ConnectivityFailure::StoreDisconnected(_)))
            | Err(RemoteError::Rejected(_)) => HealthStatus {
                backend_available: true,
                data_store_connected: false,
            },
            Err(RemoteError::Connectivity(_)) => HealthStatus {
                backend_available: false,
                data_store_connected: false,
            },
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthPayload, RemoteError> {
        let request =
            ApiRequest::post("/auth/login", &Credentials { email, password })?.public();
        let mut body = self.send(&request).await?;
        Ok(AuthPayload {
            user: body.take("user")?,
            token: body.take("token")?,
        })
    }

    pub async fn register(&self, new_user: &NewUser) -> Result<AuthPayload, RemoteError> {
        let request = ApiRequest::post("/auth/register", new_user)?.public();
        let mut body = self.send(&request).await?;
        Ok(AuthPayload {
            user: body.take("user")?,
            token: body.take("token")?,
        })
    }

    // ===== Generic resources =====

    pub async fn list<R: Resource>(&self, scope: &Scope) -> Result<Vec<R>, RemoteError> {
        let (key, value) = scope.query_pair();
        let request = ApiRequest::get(R::PATH).query(key, value);
        self.send(&request).await?.take(R::MANY)
    }

    pub async fn create<R: Resource>(&self, draft: &R::Draft) -> Result<R, RemoteError> {
        let request = ApiRequest::post(R::PATH, draft)?;
        self.send(&request).await?.take(R::ONE)
    }

    pub async fn update<R: Resource>(&self, id: &str, patch: &R::Patch) -> Result<R, RemoteError> {
        let request = ApiRequest::put(format!("{}/{}", R::PATH, id), patch)?;
        self.send(&request).await?.take(R::ONE)
    }

    pub async fn delete<R: Resource>(&self, id: &str) -> Result<(), RemoteError> {
        self.send(&ApiRequest::delete(format!("{}/{}", R::PATH, id)))
            .await
            .map(|_| ())
    }

    /// `PUT <path>/:id/<action>` returning the updated record
    pub async fn action<R: Resource>(&self, id: &str, action: &str) -> Result<R, RemoteError> {
        let request = ApiRequest::put(format!("{}/{}/{}", R::PATH, id, action), &Map::new())?;
        self.send(&request).await?.take(R::ONE)
    }

    // ===== Users =====

    pub async fn get_user(&self, id: &str) -> Result<User, RemoteError> {
        self.send(&ApiRequest::get(format!("/users/{}", id)))
            .await?
            .take("user")
    }

    pub async fn list_members(&self, mess_id: &str) -> Result<Vec<User>, RemoteError> {
        let request = ApiRequest::get("/users").query("messId", mess_id);
        self.send(&request).await?.take("users")
    }

    pub async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<User, RemoteError> {
        let request = ApiRequest::put(format!("/users/{}", id), patch)?;
        self.send(&request).await?.take("user")
    }

    /// Clear the user's mess and approval. The account itself stays.
    pub async fn detach_member(&self, id: &str) -> Result<User, RemoteError> {
        let request = ApiRequest::put(
            format!("/users/{}", id),
            &DetachMember {
                mess_id: None,
                is_approved: false,
            },
        )?;
        self.send(&request).await?.take("user")
    }

    // ===== Messes =====

    pub async fn create_mess(&self, new_mess: &NewMess) -> Result<Mess, RemoteError> {
        let request = ApiRequest::post("/mess", new_mess)?;
        self.send(&request).await?.take("mess")
    }

    pub async fn get_mess(&self, id: &str) -> Result<Mess, RemoteError> {
        self.send(&ApiRequest::get(format!("/mess/{}", id)))
            .await?
            .take("mess")
    }

    pub async fn find_mess_by_code(&self, code: &str) -> Result<Option<Mess>, RemoteError> {
        match self.send(&ApiRequest::get(format!("/mess/code/{}", code))).await {
            Ok(mut body) => body.take_optional("mess"),
            Err(RemoteError::Rejected(ApiError::NotFound(_))) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn update_mess(&self, id: &str, patch: &MessPatch) -> Result<Mess, RemoteError> {
        let request = ApiRequest::put(format!("/mess/{}", id), patch)?;
        self.send(&request).await?.take("mess")
    }

    pub async fn delete_mess(&self, id: &str) -> Result<(), RemoteError> {
        self.send(&ApiRequest::delete(format!("/mess/{}", id)))
            .await
            .map(|_| ())
    }

    pub async fn transfer_manager(&self, mess_id: &str, user_id: &str) -> Result<Mess, RemoteError> {
        let request = ApiRequest::post(
            format!("/mess/{}/transfer-manager", mess_id),
            &TransferManager { user_id },
        )?;
        self.send(&request).await?.take("mess")
    }

    // ===== Months =====

    pub async fn active_month(&self, mess_id: &str) -> Result<Option<Month>, RemoteError> {
        let request = ApiRequest::get("/months/active").query("messId", mess_id);
        self.send(&request).await?.take_optional("month")
    }

    // ===== Summaries =====

    pub async fn month_summary(&self, month_id: &str) -> Result<MonthSummary, RemoteError> {
        self.send(&ApiRequest::get(format!("/summary/month/{}", month_id)))
            .await?
            .take("summary")
    }

    pub async fn member_summary(
        &self,
        user_id: &str,
        month_id: &str,
    ) -> Result<MemberSummary, RemoteError> {
        let request =
            ApiRequest::get(format!("/summary/member/{}", user_id)).query("monthId", month_id);
        self.send(&request).await?.take("summary")
    }

    pub async fn all_members_summary(
        &self,
        month_id: &str,
    ) -> Result<Vec<MemberSummary>, RemoteError> {
        let request = ApiRequest::get("/summary/members").query("monthId", month_id);
        self.send(&request).await?.take("summaries")
    }
}
