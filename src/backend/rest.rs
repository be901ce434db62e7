use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, error};

use super::memory::DEFAULT_APP_NAME;
use super::{AuthBackend, BackendFactory, Document, DocumentStore, ServiceHandle};
use crate::config::{BackendConfig, PersistenceOptions, StoreSettings};
use crate::error::{BackendError, BackendErrorCode};

pub const DEFAULT_REST_BASE_URL: &str = "https://firestore.googleapis.com/v1";

/// Document store speaking the backend's public REST API.
///
/// There is no local cache on this transport, so offline persistence is
/// reported as unimplemented.
pub struct RestDocumentStore {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    api_key: String,
    id_token: RwLock<Option<String>>,
    settings: RwLock<Option<StoreSettings>>,
}

#[derive(Debug, Deserialize)]
struct RestDocument {
    #[serde(default)]
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RestErrorBody {
    error: RestErrorDetail,
}

#[derive(Debug, Deserialize)]
struct RestErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl RestDocumentStore {
    pub fn new(config: &BackendConfig) -> Self {
        Self::with_base_url(config, DEFAULT_REST_BASE_URL)
    }

    /// Point the store at another endpoint (an emulator, or a test server)
    pub fn with_base_url(config: &BackendConfig, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project_id: config.project_id.clone(),
            api_key: config.api_key.clone(),
            id_token: RwLock::new(None),
            settings: RwLock::new(None),
        }
    }

    /// Bearer token sent with reads, for rules that require a signed-in user
    pub fn set_id_token(&self, token: Option<String>) {
        *self.id_token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub fn settings(&self) -> Option<StoreSettings> {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn document_url(&self, path: &str) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents/{}",
            self.base_url,
            self.project_id,
            path.trim_start_matches('/')
        )
    }

    fn error_from_response(status: reqwest::StatusCode, body: &str) -> BackendError {
        if let Ok(parsed) = serde_json::from_str::<RestErrorBody>(body) {
            let code = BackendErrorCode::from_status_name(&parsed.error.status);
            if code != BackendErrorCode::Unknown {
                return BackendError::new(code, parsed.error.message);
            }
        }

        let code = match status.as_u16() {
            400 => BackendErrorCode::InvalidArgument,
            401 => BackendErrorCode::Unauthenticated,
            403 => BackendErrorCode::PermissionDenied,
            404 => BackendErrorCode::NotFound,
            412 => BackendErrorCode::FailedPrecondition,
            501 => BackendErrorCode::Unimplemented,
            502..=504 => BackendErrorCode::Unavailable,
            500 => BackendErrorCode::Internal,
            _ => BackendErrorCode::Unknown,
        };
        BackendError::new(code, format!("HTTP {}", status))
    }
}

#[async_trait]
impl DocumentStore for RestDocumentStore {
    fn configure(&self, settings: &StoreSettings) -> Result<(), BackendError> {
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = Some(settings.clone());
        Ok(())
    }

    async fn enable_persistence(&self, _options: &PersistenceOptions) -> Result<(), BackendError> {
        Err(BackendError::unimplemented(
            "offline persistence is not available over the REST transport",
        ))
    }

    async fn get_document(&self, path: &str) -> Result<Option<Document>, BackendError> {
        let url = self.document_url(path);
        debug!(path = %path, "Reading document over REST");

        let mut request = self.client.get(&url).query(&[("key", self.api_key.as_str())]);
        let token = self
            .id_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, path = %path, "Document request failed");
            BackendError::unavailable(e.to_string())
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .map_err(|e| BackendError::unavailable(e.to_string()))?;

        if !status.is_success() {
            return Err(Self::error_from_response(status, &body));
        }

        let document: RestDocument = serde_json::from_str(&body).map_err(|e| {
            BackendError::new(
                BackendErrorCode::Internal,
                format!("Failed to parse document: {}", e),
            )
        })?;

        debug!(name = %document.name, "Document read");
        Ok(Some(Document {
            path: path.to_string(),
            fields: document.fields,
        }))
    }
}

/// Builds handles that read documents over REST and take auth state from
/// a separately provided [`AuthBackend`]
pub struct RestBackendFactory {
    auth: Arc<dyn AuthBackend>,
    base_url: String,
}

impl RestBackendFactory {
    pub fn new(auth: Arc<dyn AuthBackend>) -> Self {
        Self::with_base_url(auth, DEFAULT_REST_BASE_URL)
    }

    pub fn with_base_url(auth: Arc<dyn AuthBackend>, base_url: impl Into<String>) -> Self {
        Self {
            auth,
            base_url: base_url.into(),
        }
    }
}

impl BackendFactory for RestBackendFactory {
    fn create(&self, config: &BackendConfig) -> Result<ServiceHandle, BackendError> {
        let app_name = if config.app_id.is_empty() {
            DEFAULT_APP_NAME.to_string()
        } else {
            config.app_id.clone()
        };

        debug!(app = %app_name, base_url = %self.base_url, "Creating REST backend handle");
        Ok(ServiceHandle::new(
            app_name,
            Arc::clone(&self.auth),
            Arc::new(RestDocumentStore::with_base_url(config, self.base_url.clone())),
        ))
    }
}
