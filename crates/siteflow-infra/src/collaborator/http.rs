//! HTTP-backed collaborator clients.
//!
//! JSON-over-HTTP clients for the document-intelligence and advisory
//! services. Transport and decode failures map onto `CollaboratorError`,
//! which nodes fold into their output data, so a degraded remote service
//! slows nothing and fails nothing.

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value, json};

use siteflow_core::collaborator::{AdvisoryService, DocumentIntelligence};
use siteflow_types::collaborator::{Classification, LeaseTerms, ParcelScore};
use siteflow_types::error::CollaboratorError;

/// Connection settings shared by both HTTP clients.
#[derive(Clone)]
pub struct HttpCollaboratorConfig {
    /// Service base URL, without a trailing slash.
    pub base_url: String,
    /// Optional API key sent as `x-api-key`.
    pub api_key: Option<SecretString>,
}

impl HttpCollaboratorConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: SecretString) -> Self {
        self.api_key = Some(api_key);
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// POST a JSON body and decode a JSON response.
async fn post_json(
    client: &reqwest::Client,
    config: &HttpCollaboratorConfig,
    path: &str,
    body: &Value,
) -> Result<Value, CollaboratorError> {
    let mut request = client.post(config.endpoint(path)).json(body);
    if let Some(api_key) = &config.api_key {
        request = request.header("x-api-key", api_key.expose_secret());
    }

    let response = request
        .send()
        .await
        .map_err(|e| CollaboratorError::Transport(e.to_string()))?;

    let status = response.status();
    if status == StatusCode::UNPROCESSABLE_ENTITY || status == StatusCode::BAD_REQUEST {
        let detail = response.text().await.unwrap_or_default();
        return Err(CollaboratorError::Rejected(detail));
    }
    if !status.is_success() {
        return Err(CollaboratorError::Transport(format!(
            "unexpected status {status}"
        )));
    }

    response
        .json()
        .await
        .map_err(|e| CollaboratorError::InvalidResponse(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, CollaboratorError> {
    serde_json::from_value(value).map_err(|e| CollaboratorError::InvalidResponse(e.to_string()))
}

// ---------------------------------------------------------------------------
// Document intelligence
// ---------------------------------------------------------------------------

/// HTTP client for the document-intelligence service.
pub struct HttpDocumentIntelligence {
    client: reqwest::Client,
    config: HttpCollaboratorConfig,
}

impl HttpDocumentIntelligence {
    pub fn new(config: HttpCollaboratorConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

impl DocumentIntelligence for HttpDocumentIntelligence {
    async fn classify(&self, text: &str) -> Result<Classification, CollaboratorError> {
        let body = json!({ "text": text });
        let response = post_json(&self.client, &self.config, "/v1/classify", &body).await?;
        decode(response)
    }

    async fn extract(
        &self,
        text: &str,
        category: &str,
    ) -> Result<Map<String, Value>, CollaboratorError> {
        let body = json!({ "text": text, "category": category });
        let response = post_json(&self.client, &self.config, "/v1/extract", &body).await?;
        match response {
            Value::Object(fields) => Ok(fields),
            other => Err(CollaboratorError::InvalidResponse(format!(
                "expected object, got {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Advisory service
// ---------------------------------------------------------------------------

/// HTTP client for the advisory scoring service.
pub struct HttpAdvisoryService {
    client: reqwest::Client,
    config: HttpCollaboratorConfig,
}

impl HttpAdvisoryService {
    pub fn new(config: HttpCollaboratorConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

impl AdvisoryService for HttpAdvisoryService {
    async fn score_parcel(&self, parcel: &Value) -> Result<ParcelScore, CollaboratorError> {
        let body = json!({ "parcel": parcel });
        let response =
            post_json(&self.client, &self.config, "/v1/parcels/score", &body).await?;
        decode(response)
    }

    async fn suggest_terms(&self, context: &Value) -> Result<LeaseTerms, CollaboratorError> {
        let body = json!({ "context": context });
        let response = post_json(&self.client, &self.config, "/v1/leases/terms", &body).await?;
        decode(response)
    }
}
