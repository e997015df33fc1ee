use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::error::CredentialError;

/// Fetches JSON schemas by URL.
#[async_trait]
pub trait SchemaLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<Value, CredentialError>;
}

/// Loads schemas over HTTP(S), caching every schema it has parsed.
pub struct HttpSchemaLoader {
    client: reqwest::Client,
    cache: DashMap<String, Value>,
}

impl HttpSchemaLoader {
    pub fn new(timeout: Duration) -> Result<Self, CredentialError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CredentialError::SchemaUnavailable {
                url: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            cache: DashMap::new(),
        })
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

#[async_trait]
impl SchemaLoader for HttpSchemaLoader {
    async fn load(&self, url: &str) -> Result<Value, CredentialError> {
        if let Some(schema) = self.cache.get(url) {
            return Ok(schema.value().clone());
        }

        let unavailable = |reason: String| CredentialError::SchemaUnavailable {
            url: url.to_string(),
            reason,
        };
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(unavailable(format!("server returned {}", response.status())));
        }
        let schema: Value = response
            .json()
            .await
            .map_err(|e| CredentialError::InvalidSchema {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        tracing::debug!(url, "schema loaded");
        self.cache.insert(url.to_string(), schema.clone());
        Ok(schema)
    }
}

/// Schemas registered up front, optionally falling back to another loader.
#[derive(Default)]
pub struct StaticSchemaLoader {
    schemas: DashMap<String, Value>,
    fallback: Option<Arc<dyn SchemaLoader>>,
}

impl StaticSchemaLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn SchemaLoader>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn insert(&self, url: impl Into<String>, schema: Value) {
        self.schemas.insert(url.into(), schema);
    }
}

#[async_trait]
impl SchemaLoader for StaticSchemaLoader {
    async fn load(&self, url: &str) -> Result<Value, CredentialError> {
        if let Some(schema) = self.schemas.get(url) {
            return Ok(schema.value().clone());
        }
        match &self.fallback {
            Some(fallback) => fallback.load(url).await,
            None => Err(CredentialError::SchemaUnavailable {
                url: url.to_string(),
                reason: "schema not registered".into(),
            }),
        }
    }
}

/// Validate a credential subject against a JSON schema.
///
/// Credential schemas describe the whole credential, so validation targets
/// `properties.credentialSubject` when present and the schema root otherwise.
pub fn validate_subject(
    url: &str,
    schema: &Value,
    subject: &serde_json::Map<String, Value>,
) -> Result<(), CredentialError> {
    let target = schema
        .pointer("/properties/credentialSubject")
        .unwrap_or(schema);

    let validator =
        jsonschema::options()
            .build(target)
            .map_err(|e| CredentialError::InvalidSchema {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

    let instance = Value::Object(subject.clone());
    let violations: Vec<String> = validator
        .iter_errors(&instance)
        .map(|err| {
            let path = err.instance_path.to_string();
            if path.is_empty() {
                err.to_string()
            } else {
                format!("{}: {}", path, err)
            }
        })
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(CredentialError::SchemaViolation {
            url: url.to_string(),
            violations,
        })
    }
}
