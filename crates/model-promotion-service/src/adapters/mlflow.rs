//! MLflow Registry Adapter
//!
//! [`RegistryClient`] implementation over the MLflow REST API 2.0. Alias
//! and version lookups, alias assignment and removal, and description
//! updates map onto the `registered-models/alias` and `model-versions/*`
//! endpoints. MLflow error payloads are classified into the closed
//! [`RegistryError`] set so that absence stays distinguishable from real
//! failures.

use async_trait::async_trait;
use model_promotion_core::{ModelVersionRef, RegistryClient, RegistryError, RegistryResult};
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Tracking server used when none is configured
pub const DEFAULT_TRACKING_URI: &str =
    "http://127.0.0.1:8001/api/v1/namespaces/ml/services/mlflow:http/proxy";

/// Default timeout for a single registry request
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for an MLflow tracking server
#[derive(Debug, Clone)]
pub struct MlflowSettings {
    /// Base URI of the tracking server
    pub tracking_uri: Url,
    /// Bearer token, if the server requires one
    pub token: Option<SecretString>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl MlflowSettings {
    pub fn new(tracking_uri: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            tracking_uri: Url::parse(tracking_uri)?,
            token: None,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// `{"model_version": {...}}` response wrapper
#[derive(Debug, Deserialize)]
struct ModelVersionEnvelope {
    model_version: MlflowModelVersion,
}

#[derive(Debug, Deserialize)]
struct MlflowModelVersion {
    name: String,
    version: String,
    #[serde(default)]
    aliases: Vec<String>,
}

impl From<MlflowModelVersion> for ModelVersionRef {
    fn from(v: MlflowModelVersion) -> Self {
        ModelVersionRef::new(v.name, v.version).with_aliases(v.aliases)
    }
}

/// MLflow error payload
#[derive(Debug, Default, Deserialize)]
struct MlflowErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct SetAliasBody<'a> {
    name: &'a str,
    alias: &'a str,
    version: &'a str,
}

#[derive(Debug, Serialize)]
struct DeleteAliasBody<'a> {
    name: &'a str,
    alias: &'a str,
}

#[derive(Debug, Serialize)]
struct UpdateVersionBody<'a> {
    name: &'a str,
    version: &'a str,
    description: &'a str,
}

/// Map a non-success MLflow response onto a [`RegistryError`].
fn classify(status: StatusCode, body: &str, operation: &str) -> RegistryError {
    let payload: MlflowErrorBody = serde_json::from_str(body).unwrap_or_default();
    let code = payload.error_code.as_deref().unwrap_or("");
    let message = payload.message.as_deref().unwrap_or(body);
    let detail = format!("{} returned {} {}: {}", operation, status.as_u16(), code, message);

    if status == StatusCode::NOT_FOUND || code == "RESOURCE_DOES_NOT_EXIST" {
        return RegistryError::NotFound(detail);
    }
    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || code == "UNAUTHENTICATED"
        || code == "PERMISSION_DENIED"
    {
        return RegistryError::PermissionDenied(detail);
    }
    RegistryError::Transport(detail)
}

/// [`classify`] for alias lookups. Older servers report a missing alias as
/// an invalid parameter.
fn classify_alias_lookup(status: StatusCode, body: &str, operation: &str) -> RegistryError {
    let payload: MlflowErrorBody = serde_json::from_str(body).unwrap_or_default();
    let missing_alias = payload.error_code.as_deref() == Some("INVALID_PARAMETER_VALUE")
        && payload
            .message
            .as_deref()
            .map_or(false, |m| m.to_lowercase().contains("not found"));

    match classify(status, body, operation) {
        RegistryError::Transport(detail) if missing_alias => RegistryError::NotFound(detail),
        other => other,
    }
}

type Classifier = fn(StatusCode, &str, &str) -> RegistryError;

/// Registry client for an MLflow tracking server
#[derive(Debug, Clone)]
pub struct MlflowRegistryClient {
    client: Client,
    base: String,
    token: Option<SecretString>,
}

impl MlflowRegistryClient {
    pub fn new(settings: MlflowSettings) -> RegistryResult<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| RegistryError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base: settings.tracking_uri.as_str().trim_end_matches('/').to_string(),
            token: settings.token,
        })
    }

    /// Base URI requests are sent to
    pub fn tracking_uri(&self) -> &str {
        &self.base
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/2.0/mlflow/{}", self.base, path)
    }

    /// Send a request and return the body of a successful response.
    async fn send(&self, request: RequestBuilder, operation: &str) -> RegistryResult<String> {
        self.send_with(request, operation, classify).await
    }

    async fn send_with(
        &self,
        request: RequestBuilder,
        operation: &str,
        classifier: Classifier,
    ) -> RegistryResult<String> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| RegistryError::Transport(format!("{} failed: {}", operation, e)))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            RegistryError::Transport(format!("{}: failed to read response: {}", operation, e))
        })?;

        debug!(operation, status = status.as_u16(), body = %body, "Registry response");

        if status.is_success() {
            Ok(body)
        } else {
            Err(classifier(status, &body, operation))
        }
    }

    fn decode_version(body: &str, operation: &str) -> RegistryResult<ModelVersionRef> {
        serde_json::from_str::<ModelVersionEnvelope>(body)
            .map(|envelope| envelope.model_version.into())
            .map_err(|e| {
                RegistryError::Transport(format!("{}: malformed response: {}", operation, e))
            })
    }
}

#[async_trait]
impl RegistryClient for MlflowRegistryClient {
    #[instrument(skip(self))]
    async fn get_version_by_alias(
        &self,
        model_name: &str,
        alias: &str,
    ) -> RegistryResult<Option<ModelVersionRef>> {
        let request = self
            .client
            .get(self.endpoint("registered-models/alias"))
            .query(&[("name", model_name), ("alias", alias)]);

        match self
            .send_with(request, "get_model_version_by_alias", classify_alias_lookup)
            .await
        {
            Ok(body) => Self::decode_version(&body, "get_model_version_by_alias").map(Some),
            Err(RegistryError::NotFound(detail)) => {
                debug!(model = %model_name, alias = %alias, %detail, "Alias not set");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    async fn get_version(
        &self,
        model_name: &str,
        version: &str,
    ) -> RegistryResult<ModelVersionRef> {
        let request = self
            .client
            .get(self.endpoint("model-versions/get"))
            .query(&[("name", model_name), ("version", version)]);

        let body = self.send(request, "get_model_version").await?;
        Self::decode_version(&body, "get_model_version")
    }

    #[instrument(skip(self))]
    async fn set_alias(&self, model_name: &str, alias: &str, version: &str) -> RegistryResult<()> {
        let request = self
            .client
            .post(self.endpoint("registered-models/alias"))
            .json(&SetAliasBody {
                name: model_name,
                alias,
                version,
            });

        self.send(request, "set_registered_model_alias").await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_alias(&self, model_name: &str, alias: &str) -> RegistryResult<()> {
        let request = self
            .client
            .delete(self.endpoint("registered-models/alias"))
            .json(&DeleteAliasBody {
                name: model_name,
                alias,
            });

        self.send(request, "delete_registered_model_alias").await?;
        Ok(())
    }

    #[instrument(skip(self, description))]
    async fn update_description(
        &self,
        model_name: &str,
        version: &str,
        description: &str,
    ) -> RegistryResult<()> {
        let request = self
            .client
            .patch(self.endpoint("model-versions/update"))
            .json(&UpdateVersionBody {
                name: model_name,
                version,
                description,
            });

        self.send(request, "update_model_version").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ALIAS_PATH: &str = "/api/2.0/mlflow/registered-models/alias";

    fn client_for(server: &MockServer) -> MlflowRegistryClient {
        MlflowRegistryClient::new(MlflowSettings::new(&server.uri()).unwrap()).unwrap()
    }

    fn version_body(version: &str, aliases: &[&str]) -> serde_json::Value {
        json!({
            "model_version": {
                "name": "ad_enrichment",
                "version": version,
                "aliases": aliases,
                "current_stage": "None",
                "status": "READY"
            }
        })
    }

    #[test]
    fn test_classify_errors() {
        let not_found = classify(
            StatusCode::NOT_FOUND,
            r#"{"error_code": "RESOURCE_DOES_NOT_EXIST", "message": "missing"}"#,
            "op",
        );
        assert!(not_found.is_not_found());

        let legacy_body =
            r#"{"error_code": "INVALID_PARAMETER_VALUE", "message": "Registered model alias baseline not found."}"#;
        let legacy = classify_alias_lookup(StatusCode::BAD_REQUEST, legacy_body, "op");
        assert!(legacy.is_not_found());
        // only alias lookups read that as absence
        let other = classify(StatusCode::BAD_REQUEST, legacy_body, "op");
        assert!(matches!(other, RegistryError::Transport(_)));

        let denied = classify(StatusCode::FORBIDDEN, "forbidden", "op");
        assert!(matches!(denied, RegistryError::PermissionDenied(_)));

        let invalid = classify(
            StatusCode::BAD_REQUEST,
            r#"{"error_code": "INVALID_PARAMETER_VALUE", "message": "bad version"}"#,
            "op",
        );
        assert!(matches!(invalid, RegistryError::Transport(_)));

        let server = classify(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>", "op");
        match server {
            RegistryError::Transport(detail) => assert!(detail.contains("502")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_version_by_alias_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ALIAS_PATH))
            .and(query_param("name", "ad_enrichment"))
            .and(query_param("alias", "baseline"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(version_body("2", &["baseline"])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let found = client_for(&server)
            .get_version_by_alias("ad_enrichment", "baseline")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.version, "2");
        assert_eq!(found.aliases, vec!["baseline"]);
    }

    #[tokio::test]
    async fn test_get_version_by_alias_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ALIAS_PATH))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error_code": "RESOURCE_DOES_NOT_EXIST",
                "message": "Registered model alias baseline not found."
            })))
            .mount(&server)
            .await;

        let found = client_for(&server)
            .get_version_by_alias("ad_enrichment", "baseline")
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_get_version_by_alias_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ALIAS_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .get_version_by_alias("ad_enrichment", "baseline")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Transport(_)));
    }

    #[tokio::test]
    async fn test_legacy_missing_alias_is_absent_only_on_lookup() {
        let server = MockServer::start().await;
        let legacy = json!({
            "error_code": "INVALID_PARAMETER_VALUE",
            "message": "Registered model alias challenger_ar not found."
        });
        Mock::given(method("GET"))
            .and(path(ALIAS_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_json(legacy.clone()))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(ALIAS_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_json(legacy))
            .mount(&server)
            .await;
        let client = client_for(&server);

        let found = client
            .get_version_by_alias("ad_enrichment", "challenger_ar")
            .await
            .unwrap();
        assert!(found.is_none());

        let err = client
            .delete_alias("ad_enrichment", "challenger_ar")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Transport(_)));
    }

    #[tokio::test]
    async fn test_get_version_without_aliases_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/2.0/mlflow/model-versions/get"))
            .and(query_param("version", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model_version": {"name": "ad_enrichment", "version": "3"}
            })))
            .mount(&server)
            .await;

        let version = client_for(&server)
            .get_version("ad_enrichment", "3")
            .await
            .unwrap();
        assert!(version.aliases.is_empty());
    }

    #[tokio::test]
    async fn test_set_alias_sends_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ALIAS_PATH))
            .and(body_json(json!({
                "name": "ad_enrichment",
                "alias": "baseline",
                "version": "3"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .set_alias("ad_enrichment", "baseline", "3")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_alias_permission_denied() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(ALIAS_PATH))
            .and(body_json(json!({"name": "ad_enrichment", "alias": "challenger_ar"})))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error_code": "PERMISSION_DENIED",
                "message": "User cannot edit this model"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .delete_alias("ad_enrichment", "challenger_ar")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_update_description() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/api/2.0/mlflow/model-versions/update"))
            .and(body_json(json!({
                "name": "ad_enrichment",
                "version": "3",
                "description": "xgboost"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(version_body("3", &[])))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .update_description("ad_enrichment", "3", "xgboost")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_tracking_uri_prefix_and_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/proxy/api/2.0/mlflow/model-versions/get"))
            .and(header("authorization", "Bearer s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(version_body("1", &[])))
            .expect(1)
            .mount(&server)
            .await;

        let settings = MlflowSettings::new(&format!("{}/proxy/", server.uri()))
            .unwrap()
            .with_token(SecretString::new("s3cret".to_string()));
        let client = MlflowRegistryClient::new(settings).unwrap();

        assert!(client.tracking_uri().ends_with("/proxy"));
        client.get_version("ad_enrichment", "1").await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_body_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/2.0/mlflow/model-versions/get"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .get_version("ad_enrichment", "1")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Transport(_)));
    }
}
