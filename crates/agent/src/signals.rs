//! Read-only context tools: stored documents and configured external APIs
//! (weather, pollen, air quality and the like) the instructions may refer to.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use adpilot_core::config::ExternalApiConfig;
use adpilot_db::repositories::DocumentStore;

use crate::tools::{Tool, ToolRegistry};
use crate::toolset::Args;

pub const GET_DOCUMENT: &str = "get_document";
pub const FETCH_EXTERNAL_SIGNAL: &str = "fetch_external_signal";

/// Looks up one stored document by collection and id.
#[derive(Clone)]
pub struct DocumentTool {
    documents: Arc<dyn DocumentStore>,
}

impl DocumentTool {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl Tool for DocumentTool {
    fn name(&self) -> &'static str {
        GET_DOCUMENT
    }

    fn description(&self) -> &'static str {
        "Read a stored document, such as a customer's instructions or campaign configuration."
    }

    fn parameters(&self) -> Value {
        json!({ "collection": "string", "document_id": "string" })
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let args = Args::parse(GET_DOCUMENT, &input)?;
        let collection = args.text("collection")?;
        let document_id = args.text("document_id")?;

        let found = self
            .documents
            .get_document(&collection, &document_id)
            .await
            .map_err(|error| anyhow!("{GET_DOCUMENT}: {error}"))?;

        Ok(match found {
            Some(document) => json!({ "id": document.id, "data": document.data, "exists": true }),
            None => json!({ "id": document_id, "exists": false, "message": "Document not found" }),
        })
    }
}

#[derive(Clone, Debug)]
struct ExternalApi {
    base_url: String,
    description: Option<String>,
    api_key: Option<SecretString>,
    api_key_param: String,
    timeout: Duration,
}

/// HTTP GET against one of the configured external APIs.
#[derive(Clone)]
pub struct ExternalApiTool {
    client: Client,
    apis: Arc<BTreeMap<String, ExternalApi>>,
}

impl ExternalApiTool {
    pub fn from_config(apis: &BTreeMap<String, ExternalApiConfig>) -> Result<Self> {
        let client = Client::builder().build()?;
        let apis = apis
            .iter()
            .map(|(name, api)| {
                let entry = ExternalApi {
                    base_url: api.base_url.trim().trim_end_matches('/').to_string(),
                    description: api.description.clone(),
                    api_key: api.api_key.clone(),
                    api_key_param: api.api_key_param.clone(),
                    timeout: Duration::from_secs(api.timeout_secs),
                };
                (name.clone(), entry)
            })
            .collect();
        Ok(Self { client, apis: Arc::new(apis) })
    }

    pub fn api_names(&self) -> Vec<&str> {
        self.apis.keys().map(String::as_str).collect()
    }

    fn url(api: &ExternalApi, path: Option<&str>) -> Result<String> {
        let Some(path) = path.map(|path| path.trim().trim_start_matches('/')) else {
            return Ok(api.base_url.clone());
        };
        if path.contains("..") || path.contains("://") {
            bail!("{FETCH_EXTERNAL_SIGNAL}: `path` must be relative to the api base url");
        }
        Ok(format!("{}/{path}", api.base_url))
    }

    fn query(args: &Args<'_>) -> Result<Vec<(String, String)>> {
        let params = match args.present("params") {
            None => return Ok(Vec::new()),
            Some(Value::Object(params)) => params,
            Some(other) => {
                bail!("{FETCH_EXTERNAL_SIGNAL}: `params` must be an object, got {other}")
            }
        };
        params
            .iter()
            .map(|(key, value)| match value {
                Value::String(text) => Ok((key.clone(), text.clone())),
                Value::Number(_) | Value::Bool(_) => Ok((key.clone(), value.to_string())),
                other => {
                    bail!("{FETCH_EXTERNAL_SIGNAL}: param `{key}` must be scalar, got {other}")
                }
            })
            .collect()
    }
}

#[async_trait]
impl Tool for ExternalApiTool {
    fn name(&self) -> &'static str {
        FETCH_EXTERNAL_SIGNAL
    }

    fn description(&self) -> &'static str {
        "Fetch external data (weather, pollen, air quality and similar) from a configured API."
    }

    fn parameters(&self) -> Value {
        let apis: BTreeMap<&str, &str> = self
            .apis
            .iter()
            .map(|(name, api)| (name.as_str(), api.description.as_deref().unwrap_or("")))
            .collect();
        json!({
            "api": apis,
            "path": "optional string appended to the api base url",
            "params": "optional object of query parameters"
        })
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let args = Args::parse(FETCH_EXTERNAL_SIGNAL, &input)?;
        let name = args.text("api")?;
        let api = self.apis.get(&name).ok_or_else(|| {
            anyhow!(
                "{FETCH_EXTERNAL_SIGNAL}: unknown api `{name}` (configured: {})",
                self.api_names().join(", ")
            )
        })?;
        let path = match args.present("path") {
            Some(Value::String(path)) => Some(path.as_str()),
            Some(other) => bail!("{FETCH_EXTERNAL_SIGNAL}: `path` must be a string, got {other}"),
            None => None,
        };
        let url = Self::url(api, path)?;
        let mut query = Self::query(&args)?;
        if let Some(key) = &api.api_key {
            query.push((api.api_key_param.clone(), key.expose_secret().to_string()));
        }

        let response =
            match self.client.get(&url).query(&query).timeout(api.timeout).send().await {
                Ok(response) => response,
                Err(error) => {
                    // The url carries the api key as a query parameter.
                    let error = error.without_url();
                    tracing::warn!(
                        event_name = "agent.external_api.failed",
                        api = %name,
                        error = %error,
                        "external api request failed"
                    );
                    return Ok(json!({ "success": false, "api": name, "error": error.to_string() }));
                }
            };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let data = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));
        if !status.is_success() {
            tracing::warn!(
                event_name = "agent.external_api.failed",
                api = %name,
                status = status.as_u16(),
                "external api returned an error status"
            );
            return Ok(json!({
                "success": false,
                "api": name,
                "status": status.as_u16(),
                "error": data,
            }));
        }

        tracing::debug!(
            event_name = "agent.external_api.fetched",
            api = %name,
            "external data fetched"
        );
        Ok(json!({ "success": true, "api": name, "status": status.as_u16(), "data": data }))
    }
}

/// Adds the document tool and, when any api is configured, the external api tool.
pub fn register_context_tools(
    registry: &mut ToolRegistry,
    documents: &Arc<dyn DocumentStore>,
    external: Option<&ExternalApiTool>,
) {
    registry.register(DocumentTool::new(Arc::clone(documents)));
    if let Some(external) = external.filter(|tool| !tool.apis.is_empty()) {
        registry.register(external.clone());
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use serde_json::json;

    use adpilot_core::config::ExternalApiConfig;
    use adpilot_db::repositories::{Document, DocumentStore, InMemoryDocumentStore};

    use super::{register_context_tools, ExternalApiTool, FETCH_EXTERNAL_SIGNAL, GET_DOCUMENT};
    use crate::tools::ToolRegistry;

    fn apis(base_url: &str) -> BTreeMap<String, ExternalApiConfig> {
        BTreeMap::from([(
            "weather".to_string(),
            ExternalApiConfig {
                base_url: base_url.to_string(),
                description: Some("Daily forecast".to_string()),
                api_key: Some("weather-secret".to_string().into()),
                api_key_param: "key".to_string(),
                timeout_secs: 1,
            },
        )])
    }

    async fn store() -> Arc<dyn DocumentStore> {
        let store = InMemoryDocumentStore::new();
        store
            .put_document(
                "CustomerInstructions",
                Document::new("1234567890", json!({ "instruction": "Pause when it rains." })),
            )
            .await
            .expect("seed document");
        Arc::new(store)
    }

    #[tokio::test]
    async fn get_document_reports_found_and_missing_documents() {
        let documents = store().await;
        let mut registry = ToolRegistry::default();
        register_context_tools(&mut registry, &documents, None);

        assert_eq!(registry.names(), vec![GET_DOCUMENT]);

        let found = registry
            .call(
                GET_DOCUMENT,
                json!({ "collection": "CustomerInstructions", "document_id": "1234567890" }),
            )
            .await
            .expect("found");
        assert_eq!(found["exists"], true);
        assert_eq!(found["data"]["instruction"], "Pause when it rains.");

        let missing = registry
            .call(
                GET_DOCUMENT,
                json!({ "collection": "CustomerInstructions", "document_id": "42" }),
            )
            .await
            .expect("missing");
        assert_eq!(
            missing,
            json!({ "id": "42", "exists": false, "message": "Document not found" })
        );

        let no_id = registry.call(GET_DOCUMENT, json!({ "collection": "x" })).await;
        assert!(no_id.expect_err("missing id").to_string().contains("document_id"));
    }

    #[tokio::test]
    async fn external_api_tool_is_registered_only_when_configured() {
        let documents = store().await;

        let empty = ExternalApiTool::from_config(&BTreeMap::new()).expect("tool");
        let mut registry = ToolRegistry::default();
        register_context_tools(&mut registry, &documents, Some(&empty));
        assert!(!registry.contains(FETCH_EXTERNAL_SIGNAL));

        let weather = ExternalApiTool::from_config(&apis("http://127.0.0.1:9")).expect("tool");
        let mut registry = ToolRegistry::default();
        register_context_tools(&mut registry, &documents, Some(&weather));
        assert!(registry.contains(FETCH_EXTERNAL_SIGNAL));

        let catalog = registry.describe();
        let entry = catalog
            .as_array()
            .and_then(|tools| tools.iter().find(|tool| tool["name"] == FETCH_EXTERNAL_SIGNAL))
            .expect("catalog entry");
        assert_eq!(entry["parameters"]["api"]["weather"], "Daily forecast");
    }

    #[tokio::test]
    async fn unreachable_api_comes_back_as_a_failure_payload() {
        let tool = ExternalApiTool::from_config(&apis("http://127.0.0.1:9")).expect("tool");
        let mut registry = ToolRegistry::default();
        registry.register(tool);

        let output = registry
            .call(
                FETCH_EXTERNAL_SIGNAL,
                json!({ "api": "weather", "path": "forecast", "params": { "city": "Berlin" } }),
            )
            .await
            .expect("transport errors are reported to the model");
        assert_eq!(output["success"], false);
        assert_eq!(output["api"], "weather");
        assert!(!output.to_string().contains("weather-secret"));
    }

    #[tokio::test]
    async fn unknown_api_and_escaping_paths_are_refused() {
        let tool =
            ExternalApiTool::from_config(&apis("https://weather.example.com")).expect("tool");
        let mut registry = ToolRegistry::default();
        registry.register(tool);

        let unknown = registry
            .call(FETCH_EXTERNAL_SIGNAL, json!({ "api": "pollen" }))
            .await
            .expect_err("unknown api");
        assert!(unknown.to_string().contains("unknown api `pollen` (configured: weather)"));

        let escaping = registry
            .call(FETCH_EXTERNAL_SIGNAL, json!({ "api": "weather", "path": "../admin" }))
            .await
            .expect_err("escaping path");
        assert!(escaping.to_string().contains("must be relative"));
    }
}
