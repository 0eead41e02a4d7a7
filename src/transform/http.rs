use super::TransformInvoker;
use crate::core::{DenormError, DocumentSnapshot, JsonMap, Result, Value};
use crate::events;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde_json::json;

/// Calls a denormalize function over HTTP using the callable-function
/// protocol: the request is `{"data": {..}}` and the reply `{"result": {..}}`.
#[derive(Debug, Clone)]
pub struct HttpTransform {
    client: reqwest::Client,
    url: String,
}

impl HttpTransform {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Request payload: `docId`, `docPath` then every source field.
    fn request_body(source: &DocumentSnapshot) -> Value {
        let mut data = JsonMap::new();
        data.insert("docId".to_string(), Value::String(source.id.clone()));
        data.insert("docPath".to_string(), Value::String(source.path.clone()));
        data.extend(source.fields.clone());
        json!({ "data": data })
    }
}

#[async_trait]
impl TransformInvoker for HttpTransform {
    async fn invoke(&self, source: &DocumentSnapshot) -> Result<JsonMap> {
        let response = self
            .client
            .post(&self.url)
            .json(&Self::request_body(source))
            .send()
            .await
            .map_err(|err| {
                DenormError::Transform(format!("request to {} failed: {}", self.url, err))
            })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if !status.is_success() || !content_type.starts_with("application/json") {
            events::denormalize_function_failed(
                &self.url,
                status.as_u16(),
                status.canonical_reason().unwrap_or_default(),
                &content_type,
            );
            return Err(DenormError::Transform(format!(
                "{} answered {} with content type '{}'",
                self.url, status, content_type
            )));
        }

        let body: Value = response.json().await?;
        match body {
            Value::Object(mut reply) => match reply.remove("result") {
                Some(Value::Object(result)) => Ok(result),
                other => Err(DenormError::Transform(format!(
                    "{} returned a non-object result: {}",
                    self.url,
                    other.unwrap_or(Value::Null)
                ))),
            },
            other => Err(DenormError::Transform(format!(
                "{} returned a malformed body: {}",
                self.url, other
            ))),
        }
    }
}
