//! HTTP client for the registry API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use minion_core::{
    AspectDefinition, GatewayError, MinionConfig, RecordsPage, RecordsQuery, RegistryGateway,
    RetryPolicy, TenantId, WebHook, WebHookAcknowledgement, WebHookAcknowledgementResponse,
};

use crate::retry::with_retries;
use crate::{SESSION_HEADER, TENANT_HEADER};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Registry gateway that authenticates with a pre-issued session credential.
#[derive(Debug, Clone)]
pub struct HttpRegistryClient {
    client: Client,
    base_url: String,
    credential: String,
    tenant: TenantId,
    retry: RetryPolicy,
}

impl HttpRegistryClient {
    pub fn new(
        base_url: impl Into<String>,
        credential: impl Into<String>,
        tenant: TenantId,
        retry: RetryPolicy,
    ) -> Result<Self, GatewayError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| transport("buildClient", &base_url, err))?;
        Ok(Self {
            client,
            base_url,
            credential: credential.into(),
            tenant,
            retry,
        })
    }

    pub fn from_config(config: &MinionConfig) -> Result<Self, GatewayError> {
        Self::new(
            config.registry_url.as_str(),
            config.credential.as_str(),
            config.scope_tenant(),
            config.retry_policy(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, url: &str, tenant: TenantId) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(SESSION_HEADER, &self.credential)
            .header(TENANT_HEADER, tenant.to_string())
    }

    async fn send(
        &self,
        operation: &str,
        url: &str,
        request: RequestBuilder,
    ) -> Result<Response, GatewayError> {
        let response = request
            .send()
            .await
            .map_err(|err| transport(operation, url, err))?;
        tracing::debug!(operation, url, status = response.status().as_u16(), "registry response");
        Ok(response)
    }
}

#[async_trait]
impl RegistryGateway for HttpRegistryClient {
    async fn get_records(&self, query: &RecordsQuery) -> Result<RecordsPage, GatewayError> {
        let operation = "getRecords";
        let url = self.url("/records");
        let url = url.as_str();
        let params = records_params(query);
        let params = &params;

        with_retries(&self.retry, operation, || async move {
            let request = self.request(Method::GET, url, self.tenant).query(params);
            let response = check(operation, self.send(operation, url, request).await?).await?;
            decode(operation, response).await
        })
        .await
    }

    async fn get_webhook(&self, id: &str) -> Result<Option<WebHook>, GatewayError> {
        let operation = "getWebHook";
        let url = self.url(&format!("/hooks/{}", urlencoding::encode(id)));
        let url = url.as_str();

        with_retries(&self.retry, operation, || async move {
            let request = self.request(Method::GET, url, self.tenant);
            let response = self.send(operation, url, request).await?;
            if response.status() == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            let response = check(operation, response).await?;
            decode(operation, response).await.map(Some)
        })
        .await
    }

    async fn put_webhook(&self, hook: &WebHook) -> Result<WebHook, GatewayError> {
        let operation = "putWebHook";
        let url = self.url(&format!("/hooks/{}", urlencoding::encode(&hook.id)));
        let url = url.as_str();

        with_retries(&self.retry, operation, || async move {
            let request = self.request(Method::PUT, url, self.tenant).json(hook);
            let response = check(operation, self.send(operation, url, request).await?).await?;
            decode(operation, response).await
        })
        .await
    }

    async fn ack_webhook(
        &self,
        id: &str,
        ack: &WebHookAcknowledgement,
    ) -> Result<WebHookAcknowledgementResponse, GatewayError> {
        let operation = "ackWebHook";
        let url = self.url(&format!("/hooks/{}/ack", urlencoding::encode(id)));
        let url = url.as_str();

        with_retries(&self.retry, operation, || async move {
            let request = self.request(Method::POST, url, self.tenant).json(ack);
            let response = check(operation, self.send(operation, url, request).await?).await?;
            decode(operation, response).await
        })
        .await
    }

    async fn put_aspect_definition(
        &self,
        definition: &AspectDefinition,
        tenant: TenantId,
    ) -> Result<AspectDefinition, GatewayError> {
        let operation = "putAspectDefinition";
        let url = self.url(&format!("/aspects/{}", urlencoding::encode(&definition.id)));
        let url = url.as_str();

        with_retries(&self.retry, operation, || async move {
            let request = self.request(Method::PUT, url, tenant).json(definition);
            let response = check(operation, self.send(operation, url, request).await?).await?;
            decode(operation, response).await
        })
        .await
    }
}

/// Query string of a page request; array parameters repeat their key.
fn records_params(query: &RecordsQuery) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    for aspect in &query.aspects {
        params.push(("aspect", aspect.clone()));
    }
    for aspect in &query.optional_aspects {
        params.push(("optionalAspect", aspect.clone()));
    }
    params.push(("dereference", query.dereference.to_string()));
    if let Some(token) = &query.page_token {
        params.push(("pageToken", token.clone()));
    }
    if let Some(limit) = query.limit {
        params.push(("limit", limit.to_string()));
    }
    params
}

pub(crate) fn transport(operation: &str, url: &str, err: reqwest::Error) -> GatewayError {
    GatewayError::Transport {
        operation: operation.to_string(),
        url: url.to_string(),
        message: err.to_string(),
    }
}

/// Turn a non-success status into [`GatewayError::Status`], keeping the body.
pub(crate) async fn check(operation: &str, response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GatewayError::Status {
        operation: operation.to_string(),
        status: status.as_u16(),
        body,
    })
}

pub(crate) async fn decode<T: DeserializeOwned>(
    operation: &str,
    response: Response,
) -> Result<T, GatewayError> {
    response.json::<T>().await.map_err(|err| GatewayError::Decode {
        operation: operation.to_string(),
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_params_repeat_array_keys() {
        let query = RecordsQuery {
            aspects: vec!["a".to_string(), "b".to_string()],
            optional_aspects: vec!["c".to_string()],
            dereference: true,
            page_token: Some("42".to_string()),
            limit: None,
        };
        assert_eq!(
            records_params(&query),
            vec![
                ("aspect", "a".to_string()),
                ("aspect", "b".to_string()),
                ("optionalAspect", "c".to_string()),
                ("dereference", "true".to_string()),
                ("pageToken", "42".to_string()),
            ]
        );
    }

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let client = HttpRegistryClient::new(
            "http://registry/v0/",
            "token",
            TenantId(0),
            RetryPolicy::none(),
        )
        .expect("client");
        assert_eq!(client.base_url(), "http://registry/v0");
        assert_eq!(client.url("/records"), "http://registry/v0/records");
    }
}
