//! PostgREST-style HTTP backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};

use salesdesk_auth::Session;

use crate::backend::{Backend, BackendError, RemoteRow, TableQuery};
use crate::config::ClientConfig;

/// Talks to `{base_url}/rest/v1/{table}` with the session's bearer token.
#[derive(Debug, Clone)]
pub struct RestBackend {
    base_url: String,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl RestBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        request_timeout: Option<Duration>,
    ) -> Result<Self, BackendError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            http,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, BackendError> {
        Self::new(
            config.backend_url.clone(),
            config.api_key.clone(),
            config.request_timeout,
        )
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authed(&self, req: RequestBuilder, session: &Session) -> RequestBuilder {
        let req = req.bearer_auth(session.access_token.expose());
        match &self.api_key {
            Some(key) => req.header("apikey", key),
            None => req,
        }
    }

    async fn send(req: RequestBuilder) -> Result<reqwest::Response, BackendError> {
        let resp = req.send().await.map_err(transport_error)?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(BackendError::Unauthorized {
                status: status.as_u16(),
                message: body,
            })
        } else {
            Err(BackendError::Status(status.as_u16(), body))
        }
    }
}

fn transport_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout
    } else {
        BackendError::Transport(err.to_string())
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn probe(&self, session: &Session) -> Result<(), BackendError> {
        let table = session.identity().tables().customers;
        let req = self
            .http
            .get(self.table_url(table))
            .query(&[("select", "id"), ("limit", "1")]);

        Self::send(self.authed(req, session)).await?;
        Ok(())
    }

    async fn fetch_all(
        &self,
        session: &Session,
        query: TableQuery,
    ) -> Result<Vec<RemoteRow>, BackendError> {
        let filter = format!("eq.{}", query.owner);
        let req = self
            .http
            .get(self.table_url(query.table))
            .query(&[("select", "*"), (query.owner_column, filter.as_str())]);

        let resp = Self::send(self.authed(req, session)).await?;
        let rows: Vec<RemoteRow> = resp
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        tracing::debug!(table = query.table, rows = rows.len(), "fetched table");
        Ok(rows)
    }
}
