//! HTTP client for the remote record store
//!
//! Implements [`CredentialStore`] against the record store API:
//! `credentials` keyed by id, `checkins` and `rejections` append-only.
//! Document ids and insertion timestamps are assigned server-side.

use access_core::{Checkin, CredentialRecord, CredentialStore, Rejection, StoreError};
use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;

use crate::config::StoreConfig;

/// reqwest-backed record store client.
pub struct HttpCredentialStore {
    base: String,
    service_token: Option<String>,
    http: Client,
}

impl HttpCredentialStore {
    /// Build a client from store config. The per-request timeout lives on
    /// the client, so a hung store resolves to the fail-closed deny instead
    /// of wedging the daemon.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build record store client")?;

        Ok(Self {
            base: config.url.trim_end_matches('/').to_string(),
            service_token: config.service_token.clone(),
            http,
        })
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.service_token {
            Some(token) => req.header("X-Service-Token", token),
            None => req,
        }
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<(), StoreError> {
        let url = format!("{}{}", self.base, path);
        let resp = self
            .authed(self.http.post(&url).json(body))
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        status_to_result(resp.status())
    }
}

fn status_to_result(status: StatusCode) -> Result<(), StoreError> {
    if status.is_success() {
        Ok(())
    } else if status.is_client_error() {
        Err(StoreError::Rejected {
            status: status.as_u16(),
        })
    } else {
        Err(StoreError::Unavailable(format!(
            "record store returned {status}"
        )))
    }
}

#[async_trait::async_trait]
impl CredentialStore for HttpCredentialStore {
    async fn fetch(&self, id: &str) -> Result<Option<CredentialRecord>, StoreError> {
        let url = format!("{}/credentials/{id}", self.base);
        let resp = self
            .authed(self.http.get(&url))
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => resp
                .json::<CredentialRecord>()
                .await
                .map(Some)
                .map_err(|e| StoreError::Malformed(e.to_string())),
            status if status.is_client_error() => Err(StoreError::Rejected {
                status: status.as_u16(),
            }),
            status => Err(StoreError::Unavailable(format!(
                "record store returned {status}"
            ))),
        }
    }

    async fn insert_unregistered(&self, id: &str) -> Result<(), StoreError> {
        self.post_json("/credentials", &CredentialRecord::unregistered(id))
            .await
    }

    async fn record_checkin(&self, checkin: &Checkin) -> Result<(), StoreError> {
        self.post_json("/checkins", checkin).await
    }

    async fn record_rejection(&self, rejection: &Rejection) -> Result<(), StoreError> {
        self.post_json("/rejections", rejection).await
    }

    async fn list_all(&self) -> Result<Vec<CredentialRecord>, StoreError> {
        let url = format!("{}/credentials", self.base);
        let resp = self
            .authed(self.http.get(&url))
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            status_to_result(status)?;
        }
        resp.json::<Vec<CredentialRecord>>()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))
    }
}
