pub mod models;

use std::time::Duration;

use reqwest::{
    ClientBuilder,
    Url,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use serde_json::json;

use self::models::EntityState;
use crate::prelude::*;

/// Home Assistant REST API client.
///
/// Every call is bounded by the client-level timeout, so a stalled request
/// cannot stall the next scheduled tick.
pub struct Client {
    http: reqwest::Client,
    base_url: Url,
}

impl Client {
    pub fn try_new(access_token: &str, base_url: Url) -> Result<Self> {
        let headers = HeaderMap::from_iter([(
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(&format!("Bearer {access_token}"))?,
        )]);
        let http = ClientBuilder::new()
            .default_headers(headers)
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http, base_url })
    }

    #[instrument(skip_all, fields(entity_id = entity_id))]
    pub async fn get_state(&self, entity_id: &str) -> Result<EntityState> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("invalid base URL"))?
            .push("states")
            .push(entity_id);
        let state = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("failed to parse the state of `{entity_id}`"))?;
        Ok(state)
    }

    /// Read a numeric sensor; `unknown` and `unavailable` map to [`None`].
    pub async fn get_scalar(&self, entity_id: &str) -> Result<Option<f64>> {
        Ok(self.get_state(entity_id).await?.scalar())
    }

    #[instrument(skip_all, fields(domain = domain, service = service))]
    async fn call_service(
        &self,
        domain: &str,
        service: &str,
        payload: serde_json::Value,
    ) -> Result {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("invalid base URL"))?
            .push("services")
            .push(domain)
            .push(service);
        self.http.post(url).json(&payload).send().await?.error_for_status()?;
        Ok(())
    }

    pub async fn set_number(&self, entity_id: &str, value: f64) -> Result {
        self.call_service("number", "set_value", json!({"entity_id": entity_id, "value": value}))
            .await
    }

    pub async fn set_switch(&self, entity_id: &str, on: bool) -> Result {
        let service = if on { "turn_on" } else { "turn_off" };
        self.call_service("switch", service, json!({"entity_id": entity_id})).await
    }
}
