use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::app_error::{AppError, StdResponse};

/// A bookable catalog entry as served by the catalog service.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Provider {
    pub id: i64,
    #[serde(default)]
    pub user_id: i64,
    pub title: String,
    #[serde(default)]
    pub desc: String,
    pub price: f64,
    #[serde(default)]
    pub images: Vec<String>,
}

#[async_trait]
pub trait Catalog: Send + Sync {
    /// `Ok(None)` when the catalog has no such provider.
    async fn find_provider_by_id(&self, id: i64) -> Result<Option<Provider>>;
}

pub struct HttpCatalog {
    client: Client,
    base_url: String,
}

impl HttpCatalog {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Catalog for HttpCatalog {
    async fn find_provider_by_id(&self, id: i64) -> Result<Option<Provider>> {
        let response = self
            .client
            .get(format!("{}/providers/{}", self.base_url, id))
            .send()
            .await
            .map_err(|_| AppError::ServiceUnreachable("CatalogService".into()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let provider: StdResponse<Provider> = response
            .error_for_status()
            .context("Catalog service returned an error status")?
            .json()
            .await
            .context("Failed to parse JSON")?;

        Ok(provider.data)
    }
}
