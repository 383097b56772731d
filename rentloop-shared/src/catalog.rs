/// Catalog collaborator used by the rental ledger and payments
///
/// Rentals never read the catalog tables directly. They ask a
/// [`CatalogClient`] for an item snapshot, which in production is an HTTP
/// call to `{CATALOG_API_BASE}/items/{id}` bounded by a timeout.
///
/// Any failure (timeout, transport error, non-2xx, malformed body) is an
/// error, and booking treats every error as "not bookable".
///
/// # Example
///
/// ```no_run
/// use rentloop_shared::catalog::{CatalogClient, HttpCatalogClient};
/// use std::time::Duration;
///
/// # async fn example(item_id: uuid::Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let catalog = HttpCatalogClient::new("http://127.0.0.1:8080/v1", Duration::from_secs(5))?;
/// let item = catalog.fetch_item(item_id).await?;
/// println!("{} costs {}/h", item.name, item.price_per_h);
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Name shown for items the catalog could not resolve
pub const PLACEHOLDER_NAME: &str = "Unknown item";

/// Errors reading from the catalog
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Item does not exist
    #[error("item {0} not found in catalog")]
    NotFound(Uuid),

    /// Catalog did not answer within the configured timeout
    #[error("catalog request timed out")]
    Timeout,

    /// Connection refused, DNS failure and similar
    #[error("catalog unreachable: {0}")]
    Unreachable(String),

    /// Catalog answered with an unexpected status
    #[error("catalog returned status {0}")]
    Status(u16),

    /// Body could not be decoded as an item
    #[error("malformed catalog response: {0}")]
    Malformed(String),

    /// Client could not be constructed
    #[error("catalog client setup failed: {0}")]
    Setup(String),
}

/// What the ledger needs to know about an item
///
/// `available` is optional on the wire; a missing flag counts as
/// unavailable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub id: Uuid,

    pub name: String,

    /// Price per hour in major units
    pub price_per_h: f64,

    #[serde(default)]
    pub available: Option<bool>,

    #[serde(default)]
    pub owner_username: Option<String>,

    #[serde(default)]
    pub image_url: Option<String>,

    #[serde(default)]
    pub image_urls: Vec<String>,
}

impl ItemSnapshot {
    /// An available item with the given price and no display data
    pub fn bookable(id: Uuid, price_per_h: f64) -> Self {
        Self {
            id,
            name: String::new(),
            price_per_h,
            available: Some(true),
            owner_username: None,
            image_url: None,
            image_urls: Vec::new(),
        }
    }

    /// Display stand-in for an item the catalog could not return
    ///
    /// Never bookable.
    pub fn placeholder(id: Uuid) -> Self {
        Self {
            id,
            name: PLACEHOLDER_NAME.to_string(),
            price_per_h: 0.0,
            available: None,
            owner_username: None,
            image_url: None,
            image_urls: Vec::new(),
        }
    }

    pub fn is_bookable(&self) -> bool {
        self.available == Some(true)
    }
}

/// Read access to catalog items
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Fetches a single item by id
    async fn fetch_item(&self, item_id: Uuid) -> Result<ItemSnapshot, CatalogError>;

    /// Fetches an item for display, substituting a placeholder on failure
    async fn item_for_display(&self, item_id: Uuid) -> ItemSnapshot {
        match self.fetch_item(item_id).await {
            Ok(item) => item,
            Err(e) => {
                debug!(%item_id, error = %e, "Using placeholder item snapshot");
                ItemSnapshot::placeholder(item_id)
            }
        }
    }
}

/// Catalog client speaking HTTP to the catalog service
#[derive(Debug, Clone)]
pub struct HttpCatalogClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCatalogClient {
    /// Creates a client rooted at `base_url` (e.g. `http://catalog/v1`)
    ///
    /// Every request, including connect, is bounded by `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| CatalogError::Setup(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn item_url(&self, item_id: Uuid) -> String {
        format!("{}/items/{}", self.base_url, item_id)
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn fetch_item(&self, item_id: Uuid) -> Result<ItemSnapshot, CatalogError> {
        let response = self
            .client
            .get(self.item_url(item_id))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    warn!(%item_id, "Catalog request timed out");
                    CatalogError::Timeout
                } else {
                    warn!(%item_id, error = %e, "Catalog unreachable");
                    CatalogError::Unreachable(e.to_string())
                }
            })?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Err(CatalogError::NotFound(item_id)),
            other => {
                warn!(%item_id, status = other.as_u16(), "Unexpected catalog status");
                return Err(CatalogError::Status(other.as_u16()));
            }
        }

        response.json::<ItemSnapshot>().await.map_err(|e| {
            if e.is_timeout() {
                CatalogError::Timeout
            } else {
                CatalogError::Malformed(e.to_string())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_available_flag_is_not_bookable() {
        let item: ItemSnapshot = serde_json::from_value(serde_json::json!({
            "id": Uuid::nil(),
            "name": "Drill",
            "price_per_h": 4.5,
        }))
        .unwrap();

        assert_eq!(item.available, None);
        assert!(!item.is_bookable());
    }

    #[test]
    fn test_placeholder() {
        let id = Uuid::new_v4();
        let item = ItemSnapshot::placeholder(id);
        assert_eq!(item.id, id);
        assert_eq!(item.name, PLACEHOLDER_NAME);
        assert_eq!(item.price_per_h, 0.0);
        assert!(!item.is_bookable());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = HttpCatalogClient::new("http://catalog/v1/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.item_url(Uuid::nil()),
            "http://catalog/v1/items/00000000-0000-0000-0000-000000000000"
        );
    }
}
