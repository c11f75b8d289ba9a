//! Number floor price service
//!
//! TTL-cached lowest fixed-price listing in the Fragment Numbers collection,
//! fetched from the GetGems GraphQL search API with a persisted query. The
//! cached `{price, item name, item address}` triple is replaced atomically
//! on success only.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::cache::{Refresh, RefreshCache};
use crate::error::FetchError;

/// Persisted query identifier for the `nftSearch` operation
const NFT_SEARCH_QUERY_HASH: &str =
    "0a50a6e37a860bc3a75f3318946b487bbeedd57febc690c0b5b9ddd2302604af";

/// Lowest current fixed-price listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloorListing {
    pub price_ton: Decimal,
    /// Display name of the item (the phone number)
    pub item_name: String,
    pub item_address: String,
}

/// Upstream producing the current floor listing
#[async_trait]
pub trait FloorSource: Send + Sync {
    async fn fetch_floor(&self) -> Result<FloorListing, FetchError>;
}

/// GetGems GraphQL client
pub struct GetGemsClient {
    client: reqwest::Client,
    url: String,
    collection_address: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: Option<SearchData>,
    errors: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    #[serde(rename = "alphaNftItemSearch")]
    alpha_nft_item_search: Option<SearchEdges>,
}

#[derive(Debug, Deserialize)]
struct SearchEdges {
    edges: Vec<SearchEdge>,
}

#[derive(Debug, Deserialize)]
struct SearchEdge {
    node: SearchNode,
}

#[derive(Debug, Deserialize)]
struct SearchNode {
    name: Option<String>,
    address: Option<String>,
    sale: Option<SaleInfo>,
}

#[derive(Debug, Deserialize)]
struct SaleInfo {
    #[serde(rename = "__typename")]
    typename: Option<String>,
    #[serde(rename = "fullPrice")]
    full_price: Option<String>,
}

impl GetGemsClient {
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        collection_address: impl Into<String>,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            collection_address: collection_address.into(),
        }
    }

    /// Request body: the single cheapest fixed-price listing, sorted
    /// ascending by price then by index
    fn request_body(&self) -> serde_json::Value {
        json!({
            "operationName": "nftSearch",
            "variables": {
                "query": format!(
                    "{{\"$and\":[{{\"collectionAddress\":\"{}\"}},{{\"saleType\":\"fix_price\"}}]}}",
                    self.collection_address
                ),
                "attributes": null,
                "sort": "[{\"fixPrice\":{\"order\":\"asc\"}},{\"index\":{\"order\":\"asc\"}}]",
                "count": 1,
            },
            "extensions": {
                "persistedQuery": {
                    "version": 1,
                    "sha256Hash": NFT_SEARCH_QUERY_HASH,
                }
            }
        })
    }
}

/// Decode the GraphQL body into a floor listing
fn parse_floor_response(body: &str) -> Result<FloorListing, FetchError> {
    let response: SearchResponse =
        serde_json::from_str(body).map_err(FetchError::parse)?;

    if let Some(errors) = response.errors {
        return Err(FetchError::unavailable(format!("GraphQL errors: {errors}")));
    }

    let edges = response
        .data
        .and_then(|d| d.alpha_nft_item_search)
        .map(|s| s.edges)
        .unwrap_or_default();

    let node = edges
        .into_iter()
        .next()
        .map(|edge| edge.node)
        .ok_or_else(|| FetchError::parse("no items in search response"))?;

    let sale = node
        .sale
        .ok_or_else(|| FetchError::parse("first item has no sale information"))?;

    if let Some(typename) = sale.typename.as_deref() {
        if typename != "NftSaleFixPrice" {
            warn!(sale_type = typename, "unexpected sale type on floor item");
        }
    }

    let nano: i64 = sale
        .full_price
        .as_deref()
        .unwrap_or("0")
        .parse()
        .map_err(FetchError::parse)?;
    // fullPrice is denominated in nanoton
    let price_ton = Decimal::from_i128_with_scale(nano as i128, 9).normalize();

    Ok(FloorListing {
        price_ton,
        item_name: node.name.unwrap_or_else(|| "Unknown Number".to_string()),
        item_address: node
            .address
            .ok_or_else(|| FetchError::parse("first item has no address"))?,
    })
}

#[async_trait]
impl FloorSource for GetGemsClient {
    async fn fetch_floor(&self) -> Result<FloorListing, FetchError> {
        let response = self
            .client
            .post(&self.url)
            .header("x-gg-client", "v:1 l:en")
            .json(&self.request_body())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::unavailable(format!(
                "GetGems returned {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        parse_floor_response(&body)
    }
}

/// Refresh strategy delegating to a [`FloorSource`]
pub struct FloorRefresher {
    source: Arc<dyn FloorSource>,
}

#[async_trait]
impl Refresh for FloorRefresher {
    type Value = FloorListing;

    fn name(&self) -> &'static str {
        "floor_price"
    }

    async fn refresh(&self, _previous: Option<&FloorListing>) -> Option<FloorListing> {
        match self.source.fetch_floor().await {
            Ok(listing) => {
                info!(price = %listing.price_ton, item = %listing.item_name, "floor price updated");
                Some(listing)
            }
            Err(err) => {
                warn!(error = %err, "floor price fetch failed");
                None
            }
        }
    }
}

/// TTL-cached floor price with a background refresh task
pub struct FloorPriceService {
    cache: RefreshCache<FloorRefresher>,
    collection_address: String,
}

impl FloorPriceService {
    pub fn new(
        source: Arc<dyn FloorSource>,
        collection_address: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            cache: RefreshCache::new(FloorRefresher { source }, ttl),
            collection_address: collection_address.into(),
        }
    }

    pub fn start(&self) {
        self.cache.start();
    }

    pub fn stop(&self) {
        self.cache.stop();
    }

    /// Current floor listing and its age in seconds
    pub async fn get(&self) -> (Option<FloorListing>, u64) {
        self.cache.get().await
    }

    pub fn collection_address(&self) -> &str {
        &self.collection_address
    }
}
