use std::sync::Arc;

use log::*;
use reqwest::Client;

use crate::{
    config::MeliConfig,
    data_objects::{OrderSearchResults, OrderSnapshot, SaleSummary, UserInfo},
    error::MeliApiError,
    token::TokenCache,
};

/// A source of authoritative order snapshots. The relay pipeline is written against this trait so that endpoint
/// tests can substitute a canned source.
#[allow(async_fn_in_trait)]
pub trait OrderSource {
    async fn fetch_order(&self, order_id: &str) -> Result<OrderSnapshot, MeliApiError>;
}

#[derive(Debug, Clone)]
pub struct MeliApi {
    config: MeliConfig,
    client: Arc<Client>,
    tokens: TokenCache,
}

impl MeliApi {
    pub fn new(config: MeliConfig) -> Result<Self, MeliApiError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MeliApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client), tokens: TokenCache::new() })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url)
    }

    async fn access_token(&self) -> Result<String, MeliApiError> {
        self.tokens.access_token(&self.client, &self.config).await
    }

    /// Fetches a single order with its payments embedded. Non-2xx responses are an [`MeliApiError::OrderFetch`]
    /// carrying the upstream status code.
    pub async fn get_order(&self, order_id: &str) -> Result<OrderSnapshot, MeliApiError> {
        let token = self.access_token().await?;
        debug!("🛒 Fetching order #{order_id}");
        let response = self
            .client
            .get(self.url(&format!("/orders/{order_id}")))
            .query(&[("include", "payments")])
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| MeliApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            let order = response.json::<OrderSnapshot>().await.map_err(|e| MeliApiError::JsonError(e.to_string()))?;
            trace!("🛒 Fetched order #{order_id}: status {}", order.status);
            Ok(order)
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            Err(MeliApiError::OrderFetch { status, message })
        }
    }

    /// The seller id behind the configured credentials.
    pub async fn my_user_id(&self) -> Result<u64, MeliApiError> {
        let token = self.access_token().await?;
        let response = self
            .client
            .get(self.url("/users/me"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| MeliApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            let user = response.json::<UserInfo>().await.map_err(|e| MeliApiError::JsonError(e.to_string()))?;
            Ok(user.id)
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            Err(MeliApiError::QueryError { status, message })
        }
    }

    /// The most recent paid orders for this seller, newest first. Backs the read-through sales listing proxy.
    pub async fn recent_paid_sales(&self, limit: u32) -> Result<Vec<SaleSummary>, MeliApiError> {
        let seller = self.my_user_id().await?;
        let token = self.access_token().await?;
        debug!("🛒 Searching recent paid orders for seller {seller}");
        let limit = limit.to_string();
        let seller = seller.to_string();
        let params =
            [("seller", seller.as_str()), ("order.status", "paid"), ("sort", "date_desc"), ("limit", limit.as_str())];
        let response = self
            .client
            .get(self.url("/orders/search"))
            .query(&params)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| MeliApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            let found =
                response.json::<OrderSearchResults>().await.map_err(|e| MeliApiError::JsonError(e.to_string()))?;
            info!("🛒 Order search returned {} results", found.results.len());
            Ok(found.results.into_iter().map(SaleSummary::from).collect())
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            Err(MeliApiError::QueryError { status, message })
        }
    }
}

impl OrderSource for MeliApi {
    async fn fetch_order(&self, order_id: &str) -> Result<OrderSnapshot, MeliApiError> {
        self.get_order(order_id).await
    }
}
