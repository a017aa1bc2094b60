//! EAN-DB: authenticated REST lookup.
//!
//! `GET {endpoint}?barcode={code}&keycode={key}` answers with a flat JSON
//! object carrying `title`, `brand`, and `category`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{get, non_empty, BarcodeProvider};
use crate::error::LookupResult;
use larder_core::{LookupPayload, Nutrition, DEFAULT_CATEGORY};

#[derive(Debug, Default, Deserialize)]
struct EanDbResponse {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    brand: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

pub struct EanDbProvider {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl EanDbProvider {
    pub const ID: &'static str = "ean_db";

    pub fn new(client: Client, endpoint: Url, api_key: impl Into<String>) -> Self {
        EanDbProvider {
            client,
            endpoint,
            api_key: api_key.into(),
        }
    }

    fn request_url(&self, barcode: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("barcode", barcode)
            .append_pair("keycode", &self.api_key);
        url
    }
}

#[async_trait]
impl BarcodeProvider for EanDbProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn lookup(&self, barcode: &str) -> LookupResult<Option<LookupPayload>> {
        let Some(response) = get(&self.client, self.request_url(barcode)).await? else {
            debug!(barcode = %barcode, "EAN-DB has no record");
            return Ok(None);
        };

        let body = response.text().await?;
        parse_response(barcode, &body)
    }
}

fn parse_response(barcode: &str, body: &str) -> LookupResult<Option<LookupPayload>> {
    let decoded: EanDbResponse = serde_json::from_str(body)?;

    let Some(name) = non_empty(decoded.title.as_deref()) else {
        return Ok(None);
    };

    Ok(Some(LookupPayload {
        barcode: barcode.to_string(),
        name,
        brand: non_empty(decoded.brand.as_deref()),
        category: non_empty(decoded.category.as_deref())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        nutrition: Nutrition::EMPTY,
    }))
}
