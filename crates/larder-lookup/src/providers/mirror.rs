//! barcode-list.ru search page fetched through a text-mirroring proxy.
//!
//! The proxy URL is the mirror base with the full page URL appended:
//! `https://r.jina.ai/https://barcode-list.ru/barcode/RU/...htm?barcode=...`.
//! It answers with markdown, so the page is slower but survives the origin
//! blocking direct scrapers.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

use super::barcode_list::{parse_document, search_page_url};
use super::{get, BarcodeProvider};
use crate::error::{LookupError, LookupResult};
use larder_core::LookupPayload;

/// The proxy renders the page before answering.
pub const MIRROR_TIMEOUT: Duration = Duration::from_secs(6);

pub struct BarcodeListMirrorProvider {
    client: Client,
    mirror_base: Url,
    page_base: Url,
}

impl BarcodeListMirrorProvider {
    pub const ID: &'static str = "barcode_list_mirror";

    pub fn new(client: Client, mirror_base: Url, page_base: Url) -> Self {
        BarcodeListMirrorProvider {
            client,
            mirror_base,
            page_base,
        }
    }

    fn mirror_url(&self, barcode: &str) -> LookupResult<Url> {
        let page = search_page_url(&self.page_base, barcode)?;
        let mut prefix = self.mirror_base.to_string();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }

        Url::parse(&format!("{}{}", prefix, page))
            .map_err(|e| LookupError::Unavailable(format!("mirror url: {}", e)))
    }
}

#[async_trait]
impl BarcodeProvider for BarcodeListMirrorProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    fn timeout(&self) -> Option<Duration> {
        Some(MIRROR_TIMEOUT)
    }

    async fn lookup(&self, barcode: &str) -> LookupResult<Option<LookupPayload>> {
        let Some(response) = get(&self.client, self.mirror_url(barcode)?).await? else {
            return Ok(None);
        };

        let document = response.text().await?;
        Ok(parse_document(barcode, &document))
    }
}
