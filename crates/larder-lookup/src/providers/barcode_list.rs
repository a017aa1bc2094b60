//! barcode-list.ru search page scraper and the document parser shared with
//! the mirror provider.
//!
//! ## Document Parsing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. "Title: <name>" line (mirror markdown)  → accept if meaningful     │
//! │  2. HTML rows   <tr><td>…</td><td>CODE</td><td>NAME</td>…</tr>          │
//! │  3. Markdown rows  | … | CODE | NAME | … |                              │
//! │                                                                         │
//! │  Rows: the cell right after the one equal to the barcode is the name.  │
//! │  Rows whose name fails the validator are skipped, not fatal.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

use super::{get, BarcodeProvider};
use crate::error::{LookupError, LookupResult};
use larder_core::validation::is_meaningful_name;
use larder_core::LookupPayload;

/// Search page path under the barcode-list.ru origin.
const SEARCH_PAGE_PATH: &str = "/barcode/RU/Поиск.htm";

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*Title:\s*(.+?)\s*$").expect("static regex"));

static ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>").expect("static regex"));

static CELL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<t[dh][^>]*>(.*?)</t[dh]>").expect("static regex"));

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("static regex"));

static NUMERIC_ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").expect("static regex"));

// =============================================================================
// Document Parser
// =============================================================================

/// Extracts a product name for `barcode` from a search page, either the raw
/// HTML or the markdown rendering a text mirror returns.
pub fn parse_document(barcode: &str, document: &str) -> Option<LookupPayload> {
    let name = title_name(barcode, document)
        .or_else(|| html_row_name(barcode, document))
        .or_else(|| markdown_row_name(barcode, document))?;

    Some(LookupPayload::new(barcode, name))
}

fn title_name(barcode: &str, document: &str) -> Option<String> {
    TITLE_RE
        .captures_iter(document)
        .map(|caps| clean_text(&caps[1]))
        .find(|title| is_meaningful_name(title, barcode))
}

fn html_row_name(barcode: &str, document: &str) -> Option<String> {
    ROW_RE.captures_iter(document).find_map(|row| {
        let cells: Vec<String> = CELL_RE
            .captures_iter(&row[1])
            .map(|cell| clean_text(&TAG_RE.replace_all(&cell[1], " ")))
            .collect();
        name_after_barcode(barcode, &cells)
    })
}

fn markdown_row_name(barcode: &str, document: &str) -> Option<String> {
    document
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('|'))
        .find_map(|line| {
            let cells: Vec<String> = line
                .trim_matches('|')
                .split('|')
                .map(clean_text)
                .collect();
            name_after_barcode(barcode, &cells)
        })
}

fn name_after_barcode(barcode: &str, cells: &[String]) -> Option<String> {
    let position = cells.iter().position(|cell| cell == barcode)?;
    cells
        .get(position + 1)
        .filter(|name| is_meaningful_name(name, barcode))
        .cloned()
}

/// Decodes entities and collapses whitespace.
fn clean_text(raw: &str) -> String {
    decode_entities(raw)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_entities(raw: &str) -> String {
    let numeric = NUMERIC_ENTITY_RE.replace_all(raw, |caps: &regex::Captures| {
        let code = &caps[1];
        let value = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse::<u32>().ok(),
        };
        value
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });

    numeric
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Search page URL for one barcode under `base`.
pub fn search_page_url(base: &Url, barcode: &str) -> LookupResult<Url> {
    let mut url = base
        .join(SEARCH_PAGE_PATH)
        .map_err(|e| LookupError::Unavailable(e.to_string()))?;
    url.query_pairs_mut().append_pair("barcode", barcode);
    Ok(url)
}

// =============================================================================
// Provider
// =============================================================================

pub struct BarcodeListProvider {
    client: Client,
    base: Url,
}

impl BarcodeListProvider {
    pub const ID: &'static str = "barcode_list";

    pub fn new(client: Client, base: Url) -> Self {
        BarcodeListProvider { client, base }
    }
}

#[async_trait]
impl BarcodeProvider for BarcodeListProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn lookup(&self, barcode: &str) -> LookupResult<Option<LookupPayload>> {
        let url = search_page_url(&self.base, barcode)?;
        let Some(response) = get(&self.client, url).await? else {
            return Ok(None);
        };

        let document = response.text().await?;
        let payload = parse_document(barcode, &document);
        if payload.is_none() {
            debug!(barcode = %barcode, bytes = document.len(), "No product row on search page");
        }
        Ok(payload)
    }
}
