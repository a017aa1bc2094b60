//! Open Food Facts: open-data product aggregator.
//!
//! `GET {base}/api/v2/product/{code}.json`. A product exists only when
//! `status == 1`; the Russian name wins over the generic one.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::{first_token, get, non_empty, BarcodeProvider};
use crate::error::{LookupError, LookupResult};
use larder_core::{LookupPayload, Nutrition, DEFAULT_CATEGORY};

#[derive(Debug, Deserialize)]
struct OffResponse {
    #[serde(default)]
    status: Option<i64>,
    #[serde(default)]
    product: Option<OffProduct>,
}

#[derive(Debug, Default, Deserialize)]
struct OffProduct {
    #[serde(default)]
    product_name_ru: Option<String>,
    #[serde(default)]
    product_name: Option<String>,
    #[serde(default)]
    brands: Option<String>,
    #[serde(default)]
    categories: Option<String>,
    #[serde(default)]
    nutriments: Option<OffNutriments>,
}

#[derive(Debug, Default, Deserialize)]
struct OffNutriments {
    #[serde(rename = "energy-kcal_100g", default)]
    kcal: Option<f64>,
    #[serde(rename = "proteins_100g", default)]
    proteins: Option<f64>,
    #[serde(rename = "fat_100g", default)]
    fat: Option<f64>,
    #[serde(rename = "carbohydrates_100g", default)]
    carbs: Option<f64>,
}

pub struct OpenFoodFactsProvider {
    client: Client,
    base: Url,
}

impl OpenFoodFactsProvider {
    pub const ID: &'static str = "open_food_facts";

    pub fn new(client: Client, base: Url) -> Self {
        OpenFoodFactsProvider { client, base }
    }

    fn product_url(&self, barcode: &str) -> LookupResult<Url> {
        let file = format!("{}.json", barcode);
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| LookupError::Unavailable(format!("{} cannot be a base URL", self.base)))?
            .pop_if_empty()
            .extend(["api", "v2", "product", file.as_str()]);
        Ok(url)
    }
}

#[async_trait]
impl BarcodeProvider for OpenFoodFactsProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn lookup(&self, barcode: &str) -> LookupResult<Option<LookupPayload>> {
        let Some(response) = get(&self.client, self.product_url(barcode)?).await? else {
            return Ok(None);
        };

        let body = response.text().await?;
        parse_response(barcode, &body)
    }
}

fn parse_response(barcode: &str, body: &str) -> LookupResult<Option<LookupPayload>> {
    let decoded: OffResponse = serde_json::from_str(body)?;

    if decoded.status != Some(1) {
        return Ok(None);
    }
    let Some(product) = decoded.product else {
        return Ok(None);
    };

    let Some(name) = non_empty(product.product_name_ru.as_deref())
        .or_else(|| non_empty(product.product_name.as_deref()))
    else {
        return Ok(None);
    };

    let nutrition = product
        .nutriments
        .map(|n| Nutrition {
            kcal: n.kcal,
            protein: n.proteins,
            fat: n.fat,
            carbs: n.carbs,
        })
        .unwrap_or(Nutrition::EMPTY);

    Ok(Some(LookupPayload {
        barcode: barcode.to_string(),
        name,
        brand: first_token(product.brands.as_deref()),
        category: first_token(product.categories.as_deref())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        nutrition,
    }))
}
