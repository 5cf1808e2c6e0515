use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shelfscan_core::{ListedNutrient, ProductResult};

/// The record NutriSnap ingests for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    pub listing_name: String,
    pub detail_name: Option<String>,
    pub listing_image: String,
    pub product_link: String,
    pub listing_urls: Vec<String>,
    pub hero_images: Vec<String>,
    /// Nutrient name to display value, e.g. `"protein": "8.2 g"`.
    pub nutrition: BTreeMap<String, String>,
    pub listed_nutrition: Vec<ListedNutrient>,
    pub ingredients: Option<Vec<String>>,
    pub description: Option<String>,
    pub fssai_id: Option<String>,
    pub additional_text: Option<String>,
    #[serde(rename = "use_llm")]
    pub use_llm: bool,
}

impl UploadRecord {
    /// Builds the record for a product, or `None` when it has no extracted
    /// nutrition.
    #[must_use]
    pub fn from_product(product: &ProductResult) -> Option<Self> {
        if product.nutrition.is_empty() {
            return None;
        }

        let nutrition = product
            .nutrition
            .iter()
            .map(|(name, value)| (name.clone(), value.to_string()))
            .collect();

        let listing_urls = if product.entry.detail_url.is_empty() {
            Vec::new()
        } else {
            vec![product.entry.detail_url.clone()]
        };

        Some(Self {
            listing_name: product.entry.name.clone(),
            detail_name: product.detail_name.clone(),
            listing_image: product.entry.hero_image_url.clone(),
            product_link: product.entry.detail_url.clone(),
            listing_urls,
            hero_images: product.images.clone(),
            nutrition,
            listed_nutrition: product.listed_nutrition.clone(),
            ingredients: product.ingredients.as_deref().and_then(split_ingredients),
            description: product.description.clone(),
            fssai_id: product.fssai_license.clone(),
            additional_text: additional_text(product),
            use_llm: true,
        })
    }
}

/// Splits a free-form ingredient list on commas, semicolons and newlines.
/// Returns `None` when nothing is left after trimming.
#[must_use]
pub fn split_ingredients(raw: &str) -> Option<Vec<String>> {
    let parts: Vec<String> = raw
        .split([',', ';', '\n'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_owned)
        .collect();
    (!parts.is_empty()).then_some(parts)
}

fn additional_text(product: &ProductResult) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(description) = product.description.as_deref().filter(|d| !d.is_empty()) {
        parts.push(description.to_owned());
    }
    if let Some(ingredients) = product.ingredients.as_deref().filter(|i| !i.is_empty()) {
        parts.push(format!("Ingredients: {ingredients}"));
    }
    if let Some(license) = product.fssai_license.as_deref().filter(|l| !l.is_empty()) {
        parts.push(format!("FSSAI License: {license}"));
    }
    if !product.ocr_text.is_empty() {
        parts.push(format!("OCR Text:\n{}", product.ocr_text.join("\n")));
    }
    (!parts.is_empty()).then(|| parts.join("\n"))
}
