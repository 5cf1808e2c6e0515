use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::stage::{Stage, StageError};

/// A product card discovered on a listing page, in listing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingEntry {
    pub name: String,
    /// Absolute URL of the card's product image.
    pub hero_image_url: String,
    /// Absolute URL of the product detail page.
    pub detail_url: String,
    /// Storefront product id taken from the card's `id` attribute, e.g. `"460625"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
}

/// One extracted nutrient value.
///
/// Label text usually yields a number and a unit (`8.2 g`, `250 kcal`); values
/// that don't parse as a number are kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NutrientValue {
    Amount {
        amount: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
    },
    Text(String),
}

impl NutrientValue {
    #[must_use]
    pub fn amount(amount: f64, unit: Option<&str>) -> Self {
        NutrientValue::Amount {
            amount,
            unit: unit.map(str::to_owned),
        }
    }
}

impl std::fmt::Display for NutrientValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NutrientValue::Amount { amount, unit: None } => write!(f, "{amount}"),
            NutrientValue::Amount {
                amount,
                unit: Some(unit),
            } => write!(f, "{amount} {unit}"),
            NutrientValue::Text(text) => f.write_str(text),
        }
    }
}

/// Canonical nutrient name (e.g. `"protein"`, `"saturated_fat"`) to value.
///
/// A `BTreeMap` so serialization order is stable across runs. Absence of a
/// nutrient is not an error.
pub type NutritionFields = BTreeMap<String, NutrientValue>;

/// A nutrition row as the storefront lists it on the detail page, verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedNutrient {
    pub label: String,
    pub value: String,
}

/// Everything the pipeline learned about one listing entry.
///
/// Created once per entry and filled in stage by stage. Failures are recorded
/// in `stage_failures`; a failed product is still reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductResult {
    pub entry: ListingEntry,
    #[serde(default)]
    pub detail_name: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub listed_nutrition: Vec<ListedNutrient>,
    #[serde(default)]
    pub ingredients: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fssai_license: Option<String>,
    #[serde(default)]
    pub ocr_text: Vec<String>,
    #[serde(default)]
    pub nutrition: NutritionFields,
    #[serde(default)]
    pub stage_failures: Vec<StageError>,
    /// `true` when the ingestion service already knew this product, so OCR and
    /// upload were skipped.
    #[serde(default)]
    pub known_upstream: bool,
    #[serde(default)]
    pub uploaded: bool,
}

impl ProductResult {
    #[must_use]
    pub fn new(entry: ListingEntry) -> Self {
        Self {
            entry,
            detail_name: None,
            images: Vec::new(),
            listed_nutrition: Vec::new(),
            ingredients: None,
            description: None,
            fssai_license: None,
            ocr_text: Vec::new(),
            nutrition: NutritionFields::new(),
            stage_failures: Vec::new(),
            known_upstream: false,
            uploaded: false,
        }
    }

    pub fn record(&mut self, failure: StageError) {
        self.stage_failures.push(failure);
    }

    #[must_use]
    pub fn failed_at(&self, stage: Stage) -> bool {
        self.stage_failures.iter().any(|f| f.stage == stage)
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.stage_failures.is_empty()
    }

    /// Normalized listing and detail names, used to match against names the
    /// ingestion service already has.
    #[must_use]
    pub fn candidate_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(2);
        for name in [Some(self.entry.name.as_str()), self.detail_name.as_deref()]
            .into_iter()
            .flatten()
        {
            if let Some(normalized) = normalize_name(name) {
                if !names.contains(&normalized) {
                    names.push(normalized);
                }
            }
        }
        names
    }
}

/// Trim and lowercase a product name; `None` if nothing is left.
#[must_use]
pub fn normalize_name(value: &str) -> Option<String> {
    let normalized = value.trim().to_lowercase();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// Generate a URL-safe slug from a product name.
///
/// `"Harvest Gold White Bread (400 g)"` becomes `"harvest-gold-white-bread-400-g"`.
#[must_use]
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
