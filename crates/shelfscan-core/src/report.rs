//! The combined report assembled at the end of a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::location::DeliveryLocation;
use crate::products::ProductResult;

/// Counts gathered while parsing the listing page, useful when selectors drift.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingDiagnostics {
    pub cards_seen: usize,
    pub skipped_without_name: usize,
    pub skipped_without_image: usize,
    /// Entries whose detail link was built from the card id because the card
    /// carried no anchor.
    pub synthesized_links: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub products: usize,
    pub with_nutrition: usize,
    /// Products with at least one stage failure.
    pub failed: usize,
    pub uploaded: usize,
}

impl RunSummary {
    #[must_use]
    pub fn from_products(products: &[ProductResult]) -> Self {
        Self {
            products: products.len(),
            with_nutrition: products.iter().filter(|p| !p.nutrition.is_empty()).count(),
            failed: products.iter().filter(|p| p.has_failures()).count(),
            uploaded: products.iter().filter(|p| p.uploaded).count(),
        }
    }
}

/// The single JSON document a run produces.
///
/// `products` keeps listing order. Apart from `generated_at`, two runs over the
/// same inputs serialize identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedReport {
    pub generated_at: DateTime<Utc>,
    pub location: DeliveryLocation,
    pub source_listing_url: String,
    #[serde(default)]
    pub listing: ListingDiagnostics,
    /// `true` when the run was interrupted; `products` then holds only the
    /// products processed before the interrupt.
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub summary: RunSummary,
    pub products: Vec<ProductResult>,
}

impl CombinedReport {
    #[must_use]
    pub fn new(
        location: DeliveryLocation,
        source_listing_url: String,
        listing: ListingDiagnostics,
        products: Vec<ProductResult>,
    ) -> Self {
        let summary = RunSummary::from_products(&products);
        Self {
            generated_at: Utc::now(),
            location,
            source_listing_url,
            listing,
            cancelled: false,
            dry_run: false,
            summary,
            products,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::LocationPreset;
    use crate::products::{ListingEntry, NutrientValue};
    use crate::stage::{FailureReason, Stage, StageError};

    fn product(name: &str) -> ProductResult {
        ProductResult::new(ListingEntry {
            name: name.to_string(),
            hero_image_url: format!("https://cdn.example.com/product/{name}.jpg"),
            detail_url: format!("https://blinkit.com/prn/{name}/prid/1"),
            product_id: None,
        })
    }

    #[test]
    fn summary_counts_nutrition_failures_and_uploads() {
        let mut a = product("a");
        a.nutrition
            .insert("protein".into(), NutrientValue::amount(8.0, Some("g")));
        a.uploaded = true;
        let mut b = product("b");
        b.record(StageError::new(Stage::Fetch, FailureReason::Timeout, "timeout"));
        let c = product("c");

        let summary = RunSummary::from_products(&[a, b, c]);
        assert_eq!(
            summary,
            RunSummary {
                products: 3,
                with_nutrition: 1,
                failed: 1,
                uploaded: 1,
            }
        );
    }

    #[test]
    fn report_deserializes_what_it_serializes() {
        let report = CombinedReport::new(
            LocationPreset::Delhi.location(),
            "https://blinkit.com/cn/bread/cid/14/953".into(),
            ListingDiagnostics::default(),
            vec![product("a")],
        );
        let json = serde_json::to_string(&report).unwrap();
        let back: CombinedReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}
