//! Single-step commands for checking selectors, pages and OCR by hand.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use shelfscan_core::{AppConfig, DeliveryLocation};
use shelfscan_ocr::{extract_nutrition, full_text, ImageRef, OcrEngine, TextAnnotation};
use shelfscan_scraper::{parse_detail, parse_listing, snapshot_path, PageFetcher};

use crate::setup;

pub(crate) async fn run_listing(
    config: &AppConfig,
    location: &DeliveryLocation,
    target: &str,
    json: bool,
) -> anyhow::Result<()> {
    let html = setup::fetcher(config)?
        .fetch(
            target,
            location,
            Duration::from_secs(config.listing_timeout_secs),
        )
        .await
        .with_context(|| format!("fetching listing {target}"))?;
    let page = parse_listing(&html, &config.site_origin);

    if json {
        println!("{}", serde_json::to_string_pretty(&page.entries)?);
        return Ok(());
    }

    for (idx, entry) in page.entries.iter().enumerate() {
        println!("{:>3}. {}", idx + 1, entry.name);
        println!("     link:  {}", entry.detail_url);
        println!("     image: {}", entry.hero_image_url);
    }
    let d = &page.diagnostics;
    println!(
        "{} entries from {} cards ({} without name, {} without image, {} synthesized links)",
        page.entries.len(),
        d.cards_seen,
        d.skipped_without_name,
        d.skipped_without_image,
        d.synthesized_links
    );
    Ok(())
}

pub(crate) async fn run_product(
    config: &AppConfig,
    location: &DeliveryLocation,
    url: &str,
) -> anyhow::Result<()> {
    let html = setup::fetcher(config)?
        .fetch(
            url,
            location,
            Duration::from_secs(config.product_timeout_secs),
        )
        .await
        .with_context(|| format!("fetching product page {url}"))?;
    let detail = parse_detail(&html, &config.site_origin);
    if detail.is_empty() {
        anyhow::bail!("no product data found on {url} (embedded state: {:?})", detail.state);
    }

    println!("name:        {}", detail.name.as_deref().unwrap_or("-"));
    println!("fssai:       {}", detail.fssai_license.as_deref().unwrap_or("-"));
    println!("description: {}", detail.description.as_deref().unwrap_or("-"));
    println!("ingredients: {}", detail.ingredients.as_deref().unwrap_or("-"));
    println!("images:");
    for image in &detail.images {
        println!("  {image}");
    }
    if !detail.listed_nutrition.is_empty() {
        println!("listed nutrition:");
        for row in &detail.listed_nutrition {
            println!("  {}: {}", row.label, row.value);
        }
    }
    Ok(())
}

pub(crate) async fn run_ocr(
    config: &AppConfig,
    image: &str,
    creds_override: Option<&Path>,
    json: bool,
    nutrition: bool,
) -> anyhow::Result<()> {
    let (client, _) = setup::vision_client(config, creds_override)?;
    let image_ref = match snapshot_path(image) {
        Some(path) => ImageRef::Bytes(
            std::fs::read(&path).with_context(|| format!("reading image {}", path.display()))?,
        ),
        None => ImageRef::Url(image.to_owned()),
    };

    let annotations = client
        .detect_text(&image_ref)
        .await
        .with_context(|| format!("running OCR on {image}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&annotations)?);
    } else {
        println!("{}", full_text(&annotations).unwrap_or("(no text detected)"));
    }

    if nutrition {
        let pages: Vec<TextAnnotation> = full_text(&annotations)
            .map(TextAnnotation::text)
            .into_iter()
            .collect();
        println!("{}", serde_json::to_string_pretty(&extract_nutrition(&pages))?);
    }
    Ok(())
}
