use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde_json::Value;
use shelfscan_core::ListedNutrient;

use crate::listing::resolve;
use crate::state::{preloaded_state, PreloadedState};

/// Label fragments that mark a listed attribute as a nutrition row.
const NUTRITION_KEYWORDS: [&str; 16] = [
    "calorie",
    "energy",
    "protein",
    "carb",
    "sugar",
    "fat",
    "fiber",
    "cholesterol",
    "sodium",
    "potassium",
    "iron",
    "zinc",
    "vitamin",
    "mineral",
    "omega",
    "phosphorus",
];

const MEDIA_LIST_KEYS: [&str; 3] = ["itemList", "item_list", "horizontal_item_list"];

static OG_IMAGE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("meta[property='og:image'][content]").expect("valid og:image selector")
});
static IMG_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img[src]").expect("valid img selector"));

/// Whether the embedded page state was usable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StateStatus {
    #[default]
    Missing,
    Malformed,
    Found,
}

/// What a product detail page says about the product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductDetail {
    pub name: Option<String>,
    /// Carousel image URLs in page order, de-duplicated.
    pub images: Vec<String>,
    pub listed_nutrition: Vec<ListedNutrient>,
    pub ingredients: Option<String>,
    pub description: Option<String>,
    pub fssai_license: Option<String>,
    pub state: StateStatus,
}

impl ProductDetail {
    /// `true` when nothing at all was extracted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.images.is_empty()
            && self.listed_nutrition.is_empty()
            && self.ingredients.is_none()
            && self.description.is_none()
            && self.fssai_license.is_none()
    }
}

/// Extracts product details from a detail page.
///
/// Reads the embedded `PRELOADED_STATE` (path `ui.pdp.bffPdp.bffData`); when
/// that yields no images, falls back to `og:image` and `<img>` tags pointing
/// at `/product/` assets. Never fails: an unrecognized page yields an empty
/// [`ProductDetail`] whose `state` tells the caller why.
#[must_use]
pub fn parse_detail(html: &str, base_url: &str) -> ProductDetail {
    let mut detail = ProductDetail::default();

    match preloaded_state(html) {
        PreloadedState::Found(state) => {
            detail.state = StateStatus::Found;
            if let Some(pdp) = state.pointer("/ui/pdp/bffPdp/bffData") {
                read_pdp(pdp, &mut detail);
            }
        }
        PreloadedState::Malformed(reason) => {
            tracing::debug!(%reason, "embedded page state did not parse");
            detail.state = StateStatus::Malformed;
        }
        PreloadedState::Missing => {}
    }

    if detail.images.is_empty() {
        detail.images = fallback_images(html, base_url);
    }
    detail
}

fn read_pdp(pdp: &Value, detail: &mut ProductDetail) {
    let snippets = pdp.get("snippets").and_then(Value::as_array);
    let expanded = pdp
        .pointer("/snippet_list_updater_data/expand_attributes/payload/snippets_to_add")
        .and_then(Value::as_array);
    let seo = pdp.pointer("/tracking/le_meta/custom_data/seo");
    let attributes = seo
        .and_then(|s| s.get("attributes"))
        .and_then(Value::as_array);

    let mut images = Vec::new();
    for data in snippets.into_iter().flatten().filter_map(snippet_data) {
        if detail.name.is_none() {
            detail.name = data
                .get("title")
                .and_then(|t| t.get("text"))
                .and_then(Value::as_str)
                .and_then(non_blank);
        }
        for list in MEDIA_LIST_KEYS
            .iter()
            .filter_map(|key| data.get(*key).and_then(Value::as_array))
        {
            images.extend(list.iter().filter_map(media_image_url));
        }
    }
    detail.images = dedupe(images);

    if detail.name.is_none() {
        detail.name = seo
            .and_then(|s| s.get("product_name"))
            .and_then(Value::as_str)
            .and_then(non_blank);
    }

    let mut rows: Vec<ListedNutrient> = expanded
        .into_iter()
        .flatten()
        .filter_map(snippet_data)
        .filter_map(snippet_pair)
        .chain(attributes.into_iter().flatten().filter_map(attribute_pair))
        .filter(|(label, value)| is_nutrition_row(label, value))
        .map(|(label, value)| ListedNutrient { label, value })
        .collect();
    let mut seen = HashSet::new();
    rows.retain(|row| seen.insert((row.label.to_lowercase(), row.value.clone())));
    detail.listed_nutrition = rows;

    let mut sections = Sections::default();
    for (label, value) in expanded
        .into_iter()
        .chain(snippets)
        .flatten()
        .filter_map(snippet_data)
        .filter_map(snippet_pair)
    {
        sections.offer(&label, &value);
    }
    for attr in attributes.into_iter().flatten() {
        if let (Some(label), Some(value)) = (attribute_label(attr), attribute_text(attr)) {
            sections.offer(&label, &value);
        }
    }
    detail.ingredients = sections.ingredients;
    detail.description = sections.description;
    detail.fssai_license = sections.fssai_license;
}

#[derive(Default)]
struct Sections {
    ingredients: Option<String>,
    description: Option<String>,
    fssai_license: Option<String>,
}

impl Sections {
    /// First match per section wins.
    fn offer(&mut self, label: &str, value: &str) {
        let label = label.to_lowercase();
        let slots: [(&[&str], &mut Option<String>); 3] = [
            (&["ingredient"], &mut self.ingredients),
            (
                &["description", "about", "product description"],
                &mut self.description,
            ),
            (&["fssai"], &mut self.fssai_license),
        ];
        for (keywords, slot) in slots {
            if slot.is_none() && keywords.iter().any(|k| label.contains(k)) {
                *slot = Some(value.to_owned());
            }
        }
    }
}

fn snippet_data(snippet: &Value) -> Option<&Value> {
    snippet.get("data").filter(|d| d.is_object())
}

/// `(title, subtitle | description)` of a snippet, both non-blank.
fn snippet_pair(data: &Value) -> Option<(String, String)> {
    let title = text_of(data.get("title"))?;
    let value = text_of(data.get("subtitle")).or_else(|| text_of(data.get("description")))?;
    Some((title, value))
}

fn attribute_label(attr: &Value) -> Option<String> {
    ["name", "attribute_name"]
        .iter()
        .find_map(|key| attr.get(*key).and_then(Value::as_str).and_then(non_blank))
}

fn attribute_pair(attr: &Value) -> Option<(String, String)> {
    let value = attr.get("value").and_then(Value::as_str).and_then(non_blank)?;
    Some((attribute_label(attr)?, value))
}

/// The attribute's `value`, else the first non-blank `value_info[].value`.
fn attribute_text(attr: &Value) -> Option<String> {
    attr.get("value")
        .and_then(Value::as_str)
        .and_then(non_blank)
        .or_else(|| {
            attr.get("value_info")
                .and_then(Value::as_array)?
                .iter()
                .find_map(|info| info.get("value").and_then(Value::as_str).and_then(non_blank))
        })
}

fn is_nutrition_row(label: &str, value: &str) -> bool {
    let label = label.to_lowercase();
    let keyword_hit = NUTRITION_KEYWORDS.iter().any(|k| label.contains(k));
    let has_digits = value.chars().any(|c| c.is_ascii_digit());
    keyword_hit && (label.contains("per") || has_digits)
}

/// A string, or an object's `text` field, trimmed and non-blank.
fn text_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => non_blank(s),
        Value::Object(map) => text_of(map.get("text")),
        _ => None,
    }
}

fn non_blank(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

fn media_image_url(item: &Value) -> Option<String> {
    let data = item.get("data").unwrap_or(item);
    let media = data.get("media_content")?;
    if media.get("media_type").and_then(Value::as_str) != Some("image") {
        return None;
    }
    media
        .pointer("/image/url")
        .and_then(Value::as_str)
        .and_then(coerce_url)
}

/// Protocol-relative URLs become `https:`.
fn coerce_url(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        None
    } else if url.starts_with("//") {
        Some(format!("https:{url}"))
    } else {
        Some(url.to_owned())
    }
}

fn fallback_images(html: &str, base_url: &str) -> Vec<String> {
    let base = reqwest::Url::parse(base_url).ok();
    let document = Html::parse_document(html);
    let og = document
        .select(&OG_IMAGE_SELECTOR)
        .filter_map(|meta| meta.value().attr("content"));
    let imgs = document
        .select(&IMG_SELECTOR)
        .filter_map(|img| img.value().attr("src"))
        .filter(|src| src.contains("/product/"));
    dedupe(
        og.chain(imgs)
            .filter_map(coerce_url)
            .map(|url| resolve(base.as_ref(), &url))
            .collect(),
    )
}

fn dedupe(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

#[cfg(test)]
#[path = "detail_test.rs"]
mod tests;
