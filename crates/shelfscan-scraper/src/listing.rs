use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use shelfscan_core::{slugify, ListingDiagnostics, ListingEntry};

static CARD_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("#plpContainer div[role='button'][id]").expect("valid card selector")
});
static NAME_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".tw-text-300.tw-font-semibold").expect("valid name selector")
});
static IMG_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("valid img selector"));
static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid anchor selector"));

/// Product entries found on a listing page plus counters for skipped cards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub entries: Vec<ListingEntry>,
    pub diagnostics: ListingDiagnostics,
}

/// Extracts product cards from a listing document, in document order.
///
/// Cards without a name or without a `/product/` image are skipped and
/// counted. When a card carries no link, one is synthesized from its name and
/// id as `/prn/<slug>/prid/<id>`. Relative URLs resolve against `base_url`.
/// Unrecognized markup yields an empty page rather than an error.
#[must_use]
pub fn parse_listing(html: &str, base_url: &str) -> ListingPage {
    let base = reqwest::Url::parse(base_url).ok();
    let document = Html::parse_document(html);
    let mut page = ListingPage::default();

    for card in document.select(&CARD_SELECTOR) {
        page.diagnostics.cards_seen += 1;

        let Some(name) = card
            .select(&NAME_SELECTOR)
            .next()
            .map(|node| collapse_whitespace(&node.text().collect::<String>()))
            .filter(|name| !name.is_empty())
        else {
            page.diagnostics.skipped_without_name += 1;
            continue;
        };

        let Some(hero_image_url) = card
            .select(&IMG_SELECTOR)
            .filter_map(|img| img.value().attr("src"))
            .map(str::trim)
            .find(|src| src.contains("/product/"))
            .map(|src| resolve(base.as_ref(), src))
        else {
            page.diagnostics.skipped_without_image += 1;
            continue;
        };

        let card_id = card
            .value()
            .attr("id")
            .map(str::trim)
            .filter(|id| !id.is_empty());

        let detail_url = if let Some(href) = card_link(card) {
            resolve(base.as_ref(), href)
        } else {
            page.diagnostics.synthesized_links += 1;
            let id = card_id.unwrap_or_default();
            resolve(base.as_ref(), &format!("/prn/{}/prid/{id}", slugify(&name)))
        };

        let product_id = prid_from_url(&detail_url).or_else(|| {
            card_id
                .filter(|id| id.chars().all(|c| c.is_ascii_digit()))
                .map(str::to_owned)
        });

        page.entries.push(ListingEntry {
            name,
            hero_image_url,
            detail_url,
            product_id,
        });
    }

    if page.entries.is_empty() {
        tracing::debug!(
            cards_seen = page.diagnostics.cards_seen,
            "listing parse found no usable product cards"
        );
    }
    page
}

/// The href of an anchor wrapping the card, else the first anchor inside it.
fn card_link(card: ElementRef<'_>) -> Option<&str> {
    let wrapping = card
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "a" && el.value().attr("href").is_some())
        .and_then(|el| el.value().attr("href"));
    wrapping
        .or_else(|| {
            card.select(&ANCHOR_SELECTOR)
                .next()
                .and_then(|a| a.value().attr("href"))
        })
        .map(str::trim)
        .filter(|href| !href.is_empty() && !href.starts_with('#'))
}

/// Builds entries from a plain list of product URLs, one per line.
///
/// Blank lines and `#` comments are skipped, duplicates dropped. Names and
/// hero images are unknown until the detail page is read, so both start empty.
#[must_use]
pub fn entries_from_url_list(text: &str, base_url: &str) -> Vec<ListingEntry> {
    let base = reqwest::Url::parse(base_url).ok();
    let mut seen = HashSet::new();
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| resolve(base.as_ref(), line))
        .filter(|url| seen.insert(url.clone()))
        .map(|url| ListingEntry {
            name: String::new(),
            hero_image_url: String::new(),
            product_id: prid_from_url(&url),
            detail_url: url,
        })
        .collect()
}

/// Numeric product id from a `/prid/<id>` path segment.
pub(crate) fn prid_from_url(url: &str) -> Option<String> {
    let rest = url.split("/prid/").nth(1)?;
    let id: String = rest.chars().take_while(char::is_ascii_digit).collect();
    (!id.is_empty()).then_some(id)
}

pub(crate) fn resolve(base: Option<&reqwest::Url>, href: &str) -> String {
    base.and_then(|b| b.join(href).ok())
        .map_or_else(|| href.to_owned(), String::from)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
#[path = "listing_test.rs"]
mod tests;
