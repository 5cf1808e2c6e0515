//! Deterministic mapping from OCR'd label text to nutrition fields.
//!
//! Each nutrient has a label pattern; the first line (across pages, in order)
//! whose label is directly followed by an amount wins. Values may also sit on
//! the line after a bare label, as in two-column tables. Percent-of-RDA
//! columns and "per 100 g" basis phrases are ignored.

use std::sync::LazyLock;

use regex::Regex;
use shelfscan_core::{NutrientValue, NutritionFields};

use crate::engine::TextAnnotation;

static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:[.,]\d+)?)\s*(?:(kcal|kj|mcg|mg|µg|μg|gm|g)\b)?(\s*%)?")
        .expect("valid amount regex")
});
static BASIS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bper\s+(?:\d+(?:[.,]\d+)?\s*(?:g|gm|ml)\b|serving\b)")
        .expect("valid basis regex")
});
static LABEL_UNIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[\s:\-]*\(\s*(kcal|kj|mcg|mg|µg|μg|gm|g)\s*\)").expect("valid label unit regex")
});

struct Rule {
    name: &'static str,
    label: Regex,
    exclude: Option<Regex>,
    prefer_kcal: bool,
}

impl Rule {
    fn new(name: &'static str, label: &str) -> Self {
        Self {
            name,
            label: Regex::new(&format!("(?i){label}")).expect("valid nutrient label regex"),
            exclude: None,
            prefer_kcal: false,
        }
    }

    fn excluding(mut self, pattern: &str) -> Self {
        self.exclude =
            Some(Regex::new(&format!("(?i){pattern}")).expect("valid nutrient exclude regex"));
        self
    }
}

/// A fat qualifier with its optional trailing "fat" or "fatty acids".
fn fat_label(qualifier: &str) -> String {
    format!(r"\b{qualifier}(?:\s+fat(?:ty\s+acids?|s)?)?\b")
}

/// More specific labels come before the general ones they contain.
static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    let mut energy = Rule::new("energy", r"\b(?:energy|calories|calorie)\b");
    energy.prefer_kcal = true;
    vec![
        energy,
        Rule::new("protein", r"\bproteins?\b"),
        Rule::new("carbohydrate", r"\b(?:total\s+)?(?:carbohydrates?|carbs)\b"),
        Rule::new("added_sugars", r"\badded\s+sugars?\b"),
        Rule::new("total_sugars", r"\b(?:total\s+)?sugars?\b").excluding(r"\badded\b"),
        Rule::new("dietary_fiber", r"\b(?:dietary\s+)?fib(?:re|er)s?\b"),
        Rule::new("saturated_fat", &fat_label(r"saturated")),
        Rule::new("trans_fat", &fat_label(r"trans")),
        Rule::new("monounsaturated_fat", &fat_label(r"mono-?\s*unsaturated")),
        Rule::new("polyunsaturated_fat", &fat_label(r"poly-?\s*unsaturated")),
        Rule::new("total_fat", r"\b(?:total\s+)?fats?\b")
            .excluding(r"saturated|\btrans\b"),
        Rule::new("cholesterol", r"\bcholesterol\b"),
        Rule::new("sodium", r"\bsodium\b"),
        Rule::new("potassium", r"\bpotassium\b"),
        Rule::new("calcium", r"\bcalcium\b"),
        Rule::new("iron", r"\biron\b"),
    ]
});

static SERVING_SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bserving\s+size\b").expect("valid serving size regex"));

/// Maps OCR pages to nutrition fields. Never fails; unknown text yields an
/// empty map.
#[must_use]
pub fn extract_nutrition(pages: &[TextAnnotation]) -> NutritionFields {
    let mut fields = NutritionFields::new();
    for page in pages {
        let lines: Vec<&str> = page
            .description
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        for rule in RULES.iter() {
            if fields.contains_key(rule.name) {
                continue;
            }
            if let Some(value) = find_value(rule, &lines) {
                fields.insert(rule.name.to_owned(), value);
            }
        }

        if !fields.contains_key("serving_size") {
            if let Some(size) = lines.iter().find_map(|line| serving_size(line)) {
                fields.insert("serving_size".to_owned(), NutrientValue::Text(size));
            }
        }
    }
    fields
}

fn find_value(rule: &Rule, lines: &[&str]) -> Option<NutrientValue> {
    for (idx, line) in lines.iter().enumerate() {
        let Some(label) = rule.label.find(line) else {
            continue;
        };
        if rule.exclude.as_ref().is_some_and(|ex| ex.is_match(line)) {
            continue;
        }

        let rest = BASIS_RE.replace_all(&line[label.end()..], " ");
        let (label_unit, rest) = split_label_unit(&rest);
        let rest = trim_leading_junk(rest);

        let candidate = if rest.is_empty() {
            lines
                .get(idx + 1)
                .map(|next| trim_leading_junk(next))
                .filter(|next| next.starts_with(|c: char| c.is_ascii_digit()))
        } else {
            Some(rest)
        };

        if let Some(value) = candidate
            .filter(|text| text.starts_with(|c: char| c.is_ascii_digit()))
            .and_then(|text| read_amount(text, label_unit.as_deref(), rule.prefer_kcal))
        {
            return Some(value);
        }
    }
    None
}

fn split_label_unit(rest: &str) -> (Option<String>, &str) {
    match LABEL_UNIT_RE.captures(rest) {
        Some(caps) => {
            let unit = caps.get(1).map(|m| normalize_unit(m.as_str()));
            let end = caps.get(0).map_or(0, |m| m.end());
            (unit, &rest[end..])
        }
        None => (None, rest),
    }
}

fn trim_leading_junk(text: &str) -> &str {
    text.trim_start_matches(|c: char| c.is_whitespace() || ":-–=*|()<~".contains(c))
}

fn read_amount(text: &str, label_unit: Option<&str>, prefer_kcal: bool) -> Option<NutrientValue> {
    let amounts: Vec<(f64, Option<String>)> = AMOUNT_RE
        .captures_iter(text)
        .filter(|caps| caps.get(3).is_none())
        .filter_map(|caps| {
            let amount = caps.get(1)?.as_str().replace(',', ".").parse::<f64>().ok()?;
            let unit = caps.get(2).map(|m| normalize_unit(m.as_str()));
            Some((amount, unit))
        })
        .collect();

    let chosen = if prefer_kcal {
        amounts
            .iter()
            .find(|(_, unit)| unit.as_deref() == Some("kcal"))
            .or_else(|| amounts.first())
    } else {
        amounts.first()
    }?;

    let unit = chosen.1.as_deref().or(label_unit);
    Some(NutrientValue::amount(chosen.0, unit))
}

fn serving_size(line: &str) -> Option<String> {
    let label = SERVING_SIZE_RE.find(line)?;
    let rest = trim_leading_junk(&line[label.end()..]).trim_end();
    (!rest.is_empty()).then(|| rest.to_owned())
}

fn normalize_unit(unit: &str) -> String {
    match unit.to_lowercase().as_str() {
        "kj" => "kJ".to_owned(),
        "µg" | "μg" => "mcg".to_owned(),
        "gm" => "g".to_owned(),
        other => other.to_owned(),
    }
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
