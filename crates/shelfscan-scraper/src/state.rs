//! Locating the storefront's embedded `PRELOADED_STATE` blob in page HTML.

use serde_json::Value;

const STATE_MARKER: &str = "window.grofers.PRELOADED_STATE";

#[derive(Debug)]
pub(crate) enum PreloadedState {
    Missing,
    /// The assignment was found but its right-hand side did not parse.
    Malformed(String),
    Found(Value),
}

/// Finds the first `window.grofers.PRELOADED_STATE = ...` assignment and
/// parses its value. Both a literal object and the `JSON.parse("...")` form
/// are accepted; trailing script after the value is ignored.
pub(crate) fn preloaded_state(html: &str) -> PreloadedState {
    let Some(rhs) = html.match_indices(STATE_MARKER).find_map(|(idx, _)| {
        let rest = html[idx + STATE_MARKER.len()..].trim_start();
        let rest = rest.strip_prefix('=')?;
        if rest.starts_with('=') {
            return None;
        }
        Some(rest.trim_start())
    }) else {
        return PreloadedState::Missing;
    };

    let parsed = if let Some(inner) = rhs.strip_prefix("JSON.parse(") {
        first_json_value::<String>(inner)
            .and_then(|encoded| serde_json::from_str::<Value>(&encoded).map_err(|e| e.to_string()))
    } else {
        first_json_value::<Value>(rhs)
    };

    match parsed {
        Ok(value) if value.is_object() => PreloadedState::Found(value),
        Ok(_) => PreloadedState::Malformed("state is not a JSON object".to_owned()),
        Err(reason) => PreloadedState::Malformed(reason),
    }
}

fn first_json_value<T: serde::de::DeserializeOwned>(input: &str) -> Result<T, String> {
    match serde_json::Deserializer::from_str(input).into_iter::<T>().next() {
        Some(Ok(value)) => Ok(value),
        Some(Err(e)) => Err(e.to_string()),
        None => Err("no value after assignment".to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_when_marker_absent() {
        assert!(matches!(
            preloaded_state("<script>window.other = {}</script>"),
            PreloadedState::Missing
        ));
    }

    #[test]
    fn skips_comparisons_and_reads_assignment() {
        let html = r#"<script>if (window.grofers.PRELOADED_STATE == null) {}</script>
            <script>window.grofers.PRELOADED_STATE = {"ui": {"pdp": {}}};
            window.grofers.other = 1;</script>"#;
        let PreloadedState::Found(value) = preloaded_state(html) else {
            panic!("expected state");
        };
        assert!(value.pointer("/ui/pdp").is_some());
    }

    #[test]
    fn accepts_json_parse_form() {
        let html = r#"<script>window.grofers.PRELOADED_STATE = JSON.parse("{\"ui\":{\"pdp\":{\"x\":1}}}");</script>"#;
        let PreloadedState::Found(value) = preloaded_state(html) else {
            panic!("expected state");
        };
        assert_eq!(value.pointer("/ui/pdp/x"), Some(&Value::from(1)));
    }

    #[test]
    fn malformed_when_value_does_not_parse() {
        let html = "<script>window.grofers.PRELOADED_STATE = {ui: undefined};</script>";
        assert!(matches!(
            preloaded_state(html),
            PreloadedState::Malformed(_)
        ));
    }

    #[test]
    fn malformed_when_value_is_not_an_object() {
        let html = "<script>window.grofers.PRELOADED_STATE = [1, 2];</script>";
        assert!(matches!(
            preloaded_state(html),
            PreloadedState::Malformed(_)
        ));
    }
}
