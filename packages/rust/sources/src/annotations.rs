//! `[[Tag: value]]` annotations embedded in free-text notes.
//!
//! Brewing logs have no columns for attributes such as the style id or the
//! public flag, so they are written into comment fields as tags. [`Annotations`]
//! maps tag names to raw strings; callers pick the typed accessor they need.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use brewsync_shared::Step;

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[([A-Za-z][A-Za-z0-9_-]*) *: *([^\]]*)\]\]").expect("valid tag regex")
});

static ANY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[[^\]]*\]\]\n?").expect("valid strip regex"));

/// Fermentation schedule used when a recipe does not annotate one.
const DEFAULT_FERMENTATION: (&str, f64, f64) = ("Primary", 10.0, 18.0);

/// Tags found in a text, keyed by lower-cased tag name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotations {
    tags: HashMap<String, String>,
}

impl Annotations {
    /// Scan `text` for tags. A tag given more than once keeps its last value.
    pub fn parse(text: &str) -> Self {
        let mut tags = HashMap::new();
        for caps in TAG.captures_iter(text) {
            tags.insert(caps[1].to_lowercase(), caps[2].trim().to_string());
        }
        Self { tags }
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Raw value of a tag.
    pub fn raw(&self, tag: &str) -> Option<&str> {
        self.tags.get(&tag.to_lowercase()).map(String::as_str)
    }

    /// Non-empty string value.
    pub fn text(&self, tag: &str) -> Option<String> {
        self.raw(tag).filter(|v| !v.is_empty()).map(str::to_string)
    }

    /// Boolean value; anything but a yes-word is `false`.
    pub fn flag(&self, tag: &str) -> bool {
        self.raw(tag).is_some_and(|v| {
            matches!(
                v.to_lowercase().as_str(),
                "1" | "true" | "y" | "yes" | "ja"
            )
        })
    }

    /// Numeric value, accepting a decimal comma.
    ///
    /// A value that does not parse is logged and treated as absent.
    pub fn number(&self, tag: &str) -> Option<f64> {
        let raw = self.raw(tag)?;
        match raw.replace(',', ".").parse::<f64>() {
            Ok(v) => Some(v),
            Err(e) => {
                debug!(tag, value = raw, error = %e, "ignoring non-numeric annotation");
                None
            }
        }
    }

    /// Fermentation schedule from `[[Fermentation: Name:days@temp,...]]`.
    ///
    /// Malformed stages are skipped. Without any valid stage the schedule is
    /// a single 10-day primary at 18 °C.
    pub fn fermentation_steps(&self) -> Vec<Step> {
        let mut steps = Vec::new();
        if let Some(raw) = self.raw("Fermentation") {
            for stage in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                match parse_stage(stage) {
                    Some((name, days, temperature)) => steps.push(Step {
                        order: steps.len() as u32,
                        name,
                        temperature,
                        time: days,
                    }),
                    None => debug!(stage, "ignoring malformed fermentation stage"),
                }
            }
        }
        if steps.is_empty() {
            let (name, days, temperature) = DEFAULT_FERMENTATION;
            steps.push(Step {
                order: 0,
                name: name.to_string(),
                temperature,
                time: days,
            });
        }
        steps
    }
}

/// `Name:days@temp` → (name, days, temperature).
fn parse_stage(stage: &str) -> Option<(String, f64, f64)> {
    let (name, rest) = stage.rsplit_once(':')?;
    let (days, temperature) = rest.split_once('@')?;
    let days = days.trim().replace(',', ".").parse().ok()?;
    let temperature = temperature.trim().replace(',', ".").parse().ok()?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), days, temperature))
}

/// Remove every tag (and the line break following it) from `text`.
pub fn strip(text: &str) -> String {
    ANY_TAG.replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTES: &str = "Hoppy session ale.\n\
        [[BJCP-Style: 18B]]\n\
        [[Public: yes]]\n\
        Brewed for the summer party.\n\
        [[Kettle-Losses: 1,5]]\n\
        [[BJCP-Style: 21A]]\n";

    #[test]
    fn last_occurrence_wins() {
        let tags = Annotations::parse(NOTES);
        assert_eq!(tags.text("BJCP-Style").as_deref(), Some("21A"));
    }

    #[test]
    fn typed_accessors() {
        let tags = Annotations::parse(NOTES);
        assert!(tags.flag("Public"));
        assert!(!tags.flag("Missing"));
        assert_eq!(tags.number("Kettle-Losses"), Some(1.5));
        assert_eq!(tags.text("Image"), None);
    }

    #[test]
    fn flags_accept_german_yes() {
        assert!(Annotations::parse("[[Public: ja]]").flag("public"));
        assert!(!Annotations::parse("[[Public: nein]]").flag("Public"));
    }

    #[test]
    fn malformed_number_is_absent() {
        let tags = Annotations::parse("[[Kettle-Losses: lots]]");
        assert_eq!(tags.number("Kettle-Losses"), None);
        assert_eq!(tags.raw("Kettle-Losses"), Some("lots"));
    }

    #[test]
    fn strip_removes_tags_and_their_line_breaks() {
        assert_eq!(
            strip(NOTES),
            "Hoppy session ale.\nBrewed for the summer party.\n"
        );
        assert_eq!(strip("inline [[Public: 1]] tag"), "inline  tag");
    }

    #[test]
    fn fermentation_schedule() {
        let tags = Annotations::parse("[[Fermentation: Primary:10@18, Secondary:5@15.5]]");
        let steps = tags.fermentation_steps();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].name, "Primary");
        assert_eq!(steps[0].time, 10.0);
        assert_eq!(steps[0].temperature, 18.0);
        assert_eq!(steps[1].order, 1);
        assert_eq!(steps[1].temperature, 15.5);
    }

    #[test]
    fn fermentation_default_and_malformed_stages() {
        let default = Annotations::default().fermentation_steps();
        assert_eq!(default.len(), 1);
        assert_eq!(default[0].name, "Primary");
        assert_eq!(default[0].time, 10.0);
        assert_eq!(default[0].temperature, 18.0);

        let tags = Annotations::parse("[[Fermentation: warm@20, Cold:14@2]]");
        let steps = tags.fermentation_steps();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].name, "Cold");
        assert_eq!(steps[0].order, 0);
    }
}
