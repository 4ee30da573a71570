use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::config::ExtractionRule;
use crate::error::RankscanError;

/// What a profile page yielded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Rank(i64),
    /// The rank label is not on the page.
    LabelAbsent,
    /// The label is present but nothing follows it.
    ValueAbsent,
    /// The value next to the label is not an integer. Carries the raw text.
    InvalidRank(String),
}

impl Extraction {
    pub fn rank(&self) -> Option<i64> {
        match self {
            Extraction::Rank(rank) => Some(*rank),
            _ => None,
        }
    }
}

pub trait RankExtractor: Send + Sync {
    fn extract(&self, document: &str) -> Extraction;
}

/// Finds `label` among the `label_selector` elements inside each
/// `container_selector` element and reads the rank from the element that
/// immediately follows it.
#[derive(Debug)]
pub struct HtmlRankExtractor {
    container: Selector,
    label: Selector,
    label_text: String,
    delimiter: String,
}

impl HtmlRankExtractor {
    pub fn new(rule: &ExtractionRule) -> Result<Self, RankscanError> {
        Ok(Self {
            container: parse_selector(&rule.container_selector)?,
            label: parse_selector(&rule.label_selector)?,
            label_text: normalize_text(&rule.label),
            delimiter: rule.delimiter.clone(),
        })
    }
}

impl RankExtractor for HtmlRankExtractor {
    fn extract(&self, document: &str) -> Extraction {
        let html = Html::parse_document(document);
        let matching_label = html
            .select(&self.container)
            .flat_map(|container| container.select(&self.label))
            .find(|label| normalize_text(&element_text(label)) == self.label_text);

        let Some(label) = matching_label else {
            return Extraction::LabelAbsent;
        };
        let Some(value) = label.next_siblings().find_map(ElementRef::wrap) else {
            return Extraction::ValueAbsent;
        };
        parse_rank(&element_text(&value), &self.delimiter)
    }
}

/// Strips one trailing `delimiter` and parses the rest as a base-10 integer.
pub fn parse_rank(raw: &str, delimiter: &str) -> Extraction {
    let trimmed = raw.trim();
    let value = if delimiter.is_empty() {
        trimmed
    } else {
        trimmed.strip_suffix(delimiter).unwrap_or(trimmed)
    };
    match value.trim().parse::<i64>() {
        Ok(rank) => Extraction::Rank(rank),
        Err(_) => Extraction::InvalidRank(value.to_string()),
    }
}

fn parse_selector(selector: &str) -> Result<Selector, RankscanError> {
    Selector::parse(selector).map_err(|err| RankscanError::InvalidSelector {
        selector: selector.to_string(),
        message: err.to_string(),
    })
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect()
}

fn normalize_text(text: &str) -> String {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    let whitespace =
        WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("static whitespace pattern is valid"));
    whitespace.replace_all(text.trim(), " ").into_owned()
}
