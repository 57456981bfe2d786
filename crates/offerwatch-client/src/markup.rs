use offerwatch_core::error::AppError;
use offerwatch_core::models::{ExtractionRule, FieldMatch};
use offerwatch_core::traits::MarkupExtractor;
use scraper::{ElementRef, Html, Selector};

/// [`MarkupExtractor`] over HTML using CSS selectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScraperMarkup;

impl ScraperMarkup {
    pub fn new() -> Self {
        Self
    }
}

impl MarkupExtractor for ScraperMarkup {
    fn select(&self, content: &str, rule: &ExtractionRule) -> Result<Vec<FieldMatch>, AppError> {
        // html5ever accepts anything, so reject content that cannot be markup.
        if content.trim().is_empty() {
            return Err(AppError::ParseError("Empty document".into()));
        }
        if !content.contains('<') {
            return Err(AppError::ParseError("Content is not HTML".into()));
        }

        let container = parse_selector(&rule.container)?;
        let title = parse_group(&rule.title)?;
        let price = parse_group(&rule.price)?;
        let description = parse_group(&rule.description)?;

        let document = Html::parse_document(content);
        Ok(document
            .select(&container)
            .map(|element| FieldMatch {
                title: first_text(&element, title.as_ref()),
                price: first_text(&element, price.as_ref()),
                description: first_text(&element, description.as_ref()),
            })
            .collect())
    }
}

fn parse_selector(raw: &str) -> Result<Selector, AppError> {
    Selector::parse(raw).map_err(|e| AppError::ParseError(format!("Invalid selector '{raw}': {e}")))
}

/// One selector group matching any of a field's selectors.
///
/// Each selector is validated on its own so the error names the bad one.
fn parse_group(raw: &[String]) -> Result<Option<Selector>, AppError> {
    if raw.is_empty() {
        return Ok(None);
    }
    for selector in raw {
        parse_selector(selector)?;
    }
    parse_selector(&raw.join(", ")).map(Some)
}

/// Text of the first descendant, in document order, matching the group.
///
/// A blank first match leaves the field empty; later matches are not tried.
fn first_text(element: &ElementRef<'_>, group: Option<&Selector>) -> Option<String> {
    let first = element.select(group?).next()?;
    let text = normalize(first.text());
    (!text.is_empty()).then_some(text)
}

fn normalize<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
