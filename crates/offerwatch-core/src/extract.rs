use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::{
    FieldMatch, MAX_DESCRIPTION_LEN, MAX_PRICE_LEN, MAX_TITLE_LEN, Offer, Source, truncate_chars,
};
use crate::traits::MarkupExtractor;

/// Turns fetched markup into validated, length-bounded [`Offer`]s.
#[derive(Clone)]
pub struct OfferExtractor<M: MarkupExtractor> {
    markup: M,
}

impl<M: MarkupExtractor> OfferExtractor<M> {
    pub fn new(markup: M) -> Self {
        Self { markup }
    }

    /// Extract every valid offer from `content` using the source's rule.
    ///
    /// Container matches without a title, or without both price and
    /// description, are dropped silently. Unparseable content is an
    /// [`AppError::ParseError`].
    pub fn extract(&self, source: &Source, content: &str) -> Result<Vec<Offer>, AppError> {
        let matches = self.markup.select(content, &source.rule)?;
        let observed_at = Utc::now();

        let total = matches.len();
        let offers: Vec<Offer> = matches
            .into_iter()
            .filter_map(|m| build_offer(source, m, observed_at))
            .collect();

        tracing::debug!(
            source = %source.name,
            matches = total,
            offers = offers.len(),
            "Extracted offers"
        );
        Ok(offers)
    }
}

/// Validate one container match and build an offer from it.
fn build_offer(source: &Source, fields: FieldMatch, observed_at: DateTime<Utc>) -> Option<Offer> {
    let title = non_blank(fields.title)?;
    let price = non_blank(fields.price);
    let description = non_blank(fields.description);
    if price.is_none() && description.is_none() {
        return None;
    }

    Some(Offer {
        source_name: source.name.clone(),
        title: truncate_chars(&title, MAX_TITLE_LEN),
        price: price.map(|p| truncate_chars(&p, MAX_PRICE_LEN)),
        description: description.map(|d| truncate_chars(&d, MAX_DESCRIPTION_LEN)),
        source_location: source.location.clone(),
        observed_at,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockMarkup;

    fn source() -> Source {
        Source::new("Hotel1", "https://hotel1.example/")
    }

    fn fields(title: Option<&str>, price: Option<&str>, description: Option<&str>) -> FieldMatch {
        FieldMatch {
            title: title.map(String::from),
            price: price.map(String::from),
            description: description.map(String::from),
        }
    }

    #[test]
    fn builds_offer_with_source_details() {
        let extractor = OfferExtractor::new(MockMarkup::new(vec![fields(
            Some("  Summer Deal "),
            Some("$100"),
            None,
        )]));

        let offers = extractor.extract(&source(), "<html></html>").unwrap();

        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].source_name, "Hotel1");
        assert_eq!(offers[0].title, "Summer Deal");
        assert_eq!(offers[0].price.as_deref(), Some("$100"));
        assert_eq!(offers[0].description, None);
        assert_eq!(offers[0].source_location, "https://hotel1.example/");
    }

    #[test]
    fn drops_matches_missing_required_fields() {
        let extractor = OfferExtractor::new(MockMarkup::new(vec![
            fields(None, Some("$100"), Some("no title")),
            fields(Some("   "), Some("$100"), None),
            fields(Some("Title only"), None, None),
            fields(Some("Blank rest"), Some(" "), Some("")),
            fields(Some("Kept"), None, Some("Breakfast included")),
        ]));

        let offers = extractor.extract(&source(), "<html></html>").unwrap();

        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].title, "Kept");
        assert_eq!(offers[0].price, None);
    }

    #[test]
    fn truncates_long_fields() {
        let extractor = OfferExtractor::new(MockMarkup::new(vec![fields(
            Some(&"t".repeat(150)),
            Some(&"p".repeat(80)),
            Some(&"d".repeat(300)),
        )]));

        let offer = extractor.extract(&source(), "<html></html>").unwrap().remove(0);

        assert_eq!(offer.title.chars().count(), MAX_TITLE_LEN);
        assert_eq!(offer.price.unwrap().chars().count(), MAX_PRICE_LEN);
        assert_eq!(offer.description.unwrap().chars().count(), MAX_DESCRIPTION_LEN);
    }

    #[test]
    fn parse_error_propagates() {
        let extractor =
            OfferExtractor::new(MockMarkup::with_error(AppError::ParseError("empty".into())));

        let err = extractor.extract(&source(), "").unwrap_err();
        assert!(matches!(err, AppError::ParseError(_)));
    }
}
