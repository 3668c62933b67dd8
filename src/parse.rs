use regex::Regex;

use crate::Result;

/// Matches one listing row: timestamp, service, region and message cells, in that order.
/// The class attribute of the service and message cells varies per service, so it is not pinned.
const ROW_PATTERN: &str = r#"<td class="DT">(\d{2}-\d{2}-\d{4} \d{2}:\d{2}:\d{2})</td><td class=".*?">(.*?)</td><td class="Regio">(.*?)</td><td class=".*?">(.*?)</td>"#;

/// One dispatch event as it appeared on the listing.
/// Every field is the raw captured text, no trimming or entity decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestRecord {
    /// `DD-MM-YYYY HH:MM:SS`, as rendered by the upstream.
    pub timestamp: String,
    pub service: String,
    pub region: String,
    pub message: String,
}

/// Pulls `HarvestRecord`s out of a listing page.
#[derive(Debug, Clone)]
pub struct RowExtractor {
    pattern: Regex,
}

impl RowExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(ROW_PATTERN)?,
        })
    }

    /// Returns every row on the page in document order.
    /// An empty `Vec` means the page holds no rows, which marks the end of the listing.
    pub fn extract(&self, html: &str) -> Vec<HarvestRecord> {
        self.pattern
            .captures_iter(html)
            .map(|caps| {
                let (_, [timestamp, service, region, message]) = caps.extract();
                HarvestRecord {
                    timestamp: timestamp.to_string(),
                    service: service.to_string(),
                    region: region.to_string(),
                    message: message.to_string(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const ROW: &str = r#"<td class="DT">01-01-2026 22:43:11</td><td class="Br">Brandweer</td><td class="Regio">Brabant Noord</td><td class="Mdx">A1 Ongeval A58</td>"#;

    fn record(ts: &str, service: &str, region: &str, message: &str) -> HarvestRecord {
        HarvestRecord {
            timestamp: ts.into(),
            service: service.into(),
            region: region.into(),
            message: message.into(),
        }
    }

    #[test]
    fn extracts_single_row() {
        let extractor = RowExtractor::new().unwrap();
        assert_eq!(
            extractor.extract(ROW),
            vec![record(
                "01-01-2026 22:43:11",
                "Brandweer",
                "Brabant Noord",
                "A1 Ongeval A58"
            )]
        );
    }

    #[test]
    fn keeps_document_order_and_ignores_noise() {
        let html = format!(
            r#"<html><table><tr>{ROW}</tr>
<tr><td colspan="4">advertentie</td></tr>
<tr><td class="DT">02-01-2026 01:02:03</td><td class="Am">Ambulance</td><td class="Regio">Utrecht</td><td class="Mdx">A2 &amp; rit</td></tr>
</table></html>"#
        );
        let extractor = RowExtractor::new().unwrap();
        assert_eq!(
            extractor.extract(&html),
            vec![
                record(
                    "01-01-2026 22:43:11",
                    "Brandweer",
                    "Brabant Noord",
                    "A1 Ongeval A58"
                ),
                record("02-01-2026 01:02:03", "Ambulance", "Utrecht", "A2 &amp; rit"),
            ]
        );
    }

    #[test]
    fn captures_are_not_trimmed() {
        let html = r#"<td class="DT">05-01-2026 10:00:00</td><td class="Po">Politie</td><td class="Regio"> Haaglanden</td><td class="Mdx">P 1 </td>"#;
        let rows = RowExtractor::new().unwrap().extract(html);
        assert_eq!(rows[0].region, " Haaglanden");
        assert_eq!(rows[0].message, "P 1 ");
    }

    #[test]
    fn rejects_malformed_timestamp_and_markup_case() {
        let extractor = RowExtractor::new().unwrap();
        let bad_time = ROW.replace("01-01-2026", "1-1-2026");
        let upper = ROW.replace(r#"class="Regio""#, r#"class="REGIO""#);
        assert!(extractor.extract(&bad_time).is_empty());
        assert!(extractor.extract(&upper).is_empty());
    }

    #[test]
    fn empty_page_yields_nothing() {
        let extractor = RowExtractor::new().unwrap();
        assert!(extractor.extract("<html><body>Geen meldingen</body></html>").is_empty());
        assert!(extractor.extract("").is_empty());
    }

    #[test]
    fn extraction_is_repeatable() {
        let html = format!("{ROW}{ROW}");
        let extractor = RowExtractor::new().unwrap();
        let first = extractor.extract(&html);
        let second = extractor.extract(&html);
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }
}
