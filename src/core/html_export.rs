/*
 * Renders packed export segments as a standalone HTML document. Each segment
 * gets a read-only textarea holding its full text, a size line with the
 * character count and a token estimate, and a button that copies the textarea
 * to the clipboard.
 */
use crate::core::packer::ExportSegment;
use crate::core::tokenizer_utils::TokenCounterOperations;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const EMPTY_EXPORT_MESSAGE: &str = "No files selected.";

/* Escapes the characters that would otherwise end or open markup in a textarea. */
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/*
 * Current UTC time in RFC 3339, for the document's "generated" line. Falls back
 * to the Unix epoch rendering if formatting fails.
 */
pub fn current_timestamp() -> String {
    let now = OffsetDateTime::now_utc();
    match now.format(&Rfc3339) {
        Ok(stamp) => stamp,
        Err(e) => {
            log::warn!("HtmlExport: Failed to format timestamp: {e}");
            now.unix_timestamp().to_string()
        }
    }
}

pub fn render_html(
    segments: &[ExportSegment],
    token_counter: &dyn TokenCounterOperations,
    generated_at: &str,
) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n<title>Export</title>\n");
    html.push_str(
        "<style>\nbody { font-family: sans-serif; margin: 1em; }\n\
         section { margin-bottom: 2em; }\n\
         textarea { width: 100%; height: 20em; font-family: monospace; }\n\
         .size { color: #555; margin: 0.3em 0; }\n</style>\n",
    );
    html.push_str("</head>\n<body>\n");
    html.push_str(&format!(
        "<p class=\"generated\">Generated {}</p>\n",
        escape_html(generated_at)
    ));

    if segments.is_empty() {
        html.push_str(&format!("<p>{EMPTY_EXPORT_MESSAGE}</p>\n"));
    }

    for (index, segment) in segments.iter().enumerate() {
        let text = segment.text();
        let tokens = token_counter.count_tokens(&text);
        html.push_str("<section>\n");
        html.push_str(&format!(
            "<h2>Segment {} of {}</h2>\n",
            index + 1,
            segments.len()
        ));
        html.push_str(&format!(
            "<textarea id=\"segment-{index}\" readonly>{}</textarea>\n",
            escape_html(&text)
        ));
        html.push_str(&format!(
            "<p class=\"size\">{} characters (~{tokens} tokens)</p>\n",
            segment.character_count()
        ));
        html.push_str(&format!(
            "<button onclick=\"navigator.clipboard.writeText(document.getElementById('segment-{index}').value)\">Copy</button>\n"
        ));
        html.push_str("</section>\n");
    }

    html.push_str("</body>\n</html>\n");
    log::debug!(
        "HtmlExport: Rendered {} segment(s) into {} bytes of HTML.",
        segments.len(),
        html.len()
    );
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::packer::{ExportInput, ExportTemplates, HeaderPolicy, PackOptions, pack_input};
    use crate::core::tokenizer_utils::SimpleWhitespaceTokenCounter;

    fn segments_for(paths: &[&str], limit: usize) -> Vec<ExportSegment> {
        let input = ExportInput {
            non_text: paths.iter().map(|p| p.to_string()).collect(),
            text: vec![],
        };
        let options = PackOptions {
            character_limit: limit,
            templates: ExportTemplates::default(),
            header_policy: HeaderPolicy::AllowSplit,
        };
        pack_input(&input, &options).unwrap()
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a < b && c > d"), "a &lt; b &amp;&amp; c &gt; d");
        assert_eq!(escape_html("plain \"quoted\""), "plain \"quoted\"");
    }

    #[test]
    fn test_one_section_per_segment_with_counts() {
        let segments = segments_for(&["one two", "three"], 9);
        assert_eq!(segments.len(), 2);

        let html = render_html(&segments, &SimpleWhitespaceTokenCounter::new(), "2026-01-01T00:00:00Z");

        assert_eq!(html.matches("<section>\n").count(), 2);
        assert!(html.contains("<h2>Segment 2 of 2</h2>\n"));
        assert!(html.contains("<textarea id=\"segment-0\" readonly>one two\n</textarea>"));
        assert!(html.contains("<textarea id=\"segment-1\" readonly>three\n</textarea>"));
        assert!(html.contains("8 characters (~2 tokens)"));
        assert!(html.contains("6 characters (~1 tokens)"));
        assert!(html.contains("getElementById('segment-1')"));
        assert!(html.contains("Generated 2026-01-01T00:00:00Z"));
        assert!(!html.contains(EMPTY_EXPORT_MESSAGE));
    }

    #[test]
    fn test_segment_content_is_escaped() {
        let segments = segments_for(&["<script>&</script>"], 100);
        let html = render_html(&segments, &SimpleWhitespaceTokenCounter::new(), "now");
        assert!(html.contains("&lt;script&gt;&amp;&lt;/script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_no_segments_renders_message() {
        let html = render_html(&[], &SimpleWhitespaceTokenCounter::new(), "now");
        assert!(html.contains(EMPTY_EXPORT_MESSAGE));
        assert!(!html.contains("<textarea"));
    }

    #[test]
    fn test_current_timestamp_is_rfc3339() {
        let stamp = current_timestamp();
        assert!(OffsetDateTime::parse(&stamp, &Rfc3339).is_ok());
    }
}
