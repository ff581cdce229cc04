//! Derive plain text and styled markup from packaged markup.
//!
//! Callers that already hold all three representations skip this. The CLI
//! only has the package, so it reads the WordprocessingML body:
//!
//! ```text
//! <w:p>            paragraph   text + "\n\n"        <p>..</p> (empty ones omitted)
//! <w:r><w:b/>      bold run    as is                <strong>..</strong>
//! <w:t>            run text    as is                & < > escaped
//! <w:tab/>         tab         "\t"                 "\t"
//! <w:br/>          break       "\n"                 <br />
//! ```

use crate::Representations;
use crate::engine::escape_text;
use crate::error::PackageError;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

#[derive(Default)]
struct Builder {
    plain: String,
    html: String,
    paragraph_plain: String,
    paragraph_html: String,
    in_text: bool,
    run_bold: bool,
    bold_open: bool,
}

impl Builder {
    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.paragraph_plain.push_str(text);
        self.set_bold(self.run_bold);
        self.paragraph_html.push_str(&escape_text(text));
    }

    fn push_break(&mut self, plain: &str, html: &str) {
        self.paragraph_plain.push_str(plain);
        self.paragraph_html.push_str(html);
    }

    fn set_bold(&mut self, bold: bool) {
        if bold == self.bold_open {
            return;
        }
        self.paragraph_html.push_str(if bold { "<strong>" } else { "</strong>" });
        self.bold_open = bold;
    }

    fn end_paragraph(&mut self) {
        self.set_bold(false);
        self.plain.push_str(&self.paragraph_plain);
        self.plain.push_str("\n\n");
        if !self.paragraph_plain.trim().is_empty() {
            self.html.push_str("<p>");
            self.html.push_str(&self.paragraph_html);
            self.html.push_str("</p>");
        }
        self.paragraph_plain.clear();
        self.paragraph_html.clear();
    }
}

/// Build all three representations from the packaged markup.
pub fn derive_representations(packaged_markup: &str) -> Result<Representations, PackageError> {
    let mut reader = Reader::from_str(packaged_markup);
    reader.config_mut().trim_text(false);
    let mut doc = Builder::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"r" => doc.run_bold = false,
                b"t" => doc.in_text = true,
                b"b" => doc.run_bold = bold_enabled(&e)?,
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"b" => doc.run_bold = bold_enabled(&e)?,
                b"tab" => doc.push_break("\t", "\t"),
                b"br" => doc.push_break("\n", "<br />"),
                b"p" => doc.end_paragraph(),
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => doc.in_text = false,
                b"r" => doc.run_bold = false,
                b"p" => doc.end_paragraph(),
                _ => {}
            },
            Event::Text(e) if doc.in_text => {
                let text = e.unescape()?;
                doc.push_text(&text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !doc.paragraph_plain.is_empty() {
        doc.end_paragraph();
    }
    tracing::debug!(plain_bytes = doc.plain.len(), html_bytes = doc.html.len(), "representations derived");
    Ok(Representations::new(doc.plain, doc.html, packaged_markup))
}

/// `<w:b/>` and `<w:b w:val="1"/>` turn bold on; `w:val="0"`/`"false"` turn it off.
fn bold_enabled(e: &BytesStart<'_>) -> Result<bool, PackageError> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.local_name().as_ref() == b"val" {
            let value = attr.unescape_value()?;
            return Ok(!matches!(value.as_ref(), "0" | "false" | "off"));
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = concat!(
        r#"<w:document xmlns:w="x"><w:body>"#,
        r#"<w:p><w:r><w:t>Company: </w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>[Company</w:t></w:r>"#,
        r#"<w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve"> Name]</w:t></w:r></w:p>"#,
        r#"<w:p/>"#,
        r#"<w:p><w:r><w:t>Title:</w:t><w:tab/><w:t>A &amp; B</w:t><w:br/><w:t>end</w:t></w:r></w:p>"#,
        r#"</w:body></w:document>"#,
    );

    #[test]
    fn paragraphs_runs_and_breaks() {
        let reps = derive_representations(BODY).unwrap();
        assert_eq!(reps.plain_text, "Company: [Company Name]\n\n\n\nTitle:\tA & B\nend\n\n");
        assert_eq!(
            reps.styled_markup,
            "<p>Company: <strong>[Company Name]</strong></p><p>Title:\tA &amp; B<br />end</p>"
        );
        assert_eq!(reps.packaged_markup, BODY);
    }

    #[test]
    fn explicit_bold_off_is_respected() {
        let xml = r#"<w:p><w:r><w:rPr><w:b w:val="0"/></w:rPr><w:t>plain</w:t></w:r></w:p>"#;
        assert_eq!(derive_representations(xml).unwrap().styled_markup, "<p>plain</p>");
    }

    #[test]
    fn quotes_in_text_stay_literal() {
        let xml = r#"<w:p><w:r><w:t>Investor&apos;s &quot;Address&quot; &amp; more</w:t></w:r></w:p>"#;
        assert_eq!(derive_representations(xml).unwrap().styled_markup, r#"<p>Investor's "Address" &amp; more</p>"#);
    }

    #[test]
    fn broken_markup_is_an_error() {
        assert!(matches!(derive_representations("<w:p><w:t>x</w:p>"), Err(PackageError::Markup(_))));
    }
}
