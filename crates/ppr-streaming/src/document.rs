//! Html document wrapper around page bodies.

use ppr_render::escape_html;

/// Head content for the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadContent {
    /// Page title.
    pub title: Option<String>,
    /// Meta tags.
    pub meta: Vec<(String, String)>,
    /// Link tags (stylesheets, etc.).
    pub links: Vec<String>,
}

impl HeadContent {
    /// Create new head content with a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Add a meta tag.
    pub fn with_meta(mut self, name: &str, content: &str) -> Self {
        self.meta.push((name.to_string(), content.to_string()));
        self
    }

    /// Add a stylesheet link.
    pub fn with_stylesheet(mut self, href: &str) -> Self {
        self.links.push(format!(
            r#"<link rel="stylesheet" href="{}">"#,
            escape_html(href)
        ));
        self
    }

    /// Render head content to HTML.
    pub fn render(&self) -> String {
        let mut html = String::new();

        if let Some(title) = &self.title {
            html.push_str(&format!("<title>{}</title>", escape_html(title)));
        }

        for (name, content) in &self.meta {
            html.push_str(&format!(
                r#"<meta name="{}" content="{}">"#,
                escape_html(name),
                escape_html(content)
            ));
        }

        for link in &self.links {
            html.push_str(link);
        }

        html
    }
}

/// Document wrapping a page body.
///
/// The opening part goes out with the shell, the closing part after the last
/// hole chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Include doctype declaration.
    pub doctype: bool,
    /// Head content.
    pub head: HeadContent,
    /// HTML between `</head>` and the page body.
    pub body_start: String,
    /// HTML after the page body.
    pub body_end: String,
}

impl Document {
    /// Create a document with a plain body.
    pub fn new(head: HeadContent) -> Self {
        Self {
            doctype: true,
            head,
            body_start: "<body>".to_string(),
            body_end: "</body></html>".to_string(),
        }
    }

    /// Set custom body start HTML.
    pub fn with_body_start(mut self, html: impl Into<String>) -> Self {
        self.body_start = html.into();
        self
    }

    /// Set custom body end HTML.
    pub fn with_body_end(mut self, html: impl Into<String>) -> Self {
        self.body_end = html.into();
        self
    }

    /// Render the part before the page body.
    pub fn render_opening(&self) -> String {
        let mut html = String::new();

        if self.doctype {
            html.push_str("<!DOCTYPE html>");
        }

        html.push_str("<html><head>");
        html.push_str(&self.head.render());
        html.push_str("</head>");
        html.push_str(&self.body_start);

        html
    }

    /// Render the part after the page body.
    pub fn render_closing(&self) -> String {
        self.body_end.clone()
    }

    /// Wrap a complete body.
    pub fn wrap(&self, body: &str) -> String {
        let mut html = self.render_opening();
        html.push_str(body);
        html.push_str(&self.body_end);
        html
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new(HeadContent::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_body() {
        let document = Document::new(HeadContent::new("PPR & co").with_meta("robots", "none"));

        assert_eq!(
            document.wrap("<p>hi</p>"),
            concat!(
                "<!DOCTYPE html><html><head><title>PPR &amp; co</title>",
                r#"<meta name="robots" content="none">"#,
                "</head><body><p>hi</p></body></html>"
            )
        );
    }

    #[test]
    fn test_opening_and_closing_split_wrap() {
        let document = Document::default().with_body_start("<body><main>");
        let document = document.with_body_end("</main></body></html>");

        let joined = format!(
            "{}{}{}",
            document.render_opening(),
            "x",
            document.render_closing()
        );
        assert_eq!(joined, document.wrap("x"));
    }
}
