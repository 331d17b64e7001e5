//! Rich-document tree → sanitized HTML.
//!
//! Articles arrive from the editor as a JSON tree of typed nodes. The whole
//! tree is rendered up front and the HTML is persisted as the served page
//! body, so a malformed tree fails the operation instead of producing a
//! partial page.

use serde::{Deserialize, Serialize};

use crate::error::{CmsError, CmsResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentNode {
    Text(TextLeaf),
    Element(ElementNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLeaf {
    pub text: String,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub hide: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub children: Vec<DocumentNode>,
    #[serde(default)]
    pub align: Option<String>,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default, rename = "buttonType")]
    pub button_type: Option<String>,
    #[serde(default)]
    pub hide: bool,
}

/// Closed set of element kinds. Anything the editor sends that we do not
/// recognize lands on `Unknown` and renders as its bare children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementKind {
    Paragraph,
    Quote,
    BlockQuote,
    #[serde(rename = "heading-1")]
    Heading1,
    #[serde(rename = "heading-2")]
    Heading2,
    #[serde(rename = "heading-3")]
    Heading3,
    ListItem,
    NumberedList,
    BulletedList,
    Image,
    Link,
    Button,
    Badge,
    #[serde(other)]
    Unknown,
}

/// Render a serialized document (JSON array of nodes) to HTML.
///
/// An empty payload renders to an empty string; anything that is not an
/// array of well-formed nodes is a [`CmsError::MalformedDocument`].
pub fn render_document(content_json: &str) -> CmsResult<String> {
    let trimmed = content_json.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    let value: serde_json::Value = serde_json::from_str(trimmed)
        .map_err(|err| CmsError::MalformedDocument(err.to_string()))?;
    if !value.is_array() {
        return Err(CmsError::MalformedDocument(
            "top-level document must be an array of nodes".to_string(),
        ));
    }
    let nodes: Vec<DocumentNode> = serde_json::from_value(value)
        .map_err(|err| CmsError::MalformedDocument(err.to_string()))?;
    Ok(render_nodes(&nodes))
}

pub fn render_nodes(nodes: &[DocumentNode]) -> String {
    nodes.iter().map(render_node).collect()
}

fn render_node(node: &DocumentNode) -> String {
    match node {
        DocumentNode::Text(leaf) => {
            // Escape first, then wrap innermost → outermost.
            let mut out = escape_text(&leaf.text);
            if leaf.bold {
                out = format!("<strong>{out}</strong>");
            }
            if leaf.hide {
                out = format!(r#"<span style="display: none;">{out}</span>"#);
            }
            out
        },
        DocumentNode::Element(el) => render_element(el),
    }
}

fn render_element(el: &ElementNode) -> String {
    let children = render_nodes(&el.children);
    match el.kind {
        ElementKind::Paragraph => {
            let hide_style = if el.hide { r#" style="display: none;""# } else { "" };
            format!("<p{hide_style}>{children}</p>")
        },
        ElementKind::Quote => format!("<blockquote><p>{children}</p></blockquote>"),
        ElementKind::BlockQuote => format!("<blockquote>{children}</blockquote>"),
        ElementKind::Heading1 => render_heading(1, el, &children),
        ElementKind::Heading2 => render_heading(2, el, &children),
        ElementKind::Heading3 => render_heading(3, el, &children),
        ElementKind::ListItem => format!("<li>{children}</li>"),
        ElementKind::NumberedList => format!("<ol>{children}</ol>"),
        ElementKind::BulletedList => format!("<ul>{children}</ul>"),
        ElementKind::Image => render_image(el, &children),
        ElementKind::Link => {
            let href = escape_attr(el.url.as_deref().unwrap_or(""));
            format!(
                r#"<a target="_blank" rel="noopener noreferrer" href="{href}">{children}</a>"#
            )
        },
        ElementKind::Button => {
            let type_attr = el
                .button_type
                .as_deref()
                .map(|t| format!(r#" type="{}""#, escape_attr(t)))
                .unwrap_or_default();
            format!("<button{type_attr}>{children}</button>")
        },
        ElementKind::Badge => format!(r#"<span class="badge">{children}</span>"#),
        ElementKind::Unknown => children,
    }
}

fn render_heading(level: u8, el: &ElementNode, children: &str) -> String {
    let align = escape_attr(el.align.as_deref().unwrap_or("initial"));
    // Title headings render bold in the original editor theme.
    format!(
        r#"<h{level} style="text-align: {align};"><strong>{children}</strong></h{level}>"#
    )
}

fn render_image(el: &ElementNode, children: &str) -> String {
    let mut anchor_attrs = String::new();
    if let Some(href) = el.href.as_deref() {
        anchor_attrs.push_str(&format!(r#" href="{}""#, escape_attr(href)));
    }
    // Title falls back to alt text when no link target is present.
    if let Some(title) = el.href.as_deref().or(el.alt.as_deref()) {
        anchor_attrs.push_str(&format!(r#" title="{}""#, escape_attr(title)));
    }
    let mut img_attrs = String::new();
    if let Some(src) = el.url.as_deref() {
        img_attrs.push_str(&format!(r#" src="{}""#, escape_attr(src)));
    }
    if let Some(alt) = el.alt.as_deref() {
        img_attrs.push_str(&format!(r#" alt="{}""#, escape_attr(alt)));
    }
    format!("<a{anchor_attrs}><img{img_attrs}>{children}</img></a>")
}

/// Escape user-controlled text for element bodies. Every text leaf and
/// attribute value goes through here (or [`escape_attr`]) before it is
/// interpolated — this is the only defense against stored XSS.
pub fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(t: &str) -> DocumentNode {
        DocumentNode::Text(TextLeaf { text: t.to_string(), bold: false, hide: false })
    }

    fn element(kind: ElementKind, children: Vec<DocumentNode>) -> ElementNode {
        ElementNode {
            kind,
            children,
            align: None,
            href: None,
            url: None,
            alt: None,
            button_type: None,
            hide: false,
        }
    }

    #[test]
    fn bold_text_is_escaped_before_wrapping() {
        let html = render_document(r#"[{"text": "<script>", "bold": true}]"#)
            .expect("valid document");
        assert_eq!(html, "<strong>&lt;script&gt;</strong>");
    }

    #[test]
    fn hidden_text_wraps_outside_bold() {
        let html = render_document(r#"[{"text": "x", "bold": true, "hide": true}]"#)
            .expect("valid document");
        assert_eq!(html, r#"<span style="display: none;"><strong>x</strong></span>"#);
    }

    #[test]
    fn nested_list_preserves_order() {
        let doc = r#"[{"type": "bulleted-list", "children": [
            {"type": "list-item", "children": [{"text": "a"}]},
            {"type": "list-item", "children": [{"text": "b"}]}
        ]}]"#;
        assert_eq!(render_document(doc).expect("valid document"), "<ul><li>a</li><li>b</li></ul>");
    }

    #[test]
    fn quote_wraps_children_in_paragraph() {
        let node = DocumentNode::Element(element(ElementKind::Quote, vec![text("q")]));
        assert_eq!(render_nodes(&[node]), "<blockquote><p>q</p></blockquote>");
    }

    #[test]
    fn heading_uses_align_or_initial() {
        let mut el = element(ElementKind::Heading2, vec![text("t")]);
        assert_eq!(
            render_nodes(&[DocumentNode::Element(el.clone())]),
            r#"<h2 style="text-align: initial;"><strong>t</strong></h2>"#
        );
        el.align = Some("center".to_string());
        assert_eq!(
            render_nodes(&[DocumentNode::Element(el)]),
            r#"<h2 style="text-align: center;"><strong>t</strong></h2>"#
        );
    }

    #[test]
    fn image_omits_href_and_title_when_absent() {
        let mut el = element(ElementKind::Image, vec![]);
        el.url = Some("img.png".to_string());
        assert_eq!(
            render_nodes(&[DocumentNode::Element(el)]),
            r#"<a><img src="img.png"></img></a>"#
        );
    }

    #[test]
    fn image_title_falls_back_to_alt() {
        let mut el = element(ElementKind::Image, vec![]);
        el.url = Some("img.png".to_string());
        el.alt = Some("a \"photo\"".to_string());
        assert_eq!(
            render_nodes(&[DocumentNode::Element(el)]),
            r#"<a title="a &quot;photo&quot;"><img src="img.png" alt="a &quot;photo&quot;"></img></a>"#
        );
    }

    #[test]
    fn link_escapes_target_url() {
        let doc = r#"[{"type": "link", "url": "https://e.com/?a=1&b=2", "children": [{"text": "go"}]}]"#;
        assert_eq!(
            render_document(doc).expect("valid document"),
            r#"<a target="_blank" rel="noopener noreferrer" href="https://e.com/?a=1&amp;b=2">go</a>"#
        );
    }

    #[test]
    fn unknown_kind_degrades_to_children() {
        let doc = r#"[{"type": "marquee", "children": [{"text": "hi"}]}]"#;
        assert_eq!(render_document(doc).expect("valid document"), "hi");
    }

    #[test]
    fn hidden_paragraph_gets_display_none() {
        let doc = r#"[{"type": "paragraph", "hide": true, "children": [{"text": "x"}]}]"#;
        assert_eq!(
            render_document(doc).expect("valid document"),
            r#"<p style="display: none;">x</p>"#
        );
    }

    #[test]
    fn non_array_top_level_is_malformed() {
        let err = render_document(r#"{"type": "paragraph", "children": []}"#)
            .expect_err("object top level must fail");
        assert!(matches!(err, CmsError::MalformedDocument(_)));
    }

    #[test]
    fn element_without_children_is_malformed() {
        let err = render_document(r#"[{"type": "paragraph"}]"#)
            .expect_err("missing children must fail");
        assert!(matches!(err, CmsError::MalformedDocument(_)));
    }

    #[test]
    fn empty_payload_renders_empty() {
        assert_eq!(render_document("").expect("empty ok"), "");
        assert_eq!(render_document("[]").expect("empty ok"), "");
    }
}
