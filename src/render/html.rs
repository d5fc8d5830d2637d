//! Typed HTML node tree with an escaping serializer.
//!
//! Pages are assembled as [`Node`] values and turned into markup in one pass
//! by [`Node::render`]. Text and attribute values are always escaped; only
//! [`Node::Raw`] is emitted verbatim, and it is reserved for fixed markup such
//! as `&nbsp;`.

/// Elements that never have children or a closing tag
const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "link", "meta"];

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    name: &'static str,
    attrs: Vec<(&'static str, String)>,
    children: Vec<Node>,
}

/// Start building an element
pub fn el(name: &'static str) -> Element {
    Element {
        name,
        attrs: Vec::new(),
        children: Vec::new(),
    }
}

pub fn text(value: impl Into<String>) -> Node {
    Node::Text(value.into())
}

pub fn raw(markup: impl Into<String>) -> Node {
    Node::Raw(markup.into())
}

/// `count` non-breaking spaces
pub fn nbsp(count: usize) -> Node {
    Node::Raw("&nbsp;".repeat(count))
}

impl Element {
    pub fn attr(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.attrs.push((name, value.into()));
        self
    }

    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.children.push(node.into());
        self
    }

    pub fn children<I>(mut self, nodes: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Node>,
    {
        self.children.extend(nodes.into_iter().map(Into::into));
        self
    }

    pub fn text(self, value: impl Into<String>) -> Self {
        self.child(text(value))
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl Node {
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.write(&mut out);
        out
    }

    fn write(&self, out: &mut String) {
        match self {
            Node::Text(value) => out.push_str(&escape(value)),
            Node::Raw(markup) => out.push_str(markup),
            Node::Element(element) => {
                out.push('<');
                out.push_str(element.name);
                for (name, value) in &element.attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape(value));
                    out.push('"');
                }
                out.push('>');

                if VOID_ELEMENTS.contains(&element.name) {
                    return;
                }

                for child in &element.children {
                    child.write(out);
                }
                out.push_str("</");
                out.push_str(element.name);
                out.push('>');
            }
        }
    }
}

/// Serialize a full document
pub fn document(head: Element, body: Element) -> String {
    let html = el("html").child(head).child(body);
    format!("<!DOCTYPE html>\n{}", Node::from(html).render())
}

/// Escape text for element content and quoted attribute values
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape("a < b & c > \"d\" 'e'"), "a &lt; b &amp; c &gt; &quot;d&quot; &#39;e&#39;");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn test_nested_elements() {
        let node: Node = el("table")
            .child(el("tr").child(el("th").attr("colspan", "2").text("Session")))
            .into();
        assert_eq!(
            node.render(),
            r#"<table><tr><th colspan="2">Session</th></tr></table>"#
        );
    }

    #[test]
    fn test_void_elements_have_no_closing_tag() {
        let node: Node = el("form")
            .attr("action", "/tasks")
            .child(el("input").attr("type", "submit").attr("value", "List Tasks"))
            .child(el("hr"))
            .into();
        assert_eq!(
            node.render(),
            r#"<form action="/tasks"><input type="submit" value="List Tasks"><hr></form>"#
        );
    }

    #[test]
    fn test_text_is_escaped_but_raw_is_not() {
        let node: Node = el("td")
            .child(nbsp(2))
            .text("<b>")
            .child(raw("<i>ok</i>"))
            .into();
        assert_eq!(node.render(), "<td>&nbsp;&nbsp;&lt;b&gt;<i>ok</i></td>");
    }

    #[test]
    fn test_attribute_values_are_escaped() {
        let node: Node = el("a").attr("href", "/x?a=1&b=\"2\"").text("x").into();
        assert_eq!(node.render(), r#"<a href="/x?a=1&amp;b=&quot;2&quot;">x</a>"#);
    }

    #[test]
    fn test_document() {
        let html = document(el("head").child(el("title").text("Coho")), el("body"));
        assert!(html.starts_with("<!DOCTYPE html>\n<html><head><title>Coho</title></head>"));
        assert!(html.ends_with("<body></body></html>"));
    }
}
