//! XML serializer
//!
//! Indents element-only content by two spaces per level. Any element holding
//! text or CDATA is written verbatim together with its whole subtree, so the
//! preserved whitespace of the source is never doubled.

use std::fmt::Write as _;

use crate::xml::model::{Document, NodeId, NodeKind};

const INDENT: &str = "  ";

/// Serialize `doc` with formatting
pub fn to_string_pretty(doc: &Document) -> String {
    let mut out = String::new();
    match &doc.declaration {
        Some(decl) => {
            let _ = write!(out, "<?xml version=\"{}\"", decl.version);
            if let Some(encoding) = &decl.encoding {
                let _ = write!(out, " encoding=\"{encoding}\"");
            }
            if let Some(standalone) = &decl.standalone {
                let _ = write!(out, " standalone=\"{standalone}\"");
            }
            out.push_str("?>\n");
        }
        None => out.push_str("<?xml version=\"1.0\"?>\n"),
    }

    if let Some(doctype) = &doc.doctype {
        let _ = write!(out, "<!DOCTYPE {}", doctype.name);
        match (&doctype.public_id, &doctype.system_id) {
            (Some(public), Some(system)) => {
                let _ = write!(out, " PUBLIC \"{public}\" \"{system}\"");
            }
            (None, Some(system)) => {
                let _ = write!(out, " SYSTEM \"{system}\"");
            }
            _ => {}
        }
        if let Some(subset) = &doctype.internal_subset {
            let _ = write!(out, " [{subset}]");
        }
        out.push_str(">\n");
    }

    for child in doc.children(doc.document_node()) {
        write_node(doc, *child, &mut out);
        out.push('\n');
    }
    out
}

/// Pending serialization work; nesting is walked with an explicit stack
enum Step {
    Node {
        id: NodeId,
        depth: usize,
        format: bool,
    },
    Newline(usize),
    Close(NodeId),
}

fn write_node(doc: &Document, id: NodeId, out: &mut String) {
    let mut stack = vec![Step::Node {
        id,
        depth: 0,
        format: true,
    }];
    while let Some(step) = stack.pop() {
        match step {
            Step::Newline(depth) => {
                out.push('\n');
                out.push_str(&INDENT.repeat(depth));
            }
            Step::Close(id) => {
                if let Some(element) = doc.element(id) {
                    let _ = write!(out, "</{}>", element.name);
                }
            }
            Step::Node { id, depth, format } => {
                write_open(doc, id, depth, format, out, &mut stack);
            }
        }
    }
}

/// Write a node's leading markup, queueing its children and end tag
fn write_open(
    doc: &Document,
    id: NodeId,
    depth: usize,
    format: bool,
    out: &mut String,
    stack: &mut Vec<Step>,
) {
    let node = doc.node(id);
    match &node.kind {
        NodeKind::Document => {}
        NodeKind::Text(text) => escape_text(text, out),
        NodeKind::CData(text) => {
            out.push_str("<![CDATA[");
            out.push_str(text);
            out.push_str("]]>");
        }
        NodeKind::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeKind::ProcessingInstruction { target, data } => {
            out.push_str("<?");
            out.push_str(target);
            if !data.is_empty() {
                out.push(' ');
                out.push_str(data);
            }
            out.push_str("?>");
        }
        NodeKind::Element(element) => {
            let _ = write!(out, "<{}", element.name);
            for (prefix, uri) in &element.declarations {
                if prefix.is_empty() {
                    out.push_str(" xmlns=\"");
                } else {
                    let _ = write!(out, " xmlns:{prefix}=\"");
                }
                escape_attribute(uri, out);
                out.push('"');
            }
            for attr in &element.attributes {
                let _ = write!(out, " {}=\"", attr.name);
                escape_attribute(&attr.value, out);
                out.push('"');
            }

            if node.children.is_empty() {
                out.push_str("/>");
                return;
            }
            out.push('>');

            let indent_children = format
                && node
                    .children
                    .iter()
                    .all(|child| doc.node(*child).text().is_none());
            stack.push(Step::Close(id));
            if indent_children {
                stack.push(Step::Newline(depth));
            }
            for child in node.children.iter().rev() {
                stack.push(Step::Node {
                    id: *child,
                    depth: depth + 1,
                    format: indent_children,
                });
                if indent_children {
                    stack.push(Step::Newline(depth + 1));
                }
            }
        }
    }
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#13;"),
            c => out.push(c),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            c => out.push(c),
        }
    }
}
