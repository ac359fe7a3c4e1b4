//! Render [`BlockXml`] trees as compact Blockly XML text.
//!
//! Output carries no indentation or newlines between elements. Flag
//! attributes are only written when they differ from their defaults, and
//! `x`/`y` only when a position is set.

use super::{BlockXml, ChildXml, WorkspaceXml, XML_NAMESPACE};
use crate::model::{Mutation, Point};
use crate::model::field::format_number;

/// Render a whole workspace document.
pub fn write_workspace_xml(workspace: &WorkspaceXml) -> String {
    let mut out = String::with_capacity(256);
    out.push_str(&format!("<xml xmlns=\"{}\">", XML_NAMESPACE));
    if !workspace.variables.is_empty() {
        out.push_str("<variables>");
        for name in &workspace.variables {
            out.push_str(&format!("<variable>{}</variable>", xml_escape(name)));
        }
        out.push_str("</variables>");
    }
    for block in &workspace.blocks {
        write_block(&mut out, block);
    }
    out.push_str("</xml>");
    out
}

/// Render one block tree, without the `<xml>` wrapper.
pub fn write_block_xml(block: &BlockXml) -> String {
    let mut out = String::with_capacity(128);
    write_block(&mut out, block);
    out
}

/// Escape text content.
fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape an attribute value. Like [`xml_escape`] but also encodes quotes
/// and line breaks so they survive attribute-value normalization.
fn xml_escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            '\t' => out.push_str("&#x9;"),
            _ => out.push(ch),
        }
    }
    out
}

fn attr(out: &mut String, name: &str, value: &str) {
    out.push_str(&format!(" {}=\"{}\"", name, xml_escape_attr(value)));
}

fn flag(out: &mut String, name: &str, value: bool, default: bool) {
    if value != default {
        attr(out, name, if value { "true" } else { "false" });
    }
}

fn coord(v: f32) -> String {
    if v.fract() == 0.0 {
        format_number(f64::from(v))
    } else {
        format!("{}", v)
    }
}

fn write_block(out: &mut String, block: &BlockXml) {
    let tag = if block.shadow { "shadow" } else { "block" };
    out.push('<');
    out.push_str(tag);
    attr(out, "type", &block.block_type);
    if let Some(id) = &block.id {
        attr(out, "id", id);
    }
    if let Some(Point { x, y }) = block.position {
        attr(out, "x", &coord(x));
        attr(out, "y", &coord(y));
    }
    flag(out, "collapsed", block.collapsed, false);
    flag(out, "disabled", block.disabled, false);
    if let Some(inline) = block.inline {
        attr(out, "inline", if inline { "true" } else { "false" });
    }
    flag(out, "deletable", block.deletable, true);
    flag(out, "movable", block.movable, true);
    flag(out, "editable", block.editable, true);

    let empty = block.mutation.is_none()
        && block.comment.is_none()
        && block.fields.is_empty()
        && block.inputs.is_empty()
        && block.next.is_none();
    if empty {
        out.push_str("/>");
        return;
    }
    out.push('>');

    if let Some(mutation) = &block.mutation {
        out.push_str(&write_mutation(mutation));
    }
    if let Some(comment) = &block.comment {
        out.push_str("<comment");
        if comment.pinned {
            attr(out, "pinned", "true");
        }
        if let Some((w, h)) = comment.size {
            attr(out, "h", &coord(h));
            attr(out, "w", &coord(w));
        }
        out.push_str(&format!(">{}</comment>", xml_escape(&comment.text)));
    }
    for (name, value) in &block.fields {
        out.push_str(&format!(
            "<field name=\"{}\">{}</field>",
            xml_escape_attr(name),
            xml_escape(value)
        ));
    }
    for input in &block.inputs {
        let Some(tag) = input.kind.xml_tag() else {
            continue;
        };
        out.push_str(&format!("<{} name=\"{}\">", tag, xml_escape_attr(&input.name)));
        write_child(out, &input.child);
        out.push_str(&format!("</{}>", tag));
    }
    if let Some(next) = &block.next {
        out.push_str("<next>");
        write_child(out, next);
        out.push_str("</next>");
    }
    out.push_str(&format!("</{}>", tag));
}

/// Render a `<mutation>` element on its own.
pub fn write_mutation(mutation: &Mutation) -> String {
    let mut out = String::from("<mutation");
    for (name, value) in &mutation.attributes {
        attr(&mut out, name, value);
    }
    out.push_str("/>");
    out
}

fn write_child(out: &mut String, child: &ChildXml) {
    if let Some(shadow) = &child.shadow {
        write_block(out, shadow);
    }
    if let Some(block) = &child.block {
        write_block(out, block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Comment, InputKind};
    use crate::xml::{parse_block_xml, parse_workspace_xml, InputXml};

    #[test]
    fn test_write_compact_block() {
        let mut block = BlockXml::new("text_print");
        block.id = Some("p1".into());
        block.position = Some(Point::new(12.0, 7.5));
        block.fields.push(("TEXT".into(), "a < b & \"c\"".into()));
        assert_eq!(
            write_block_xml(&block),
            "<block type=\"text_print\" id=\"p1\" x=\"12\" y=\"7.5\">\
             <field name=\"TEXT\">a &lt; b &amp; \"c\"</field></block>"
        );
    }

    #[test]
    fn test_flags_written_only_when_non_default() {
        let mut block = BlockXml::new("b");
        block.disabled = true;
        block.deletable = false;
        block.inline = Some(false);
        assert_eq!(
            write_block_xml(&block),
            "<block type=\"b\" disabled=\"true\" inline=\"false\" deletable=\"false\"/>"
        );
    }

    #[test]
    fn test_written_text_parses_back() {
        let mut shadow = BlockXml::new("math_number");
        shadow.shadow = true;
        shadow.id = Some("s".into());
        shadow.fields.push(("NUM".into(), "1".into()));
        let mut root = BlockXml::new("math_arithmetic");
        root.id = Some("r".into());
        root.position = Some(Point::new(0.0, 0.0));
        root.comment = Some(Comment {
            text: "line one\nline two".into(),
            pinned: true,
            size: Some((120.0, 40.0)),
        });
        root.inputs.push(InputXml {
            name: "A".into(),
            kind: InputKind::Value,
            child: ChildXml {
                shadow: Some(Box::new(shadow)),
                block: None,
            },
        });
        let workspace = WorkspaceXml {
            variables: vec!["x & y".into()],
            blocks: vec![root.clone()],
        };
        let text = write_workspace_xml(&workspace);
        assert!(text.starts_with("<xml xmlns=\"http://www.w3.org/1999/xhtml\"><variables>"));
        assert_eq!(parse_workspace_xml(&text).unwrap(), workspace);
        assert_eq!(parse_block_xml(&write_block_xml(&root)).unwrap(), root);
    }
}
