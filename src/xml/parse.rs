//! Parse Blockly XML text into [`WorkspaceXml`] / [`BlockXml`] trees.

use indexmap::IndexMap;
use roxmltree::{Document, Node};

use super::{BlockXml, ChildXml, InputXml, WorkspaceXml};
use crate::error::{BlockLoadError, LoadResult};
use crate::model::{Comment, InputKind, Mutation, Point};

/// Parse a full `<xml>` document.
pub fn parse_workspace_xml(text: &str) -> LoadResult<WorkspaceXml> {
    let doc = Document::parse(text).map_err(|e| BlockLoadError::MalformedXml(e.to_string()))?;
    let root = doc.root_element();
    if root.tag_name().name() != "xml" {
        return Err(BlockLoadError::UnexpectedElement {
            expected: "xml".into(),
            found: root.tag_name().name().into(),
        });
    }
    let mut workspace = WorkspaceXml::default();
    for child in root.children().filter(|c| c.is_element()) {
        match child.tag_name().name() {
            "block" => workspace.blocks.push(parse_block_node(child, false)?),
            "variables" => {
                for var in child
                    .children()
                    .filter(|c| c.is_element() && c.has_tag_name("variable"))
                {
                    let name = var.text().unwrap_or("").trim();
                    if !name.is_empty() {
                        workspace.variables.push(name.to_string());
                    }
                }
            }
            "shadow" => {
                return Err(BlockLoadError::UnexpectedElement {
                    expected: "block".into(),
                    found: "shadow".into(),
                });
            }
            other => tracing::warn!(element = other, "ignoring unknown workspace element"),
        }
    }
    Ok(workspace)
}

/// Parse a single `<block>` or `<shadow>` element. A document wrapped in
/// `<xml>` must contain exactly one block.
pub fn parse_block_xml(text: &str) -> LoadResult<BlockXml> {
    let doc = Document::parse(text).map_err(|e| BlockLoadError::MalformedXml(e.to_string()))?;
    let root = doc.root_element();
    match root.tag_name().name() {
        "block" => parse_block_node(root, false),
        "shadow" => parse_block_node(root, true),
        "xml" => {
            let mut blocks = root
                .children()
                .filter(|c| c.is_element() && c.has_tag_name("block"));
            let first = blocks.next().ok_or_else(|| BlockLoadError::UnexpectedElement {
                expected: "block".into(),
                found: "nothing".into(),
            })?;
            if blocks.next().is_some() {
                return Err(BlockLoadError::MalformedXml(
                    "expected exactly one block".into(),
                ));
            }
            parse_block_node(first, false)
        }
        other => Err(BlockLoadError::UnexpectedElement {
            expected: "block".into(),
            found: other.into(),
        }),
    }
}

fn parse_bool_attr(node: Node, name: &str) -> LoadResult<Option<bool>> {
    match node.attribute(name) {
        None => Ok(None),
        Some(v) if v.eq_ignore_ascii_case("true") => Ok(Some(true)),
        Some(v) if v.eq_ignore_ascii_case("false") => Ok(Some(false)),
        Some(v) => Err(BlockLoadError::InvalidAttribute {
            attribute: name.into(),
            value: v.into(),
        }),
    }
}

fn parse_f32_attr(node: Node, name: &str) -> LoadResult<Option<f32>> {
    match node.attribute(name) {
        None => Ok(None),
        Some(v) => v
            .trim()
            .parse::<f32>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Some)
            .ok_or_else(|| BlockLoadError::InvalidAttribute {
                attribute: name.into(),
                value: v.into(),
            }),
    }
}

fn required_name(node: Node) -> LoadResult<String> {
    node.attribute("name")
        .map(str::to_string)
        .ok_or_else(|| BlockLoadError::InvalidAttribute {
            attribute: "name".into(),
            value: String::new(),
        })
}

fn parse_block_node(node: Node, shadow: bool) -> LoadResult<BlockXml> {
    let block_type = node
        .attribute("type")
        .filter(|t| !t.is_empty())
        .ok_or(BlockLoadError::MissingType)?;
    let mut block = BlockXml::new(block_type);
    block.shadow = shadow;
    block.id = node.attribute("id").map(str::to_string);
    let x = parse_f32_attr(node, "x")?;
    let y = parse_f32_attr(node, "y")?;
    if x.is_some() || y.is_some() {
        block.position = Some(Point::new(x.unwrap_or(0.0), y.unwrap_or(0.0)));
    }
    block.collapsed = parse_bool_attr(node, "collapsed")?.unwrap_or(false);
    block.disabled = parse_bool_attr(node, "disabled")?.unwrap_or(false);
    block.inline = parse_bool_attr(node, "inline")?;
    block.deletable = parse_bool_attr(node, "deletable")?.unwrap_or(true);
    block.movable = parse_bool_attr(node, "movable")?.unwrap_or(true);
    block.editable = parse_bool_attr(node, "editable")?.unwrap_or(true);

    let label = || block_type.to_string();
    for child in node.children().filter(|c| c.is_element()) {
        match child.tag_name().name() {
            "field" => {
                let name = required_name(child)?;
                let value = child.text().unwrap_or("").to_string();
                block.fields.push((name, value));
            }
            tag @ ("value" | "statement") => {
                let name = required_name(child)?;
                if block.input(&name).is_some() {
                    return Err(BlockLoadError::MultipleBlocksForInput(name));
                }
                let kind = if tag == "value" {
                    InputKind::Value
                } else {
                    InputKind::Statement
                };
                let parsed = parse_child(child, &name, shadow, &label)?;
                block.inputs.push(InputXml {
                    name,
                    kind,
                    child: parsed,
                });
            }
            "next" => {
                if block.next.is_some() {
                    return Err(BlockLoadError::MultipleBlocksForInput("next".into()));
                }
                block.next = Some(parse_child(child, "next", shadow, &label)?);
            }
            "mutation" => {
                let attributes: IndexMap<String, String> = child
                    .attributes()
                    .map(|a| (a.name().to_string(), a.value().to_string()))
                    .collect();
                block.mutation = Some(Mutation { attributes });
            }
            "comment" => {
                let w = parse_f32_attr(child, "w")?;
                let h = parse_f32_attr(child, "h")?;
                block.comment = Some(Comment {
                    text: child.text().unwrap_or("").to_string(),
                    pinned: parse_bool_attr(child, "pinned")?.unwrap_or(false),
                    size: w.zip(h),
                });
            }
            other => tracing::warn!(element = other, block_type, "ignoring unknown block element"),
        }
    }
    Ok(block)
}

fn parse_child(
    node: Node,
    input_name: &str,
    parent_is_shadow: bool,
    parent_label: &dyn Fn() -> String,
) -> LoadResult<ChildXml> {
    let mut child = ChildXml::default();
    for element in node.children().filter(|c| c.is_element()) {
        match element.tag_name().name() {
            "shadow" => {
                if child.shadow.is_some() {
                    return Err(BlockLoadError::MultipleShadowsForInput(input_name.into()));
                }
                child.shadow = Some(Box::new(parse_block_node(element, true)?));
            }
            "block" => {
                if parent_is_shadow {
                    return Err(BlockLoadError::ShadowWithRealChild(parent_label()));
                }
                if child.block.is_some() {
                    return Err(BlockLoadError::MultipleBlocksForInput(input_name.into()));
                }
                child.block = Some(Box::new(parse_block_node(element, false)?));
            }
            other => {
                return Err(BlockLoadError::UnexpectedElement {
                    expected: "block".into(),
                    found: other.into(),
                });
            }
        }
    }
    Ok(child)
}
