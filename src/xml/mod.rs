//! Blockly XML serialization.
//!
//! XML is first parsed into a plain [`BlockXml`] tree ([`parse`]) which the
//! [`crate::factory::BlockFactory`] turns into live blocks. Going the other
//! way, [`block_to_xml`] snapshots a live block tree and [`write`] renders
//! it. Structural rules that need no block definitions (one block per
//! input, shadows only containing shadows) are enforced while parsing.

pub mod parse;
pub mod write;

pub use parse::{parse_block_xml, parse_workspace_xml};
pub use write::{write_block_xml, write_mutation, write_workspace_xml};

use crate::model::{BlockGraph, BlockRef, Comment, ConnectionRef, InputKind, Mutation, Point, Slot};

/// Namespace written on the `<xml>` root element.
pub const XML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// A whole workspace document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkspaceXml {
    pub variables: Vec<String>,
    pub blocks: Vec<BlockXml>,
}

/// What sits in one socket: an optional shadow and an optional real block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChildXml {
    pub shadow: Option<Box<BlockXml>>,
    pub block: Option<Box<BlockXml>>,
}

impl ChildXml {
    pub fn is_empty(&self) -> bool {
        self.shadow.is_none() && self.block.is_none()
    }
}

/// A `<value>` or `<statement>` element.
#[derive(Debug, Clone, PartialEq)]
pub struct InputXml {
    pub name: String,
    pub kind: InputKind,
    pub child: ChildXml,
}

/// A `<block>` or `<shadow>` element.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockXml {
    pub block_type: String,
    pub id: Option<String>,
    pub shadow: bool,
    /// Only written for root blocks.
    pub position: Option<Point>,
    pub collapsed: bool,
    pub disabled: bool,
    pub inline: Option<bool>,
    pub deletable: bool,
    pub movable: bool,
    pub editable: bool,
    pub mutation: Option<Mutation>,
    pub comment: Option<Comment>,
    /// `(name, value)` in document order.
    pub fields: Vec<(String, String)>,
    pub inputs: Vec<InputXml>,
    pub next: Option<ChildXml>,
}

impl BlockXml {
    pub fn new(block_type: impl Into<String>) -> Self {
        Self {
            block_type: block_type.into(),
            id: None,
            shadow: false,
            position: None,
            collapsed: false,
            disabled: false,
            inline: None,
            deletable: true,
            movable: true,
            editable: true,
            mutation: None,
            comment: None,
            fields: Vec::new(),
            inputs: Vec::new(),
            next: None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn input(&self, name: &str) -> Option<&InputXml> {
        self.inputs.iter().find(|i| i.name == name)
    }

    /// Ids of this block and every nested block, in document order.
    pub fn ids(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_ids(&mut out);
        out
    }

    fn collect_ids(&self, out: &mut Vec<String>) {
        if let Some(id) = &self.id {
            out.push(id.clone());
        }
        let children = self
            .inputs
            .iter()
            .map(|i| &i.child)
            .chain(self.next.iter());
        for child in children {
            for nested in child.shadow.iter().chain(child.block.iter()) {
                nested.collect_ids(out);
            }
        }
    }

    /// Drop every id in the tree so the factory assigns fresh ones.
    pub fn strip_ids(&mut self) {
        self.id = None;
        let children = self
            .inputs
            .iter_mut()
            .map(|i| &mut i.child)
            .chain(self.next.iter_mut());
        for child in children {
            for nested in child.shadow.iter_mut().chain(child.block.iter_mut()) {
                nested.strip_ids();
            }
        }
    }
}

/// Snapshot a live block tree. `include_position` writes `x`/`y`, which is
/// only meaningful for root blocks.
pub fn block_to_xml(graph: &BlockGraph, r: BlockRef, include_position: bool) -> Option<BlockXml> {
    let block = graph.block(r)?;
    let mut xml = BlockXml::new(block.block_type());
    xml.id = Some(block.id().to_string());
    xml.shadow = block.is_shadow();
    xml.position = include_position.then(|| block.position());
    xml.collapsed = block.is_collapsed();
    xml.disabled = block.is_disabled();
    xml.inline = block.inputs_inline();
    xml.deletable = block.is_deletable();
    xml.movable = block.is_movable();
    xml.editable = block.is_editable();
    xml.mutation = block.mutation().cloned();
    xml.comment = block.comment().cloned();
    xml.fields = block
        .fields()
        .filter(|f| f.is_serializable())
        .map(|f| (f.name().to_string(), f.serialized_value()))
        .collect();
    for (i, input) in block.inputs().iter().enumerate() {
        if input.connection().is_none() {
            continue;
        }
        let child = child_to_xml(graph, ConnectionRef::input(r, i));
        if !child.is_empty() {
            xml.inputs.push(InputXml {
                name: input.name().to_string(),
                kind: input.kind(),
                child,
            });
        }
    }
    if block.connection(Slot::Next).is_some() {
        let child = child_to_xml(graph, ConnectionRef::next(r));
        if !child.is_empty() {
            xml.next = Some(child);
        }
    }
    Some(xml)
}

fn child_to_xml(graph: &BlockGraph, socket: ConnectionRef) -> ChildXml {
    let Some(conn) = graph.connection(socket) else {
        return ChildXml::default();
    };
    ChildXml {
        shadow: conn
            .shadow_connection()
            .and_then(|s| block_to_xml(graph, s.block, false))
            .map(Box::new),
        block: conn
            .link()
            .attached()
            .and_then(|t| block_to_xml(graph, t.block, false))
            .map(Box::new),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_and_strip() {
        let mut inner = BlockXml::new("inner");
        inner.id = Some("B".into());
        let mut shadow = BlockXml::new("inner");
        shadow.id = Some("S".into());
        shadow.shadow = true;
        let mut outer = BlockXml::new("outer");
        outer.id = Some("A".into());
        outer.inputs.push(InputXml {
            name: "VALUE".into(),
            kind: InputKind::Value,
            child: ChildXml {
                shadow: Some(Box::new(shadow)),
                block: Some(Box::new(inner)),
            },
        });
        assert_eq!(outer.ids(), vec!["A", "S", "B"]);
        outer.strip_ids();
        assert!(outer.ids().is_empty());
    }
}
