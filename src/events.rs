//! Change records emitted by the controller.
//!
//! Every structural or value change made through
//! [`crate::controller::BlocklyController`] produces one or more
//! [`BlocklyEvent`]s. Events of one logical operation share a group id and
//! are delivered together as an [`EventGroup`] to each registered
//! [`EventsCallback`] whose type filter matches.
//!
//! Events serialize to JSON with a `type` tag:
//!
//! ```json
//! {"type":"change","workspaceId":"..","groupId":"..","blockId":"a1",
//!  "element":"field","name":"NUM","oldValue":"1","newValue":"2"}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::LoadResult;
use crate::model::Point;
use crate::xml::{BlockXml, parse_block_xml};

pub const TYPE_CREATE: u32 = 1 << 0;
pub const TYPE_DELETE: u32 = 1 << 1;
pub const TYPE_CHANGE: u32 = 1 << 2;
pub const TYPE_MOVE: u32 = 1 << 3;
pub const TYPE_ALL: u32 = TYPE_CREATE | TYPE_DELETE | TYPE_CHANGE | TYPE_MOVE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BlocklyEvent {
    Create(CreateEvent),
    Delete(DeleteEvent),
    Move(MoveEvent),
    Change(ChangeEvent),
}

/// A block tree was added to the workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEvent {
    pub workspace_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub block_id: String,
    /// The created tree, including the root's position.
    pub xml: String,
    /// Ids of every block in the tree.
    pub ids: Vec<String>,
}

impl CreateEvent {
    /// Parse the embedded XML back into a block tree description.
    pub fn block_xml(&self) -> LoadResult<BlockXml> {
        parse_block_xml(&self.xml)
    }
}

/// A block tree was removed from the workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteEvent {
    pub workspace_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub block_id: String,
    pub old_xml: String,
    pub ids: Vec<String>,
}

/// Where a block sits: under a parent (through a named input, or `next`
/// when `input_name` is `None`), or as a root at a position.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
}

impl Placement {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// A block was attached, detached or moved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveEvent {
    pub workspace_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub block_id: String,
    pub old: Placement,
    pub new: Placement,
}

/// Which part of a block a [`ChangeEvent`] is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeElement {
    Field,
    Comment,
    Collapsed,
    Disabled,
    Inline,
    Mutate,
}

/// A value on a block changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub workspace_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub block_id: String,
    pub element: ChangeElement,
    /// Field name, for [`ChangeElement::Field`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl BlocklyEvent {
    /// The `TYPE_*` bit of this event.
    pub fn type_id(&self) -> u32 {
        match self {
            BlocklyEvent::Create(_) => TYPE_CREATE,
            BlocklyEvent::Delete(_) => TYPE_DELETE,
            BlocklyEvent::Change(_) => TYPE_CHANGE,
            BlocklyEvent::Move(_) => TYPE_MOVE,
        }
    }

    pub fn block_id(&self) -> &str {
        match self {
            BlocklyEvent::Create(e) => &e.block_id,
            BlocklyEvent::Delete(e) => &e.block_id,
            BlocklyEvent::Move(e) => &e.block_id,
            BlocklyEvent::Change(e) => &e.block_id,
        }
    }

    pub fn workspace_id(&self) -> &str {
        match self {
            BlocklyEvent::Create(e) => &e.workspace_id,
            BlocklyEvent::Delete(e) => &e.workspace_id,
            BlocklyEvent::Move(e) => &e.workspace_id,
            BlocklyEvent::Change(e) => &e.workspace_id,
        }
    }

    pub fn group_id(&self) -> Option<&str> {
        match self {
            BlocklyEvent::Create(e) => e.group_id.as_deref(),
            BlocklyEvent::Delete(e) => e.group_id.as_deref(),
            BlocklyEvent::Move(e) => e.group_id.as_deref(),
            BlocklyEvent::Change(e) => e.group_id.as_deref(),
        }
    }

    pub(crate) fn set_group_id(&mut self, group_id: Option<String>) {
        match self {
            BlocklyEvent::Create(e) => e.group_id = group_id,
            BlocklyEvent::Delete(e) => e.group_id = group_id,
            BlocklyEvent::Move(e) => e.group_id = group_id,
            BlocklyEvent::Change(e) => e.group_id = group_id,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Events produced by one logical operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventGroup {
    pub group_id: String,
    pub events: Vec<BlocklyEvent>,
}

impl EventGroup {
    /// The events matching `type_mask`, or `None` if none match.
    pub fn filtered(&self, type_mask: u32) -> Option<EventGroup> {
        let events: Vec<_> = self
            .events
            .iter()
            .filter(|e| e.type_id() & type_mask != 0)
            .cloned()
            .collect();
        (!events.is_empty()).then(|| EventGroup {
            group_id: self.group_id.clone(),
            events,
        })
    }
}

/// Receives event groups from the controller. Delivery is synchronous; a
/// callback must not mutate the workspace from inside `on_events_fired`.
pub trait EventsCallback {
    /// Bitmask of `TYPE_*` constants this callback wants.
    fn type_filter(&self) -> u32 {
        TYPE_ALL
    }

    fn on_events_fired(&mut self, group: &EventGroup);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change() -> BlocklyEvent {
        BlocklyEvent::Change(ChangeEvent {
            workspace_id: "ws".into(),
            group_id: Some("g1".into()),
            block_id: "a1".into(),
            element: ChangeElement::Field,
            name: Some("NUM".into()),
            old_value: Some("1".into()),
            new_value: Some("2".into()),
        })
    }

    #[test]
    fn test_change_event_json_shape() {
        let json = change().to_json().unwrap();
        assert_eq!(
            json,
            r#"{"type":"change","workspaceId":"ws","groupId":"g1","blockId":"a1","element":"field","name":"NUM","oldValue":"1","newValue":"2"}"#
        );
        assert_eq!(BlocklyEvent::from_json(&json).unwrap(), change());
    }

    #[test]
    fn test_move_event_from_json() {
        let json = r#"{"type":"move","workspaceId":"ws","blockId":"b",
            "old":{"position":{"x":1.0,"y":2.0}},
            "new":{"parentId":"a","inputName":"VALUE"}}"#;
        let BlocklyEvent::Move(event) = BlocklyEvent::from_json(json).unwrap() else {
            panic!("expected a move event");
        };
        assert!(event.old.is_root());
        assert_eq!(event.new.parent_id.as_deref(), Some("a"));
        assert_eq!(event.group_id, None);
    }

    #[test]
    fn test_group_filter() {
        let create = BlocklyEvent::Create(CreateEvent {
            workspace_id: "ws".into(),
            group_id: None,
            block_id: "a".into(),
            xml: "<block type=\"t\" id=\"a\"/>".into(),
            ids: vec!["a".into()],
        });
        let group = EventGroup {
            group_id: "g".into(),
            events: vec![create.clone(), change()],
        };
        assert_eq!(group.filtered(TYPE_CREATE).unwrap().events, vec![create]);
        assert!(group.filtered(TYPE_MOVE | TYPE_DELETE).is_none());
        assert_eq!(group.filtered(TYPE_ALL).unwrap().events.len(), 2);
    }
}
