//! The [`Block`] node type.
//!
//! A block exclusively owns its connections, inputs and fields. It does not
//! own the blocks attached to it; those are separate arena entries reached
//! through connection links.

use indexmap::IndexMap;

use super::connection::{Connection, ConnectionKind, Slot};
use super::field::Field;
use super::input::Input;
use super::Point;

/// User-permission flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockFlags {
    pub deletable: bool,
    pub movable: bool,
    pub editable: bool,
}

impl Default for BlockFlags {
    fn default() -> Self {
        Self {
            deletable: true,
            movable: true,
            editable: true,
        }
    }
}

/// A block comment (`<comment pinned=".." h=".." w="..">text</comment>`).
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub text: String,
    pub pinned: bool,
    pub size: Option<(f32, f32)>,
}

impl Comment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            pinned: false,
            size: None,
        }
    }
}

/// Opaque mutation payload, carried as the attributes of `<mutation>`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mutation {
    pub attributes: IndexMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct Block {
    id: String,
    block_type: String,
    shadow: bool,
    pub(crate) position: Point,
    pub flags: BlockFlags,
    pub(crate) collapsed: bool,
    pub(crate) disabled: bool,
    /// `None` defers to the definition's default layout.
    pub(crate) inputs_inline: Option<bool>,
    pub(crate) comment: Option<Comment>,
    pub(crate) mutation: Option<Mutation>,
    pub(crate) previous: Option<Connection>,
    pub(crate) next: Option<Connection>,
    pub(crate) output: Option<Connection>,
    pub(crate) inputs: Vec<Input>,
}

impl Block {
    /// A bare block with no connections or inputs. Normally obtained
    /// through [`crate::factory::BlockFactory`].
    pub fn new(id: impl Into<String>, block_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            block_type: block_type.into(),
            shadow: false,
            position: Point::ORIGIN,
            flags: BlockFlags::default(),
            collapsed: false,
            disabled: false,
            inputs_inline: None,
            comment: None,
            mutation: None,
            previous: None,
            next: None,
            output: None,
            inputs: Vec::new(),
        }
    }

    pub fn with_previous(mut self, checks: Option<Vec<String>>) -> Self {
        self.previous = Some(Connection::new(ConnectionKind::Previous, checks));
        self
    }

    pub fn with_next(mut self, checks: Option<Vec<String>>) -> Self {
        self.next = Some(Connection::new(ConnectionKind::Next, checks));
        self
    }

    pub fn with_output(mut self, checks: Option<Vec<String>>) -> Self {
        self.output = Some(Connection::new(ConnectionKind::Output, checks));
        self
    }

    pub fn with_input(mut self, input: Input) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn block_type(&self) -> &str {
        &self.block_type
    }

    pub fn is_shadow(&self) -> bool {
        self.shadow
    }

    pub(crate) fn set_shadow(&mut self, shadow: bool) {
        self.shadow = shadow;
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn is_deletable(&self) -> bool {
        self.flags.deletable
    }

    pub fn is_movable(&self) -> bool {
        self.flags.movable
    }

    pub fn is_editable(&self) -> bool {
        self.flags.editable
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn inputs_inline(&self) -> Option<bool> {
        self.inputs_inline
    }

    pub fn comment(&self) -> Option<&Comment> {
        self.comment.as_ref()
    }

    pub fn mutation(&self) -> Option<&Mutation> {
        self.mutation.as_ref()
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn input(&self, name: &str) -> Option<&Input> {
        self.inputs.iter().find(|i| i.name() == name)
    }

    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|i| i.name() == name)
    }

    pub fn connection(&self, slot: Slot) -> Option<&Connection> {
        match slot {
            Slot::Previous => self.previous.as_ref(),
            Slot::Next => self.next.as_ref(),
            Slot::Output => self.output.as_ref(),
            Slot::Input(i) => self.inputs.get(i).and_then(|input| input.connection.as_ref()),
        }
    }

    pub(crate) fn connection_mut(&mut self, slot: Slot) -> Option<&mut Connection> {
        match slot {
            Slot::Previous => self.previous.as_mut(),
            Slot::Next => self.next.as_mut(),
            Slot::Output => self.output.as_mut(),
            Slot::Input(i) => self
                .inputs
                .get_mut(i)
                .and_then(|input| input.connection.as_mut()),
        }
    }

    /// Slots of every connection on this block: output, previous, inputs in
    /// order, then next.
    pub fn slots(&self) -> Vec<Slot> {
        let mut slots = Vec::new();
        if self.output.is_some() {
            slots.push(Slot::Output);
        }
        if self.previous.is_some() {
            slots.push(Slot::Previous);
        }
        for (i, input) in self.inputs.iter().enumerate() {
            if input.connection.is_some() {
                slots.push(Slot::Input(i));
            }
        }
        if self.next.is_some() {
            slots.push(Slot::Next);
        }
        slots
    }

    /// Slots of the sockets that can hold children: inputs in order, then next.
    pub fn superior_slots(&self) -> Vec<Slot> {
        self.slots()
            .into_iter()
            .filter(|s| !matches!(s, Slot::Output | Slot::Previous))
            .collect()
    }

    /// The plug attaching this block to a parent: output, else previous.
    pub fn inferior_slot(&self) -> Option<Slot> {
        if self.output.is_some() {
            Some(Slot::Output)
        } else if self.previous.is_some() {
            Some(Slot::Previous)
        } else {
            None
        }
    }

    /// Fields of all inputs, in order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.inputs.iter().flat_map(|i| i.fields.iter())
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields().find(|f| f.name() == name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.inputs
            .iter_mut()
            .flat_map(|i| i.fields.iter_mut())
            .find(|f| f.name() == name)
    }

    pub(crate) fn fields_mut(&mut self) -> impl Iterator<Item = &mut Field> {
        self.inputs.iter_mut().flat_map(|i| i.fields.iter_mut())
    }

    /// A copy with the given id and every connection link cleared.
    pub(crate) fn detached_copy(&self, id: String) -> Self {
        Self {
            id,
            block_type: self.block_type.clone(),
            shadow: self.shadow,
            position: self.position,
            flags: self.flags,
            collapsed: self.collapsed,
            disabled: self.disabled,
            inputs_inline: self.inputs_inline,
            comment: self.comment.clone(),
            mutation: self.mutation.clone(),
            previous: self.previous.as_ref().map(Connection::detached_copy),
            next: self.next.as_ref().map(Connection::detached_copy),
            output: self.output.as_ref().map(Connection::detached_copy),
            inputs: self.inputs.iter().map(Input::detached_copy).collect(),
        }
    }
}
