use super::connection::{Connection, ConnectionKind};
use super::field::Field;

/// The three input kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Holds an `Input` connection for a value block.
    Value,
    /// Holds a `Next` connection for a statement stack.
    Statement,
    /// Fields only.
    Dummy,
}

impl InputKind {
    /// XML element used for a child attached through this input.
    pub fn xml_tag(self) -> Option<&'static str> {
        match self {
            InputKind::Value => Some("value"),
            InputKind::Statement => Some("statement"),
            InputKind::Dummy => None,
        }
    }
}

/// A named socket on a block with its ordered fields.
#[derive(Debug, Clone)]
pub struct Input {
    name: String,
    kind: InputKind,
    pub(crate) fields: Vec<Field>,
    pub(crate) connection: Option<Connection>,
}

impl Input {
    /// A new input. Value and statement inputs get their connection here;
    /// `checks` is ignored for dummy inputs.
    pub fn new(name: impl Into<String>, kind: InputKind, checks: Option<Vec<String>>) -> Self {
        let connection = match kind {
            InputKind::Value => Some(Connection::new(ConnectionKind::Input, checks)),
            InputKind::Statement => Some(Connection::new(ConnectionKind::Next, checks)),
            InputKind::Dummy => None,
        };
        Self {
            name: name.into(),
            kind,
            fields: Vec::new(),
            connection,
        }
    }

    pub fn with_fields(mut self, fields: Vec<Field>) -> Self {
        self.fields = fields;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> InputKind {
        self.kind
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    pub(crate) fn detached_copy(&self) -> Self {
        Self {
            name: self.name.clone(),
            kind: self.kind,
            fields: self.fields.clone(),
            connection: self.connection.as_ref().map(Connection::detached_copy),
        }
    }
}
