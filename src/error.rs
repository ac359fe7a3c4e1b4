//! Error types for the block engine.
//!
//! Structural failures (caller bugs such as connecting two outputs) are
//! [`ConnectionError`]s. Anything that goes wrong while turning XML into
//! blocks is a [`BlockLoadError`], and malformed JSON block definitions are
//! [`DefinitionError`]s. The controller folds all of them into
//! [`ControllerError`].

use thiserror::Error;

use crate::model::connection::CanConnect;

/// Structural errors raised by the connection graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectionError {
    #[error("cannot connect: {reason}")]
    CannotConnect { reason: CanConnect },

    #[error("connection kinds {from} and {to} cannot be paired")]
    WrongKind { from: String, to: String },

    #[error("a connection cannot connect to itself")]
    SelfConnection,

    #[error("connection does not exist in this workspace")]
    UnknownConnection,
}

/// Errors raised while loading blocks from XML.
///
/// Loading is all-or-nothing per top-level call: when one of these is
/// returned no block from that call is left behind in the workspace.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BlockLoadError {
    #[error("malformed XML: {0}")]
    MalformedXml(String),

    #[error("expected <{expected}> element, found <{found}>")]
    UnexpectedElement { expected: String, found: String },

    #[error("block element is missing the 'type' attribute")]
    MissingType,

    #[error("unknown block type '{0}'")]
    UnknownBlockType(String),

    #[error("block '{block_type}' has no input named '{name}'")]
    UnknownInput { block_type: String, name: String },

    #[error("input '{0}' has more than one block")]
    MultipleBlocksForInput(String),

    #[error("input '{0}' has more than one shadow")]
    MultipleShadowsForInput(String),

    #[error("shadow block '{0}' contains a non-shadow child")]
    ShadowWithRealChild(String),

    #[error("shadow block '{0}' contains a variable field")]
    ShadowWithVariable(String),

    #[error("block id '{0}' is already in use")]
    DuplicateId(String),

    #[error("invalid value '{value}' for attribute '{attribute}'")]
    InvalidAttribute { attribute: String, value: String },

    #[error("block '{block_type}' cannot attach a child through '{name}'")]
    IncompatibleChild { block_type: String, name: String },

    #[error("block {0} to copy does not exist")]
    MissingCopySource(String),
}

/// Errors raised while reading JSON block definitions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DefinitionError {
    #[error("failed to parse block definition JSON: {0}")]
    Json(String),

    #[error("block definition is missing a 'type' string")]
    MissingType,

    #[error("definition '{block_type}': {message}")]
    Invalid { block_type: String, message: String },

    #[error("failed to read definitions from {path}: {message}")]
    Source { path: String, message: String },
}

/// Errors surfaced by [`crate::controller::BlocklyController`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControllerError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Load(#[from] BlockLoadError),

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("block is not part of this workspace")]
    UnknownBlock,

    #[error("block '{0}' is not a root block")]
    NotRoot(String),

    #[error("connecting would place block '{0}' inside its own subtree")]
    WouldCreateCycle(String),

    #[error("a real block cannot be attached to shadow block '{0}'")]
    ShadowParent(String),

    #[error("shadow block '{0}' cannot be moved by the user")]
    ShadowBlock(String),

    #[error("block '{block}' has no field named '{field}'")]
    UnknownField { block: String, field: String },

    #[error("value '{value}' was rejected by field '{field}'")]
    InvalidFieldValue { field: String, value: String },

    #[error("position ({x}, {y}) is not finite")]
    InvalidPosition { x: f32, y: f32 },
}

pub type LoadResult<T> = Result<T, BlockLoadError>;
pub type ControllerResult<T> = Result<T, ControllerError>;
