//! Block graph and controller for Blockly-style visual programming editors.
//!
//! Blocks are described by JSON definitions held in a [`BlockFactory`],
//! instantiated into a [`Workspace`] and edited exclusively through the
//! [`BlocklyController`], which keeps the connection index in sync and
//! reports every change as a group of [`events::BlocklyEvent`]s.
//! Workspaces round-trip through Blockly XML (see [`xml`]).

pub mod connection_manager;
pub mod controller;
pub mod error;
pub mod events;
pub mod factory;
pub mod model;
pub mod names;
pub mod workspace;
pub mod xml;

pub use controller::{BlocklyController, CallbackId, ControllerConfig, VariableCallback};
pub use error::{BlockLoadError, ConnectionError, ControllerError, DefinitionError};
pub use events::{BlocklyEvent, EventGroup, EventsCallback};
pub use factory::{BlockDefinition, BlockFactory, BlockTemplate};
pub use model::{Block, BlockGraph, BlockRef, ConnectionRef, Point};
pub use workspace::Workspace;
