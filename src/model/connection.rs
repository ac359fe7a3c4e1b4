//! Connections: typed attachment points on a block.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{BlockRef, Point};

/// The four connection kinds. Pairing is `Input`/`Output` and
/// `Previous`/`Next`; a statement input carries a `Next` connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    Input,
    Output,
    Previous,
    Next,
}

impl ConnectionKind {
    pub const ALL: [ConnectionKind; 4] = [
        ConnectionKind::Input,
        ConnectionKind::Output,
        ConnectionKind::Previous,
        ConnectionKind::Next,
    ];

    /// The only kind this kind may connect to.
    pub fn opposite(self) -> ConnectionKind {
        match self {
            ConnectionKind::Input => ConnectionKind::Output,
            ConnectionKind::Output => ConnectionKind::Input,
            ConnectionKind::Previous => ConnectionKind::Next,
            ConnectionKind::Next => ConnectionKind::Previous,
        }
    }

    /// Superior connections are sockets (they hold children): `Input` and
    /// `Next`. `Output` and `Previous` are plugs.
    pub fn is_superior(self) -> bool {
        matches!(self, ConnectionKind::Input | ConnectionKind::Next)
    }

    pub(crate) fn index(self) -> usize {
        match self {
            ConnectionKind::Input => 0,
            ConnectionKind::Output => 1,
            ConnectionKind::Previous => 2,
            ConnectionKind::Next => 3,
        }
    }
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionKind::Input => "input",
            ConnectionKind::Output => "output",
            ConnectionKind::Previous => "previous",
            ConnectionKind::Next => "next",
        };
        f.write_str(s)
    }
}

/// Where on its block a connection lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    Previous,
    Next,
    Output,
    /// Connection of the input at this index in the block's input list.
    Input(usize),
}

/// Identity of a connection: owning block plus slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionRef {
    pub block: BlockRef,
    pub slot: Slot,
}

impl ConnectionRef {
    pub fn new(block: BlockRef, slot: Slot) -> Self {
        Self { block, slot }
    }

    pub fn previous(block: BlockRef) -> Self {
        Self::new(block, Slot::Previous)
    }

    pub fn next(block: BlockRef) -> Self {
        Self::new(block, Slot::Next)
    }

    pub fn output(block: BlockRef) -> Self {
        Self::new(block, Slot::Output)
    }

    pub fn input(block: BlockRef, index: usize) -> Self {
        Self::new(block, Slot::Input(index))
    }
}

/// What a connection is currently linked to.
///
/// `Shadow` only ever appears on a socket whose active target is its own
/// assigned shadow connection. A real block occupying the socket is
/// `Attached`, and the plug of an active shadow block is `Attached` to
/// the socket it fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Link {
    #[default]
    Empty,
    Attached(ConnectionRef),
    Shadow(ConnectionRef),
}

impl Link {
    pub fn target(self) -> Option<ConnectionRef> {
        match self {
            Link::Empty => None,
            Link::Attached(c) | Link::Shadow(c) => Some(c),
        }
    }

    pub fn attached(self) -> Option<ConnectionRef> {
        match self {
            Link::Attached(c) => Some(c),
            _ => None,
        }
    }
}

/// Coarse connection state, derived from the [`Link`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    ConnectedReal,
    ConnectedShadow,
}

/// Result of [`crate::model::BlockGraph::can_connect_with_reason`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CanConnect {
    CanConnect,
    TargetNull,
    SelfConnection,
    WrongType,
    MustDisconnect,
    ChecksFailed,
}

impl fmt::Display for CanConnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CanConnect::CanConnect => "connection allowed",
            CanConnect::TargetNull => "target is null",
            CanConnect::SelfConnection => "connection to own block",
            CanConnect::WrongType => "connection kinds do not pair",
            CanConnect::MustDisconnect => "connection must be disconnected first",
            CanConnect::ChecksFailed => "type checks failed",
        };
        f.write_str(s)
    }
}

/// A typed attachment point, exclusively owned by its block.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    kind: ConnectionKind,
    checks: Option<Vec<String>>,
    pub(crate) link: Link,
    pub(crate) shadow: Option<ConnectionRef>,
    /// Position relative to the owning block, maintained by the view layer.
    offset: Point,
}

impl Connection {
    pub fn new(kind: ConnectionKind, checks: Option<Vec<String>>) -> Self {
        Self {
            kind,
            checks,
            link: Link::Empty,
            shadow: None,
            offset: Point::ORIGIN,
        }
    }

    pub fn kind(&self) -> ConnectionKind {
        self.kind
    }

    /// `None` accepts anything.
    pub fn checks(&self) -> Option<&[String]> {
        self.checks.as_deref()
    }

    pub fn link(&self) -> Link {
        self.link
    }

    /// The active target, real or shadow.
    pub fn target(&self) -> Option<ConnectionRef> {
        self.link.target()
    }

    /// The assigned shadow partner, whether or not it is currently active.
    pub fn shadow_connection(&self) -> Option<ConnectionRef> {
        self.shadow
    }

    pub fn offset(&self) -> Point {
        self.offset
    }

    pub fn set_offset(&mut self, offset: Point) {
        self.offset = offset;
    }

    pub fn state(&self) -> ConnectionState {
        match self.link {
            Link::Empty => ConnectionState::Unconnected,
            Link::Attached(_) => ConnectionState::ConnectedReal,
            Link::Shadow(_) => ConnectionState::ConnectedShadow,
        }
    }

    /// True when a block (not a fallback shadow) holds this connection.
    pub fn is_connected(&self) -> bool {
        matches!(self.link, Link::Attached(_))
    }

    /// A copy of the connection's shape with every link cleared.
    pub(crate) fn detached_copy(&self) -> Self {
        Self {
            kind: self.kind,
            checks: self.checks.clone(),
            link: Link::Empty,
            shadow: None,
            offset: self.offset,
        }
    }
}

/// Two check lists are compatible when either is unconstrained or they
/// share at least one entry.
pub fn checks_compatible(a: Option<&[String]>, b: Option<&[String]>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.iter().any(|check| b.contains(check)),
        _ => true,
    }
}
