//! Block graph data model.
//!
//! Blocks live in an arena ([`graph::BlockGraph`]) and are addressed by the
//! copyable [`BlockRef`] handle. Connections are addressed by
//! [`connection::ConnectionRef`] (owning block plus slot). Parent/child
//! relationships are never stored; they are derived from connection links.

pub mod block;
pub mod connection;
pub mod field;
pub mod graph;
pub mod input;

pub use block::{Block, BlockFlags, Comment, Mutation};
pub use connection::{
    CanConnect, Connection, ConnectionKind, ConnectionRef, ConnectionState, Link, Slot, checks_compatible,
};
pub use field::{DropdownOption, Field, FieldChange, FieldValue, ObserverId};
pub use graph::BlockGraph;
pub use input::{Input, InputKind};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Arena handle of a block inside a [`BlockGraph`].
///
/// Handles are never reused within one graph, so a stale handle simply
/// fails to resolve instead of aliasing a newer block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockRef(pub(crate) u32);

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A point in workspace coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Both coordinates are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}
