//! The block arena and the low-level connection state machine.
//!
//! [`BlockGraph`] owns every block of a workspace (attached, detached,
//! trashed or hidden shadow) and is the only place where connection links
//! change. It knows nothing about roots, events or the spatial index; those
//! belong to [`crate::workspace::Workspace`] and the controller.

use indexmap::IndexMap;
use std::collections::HashMap;

use super::block::Block;
use super::connection::{
    CanConnect, Connection, ConnectionKind, ConnectionRef, Link, Slot, checks_compatible,
};
use super::{BlockRef, Point};
use crate::error::{BlockLoadError, ConnectionError};

#[derive(Debug, Default)]
pub struct BlockGraph {
    blocks: IndexMap<BlockRef, Block>,
    ids: HashMap<String, BlockRef>,
    next_ref: u32,
}

impl BlockGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Arena ──────────────────────────────────────────────────────────

    /// Add a block. Fails if its id is already used in this graph.
    pub fn insert(&mut self, block: Block) -> Result<BlockRef, BlockLoadError> {
        if self.ids.contains_key(block.id()) {
            return Err(BlockLoadError::DuplicateId(block.id().to_string()));
        }
        let r = BlockRef(self.next_ref);
        self.next_ref += 1;
        self.ids.insert(block.id().to_string(), r);
        self.blocks.insert(r, block);
        Ok(r)
    }

    /// Remove a single block. Callers disconnect it first; any links
    /// still pointing at it from other blocks are cleared here so nothing
    /// dangles.
    pub fn remove(&mut self, r: BlockRef) -> Option<Block> {
        let block = self.blocks.shift_remove(&r)?;
        self.ids.remove(block.id());
        for other in self.blocks.values_mut() {
            for slot in other.slots() {
                if let Some(conn) = other.connection_mut(slot) {
                    if conn.link.target().is_some_and(|t| t.block == r) {
                        conn.link = Link::Empty;
                    }
                    if conn.shadow.is_some_and(|s| s.block == r) {
                        conn.shadow = None;
                    }
                }
            }
        }
        Some(block)
    }

    /// Remove a block together with every block below it, including
    /// hidden shadows. Returns the removed blocks' ids.
    pub fn remove_tree(&mut self, root: BlockRef) -> Vec<String> {
        let tree = self.subtree_with_shadows(root);
        let mut removed = Vec::with_capacity(tree.len());
        for r in tree {
            if let Some(block) = self.remove(r) {
                removed.push(block.id().to_string());
            }
        }
        removed
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn contains(&self, r: BlockRef) -> bool {
        self.blocks.contains_key(&r)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.ids.contains_key(id)
    }

    pub fn lookup(&self, id: &str) -> Option<BlockRef> {
        self.ids.get(id).copied()
    }

    pub fn block(&self, r: BlockRef) -> Option<&Block> {
        self.blocks.get(&r)
    }

    pub fn block_mut(&mut self, r: BlockRef) -> Option<&mut Block> {
        self.blocks.get_mut(&r)
    }

    pub fn iter(&self) -> impl Iterator<Item = (BlockRef, &Block)> {
        self.blocks.iter().map(|(r, b)| (*r, b))
    }

    pub fn connection(&self, c: ConnectionRef) -> Option<&Connection> {
        self.blocks.get(&c.block)?.connection(c.slot)
    }

    fn connection_mut(&mut self, c: ConnectionRef) -> Option<&mut Connection> {
        self.blocks.get_mut(&c.block)?.connection_mut(c.slot)
    }

    fn require(&self, c: ConnectionRef) -> Result<&Connection, ConnectionError> {
        self.connection(c).ok_or(ConnectionError::UnknownConnection)
    }

    fn set_link(&mut self, c: ConnectionRef, link: Link) {
        if let Some(conn) = self.connection_mut(c) {
            conn.link = link;
        }
    }

    pub fn is_shadow(&self, r: BlockRef) -> bool {
        self.block(r).is_some_and(Block::is_shadow)
    }

    // ── Connection rules ───────────────────────────────────────────────

    /// Why `a` may or may not connect to `b`.
    ///
    /// Checks run in a fixed order: missing target, same block, kind
    /// pairing, occupancy by a different block, then type checks. A socket
    /// filled only by its shadow does not count as occupied.
    pub fn can_connect_with_reason(&self, a: ConnectionRef, b: Option<ConnectionRef>) -> CanConnect {
        self.connect_reason(a, b, true)
    }

    /// Like [`Self::can_connect_with_reason`], but a target held by another
    /// block is judged as if it were free. Never returns
    /// [`CanConnect::MustDisconnect`].
    pub fn can_connect_ignoring_occupancy(&self, a: ConnectionRef, b: Option<ConnectionRef>) -> CanConnect {
        self.connect_reason(a, b, false)
    }

    fn connect_reason(&self, a: ConnectionRef, b: Option<ConnectionRef>, check_occupancy: bool) -> CanConnect {
        let Some(b) = b else {
            return CanConnect::TargetNull;
        };
        let (Some(ca), Some(cb)) = (self.connection(a), self.connection(b)) else {
            return CanConnect::TargetNull;
        };
        if a.block == b.block {
            return CanConnect::SelfConnection;
        }
        if ca.kind().opposite() != cb.kind() {
            return CanConnect::WrongType;
        }
        let occupied_elsewhere =
            |conn: &Connection, other: ConnectionRef| conn.link.attached().is_some_and(|t| t != other);
        if check_occupancy && (occupied_elsewhere(ca, b) || occupied_elsewhere(cb, a)) {
            return CanConnect::MustDisconnect;
        }
        if !checks_compatible(ca.checks(), cb.checks()) {
            return CanConnect::ChecksFailed;
        }
        CanConnect::CanConnect
    }

    /// Hard invariant check: fails on self-connection or a kind mismatch.
    pub fn check_connection(&self, a: ConnectionRef, b: ConnectionRef) -> Result<(), ConnectionError> {
        let ca = self.require(a)?;
        let cb = self.require(b)?;
        if a.block == b.block {
            return Err(ConnectionError::SelfConnection);
        }
        if ca.kind().opposite() != cb.kind() {
            return Err(ConnectionError::WrongKind {
                from: ca.kind().to_string(),
                to: cb.kind().to_string(),
            });
        }
        Ok(())
    }

    /// Order a pair as `(socket, plug)`.
    pub fn orient(&self, a: ConnectionRef, b: ConnectionRef) -> Result<(ConnectionRef, ConnectionRef), ConnectionError> {
        self.check_connection(a, b)?;
        if self.require(a)?.kind().is_superior() {
            Ok((a, b))
        } else {
            Ok((b, a))
        }
    }

    // ── Connection mutation ────────────────────────────────────────────

    /// Connect two connections symmetrically.
    ///
    /// An active shadow in the socket is displaced silently (its plug is
    /// cleared; it stays assigned so it can come back later). Connecting a
    /// pair that is already connected is a no-op.
    pub fn connect(&mut self, a: ConnectionRef, b: ConnectionRef) -> Result<(), ConnectionError> {
        match self.can_connect_with_reason(a, Some(b)) {
            CanConnect::CanConnect => {}
            reason => return Err(ConnectionError::CannotConnect { reason }),
        }
        let (socket, plug) = self.orient(a, b)?;
        let current = self.require(socket)?.link;
        match current {
            Link::Attached(t) if t == plug => return Ok(()),
            Link::Shadow(shadow_plug) => self.set_link(shadow_plug, Link::Empty),
            _ => {}
        }
        self.set_link(socket, Link::Attached(plug));
        self.set_link(plug, Link::Attached(socket));
        Ok(())
    }

    /// Break the real link held by `c`, from either side.
    ///
    /// If the socket has a shadow assigned, the shadow becomes the active
    /// target again. Returns the connection that was on the other side.
    /// Shadow occupancy is not a real link and is left alone.
    pub fn disconnect(&mut self, c: ConnectionRef) -> Option<ConnectionRef> {
        let other = self.connection(c)?.link.attached()?;
        let (socket, plug) = if self.connection(c)?.kind().is_superior() {
            (c, other)
        } else {
            (other, c)
        };
        if matches!(self.connection(socket)?.link, Link::Shadow(_)) {
            // `c` is the plug of an active shadow.
            return None;
        }
        self.set_link(plug, Link::Empty);
        self.set_link(socket, Link::Empty);
        if let Some(shadow_plug) = self.connection(socket)?.shadow {
            self.set_link(socket, Link::Shadow(shadow_plug));
            self.set_link(shadow_plug, Link::Attached(socket));
        }
        Some(other)
    }

    /// Assign (or clear) the shadow partner of a socket.
    ///
    /// The shadow only becomes active when no real block occupies the socket.
    /// A previously active shadow is detached.
    pub fn set_shadow_connection(
        &mut self,
        socket: ConnectionRef,
        shadow: Option<ConnectionRef>,
    ) -> Result<(), ConnectionError> {
        let socket_conn = self.require(socket)?;
        if !socket_conn.kind().is_superior() {
            return Err(ConnectionError::WrongKind {
                from: socket_conn.kind().to_string(),
                to: "shadow".to_string(),
            });
        }
        let link = socket_conn.link;
        let old_shadow = socket_conn.shadow;
        if let Some(s) = shadow {
            self.check_connection(socket, s)?;
            if self.require(s)?.link.attached().is_some_and(|t| t != socket) {
                return Err(ConnectionError::CannotConnect {
                    reason: CanConnect::MustDisconnect,
                });
            }
        }
        if let (Some(old), Link::Shadow(_)) = (old_shadow, link) {
            self.set_link(old, Link::Empty);
        }
        if let Some(conn) = self.connection_mut(socket) {
            conn.shadow = shadow;
        }
        if !matches!(link, Link::Attached(_)) {
            match shadow {
                Some(s) => {
                    self.set_link(socket, Link::Shadow(s));
                    self.set_link(s, Link::Attached(socket));
                }
                None => self.set_link(socket, Link::Empty),
            }
        }
        Ok(())
    }

    // ── Positions ──────────────────────────────────────────────────────

    /// Workspace position of a connection: block position plus offset.
    pub fn connection_position(&self, c: ConnectionRef) -> Option<Point> {
        let block = self.block(c.block)?;
        Some(block.position + block.connection(c.slot)?.offset())
    }

    pub fn distance_between(&self, a: ConnectionRef, b: ConnectionRef) -> Option<f32> {
        Some(self.connection_position(a)?.distance_to(self.connection_position(b)?))
    }

    pub fn set_connection_offset(&mut self, c: ConnectionRef, offset: Point) -> bool {
        match self.connection_mut(c) {
            Some(conn) => {
                conn.set_offset(offset);
                true
            }
            None => false,
        }
    }

    /// Shift a block and everything below it, hidden shadows included.
    pub fn move_tree_by(&mut self, root: BlockRef, delta: Point) {
        for r in self.subtree_with_shadows(root) {
            if let Some(block) = self.block_mut(r) {
                block.position = block.position + delta;
            }
        }
    }

    /// Move a block (and its tree) so it sits at `position`.
    pub fn move_tree_to(&mut self, root: BlockRef, position: Point) {
        if let Some(current) = self.block(root).map(Block::position) {
            self.move_tree_by(root, position - current);
        }
    }

    /// Move a connected block so its plug coincides with its socket.
    pub fn snap_to_parent(&mut self, r: BlockRef) {
        let Some(plug) = self.inferior_connection(r) else {
            return;
        };
        let Some(socket) = self.connection(plug).and_then(|c| c.link.attached()) else {
            return;
        };
        if let (Some(from), Some(to)) = (self.connection_position(plug), self.connection_position(socket)) {
            self.move_tree_by(r, to - from);
        }
    }

    // ── Structure queries ──────────────────────────────────────────────

    /// The plug (output or previous) of a block.
    pub fn inferior_connection(&self, r: BlockRef) -> Option<ConnectionRef> {
        let slot = self.block(r)?.inferior_slot()?;
        Some(ConnectionRef::new(r, slot))
    }

    /// The socket this block is attached to, if any.
    pub fn parent_connection(&self, r: BlockRef) -> Option<ConnectionRef> {
        let plug = self.inferior_connection(r)?;
        self.connection(plug)?.link.attached()
    }

    /// Derived parent block.
    pub fn parent_of(&self, r: BlockRef) -> Option<BlockRef> {
        self.parent_connection(r).map(|c| c.block)
    }

    /// Walk parents up to the top of the tree.
    pub fn root_of(&self, r: BlockRef) -> BlockRef {
        let mut current = r;
        while let Some(parent) = self.parent_of(current) {
            current = parent;
        }
        current
    }

    /// True if `ancestor` is `r` or lies above it.
    pub fn is_ancestor(&self, ancestor: BlockRef, r: BlockRef) -> bool {
        let mut current = Some(r);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.parent_of(c);
        }
        false
    }

    /// The block actively filling a socket, real or shadow.
    pub fn target_block(&self, c: ConnectionRef) -> Option<BlockRef> {
        self.connection(c)?.target().map(|t| t.block)
    }

    /// The real block filling a socket; `None` when empty or shadow-filled.
    pub fn real_target_block(&self, c: ConnectionRef) -> Option<BlockRef> {
        self.connection(c)?.link.attached().map(|t| t.block)
    }

    /// Blocks actively attached below `r`, in input order then next.
    pub fn children(&self, r: BlockRef) -> Vec<BlockRef> {
        let Some(block) = self.block(r) else {
            return Vec::new();
        };
        block
            .superior_slots()
            .into_iter()
            .filter_map(|slot| block.connection(slot)?.target().map(|t| t.block))
            .collect()
    }

    /// `r` and every block actively attached below it.
    pub fn subtree(&self, r: BlockRef) -> Vec<BlockRef> {
        let mut out = Vec::new();
        let mut stack = vec![r];
        while let Some(current) = stack.pop() {
            if !self.contains(current) {
                continue;
            }
            out.push(current);
            let mut children = self.children(current);
            children.reverse();
            stack.extend(children);
        }
        out
    }

    /// Every block actively attached below `r`, excluding `r` itself.
    pub fn descendants(&self, r: BlockRef) -> Vec<BlockRef> {
        let mut out = self.subtree(r);
        if !out.is_empty() {
            out.remove(0);
        }
        out
    }

    /// Like [`Self::subtree`] but also visits assigned shadows that are
    /// currently hidden behind a real block.
    pub fn subtree_with_shadows(&self, r: BlockRef) -> Vec<BlockRef> {
        let mut out = Vec::new();
        let mut stack = vec![r];
        while let Some(current) = stack.pop() {
            let Some(block) = self.block(current) else {
                continue;
            };
            if out.contains(&current) {
                continue;
            }
            out.push(current);
            let mut below = Vec::new();
            for slot in block.superior_slots() {
                let Some(conn) = block.connection(slot) else {
                    continue;
                };
                if let Some(t) = conn.target() {
                    below.push(t.block);
                }
                if let Some(s) = conn.shadow {
                    if conn.target() != Some(s) {
                        below.push(s.block);
                    }
                }
            }
            below.reverse();
            stack.extend(below);
        }
        out
    }

    /// Follow real `next` links to the bottom of a statement stack.
    pub fn last_block_in_sequence(&self, r: BlockRef) -> BlockRef {
        let mut current = r;
        while let Some(next) = self.real_target_block(ConnectionRef::next(current)) {
            current = next;
        }
        current
    }

    /// Find where an orphaned value block can be re-attached below `start`.
    ///
    /// Descends through blocks that have exactly one value input compatible
    /// with `orphan_plug`. Stops at the first such input that is empty or
    /// filled only by a shadow. Returns `None` if any level offers zero or
    /// several candidate inputs.
    pub fn last_unconnected_input_in_row(
        &self,
        start: BlockRef,
        orphan_plug: ConnectionRef,
    ) -> Option<ConnectionRef> {
        let orphan_checks = self.connection(orphan_plug)?.checks();
        let mut current = start;
        loop {
            let block = self.block(current)?;
            let mut single = None;
            for (i, input) in block.inputs().iter().enumerate() {
                let Some(conn) = input.connection() else {
                    continue;
                };
                if conn.kind() == ConnectionKind::Input
                    && checks_compatible(conn.checks(), orphan_checks)
                {
                    if single.is_some() {
                        return None;
                    }
                    single = Some(ConnectionRef::input(current, i));
                }
            }
            let candidate = single?;
            match self.real_target_block(candidate) {
                Some(child) => current = child,
                None => return Some(candidate),
            }
        }
    }

    /// Name of the input holding a block, `None` for roots and `next` links.
    pub fn parent_input_name(&self, r: BlockRef) -> Option<String> {
        let socket = self.parent_connection(r)?;
        match socket.slot {
            Slot::Input(i) => Some(self.block(socket.block)?.inputs().get(i)?.name().to_string()),
            _ => None,
        }
    }
}
