//! Connect, splice, bump and extract.

use std::collections::HashSet;

use super::{BlocklyController, require_finite};
use crate::error::{ConnectionError, ControllerError, ControllerResult};
use crate::model::{
    BlockRef, CanConnect, ConnectionKind, ConnectionRef, Point, Slot, checks_compatible,
};

impl BlocklyController {
    /// Connect `dragged` to `target`.
    ///
    /// Either side may be the socket. The plug's block is detached from
    /// wherever it was first. A real block already in the socket (the
    /// remainder) is re-attached below the new child when possible:
    /// value blocks go to the single compatible empty input found by
    /// [`crate::model::BlockGraph::last_unconnected_input_in_row`],
    /// statements to the end of the child's `next` chain. Otherwise the
    /// remainder is bumped to a new root position. A shadow in the socket
    /// is displaced silently.
    ///
    /// Returns `Ok(false)` without changing anything when the type checks
    /// do not match. Wrong kinds and self-connections are errors.
    pub fn connect(&mut self, dragged: ConnectionRef, target: ConnectionRef) -> ControllerResult<bool> {
        let graph = self.graph();
        graph.check_connection(dragged, target)?;
        if !self.workspace.is_live(dragged.block) || !self.workspace.is_live(target.block) {
            return Err(ControllerError::UnknownBlock);
        }
        let (socket, plug) = graph.orient(dragged, target)?;
        let child = plug.block;
        let parent = socket.block;
        if graph.is_shadow(child) {
            return Err(ControllerError::ShadowBlock(self.block_id(child)));
        }
        if graph.is_shadow(parent) {
            return Err(ControllerError::ShadowParent(self.block_id(parent)));
        }
        if graph.is_ancestor(child, parent) {
            return Err(ControllerError::WouldCreateCycle(self.block_id(child)));
        }
        let (Some(socket_conn), Some(plug_conn)) = (graph.connection(socket), graph.connection(plug)) else {
            return Err(ConnectionError::UnknownConnection.into());
        };
        if plug_conn.link().attached() == Some(socket) {
            return Ok(true);
        }
        if !checks_compatible(socket_conn.checks(), plug_conn.checks()) {
            tracing::warn!(
                child = %self.block_id(child),
                parent = %self.block_id(parent),
                "{}",
                CanConnect::ChecksFailed
            );
            return Ok(false);
        }
        let dragging_socket = dragged == socket;
        self.group_and_fire(|this| {
            this.connect_checked(socket, plug, dragging_socket);
            Ok(true)
        })
    }

    fn connect_checked(&mut self, socket: ConnectionRef, plug: ConnectionRef, dragging_socket: bool) {
        let child = plug.block;
        let parent = socket.block;
        let remainder = self.graph().real_target_block(socket);
        let child_before = self.placement(child);
        let remainder_before = remainder.map(|r| (r, self.placement(r)));

        let old_child_root = self.graph().root_of(child);
        let parent_root = self.graph().root_of(parent);
        self.workspace.unindex_tree(old_child_root);
        self.workspace.unindex_tree(parent_root);

        // Detach the child from its old socket, or from the root set.
        if self.graph().parent_connection(child).is_some() {
            self.workspace.graph_mut().disconnect(plug);
        } else {
            self.workspace.remove_root(child);
        }
        if remainder.is_some() {
            self.workspace.graph_mut().disconnect(socket);
        }

        let graph = self.workspace.graph_mut();
        if dragging_socket {
            // The dragged tree moves so its socket lands on the still child.
            if let (Some(from), Some(to)) = (graph.connection_position(socket), graph.connection_position(plug)) {
                let root = graph.root_of(parent);
                graph.move_tree_by(root, to - from);
            }
        }
        if let Err(e) = graph.connect(socket, plug) {
            tracing::warn!(error = %e, "connect failed after validation");
        }
        graph.snap_to_parent(child);
        tracing::debug!(child = %child, parent = %parent, ?socket, "connected");

        let mut new_roots = vec![self.graph().root_of(parent)];
        if old_child_root != child {
            new_roots.push(self.graph().root_of(old_child_root));
        }
        if let Some(rem) = remainder {
            if !self.reattach_remainder(rem, socket, child) {
                // add_root indexes the bumped tree.
                self.bump_remainder(rem, socket);
            }
        }

        let mut seen = HashSet::new();
        for root in new_roots {
            if seen.insert(root) && self.workspace.is_root(root) {
                self.workspace.index_tree(root);
            }
        }

        self.add_move_event(child, child_before);
        if let Some((rem, before)) = remainder_before {
            self.add_move_event(rem, before);
        }
    }

    /// Splice the displaced block below `child`. Returns false if there is
    /// no compatible spot.
    fn reattach_remainder(&mut self, remainder: BlockRef, socket: ConnectionRef, child: BlockRef) -> bool {
        let graph = self.graph();
        let Some(rem_plug) = graph.inferior_connection(remainder) else {
            return false;
        };
        let Some(kind) = graph.connection(socket).map(|c| c.kind()) else {
            return false;
        };
        let spot = match kind {
            ConnectionKind::Input => graph.last_unconnected_input_in_row(child, rem_plug),
            ConnectionKind::Next => {
                let last = graph.last_block_in_sequence(child);
                graph
                    .block(last)
                    .and_then(|b| b.connection(Slot::Next))
                    .map(|_| ConnectionRef::next(last))
            }
            _ => None,
        };
        let Some(spot) = spot else {
            return false;
        };
        if graph.can_connect_with_reason(spot, Some(rem_plug)) != CanConnect::CanConnect {
            return false;
        }
        let graph = self.workspace.graph_mut();
        if graph.connect(spot, rem_plug).is_err() {
            return false;
        }
        graph.snap_to_parent(remainder);
        tracing::debug!(remainder = %remainder, ?spot, "spliced remainder");
        true
    }

    /// Move the displaced block clear of `vacated` and make it a root.
    fn bump_remainder(&mut self, remainder: BlockRef, vacated: ConnectionRef) {
        let d = self.config.bump_distance;
        let graph = self.workspace.graph_mut();
        if let (Some(socket_pos), Some(plug)) = (graph.connection_position(vacated), graph.inferior_connection(remainder)) {
            if let Some(plug_pos) = graph.connection_position(plug) {
                let goal = socket_pos + Point::new(d, d);
                graph.move_tree_by(remainder, goal - plug_pos);
            }
        }
        tracing::debug!(remainder = %remainder, "bumped remainder");
        self.workspace.add_root(remainder);
    }

    /// Detach a block from its parent and make it a root. The vacated
    /// socket gets its shadow back; nothing else moves. No-op for roots.
    pub fn extract_block_as_root(&mut self, r: BlockRef) -> ControllerResult<()> {
        if !self.workspace.is_live(r) {
            return Err(ControllerError::UnknownBlock);
        }
        if self.workspace.is_root(r) {
            return Ok(());
        }
        if self.graph().is_shadow(r) {
            return Err(ControllerError::ShadowBlock(self.block_id(r)));
        }
        self.group_and_fire(|this| {
            let before = this.placement(r);
            let old_root = this.graph().root_of(r);
            this.workspace.unindex_tree(old_root);
            if let Some(plug) = this.graph().inferior_connection(r) {
                this.workspace.graph_mut().disconnect(plug);
            }
            this.workspace.index_tree(old_root);
            this.workspace.add_root(r);
            tracing::debug!(block = %r, "extracted as root");
            this.add_move_event(r, before);
            Ok(())
        })
    }

    /// Move a root block (and its tree) to `position`. Returns `Ok(false)`
    /// for blocks that are not movable.
    pub fn move_block_to(&mut self, r: BlockRef, position: Point) -> ControllerResult<bool> {
        require_finite(position)?;
        if !self.workspace.is_live(r) {
            return Err(ControllerError::UnknownBlock);
        }
        if !self.workspace.is_root(r) {
            return Err(ControllerError::NotRoot(self.block_id(r)));
        }
        if self.workspace.block(r).is_some_and(|b| !b.is_movable()) {
            return Ok(false);
        }
        self.group_and_fire(|this| {
            let before = this.placement(r);
            this.workspace.unindex_tree(r);
            this.workspace.graph_mut().move_tree_to(r, position);
            this.workspace.index_tree(r);
            this.add_move_event(r, before);
            Ok(true)
        })
    }

    /// Record where a connection sits relative to its block, as laid out
    /// by the view. Attached children are re-snapped. Emits no events.
    pub fn set_connection_offset(&mut self, conn: ConnectionRef, offset: Point) -> ControllerResult<()> {
        require_finite(offset)?;
        if self.graph().connection(conn).is_none() {
            return Err(ConnectionError::UnknownConnection.into());
        }
        let root = self.graph().root_of(conn.block);
        let live = self.workspace.is_root(root);
        if live {
            self.workspace.unindex_tree(root);
        }
        let graph = self.workspace.graph_mut();
        graph.set_connection_offset(conn, offset);
        for b in graph.subtree(root) {
            graph.snap_to_parent(b);
        }
        if live {
            self.workspace.index_tree(root);
        }
        Ok(())
    }

    /// The best connection pair for dropping the root tree `r` where it
    /// is now: `(dragged, target)` ready for [`Self::connect`].
    ///
    /// Candidates are the root's own connections plus the `next` at the
    /// end of its chain, searched within the snap radius.
    pub fn find_drop_target(&self, r: BlockRef) -> Option<(ConnectionRef, ConnectionRef)> {
        let graph = self.graph();
        let block = graph.block(r)?;
        let exclude: HashSet<BlockRef> = graph.subtree_with_shadows(r).into_iter().collect();
        let mut candidates: Vec<ConnectionRef> = block
            .slots()
            .into_iter()
            .map(|slot| ConnectionRef::new(r, slot))
            .collect();
        let last = graph.last_block_in_sequence(r);
        if last != r && graph.connection(ConnectionRef::next(last)).is_some() {
            candidates.push(ConnectionRef::next(last));
        }
        let manager = self.workspace.connection_manager();
        let radius = self.config.snap_radius;
        candidates
            .into_iter()
            .filter(|c| graph.connection(*c).is_some_and(|conn| !conn.is_connected()))
            .filter_map(|c| {
                let target = manager.find_best_connection(graph, c, radius, &exclude)?;
                let distance = graph.distance_between(c, target)?;
                Some((distance, c, target))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, c, t)| (c, t))
    }

    /// Push away other root trees whose connections ended up within the
    /// snap radius of `r`'s tree without being connected. Returns how many
    /// trees moved.
    pub fn bump_neighbours(&mut self, r: BlockRef) -> ControllerResult<usize> {
        if !self.workspace.is_live(r) {
            return Err(ControllerError::UnknownBlock);
        }
        let root = self.graph().root_of(r);
        let graph = self.graph();
        let manager = self.workspace.connection_manager();
        let radius = self.config.snap_radius;
        let mut to_bump: Vec<(BlockRef, ConnectionRef, ConnectionRef)> = Vec::new();
        for b in graph.subtree(root) {
            let Some(block) = graph.block(b) else {
                continue;
            };
            for slot in block.slots() {
                let conn = ConnectionRef::new(b, slot);
                if !manager.is_connection_terminal(conn) {
                    continue;
                }
                for neighbour in manager.neighbours(graph, conn, radius) {
                    let other_root = graph.root_of(neighbour.block);
                    if other_root == root
                        || !self.workspace.is_root(other_root)
                        || to_bump.iter().any(|(o, _, _)| *o == other_root)
                        || graph.block(other_root).is_some_and(|b| !b.is_movable())
                    {
                        continue;
                    }
                    to_bump.push((other_root, conn, neighbour));
                }
            }
        }
        if to_bump.is_empty() {
            return Ok(0);
        }
        let d = self.config.bump_distance;
        self.group_and_fire(|this| {
            for (other_root, conn, neighbour) in &to_bump {
                let before = this.placement(*other_root);
                this.workspace.unindex_tree(*other_root);
                let graph = this.workspace.graph_mut();
                if let (Some(anchor), Some(current)) =
                    (graph.connection_position(*conn), graph.connection_position(*neighbour))
                {
                    let goal = anchor + Point::new(d, d);
                    graph.move_tree_by(*other_root, goal - current);
                }
                this.workspace.index_tree(*other_root);
                tracing::debug!(block = %other_root, "bumped neighbour");
                this.add_move_event(*other_root, before);
            }
            Ok(to_bump.len())
        })
    }
}
