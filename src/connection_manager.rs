//! Spatial index of the connections in a workspace.
//!
//! Connections are bucketed by kind and by partition (available or
//! connected), each bucket kept sorted by y so a radius query only scans the
//! horizontal band `[y - r, y + r]`. The index is derived state: the
//! workspace re-indexes a block tree whenever its shape or position changes.

use std::collections::{HashMap, HashSet};

use crate::model::{BlockGraph, BlockRef, CanConnect, ConnectionKind, ConnectionRef, Point};

/// Which bucket of a kind a connection lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    /// Nothing real attached (empty or shadow-filled).
    Available,
    /// A real block is attached.
    Connected,
}

impl Partition {
    fn index(self) -> usize {
        match self {
            Partition::Available => 0,
            Partition::Connected => 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    position: Point,
    /// Insertion sequence, used to break distance ties.
    seq: u64,
    conn: ConnectionRef,
}

/// Entries ordered by `(y, seq)`.
#[derive(Debug, Default, Clone)]
struct YSortedList {
    entries: Vec<Entry>,
}

impl YSortedList {
    fn insert(&mut self, entry: Entry) {
        let at = self.entries.partition_point(|e| {
            (e.position.y, e.seq) < (entry.position.y, entry.seq)
        });
        self.entries.insert(at, entry);
    }

    fn remove(&mut self, conn: ConnectionRef, y: f32) -> bool {
        let start = self.entries.partition_point(|e| e.position.y < y);
        let found = self.entries[start..]
            .iter()
            .take_while(|e| e.position.y <= y)
            .position(|e| e.conn == conn);
        match found {
            Some(offset) => {
                self.entries.remove(start + offset);
                true
            }
            None => false,
        }
    }

    /// Entries whose y lies within `radius` of `y`.
    fn band(&self, y: f32, radius: f32) -> &[Entry] {
        let start = self.entries.partition_point(|e| e.position.y < y - radius);
        let end = self.entries.partition_point(|e| e.position.y <= y + radius);
        &self.entries[start..end.max(start)]
    }
}

#[derive(Debug, Clone, Copy)]
struct Location {
    kind: ConnectionKind,
    partition: Partition,
    position: Point,
    seq: u64,
}

#[derive(Debug, Default, Clone)]
pub struct ConnectionManager {
    /// Indexed by `kind.index() * 2 + partition.index()`.
    lists: [YSortedList; 8],
    locations: HashMap<ConnectionRef, Location>,
    next_seq: u64,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn list_mut(&mut self, kind: ConnectionKind, partition: Partition) -> &mut YSortedList {
        &mut self.lists[kind.index() * 2 + partition.index()]
    }

    fn list(&self, kind: ConnectionKind, partition: Partition) -> &YSortedList {
        &self.lists[kind.index() * 2 + partition.index()]
    }

    /// Index a connection at `position`. Re-adding an indexed connection
    /// moves it, keeping its original tie-break order.
    pub fn add_connection(
        &mut self,
        conn: ConnectionRef,
        kind: ConnectionKind,
        partition: Partition,
        position: Point,
    ) {
        let seq = match self.locations.get(&conn).copied() {
            Some(previous) => {
                self.list_mut(previous.kind, previous.partition)
                    .remove(conn, previous.position.y);
                previous.seq
            }
            None => {
                self.next_seq += 1;
                self.next_seq
            }
        };
        self.list_mut(kind, partition).insert(Entry { position, seq, conn });
        self.locations.insert(
            conn,
            Location {
                kind,
                partition,
                position,
                seq,
            },
        );
    }

    /// Index a connection from the graph's current state.
    pub fn index_connection(&mut self, graph: &BlockGraph, conn: ConnectionRef) {
        let (Some(c), Some(position)) = (graph.connection(conn), graph.connection_position(conn)) else {
            return;
        };
        let partition = if c.is_connected() {
            Partition::Connected
        } else {
            Partition::Available
        };
        tracing::trace!(?conn, ?partition, "index connection");
        self.add_connection(conn, c.kind(), partition, position);
    }

    pub fn remove_connection(&mut self, conn: ConnectionRef) -> bool {
        match self.locations.remove(&conn) {
            Some(loc) => self.list_mut(loc.kind, loc.partition).remove(conn, loc.position.y),
            None => false,
        }
    }

    pub fn contains(&self, conn: ConnectionRef) -> bool {
        self.locations.contains_key(&conn)
    }

    pub fn partition_of(&self, conn: ConnectionRef) -> Option<Partition> {
        self.locations.get(&conn).map(|l| l.partition)
    }

    /// Indexed position of a connection.
    pub fn position_of(&self, conn: ConnectionRef) -> Option<Point> {
        self.locations.get(&conn).map(|l| l.position)
    }

    /// True when nothing real is attached to an indexed connection.
    pub fn is_connection_terminal(&self, conn: ConnectionRef) -> bool {
        self.partition_of(conn) == Some(Partition::Available)
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn clear(&mut self) {
        *self = Self {
            next_seq: self.next_seq,
            ..Self::default()
        };
    }

    /// Every indexed connection, in no particular order.
    pub fn connections(&self) -> impl Iterator<Item = ConnectionRef> + '_ {
        self.locations.keys().copied()
    }

    /// Candidate partitions for a target kind: plugs must be free, while
    /// occupied sockets are offered so a drop can splice into them.
    fn candidate_partitions(kind: ConnectionKind) -> &'static [Partition] {
        if kind.is_superior() {
            &[Partition::Available, Partition::Connected]
        } else {
            &[Partition::Available]
        }
    }

    /// The nearest connection `moving` could connect to within `max_radius`.
    ///
    /// Blocks in `exclude` (normally the dragged tree) are never offered.
    /// Candidates are compatible in kind and type checks; occupancy by a
    /// real block does not disqualify a socket. Equal distances resolve to
    /// the connection indexed first.
    pub fn find_best_connection(
        &self,
        graph: &BlockGraph,
        moving: ConnectionRef,
        max_radius: f32,
        exclude: &HashSet<BlockRef>,
    ) -> Option<ConnectionRef> {
        let kind = graph.connection(moving)?.kind();
        let origin = graph.connection_position(moving)?;
        let target_kind = kind.opposite();
        let mut best: Option<(f32, u64, ConnectionRef)> = None;
        for &partition in Self::candidate_partitions(target_kind) {
            for entry in self.list(target_kind, partition).band(origin.y, max_radius) {
                if exclude.contains(&entry.conn.block) {
                    continue;
                }
                let distance = origin.distance_to(entry.position);
                if distance > max_radius {
                    continue;
                }
                if graph.can_connect_ignoring_occupancy(moving, Some(entry.conn)) != CanConnect::CanConnect {
                    continue;
                }
                let better = match best {
                    None => true,
                    Some((d, seq, _)) => distance < d || (distance == d && entry.seq < seq),
                };
                if better {
                    best = Some((distance, entry.seq, entry.conn));
                }
            }
        }
        best.map(|(_, _, conn)| conn)
    }

    /// Every compatible, unoccupied connection within `radius` of `conn`,
    /// nearest first.
    pub fn neighbours(&self, graph: &BlockGraph, conn: ConnectionRef, radius: f32) -> Vec<ConnectionRef> {
        let (Some(c), Some(origin)) = (graph.connection(conn), graph.connection_position(conn)) else {
            return Vec::new();
        };
        let mut found: Vec<(f32, u64, ConnectionRef)> = self
            .list(c.kind().opposite(), Partition::Available)
            .band(origin.y, radius)
            .iter()
            .filter(|e| e.conn.block != conn.block)
            .map(|e| (origin.distance_to(e.position), e.seq, e.conn))
            .filter(|(d, _, _)| *d <= radius)
            .collect();
        found.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        found.into_iter().map(|(_, _, c)| c).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Block, Input, InputKind};

    fn statement_at(graph: &mut BlockGraph, id: &str, x: f32, y: f32) -> BlockRef {
        let r = graph
            .insert(Block::new(id, "s").with_previous(None).with_next(None))
            .unwrap();
        graph.move_tree_to(r, Point::new(x, y));
        r
    }

    fn index_all(manager: &mut ConnectionManager, graph: &BlockGraph) {
        let refs: Vec<_> = graph.iter().map(|(r, b)| (r, b.slots())).collect();
        for (r, slots) in refs {
            for slot in slots {
                manager.index_connection(graph, ConnectionRef::new(r, slot));
            }
        }
    }

    #[test]
    fn test_find_best_prefers_nearest() {
        let mut graph = BlockGraph::new();
        let _far = statement_at(&mut graph, "far", 0.0, 30.0);
        let near = statement_at(&mut graph, "near", 0.0, 10.0);
        let moving = statement_at(&mut graph, "moving", 0.0, 0.0);
        let mut manager = ConnectionManager::new();
        index_all(&mut manager, &graph);

        let exclude = HashSet::from([moving]);
        let best = manager.find_best_connection(&graph, ConnectionRef::previous(moving), 50.0, &exclude);
        assert_eq!(best, Some(ConnectionRef::next(near)));
        let best = manager.find_best_connection(&graph, ConnectionRef::previous(moving), 5.0, &exclude);
        assert_eq!(best, None);
    }

    #[test]
    fn test_ties_resolve_to_first_indexed() {
        let mut graph = BlockGraph::new();
        let first = statement_at(&mut graph, "first", -10.0, 0.0);
        let _second = statement_at(&mut graph, "second", 10.0, 0.0);
        let moving = statement_at(&mut graph, "moving", 0.0, 0.0);
        let mut manager = ConnectionManager::new();
        index_all(&mut manager, &graph);
        let exclude = HashSet::from([moving]);
        let best = manager.find_best_connection(&graph, ConnectionRef::previous(moving), 50.0, &exclude);
        assert_eq!(best, Some(ConnectionRef::next(first)));
    }

    #[test]
    fn test_connected_plugs_are_not_candidates() {
        let mut graph = BlockGraph::new();
        let top = statement_at(&mut graph, "top", 0.0, 0.0);
        let child = statement_at(&mut graph, "child", 0.0, 0.0);
        let moving = statement_at(&mut graph, "moving", 0.0, 5.0);
        graph
            .connect(ConnectionRef::next(top), ConnectionRef::previous(child))
            .unwrap();
        let mut manager = ConnectionManager::new();
        index_all(&mut manager, &graph);
        assert_eq!(
            manager.partition_of(ConnectionRef::previous(child)),
            Some(Partition::Connected)
        );
        let exclude = HashSet::from([moving]);
        // Moving's next may only reach an unconnected previous.
        let best = manager.find_best_connection(&graph, ConnectionRef::next(moving), 50.0, &exclude);
        assert_eq!(best, Some(ConnectionRef::previous(top)));
        // Moving's previous may splice into the occupied next of `top`.
        let best = manager.find_best_connection(&graph, ConnectionRef::previous(moving), 50.0, &exclude);
        assert!(best.is_some());
    }

    #[test]
    fn test_occupied_socket_must_pass_checks() {
        let numbers = || Some(vec!["Number".to_string()]);
        let mut graph = BlockGraph::new();
        let strict = graph
            .insert(Block::new("strict", "v").with_input(Input::new("IN", InputKind::Value, numbers())))
            .unwrap();
        let number = graph.insert(Block::new("number", "v").with_output(numbers())).unwrap();
        let open = graph
            .insert(Block::new("open", "v").with_input(Input::new("IN", InputKind::Value, None)))
            .unwrap();
        let text = graph
            .insert(Block::new("text", "v").with_output(Some(vec!["String".to_string()])))
            .unwrap();
        graph
            .connect(ConnectionRef::input(strict, 0), ConnectionRef::output(number))
            .unwrap();
        graph.move_tree_to(open, Point::new(20.0, 0.0));
        graph.move_tree_to(text, Point::new(5.0, 0.0));
        let mut manager = ConnectionManager::new();
        index_all(&mut manager, &graph);

        let exclude = HashSet::from([text]);
        let best = manager.find_best_connection(&graph, ConnectionRef::output(text), 50.0, &exclude);
        assert_eq!(best, Some(ConnectionRef::input(open, 0)));

        // A compatible plug may still splice into the occupied socket.
        let other = graph.insert(Block::new("other", "v").with_output(numbers())).unwrap();
        graph.move_tree_to(other, Point::new(1.0, 0.0));
        let exclude = HashSet::from([other]);
        let best = manager.find_best_connection(&graph, ConnectionRef::output(other), 50.0, &exclude);
        assert_eq!(best, Some(ConnectionRef::input(strict, 0)));
    }

    #[test]
    fn test_readd_moves_entry() {
        let mut graph = BlockGraph::new();
        let a = statement_at(&mut graph, "a", 0.0, 0.0);
        let mut manager = ConnectionManager::new();
        manager.index_connection(&graph, ConnectionRef::next(a));
        graph.move_tree_to(a, Point::new(0.0, 100.0));
        manager.index_connection(&graph, ConnectionRef::next(a));
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.position_of(ConnectionRef::next(a)), Some(Point::new(0.0, 100.0)));
        assert!(manager.remove_connection(ConnectionRef::next(a)));
        assert!(manager.is_empty());
        assert!(!manager.remove_connection(ConnectionRef::next(a)));
    }

    #[test]
    fn test_value_neighbours() {
        let mut graph = BlockGraph::new();
        let host = graph
            .insert(Block::new("host", "v").with_input(Input::new("IN", InputKind::Value, None)))
            .unwrap();
        let plug = graph.insert(Block::new("plug", "v").with_output(None)).unwrap();
        graph.move_tree_to(plug, Point::new(3.0, 4.0));
        let mut manager = ConnectionManager::new();
        index_all(&mut manager, &graph);
        assert_eq!(
            manager.neighbours(&graph, ConnectionRef::output(plug), 5.0),
            vec![ConnectionRef::input(host, 0)]
        );
        assert!(manager.neighbours(&graph, ConnectionRef::output(plug), 4.0).is_empty());
        assert!(manager.is_connection_terminal(ConnectionRef::input(host, 0)));
    }
}
