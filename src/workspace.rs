//! The workspace: root blocks, trash, variables and the connection index.
//!
//! The [`BlockGraph`] holds every block. The workspace decides which of
//! them are live: a block is live when its root is in the root set. Only
//! live, non-shadow blocks have their connections in the
//! [`ConnectionManager`]. Trashed trees stay in the graph until the trash
//! is emptied.

use indexmap::IndexSet;

use crate::connection_manager::{ConnectionManager, Partition};
use crate::model::{Block, BlockGraph, BlockRef, ConnectionRef};
use crate::names::NameManager;
use crate::xml::{WorkspaceXml, block_to_xml, write_workspace_xml};

#[derive(Debug, Default)]
pub struct Workspace {
    graph: BlockGraph,
    roots: IndexSet<BlockRef>,
    trash: IndexSet<BlockRef>,
    connections: ConnectionManager,
    variables: NameManager,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph(&self) -> &BlockGraph {
        &self.graph
    }

    pub(crate) fn graph_mut(&mut self) -> &mut BlockGraph {
        &mut self.graph
    }

    pub fn connection_manager(&self) -> &ConnectionManager {
        &self.connections
    }

    pub fn variables(&self) -> &NameManager {
        &self.variables
    }

    pub(crate) fn variables_mut(&mut self) -> &mut NameManager {
        &mut self.variables
    }

    pub(crate) fn graph_and_variables_mut(&mut self) -> (&BlockGraph, &mut NameManager) {
        (&self.graph, &mut self.variables)
    }

    pub fn block(&self, r: BlockRef) -> Option<&Block> {
        self.graph.block(r)
    }

    pub fn block_by_id(&self, id: &str) -> Option<BlockRef> {
        self.graph.lookup(id)
    }

    /// Root blocks in insertion order.
    pub fn root_blocks(&self) -> impl Iterator<Item = BlockRef> + '_ {
        self.roots.iter().copied()
    }

    pub fn is_root(&self, r: BlockRef) -> bool {
        self.roots.contains(&r)
    }

    pub fn trash_blocks(&self) -> impl Iterator<Item = BlockRef> + '_ {
        self.trash.iter().copied()
    }

    pub fn is_in_trash(&self, r: BlockRef) -> bool {
        self.trash.contains(&r)
    }

    /// True if the block belongs to a tree rooted in the root set.
    pub fn is_live(&self, r: BlockRef) -> bool {
        self.graph.contains(r) && self.roots.contains(&self.graph.root_of(r))
    }

    /// Every live block, hidden shadows included, tree by tree.
    pub fn all_blocks(&self) -> Vec<BlockRef> {
        self.roots
            .iter()
            .flat_map(|r| self.graph.subtree_with_shadows(*r))
            .collect()
    }

    /// Live blocks with a variable field naming `name` (case-insensitive).
    pub fn variable_usages(&self, name: &str) -> Vec<BlockRef> {
        let key = name.to_lowercase();
        self.all_blocks()
            .into_iter()
            .filter(|r| {
                self.graph.block(*r).is_some_and(|b| {
                    b.fields()
                        .filter_map(|f| f.variable())
                        .any(|v| v.to_lowercase() == key)
                })
            })
            .collect()
    }

    // ── Root set and index upkeep ──────────────────────────────────────

    /// Add a block to the root set and index its tree.
    pub(crate) fn add_root(&mut self, r: BlockRef) {
        if self.roots.insert(r) {
            self.index_tree(r);
        }
    }

    /// Remove a block from the root set and drop its tree from the index.
    pub(crate) fn remove_root(&mut self, r: BlockRef) -> bool {
        if self.roots.shift_remove(&r) {
            self.unindex_tree(r);
            true
        } else {
            false
        }
    }

    pub(crate) fn add_to_trash(&mut self, r: BlockRef) {
        self.trash.insert(r);
    }

    pub(crate) fn remove_from_trash(&mut self, r: BlockRef) -> bool {
        self.trash.shift_remove(&r)
    }

    /// Index every connection of the active (non-shadow) blocks below `r`.
    pub(crate) fn index_tree(&mut self, r: BlockRef) {
        for b in self.graph.subtree(r) {
            let Some(block) = self.graph.block(b) else {
                continue;
            };
            if block.is_shadow() {
                continue;
            }
            for slot in block.slots() {
                self.connections
                    .index_connection(&self.graph, ConnectionRef::new(b, slot));
            }
        }
    }

    /// Drop every connection below `r`, hidden shadows included.
    pub(crate) fn unindex_tree(&mut self, r: BlockRef) {
        for b in self.graph.subtree_with_shadows(r) {
            let Some(block) = self.graph.block(b) else {
                continue;
            };
            for slot in block.slots() {
                self.connections.remove_connection(ConnectionRef::new(b, slot));
            }
        }
    }

    /// Swap in a freshly built graph and root set, rebuilding the index.
    pub(crate) fn replace_contents(&mut self, graph: BlockGraph, roots: Vec<BlockRef>, variables: NameManager) {
        self.graph = graph;
        self.roots.clear();
        self.trash.clear();
        self.connections.clear();
        self.variables = variables;
        for r in roots {
            self.add_root(r);
        }
    }

    /// Drop every block, root, trashed tree and variable.
    pub(crate) fn clear(&mut self) {
        self.graph.clear();
        self.roots.clear();
        self.trash.clear();
        self.connections.clear();
        self.variables.clear();
    }

    /// Remove trashed trees from the graph. Returns how many blocks went.
    pub(crate) fn empty_trash(&mut self) -> usize {
        let trashed: Vec<_> = self.trash.drain(..).collect();
        trashed
            .into_iter()
            .map(|r| self.graph.remove_tree(r).len())
            .sum()
    }

    // ── Serialization ──────────────────────────────────────────────────

    pub fn to_xml(&self) -> WorkspaceXml {
        WorkspaceXml {
            variables: self.variables.names().map(str::to_string).collect(),
            blocks: self
                .roots
                .iter()
                .filter_map(|r| block_to_xml(&self.graph, *r, true))
                .collect(),
        }
    }

    pub fn to_xml_string(&self) -> String {
        write_workspace_xml(&self.to_xml())
    }

    // ── Consistency ────────────────────────────────────────────────────

    /// Describe every violated workspace invariant. Empty when consistent.
    ///
    /// Checks that roots have no parent, that every live block without a
    /// parent is a root, and that the connection index holds exactly the
    /// connections of live non-shadow blocks in the right partition.
    pub fn check_invariants(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for r in &self.roots {
            if let Some(parent) = self.graph.parent_of(*r) {
                problems.push(format!("root {} has parent {}", r, parent));
            }
            if self.trash.contains(r) {
                problems.push(format!("root {} is also in the trash", r));
            }
        }
        let mut expected = 0;
        for root in &self.roots {
            for b in self.graph.subtree(*root) {
                let Some(block) = self.graph.block(b) else {
                    continue;
                };
                if b != *root && self.graph.parent_of(b).is_none() {
                    problems.push(format!("block {} is live but detached", b));
                }
                if block.is_shadow() {
                    continue;
                }
                for slot in block.slots() {
                    let conn = ConnectionRef::new(b, slot);
                    expected += 1;
                    let want = match self.graph.connection(conn) {
                        Some(c) if c.is_connected() => Partition::Connected,
                        _ => Partition::Available,
                    };
                    match self.connections.partition_of(conn) {
                        None => problems.push(format!("{:?} is not indexed", conn)),
                        Some(p) if p != want => {
                            problems.push(format!("{:?} indexed as {:?}, expected {:?}", conn, p, want))
                        }
                        Some(_) => {
                            let actual = self.graph.connection_position(conn);
                            if actual != self.connections.position_of(conn) {
                                problems.push(format!("{:?} indexed at a stale position", conn));
                            }
                        }
                    }
                }
            }
        }
        if self.connections.len() != expected {
            problems.push(format!(
                "index holds {} connections, expected {}",
                self.connections.len(),
                expected
            ));
        }
        problems
    }
}
