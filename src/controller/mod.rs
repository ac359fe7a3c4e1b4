//! The controller: the only entry point that mutates a workspace.
//!
//! Every public operation validates first, then mutates the block graph,
//! the root set and the connection index together, and finally delivers
//! the resulting events as one [`EventGroup`]. Operations nested inside
//! another operation share the outer group.

mod connect;
mod edits;
mod lifecycle;
mod variables;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ControllerError, ControllerResult};
use crate::events::{BlocklyEvent, EventGroup, EventsCallback, Placement};
use crate::factory::BlockFactory;
use crate::model::{BlockGraph, BlockRef, Point};
use crate::workspace::Workspace;

/// Positions reach the y-sorted connection index, which needs a total order.
fn require_finite(position: Point) -> ControllerResult<()> {
    if position.is_finite() {
        Ok(())
    } else {
        Err(ControllerError::InvalidPosition {
            x: position.x,
            y: position.y,
        })
    }
}

/// Tunables for the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Search radius for drop targets and neighbour bumps.
    pub snap_radius: f32,
    /// Offset applied on both axes when a block is bumped away.
    pub bump_distance: f32,
    /// Stamped on every event.
    pub workspace_id: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            snap_radius: 48.0,
            bump_distance: 25.0,
            workspace_id: Uuid::new_v4().to_string(),
        }
    }
}

impl ControllerConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Veto hooks for the `request_*` variable operations. Every hook allows
/// the operation unless overridden.
pub trait VariableCallback {
    fn on_create_variable(&mut self, _name: &str) -> bool {
        true
    }

    fn on_rename_variable(&mut self, _old_name: &str, _new_name: &str) -> bool {
        true
    }

    /// `usages` holds the ids of the blocks still referencing the variable.
    fn on_delete_variable(&mut self, _name: &str, _usages: &[String]) -> bool {
        true
    }
}

/// Handle returned by [`BlocklyController::add_events_callback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

pub struct BlocklyController {
    config: ControllerConfig,
    factory: BlockFactory,
    workspace: Workspace,
    callbacks: Vec<(CallbackId, Box<dyn EventsCallback>)>,
    next_callback: u64,
    variable_callback: Option<Box<dyn VariableCallback>>,
    pending: Vec<BlocklyEvent>,
    group_depth: usize,
    group_id: Option<String>,
}

impl BlocklyController {
    pub fn new(factory: BlockFactory) -> Self {
        Self::with_config(factory, ControllerConfig::default())
    }

    pub fn with_config(factory: BlockFactory, config: ControllerConfig) -> Self {
        Self {
            config,
            factory,
            workspace: Workspace::new(),
            callbacks: Vec::new(),
            next_callback: 0,
            variable_callback: None,
            pending: Vec::new(),
            group_depth: 0,
            group_id: None,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn factory(&self) -> &BlockFactory {
        &self.factory
    }

    pub fn factory_mut(&mut self) -> &mut BlockFactory {
        &mut self.factory
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn graph(&self) -> &BlockGraph {
        self.workspace.graph()
    }

    /// Look up a block by id.
    pub fn block_by_id(&self, id: &str) -> Option<BlockRef> {
        self.workspace.block_by_id(id)
    }

    // ── Callbacks ──────────────────────────────────────────────────────

    /// Register an events callback. Callbacks run in registration order.
    pub fn add_events_callback(&mut self, callback: Box<dyn EventsCallback>) -> CallbackId {
        let id = CallbackId(self.next_callback);
        self.next_callback += 1;
        self.callbacks.push((id, callback));
        id
    }

    pub fn remove_events_callback(&mut self, id: CallbackId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(cid, _)| *cid != id);
        before != self.callbacks.len()
    }

    pub fn set_variable_callback(&mut self, callback: Option<Box<dyn VariableCallback>>) {
        self.variable_callback = callback;
    }

    // ── Event grouping ─────────────────────────────────────────────────

    /// Run `op` inside an event group. The outermost call fires the
    /// collected events once `op` returns.
    fn group_and_fire<T>(&mut self, op: impl FnOnce(&mut Self) -> T) -> T {
        if self.group_depth == 0 {
            self.group_id = Some(Uuid::new_v4().to_string());
        }
        self.group_depth += 1;
        let result = op(self);
        self.group_depth -= 1;
        if self.group_depth == 0 {
            let events = std::mem::take(&mut self.pending);
            let group_id = self.group_id.take().unwrap_or_default();
            if !events.is_empty() {
                self.fire(EventGroup { group_id, events });
            }
        }
        result
    }

    fn add_event(&mut self, mut event: BlocklyEvent) {
        event.set_group_id(self.group_id.clone());
        tracing::trace!(block = event.block_id(), kind = event.type_id(), "queued event");
        self.pending.push(event);
    }

    fn fire(&mut self, group: EventGroup) {
        for (_, callback) in self.callbacks.iter_mut() {
            if let Some(filtered) = group.filtered(callback.type_filter()) {
                callback.on_events_fired(&filtered);
            }
        }
    }

    // ── Shared helpers ─────────────────────────────────────────────────

    fn block_id(&self, r: BlockRef) -> String {
        self.graph()
            .block(r)
            .map(|b| b.id().to_string())
            .unwrap_or_default()
    }

    /// Where a block sits right now, for move events.
    fn placement(&self, r: BlockRef) -> Placement {
        let graph = self.graph();
        match graph.parent_of(r) {
            Some(parent) => Placement {
                parent_id: graph.block(parent).map(|b| b.id().to_string()),
                input_name: graph.parent_input_name(r),
                position: None,
            },
            None => Placement {
                parent_id: None,
                input_name: None,
                position: graph.block(r).map(|b| b.position()),
            },
        }
    }

    /// Queue a move event if the block's placement changed.
    fn add_move_event(&mut self, r: BlockRef, old: Placement) {
        let new = self.placement(r);
        if new == old {
            return;
        }
        let event = crate::events::MoveEvent {
            workspace_id: self.config.workspace_id.clone(),
            group_id: None,
            block_id: self.block_id(r),
            old,
            new,
        };
        self.add_event(BlocklyEvent::Move(event));
    }
}
