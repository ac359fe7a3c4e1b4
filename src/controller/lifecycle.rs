//! Adding, trashing and loading blocks.

use super::{BlocklyController, require_finite};
use crate::error::{BlockLoadError, ControllerError, ControllerResult};
use crate::events::{BlocklyEvent, CreateEvent, DeleteEvent};
use crate::factory::BlockTemplate;
use crate::model::{BlockGraph, BlockRef};
use crate::names::NameManager;
use crate::xml::{BlockXml, block_to_xml, parse_block_xml, parse_workspace_xml, write_block_xml};

fn reject_shadow_root(xml: &BlockXml) -> Result<(), BlockLoadError> {
    if xml.shadow {
        return Err(BlockLoadError::UnexpectedElement {
            expected: "block".into(),
            found: "shadow".into(),
        });
    }
    Ok(())
}

/// Register every variable referenced below `r`.
fn register_variables(graph: &BlockGraph, r: BlockRef, names: &mut NameManager) {
    for b in graph.subtree_with_shadows(r) {
        let Some(block) = graph.block(b) else {
            continue;
        };
        for name in block.fields().filter_map(|f| f.variable()) {
            names.add_name(name);
        }
    }
}

impl BlocklyController {
    fn add_create_event(&mut self, r: BlockRef) {
        let Some(xml) = block_to_xml(self.graph(), r, true) else {
            return;
        };
        let event = CreateEvent {
            workspace_id: self.config.workspace_id.clone(),
            group_id: None,
            block_id: self.block_id(r),
            ids: xml.ids(),
            xml: write_block_xml(&xml),
        };
        self.add_event(BlocklyEvent::Create(event));
    }

    fn attach_new_root(&mut self, r: BlockRef) {
        self.workspace.add_root(r);
        let (graph, names) = self.workspace.graph_and_variables_mut();
        register_variables(graph, r, names);
        tracing::debug!(block = %r, "added root block");
        self.add_create_event(r);
    }

    /// Create a block from a template and add it as a root.
    pub fn add_root_block(&mut self, template: &BlockTemplate) -> ControllerResult<BlockRef> {
        if template.shadow {
            return Err(BlockLoadError::UnexpectedElement {
                expected: "block".into(),
                found: "shadow".into(),
            }
            .into());
        }
        if let Some(position) = template.position {
            require_finite(position)?;
        }
        let r = self
            .factory
            .obtain_block(self.workspace.graph_mut(), template)?;
        self.group_and_fire(|this| {
            this.attach_new_root(r);
            Ok(r)
        })
    }

    /// Build a block tree from `<block>` XML and add it as a root.
    pub fn add_root_block_xml(&mut self, xml: &str) -> ControllerResult<BlockRef> {
        let parsed = parse_block_xml(xml)?;
        reject_shadow_root(&parsed)?;
        let r = self
            .factory
            .build_block_tree(self.workspace.graph_mut(), &parsed)?;
        self.group_and_fire(|this| {
            this.attach_new_root(r);
            Ok(r)
        })
    }

    /// Move a root tree to the trash.
    ///
    /// Returns `Ok(false)` and changes nothing when the block is not
    /// deletable, unless `ignore_deletable` is set.
    pub fn trash_root_block(&mut self, r: BlockRef, ignore_deletable: bool) -> ControllerResult<bool> {
        let Some(block) = self.workspace.block(r) else {
            return Err(ControllerError::UnknownBlock);
        };
        if !self.workspace.is_root(r) {
            return Err(ControllerError::NotRoot(block.id().to_string()));
        }
        if !block.is_deletable() && !ignore_deletable {
            tracing::debug!(block = %r, "refusing to trash non-deletable block");
            return Ok(false);
        }
        self.group_and_fire(|this| {
            let xml = block_to_xml(this.graph(), r, true);
            this.workspace.remove_root(r);
            this.workspace.add_to_trash(r);
            if let Some(xml) = xml {
                let event = DeleteEvent {
                    workspace_id: this.config.workspace_id.clone(),
                    group_id: None,
                    block_id: this.block_id(r),
                    ids: xml.ids(),
                    old_xml: write_block_xml(&xml),
                };
                this.add_event(BlocklyEvent::Delete(event));
            }
            tracing::debug!(block = %r, "trashed root block");
            Ok(true)
        })
    }

    /// Bring a trashed tree back as a root.
    pub fn add_block_from_trash(&mut self, r: BlockRef) -> ControllerResult<()> {
        if !self.workspace.is_in_trash(r) {
            return Err(ControllerError::UnknownBlock);
        }
        self.group_and_fire(|this| {
            this.workspace.remove_from_trash(r);
            this.attach_new_root(r);
            Ok(())
        })
    }

    /// Drop trashed trees for good. Returns the number of blocks removed.
    pub fn empty_trash(&mut self) -> usize {
        let removed = self.workspace.empty_trash();
        tracing::debug!(removed, "emptied trash");
        removed
    }

    /// Replace the workspace contents with a `<xml>` document.
    ///
    /// The document is built into a staging graph first; on any error the
    /// current workspace is left untouched. On success one create event
    /// per root block is fired as a single group. Returns the number of
    /// root blocks loaded.
    pub fn load_workspace_contents(&mut self, xml: &str) -> ControllerResult<usize> {
        let document = parse_workspace_xml(xml)?;
        let mut staging = BlockGraph::new();
        let mut roots = Vec::with_capacity(document.blocks.len());
        for block in &document.blocks {
            roots.push(self.factory.build_block_tree(&mut staging, block)?);
        }
        let mut names = NameManager::new();
        for name in &document.variables {
            names.add_name(name);
        }
        for r in &roots {
            register_variables(&staging, *r, &mut names);
        }
        let count = roots.len();
        self.group_and_fire(|this| {
            this.workspace.replace_contents(staging, roots.clone(), names);
            for r in roots {
                this.add_create_event(r);
            }
            tracing::debug!(roots = count, "loaded workspace contents");
            Ok(count)
        })
    }

    /// Remove every block, trashed tree and variable. Fires no events.
    pub fn reset_workspace(&mut self) {
        self.workspace.clear();
        tracing::debug!("workspace reset");
    }

    /// Serialize the live workspace.
    pub fn workspace_xml(&self) -> String {
        self.workspace.to_xml_string()
    }
}
