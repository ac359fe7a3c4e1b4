//! Variable create, rename and delete.
//!
//! Names compare case-insensitively. The plain forms act unconditionally;
//! the `request_*` forms ask the [`super::VariableCallback`] first.

use super::BlocklyController;
use crate::events::{BlocklyEvent, ChangeElement, ChangeEvent};
use crate::model::BlockRef;

impl BlocklyController {
    /// Register a variable and return the stored name.
    ///
    /// Adding a name that is already stored with the same spelling returns
    /// it unchanged. A name that clashes only by case is stored under a
    /// fresh unique name (`var` → `var2`). Empty names are refused.
    pub fn add_variable(&mut self, name: &str) -> Option<String> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let names = self.workspace.variables_mut();
        let stored = match names.canonical(name) {
            Some(existing) if existing == name => return Some(existing.to_string()),
            Some(_) => names.generate_unique_name(name),
            None => name.to_string(),
        };
        names.add_name(&stored);
        tracing::debug!(variable = %stored, "added variable");
        Some(stored)
    }

    /// [`Self::add_variable`] after the callback agrees.
    pub fn request_add_variable(&mut self, name: &str) -> Option<String> {
        if let Some(callback) = self.variable_callback.as_mut() {
            if !callback.on_create_variable(name) {
                tracing::warn!(variable = name, "variable creation vetoed");
                return None;
            }
        }
        self.add_variable(name)
    }

    /// Rename a variable and update every field referencing it.
    ///
    /// If `new_name` already names a different variable the two are
    /// merged under that variable's stored spelling. Returns the final
    /// name, or `None` if `old_name` is unknown or `new_name` is empty.
    pub fn rename_variable(&mut self, old_name: &str, new_name: &str) -> Option<String> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return None;
        }
        let names = self.workspace.variables();
        let old = names.canonical(old_name)?.to_string();
        if old == new_name {
            return Some(old);
        }
        let target = match names.canonical(new_name) {
            Some(existing) if existing.to_lowercase() != old.to_lowercase() => existing.to_string(),
            _ => new_name.to_string(),
        };
        let names = self.workspace.variables_mut();
        names.remove(&old);
        names.add_name(&target);
        tracing::debug!(from = %old, to = %target, "renamed variable");
        self.group_and_fire(|this| {
            this.retarget_variable_fields(&old, Some(&target));
        });
        Some(target)
    }

    /// [`Self::rename_variable`] after the callback agrees.
    pub fn request_rename_variable(&mut self, old_name: &str, new_name: &str) -> Option<String> {
        if let Some(callback) = self.variable_callback.as_mut() {
            if !callback.on_rename_variable(old_name, new_name) {
                tracing::warn!(variable = old_name, new_name, "variable rename vetoed");
                return None;
            }
        }
        self.rename_variable(old_name, new_name)
    }

    /// Remove a variable and detach every field referencing it. Returns
    /// `false` if the variable is unknown.
    pub fn delete_variable(&mut self, name: &str) -> bool {
        let Some(stored) = self.workspace.variables_mut().remove(name) else {
            return false;
        };
        tracing::debug!(variable = %stored, "deleted variable");
        self.group_and_fire(|this| {
            this.retarget_variable_fields(&stored, None);
        });
        true
    }

    /// [`Self::delete_variable`] after the callback agrees. The callback
    /// is told which blocks still use the variable.
    pub fn request_delete_variable(&mut self, name: &str) -> bool {
        if !self.workspace.variables().contains(name) {
            return false;
        }
        let usages: Vec<String> = self
            .workspace
            .variable_usages(name)
            .into_iter()
            .map(|r| self.block_id(r))
            .collect();
        if let Some(callback) = self.variable_callback.as_mut() {
            if !callback.on_delete_variable(name, &usages) {
                tracing::warn!(variable = name, usages = usages.len(), "variable deletion vetoed");
                return false;
            }
        }
        self.delete_variable(name)
    }

    /// Point every field referencing `old` at `new`, or detach it when
    /// `new` is `None`. Live blocks produce change events; trashed blocks
    /// are updated silently.
    fn retarget_variable_fields(&mut self, old: &str, new: Option<&str>) {
        let key = old.to_lowercase();
        let graph = self.workspace.graph();
        let live: Vec<BlockRef> = self.workspace.all_blocks();
        let trashed: Vec<BlockRef> = self
            .workspace
            .trash_blocks()
            .flat_map(|r| graph.subtree_with_shadows(r))
            .collect();
        let blocks = live
            .into_iter()
            .map(|b| (b, true))
            .chain(trashed.into_iter().map(|b| (b, false)));

        let mut changes = Vec::new();
        for (b, emit) in blocks {
            let Some(block) = self.workspace.graph_mut().block_mut(b) else {
                continue;
            };
            let block_id = block.id().to_string();
            for field in block.fields_mut() {
                let Some(current) = field.variable() else {
                    continue;
                };
                if current.to_lowercase() != key {
                    continue;
                }
                let old_value = current.to_string();
                match new {
                    Some(name) => {
                        field.set_from_string(name);
                    }
                    None => {
                        field.clear_variable();
                    }
                }
                let new_value = field.variable().map(str::to_string);
                if emit && new_value.as_deref() != Some(old_value.as_str()) {
                    changes.push((block_id.clone(), field.name().to_string(), old_value, new_value));
                }
            }
        }
        for (block_id, field, old_value, new_value) in changes {
            let event = ChangeEvent {
                workspace_id: self.config.workspace_id.clone(),
                group_id: None,
                block_id,
                element: ChangeElement::Field,
                name: Some(field),
                old_value: Some(old_value),
                new_value,
            };
            self.add_event(BlocklyEvent::Change(event));
        }
    }
}
