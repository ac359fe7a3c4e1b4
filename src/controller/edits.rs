//! Field values and display state.
//!
//! Each setter emits a single change event, and only when the stored
//! value actually changed.

use super::BlocklyController;
use crate::error::{ControllerError, ControllerResult};
use crate::events::{BlocklyEvent, ChangeElement, ChangeEvent};
use crate::model::{Block, BlockRef, Comment, Mutation};
use crate::xml::write_mutation;

fn bool_text(value: bool) -> String {
    if value { "true" } else { "false" }.to_string()
}

impl BlocklyController {
    fn queue_change(
        &mut self,
        r: BlockRef,
        element: ChangeElement,
        name: Option<String>,
        old_value: Option<String>,
        new_value: Option<String>,
    ) {
        let event = ChangeEvent {
            workspace_id: self.config.workspace_id.clone(),
            group_id: None,
            block_id: self.block_id(r),
            element,
            name,
            old_value,
            new_value,
        };
        self.add_event(BlocklyEvent::Change(event));
    }

    /// Apply `update` to a live block and emit a change event when the
    /// value read by `read` differs afterwards.
    fn edit_block(
        &mut self,
        r: BlockRef,
        element: ChangeElement,
        read: fn(&Block) -> Option<String>,
        update: impl FnOnce(&mut Block),
    ) -> ControllerResult<bool> {
        if !self.workspace.is_live(r) {
            return Err(ControllerError::UnknownBlock);
        }
        let Some(block) = self.workspace.graph_mut().block_mut(r) else {
            return Err(ControllerError::UnknownBlock);
        };
        let old_value = read(block);
        update(block);
        let new_value = read(block);
        if old_value == new_value {
            return Ok(false);
        }
        tracing::debug!(block = %r, ?element, "block state changed");
        self.group_and_fire(|this| {
            this.queue_change(r, element, None, old_value, new_value);
        });
        Ok(true)
    }

    /// Set a field from its serialized form.
    ///
    /// Returns whether the stored value changed. Unparseable input is an
    /// [`ControllerError::InvalidFieldValue`] and leaves the field as is.
    pub fn set_field_value(&mut self, r: BlockRef, field_name: &str, value: &str) -> ControllerResult<bool> {
        if !self.workspace.is_live(r) {
            return Err(ControllerError::UnknownBlock);
        }
        let Some(block) = self.workspace.graph_mut().block_mut(r) else {
            return Err(ControllerError::UnknownBlock);
        };
        let block_id = block.id().to_string();
        let Some(field) = block.field_mut(field_name) else {
            return Err(ControllerError::UnknownField {
                block: block_id,
                field: field_name.to_string(),
            });
        };
        let old_value = field.serialized_value();
        if !field.set_from_string(value) {
            return Err(ControllerError::InvalidFieldValue {
                field: field_name.to_string(),
                value: value.to_string(),
            });
        }
        let new_value = field.serialized_value();
        let variable = field.variable().map(str::to_string);
        if old_value == new_value {
            return Ok(false);
        }
        if let Some(name) = variable {
            self.workspace.variables_mut().add_name(&name);
        }
        tracing::debug!(block = %block_id, field = field_name, "field changed");
        self.group_and_fire(|this| {
            this.queue_change(
                r,
                ChangeElement::Field,
                Some(field_name.to_string()),
                Some(old_value),
                Some(new_value),
            );
        });
        Ok(true)
    }

    pub fn set_collapsed(&mut self, r: BlockRef, collapsed: bool) -> ControllerResult<bool> {
        self.edit_block(
            r,
            ChangeElement::Collapsed,
            |b| Some(bool_text(b.is_collapsed())),
            |b| b.collapsed = collapsed,
        )
    }

    pub fn set_disabled(&mut self, r: BlockRef, disabled: bool) -> ControllerResult<bool> {
        self.edit_block(
            r,
            ChangeElement::Disabled,
            |b| Some(bool_text(b.is_disabled())),
            |b| b.disabled = disabled,
        )
    }

    /// `None` restores the definition's default layout.
    pub fn set_inputs_inline(&mut self, r: BlockRef, inline: Option<bool>) -> ControllerResult<bool> {
        self.edit_block(
            r,
            ChangeElement::Inline,
            |b| b.inputs_inline().map(bool_text),
            |b| b.inputs_inline = inline,
        )
    }

    /// Set or clear the comment text. Pinning and size are kept.
    pub fn set_comment(&mut self, r: BlockRef, text: Option<&str>) -> ControllerResult<bool> {
        self.edit_block(
            r,
            ChangeElement::Comment,
            |b| b.comment().map(|c| c.text.clone()),
            |b| match text {
                Some(text) => match b.comment.as_mut() {
                    Some(comment) => comment.text = text.to_string(),
                    None => b.comment = Some(Comment::new(text)),
                },
                None => b.comment = None,
            },
        )
    }

    /// Replace the mutation payload. Old and new values in the event are
    /// the `<mutation>` XML.
    pub fn set_mutation(&mut self, r: BlockRef, mutation: Option<Mutation>) -> ControllerResult<bool> {
        self.edit_block(
            r,
            ChangeElement::Mutate,
            |b| b.mutation().map(write_mutation),
            |b| b.mutation = mutation,
        )
    }
}
