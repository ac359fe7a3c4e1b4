//! Building blocks from definitions and XML.
//!
//! [`BlockFactory`] holds the registered [`BlockDefinition`]s. It creates
//! single blocks from a [`BlockTemplate`] and whole trees from parsed
//! [`BlockXml`]. Tree building is all-or-nothing: on error every block
//! created by that call is removed from the graph again.

pub mod definition;
pub mod source;
pub mod template;

pub use definition::{BlockDefinition, MessageToken, parse_definitions, tokenize_message};
pub use source::{DefinitionSource, FsSource, MemorySource};
pub use template::{BlockTemplate, TemplateSource};

use camino::Utf8Path;
use indexmap::IndexMap;
use uuid::Uuid;

use crate::error::{BlockLoadError, DefinitionError, LoadResult};
use crate::model::{BlockGraph, BlockRef, ConnectionRef, Field, Slot};
use crate::xml::{BlockXml, ChildXml, block_to_xml};

#[derive(Debug, Default, Clone)]
pub struct BlockFactory {
    definitions: IndexMap<String, BlockDefinition>,
}

impl BlockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition, replacing any previous one of the same type.
    pub fn add_definition(&mut self, definition: BlockDefinition) -> Option<BlockDefinition> {
        self.definitions
            .insert(definition.block_type().to_string(), definition)
    }

    /// Register every definition in a JSON document. Returns how many were
    /// added.
    pub fn add_json_definitions(&mut self, json: &str) -> Result<usize, DefinitionError> {
        let definitions = parse_definitions(json)?;
        let count = definitions.len();
        for definition in definitions {
            self.add_definition(definition);
        }
        Ok(count)
    }

    /// Load every `.json` file directly inside `dir`, in file-name order.
    pub fn load_definitions_dir(
        &mut self,
        source: &mut dyn DefinitionSource,
        dir: &Utf8Path,
    ) -> Result<usize, DefinitionError> {
        let source_err = |path: &Utf8Path, e: std::io::Error| DefinitionError::Source {
            path: path.to_string(),
            message: e.to_string(),
        };
        let mut files: Vec<_> = source
            .list_dir(dir)
            .map_err(|e| source_err(dir, e))?
            .into_iter()
            .filter(|p| p.extension() == Some("json"))
            .collect();
        files.sort();
        let mut count = 0;
        for path in files {
            let text = source
                .read_to_string(&path)
                .map_err(|e| source_err(&path, e))?;
            count += self.add_json_definitions(&text)?;
            tracing::debug!(%path, "loaded block definitions");
        }
        Ok(count)
    }

    pub fn contains(&self, block_type: &str) -> bool {
        self.definitions.contains_key(block_type)
    }

    pub fn definition(&self, block_type: &str) -> Option<&BlockDefinition> {
        self.definitions.get(block_type)
    }

    /// Registered type names, in registration order.
    pub fn block_types(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.definitions.clear();
    }

    /// A fresh id not used in `graph`.
    pub fn generate_id(graph: &BlockGraph) -> String {
        loop {
            let id = Uuid::new_v4().simple().to_string();
            if !graph.contains_id(&id) {
                return id;
            }
        }
    }

    /// Create a block (or a copied tree) from a template and add it to the
    /// graph, unconnected.
    pub fn obtain_block(&self, graph: &mut BlockGraph, template: &BlockTemplate) -> LoadResult<BlockRef> {
        match &template.source {
            TemplateSource::Type(block_type) => {
                let definition = self
                    .definition(block_type)
                    .ok_or_else(|| BlockLoadError::UnknownBlockType(block_type.clone()))?;
                let id = template
                    .id
                    .clone()
                    .unwrap_or_else(|| Self::generate_id(graph));
                let mut block = definition.instantiate(id);
                if template.shadow && block.fields().any(Field::is_variable) {
                    return Err(BlockLoadError::ShadowWithVariable(block_type.clone()));
                }
                block.set_shadow(template.shadow);
                if let Some(position) = template.position {
                    block.position = position;
                }
                graph.insert(block)
            }
            TemplateSource::CopyOf(original) => {
                let mut xml = block_to_xml(graph, *original, false)
                    .ok_or_else(|| BlockLoadError::MissingCopySource(original.to_string()))?;
                xml.strip_ids();
                xml.id = template.id.clone();
                xml.shadow = template.shadow;
                xml.position = template.position;
                self.build_block_tree(graph, &xml)
            }
        }
    }

    /// Build the block tree described by `xml` into `graph`.
    ///
    /// Children are connected and snapped into place under their parents.
    /// On error nothing created by this call remains in the graph.
    pub fn build_block_tree(&self, graph: &mut BlockGraph, xml: &BlockXml) -> LoadResult<BlockRef> {
        let mut created = Vec::new();
        match self.build_node(graph, xml, xml.shadow, &mut created) {
            Ok(r) => Ok(r),
            Err(e) => {
                for r in created.into_iter().rev() {
                    graph.remove(r);
                }
                Err(e)
            }
        }
    }

    fn build_node(
        &self,
        graph: &mut BlockGraph,
        xml: &BlockXml,
        shadow: bool,
        created: &mut Vec<BlockRef>,
    ) -> LoadResult<BlockRef> {
        let definition = self
            .definition(&xml.block_type)
            .ok_or_else(|| BlockLoadError::UnknownBlockType(xml.block_type.clone()))?;
        let id = match &xml.id {
            Some(id) => id.clone(),
            None => Self::generate_id(graph),
        };
        let mut block = definition.instantiate(id);
        if shadow && block.fields().any(Field::is_variable) {
            return Err(BlockLoadError::ShadowWithVariable(xml.block_type.clone()));
        }
        block.set_shadow(shadow);
        block.position = xml.position.unwrap_or_default();
        block.flags.deletable = xml.deletable;
        block.flags.movable = xml.movable;
        block.flags.editable = xml.editable;
        block.collapsed = xml.collapsed;
        block.disabled = xml.disabled;
        if xml.inline.is_some() {
            block.inputs_inline = xml.inline;
        }
        block.comment = xml.comment.clone();
        block.mutation = xml.mutation.clone();
        for (name, value) in &xml.fields {
            match block.field_mut(name) {
                Some(field) => {
                    if !field.set_from_string(value) {
                        tracing::warn!(
                            block_type = %xml.block_type,
                            field = %name,
                            value = %value,
                            "rejected field value, keeping default"
                        );
                    }
                }
                None => tracing::warn!(
                    block_type = %xml.block_type,
                    field = %name,
                    "ignoring unknown field"
                ),
            }
        }

        let r = graph.insert(block)?;
        created.push(r);

        for input in &xml.inputs {
            let incompatible = || BlockLoadError::IncompatibleChild {
                block_type: xml.block_type.clone(),
                name: input.name.clone(),
            };
            let index = definition.prototype().input_index(&input.name).ok_or_else(|| {
                BlockLoadError::UnknownInput {
                    block_type: xml.block_type.clone(),
                    name: input.name.clone(),
                }
            })?;
            if definition.prototype().inputs()[index].kind() != input.kind {
                return Err(incompatible());
            }
            self.attach_child(graph, xml, ConnectionRef::input(r, index), &input.child, shadow, created)
                .map_err(|e| match e {
                    ChildError::Load(e) => e,
                    ChildError::Incompatible => incompatible(),
                })?;
        }
        if let Some(next) = &xml.next {
            let incompatible = || BlockLoadError::IncompatibleChild {
                block_type: xml.block_type.clone(),
                name: "next".into(),
            };
            if definition.prototype().connection(Slot::Next).is_none() {
                return Err(incompatible());
            }
            self.attach_child(graph, xml, ConnectionRef::next(r), next, shadow, created)
                .map_err(|e| match e {
                    ChildError::Load(e) => e,
                    ChildError::Incompatible => incompatible(),
                })?;
        }
        Ok(r)
    }

    fn attach_child(
        &self,
        graph: &mut BlockGraph,
        parent: &BlockXml,
        socket: ConnectionRef,
        child: &ChildXml,
        parent_is_shadow: bool,
        created: &mut Vec<BlockRef>,
    ) -> Result<(), ChildError> {
        if parent_is_shadow && child.block.is_some() {
            return Err(BlockLoadError::ShadowWithRealChild(parent.block_type.clone()).into());
        }
        if let Some(shadow_xml) = &child.shadow {
            let s = self.build_node(graph, shadow_xml, true, created)?;
            let plug = graph.inferior_connection(s).ok_or(ChildError::Incompatible)?;
            graph
                .set_shadow_connection(socket, Some(plug))
                .map_err(|_| ChildError::Incompatible)?;
            graph.snap_to_parent(s);
        }
        if let Some(block_xml) = &child.block {
            let b = self.build_node(graph, block_xml, false, created)?;
            let plug = graph.inferior_connection(b).ok_or(ChildError::Incompatible)?;
            graph.connect(socket, plug).map_err(|_| ChildError::Incompatible)?;
            graph.snap_to_parent(b);
        }
        Ok(())
    }
}

enum ChildError {
    Load(BlockLoadError),
    Incompatible,
}

impl From<BlockLoadError> for ChildError {
    fn from(e: BlockLoadError) -> Self {
        ChildError::Load(e)
    }
}
