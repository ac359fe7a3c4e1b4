use crate::model::{BlockRef, Point};

/// What a new block is built from.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateSource {
    /// A registered block type.
    Type(String),
    /// A deep copy of an existing block and everything below it.
    CopyOf(BlockRef),
}

/// Options for [`super::BlockFactory::obtain_block`].
///
/// ```
/// use blockly_core::factory::BlockTemplate;
///
/// let template = BlockTemplate {
///     id: Some("loop-1".into()),
///     ..BlockTemplate::of_type("controls_repeat")
/// };
/// assert!(!template.shadow);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BlockTemplate {
    pub source: TemplateSource,
    /// Generated when `None`.
    pub id: Option<String>,
    pub shadow: bool,
    pub position: Option<Point>,
}

impl BlockTemplate {
    pub fn of_type(block_type: impl Into<String>) -> Self {
        Self {
            source: TemplateSource::Type(block_type.into()),
            id: None,
            shadow: false,
            position: None,
        }
    }

    pub fn copy_of(block: BlockRef) -> Self {
        Self {
            source: TemplateSource::CopyOf(block),
            id: None,
            shadow: false,
            position: None,
        }
    }
}
