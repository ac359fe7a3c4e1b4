#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use blockly_core::events::{EventGroup, EventsCallback, TYPE_ALL};
use blockly_core::{BlockFactory, BlockRef, BlocklyController, ControllerConfig};

pub const DEFINITIONS: &str = r#"[
    {"type": "simple_input_output", "message0": "%1",
     "args0": [{"type": "input_value", "name": "VALUE"}],
     "output": null},
    {"type": "statement", "message0": "say %1",
     "args0": [{"type": "field_input", "name": "TEXT", "text": ""}],
     "previousStatement": null, "nextStatement": null},
    {"type": "terminal", "message0": "stop",
     "previousStatement": null},
    {"type": "repeat", "message0": "repeat %1 do %2",
     "args0": [{"type": "field_number", "name": "TIMES", "value": 10, "min": 0},
               {"type": "input_statement", "name": "DO"}],
     "previousStatement": null, "nextStatement": null},
    {"type": "number", "message0": "%1",
     "args0": [{"type": "field_number", "name": "NUM", "value": 0}],
     "output": "Number"},
    {"type": "text", "message0": "text %1",
     "args0": [{"type": "field_input", "name": "TEXT", "text": ""}],
     "output": "String"},
    {"type": "add", "message0": "%1 + %2",
     "args0": [{"type": "input_value", "name": "A", "check": "Number"},
               {"type": "input_value", "name": "B", "check": "Number"}],
     "output": "Number", "inputsInline": true},
    {"type": "negate", "message0": "- %1",
     "args0": [{"type": "input_value", "name": "VALUE", "check": "Number"}],
     "output": "Number"},
    {"type": "variable_get", "message0": "%1",
     "args0": [{"type": "field_variable", "name": "VAR", "variable": "item"}],
     "output": null},
    {"type": "variable_set", "message0": "set %1 to %2",
     "args0": [{"type": "field_variable", "name": "VAR", "variable": "item"},
               {"type": "input_value", "name": "VALUE"}],
     "previousStatement": null, "nextStatement": null}
]"#;

pub fn factory() -> BlockFactory {
    let mut factory = BlockFactory::new();
    factory
        .add_json_definitions(DEFINITIONS)
        .expect("test definitions parse");
    factory
}

pub fn controller() -> BlocklyController {
    let config = ControllerConfig {
        workspace_id: "test-workspace".into(),
        ..ControllerConfig::default()
    };
    BlocklyController::with_config(factory(), config)
}

/// Add `xml` as a root block and return its handle.
pub fn add(controller: &mut BlocklyController, xml: &str) -> BlockRef {
    controller.add_root_block_xml(xml).expect("add root block")
}

pub fn by_id(controller: &BlocklyController, id: &str) -> BlockRef {
    controller
        .block_by_id(id)
        .unwrap_or_else(|| panic!("no block with id {}", id))
}

pub fn assert_consistent(controller: &BlocklyController) {
    let problems = controller.workspace().check_invariants();
    assert!(problems.is_empty(), "workspace inconsistent: {:?}", problems);
}

/// Records every event group it receives.
#[derive(Clone)]
pub struct EventRecorder {
    pub groups: Rc<RefCell<Vec<EventGroup>>>,
    filter: u32,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::with_filter(TYPE_ALL)
    }

    pub fn with_filter(filter: u32) -> Self {
        Self {
            groups: Rc::new(RefCell::new(Vec::new())),
            filter,
        }
    }

    /// Register a clone with `controller`; this handle keeps reading the
    /// shared log.
    pub fn attach(&self, controller: &mut BlocklyController) {
        controller.add_events_callback(Box::new(self.clone()));
    }

    pub fn take(&self) -> Vec<EventGroup> {
        std::mem::take(&mut *self.groups.borrow_mut())
    }
}

impl EventsCallback for EventRecorder {
    fn type_filter(&self) -> u32 {
        self.filter
    }

    fn on_events_fired(&mut self, group: &EventGroup) {
        self.groups.borrow_mut().push(group.clone());
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
