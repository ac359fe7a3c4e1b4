use anyhow::Result;
use blockly_core::error::DefinitionError;
use blockly_core::factory::{BlockFactory, FsSource, MessageToken, tokenize_message};
use blockly_core::model::{ConnectionKind, InputKind, Slot};
use blockly_core::{BlockTemplate, BlockGraph, BlocklyController};
use camino::Utf8Path;
use std::fs;
use tempfile::TempDir;

const LOGIC: &str = r#"[
  {"type": "logic_boolean", "message0": "%1",
   "args0": [{"type": "field_dropdown", "name": "BOOL",
              "options": [["true", "TRUE"], ["false", "FALSE"]]}],
   "output": "Boolean", "colour": 210, "tooltip": "true or false"},
  {"type": "logic_negate", "message0": "not %1",
   "args0": [{"type": "input_value", "name": "BOOL", "check": "Boolean"}],
   "output": "Boolean", "helpUrl": "https://example.org/not"}
]"#;

const LOOPS: &str = r#"{
  "type": "controls_whileUntil",
  "message0": "%1 %2",
  "args0": [
    {"type": "field_dropdown", "name": "MODE",
     "options": [["repeat while", "WHILE"], ["repeat until", "UNTIL"]]},
    {"type": "input_value", "name": "BOOL", "check": "Boolean"}
  ],
  "message1": "do %1",
  "args1": [{"type": "input_statement", "name": "DO"}],
  "previousStatement": null,
  "nextStatement": null
}"#;

fn write_defs(dir: &TempDir) -> Result<()> {
    fs::write(dir.path().join("logic.json"), LOGIC)?;
    fs::write(dir.path().join("loops.json"), LOOPS)?;
    fs::write(dir.path().join("notes.md"), "# not a definition")?;
    fs::create_dir(dir.path().join("nested.json"))?;
    Ok(())
}

#[test]
fn test_load_definitions_from_directory() -> Result<()> {
    let dir = TempDir::new()?;
    write_defs(&dir)?;
    let path = Utf8Path::from_path(dir.path()).expect("temp dir is UTF-8");

    let mut factory = BlockFactory::new();
    assert_eq!(factory.load_definitions_dir(&mut FsSource, path)?, 3);
    assert_eq!(
        factory.block_types().collect::<Vec<_>>(),
        vec!["logic_boolean", "logic_negate", "controls_whileUntil"]
    );

    let boolean = factory.definition("logic_boolean").unwrap();
    assert_eq!(boolean.colour(), Some("210"));
    assert_eq!(boolean.tooltip(), Some("true or false"));
    assert_eq!(factory.definition("logic_negate").unwrap().help_url(), Some("https://example.org/not"));

    let prototype = factory.definition("controls_whileUntil").unwrap().prototype();
    let kinds: Vec<_> = prototype.inputs().iter().map(|i| (i.name().to_string(), i.kind())).collect();
    assert_eq!(
        kinds,
        vec![("BOOL".to_string(), InputKind::Value), ("DO".to_string(), InputKind::Statement)]
    );
    assert_eq!(prototype.connection(Slot::Next).map(|c| c.kind()), Some(ConnectionKind::Next));
    Ok(())
}

#[test]
fn test_loaded_definitions_drive_the_controller() -> Result<()> {
    let dir = TempDir::new()?;
    write_defs(&dir)?;
    let path = Utf8Path::from_path(dir.path()).expect("temp dir is UTF-8");
    let mut factory = BlockFactory::new();
    factory.load_definitions_dir(&mut FsSource, path)?;

    let mut c = BlocklyController::new(factory);
    let looped = c.add_root_block_xml(
        r#"<block type="controls_whileUntil" id="w"><field name="MODE">UNTIL</field><value name="BOOL"><block type="logic_negate" id="n"><value name="BOOL"><shadow type="logic_boolean" id="b"/></value></block></value></block>"#,
    )?;
    assert_eq!(c.graph().descendants(looped).len(), 2);
    let mode = c.graph().block(looped).unwrap().field("MODE").unwrap().serialized_value();
    assert_eq!(mode, "UNTIL");
    assert!(c.workspace().check_invariants().is_empty());

    // Unknown dropdown values are rejected.
    assert!(c.set_field_value(looped, "MODE", "FOREVER").is_err());
    Ok(())
}

#[test]
fn test_definition_errors() -> Result<()> {
    let dir = TempDir::new()?;
    fs::write(dir.path().join("broken.json"), "[{\"type\": ")?;
    let path = Utf8Path::from_path(dir.path()).expect("temp dir is UTF-8");
    let mut factory = BlockFactory::new();
    assert!(matches!(
        factory.load_definitions_dir(&mut FsSource, path),
        Err(DefinitionError::Json(_))
    ));

    let missing = path.join("missing");
    assert!(matches!(
        factory.load_definitions_dir(&mut FsSource, &missing),
        Err(DefinitionError::Source { .. })
    ));

    assert!(matches!(
        factory.add_json_definitions(r#"{"type": "t", "message0": "%1", "args0": []}"#),
        Err(DefinitionError::Invalid { .. })
    ));
    assert!(matches!(
        factory.add_json_definitions(r#"{"type": "t", "message0": "%1", "args0": [{"type": "field_mystery"}]}"#),
        Err(DefinitionError::Invalid { .. })
    ));
    assert!(factory.block_types().next().is_none());
    Ok(())
}

#[test]
fn test_template_ids_are_generated_and_unique() -> Result<()> {
    let mut factory = BlockFactory::new();
    factory.add_json_definitions(LOGIC)?;
    let mut graph = BlockGraph::new();
    let a = factory.obtain_block(&mut graph, &BlockTemplate::of_type("logic_boolean"))?;
    let b = factory.obtain_block(&mut graph, &BlockTemplate::of_type("logic_boolean"))?;
    let (a, b) = (graph.block(a).unwrap(), graph.block(b).unwrap());
    assert!(!a.id().is_empty());
    assert_ne!(a.id(), b.id());
    Ok(())
}

#[test]
fn test_message_tokens() {
    use MessageToken::*;
    assert_eq!(
        tokenize_message("%1 is 100%% %2"),
        vec![Arg(1), Text(" is 100% ".into()), Arg(2)]
    );
}
