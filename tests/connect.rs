mod common;

use anyhow::Result;
use blockly_core::error::{ConnectionError, ControllerError};
use blockly_core::events::{BlocklyEvent, TYPE_MOVE};
use blockly_core::{BlockTemplate, ConnectionRef, Point};
use common::{EventRecorder, add, assert_consistent, by_id, controller};

#[test]
fn test_end_to_end_value_connection() -> Result<()> {
    let mut c = controller();
    c.load_workspace_contents(r#"<xml><block type="simple_input_output" id="A"/></xml>"#)?;
    let b = c.add_root_block(&BlockTemplate {
        id: Some("B".into()),
        ..BlockTemplate::of_type("simple_input_output")
    })?;
    let a = by_id(&c, "A");

    assert!(c.connect(ConnectionRef::output(b), ConnectionRef::input(a, 0))?);
    assert!(c.workspace().is_root(a));
    assert!(!c.workspace().is_root(b));
    assert_eq!(c.graph().parent_of(b), Some(a));
    assert_consistent(&c);

    let xml = c.workspace_xml();
    assert!(
        xml.contains(r#"<value name="VALUE"><block type="simple_input_output" id="B"/></value>"#),
        "{}",
        xml
    );

    let mut reloaded = controller();
    reloaded.load_workspace_contents(&xml)?;
    let a2 = by_id(&reloaded, "A");
    let b2 = by_id(&reloaded, "B");
    assert_eq!(reloaded.graph().parent_of(b2), Some(a2));
    assert_eq!(reloaded.workspace_xml(), xml);
    Ok(())
}

#[test]
fn test_splice_statement_keeps_remainder_chain() -> Result<()> {
    let mut c = controller();
    c.load_workspace_contents(
        r#"<xml>
            <block type="statement" id="A" x="0" y="0">
              <next><block type="statement" id="T1"><next><block type="statement" id="T2"/></next></block></next>
            </block>
            <block type="statement" id="S" x="200" y="200"/>
        </xml>"#,
    )?;
    let (a, t1, t2, s) = (by_id(&c, "A"), by_id(&c, "T1"), by_id(&c, "T2"), by_id(&c, "S"));

    assert!(c.connect(ConnectionRef::previous(s), ConnectionRef::next(a))?);
    let graph = c.graph();
    assert_eq!(graph.parent_of(s), Some(a));
    assert_eq!(graph.parent_of(t1), Some(s));
    assert_eq!(graph.parent_of(t2), Some(t1));
    assert_eq!(c.workspace().root_blocks().collect::<Vec<_>>(), vec![a]);
    assert_consistent(&c);
    Ok(())
}

#[test]
fn test_splice_into_statement_input() -> Result<()> {
    let mut c = controller();
    let repeat = add(
        &mut c,
        r#"<block type="repeat" id="R"><statement name="DO"><block type="statement" id="T1"/></statement></block>"#,
    );
    let s = add(&mut c, r#"<block type="statement" id="S"/>"#);
    let t1 = by_id(&c, "T1");

    assert!(c.connect(ConnectionRef::previous(s), ConnectionRef::input(repeat, 0))?);
    assert_eq!(c.graph().parent_of(s), Some(repeat));
    assert_eq!(c.graph().parent_of(t1), Some(s));
    assert_eq!(c.graph().parent_input_name(s).as_deref(), Some("DO"));
    assert_consistent(&c);
    Ok(())
}

#[test]
fn test_bump_when_remainder_has_nowhere_to_go() -> Result<()> {
    let mut c = controller();
    c.load_workspace_contents(
        r#"<xml>
            <block type="statement" id="A" x="0" y="0">
              <next><block type="statement" id="T1"><next><block type="statement" id="T2"/></next></block></next>
            </block>
            <block type="terminal" id="X" x="300" y="0"/>
        </xml>"#,
    )?;
    let (a, t1, t2, x) = (by_id(&c, "A"), by_id(&c, "T1"), by_id(&c, "T2"), by_id(&c, "X"));
    c.set_connection_offset(ConnectionRef::next(a), Point::new(0.0, 30.0))?;

    assert!(c.connect(ConnectionRef::previous(x), ConnectionRef::next(a))?);
    assert_eq!(c.graph().parent_of(x), Some(a));
    assert!(c.workspace().is_root(t1));
    assert_eq!(c.graph().parent_of(t2), Some(t1));
    assert_eq!(c.workspace().root_blocks().collect::<Vec<_>>(), vec![a, t1]);

    let vacated = c.graph().connection_position(ConnectionRef::next(a)).unwrap();
    let moved_to = c.graph().connection_position(ConnectionRef::previous(t1)).unwrap();
    assert!(vacated.distance_to(moved_to) >= c.config().bump_distance);
    assert_consistent(&c);
    Ok(())
}

#[test]
fn test_value_splice_and_value_bump() -> Result<()> {
    let mut c = controller();
    let outer = add(
        &mut c,
        r#"<block type="negate" id="OUTER"><value name="VALUE"><block type="number" id="N1"/></value></block>"#,
    );
    let inner = add(&mut c, r#"<block type="negate" id="INNER"/>"#);
    let n1 = by_id(&c, "N1");

    // One compatible empty input on the dragged block: the number moves there.
    assert!(c.connect(ConnectionRef::output(inner), ConnectionRef::input(outer, 0))?);
    assert_eq!(c.graph().parent_of(inner), Some(outer));
    assert_eq!(c.graph().parent_of(n1), Some(inner));
    assert_consistent(&c);

    // Two candidate inputs: ambiguous, so the number is bumped instead.
    let sum = add(&mut c, r#"<block type="add" id="SUM"/>"#);
    assert!(c.connect(ConnectionRef::output(sum), ConnectionRef::input(inner, 0))?);
    assert_eq!(c.graph().parent_of(sum), Some(inner));
    assert!(c.workspace().is_root(n1));
    assert_consistent(&c);
    Ok(())
}

#[test]
fn test_rejections() -> Result<()> {
    let mut c = controller();
    let a = add(&mut c, r#"<block type="simple_input_output" id="A"><value name="VALUE"><block type="simple_input_output" id="B"/></value></block>"#);
    let b = by_id(&c, "B");
    let sum = add(&mut c, r#"<block type="add" id="SUM"/>"#);
    let text = add(&mut c, r#"<block type="text" id="T"/>"#);
    let stmt = add(&mut c, r#"<block type="statement" id="S"/>"#);
    let recorder = EventRecorder::new();
    recorder.attach(&mut c);

    // Type checks fail: a soft refusal.
    assert!(!c.connect(ConnectionRef::output(text), ConnectionRef::input(sum, 0))?);
    assert!(c.workspace().is_root(text));

    assert!(matches!(
        c.connect(ConnectionRef::output(text), ConnectionRef::next(stmt)),
        Err(ControllerError::Connection(ConnectionError::WrongKind { .. }))
    ));
    assert_eq!(
        c.connect(ConnectionRef::output(a), ConnectionRef::input(a, 0)),
        Err(ControllerError::Connection(ConnectionError::SelfConnection))
    );
    assert_eq!(
        c.connect(ConnectionRef::output(a), ConnectionRef::input(b, 0)),
        Err(ControllerError::WouldCreateCycle("A".into()))
    );

    // Reconnecting an existing pair changes nothing.
    assert!(c.connect(ConnectionRef::output(b), ConnectionRef::input(a, 0))?);
    assert!(recorder.take().is_empty());
    assert_consistent(&c);
    Ok(())
}

#[test]
fn test_shadow_displaced_and_restored() -> Result<()> {
    let mut c = controller();
    let host = add(
        &mut c,
        r#"<block type="negate" id="H"><value name="VALUE"><shadow type="number" id="SH"><field name="NUM">5</field></shadow></value></block>"#,
    );
    let shadow = by_id(&c, "SH");
    let real = add(&mut c, r#"<block type="number" id="R"/>"#);
    let other = add(&mut c, r#"<block type="simple_input_output" id="O"/>"#);

    assert_eq!(
        c.connect(ConnectionRef::output(shadow), ConnectionRef::input(other, 0)),
        Err(ControllerError::ShadowBlock("SH".into()))
    );
    assert_eq!(
        c.connect(ConnectionRef::output(other), ConnectionRef::input(shadow, 0)),
        Err(ControllerError::Connection(ConnectionError::UnknownConnection))
    );

    assert!(c.connect(ConnectionRef::output(real), ConnectionRef::input(host, 0))?);
    assert_eq!(c.graph().target_block(ConnectionRef::input(host, 0)), Some(real));
    assert!(!c.workspace().is_live(shadow));
    // The displaced shadow is not a remainder: nothing new becomes a root.
    assert_eq!(c.workspace().root_blocks().count(), 2);
    assert_consistent(&c);

    c.extract_block_as_root(real)?;
    assert_eq!(c.graph().target_block(ConnectionRef::input(host, 0)), Some(shadow));
    assert!(c.workspace().is_root(real));
    assert_consistent(&c);

    let xml = c.workspace_xml();
    assert!(xml.contains(r#"<shadow type="number" id="SH"><field name="NUM">5</field></shadow>"#));

    // Same block again: the shadow is hidden, then restored once more.
    assert!(c.connect(ConnectionRef::output(real), ConnectionRef::input(host, 0))?);
    assert_eq!(c.graph().target_block(ConnectionRef::input(host, 0)), Some(real));
    assert!(!c.workspace().is_live(shadow));
    assert_eq!(c.graph().parent_of(shadow), None);
    assert_consistent(&c);

    c.extract_block_as_root(real)?;
    assert_eq!(c.graph().target_block(ConnectionRef::input(host, 0)), Some(shadow));
    assert_eq!(c.workspace_xml(), xml);
    assert_consistent(&c);
    Ok(())
}

#[test]
fn test_real_block_cannot_go_under_shadow() -> Result<()> {
    let mut c = controller();
    add(
        &mut c,
        r#"<block type="simple_input_output" id="H"><value name="VALUE"><shadow type="simple_input_output" id="SH"/></value></block>"#,
    );
    let shadow = by_id(&c, "SH");
    let real = add(&mut c, r#"<block type="simple_input_output" id="R"/>"#);
    assert_eq!(
        c.connect(ConnectionRef::output(real), ConnectionRef::input(shadow, 0)),
        Err(ControllerError::ShadowParent("SH".into()))
    );
    assert!(c.workspace().is_root(real));
    Ok(())
}

#[test]
fn test_move_between_parents_and_extract() -> Result<()> {
    let mut c = controller();
    let first = add(
        &mut c,
        r#"<block type="simple_input_output" id="P1"><value name="VALUE"><block type="simple_input_output" id="C"/></value></block>"#,
    );
    let second = add(&mut c, r#"<block type="simple_input_output" id="P2"/>"#);
    let child = by_id(&c, "C");
    let recorder = EventRecorder::with_filter(TYPE_MOVE);
    recorder.attach(&mut c);

    assert!(c.connect(ConnectionRef::output(child), ConnectionRef::input(second, 0))?);
    assert_eq!(c.graph().parent_of(child), Some(second));
    assert_eq!(c.graph().real_target_block(ConnectionRef::input(first, 0)), None);
    assert_consistent(&c);

    let groups = recorder.take();
    assert_eq!(groups.len(), 1);
    let [BlocklyEvent::Move(event)] = groups[0].events.as_slice() else {
        panic!("expected a single move event, got {:?}", groups[0].events);
    };
    assert_eq!(event.block_id, "C");
    assert_eq!(event.old.parent_id.as_deref(), Some("P1"));
    assert_eq!(event.new.parent_id.as_deref(), Some("P2"));
    assert_eq!(event.new.input_name.as_deref(), Some("VALUE"));

    c.extract_block_as_root(child)?;
    assert!(c.workspace().is_root(child));
    // Extracting a root is a no-op.
    c.extract_block_as_root(child)?;
    assert_eq!(recorder.take().len(), 1);
    assert_consistent(&c);
    Ok(())
}

#[test]
fn test_dragging_socket_moves_parent_tree() -> Result<()> {
    let mut c = controller();
    let parent = add(&mut c, r#"<block type="simple_input_output" id="P" x="100" y="100"/>"#);
    let child = add(&mut c, r#"<block type="simple_input_output" id="C" x="10" y="20"/>"#);
    c.set_connection_offset(ConnectionRef::input(parent, 0), Point::new(40.0, 0.0))?;

    assert!(c.connect(ConnectionRef::input(parent, 0), ConnectionRef::output(child))?);
    let graph = c.graph();
    assert_eq!(graph.block(child).unwrap().position(), Point::new(10.0, 20.0));
    assert_eq!(graph.block(parent).unwrap().position(), Point::new(-30.0, 20.0));
    assert_consistent(&c);
    Ok(())
}

#[test]
fn test_drop_target_and_neighbour_bump() -> Result<()> {
    let mut c = controller();
    let a = add(&mut c, r#"<block type="statement" id="A" x="0" y="0"/>"#);
    c.set_connection_offset(ConnectionRef::next(a), Point::new(0.0, 40.0))?;
    let stop = add(&mut c, r#"<block type="terminal" id="X" x="5" y="45"/>"#);

    assert_eq!(
        c.find_drop_target(stop),
        Some((ConnectionRef::previous(stop), ConnectionRef::next(a)))
    );
    assert!(c.move_block_to(stop, Point::new(500.0, 500.0))?);
    assert_eq!(c.find_drop_target(stop), None);

    // Close but unconnected: the neighbour is pushed away.
    c.move_block_to(stop, Point::new(3.0, 42.0))?;
    assert_eq!(c.bump_neighbours(a)?, 1);
    let position = c.graph().block(stop).unwrap().position();
    assert_eq!(position, Point::new(25.0, 65.0));
    assert_eq!(c.graph().block(a).unwrap().position(), Point::new(0.0, 0.0));
    assert_consistent(&c);
    Ok(())
}

#[test]
fn test_drop_target_skips_occupied_socket_with_failing_checks() -> Result<()> {
    let mut c = controller();
    add(
        &mut c,
        r#"<block type="negate" id="NEG" x="0" y="0"><value name="VALUE"><block type="number" id="N"/></value></block>"#,
    );
    let open = add(&mut c, r#"<block type="simple_input_output" id="S" x="20" y="0"/>"#);
    let text = add(&mut c, r#"<block type="text" id="T" x="5" y="0"/>"#);

    let target = c.find_drop_target(text);
    assert_eq!(target, Some((ConnectionRef::output(text), ConnectionRef::input(open, 0))));
    let (dragged, socket) = target.unwrap();
    assert!(c.connect(dragged, socket)?);
    assert_eq!(c.graph().parent_of(text), Some(open));
    assert_eq!(c.graph().parent_of(by_id(&c, "N")), Some(by_id(&c, "NEG")));
    assert_consistent(&c);
    Ok(())
}

#[test]
fn test_non_finite_positions_rejected() -> Result<()> {
    let mut c = controller();
    let a = add(&mut c, r#"<block type="statement" id="A" x="10" y="10"/>"#);
    assert!(matches!(
        c.move_block_to(a, Point::new(f32::NAN, 0.0)),
        Err(ControllerError::InvalidPosition { .. })
    ));
    assert!(matches!(
        c.set_connection_offset(ConnectionRef::next(a), Point::new(0.0, f32::INFINITY)),
        Err(ControllerError::InvalidPosition { .. })
    ));
    assert!(matches!(
        c.add_root_block(&BlockTemplate {
            position: Some(Point::new(f32::NEG_INFINITY, 0.0)),
            ..BlockTemplate::of_type("statement")
        }),
        Err(ControllerError::InvalidPosition { .. })
    ));
    assert_eq!(c.graph().block(a).unwrap().position(), Point::new(10.0, 10.0));
    assert!(c.move_block_to(a, Point::new(0.0, 0.0))?);
    assert_consistent(&c);
    Ok(())
}

#[test]
fn test_move_block_to_requires_root() -> Result<()> {
    let mut c = controller();
    let a = add(&mut c, r#"<block type="simple_input_output" id="A"><value name="VALUE"><block type="simple_input_output" id="B"/></value></block>"#);
    let b = by_id(&c, "B");
    assert_eq!(
        c.move_block_to(b, Point::new(1.0, 1.0)),
        Err(ControllerError::NotRoot("B".into()))
    );
    assert!(c.move_block_to(a, Point::new(7.0, 8.0))?);
    assert_eq!(c.graph().block(b).unwrap().position(), Point::new(7.0, 8.0));

    let pinned = add(&mut c, r#"<block type="number" id="P" movable="false"/>"#);
    assert!(!c.move_block_to(pinned, Point::new(1.0, 1.0))?);
    assert_consistent(&c);
    Ok(())
}
