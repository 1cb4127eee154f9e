mod common;

use serde_json::{Map, Value, json};

use comfyui_forge_stack::{
    ConfigureOutcome, FieldValue, PersistedSlot, PortDirection, Result, SlotSchema,
};

use common::{init_logger, stack, value, widget, widget_names};

fn saved(stack: &comfyui_forge_stack::SharedStack<comfyui_forge_stack::MemoryNode>) -> Result<Map<String, Value>> {
    let mut state = Map::new();
    state.insert("title".to_string(), json!("Forge ControlNet Stack"));
    stack.borrow().on_serialize(&mut state)?;
    Ok(state)
}

#[test]
fn test_roundtrip() -> Result<()> {
    init_logger();
    let source = stack(SlotSchema::controlnet())?;
    {
        let mut node = source.borrow_mut();
        node.add_slot()?;
        node.add_slot()?;
        node.add_slot()?;
        node.remove_slot(1)?;

        let canny = FieldValue::text("canny");
        node.host_mut().set_value("cn_2_preprocessor", canny.clone());
        node.on_widget_changed("cn_2_preprocessor", &canny)?;
        node.host_mut()
            .set_value("cn_2_weight", FieldValue::Number(0.5));
        node.host_mut()
            .set_value("cn_3_model", FieldValue::text("control_v11f1p_sd15_depth"));
    }

    let state = saved(&source)?;
    let slots = state.get("cn_slots").expect("cn_slots");
    assert_eq!(slots[0]["index"], json!("2"));
    assert_eq!(slots[0]["preprocessor"], json!("canny"));
    assert_eq!(slots[0]["weight"], json!(0.5));
    assert!(slots[0].get("remove").is_none());
    assert_eq!(slots[1]["index"], json!("3"));

    let target = stack(SlotSchema::controlnet())?;
    let outcome = target.borrow_mut().configure(&state)?;
    assert_eq!(outcome, ConfigureOutcome::Restored(2));

    assert_eq!(widget_names(&target), widget_names(&source));
    assert_eq!(target.borrow().serialize()?, source.borrow().serialize()?);
    assert_eq!(
        value(&target, "cn_3_model"),
        Some(FieldValue::text("control_v11f1p_sd15_depth"))
    );
    assert!(widget(&target, "cn_2_threshold_a").is_some_and(|w| !w.hidden));
    assert!(widget(&target, "cn_3_threshold_a").is_some_and(|w| w.hidden));
    assert_eq!(
        widget(&target, "cn_2_weight").and_then(|w| w.label),
        Some("CN 2 Weight".to_string())
    );

    // 序号不复用
    assert_eq!(target.borrow_mut().add_slot()?, 4);
    Ok(())
}

#[test]
fn test_configure_is_idempotent() -> Result<()> {
    let source = stack(SlotSchema::lora())?;
    source.borrow_mut().add_slot()?;
    source.borrow_mut().add_slot()?;
    let state = saved(&source)?;

    let target = stack(SlotSchema::lora())?;
    target.borrow_mut().configure(&state)?;
    let first = widget_names(&target);
    target.borrow_mut().configure(&state)?;

    assert_eq!(widget_names(&target), first);
    assert_eq!(target.borrow().serialize()?, source.borrow().serialize()?);
    Ok(())
}

#[test]
fn test_absent_state_is_noop() -> Result<()> {
    let node = stack(SlotSchema::controlnet())?;
    node.borrow_mut().add_slot()?;
    let before = widget_names(&node);

    let mut state = Map::new();
    state.insert("lora_slots".to_string(), json!([{"index": "1"}]));
    assert_eq!(
        node.borrow_mut().configure(&state)?,
        ConfigureOutcome::Absent
    );
    assert_eq!(widget_names(&node), before);
    Ok(())
}

#[test]
fn test_malformed_state_is_rejected() -> Result<()> {
    let node = stack(SlotSchema::controlnet())?;
    node.borrow_mut().add_slot()?;
    let before = widget_names(&node);

    for raw in [
        json!({"index": "1"}),
        json!([{"index": "0"}]),
        json!([{"index": "2"}, {"model": "None"}]),
        json!([{"index": 2}, {"index": "2"}]),
    ] {
        let outcome = node.borrow_mut().restore(Some(&raw))?;
        assert_eq!(outcome, ConfigureOutcome::Rejected, "{raw}");
        assert_eq!(widget_names(&node), before, "{raw}");
    }
    Ok(())
}

#[test]
fn test_wrongly_typed_fields_use_defaults() -> Result<()> {
    let node = stack(SlotSchema::controlnet())?;
    let raw = json!([{"index": 3, "weight": "heavy", "model": 42, "end": 0.75, "unknown": true}]);
    assert_eq!(
        node.borrow_mut().restore(Some(&raw))?,
        ConfigureOutcome::Restored(1)
    );

    assert_eq!(value(&node, "cn_3_weight"), Some(FieldValue::Number(1.0)));
    assert_eq!(value(&node, "cn_3_model"), Some(FieldValue::text("None")));
    assert_eq!(value(&node, "cn_3_end"), Some(FieldValue::Number(0.75)));
    assert!(widget(&node, "cn_3_unknown").is_none());
    assert_eq!(
        node.borrow().host().port_names(PortDirection::Input),
        vec!["cn_3_image"]
    );
    assert_eq!(node.borrow_mut().add_slot()?, 4);
    Ok(())
}

#[test]
fn test_port_only_slot_is_persisted() -> Result<()> {
    let node = stack(SlotSchema::controlnet())?;
    node.borrow_mut()
        .host_mut()
        .push_port(PortDirection::Input, "cn_5_image", "IMAGE");

    let slots = node.borrow().serialize()?;
    assert_eq!(
        slots,
        vec![PersistedSlot {
            index: 5,
            fields: Default::default(),
        }]
    );
    assert_eq!(serde_json::to_value(&slots)?, json!([{"index": "5"}]));
    Ok(())
}

#[test]
fn test_empty_list_clears_slots() -> Result<()> {
    let node = stack(SlotSchema::lora())?;
    node.borrow_mut().add_slot()?;

    let mut state = Map::new();
    state.insert("lora_slots".to_string(), json!([]));
    assert_eq!(
        node.borrow_mut().configure(&state)?,
        ConfigureOutcome::Restored(0)
    );
    assert_eq!(
        widget_names(&node),
        vec!["forge_url", "enabled", "➕ Add LoRA", "🗑️ Clear All"]
    );
    Ok(())
}
