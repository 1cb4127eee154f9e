mod common;

use std::rc::Rc;

use serde_json::json;

use comfyui_forge_stack::{
    CatalogSource, DeferredSpawner, FieldValue, OptionResolver, Result, SlotSchema,
};

use common::{CannedClient, init_logger, stack_with_resolver, widget};

const BASE: &str = "http://127.0.0.1:7860";

fn controlnet_client(base: &str) -> CannedClient {
    CannedClient::new()
        .with(
            &format!("{base}/controlnet/model_list"),
            json!({"model_list": ["control_v11p_sd15_canny", "", "control_v11f1p_sd15_depth"]}),
        )
        .with(
            &format!("{base}/controlnet/module_list"),
            json!({"module_list": ["none", "canny", "depth_midas"]}),
        )
}

fn choices(stack: &comfyui_forge_stack::SharedStack<comfyui_forge_stack::MemoryNode>, name: &str) -> Vec<String> {
    widget(stack, name).map(|w| w.choices).unwrap_or_default()
}

#[tokio::test]
async fn test_add_slot_does_not_wait_for_catalog() -> Result<()> {
    init_logger();
    let client = Rc::new(controlnet_client(BASE));
    let spawner = Rc::new(DeferredSpawner::new());
    let stack = stack_with_resolver(SlotSchema::controlnet(), client.clone(), spawner.clone())?;

    stack.borrow_mut().add_slot()?;
    assert_eq!(spawner.pending(), 2);
    assert!(client.requests().is_empty());
    assert_eq!(choices(&stack, "cn_1_model"), vec!["None"]);

    assert_eq!(spawner.run_pending().await, 2);
    assert_eq!(
        choices(&stack, "cn_1_model"),
        vec!["None", "control_v11p_sd15_canny", "control_v11f1p_sd15_depth"]
    );
    assert_eq!(
        choices(&stack, "cn_1_preprocessor"),
        vec!["none", "canny", "depth_midas"]
    );
    // 取值不受影响
    assert_eq!(
        widget(&stack, "cn_1_model").map(|w| w.value),
        Some(FieldValue::text("None"))
    );
    Ok(())
}

#[tokio::test]
async fn test_fetch_uses_node_url() -> Result<()> {
    let base = "http://10.0.0.3:7861";
    let client = Rc::new(controlnet_client(base));
    let spawner = Rc::new(DeferredSpawner::new());
    let stack = stack_with_resolver(SlotSchema::controlnet(), client.clone(), spawner.clone())?;

    stack
        .borrow_mut()
        .host_mut()
        .set_value("forge_url", FieldValue::text(&format!("{base}/")));
    stack.borrow_mut().add_slot()?;
    spawner.run_pending().await;

    let mut requests = client.requests();
    requests.sort();
    assert_eq!(
        requests,
        vec![
            format!("{base}/controlnet/model_list"),
            format!("{base}/controlnet/module_list"),
        ]
    );
    assert_eq!(choices(&stack, "cn_1_model").len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_failure_keeps_defaults() -> Result<()> {
    let client = Rc::new(CannedClient::new().with(
        &format!("{BASE}/controlnet/module_list"),
        json!({"unexpected": true}),
    ));
    let spawner = Rc::new(DeferredSpawner::new());
    let stack = stack_with_resolver(SlotSchema::controlnet(), client, spawner.clone())?;

    stack.borrow_mut().add_slot()?;
    spawner.run_pending().await;

    assert_eq!(choices(&stack, "cn_1_model"), vec!["None"]);
    assert_eq!(choices(&stack, "cn_1_preprocessor"), vec!["none"]);
    Ok(())
}

#[tokio::test]
async fn test_stale_completion_is_noop() -> Result<()> {
    let client = Rc::new(controlnet_client(BASE));
    let spawner = Rc::new(DeferredSpawner::new());
    let stack = stack_with_resolver(SlotSchema::controlnet(), client.clone(), spawner.clone())?;

    stack.borrow_mut().add_slot()?;
    stack.borrow_mut().add_slot()?;
    stack.borrow_mut().remove_slot(1)?;

    assert_eq!(spawner.run_pending().await, 4);
    assert_eq!(client.requests().len(), 4);
    assert!(widget(&stack, "cn_1_model").is_none());
    assert_eq!(choices(&stack, "cn_2_model").len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_dropped_node_is_noop() -> Result<()> {
    let client = Rc::new(controlnet_client(BASE));
    let spawner = Rc::new(DeferredSpawner::new());
    let stack = stack_with_resolver(SlotSchema::controlnet(), client, spawner.clone())?;

    stack.borrow_mut().add_slot()?;
    drop(stack);

    assert_eq!(spawner.run_pending().await, 2);
    Ok(())
}

#[tokio::test]
async fn test_restore_fetches_per_slot() -> Result<()> {
    let client = Rc::new(CannedClient::new().with(
        &format!("{BASE}/sdapi/v1/loras"),
        json!([{"name": "detail_tweaker", "alias": "detail"}, {"name": "None"}, {"path": "x"}]),
    ));
    let spawner = Rc::new(DeferredSpawner::new());
    let stack = stack_with_resolver(SlotSchema::lora(), client, spawner.clone())?;

    let raw = json!([
        {"index": "1", "name": "detail_tweaker", "strength": 0.8},
        {"index": "4", "name": "None", "strength": 1.0},
    ]);
    stack.borrow_mut().restore(Some(&raw))?;
    assert_eq!(spawner.pending(), 2);

    spawner.run_pending().await;
    assert_eq!(choices(&stack, "lora_1_name"), vec!["None", "detail_tweaker"]);
    assert_eq!(choices(&stack, "lora_4_name"), vec!["None", "detail_tweaker"]);
    assert_eq!(
        widget(&stack, "lora_1_name").map(|w| w.value),
        Some(FieldValue::text("detail_tweaker"))
    );
    Ok(())
}

#[tokio::test]
async fn test_fetch_directly() -> Result<()> {
    let client = Rc::new(controlnet_client(BASE));
    let resolver = OptionResolver::new(client, Rc::new(DeferredSpawner::new()));

    let values = resolver
        .fetch(BASE, CatalogSource::ControlNetModules, "none")
        .await?;
    assert_eq!(values, vec!["none", "canny", "depth_midas"]);

    let missing = resolver.fetch(BASE, CatalogSource::Loras, "None").await;
    assert!(missing.is_err());
    Ok(())
}
