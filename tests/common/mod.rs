#![allow(dead_code)]

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use async_trait::async_trait;
use serde_json::Value;

use comfyui_forge_stack::{
    CatalogClient, DeferredSpawner, Error, FieldValue, ForgeConfig, MemoryNode, OptionResolver,
    Result, SharedStack, SlotSchema, StackNode, WidgetInfo,
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 按 url 返回固定响应, 未登记的 url 返回 500
#[derive(Default)]
pub struct CannedClient {
    responses: HashMap<String, Value>,
    requests: RefCell<Vec<String>>,
}

impl CannedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, payload: Value) -> Self {
        self.responses.insert(url.to_string(), payload);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

#[async_trait(?Send)]
impl CatalogClient for CannedClient {
    async fn get_json(&self, url: &str) -> Result<Value> {
        self.requests.borrow_mut().push(url.to_string());
        self.responses
            .get(url)
            .cloned()
            .ok_or(Error::HttpStatus(500))
    }
}

/// 不拉取可选值的堆栈节点, 已完成 on_create
pub fn stack(schema: &'static SlotSchema) -> Result<SharedStack<MemoryNode>> {
    let config = ForgeConfig::default();
    let node = MemoryNode::with_fixed_fields(&config);
    let stack = StackNode::new(node, schema, config, None);
    stack.borrow_mut().on_create()?;
    Ok(stack)
}

/// 使用给定客户端与延迟执行器的堆栈节点, 已完成 on_create
pub fn stack_with_resolver(
    schema: &'static SlotSchema,
    client: Rc<CannedClient>,
    spawner: Rc<DeferredSpawner>,
) -> Result<SharedStack<MemoryNode>> {
    let config = ForgeConfig::default();
    let node = MemoryNode::with_fixed_fields(&config);
    let resolver = OptionResolver::new(client, spawner);
    let stack = StackNode::new(node, schema, config, Some(resolver));
    stack.borrow_mut().on_create()?;
    Ok(stack)
}

pub fn widget(stack: &SharedStack<MemoryNode>, name: &str) -> Option<WidgetInfo> {
    use comfyui_forge_stack::NodeHost;

    stack
        .borrow()
        .host()
        .widgets()
        .ok()?
        .into_iter()
        .find(|w| w.name == name)
}

pub fn widget_names(stack: &SharedStack<MemoryNode>) -> Vec<String> {
    stack
        .borrow()
        .host()
        .widget_names()
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub fn value(stack: &SharedStack<MemoryNode>, name: &str) -> Option<FieldValue> {
    widget(stack, name).map(|w| w.value)
}
