//! 节点原型钩子与堆栈节点的对应关系
//!
//! 每个 LiteGraph 节点对象对应一个 [`StackNode`], 在 onNodeCreated 时创建, onRemoved 时释放。

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use comfy_app::{ConnectionType, Node, NodeType};
use js_sys::Reflect;
use log::{debug, warn};
use wasm_bindgen::JsValue;

use crate::{
    error::{Error, Result},
    host::PortDirection,
    schema::SlotSchema,
    stack::{SharedStack, StackNode},
    web::{
        Runtime,
        node_host::{self, ComfyNodeHost, WidgetEvent},
    },
};

thread_local! {
    static STACKS: RefCell<Vec<(Node, SharedStack<ComfyNodeHost>)>> = const { RefCell::new(Vec::new()) };
}

/// 节点对应的堆栈
pub fn find(node: &Node) -> Option<SharedStack<ComfyNodeHost>> {
    STACKS.with_borrow(|stacks| {
        stacks
            .iter()
            .find(|(n, _)| n.is_same(node))
            .map(|(_, stack)| stack.clone())
    })
}

fn insert(node: Node, stack: SharedStack<ComfyNodeHost>) {
    STACKS.with_borrow_mut(|stacks| {
        stacks.retain(|(n, _)| !n.is_same(&node));
        stacks.push((node, stack));
    });
}

fn remove(node: &Node) {
    STACKS.with_borrow_mut(|stacks| stacks.retain(|(n, _)| !n.is_same(node)));
}

/// 为堆栈节点类型挂载原型钩子
pub fn register_stack(
    node_type: &NodeType,
    schema: &'static SlotSchema,
    runtime: Rc<Runtime>,
) -> std::result::Result<(), JsValue> {
    let prototype = node_type.prototype()?;

    prototype.on_node_created(move |node| Ok(create(node, schema, &runtime)?))?;

    prototype.on_configure(move |node, o| {
        let Some(stack) = find(&node) else {
            return Ok(());
        };

        let raw = Reflect::get(&o, &schema.persist_key().into())?;
        let raw: Option<serde_json::Value> = if raw.is_undefined() || raw.is_null() {
            None
        } else {
            Some(serde_wasm_bindgen::from_value(raw)?)
        };

        let outcome = borrow_mut(&stack)?.restore(raw.as_ref())?;
        debug!("{} configure {outcome:?}", schema.node_type);
        Ok(())
    })?;

    prototype.on_serialize(move |node, o| {
        let Some(stack) = find(&node) else {
            return Ok(());
        };

        let slots = stack
            .try_borrow()
            .map_err(|e| Error::Borrow(e.to_string()))?
            .serialize()?;
        Reflect::set(
            &o,
            &schema.persist_key().into(),
            &node_host::to_js(&slots)?,
        )?;
        Ok(())
    })?;

    prototype.on_connections_change(move |node, connection_type, index, connected| {
        let direction = match connection_type {
            ConnectionType::Input => PortDirection::Input,
            ConnectionType::Output => PortDirection::Output,
            ConnectionType::Unknown => return Ok(()),
        };
        let Some(stack) = find(&node) else {
            return Ok(());
        };

        // 增删卡槽时宿主会同步触发连线变化, 此时节点正在修改中, 直接跳过
        let Ok(mut stack) = stack.try_borrow_mut() else {
            debug!("{} connection change while busy", schema.node_type);
            return Ok(());
        };
        Ok(stack.on_connections_changed(direction, index, connected)?)
    })?;

    prototype.on_removed(move |node| {
        remove(&node);
        Ok(())
    })?;

    Ok(())
}

fn create(node: Node, schema: &'static SlotSchema, runtime: &Runtime) -> Result<()> {
    let host = ComfyNodeHost::new(node.clone(), runtime.app.clone());
    let stack = StackNode::new(
        host,
        schema,
        runtime.config.clone(),
        Some(runtime.resolver.clone()),
    );

    let weak = Rc::downgrade(&stack);
    borrow_mut(&stack)?
        .host_mut()
        .set_listener(Rc::new(move |event| dispatch(&weak, event)));

    insert(node, stack.clone());
    borrow_mut(&stack)?.on_create()
}

fn dispatch(stack: &Weak<RefCell<StackNode<ComfyNodeHost>>>, event: WidgetEvent) {
    let Some(stack) = stack.upgrade() else {
        return;
    };
    let Ok(mut stack) = stack.try_borrow_mut() else {
        debug!("drop {event:?}, node busy");
        return;
    };

    let result = match &event {
        WidgetEvent::Action(name) => stack.on_action(name),
        WidgetEvent::Changed(name, value) => stack.on_widget_changed(name, value),
    };
    if let Err(e) = result {
        warn!("handle {event:?} failed, {e}");
    }
}

fn borrow_mut(
    stack: &SharedStack<ComfyNodeHost>,
) -> Result<std::cell::RefMut<'_, StackNode<ComfyNodeHost>>> {
    stack
        .try_borrow_mut()
        .map_err(|e| Error::Borrow(e.to_string()))
}
