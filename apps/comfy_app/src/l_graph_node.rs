//! 节点原型(LGraphNode.prototype)的生命周期钩子
//!
//! 每个钩子都会保留原型上已有的实现, 先调用原实现, 再调用 rust 处理函数,
//! rust 处理函数抛出的异常只打印, 不影响宿主。

use js_sys::{Function, Object, Reflect};
use serde_repr::{Deserialize_repr, Serialize_repr};
use wasm_bindgen::{
    JsCast, JsValue,
    prelude::{Closure, wasm_bindgen},
};

use crate::Node;

/// 连接类型
#[wasm_bindgen]
#[derive(Debug, Clone, Copy, PartialEq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum ConnectionType {
    /// 未知
    Unknown = 0,
    /// 输入卡槽
    Input = 1,
    /// 输出卡槽
    Output = 2,
}

impl From<i32> for ConnectionType {
    fn from(value: i32) -> Self {
        match value {
            1 => Self::Input,
            2 => Self::Output,
            _ => Self::Unknown,
        }
    }
}

// 包装函数, 用于透传 this 对象到 rust 的闭包, 并保留原有钩子
const CHAIN_WRAPPER_JS: &str = r#"
    return function(...args) {
        const result = typeof previous === "function" ? previous.apply(this, args) : undefined;
        try {
            rustHandler(this, ...args);
        } catch (e) {
            console.error(`Error in ${hookName}:`, e);
        }
        return result;
    };
"#;

#[wasm_bindgen]
#[derive(Debug, Clone)]
pub struct LGraphNode {
    inner: JsValue,
}

#[wasm_bindgen]
impl LGraphNode {
    #[wasm_bindgen(constructor)]
    pub fn new(inner: JsValue) -> Self {
        Self { inner }
    }

    /// 获取inner对象
    pub fn get_inner(&self) -> JsValue {
        self.inner.clone()
    }
}

impl LGraphNode {
    /// 设置onNodeCreated钩子
    ///
    /// binding: onNodeCreated()
    pub fn on_node_created<F>(&self, handler: F) -> Result<(), JsValue>
    where
        F: Fn(Node) -> Result<(), JsValue> + 'static,
    {
        let rust_handler = Closure::wrap(Box::new(move |this: JsValue| handler(as_node(this)))
            as Box<dyn Fn(JsValue) -> Result<(), JsValue>>);

        self.chain_hook("onNodeCreated", rust_handler.as_ref())?;

        // 保持闭包生命周期
        rust_handler.forget();
        Ok(())
    }

    /// 设置onConfigure钩子, 加载工作流时调用
    ///
    /// binding: onConfigure(o)
    pub fn on_configure<F>(&self, handler: F) -> Result<(), JsValue>
    where
        F: Fn(Node, JsValue) -> Result<(), JsValue> + 'static,
    {
        let rust_handler = Closure::wrap(Box::new(move |this: JsValue, o: JsValue| {
            handler(as_node(this), o)
        })
            as Box<dyn Fn(JsValue, JsValue) -> Result<(), JsValue>>);

        self.chain_hook("onConfigure", rust_handler.as_ref())?;

        rust_handler.forget();
        Ok(())
    }

    /// 设置onSerialize钩子, 保存工作流时调用, 处理函数直接修改 o
    ///
    /// binding: onSerialize(o)
    pub fn on_serialize<F>(&self, handler: F) -> Result<(), JsValue>
    where
        F: Fn(Node, JsValue) -> Result<(), JsValue> + 'static,
    {
        let rust_handler = Closure::wrap(Box::new(move |this: JsValue, o: JsValue| {
            handler(as_node(this), o)
        })
            as Box<dyn Fn(JsValue, JsValue) -> Result<(), JsValue>>);

        self.chain_hook("onSerialize", rust_handler.as_ref())?;

        rust_handler.forget();
        Ok(())
    }

    /// 设置onConnectionsChange钩子
    ///
    /// binding: onConnectionsChange
    ///
    /// Args:
    /// * this: 节点对象
    /// * type: 连接类型, 1: input, 2: output
    /// * index: 连接索引
    /// * connected: 是否连接
    pub fn on_connections_change<F>(&self, handler: F) -> Result<(), JsValue>
    where
        F: Fn(Node, ConnectionType, usize, bool) -> Result<(), JsValue> + 'static,
    {
        let rust_handler = Closure::wrap(Box::new(
            move |this: JsValue, r#type: i32, index: usize, connected: JsValue| {
                let connection_type: ConnectionType = r#type.into();
                // connected 可能为 bool 或 1/0
                let connected = connected.as_bool().unwrap_or(connected.as_f64() == Some(1.0));

                handler(as_node(this), connection_type, index, connected)
            },
        )
            as Box<dyn Fn(JsValue, i32, usize, JsValue) -> Result<(), JsValue>>);

        self.chain_hook("onConnectionsChange", rust_handler.as_ref())?;

        rust_handler.forget();
        Ok(())
    }

    /// 设置onRemoved钩子, 节点从画布中删除时调用
    ///
    /// binding: onRemoved()
    pub fn on_removed<F>(&self, handler: F) -> Result<(), JsValue>
    where
        F: Fn(Node) -> Result<(), JsValue> + 'static,
    {
        let rust_handler = Closure::wrap(Box::new(move |this: JsValue| handler(as_node(this)))
            as Box<dyn Fn(JsValue) -> Result<(), JsValue>>);

        self.chain_hook("onRemoved", rust_handler.as_ref())?;

        rust_handler.forget();
        Ok(())
    }

    /// 用包装函数替换原型上的钩子
    fn chain_hook(&self, hook_name: &str, rust_handler: &JsValue) -> Result<(), JsValue> {
        let previous = Reflect::get(&self.inner, &hook_name.into())?;

        let create_wrapper = Function::new_with_args("rustHandler, previous, hookName", CHAIN_WRAPPER_JS);
        let wrapper = create_wrapper
            .call3(
                &JsValue::NULL,
                rust_handler,
                &previous,
                &JsValue::from_str(hook_name),
            )?
            .dyn_into::<Function>()?;

        Reflect::set(&self.inner, &hook_name.into(), &wrapper)?;
        Ok(())
    }
}

fn as_node(this: JsValue) -> Node {
    Node::new(this.unchecked_into::<Object>())
}
