//! 扩展入口
//!
//! 网页加载时：
//! init → addCustomNodeDefs → getCustomWidgets → beforeRegisterNodeDef → registerCustomNodes → beforeConfigureGraph → nodeCreated → loadedGraphNode → afterConfigureGraph → setup
//!
//! 加载工作流时：
//! beforeConfigureGraph → nodeCreated → loadedGraphNode → afterConfigureGraph
//!
//! 添加新节点时：
//! nodeCreated
//!

use std::fmt;

use js_sys::{Object, Reflect};
use wasm_bindgen::{
    JsValue,
    prelude::{Closure, wasm_bindgen},
};
use web_sys::console;

use crate::{ComfyApp, NodeData, NodeType};

/// 扩展
#[wasm_bindgen]
#[derive(Clone)]
pub struct Extension {
    /// 扩展名称, 需要唯一
    #[wasm_bindgen(skip)]
    pub name: String,
    // 扩展对象
    extension: Object,
}

/// Debug 展示
impl fmt::Debug for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Extension {{ extension: Object, name: {} }}", self.name)
    }
}

impl Extension {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            extension: Object::new(),
        }
    }

    /// 获取扩展对象
    pub fn as_js_value(&self) -> JsValue {
        self.extension.clone().into()
    }
}

/// Comfy 钩子（Hooks）
impl Extension {
    /// 设置beforeRegisterNodeDef钩子
    ///
    /// async beforeRegisterNodeDef(nodeType, nodeData, app)
    pub fn before_register_node_def<F>(&mut self, handler: F) -> Result<(), JsValue>
    where
        F: Fn(NodeType, NodeData, ComfyApp) -> Result<JsValue, JsValue> + 'static,
    {
        let handler = Closure::wrap(Box::new(
            move |node_type: Object, node_data: Object, app: Object| {
                let node_type = NodeType::new(node_type);
                let node_data = NodeData::new(node_data);
                let app = ComfyApp::from_app(app);
                handler(node_type, node_data, app).inspect_err(|e| console::error_1(e))
            },
        )
            as Box<dyn Fn(Object, Object, Object) -> Result<JsValue, JsValue>>);

        Reflect::set(
            &self.extension,
            &"beforeRegisterNodeDef".into(),
            &handler.as_ref().clone(),
        )?;

        // 保持闭包生命周期
        handler.forget();

        Ok(())
    }
}
