//! Comfy Js App main
//!

use js_sys::{Array, Function, Object, Reflect};
use wasm_bindgen::{JsValue, prelude::*};

use crate::{Node, extension::Extension};

#[wasm_bindgen(raw_module = "/scripts/app.js")]
extern "C" {
    // import { app } from "../../scripts/app.js";
    #[wasm_bindgen(thread_local_v2, js_name = app)]
    static APP: JsValue;
}

#[wasm_bindgen]
#[derive(Debug, Clone)]
pub struct ComfyApp {
    app: JsValue,
}

#[wasm_bindgen]
impl ComfyApp {
    pub fn new() -> Result<ComfyApp, JsValue> {
        let app_obj = APP.with(|app| app.clone());
        Ok(ComfyApp { app: app_obj })
    }

    /// 获取 app 对象
    pub fn app(&self) -> JsValue {
        self.app.clone()
    }

    pub fn register_extension(&self, extension: &Extension) -> Result<(), JsValue> {
        let extension_obj = extension.as_js_value();

        // 设置name属性
        Reflect::set(
            &extension_obj,
            &"name".into(),
            &extension.name.clone().into(),
        )?;

        // 获取 registerExtension 方法
        let register_func =
            Reflect::get(&self.app, &"registerExtension".into())?.dyn_into::<Function>()?;

        // 调用 registerExtension
        register_func.call1(&self.app, &extension_obj)?;

        Ok(())
    }
}

impl ComfyApp {
    /// 钩子参数中的 app 对象
    pub fn from_app(app: Object) -> Self {
        Self { app: app.into() }
    }

    /// app.canvas
    pub fn canvas(&self) -> Result<JsValue, JsValue> {
        Reflect::get(&self.app, &"canvas".into())
    }

    /// app.graph
    pub fn graph(&self) -> Result<JsValue, JsValue> {
        Reflect::get(&self.app, &"graph".into())
    }

    /// 通知画布重绘
    ///
    /// app.canvas.setDirty(true, true)
    pub fn set_dirty(&self) -> Result<(), JsValue> {
        let canvas = self.canvas()?;
        if canvas.is_undefined() || canvas.is_null() {
            return Ok(());
        }

        let set_dirty_fn = Reflect::get(&canvas, &"setDirty".into())?.dyn_into::<Function>()?;
        set_dirty_fn.call2(&canvas, &JsValue::TRUE, &JsValue::TRUE)?;
        Ok(())
    }

    /// 画布中的全部节点
    ///
    /// 不同版本的前端节点列表位置不同, 依次尝试:
    /// canvas.nodes → app.nodes → canvas.graph.nodes → graph._nodes
    pub fn graph_nodes(&self) -> Result<Vec<Node>, JsValue> {
        let canvas = self.canvas()?;
        let graph = self.graph()?;
        let canvas_graph = get_path(&canvas, "graph");

        let candidates = [
            get_path(&canvas, "nodes"),
            get_path(&self.app, "nodes"),
            get_path(&canvas_graph, "nodes"),
            get_path(&graph, "_nodes"),
        ];

        let nodes = candidates
            .into_iter()
            .find(Array::is_array)
            .map(|v| v.unchecked_into::<Array>())
            .unwrap_or_else(Array::new);

        Ok(nodes
            .iter()
            .filter(|v| v.is_object())
            .map(|v| Node::new(v.unchecked_into::<Object>()))
            .collect())
    }
}

/// 读取属性, 对象不存在时返回 undefined
fn get_path(target: &JsValue, key: &str) -> JsValue {
    if !target.is_object() {
        return JsValue::UNDEFINED;
    }
    Reflect::get(target, &key.into()).unwrap_or(JsValue::UNDEFINED)
}
