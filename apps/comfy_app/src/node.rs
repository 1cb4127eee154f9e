//! Node

use js_sys::{Array, Function, Object, Reflect};
use wasm_bindgen::{JsCast, JsValue, prelude::wasm_bindgen};

use crate::{SlotInfo, Widget};

#[wasm_bindgen]
#[derive(Debug, Clone)]
pub struct Node {
    inner: Object,
}

#[wasm_bindgen]
impl Node {
    #[wasm_bindgen(constructor)]
    pub fn new(inner: Object) -> Self {
        Self { inner }
    }

    /// 获取inner对象
    pub fn get_inner(&self) -> Object {
        self.inner.clone()
    }
}
/*
{
"title":"Forge ControlNet Stack",
"id":12,
"type":"ForgeControlNetStack",
"inputs":[
    {"name":"cn_1_image","label":"CN 1 Image","type":"IMAGE","link":null}
],
"outputs":[
    {"name":"cn_stack","label":"cn_stack","type":"CN_STACK","links":null},
    {"name":"cn_1_preview","label":"CN 1 Preview","type":"IMAGE","links":null}
],
"widgets":[
    {"name":"forge_url","options":{},"label":"","type":"text","hidden":true},
    {"name":"enabled","options":{"on":"true","off":"false"},"label":"enabled","type":"toggle"},
    {"name":"cn_1_model","options":{"values":["None"]},"label":"CN 1 Model","type":"combo"},
    {"name":"➕ Add ControlNet","options":{},"label":"➕ Add ControlNet","type":"button"}
],
"size":[320,260]
}
*/

#[wasm_bindgen]
impl Node {
    /// 获取输入槽位列表, 不存在时返回空列表
    #[wasm_bindgen(getter)]
    pub fn inputs(&self) -> Result<Array, JsValue> {
        self.get_array("inputs")
    }

    /// 获取输出槽位列表, 不存在时返回空列表
    #[wasm_bindgen(getter)]
    pub fn outputs(&self) -> Result<Array, JsValue> {
        self.get_array("outputs")
    }

    /// 获取小部件列表, 不存在时返回空列表
    #[wasm_bindgen(getter)]
    pub fn widgets(&self) -> Result<Array, JsValue> {
        self.get_array("widgets")
    }

    /// 设置小部件列表
    #[wasm_bindgen(setter)]
    pub fn set_widgets(&self, widgets: &Array) -> Result<bool, JsValue> {
        Reflect::set(&self.inner, &"widgets".into(), widgets)
    }

    /// 添加输入槽位
    ///
    /// Args:
    /// * name: 输入槽位名称
    /// * r#type: 输入槽位类型
    pub fn add_input(&self, name: &str, r#type: &str) -> Result<(), JsValue> {
        self.call(
            "addInput",
            &[JsValue::from_str(name), JsValue::from_str(r#type)],
        )
    }

    /// 移除输入槽位
    pub fn remove_input(&self, index: usize) -> Result<(), JsValue> {
        self.call("removeInput", &[JsValue::from_f64(index as f64)])
    }

    /// 添加输出槽位
    pub fn add_output(&self, name: &str, r#type: &str) -> Result<(), JsValue> {
        self.call(
            "addOutput",
            &[JsValue::from_str(name), JsValue::from_str(r#type)],
        )
    }

    /// 移除输出槽位
    pub fn remove_output(&self, index: usize) -> Result<(), JsValue> {
        self.call("removeOutput", &[JsValue::from_f64(index as f64)])
    }
}

/// 便捷接口
impl Node {
    /// 节点类型: type, 其次 comfyClass
    pub fn node_type(&self) -> Option<String> {
        ["type", "comfyClass"].into_iter().find_map(|key| {
            Reflect::get(&self.inner, &key.into())
                .ok()
                .and_then(|v| v.as_string())
                .filter(|v| !v.is_empty())
        })
    }

    /// 是否为同一个 js 对象
    pub fn is_same(&self, other: &Node) -> bool {
        Object::is(&self.inner, &other.inner)
    }

    /// 获取小部件列表
    pub fn get_widgets(&self) -> Result<Vec<Widget>, JsValue> {
        self.widgets()?.iter().map(|w| Widget::from_js(&w)).collect()
    }

    /// 获取输入槽位列表
    pub fn get_inputs(&self) -> Result<Vec<SlotInfo>, JsValue> {
        self.inputs()?.iter().map(|v| SlotInfo::from_js(&v)).collect()
    }

    /// 获取输出槽位列表
    pub fn get_outputs(&self) -> Result<Vec<SlotInfo>, JsValue> {
        self.outputs()?.iter().map(|v| SlotInfo::from_js(&v)).collect()
    }

    // export const getWidgetByName = (node, name) => node.widgets.find((w) => w.name === name);
    /// 按名称查找小部件, 返回位置与对象
    pub fn find_widget(&self, name: &str) -> Result<Option<(usize, JsValue)>, JsValue> {
        for (position, widget) in self.widgets()?.iter().enumerate() {
            if Reflect::get(&widget, &"name".into())?.as_string().as_deref() == Some(name) {
                return Ok(Some((position, widget)));
            }
        }
        Ok(None)
    }

    /// 设置小部件属性, 例如 value / hidden / label
    pub fn set_widget_property(
        &self,
        position: usize,
        key: &str,
        value: &JsValue,
    ) -> Result<(), JsValue> {
        let widget = self.widget_at(position)?;
        Reflect::set(&widget, &key.into(), value)?;
        Ok(())
    }

    /// 设置下拉框可选值
    ///
    /// widget.options.values = values
    pub fn set_widget_choices(&self, position: usize, values: &[String]) -> Result<(), JsValue> {
        let widget = self.widget_at(position)?;

        let mut options = Reflect::get(&widget, &"options".into())?;
        if !options.is_object() {
            options = Object::new().into();
            Reflect::set(&widget, &"options".into(), &options)?;
        }

        let values: Array = values.iter().map(|v| JsValue::from_str(v)).collect();
        Reflect::set(&options, &"values".into(), &values)?;
        Ok(())
    }

    /// 移除小部件
    ///
    /// 先调用 widget.onRemove, 再从列表中移除
    pub fn remove_widget(&self, position: usize) -> Result<(), JsValue> {
        let widget = self.widget_at(position)?;
        if let Ok(on_remove) = Reflect::get(&widget, &"onRemove".into())?.dyn_into::<Function>() {
            on_remove.call0(&widget)?;
        }

        let widgets: Array = self
            .widgets()?
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != position)
            .map(|(_, w)| w)
            .collect();
        self.set_widgets(&widgets)?;
        Ok(())
    }

    /// 按给定顺序重排小部件, `order[i]` 为新位置 i 上的原位置
    pub fn reorder_widgets(&self, order: &[usize]) -> Result<(), JsValue> {
        let widgets = self.widgets()?;
        if order.len() != widgets.length() as usize {
            return Err(JsValue::from_str("widget order length mismatch"));
        }

        let reordered: Array = order.iter().map(|&i| widgets.get(i as u32)).collect();
        self.set_widgets(&reordered)?;
        Ok(())
    }

    /// 设置输入槽位显示名
    pub fn set_input_label(&self, position: usize, label: &str) -> Result<(), JsValue> {
        let input = self.inputs()?.get(position as u32);
        Reflect::set(&input, &"label".into(), &JsValue::from_str(label))?;
        Ok(())
    }

    /// 设置输出槽位显示名
    pub fn set_output_label(&self, position: usize, label: &str) -> Result<(), JsValue> {
        let output = self.outputs()?.get(position as u32);
        Reflect::set(&output, &"label".into(), &JsValue::from_str(label))?;
        Ok(())
    }

    /// 按内容重新计算高度, 保留当前宽度
    ///
    /// this.setSize([this.size[0], this.computeSize()[1]])
    pub fn auto_size_height(&self) -> Result<(), JsValue> {
        let compute_size_fn =
            Reflect::get(&self.inner, &"computeSize".into())?.dyn_into::<Function>()?;
        // computeSize 可能返回 Array 或 Float32Array, 按下标读取
        let computed = compute_size_fn.call0(&self.inner)?;
        let height = Reflect::get(&computed, &JsValue::from_f64(1.0))?;

        let size = Reflect::get(&self.inner, &"size".into())?;
        let width = Reflect::get(&size, &JsValue::from_f64(0.0))
            .ok()
            .and_then(|v| v.as_f64())
            .or_else(|| {
                Reflect::get(&computed, &JsValue::from_f64(0.0))
                    .ok()
                    .and_then(|v| v.as_f64())
            })
            .unwrap_or_default();

        let new_size = Array::of2(&JsValue::from_f64(width), &height);
        self.call("setSize", &[new_size.into()])
    }

    /// 添加小部件, 返回新建的小部件对象
    ///
    /// addWidget(type, name2, value, callback, options2)
    pub fn add_widget(
        &self,
        r#type: &str,
        name: &str,
        value: JsValue,
        callback: Option<&Function>,
        options: JsValue,
    ) -> Result<JsValue, JsValue> {
        let add_widget_fn =
            Reflect::get(&self.inner, &"addWidget".into())?.dyn_into::<Function>()?;

        let callback: JsValue = callback.map(|f| f.clone().into()).unwrap_or(JsValue::NULL);
        let args = Array::of5(
            &JsValue::from_str(r#type),
            &JsValue::from_str(name),
            &value,
            &callback,
            &options,
        );
        add_widget_fn.apply(&self.inner, &args)
    }
}

impl Node {
    fn get_array(&self, key: &str) -> Result<Array, JsValue> {
        let value = Reflect::get(&self.inner, &key.into())?;
        Ok(value.dyn_into::<Array>().unwrap_or_else(|_| Array::new()))
    }

    fn widget_at(&self, position: usize) -> Result<JsValue, JsValue> {
        let widgets = self.widgets()?;
        if position >= widgets.length() as usize {
            return Err(JsValue::from_str("widget index out of range"));
        }
        Ok(widgets.get(position as u32))
    }

    fn call(&self, method: &str, args: &[JsValue]) -> Result<(), JsValue> {
        let func = Reflect::get(&self.inner, &method.into())?.dyn_into::<Function>()?;
        let args: Array = args.iter().collect();
        func.apply(&self.inner, &args)?;
        Ok(())
    }
}

impl From<Node> for Object {
    fn from(node: Node) -> Self {
        node.get_inner()
    }
}
