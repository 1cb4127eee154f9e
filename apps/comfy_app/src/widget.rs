//! 部件节点
//!
//! 小部件和卡槽对象上挂有回调、画布引用等无法序列化的属性,
//! 这里逐字段读取, 不做整体反序列化。

use js_sys::{Array, Reflect};
use wasm_bindgen::{JsCast, JsValue};

/*
{"name":"cn_1_model","options":{"values":["None"]},"label":"CN 1 Model","type":"combo","value":"None","y":0}
*/

/// 小部件信息
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Widget {
    pub name: String,
    pub r#type: String,
    pub value: serde_json::Value,
    pub hidden: bool,
    pub label: Option<String>,
    /// options.values, 仅下拉框有值
    pub choices: Vec<String>,
    /// 声明的默认值: default 或 options.default
    pub default: Option<serde_json::Value>,
}

impl Widget {
    /// 从 JsValue 读取
    pub fn from_js(js_value: &JsValue) -> Result<Widget, JsValue> {
        let options = Reflect::get(js_value, &"options".into())?;

        let choices = if options.is_object() {
            let values = Reflect::get(&options, &"values".into())?;
            string_array(&values)
        } else {
            Vec::new()
        };

        let mut default = json_value(&Reflect::get(js_value, &"default".into())?);
        if default.is_none() && options.is_object() {
            default = json_value(&Reflect::get(&options, &"default".into())?);
        }

        Ok(Widget {
            name: get_string(js_value, "name")?.unwrap_or_default(),
            r#type: get_string(js_value, "type")?.unwrap_or_default(),
            value: json_value(&Reflect::get(js_value, &"value".into())?)
                .unwrap_or(serde_json::Value::Null),
            hidden: Reflect::get(js_value, &"hidden".into())?
                .as_bool()
                .unwrap_or(false),
            label: get_string(js_value, "label")?,
            choices,
            default,
        })
    }
}

/// 输入/输出槽位信息
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SlotInfo {
    pub name: String,
    pub slot_type: String,
    pub label: Option<String>,
    /// 是否已连线, 输入看 link, 输出看 links
    pub linked: bool,
}

impl SlotInfo {
    /// 从 JsValue 读取
    pub fn from_js(js_value: &JsValue) -> Result<SlotInfo, JsValue> {
        let link = Reflect::get(js_value, &"link".into())?;
        let links = Reflect::get(js_value, &"links".into())?;
        let linked = !(link.is_null() || link.is_undefined())
            || links
                .dyn_ref::<Array>()
                .is_some_and(|links| links.length() > 0);

        let slot_type = Reflect::get(js_value, &"type".into())?;
        Ok(SlotInfo {
            name: get_string(js_value, "name")?.unwrap_or_default(),
            slot_type: slot_type
                .as_string()
                .unwrap_or_else(|| slot_type.as_f64().map(|v| v.to_string()).unwrap_or_default()),
            label: get_string(js_value, "label")?,
            linked,
        })
    }
}

fn get_string(target: &JsValue, key: &str) -> Result<Option<String>, JsValue> {
    Ok(Reflect::get(target, &key.into())?.as_string())
}

fn json_value(value: &JsValue) -> Option<serde_json::Value> {
    if value.is_undefined() || value.is_null() {
        return None;
    }
    serde_wasm_bindgen::from_value(value.clone()).ok()
}

fn string_array(value: &JsValue) -> Vec<String> {
    value
        .dyn_ref::<Array>()
        .map(|values| values.iter().filter_map(|v| v.as_string()).collect())
        .unwrap_or_default()
}
