//! LiteGraph 节点上的 [`NodeHost`] 实现

use std::rc::Rc;

use comfy_app::{ComfyApp, Node, SlotInfo, Widget};
use js_sys::Function;
use serde::Serialize;
use wasm_bindgen::{JsCast, JsValue, prelude::Closure};

use crate::{
    error::Result,
    host::{FieldValue, NodeHost, PortDirection, PortInfo, WidgetInfo, WidgetKind, WidgetSpec},
};

/// 用户在部件上的操作
#[derive(Debug, Clone)]
pub enum WidgetEvent {
    /// 点击按钮
    Action(String),
    /// 部件取值变化
    Changed(String, FieldValue),
}

pub type Listener = Rc<dyn Fn(WidgetEvent)>;

pub struct ComfyNodeHost {
    node: Node,
    app: ComfyApp,
    listener: Option<Listener>,
}

impl ComfyNodeHost {
    pub fn new(node: Node, app: ComfyApp) -> Self {
        Self {
            node,
            app,
            listener: None,
        }
    }

    /// 按钮点击与取值变化的回调, 只对之后新建的部件生效
    pub fn set_listener(&mut self, listener: Listener) {
        self.listener = Some(listener);
    }

    fn callback(&self, spec: &WidgetSpec) -> Option<Function> {
        let listener = self.listener.clone()?;
        let name = spec.name.clone();

        let closure = match spec.kind {
            WidgetKind::Button => Closure::wrap(Box::new(move |_value: JsValue| {
                listener(WidgetEvent::Action(name.clone()))
            }) as Box<dyn Fn(JsValue)>),
            _ if spec.notify => Closure::wrap(Box::new(move |value: JsValue| {
                listener(WidgetEvent::Changed(name.clone(), field_value(&value)))
            }) as Box<dyn Fn(JsValue)>),
            _ => return None,
        };

        let function = closure.as_ref().unchecked_ref::<Function>().clone();
        // 部件与节点同生命周期, 闭包交由 js 持有
        closure.forget();
        Some(function)
    }
}

impl NodeHost for ComfyNodeHost {
    fn widgets(&self) -> Result<Vec<WidgetInfo>> {
        Ok(self
            .node
            .get_widgets()?
            .into_iter()
            .map(widget_info)
            .collect())
    }

    fn add_widget(&mut self, spec: WidgetSpec) -> Result<()> {
        let callback = self.callback(&spec);
        let widget = self.node.add_widget(
            &spec.kind.to_string(),
            &spec.name,
            to_js(&spec.value)?,
            callback.as_ref(),
            to_js(&spec.options)?,
        )?;

        if spec.hidden && widget.is_object() {
            js_sys::Reflect::set(&widget, &"hidden".into(), &JsValue::TRUE)?;
        }
        Ok(())
    }

    fn remove_widget(&mut self, position: usize) -> Result<()> {
        Ok(self.node.remove_widget(position)?)
    }

    fn reorder_widgets(&mut self, order: &[usize]) -> Result<()> {
        Ok(self.node.reorder_widgets(order)?)
    }

    fn set_widget_value(&mut self, position: usize, value: FieldValue) -> Result<()> {
        Ok(self
            .node
            .set_widget_property(position, "value", &to_js(&value)?)?)
    }

    fn set_widget_hidden(&mut self, position: usize, hidden: bool) -> Result<()> {
        Ok(self
            .node
            .set_widget_property(position, "hidden", &JsValue::from_bool(hidden))?)
    }

    fn set_widget_label(&mut self, position: usize, label: &str) -> Result<()> {
        Ok(self
            .node
            .set_widget_property(position, "label", &JsValue::from_str(label))?)
    }

    fn set_widget_choices(&mut self, position: usize, values: &[String]) -> Result<()> {
        Ok(self.node.set_widget_choices(position, values)?)
    }

    fn ports(&self, direction: PortDirection) -> Result<Vec<PortInfo>> {
        let ports = match direction {
            PortDirection::Input => self.node.get_inputs()?,
            PortDirection::Output => self.node.get_outputs()?,
        };
        Ok(ports.into_iter().map(port_info).collect())
    }

    fn add_port(&mut self, direction: PortDirection, name: &str, data_type: &str) -> Result<()> {
        match direction {
            PortDirection::Input => self.node.add_input(name, data_type)?,
            PortDirection::Output => self.node.add_output(name, data_type)?,
        }
        Ok(())
    }

    fn remove_port(&mut self, direction: PortDirection, position: usize) -> Result<()> {
        match direction {
            PortDirection::Input => self.node.remove_input(position)?,
            PortDirection::Output => self.node.remove_output(position)?,
        }
        Ok(())
    }

    fn set_port_label(
        &mut self,
        direction: PortDirection,
        position: usize,
        label: &str,
    ) -> Result<()> {
        match direction {
            PortDirection::Input => self.node.set_input_label(position, label)?,
            PortDirection::Output => self.node.set_output_label(position, label)?,
        }
        Ok(())
    }

    fn relayout(&mut self) -> Result<()> {
        Ok(self.node.auto_size_height()?)
    }

    fn mark_dirty(&self) -> Result<()> {
        Ok(self.app.set_dirty()?)
    }
}

pub(crate) fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue> {
    Ok(value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())?)
}

pub(crate) fn field_value(value: &JsValue) -> FieldValue {
    if let Some(v) = value.as_bool() {
        return FieldValue::Bool(v);
    }
    if let Some(v) = value.as_f64() {
        return FieldValue::Number(v);
    }
    match value.as_string() {
        Some(v) => FieldValue::Text(v),
        None => FieldValue::Null,
    }
}

pub(crate) fn json_field_value(value: serde_json::Value) -> FieldValue {
    serde_json::from_value(value).unwrap_or(FieldValue::Null)
}

fn widget_info(widget: Widget) -> WidgetInfo {
    let kind = widget
        .r#type
        .parse()
        .unwrap_or_else(|_| WidgetKind::Other(widget.r#type.clone()));

    WidgetInfo {
        name: widget.name,
        kind,
        value: json_field_value(widget.value),
        hidden: widget.hidden,
        label: widget.label,
        choices: widget.choices,
    }
}

fn port_info(slot: SlotInfo) -> PortInfo {
    PortInfo {
        name: slot.name,
        data_type: slot.slot_type,
        label: slot.label,
        linked: slot.linked,
    }
}
