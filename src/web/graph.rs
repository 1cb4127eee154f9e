//! 画布上的 [`GraphHost`] 实现

use comfy_app::{ComfyApp, Node, Widget};
use js_sys::Reflect;
use log::debug;

use crate::{
    error::{Error, Result},
    host::FieldValue,
    sync::{GraphHost, GraphNode},
    web::{node_host, registry},
};

pub struct ComfyGraph {
    app: ComfyApp,
}

impl ComfyGraph {
    pub fn new(app: ComfyApp) -> Self {
        Self { app }
    }
}

impl GraphHost for ComfyGraph {
    type Node = ComfyGraphNode;

    fn nodes(&self) -> Vec<ComfyGraphNode> {
        match self.app.graph_nodes() {
            Ok(nodes) => nodes.into_iter().map(|node| ComfyGraphNode { node }).collect(),
            Err(e) => {
                debug!("list graph nodes failed, {e:?}");
                Vec::new()
            }
        }
    }

    fn mark_dirty(&self) {
        if let Err(e) = self.app.set_dirty() {
            debug!("set canvas dirty failed, {e:?}");
        }
    }
}

pub struct ComfyGraphNode {
    node: Node,
}

impl ComfyGraphNode {
    fn widget(&self, name: &str) -> Option<Widget> {
        let (_, widget) = self.node.find_widget(name).ok()??;
        Widget::from_js(&widget).ok()
    }
}

impl GraphNode for ComfyGraphNode {
    fn node_type(&self) -> Option<String> {
        self.node.node_type()
    }

    fn widget_value(&self, name: &str) -> Option<FieldValue> {
        self.widget(name)
            .map(|w| node_host::json_field_value(w.value))
    }

    fn widget_default(&self, name: &str) -> Option<FieldValue> {
        self.widget(name)?
            .default
            .map(node_host::json_field_value)
    }

    fn set_widget_value(&self, name: &str, value: FieldValue) -> Result<bool> {
        let Some((_, widget)) = self.node.find_widget(name)? else {
            return Ok(false);
        };
        Reflect::set(&widget, &"value".into(), &node_host::to_js(&value)?)?;
        Ok(true)
    }

    fn refresh_styles(&self) -> Result<()> {
        let Some(stack) = registry::find(&self.node) else {
            return Ok(());
        };
        let mut stack = stack
            .try_borrow_mut()
            .map_err(|e| Error::Borrow(e.to_string()))?;
        stack.apply_visual_styles()
    }
}
