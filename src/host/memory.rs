//! 内存中的节点实现
//!
//! 无界面环境下使用, 行为与 LiteGraph 节点的部件数组/卡槽数组一致。

use std::cell::Cell;

use crate::{
    config::ForgeConfig,
    error::{Error, Result},
    host::{FieldValue, NodeHost, PortDirection, PortInfo, WidgetInfo, WidgetKind, WidgetSpec},
};

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryWidget {
    pub name: String,
    pub kind: WidgetKind,
    pub value: FieldValue,
    pub hidden: bool,
    pub label: Option<String>,
    pub choices: Vec<String>,
    pub notify: bool,
}

impl From<WidgetSpec> for MemoryWidget {
    fn from(spec: WidgetSpec) -> Self {
        Self {
            name: spec.name,
            kind: spec.kind,
            value: spec.value,
            hidden: spec.hidden,
            label: None,
            choices: spec.options.values.unwrap_or_default(),
            notify: spec.notify,
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryNode {
    widgets: Vec<MemoryWidget>,
    inputs: Vec<PortInfo>,
    outputs: Vec<PortInfo>,
    relayouts: usize,
    dirty: Cell<usize>,
}

impl MemoryNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// 带固定字段(enabled / forge_url)的堆栈节点, 与后端节点定义一致
    pub fn with_fixed_fields(config: &ForgeConfig) -> Self {
        let mut node = Self::new();
        node.push_widget(MemoryWidget {
            name: config.shared_field.clone(),
            kind: WidgetKind::Text,
            value: FieldValue::Text(config.default_url.clone()),
            hidden: false,
            label: None,
            choices: Vec::new(),
            notify: false,
        });
        node.push_widget(MemoryWidget {
            name: "enabled".to_string(),
            kind: WidgetKind::Toggle,
            value: FieldValue::Bool(true),
            hidden: false,
            label: None,
            choices: Vec::new(),
            notify: false,
        });
        node
    }

    pub fn push_widget(&mut self, widget: MemoryWidget) {
        self.widgets.push(widget);
    }

    pub fn push_port(&mut self, direction: PortDirection, name: &str, data_type: &str) {
        self.port_list_mut(direction).push(PortInfo {
            name: name.to_string(),
            data_type: data_type.to_string(),
            label: None,
            linked: false,
        });
    }

    pub fn widget(&self, name: &str) -> Option<&MemoryWidget> {
        self.widgets.iter().find(|w| w.name == name)
    }

    pub fn widget_names(&self) -> Vec<&str> {
        self.widgets.iter().map(|w| w.name.as_str()).collect()
    }

    pub fn port_names(&self, direction: PortDirection) -> Vec<&str> {
        self.port_list(direction)
            .iter()
            .map(|p| p.name.as_str())
            .collect()
    }

    pub fn port(&self, direction: PortDirection, name: &str) -> Option<&PortInfo> {
        self.port_list(direction).iter().find(|p| p.name == name)
    }

    /// 模拟用户修改部件值, 不会触发回调
    pub fn set_value(&mut self, name: &str, value: FieldValue) -> bool {
        match self.widgets.iter_mut().find(|w| w.name == name) {
            Some(widget) => {
                widget.value = value;
                true
            }
            None => false,
        }
    }

    /// 模拟连线状态变化
    pub fn set_linked(&mut self, direction: PortDirection, position: usize, linked: bool) -> bool {
        match self.port_list_mut(direction).get_mut(position) {
            Some(port) => {
                port.linked = linked;
                true
            }
            None => false,
        }
    }

    pub fn relayout_count(&self) -> usize {
        self.relayouts
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.get()
    }

    fn port_list(&self, direction: PortDirection) -> &Vec<PortInfo> {
        match direction {
            PortDirection::Input => &self.inputs,
            PortDirection::Output => &self.outputs,
        }
    }

    fn port_list_mut(&mut self, direction: PortDirection) -> &mut Vec<PortInfo> {
        match direction {
            PortDirection::Input => &mut self.inputs,
            PortDirection::Output => &mut self.outputs,
        }
    }

    fn widget_mut(&mut self, position: usize) -> Result<&mut MemoryWidget> {
        let len = self.widgets.len();
        self.widgets
            .get_mut(position)
            .ok_or_else(|| Error::IndexOutOfRange(format!("widget {position} of {len}")))
    }
}

impl NodeHost for MemoryNode {
    fn widgets(&self) -> Result<Vec<WidgetInfo>> {
        Ok(self
            .widgets
            .iter()
            .map(|w| WidgetInfo {
                name: w.name.clone(),
                kind: w.kind.clone(),
                value: w.value.clone(),
                hidden: w.hidden,
                label: w.label.clone(),
                choices: w.choices.clone(),
            })
            .collect())
    }

    fn add_widget(&mut self, spec: WidgetSpec) -> Result<()> {
        self.widgets.push(spec.into());
        Ok(())
    }

    fn remove_widget(&mut self, position: usize) -> Result<()> {
        if position >= self.widgets.len() {
            return Err(Error::IndexOutOfRange(format!(
                "widget {position} of {}",
                self.widgets.len()
            )));
        }
        self.widgets.remove(position);
        Ok(())
    }

    fn reorder_widgets(&mut self, order: &[usize]) -> Result<()> {
        let mut seen = vec![false; self.widgets.len()];
        for &i in order {
            match seen.get_mut(i) {
                Some(flag) if !*flag => *flag = true,
                _ => return Err(Error::IndexOutOfRange(format!("invalid order {order:?}"))),
            }
        }
        if seen.iter().any(|flag| !flag) {
            return Err(Error::IndexOutOfRange(format!("invalid order {order:?}")));
        }

        let widgets = order.iter().map(|&i| self.widgets[i].clone()).collect();
        self.widgets = widgets;
        Ok(())
    }

    fn set_widget_value(&mut self, position: usize, value: FieldValue) -> Result<()> {
        self.widget_mut(position)?.value = value;
        Ok(())
    }

    fn set_widget_hidden(&mut self, position: usize, hidden: bool) -> Result<()> {
        self.widget_mut(position)?.hidden = hidden;
        Ok(())
    }

    fn set_widget_label(&mut self, position: usize, label: &str) -> Result<()> {
        self.widget_mut(position)?.label = Some(label.to_string());
        Ok(())
    }

    fn set_widget_choices(&mut self, position: usize, values: &[String]) -> Result<()> {
        self.widget_mut(position)?.choices = values.to_vec();
        Ok(())
    }

    fn ports(&self, direction: PortDirection) -> Result<Vec<PortInfo>> {
        Ok(self.port_list(direction).clone())
    }

    fn add_port(&mut self, direction: PortDirection, name: &str, data_type: &str) -> Result<()> {
        self.push_port(direction, name, data_type);
        Ok(())
    }

    fn remove_port(&mut self, direction: PortDirection, position: usize) -> Result<()> {
        let ports = self.port_list_mut(direction);
        if position >= ports.len() {
            return Err(Error::IndexOutOfRange(format!(
                "{direction:?} port {position} of {}",
                ports.len()
            )));
        }
        ports.remove(position);
        Ok(())
    }

    fn set_port_label(
        &mut self,
        direction: PortDirection,
        position: usize,
        label: &str,
    ) -> Result<()> {
        let port = self
            .port_list_mut(direction)
            .get_mut(position)
            .ok_or_else(|| Error::IndexOutOfRange(format!("{direction:?} port {position}")))?;
        port.label = Some(label.to_string());
        Ok(())
    }

    fn relayout(&mut self) -> Result<()> {
        self.relayouts += 1;
        Ok(())
    }

    fn mark_dirty(&self) -> Result<()> {
        self.dirty.set(self.dirty.get() + 1);
        Ok(())
    }
}
