//! 堆栈节点
//!
//! 负责卡槽的增删、清空以及部件顺序与显示状态的维护。
//!
//! 宿主事件与方法的对应关系:
//! - 节点创建: [`StackNode::on_create`]
//! - 点击按钮: [`StackNode::on_action`]
//! - 部件取值变化: [`StackNode::on_widget_changed`]
//! - 连线变化: [`StackNode::on_connections_changed`]
//! - 保存/加载: 见 `persist` 模块
//!
//! 所有修改都在宿主的 UI 线程上同步完成, 下拉框可选值的拉取通过 [`OptionResolver`] 在后台进行,
//! 不会阻塞卡槽的创建。

use std::{
    cell::RefCell,
    collections::BTreeMap,
    rc::{Rc, Weak},
};

use log::debug;

use crate::{
    catalog::OptionResolver,
    config::ForgeConfig,
    error::Result,
    host::{FieldValue, NodeHost, PortDirection, WidgetKind, WidgetSpec},
    key::{SlotId, SlotKey},
    labels,
    schema::{CLEAR_ACTION, FieldKind, REMOVE_PARAM, SlotSchema},
    store::SlotStore,
};

pub type SharedStack<H> = Rc<RefCell<StackNode<H>>>;

pub struct StackNode<H: NodeHost> {
    host: H,
    schema: &'static SlotSchema,
    config: ForgeConfig,
    resolver: Option<OptionResolver>,
    /// 预览输出 -> 图像输入
    passthrough: BTreeMap<String, String>,
    this: Weak<RefCell<StackNode<H>>>,
}

impl<H: NodeHost + 'static> StackNode<H> {
    /// 创建堆栈节点
    ///
    /// `resolver` 为 None 时不拉取下拉框可选值
    pub fn new(
        host: H,
        schema: &'static SlotSchema,
        config: ForgeConfig,
        resolver: Option<OptionResolver>,
    ) -> SharedStack<H> {
        Rc::new_cyclic(|this| {
            RefCell::new(Self {
                host,
                schema,
                config,
                resolver,
                passthrough: BTreeMap::new(),
                this: this.clone(),
            })
        })
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn schema(&self) -> &'static SlotSchema {
        self.schema
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    pub fn store(&self) -> SlotStore<'_, H> {
        SlotStore::new(&self.host, self.schema)
    }

    /// 图像透传关系: 预览输出名 -> 图像输入名
    pub fn passthrough(&self) -> &BTreeMap<String, String> {
        &self.passthrough
    }

    /// 节点创建
    ///
    /// 移除后端节点定义自动生成的卡槽部件与卡槽, 补齐 "添加"/"清空" 按钮并隐藏共享配置字段
    pub fn on_create(&mut self) -> Result<()> {
        let stripped = self.strip_slots()?;
        if stripped > 0 {
            debug!(
                "{} stripped {stripped} declared slot items",
                self.schema.node_type
            );
        }

        self.ensure_action(self.schema.add_action)?;
        self.ensure_action(CLEAR_ACTION)?;
        self.hide_shared_field()?;
        self.finalize()
    }

    /// 添加卡槽, 返回新卡槽序号
    pub fn add_slot(&mut self) -> Result<u32> {
        let index = self.store().next_index()?;
        self.build_slot(index, None)?;
        self.finalize()?;

        debug!("{} add slot {index}", self.schema.node_type);
        Ok(index)
    }

    /// 移除卡槽, 卡槽不存在时什么都不做
    pub fn remove_slot(&mut self, index: u32) -> Result<()> {
        let removed = self.remove_slot_items(|key| key.index == index)?;
        if removed == 0 {
            return Ok(());
        }

        let prefix = format!("{}_", SlotId::new(self.schema.domain, index));
        self.passthrough.retain(|output, _| !output.starts_with(&prefix));

        debug!("{} remove slot {index}", self.schema.node_type);
        self.finalize()
    }

    /// 清空所有卡槽, 只保留固定字段与 "添加"/"清空" 按钮
    pub fn clear_all(&mut self) -> Result<()> {
        let schema = self.schema;
        let widgets = self.host.widgets()?;
        for (position, widget) in widgets.iter().enumerate().rev() {
            if self.config.is_fixed(&widget.name) || schema.is_action(&widget.name) {
                continue;
            }
            self.host.remove_widget(position)?;
        }

        self.reset_slots()?;
        self.finalize()
    }

    /// 按钮点击
    pub fn on_action(&mut self, name: &str) -> Result<()> {
        let schema = self.schema;
        if name == schema.add_action {
            return self.add_slot().map(|_| ());
        }
        if name == CLEAR_ACTION {
            return self.clear_all();
        }

        match SlotKey::parse(schema.domain, name) {
            Some(key) if key.param == REMOVE_PARAM => self.remove_slot(key.index),
            _ => Ok(()),
        }
    }

    /// 部件取值变化, 切换依赖该字段的部件的显示状态
    pub fn on_widget_changed(&mut self, name: &str, value: &FieldValue) -> Result<()> {
        let schema = self.schema;
        let Some(key) = SlotKey::parse(schema.domain, name) else {
            return Ok(());
        };

        let mut changed = false;
        for dependent in schema.dependents(&key.param) {
            let Some(rule) = dependent.visible_when else {
                continue;
            };
            if let Some(position) = self.store().position(&key.slot().key(dependent.key))? {
                self.host
                    .set_widget_hidden(position, !rule.is_visible(value))?;
                changed = true;
            }
        }

        if changed {
            self.host.relayout()?;
            self.host.mark_dirty()?;
        }
        Ok(())
    }

    /// 连线变化
    ///
    /// 图像输入接入时记录到对应预览输出的透传关系, 断开时移除
    pub fn on_connections_changed(
        &mut self,
        direction: PortDirection,
        position: usize,
        connected: bool,
    ) -> Result<()> {
        if direction != PortDirection::Input {
            return Ok(());
        }

        let schema = self.schema;
        let (Some(input_field), Some(output_field)) = (
            schema.port_field(PortDirection::Input),
            schema.port_field(PortDirection::Output),
        ) else {
            return Ok(());
        };

        let inputs = self.host.ports(PortDirection::Input)?;
        let Some(input) = inputs.get(position) else {
            return Ok(());
        };
        let Some(key) = SlotKey::parse(schema.domain, &input.name) else {
            return Ok(());
        };
        if key.param != input_field.key {
            return Ok(());
        }

        let output_name = key.slot().key(output_field.key).to_string();
        if connected {
            let has_output = self
                .host
                .ports(PortDirection::Output)?
                .iter()
                .any(|p| p.name == output_name);
            if has_output {
                self.passthrough.insert(output_name, input.name.clone());
            }
        } else {
            self.passthrough.remove(&output_name);
        }
        Ok(())
    }

    /// 刷新卡槽部件与卡槽的显示标签
    pub fn apply_visual_styles(&mut self) -> Result<()> {
        let schema = self.schema;

        let widgets = self.host.widgets()?;
        for (position, widget) in widgets.iter().enumerate() {
            let Some(key) = SlotKey::parse(schema.domain, &widget.name) else {
                continue;
            };
            let label = labels::widget_label(schema, &key, widget.kind == WidgetKind::Button);
            if widget.label.as_deref() != Some(label.as_str()) {
                self.host.set_widget_label(position, &label)?;
            }
        }

        for direction in [PortDirection::Input, PortDirection::Output] {
            let ports = self.host.ports(direction)?;
            for (position, port) in ports.iter().enumerate() {
                let Some(key) = SlotKey::parse(schema.domain, &port.name) else {
                    continue;
                };
                let label = labels::port_label(schema, &key);
                if port.label.as_deref() != Some(label.as_str()) {
                    self.host.set_port_label(direction, position, &label)?;
                }
            }
        }
        Ok(())
    }

    /// 下拉框可选值拉取完成
    ///
    /// 字段已被移除时返回 false, 不做任何修改
    pub fn apply_choices(&mut self, key: &SlotKey, choices: &[String]) -> Result<bool> {
        let Some(position) = self.store().position(key)? else {
            return Ok(false);
        };

        self.host.set_widget_choices(position, choices)?;
        self.apply_visual_styles()?;
        self.host.mark_dirty()?;
        Ok(true)
    }

    /// 当前节点的后端地址, 未设置时取默认值
    pub fn shared_url(&self) -> String {
        let field = &self.config.shared_field;
        self.host
            .widgets()
            .ok()
            .and_then(|widgets| widgets.into_iter().find(|w| &w.name == field))
            .and_then(|w| match w.value {
                FieldValue::Text(v) if !v.is_empty() => Some(v),
                _ => None,
            })
            .unwrap_or_else(|| self.config.default_url.clone())
    }

    /// 按模板构建卡槽
    ///
    /// `record` 为持久化的字段值, 缺失或类型不符的字段取默认值; 为 None 时全部取默认值
    pub(crate) fn build_slot(
        &mut self,
        index: u32,
        record: Option<&BTreeMap<String, serde_json::Value>>,
    ) -> Result<()> {
        let schema = self.schema;
        let slot = SlotId::new(schema.domain, index);

        let values: BTreeMap<&'static str, FieldValue> = schema
            .widget_fields()
            .map(|f| match record {
                Some(record) => (f.key, f.coerce(record.get(f.key))),
                None => (f.key, f.default.clone()),
            })
            .collect();

        for field in &schema.fields {
            let name = slot.key(field.key).to_string();

            if let FieldKind::Port {
                direction,
                data_type,
            } = &field.kind
            {
                self.host.add_port(*direction, &name, data_type)?;
                continue;
            }
            let Some(kind) = field.widget_kind() else {
                continue;
            };

            let hidden = field.visible_when.is_some_and(|rule| {
                let parent = values.get(rule.parent).unwrap_or(&FieldValue::Null);
                !rule.is_visible(parent)
            });
            let value = values
                .get(field.key)
                .cloned()
                .unwrap_or_else(|| field.default.clone());

            self.host.add_widget(WidgetSpec {
                kind,
                name,
                value,
                options: field.options(),
                hidden,
                notify: schema.is_parent(field.key),
            })?;
        }

        self.host
            .add_widget(WidgetSpec::button(&slot.key(REMOVE_PARAM).to_string()))?;

        self.request_choices(slot);
        Ok(())
    }

    /// 移除全部卡槽部件与卡槽, 固定字段与按钮不受影响
    pub(crate) fn reset_slots(&mut self) -> Result<usize> {
        self.passthrough.clear();
        self.strip_slots()
    }

    /// 刷新标签、按钮置尾、重新布局并通知重绘
    pub(crate) fn finalize(&mut self) -> Result<()> {
        self.apply_visual_styles()?;
        self.reorder_actions()?;
        self.host.relayout()?;
        self.host.mark_dirty()
    }

    fn strip_slots(&mut self) -> Result<usize> {
        self.remove_slot_items(|_| true)
    }

    /// 移除满足条件的卡槽部件与卡槽, 返回移除的数量
    fn remove_slot_items<F>(&mut self, matches: F) -> Result<usize>
    where
        F: Fn(&SlotKey) -> bool,
    {
        let domain = self.schema.domain;
        let is_match = |name: &str| SlotKey::parse(domain, name).is_some_and(|k| matches(&k));
        let mut removed = 0;

        let widgets = self.host.widgets()?;
        for (position, widget) in widgets.iter().enumerate().rev() {
            if is_match(&widget.name) {
                self.host.remove_widget(position)?;
                removed += 1;
            }
        }

        for direction in [PortDirection::Input, PortDirection::Output] {
            let ports = self.host.ports(direction)?;
            for (position, port) in ports.iter().enumerate().rev() {
                if is_match(&port.name) {
                    self.host.remove_port(direction, position)?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    /// 保证按钮存在且只有一个
    fn ensure_action(&mut self, name: &str) -> Result<()> {
        let positions: Vec<usize> = self
            .host
            .widgets()?
            .iter()
            .enumerate()
            .filter(|(_, w)| w.name == name)
            .map(|(i, _)| i)
            .collect();

        match positions.split_first() {
            None => self.host.add_widget(WidgetSpec::button(name)),
            Some((_, extra)) => {
                for &position in extra.iter().rev() {
                    self.host.remove_widget(position)?;
                }
                Ok(())
            }
        }
    }

    /// 共享配置字段由同步任务维护, 不在节点上显示
    fn hide_shared_field(&mut self) -> Result<()> {
        let field = self.config.shared_field.clone();
        if let Some(position) = self.host.widgets()?.iter().position(|w| w.name == field) {
            self.host.set_widget_label(position, "")?;
            self.host.set_widget_hidden(position, true)?;
        }
        Ok(())
    }

    /// 按钮置尾, "添加" 在 "清空" 之前
    fn reorder_actions(&mut self) -> Result<()> {
        let schema = self.schema;
        let widgets = self.host.widgets()?;

        let mut order = Vec::with_capacity(widgets.len());
        let mut add = Vec::new();
        let mut clear = Vec::new();
        for (position, widget) in widgets.iter().enumerate() {
            if widget.name == schema.add_action {
                add.push(position);
            } else if widget.name == CLEAR_ACTION {
                clear.push(position);
            } else {
                order.push(position);
            }
        }
        order.extend(add);
        order.extend(clear);

        if order.iter().enumerate().any(|(i, &p)| i != p) {
            self.host.reorder_widgets(&order)?;
        }
        Ok(())
    }

    fn request_choices(&self, slot: SlotId) {
        let Some(resolver) = &self.resolver else {
            return;
        };

        let base = self.shared_url();
        for field in &self.schema.fields {
            if let Some(source) = field.catalog {
                resolver.request(
                    self.this.clone(),
                    slot.key(field.key),
                    base.clone(),
                    source,
                    field.sentinel(),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryNode;

    fn controlnet() -> SharedStack<MemoryNode> {
        let config = ForgeConfig::default();
        let node = MemoryNode::with_fixed_fields(&config);
        StackNode::new(node, SlotSchema::controlnet(), config, None)
    }

    #[test]
    fn test_on_create_is_idempotent() -> Result<()> {
        let stack = controlnet();
        let mut stack = stack.borrow_mut();
        stack.on_create()?;
        stack.on_create()?;

        assert_eq!(
            stack.host().widget_names(),
            vec!["forge_url", "enabled", "➕ Add ControlNet", "🗑️ Clear All"]
        );
        let shared = stack.host().widget("forge_url").expect("forge_url");
        assert!(shared.hidden);
        assert_eq!(shared.label.as_deref(), Some(""));
        Ok(())
    }

    #[test]
    fn test_remove_missing_slot_is_noop() -> Result<()> {
        let stack = controlnet();
        let mut stack = stack.borrow_mut();
        stack.on_create()?;
        let relayouts = stack.host().relayout_count();

        stack.remove_slot(42)?;
        assert_eq!(stack.host().relayout_count(), relayouts);
        Ok(())
    }

    #[test]
    fn test_unknown_action_is_ignored() -> Result<()> {
        let stack = controlnet();
        let mut stack = stack.borrow_mut();
        stack.on_create()?;
        stack.on_action("cn_1_model")?;
        stack.on_action("something else")?;
        assert!(stack.store().indices()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_shared_url_fallback() -> Result<()> {
        let stack = controlnet();
        let mut stack = stack.borrow_mut();
        assert_eq!(stack.shared_url(), "http://127.0.0.1:7860");

        stack
            .host_mut()
            .set_value("forge_url", FieldValue::text("http://10.0.0.2:7861"));
        assert_eq!(stack.shared_url(), "http://10.0.0.2:7861");

        stack.host_mut().set_value("forge_url", FieldValue::text(""));
        assert_eq!(stack.shared_url(), "http://127.0.0.1:7860");
        Ok(())
    }
}
