//! 宿主协作接口
//!
//! 核心逻辑不持有节点本身, 只通过 [`NodeHost`] 操作宿主的部件/卡槽集合。
//! 浏览器中由 `web::ComfyNodeHost` 实现, 无界面环境与测试中使用 [`MemoryNode`]。
//!
//! 部件按位置寻址, 位置在每次增删后都会变化, 调用方每次操作前需重新读取快照。

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::error::Result;

mod memory;
pub use memory::{MemoryNode, MemoryWidget};

/// 部件的取值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Null,
}

impl FieldValue {
    pub fn text(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// 未设置: null 或空字符串
    pub fn is_unset(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(v) => v.is_empty(),
            _ => false,
        }
    }
}

/// 部件类型, 与 LiteGraph 的 widget.type 对应
#[derive(Debug, Clone, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum WidgetKind {
    Combo,
    Number,
    Toggle,
    Text,
    Button,
    #[strum(default)]
    Other(String),
}

/// 小部件选项
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

/// 新增部件的描述
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetSpec {
    pub kind: WidgetKind,
    pub name: String,
    pub value: FieldValue,
    pub options: WidgetOptions,
    pub hidden: bool,
    /// 值变化时宿主需回调 `StackNode::on_widget_changed`
    pub notify: bool,
}

impl WidgetSpec {
    /// 按钮部件, 点击时宿主需回调 `StackNode::on_action`
    pub fn button(name: &str) -> Self {
        Self {
            kind: WidgetKind::Button,
            name: name.to_string(),
            value: FieldValue::Null,
            options: WidgetOptions::default(),
            hidden: false,
            notify: false,
        }
    }
}

/// 部件快照
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetInfo {
    pub name: String,
    pub kind: WidgetKind,
    pub value: FieldValue,
    pub hidden: bool,
    pub label: Option<String>,
    pub choices: Vec<String>,
}

/// 卡槽方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    Input,
    Output,
}

/// 输入/输出卡槽快照
#[derive(Debug, Clone, PartialEq)]
pub struct PortInfo {
    pub name: String,
    pub data_type: String,
    pub label: Option<String>,
    pub linked: bool,
}

/// 宿主节点的部件/卡槽集合
pub trait NodeHost {
    /// 当前部件列表(按显示顺序)
    fn widgets(&self) -> Result<Vec<WidgetInfo>>;

    /// 在末尾追加部件
    fn add_widget(&mut self, spec: WidgetSpec) -> Result<()>;

    /// 按位置移除部件
    fn remove_widget(&mut self, position: usize) -> Result<()>;

    /// 按给定顺序重排部件, `order` 为原位置的一个排列
    fn reorder_widgets(&mut self, order: &[usize]) -> Result<()>;

    fn set_widget_value(&mut self, position: usize, value: FieldValue) -> Result<()>;

    fn set_widget_hidden(&mut self, position: usize, hidden: bool) -> Result<()>;

    fn set_widget_label(&mut self, position: usize, label: &str) -> Result<()>;

    /// 替换下拉框的可选值
    fn set_widget_choices(&mut self, position: usize, values: &[String]) -> Result<()>;

    fn ports(&self, direction: PortDirection) -> Result<Vec<PortInfo>>;

    fn add_port(&mut self, direction: PortDirection, name: &str, data_type: &str) -> Result<()>;

    fn remove_port(&mut self, direction: PortDirection, position: usize) -> Result<()>;

    fn set_port_label(&mut self, direction: PortDirection, position: usize, label: &str)
    -> Result<()>;

    /// 重新计算节点高度(保留宽度)
    fn relayout(&mut self) -> Result<()>;

    /// 通知画布重绘
    fn mark_dirty(&self) -> Result<()>;
}
