//! 卡槽模板
//!
//! 每种堆栈节点对应一个不可变的 [`SlotSchema`], 描述每个卡槽的字段顺序、类型、默认值、
//! 约束以及字段之间的显示条件。

use std::fmt;

use lazy_static::lazy_static;

use crate::{
    catalog::CatalogSource,
    host::{FieldValue, PortDirection, WidgetKind, WidgetOptions},
};

/// "清空" 按钮名, 两种堆栈共用
pub const CLEAR_ACTION: &str = "🗑️ Clear All";
/// 每个卡槽的 "移除" 按钮参数名
pub const REMOVE_PARAM: &str = "remove";

/// 字段类型
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// 下拉框, `values` 为默认可选值
    Choice { values: &'static [&'static str] },
    /// 数值输入
    Number {
        min: f64,
        max: f64,
        step: f64,
        precision: Option<u32>,
    },
    /// 图像等连线卡槽
    Port {
        direction: PortDirection,
        data_type: &'static str,
    },
}

/// 显示条件: 同一卡槽内 `parent` 字段的值满足 `test` 时显示
#[derive(Clone, Copy)]
pub struct VisibleWhen {
    pub parent: &'static str,
    pub test: fn(&FieldValue) -> bool,
}

impl fmt::Debug for VisibleWhen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisibleWhen")
            .field("parent", &self.parent)
            .finish_non_exhaustive()
    }
}

impl VisibleWhen {
    pub fn is_visible(&self, parent_value: &FieldValue) -> bool {
        (self.test)(parent_value)
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub key: &'static str,
    pub kind: FieldKind,
    pub default: FieldValue,
    pub catalog: Option<CatalogSource>,
    pub visible_when: Option<VisibleWhen>,
}

impl FieldSpec {
    fn choice(key: &'static str, values: &'static [&'static str], default: &str) -> Self {
        Self {
            key,
            kind: FieldKind::Choice { values },
            default: FieldValue::text(default),
            catalog: None,
            visible_when: None,
        }
    }

    fn number(key: &'static str, default: f64, min: f64, max: f64, step: f64) -> Self {
        Self {
            key,
            kind: FieldKind::Number {
                min,
                max,
                step,
                precision: None,
            },
            default: FieldValue::Number(default),
            catalog: None,
            visible_when: None,
        }
    }

    fn port(key: &'static str, direction: PortDirection, data_type: &'static str) -> Self {
        Self {
            key,
            kind: FieldKind::Port {
                direction,
                data_type,
            },
            default: FieldValue::Null,
            catalog: None,
            visible_when: None,
        }
    }

    fn precision(mut self, digits: u32) -> Self {
        if let FieldKind::Number { precision, .. } = &mut self.kind {
            *precision = Some(digits);
        }
        self
    }

    fn catalog(mut self, source: CatalogSource) -> Self {
        self.catalog = Some(source);
        self
    }

    fn visible_when(mut self, parent: &'static str, test: fn(&FieldValue) -> bool) -> Self {
        self.visible_when = Some(VisibleWhen { parent, test });
        self
    }

    pub fn is_port(&self) -> bool {
        matches!(self.kind, FieldKind::Port { .. })
    }

    /// 对应的宿主部件类型, 卡槽字段返回 None
    pub fn widget_kind(&self) -> Option<WidgetKind> {
        match self.kind {
            FieldKind::Choice { .. } => Some(WidgetKind::Combo),
            FieldKind::Number { .. } => Some(WidgetKind::Number),
            FieldKind::Port { .. } => None,
        }
    }

    pub fn options(&self) -> WidgetOptions {
        match &self.kind {
            FieldKind::Choice { values } => WidgetOptions {
                values: Some(values.iter().map(|v| v.to_string()).collect()),
                ..Default::default()
            },
            FieldKind::Number {
                min,
                max,
                step,
                precision,
            } => WidgetOptions {
                min: Some(*min),
                max: Some(*max),
                step: Some(*step),
                precision: *precision,
                values: None,
            },
            FieldKind::Port { .. } => WidgetOptions::default(),
        }
    }

    /// "未选择" 哨兵值, 即下拉框的默认值
    pub fn sentinel(&self) -> String {
        match &self.default {
            FieldValue::Text(v) => v.clone(),
            FieldValue::Number(v) => v.to_string(),
            FieldValue::Bool(v) => v.to_string(),
            FieldValue::Null => String::new(),
        }
    }

    /// 将持久化的原始值转换为字段值, 缺失或类型不符时取默认值
    pub fn coerce(&self, raw: Option<&serde_json::Value>) -> FieldValue {
        match (&self.kind, raw) {
            (FieldKind::Choice { .. }, Some(serde_json::Value::String(v))) if !v.is_empty() => {
                FieldValue::Text(v.clone())
            }
            (FieldKind::Number { .. }, Some(v)) => v
                .as_f64()
                .map(FieldValue::Number)
                .unwrap_or_else(|| self.default.clone()),
            _ => self.default.clone(),
        }
    }
}

/// 标签风格
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelStyle {
    /// 标签前缀, 例如 "CN"
    pub short: &'static str,
    /// 标签中是否带卡槽序号
    pub numbered: bool,
}

/// 卡槽模板
#[derive(Debug, Clone)]
pub struct SlotSchema {
    /// 后端节点类型名
    pub node_type: &'static str,
    /// 部件名前缀
    pub domain: &'static str,
    /// "添加" 按钮名
    pub add_action: &'static str,
    pub fields: Vec<FieldSpec>,
    pub label: LabelStyle,
}

const CONTROL_MODES: &[&str] = &[
    "Balanced",
    "My prompt is more important",
    "ControlNet is more important",
];
const RESIZE_MODES: &[&str] = &["Just Resize", "Crop and Resize", "Resize and Fill"];

fn is_canny(value: &FieldValue) -> bool {
    value.as_str() == Some("canny")
}

lazy_static! {
    static ref CONTROLNET: SlotSchema = SlotSchema {
        node_type: "ForgeControlNetStack",
        domain: "cn",
        add_action: "➕ Add ControlNet",
        fields: vec![
            FieldSpec::port("image", PortDirection::Input, "IMAGE"),
            FieldSpec::port("preview", PortDirection::Output, "IMAGE"),
            FieldSpec::choice("model", &["None"], "None").catalog(CatalogSource::ControlNetModels),
            FieldSpec::choice("preprocessor", &["none"], "none")
                .catalog(CatalogSource::ControlNetModules),
            FieldSpec::number("weight", 1.0, 0.0, 2.0, 0.05).precision(2),
            FieldSpec::number("start", 0.0, 0.0, 1.0, 0.01).precision(2),
            FieldSpec::number("end", 1.0, 0.0, 1.0, 0.01).precision(2),
            FieldSpec::number("resolution", 512.0, 64.0, 2048.0, 64.0).precision(0),
            FieldSpec::number("threshold_a", 100.0, 0.0, 255.0, 1.0)
                .visible_when("preprocessor", is_canny),
            FieldSpec::number("threshold_b", 200.0, 0.0, 255.0, 1.0)
                .visible_when("preprocessor", is_canny),
            FieldSpec::choice("control_mode", CONTROL_MODES, "Balanced"),
            FieldSpec::choice("resize_mode", RESIZE_MODES, "Crop and Resize"),
        ],
        label: LabelStyle {
            short: "CN",
            numbered: true,
        },
    };
    static ref LORA: SlotSchema = SlotSchema {
        node_type: "ForgeLoraStack",
        domain: "lora",
        add_action: "➕ Add LoRA",
        fields: vec![
            FieldSpec::choice("name", &["None"], "None").catalog(CatalogSource::Loras),
            FieldSpec::number("strength", 1.0, -10.0, 10.0, 0.05).precision(2),
        ],
        label: LabelStyle {
            short: "LoRA",
            numbered: false,
        },
    };
}

impl SlotSchema {
    pub fn controlnet() -> &'static SlotSchema {
        &CONTROLNET
    }

    pub fn lora() -> &'static SlotSchema {
        &LORA
    }

    /// 所有已知的堆栈模板
    pub fn all() -> [&'static SlotSchema; 2] {
        [Self::controlnet(), Self::lora()]
    }

    pub fn for_node_type(node_type: &str) -> Option<&'static SlotSchema> {
        Self::all().into_iter().find(|s| s.node_type == node_type)
    }

    pub fn field(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// 以部件形式出现的字段(不含卡槽)
    pub fn widget_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| !f.is_port())
    }

    /// 指定方向的连线卡槽字段
    pub fn port_field(&self, direction: PortDirection) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| {
            matches!(f.kind, FieldKind::Port { direction: d, .. } if d == direction)
        })
    }

    pub fn has_port(&self) -> bool {
        self.fields.iter().any(FieldSpec::is_port)
    }

    /// 显示条件依赖于 `parent` 的字段
    pub fn dependents<'a>(&'a self, parent: &'a str) -> impl Iterator<Item = &'a FieldSpec> + 'a {
        self.fields
            .iter()
            .filter(move |f| f.visible_when.is_some_and(|v| v.parent == parent))
    }

    /// 是否有其他字段依赖于该字段的值
    pub fn is_parent(&self, key: &str) -> bool {
        self.dependents(key).next().is_some()
    }

    /// 持久化时的字段名, 例如 `cn_slots`
    pub fn persist_key(&self) -> String {
        format!("{}_slots", self.domain)
    }

    pub fn is_action(&self, name: &str) -> bool {
        name == self.add_action || name == CLEAR_ACTION
    }
}
