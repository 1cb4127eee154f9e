//! 部件/卡槽的显示标签
//!
//! 纯函数, 只影响 label, 不影响部件名与取值。

use crate::{key::SlotKey, schema::SlotSchema};

/// `threshold_a` -> `Threshold A`
pub fn title_case(param: &str) -> String {
    param
        .split('_')
        .filter(|p| !p.is_empty())
        .map(|p| {
            let mut chars = p.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn widget_label(schema: &SlotSchema, key: &SlotKey, is_button: bool) -> String {
    let style = schema.label;
    match (is_button, style.numbered) {
        (true, true) => format!("❌ Remove {} {}", style.short, key.index),
        (true, false) => format!("❌ Remove {}", style.short),
        (false, true) => format!("{} {} {}", style.short, key.index, title_case(&key.param)),
        (false, false) => title_case(&key.param),
    }
}

pub fn port_label(schema: &SlotSchema, key: &SlotKey) -> String {
    widget_label(schema, key, false)
}
