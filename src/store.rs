//! 卡槽视图
//!
//! 不单独存储卡槽, 每次都从宿主的部件/卡槽集合按命名约定还原。

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    error::{Error, Result},
    host::{FieldValue, NodeHost, PortDirection},
    key::SlotKey,
    schema::{REMOVE_PARAM, SlotSchema},
};

/// 单个卡槽
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub index: u32,
    /// 参数名 -> 值, 不含移除按钮
    pub fields: BTreeMap<String, FieldValue>,
    pub has_port: bool,
}

pub struct SlotStore<'a, H: ?Sized> {
    host: &'a H,
    schema: &'static SlotSchema,
}

impl<'a, H: NodeHost + ?Sized> SlotStore<'a, H> {
    pub fn new(host: &'a H, schema: &'static SlotSchema) -> Self {
        Self { host, schema }
    }

    fn parse(&self, name: &str) -> Option<SlotKey> {
        SlotKey::parse(self.schema.domain, name)
    }

    /// 当前存在的卡槽序号, 部件与连线卡槽都计入
    pub fn indices(&self) -> Result<BTreeSet<u32>> {
        let mut indices: BTreeSet<u32> = self
            .host
            .widgets()?
            .iter()
            .filter_map(|w| self.parse(&w.name))
            .map(|k| k.index)
            .collect();

        for direction in [PortDirection::Input, PortDirection::Output] {
            indices.extend(
                self.host
                    .ports(direction)?
                    .iter()
                    .filter_map(|p| self.parse(&p.name))
                    .map(|k| k.index),
            );
        }
        Ok(indices)
    }

    /// 下一个卡槽序号: 现存最大序号 + 1, 不复用已删除的序号
    pub fn next_index(&self) -> Result<u32> {
        match self.indices()?.last() {
            Some(max) => max
                .checked_add(1)
                .ok_or_else(|| Error::IndexOutOfRange(format!("slot index overflow after {max}"))),
            None => Ok(1),
        }
    }

    /// 字段对应的部件位置
    pub fn position(&self, key: &SlotKey) -> Result<Option<usize>> {
        let name = key.to_string();
        Ok(self.host.widgets()?.iter().position(|w| w.name == name))
    }

    /// 按序号分组的全部卡槽, 序号升序
    pub fn slots(&self) -> Result<Vec<Slot>> {
        let mut slots: BTreeMap<u32, Slot> = BTreeMap::new();

        for widget in self.host.widgets()? {
            let Some(key) = self.parse(&widget.name) else {
                continue;
            };
            let slot = slots.entry(key.index).or_insert_with(|| Slot {
                index: key.index,
                fields: BTreeMap::new(),
                has_port: false,
            });
            if key.param != REMOVE_PARAM {
                slot.fields.insert(key.param, widget.value);
            }
        }

        for direction in [PortDirection::Input, PortDirection::Output] {
            for port in self.host.ports(direction)? {
                let Some(key) = self.parse(&port.name) else {
                    continue;
                };
                slots
                    .entry(key.index)
                    .or_insert_with(|| Slot {
                        index: key.index,
                        fields: BTreeMap::new(),
                        has_port: false,
                    })
                    .has_port = true;
            }
        }

        Ok(slots.into_values().collect())
    }
}
