//! 卡槽的保存与加载
//!
//! 保存格式:
//! ```json
//! { "cn_slots": [ { "index": "1", "model": "None", "weight": 1.0 } ] }
//! ```
//! 外层对象由宿主负责, 这里只读写 `<domain>_slots` 字段。

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::{
    error::{Error, Result},
    host::NodeHost,
    stack::StackNode,
};

/// 单个卡槽的保存记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSlot {
    #[serde(serialize_with = "ser_index", deserialize_with = "de_index")]
    pub index: u32,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

fn ser_index<S: Serializer>(index: &u32, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&index.to_string())
}

/// 序号可以是字符串或数字, 必须为正整数
fn de_index<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawIndex {
        Number(u64),
        Text(String),
    }

    let index = match RawIndex::deserialize(deserializer)? {
        RawIndex::Number(v) => u32::try_from(v).ok(),
        RawIndex::Text(v) => v.trim().parse::<u32>().ok(),
    };
    match index {
        Some(v) if v > 0 => Ok(v),
        _ => Err(serde::de::Error::custom("index must be a positive integer")),
    }
}

/// 加载结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureOutcome {
    /// 没有保存记录, 节点保持不变
    Absent,
    /// 保存记录格式错误, 节点保持不变
    Rejected,
    /// 已恢复的卡槽数量
    Restored(usize),
}

impl<H: NodeHost + 'static> StackNode<H> {
    /// 当前卡槽的保存记录, 序号升序
    pub fn serialize(&self) -> Result<Vec<PersistedSlot>> {
        self.store()
            .slots()?
            .into_iter()
            .map(|slot| -> Result<PersistedSlot> {
                let fields = slot
                    .fields
                    .into_iter()
                    .map(|(param, value)| -> Result<(String, Value)> {
                        Ok((param, serde_json::to_value(value)?))
                    })
                    .collect::<Result<BTreeMap<_, _>>>()?;
                Ok(PersistedSlot {
                    index: slot.index,
                    fields,
                })
            })
            .collect()
    }

    /// 写入宿主的保存对象
    pub fn on_serialize(&self, state: &mut Map<String, Value>) -> Result<()> {
        let slots = serde_json::to_value(self.serialize()?)?;
        state.insert(self.schema().persist_key(), slots);
        Ok(())
    }

    /// 从宿主的保存对象恢复
    pub fn configure(&mut self, state: &Map<String, Value>) -> Result<ConfigureOutcome> {
        let key = self.schema().persist_key();
        self.restore(state.get(&key))
    }

    /// 从 `<domain>_slots` 的值恢复卡槽
    ///
    /// 先完整校验全部记录, 任一记录不合法时不做任何修改
    pub fn restore(&mut self, raw: Option<&Value>) -> Result<ConfigureOutcome> {
        let Some(raw) = raw else {
            return Ok(ConfigureOutcome::Absent);
        };

        let records = match parse_records(raw) {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    "{} skip restoring {}, {e}",
                    self.schema().node_type,
                    self.schema().persist_key()
                );
                return Ok(ConfigureOutcome::Rejected);
            }
        };

        self.reset_slots()?;
        for record in &records {
            self.build_slot(record.index, Some(&record.fields))?;
        }
        self.finalize()?;

        debug!(
            "{} restored {} slots",
            self.schema().node_type,
            records.len()
        );
        Ok(ConfigureOutcome::Restored(records.len()))
    }
}

fn parse_records(raw: &Value) -> Result<Vec<PersistedSlot>> {
    if !raw.is_array() {
        return Err(Error::InvalidState("slots must be a list".to_string()));
    }

    let mut records: Vec<PersistedSlot> = serde_json::from_value(raw.clone())
        .map_err(|e| Error::InvalidState(e.to_string()))?;

    let mut seen = BTreeSet::new();
    for record in &records {
        if !seen.insert(record.index) {
            return Err(Error::InvalidState(format!(
                "duplicate slot index {}",
                record.index
            )));
        }
    }

    records.sort_by_key(|r| r.index);
    Ok(records)
}
