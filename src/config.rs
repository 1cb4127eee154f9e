//! 扩展配置
//!
//! 所有字段均有默认值, 覆盖项以 json 形式提供, 缺失的字段取默认值, 未知字段忽略。

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// 后端地址的哨兵默认值
pub const DEFAULT_FORGE_URL: &str = "http://127.0.0.1:7860";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    /// 后端地址默认值, 同时也是同步时的哨兵值
    pub default_url: String,
    /// 共享配置字段名
    pub shared_field: String,
    /// 提供共享配置的源节点类型
    pub source_node_type: String,
    /// 同步间隔(毫秒)
    pub sync_interval_ms: u32,
    /// 清空时保留的固定字段
    pub fixed_fields: Vec<String>,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            default_url: DEFAULT_FORGE_URL.to_string(),
            shared_field: "forge_url".to_string(),
            source_node_type: "ForgeSampler".to_string(),
            sync_interval_ms: 1200,
            fixed_fields: vec!["enabled".to_string(), "forge_url".to_string()],
        }
    }
}

impl ForgeConfig {
    /// 从 json 字符串解析配置覆盖项
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: ForgeConfig = serde_json::from_str(raw)?;
        if config.sync_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "sync_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(config)
    }

    /// 是否为清空时需要保留的固定字段
    pub fn is_fixed(&self, name: &str) -> bool {
        self.fixed_fields.iter().any(|f| f == name)
    }
}
