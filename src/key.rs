//! 卡槽字段的复合键
//!
//! 宿主部件名采用 `<domain>_<index>_<param>` 的扁平格式, 例如 `cn_3_threshold_a`。
//! 内部统一使用 [`SlotKey`] 寻址, 扁平字符串只在与宿主交互时出现。

use std::fmt;

/// 单个卡槽的标识, 例如 `cn_3`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId {
    pub domain: &'static str,
    pub index: u32,
}

impl SlotId {
    pub fn new(domain: &'static str, index: u32) -> Self {
        Self { domain, index }
    }

    /// 卡槽下的某个字段
    pub fn key(&self, param: &str) -> SlotKey {
        SlotKey::new(self.domain, self.index, param)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.domain, self.index)
    }
}

/// 卡槽字段的复合键
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    pub domain: &'static str,
    pub index: u32,
    pub param: String,
}

impl SlotKey {
    pub fn new(domain: &'static str, index: u32, param: &str) -> Self {
        Self {
            domain,
            index,
            param: param.to_string(),
        }
    }

    /// 解析宿主部件名
    ///
    /// 只接受 `<domain>_<正整数>_<非空参数名>`, 其余返回 None
    pub fn parse(domain: &'static str, name: &str) -> Option<Self> {
        let rest = name.strip_prefix(domain)?.strip_prefix('_')?;
        let (index, param) = rest.split_once('_')?;
        if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) || param.is_empty() {
            return None;
        }

        let index: u32 = index.parse().ok()?;
        if index == 0 {
            return None;
        }

        Some(Self::new(domain, index, param))
    }

    pub fn slot(&self) -> SlotId {
        SlotId::new(self.domain, self.index)
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.domain, self.index, self.param)
    }
}
