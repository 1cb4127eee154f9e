//! 后端地址同步
//!
//! 周期性地将源节点(ForgeSampler)的 `forge_url` 写入所有堆栈节点。
//! 用户手动修改过的地址不会被覆盖: 只有未设置、等于节点默认值或等于哨兵默认值时才会写入。

use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;

use crate::{config::ForgeConfig, error::Result, host::FieldValue, schema::SlotSchema};

static SYNC_STARTED: AtomicBool = AtomicBool::new(false);

/// 画布中的节点
pub trait GraphNode {
    fn node_type(&self) -> Option<String>;

    /// 部件当前值, 部件不存在时返回 None
    fn widget_value(&self, name: &str) -> Option<FieldValue>;

    /// 部件声明的默认值
    fn widget_default(&self, name: &str) -> Option<FieldValue>;

    /// 写入部件值, 部件不存在时返回 false
    fn set_widget_value(&self, name: &str, value: FieldValue) -> Result<bool>;

    /// 刷新节点的显示标签
    fn refresh_styles(&self) -> Result<()>;
}

/// 画布
pub trait GraphHost {
    type Node: GraphNode;

    /// 当前画布中的所有节点
    fn nodes(&self) -> Vec<Self::Node>;

    fn mark_dirty(&self);
}

/// 单次同步的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub updated: usize,
    pub failed: usize,
}

pub struct SyncAgent {
    config: ForgeConfig,
    targets: Vec<&'static str>,
}

impl SyncAgent {
    pub fn new(config: ForgeConfig) -> Self {
        Self {
            config,
            targets: SlotSchema::all().iter().map(|s| s.node_type).collect(),
        }
    }

    /// 标记同步任务已启动, 每个进程只有第一次调用返回 true
    pub fn init() -> bool {
        SYNC_STARTED
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn is_initialized() -> bool {
        SYNC_STARTED.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    /// 执行一次同步
    pub fn tick<G: GraphHost>(&self, graph: &G) -> SyncReport {
        let mut report = SyncReport::default();

        let nodes = graph.nodes();
        let Some(url) = self.source_url(&nodes) else {
            return report;
        };

        let field = &self.config.shared_field;
        for node in &nodes {
            let is_target = node
                .node_type()
                .is_some_and(|t| self.targets.iter().any(|target| *target == t));
            if !is_target {
                continue;
            }

            match self.sync_node(node, field, &url) {
                Ok(true) => report.updated += 1,
                Ok(false) => {}
                Err(e) => {
                    debug!("sync {field} failed, {e}");
                    report.failed += 1;
                }
            }
        }

        if report.updated > 0 {
            graph.mark_dirty();
        }
        report
    }

    /// 是否允许覆盖目标节点的当前值
    pub fn should_overwrite(&self, current: Option<&FieldValue>, default: Option<&FieldValue>) -> bool {
        let Some(current) = current else {
            return true;
        };
        if current.is_unset() {
            return true;
        }
        if default.is_some_and(|d| d == current) {
            return true;
        }
        current.as_str() == Some(self.config.default_url.as_str())
    }

    /// 源节点的地址: 当前值, 未设置时取其默认值
    fn source_url<N: GraphNode>(&self, nodes: &[N]) -> Option<String> {
        let field = &self.config.shared_field;
        let source = nodes
            .iter()
            .find(|n| n.node_type().as_deref() == Some(self.config.source_node_type.as_str()))?;

        let value = source
            .widget_value(field)
            .filter(|v| !v.is_unset())
            .or_else(|| source.widget_default(field))?;
        match value {
            FieldValue::Text(url) if !url.is_empty() => Some(url),
            _ => None,
        }
    }

    fn sync_node<N: GraphNode>(&self, node: &N, field: &str, url: &str) -> Result<bool> {
        let current = node.widget_value(field);
        if current.as_ref().and_then(FieldValue::as_str) == Some(url) {
            return Ok(false);
        }

        let default = node.widget_default(field);
        if !self.should_overwrite(current.as_ref(), default.as_ref()) {
            return Ok(false);
        }

        if !node.set_widget_value(field, FieldValue::text(url))? {
            return Ok(false);
        }
        node.refresh_styles()?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_overwrite() {
        let agent = SyncAgent::new(ForgeConfig::default());
        let custom = FieldValue::text("http://10.0.0.5:7860");

        assert!(agent.should_overwrite(None, None));
        assert!(agent.should_overwrite(Some(&FieldValue::Null), None));
        assert!(agent.should_overwrite(Some(&FieldValue::text("")), None));
        assert!(agent.should_overwrite(Some(&FieldValue::text("http://127.0.0.1:7860")), None));
        assert!(agent.should_overwrite(Some(&custom), Some(&custom)));
        assert!(!agent.should_overwrite(Some(&custom), None));
        assert!(!agent.should_overwrite(
            Some(&custom),
            Some(&FieldValue::text("http://127.0.0.1:7860"))
        ));
    }

    #[test]
    fn test_targets() {
        let agent = SyncAgent::new(ForgeConfig::default());
        assert_eq!(agent.targets, vec!["ForgeControlNetStack", "ForgeLoraStack"]);
    }
}
