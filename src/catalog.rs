//! 下拉框可选值
//!
//! 从后端拉取 ControlNet 模型/预处理器以及 LoRA 列表。
//! 拉取在后台进行, 完成时节点或字段可能已被移除, 此时结果直接丢弃。

use std::{
    cell::RefCell,
    future::Future,
    pin::Pin,
    rc::{Rc, Weak},
};

use async_trait::async_trait;
use log::debug;
use serde_json::Value;
use strum_macros::Display;

use crate::{
    error::{Error, Result},
    host::NodeHost,
    key::SlotKey,
    stack::StackNode,
};

/// 可选值来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum CatalogSource {
    #[strum(to_string = "controlnet models")]
    ControlNetModels,
    #[strum(to_string = "controlnet modules")]
    ControlNetModules,
    #[strum(to_string = "loras")]
    Loras,
}

impl CatalogSource {
    pub fn path(&self) -> &'static str {
        match self {
            CatalogSource::ControlNetModels => "controlnet/model_list",
            CatalogSource::ControlNetModules => "controlnet/module_list",
            CatalogSource::Loras => "sdapi/v1/loras",
        }
    }

    pub fn url(&self, base: &str) -> String {
        format!("{}/{}", base.trim_end_matches('/'), self.path())
    }

    /// 从响应中提取名称列表, 空名称会被忽略
    ///
    /// - ControlNet: `{"model_list": [..]}` / `{"module_list": [..]}`
    /// - LoRA: `[{"name": ..}, ..]`
    pub fn extract(&self, payload: &Value) -> Result<Vec<String>> {
        let items = match self {
            CatalogSource::ControlNetModels => payload.get("model_list"),
            CatalogSource::ControlNetModules => payload.get("module_list"),
            CatalogSource::Loras => Some(payload),
        }
        .and_then(Value::as_array)
        .ok_or_else(|| Error::InvalidCatalog(format!("{self}: unexpected payload shape")))?;

        let names = items
            .iter()
            .filter_map(|item| match (self, item) {
                (CatalogSource::Loras, Value::Object(map)) => map.get("name")?.as_str(),
                (CatalogSource::Loras, _) => None,
                (_, Value::String(name)) => Some(name.as_str()),
                _ => None,
            })
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        Ok(names)
    }

    /// 可选值列表, 哨兵值始终位于首位
    pub fn choices(&self, sentinel: &str, payload: &Value) -> Result<Vec<String>> {
        let mut choices = vec![sentinel.to_string()];
        choices.extend(
            self.extract(payload)?
                .into_iter()
                .filter(|name| name != sentinel),
        );
        Ok(choices)
    }
}

#[async_trait(?Send)]
pub trait CatalogClient {
    /// GET 请求并解析 json
    async fn get_json(&self, url: &str) -> Result<Value>;
}

/// 基于 reqwest 的客户端
#[derive(Debug, Clone, Default)]
pub struct HttpCatalogClient {
    client: reqwest::Client,
}

impl HttpCatalogClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait(?Send)]
impl CatalogClient for HttpCatalogClient {
    async fn get_json(&self, url: &str) -> Result<Value> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus(status.as_u16()));
        }

        Ok(response.json::<Value>().await?)
    }
}

pub type LocalTask = Pin<Box<dyn Future<Output = ()>>>;

/// 后台任务执行器
pub trait Spawner {
    fn spawn(&self, task: LocalTask);
}

/// 延迟执行器, 任务在调用 [`DeferredSpawner::run_pending`] 时才执行
#[derive(Default)]
pub struct DeferredSpawner {
    tasks: RefCell<Vec<LocalTask>>,
}

impl DeferredSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// 执行所有待执行任务(包括执行过程中新提交的任务), 返回执行数量
    pub async fn run_pending(&self) -> usize {
        let mut count = 0;
        loop {
            let batch = std::mem::take(&mut *self.tasks.borrow_mut());
            if batch.is_empty() {
                break;
            }
            for task in batch {
                task.await;
                count += 1;
            }
        }
        count
    }
}

impl Spawner for DeferredSpawner {
    fn spawn(&self, task: LocalTask) {
        self.tasks.borrow_mut().push(task);
    }
}

#[derive(Clone)]
pub struct OptionResolver {
    client: Rc<dyn CatalogClient>,
    spawner: Rc<dyn Spawner>,
}

impl OptionResolver {
    pub fn new(client: Rc<dyn CatalogClient>, spawner: Rc<dyn Spawner>) -> Self {
        Self { client, spawner }
    }

    pub async fn fetch(
        &self,
        base: &str,
        source: CatalogSource,
        sentinel: &str,
    ) -> Result<Vec<String>> {
        let payload = self.client.get_json(&source.url(base)).await?;
        source.choices(sentinel, &payload)
    }

    /// 后台拉取并回填到节点的 `key` 字段
    ///
    /// 拉取失败时保留默认可选值
    pub fn request<H: NodeHost + 'static>(
        &self,
        node: Weak<RefCell<StackNode<H>>>,
        key: SlotKey,
        base: String,
        source: CatalogSource,
        sentinel: String,
    ) {
        let resolver = self.clone();
        self.spawner.spawn(Box::pin(async move {
            let choices = match resolver.fetch(&base, source, &sentinel).await {
                Ok(choices) => choices,
                Err(e) => {
                    debug!("fetch {source} for {key} failed, {e}");
                    return;
                }
            };

            let Some(shared) = node.upgrade() else {
                debug!("node dropped before {source} arrived");
                return;
            };
            let Ok(mut stack) = shared.try_borrow_mut() else {
                debug!("node busy, drop {source} for {key}");
                return;
            };
            match stack.apply_choices(&key, &choices) {
                Ok(true) => {}
                Ok(false) => debug!("{key} removed before {source} arrived"),
                Err(e) => debug!("apply {source} to {key} failed, {e}"),
            }
        }));
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_url() {
        assert_eq!(
            CatalogSource::Loras.url("http://127.0.0.1:7860/"),
            "http://127.0.0.1:7860/sdapi/v1/loras"
        );
        assert_eq!(
            CatalogSource::ControlNetModules.url("http://host:1"),
            "http://host:1/controlnet/module_list"
        );
    }

    #[test]
    fn test_controlnet_choices() -> Result<()> {
        let payload = json!({"model_list": ["control_v11p_sd15_canny", "", "None"]});
        let choices = CatalogSource::ControlNetModels.choices("None", &payload)?;
        assert_eq!(choices, vec!["None", "control_v11p_sd15_canny"]);
        Ok(())
    }

    #[test]
    fn test_lora_choices() -> Result<()> {
        let payload = json!([{"name": "detail"}, {"alias": "x"}, {"name": ""}, "bare"]);
        let choices = CatalogSource::Loras.choices("None", &payload)?;
        assert_eq!(choices, vec!["None", "detail"]);
        Ok(())
    }

    #[test]
    fn test_malformed_payload() {
        let result = CatalogSource::ControlNetModules.extract(&json!({"model_list": []}));
        assert!(matches!(result, Err(Error::InvalidCatalog(_))));
        assert!(CatalogSource::Loras.extract(&json!({"name": "x"})).is_err());
    }
}
