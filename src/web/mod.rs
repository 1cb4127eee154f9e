//! 浏览器端入口
//!
//! 注册 ComfyUI 扩展, 为堆栈节点类型挂载原型钩子, 并启动后端地址同步任务。

mod graph;
mod logger;
mod node_host;
mod registry;

use std::rc::Rc;

use comfy_app::{ComfyApp, Extension};
use log::{LevelFilter, debug, info, warn};
use wasm_bindgen::{JsCast, JsValue, prelude::*};

use crate::{
    catalog::{HttpCatalogClient, LocalTask, OptionResolver, Spawner},
    config::ForgeConfig,
    schema::SlotSchema,
    sync::SyncAgent,
};

const EXTENSION_NAME: &str = "Forge.Stack.UI";
/// localStorage 中的配置覆盖项
const CONFIG_STORAGE_KEY: &str = "Forge.Stack.Config";

/// 扩展运行时共享的状态
pub(crate) struct Runtime {
    pub(crate) config: ForgeConfig,
    pub(crate) resolver: OptionResolver,
    pub(crate) app: ComfyApp,
}

/// 在浏览器微任务中执行
struct LocalSpawner;

impl Spawner for LocalSpawner {
    fn spawn(&self, task: LocalTask) {
        wasm_bindgen_futures::spawn_local(task);
    }
}

#[wasm_bindgen(start)]
pub fn run() -> Result<(), JsValue> {
    logger::init(LevelFilter::Info);

    let app = ComfyApp::new()?;
    let runtime = Rc::new(Runtime {
        config: load_config(),
        resolver: OptionResolver::new(Rc::new(HttpCatalogClient::new()), Rc::new(LocalSpawner)),
        app: app.clone(),
    });

    let mut extension = Extension::new(EXTENSION_NAME);
    extension.before_register_node_def(move |node_type, node_data, _app| {
        let name = node_data.name()?;
        let Some(schema) = SlotSchema::for_node_type(&name) else {
            return Ok(JsValue::undefined());
        };

        registry::register_stack(&node_type, schema, runtime.clone())?;
        start_sync(&runtime)?;

        info!("{name} hooks registered");
        Ok(JsValue::undefined())
    })?;

    app.register_extension(&extension)?;
    Ok(())
}

fn load_config() -> ForgeConfig {
    let raw = web_sys::window()
        .and_then(|window| window.local_storage().ok().flatten())
        .and_then(|storage| storage.get_item(CONFIG_STORAGE_KEY).ok().flatten());

    let Some(raw) = raw else {
        return ForgeConfig::default();
    };
    ForgeConfig::from_json(&raw).unwrap_or_else(|e| {
        warn!("ignore {CONFIG_STORAGE_KEY}, {e}");
        ForgeConfig::default()
    })
}

/// 启动后端地址同步, 每个页面只启动一次
fn start_sync(runtime: &Runtime) -> Result<(), JsValue> {
    if !SyncAgent::init() {
        return Ok(());
    }

    let interval = i32::try_from(runtime.config.sync_interval_ms).unwrap_or(i32::MAX);
    let agent = SyncAgent::new(runtime.config.clone());
    let graph = graph::ComfyGraph::new(runtime.app.clone());

    let tick = Closure::wrap(Box::new(move || {
        let report = agent.tick(&graph);
        if report.updated > 0 || report.failed > 0 {
            debug!("forge url sync, {report:?}");
        }
    }) as Box<dyn FnMut()>);

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("window not available"))?;
    window.set_interval_with_callback_and_timeout_and_arguments_0(
        tick.as_ref().unchecked_ref(),
        interval,
    )?;

    // 定时任务与页面同生命周期
    tick.forget();

    info!("forge url sync started, every {interval}ms");
    Ok(())
}
