//! ComfyUI 的 ControlNet / LoRA 堆栈节点扩展
//!
//! 核心逻辑与宿主无关, 可在本地直接测试; 浏览器端的绑定位于 `web` 模块, 仅在 wasm32 下编译。

pub mod catalog;
pub mod config;
pub mod error;
pub mod host;
pub mod key;
pub mod labels;
pub mod persist;
pub mod schema;
pub mod stack;
pub mod store;
pub mod sync;

#[cfg(target_arch = "wasm32")]
mod web;

pub use catalog::{
    CatalogClient, CatalogSource, DeferredSpawner, HttpCatalogClient, LocalTask, OptionResolver,
    Spawner,
};
pub use config::{DEFAULT_FORGE_URL, ForgeConfig};
pub use error::{Error, Result};
pub use host::{
    FieldValue, MemoryNode, MemoryWidget, NodeHost, PortDirection, PortInfo, WidgetInfo,
    WidgetKind, WidgetOptions, WidgetSpec,
};
pub use key::{SlotId, SlotKey};
pub use persist::{ConfigureOutcome, PersistedSlot};
pub use schema::{CLEAR_ACTION, FieldKind, FieldSpec, REMOVE_PARAM, SlotSchema};
pub use stack::{SharedStack, StackNode};
pub use store::{Slot, SlotStore};
pub use sync::{GraphHost, GraphNode, SyncAgent, SyncReport};
