//! 错误处理

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serde json error, {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("http error, {0}")]
    Http(#[from] reqwest::Error),
    #[error("http status error, {0}")]
    HttpStatus(u16),

    #[error("invalid catalog payload, {0}")]
    InvalidCatalog(String),
    #[error("invalid persisted state, {0}")]
    InvalidState(String),
    #[error("invalid config, {0}")]
    InvalidConfig(String),

    #[error("widget not found, {0}")]
    WidgetNotFound(String),
    #[error("index out of range, {0}")]
    IndexOutOfRange(String),
    #[error("node is busy, {0}")]
    Borrow(String),

    // 宿主 (ComfyUI / LiteGraph) 侧抛出的异常
    #[error("host error, {0}")]
    Host(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(target_arch = "wasm32")]
impl From<wasm_bindgen::JsValue> for Error {
    fn from(e: wasm_bindgen::JsValue) -> Self {
        Error::Host(format!("{e:?}"))
    }
}

#[cfg(target_arch = "wasm32")]
impl From<serde_wasm_bindgen::Error> for Error {
    fn from(e: serde_wasm_bindgen::Error) -> Self {
        Error::Host(e.to_string())
    }
}

#[cfg(target_arch = "wasm32")]
impl From<Error> for wasm_bindgen::JsValue {
    fn from(e: Error) -> Self {
        wasm_bindgen::JsValue::from_str(&e.to_string())
    }
}
