//! Bindings to the extension APIs the worker uses.

use js_sys::Reflect;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
    /// `runtime.Port`, for both the native host and the popup.
    #[derive(Debug, Clone)]
    pub type Port;

    #[wasm_bindgen(method, catch, js_name = postMessage)]
    pub fn post_message(this: &Port, message: &JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(method, getter, js_name = onMessage)]
    pub fn on_message(this: &Port) -> PortEvent;

    #[wasm_bindgen(method, getter, js_name = onDisconnect)]
    pub fn on_disconnect(this: &Port) -> PortEvent;

    /// Firefox reports the disconnect reason here instead of `lastError`.
    #[wasm_bindgen(method, getter)]
    pub fn error(this: &Port) -> JsValue;

    pub type PortEvent;

    #[wasm_bindgen(method, js_name = addListener)]
    pub fn add_listener(this: &PortEvent, callback: &JsValue);

    #[wasm_bindgen(js_namespace = ["chrome", "runtime"], js_name = connectNative)]
    pub fn runtime_connect_native(application: &str) -> Port;

    #[wasm_bindgen(js_namespace = ["chrome", "runtime", "onConnect"], js_name = addListener)]
    pub fn runtime_on_connect_add_listener(cb: &Closure<dyn FnMut(Port)>);

    #[wasm_bindgen(catch, js_namespace = ["chrome", "tabs"], js_name = executeScript)]
    pub fn tabs_execute_script(details: &JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "browserAction"], js_name = setBadgeText)]
    pub fn action_set_badge_text(details: &JsValue);

    #[wasm_bindgen(js_namespace = ["chrome", "browserAction"], js_name = setBadgeBackgroundColor)]
    pub fn action_set_badge_background_color(details: &JsValue);

    #[wasm_bindgen(js_namespace = ["chrome", "browserAction"], js_name = setTitle)]
    pub fn action_set_title(details: &JsValue);

    #[wasm_bindgen(js_namespace = ["chrome", "storage", "local"], js_name = get)]
    pub fn storage_local_get(keys: &JsValue) -> js_sys::Promise;

    #[wasm_bindgen(js_namespace = ["chrome", "storage", "local"], js_name = set)]
    pub fn storage_local_set(items: &JsValue) -> js_sys::Promise;
}

/// Message of `chrome.runtime.lastError`, if one is set.
pub fn runtime_last_error() -> Option<String> {
    let chrome = Reflect::get(&js_sys::global(), &JsValue::from_str("chrome")).ok()?;
    let runtime = Reflect::get(&chrome, &JsValue::from_str("runtime")).ok()?;
    let error = Reflect::get(&runtime, &JsValue::from_str("lastError")).ok()?;
    error_message(error)
}

/// Reason a port disconnected, from `lastError` or `port.error`.
pub fn disconnect_reason(port: &Port) -> Option<String> {
    runtime_last_error().or_else(|| error_message(port.error()))
}

fn error_message(error: JsValue) -> Option<String> {
    if error.is_undefined() || error.is_null() {
        return None;
    }
    let message = Reflect::get(&error, &JsValue::from_str("message"))
        .ok()
        .and_then(|m| m.as_string());
    Some(message.unwrap_or_else(|| stringify_js_error(error)))
}

pub fn stringify_js_error(err: JsValue) -> String {
    err.as_string()
        .or_else(|| js_sys::JSON::stringify(&err).ok()?.as_string())
        .unwrap_or_else(|| format!("{:?}", err))
}
