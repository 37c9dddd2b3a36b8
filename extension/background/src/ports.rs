//! Channel implementations backed by extension ports and `tabs.executeScript`.

use js_sys::{Object, Reflect};
use serde::Serialize;
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use websphinx::protocol::{BackendRequest, Injection, UiReply};
use websphinx::{BackendChannel, ChannelError, InjectionSink, UiChannel};

use crate::chrome::{stringify_js_error, tabs_execute_script, Port};

/// Port returned by `runtime.connectNative`.
pub struct NativePort {
    port: Port,
}

impl NativePort {
    pub fn new(port: Port) -> Self {
        Self { port }
    }
}

impl BackendChannel for NativePort {
    fn post(&mut self, request: &BackendRequest) -> Result<(), ChannelError> {
        post_json(&self.port, "native host", request)
    }
}

/// Most recently connected popup / content script port.
#[derive(Default)]
pub struct PopupPort {
    port: Option<Port>,
}

impl PopupPort {
    pub fn attach(&mut self, port: Port) {
        self.port = Some(port);
    }

    /// Forgets `port` if it is the attached one.
    pub fn detach(&mut self, port: &Port) {
        let attached = self
            .port
            .as_ref()
            .is_some_and(|current| AsRef::<JsValue>::as_ref(current) == AsRef::<JsValue>::as_ref(port));
        if attached {
            self.port = None;
        }
    }
}

impl UiChannel for PopupPort {
    fn reply(&mut self, reply: &UiReply) -> Result<(), ChannelError> {
        let port = self.port.as_ref().ok_or(ChannelError::Disconnected("popup"))?;
        post_json(port, "popup", reply)
    }
}

/// Runs `document.websphinx.*` calls in the active tab.
#[derive(Default)]
pub struct TabSink;

impl InjectionSink for TabSink {
    fn execute(&mut self, injection: &Injection) -> Result<(), ChannelError> {
        let details = Object::new();
        Reflect::set(
            &details,
            &JsValue::from_str("code"),
            &JsValue::from_str(&injection.to_script()?),
        )
        .map_err(|err| rejected("active tab", err))?;

        debug!(target = "websphinx", function = injection.function(), "injecting into active tab");
        let pending = tabs_execute_script(&details).map_err(|err| rejected("active tab", err))?;

        // Firefox returns a promise; Chrome's callback form returns undefined.
        if let Ok(promise) = pending.dyn_into::<js_sys::Promise>() {
            wasm_bindgen_futures::spawn_local(async move {
                if let Err(err) = JsFuture::from(promise).await {
                    warn!(
                        target = "websphinx",
                        error = %stringify_js_error(err),
                        "content script injection failed"
                    );
                }
            });
        }
        Ok(())
    }
}

fn post_json<T: Serialize>(port: &Port, channel: &'static str, value: &T) -> Result<(), ChannelError> {
    let message = value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|err| ChannelError::Rejected {
            channel,
            message: err.to_string(),
        })?;
    port.post_message(&message).map_err(|err| rejected(channel, err))
}

fn rejected(channel: &'static str, err: JsValue) -> ChannelError {
    ChannelError::Rejected {
        channel,
        message: stringify_js_error(err),
    }
}
