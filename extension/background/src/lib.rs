mod chrome;
mod ports;

use std::cell::RefCell;

use js_sys::{Array, Object, Reflect};
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;
use tracing_web::MakeWebConsoleWriter;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use websphinx::{BackendEvent, Channels, Outbound, RouterConfig, SessionRouter};

use crate::chrome::{
    action_set_badge_background_color, action_set_badge_text, action_set_title,
    disconnect_reason, runtime_connect_native, runtime_last_error,
    runtime_on_connect_add_listener, storage_local_get, storage_local_set, stringify_js_error,
    Port,
};
use crate::ports::{NativePort, PopupPort, TabSink};

const STATUS_KEY: &str = "websphinx_status";

thread_local! {
    static WORKER: RefCell<Option<Worker>> = const { RefCell::new(None) };
}

/// Router plus the ports it talks to. Callbacks borrow it one event at a time.
struct Worker {
    router: SessionRouter,
    channels: Channels<NativePort, PopupPort, TabSink>,
}

impl Worker {
    fn on_ui_message(&mut self, message: serde_json::Value) {
        let outbound = self.router.handle_ui_message(message);
        self.deliver(outbound);
    }

    fn on_backend_event(&mut self, event: BackendEvent) {
        let outbound = self.router.handle_backend_event(event);
        self.deliver(outbound);
    }

    fn deliver(&mut self, outbound: Option<Outbound>) {
        let Some(outbound) = outbound else {
            return;
        };
        if let Err(err) = self.router.dispatch(outbound, &mut self.channels) {
            warn!(target = "websphinx", error = %err, "failed to deliver message");
        }
    }
}

fn with_worker(f: impl FnOnce(&mut Worker)) {
    WORKER.with(|worker| match worker.borrow_mut().as_mut() {
        Some(worker) => f(worker),
        None => warn!(target = "websphinx", "event received before worker started"),
    });
}

#[wasm_bindgen(start)]
pub async fn start() {
    console_error_panic_hook::set_once();
    set_status(HostStatus::Connecting, "websphinx (connecting)");

    let stored = read_stored_config().await;
    let config = stored.clone().unwrap_or_default();
    init_logging(&config.log_filter);
    if let Err(err) = stored {
        warn!(
            target = "websphinx",
            error = %stringify_js_error(err),
            "ignoring stored config, using defaults"
        );
    }

    if let Err(err) = init(config) {
        let message = stringify_js_error(err);
        set_status(HostStatus::Failed, &message);
        error!(target = "websphinx", error = %message, "init failed");
    }
}

fn init_logging(filter: &str) {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let console = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .without_time()
        .with_target(true)
        .with_writer(MakeWebConsoleWriter::new());

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .try_init();
}

async fn read_stored_config() -> Result<RouterConfig, JsValue> {
    let key = JsValue::from_str(RouterConfig::STORAGE_KEY);
    let items = JsFuture::from(storage_local_get(&key)).await?;
    let stored = Reflect::get(&items, &key)?;
    if stored.is_undefined() {
        return Ok(RouterConfig::default());
    }
    let value: serde_json::Value = serde_wasm_bindgen::from_value(stored)?;
    RouterConfig::from_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn init(config: RouterConfig) -> Result<(), JsValue> {
    let native = runtime_connect_native(&config.native_app);
    info!(target = "websphinx", app = %config.native_app, "connected to native host");

    // Host responses
    {
        let on_message = Closure::<dyn FnMut(JsValue)>::new(|message: JsValue| {
            let event = match runtime_last_error() {
                Some(reason) => BackendEvent::Error(reason),
                None => match serde_wasm_bindgen::from_value(message) {
                    Ok(value) => BackendEvent::Message(value),
                    Err(err) => {
                        warn!(target = "websphinx", error = %err, "undecodable native host message");
                        return;
                    }
                },
            };
            with_worker(|worker| worker.on_backend_event(event));
        });
        native.on_message().add_listener(on_message.as_ref());
        on_message.forget();
    }

    // Host exit
    {
        let on_disconnect = Closure::<dyn FnMut(Port)>::new(|port: Port| {
            let reason = disconnect_reason(&port)
                .unwrap_or_else(|| "native host disconnected".to_string());
            set_status(HostStatus::Disconnected, &reason);
            with_worker(|worker| worker.on_backend_event(BackendEvent::Disconnected(reason)));
        });
        native.on_disconnect().add_listener(on_disconnect.as_ref());
        on_disconnect.forget();
    }

    let worker = Worker {
        router: SessionRouter::new(config),
        channels: Channels::new(NativePort::new(native), PopupPort::default(), TabSink),
    };
    WORKER.with(|w| *w.borrow_mut() = Some(worker));

    // Popup / content script connections
    {
        let on_connect = Closure::<dyn FnMut(Port)>::new(|port: Port| {
            with_worker(|worker| worker.channels.ui.attach(port.clone()));

            let on_message = Closure::<dyn FnMut(JsValue)>::new(|message: JsValue| {
                match serde_wasm_bindgen::from_value(message) {
                    Ok(value) => with_worker(|worker| worker.on_ui_message(value)),
                    Err(err) => {
                        warn!(target = "websphinx", error = %err, "undecodable popup message")
                    }
                }
            });
            port.on_message().add_listener(on_message.as_ref());
            on_message.forget();

            let on_disconnect = Closure::<dyn FnMut(Port)>::new(|port: Port| {
                with_worker(|worker| worker.channels.ui.detach(&port));
            });
            port.on_disconnect().add_listener(on_disconnect.as_ref());
            on_disconnect.forget();
        });
        runtime_on_connect_add_listener(&on_connect);
        on_connect.forget();
    }

    set_status(HostStatus::Ready, "websphinx ready");
    Ok(())
}

/// Native host state shown on the toolbar badge and stored for the popup.
#[derive(Debug, Clone, Copy)]
enum HostStatus {
    Connecting,
    Ready,
    Disconnected,
    Failed,
}

impl HostStatus {
    fn as_str(self) -> &'static str {
        match self {
            HostStatus::Connecting => "connecting",
            HostStatus::Ready => "connected",
            HostStatus::Disconnected => "disconnected",
            HostStatus::Failed => "error",
        }
    }

    /// Badge text and RGBA background.
    fn badge(self) -> (&'static str, [u8; 4]) {
        match self {
            HostStatus::Connecting => ("...", [160, 160, 160, 255]),
            HostStatus::Ready => ("", [30, 170, 80, 255]),
            HostStatus::Disconnected => ("OFF", [120, 120, 120, 255]),
            HostStatus::Failed => ("ERR", [200, 40, 40, 255]),
        }
    }
}

fn set_status(status: HostStatus, title: &str) {
    let (text, rgba) = status.badge();
    let color: Array = rgba.iter().map(|c| JsValue::from(*c)).collect();

    action_set_badge_text(&js_object(&[("text", text.into())]));
    action_set_badge_background_color(&js_object(&[("color", color.into())]));
    action_set_title(&js_object(&[("title", title.into())]));

    // Read by the popup to explain why the host is unavailable.
    let state = js_object(&[("status", status.as_str().into()), ("message", title.into())]);
    let _ = storage_local_set(&js_object(&[(STATUS_KEY, state)]));
}

fn js_object(entries: &[(&str, JsValue)]) -> JsValue {
    let obj = Object::new();
    for (key, value) in entries {
        let _ = Reflect::set(&obj, &JsValue::from_str(key), value);
    }
    obj.into()
}
