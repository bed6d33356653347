use std::cell::RefCell;

use leptos::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CloseEvent, MessageEvent, WebSocket};

use relief_shared::sync::LiveOutcome;
use relief_shared::{InboundEvent, OutboundEvent};

use crate::app::Controller;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Live,
    Closed,
}

struct ChannelConnection {
    ws: WebSocket,
    on_open: Closure<dyn Fn()>,
    on_close: Closure<dyn Fn(CloseEvent)>,
    on_error: Closure<dyn Fn()>,
    on_message: Closure<dyn Fn(MessageEvent)>,
}

impl ChannelConnection {
    fn close(self) {
        let _ = self.on_open.as_ref();
        let _ = self.on_close.as_ref();
        let _ = self.on_error.as_ref();
        let _ = self.on_message.as_ref();
        self.ws.set_onopen(None);
        self.ws.set_onclose(None);
        self.ws.set_onerror(None);
        self.ws.set_onmessage(None);
        self.ws.close().ok();
    }
}

thread_local! {
    static CHANNEL: RefCell<Option<ChannelConnection>> = const { RefCell::new(None) };
}

pub fn disconnect() {
    CHANNEL.with(|slot| {
        if let Some(connection) = slot.borrow_mut().take() {
            connection.close();
        }
    });
}

/// `ws://` or `wss://` URL for `path` on the page's own host; absolute URLs pass through.
pub(crate) fn channel_url(path: &str) -> Option<String> {
    if path.starts_with("ws://") || path.starts_with("wss://") {
        return Some(path.to_string());
    }
    let location = web_sys::window()?.location();
    let scheme = match location.protocol().ok()?.as_str() {
        "https:" => "wss",
        _ => "ws",
    };
    let host = location.host().ok()?;
    Some(format!("{scheme}://{host}{path}"))
}

/// Publish one event. Frames sent before the socket opens are dropped with a warning.
pub fn send(event: &OutboundEvent) {
    let frame = match event.encode() {
        Ok(frame) => frame,
        Err(error) => {
            tracing::warn!(event = event.name(), %error, "could not encode outbound event");
            return;
        }
    };
    CHANNEL.with(|slot| {
        let slot = slot.borrow();
        let Some(connection) = slot.as_ref() else {
            tracing::warn!(event = event.name(), "live channel not connected, event dropped");
            return;
        };
        if connection.ws.ready_state() != WebSocket::OPEN {
            tracing::warn!(event = event.name(), "live channel not open, event dropped");
            return;
        }
        if let Err(error) = connection.ws.send_with_str(&frame) {
            tracing::warn!(event = event.name(), error = ?error, "send failed");
        }
    });
}

fn handle_frame(controller: &Controller, revision: RwSignal<u64>, data: &str) {
    let event = match InboundEvent::decode(data) {
        Ok(Some(event)) => event,
        Ok(None) => return,
        Err(error) => {
            tracing::warn!(%error, "dropping malformed live frame");
            return;
        }
    };
    let outcome = controller.borrow_mut().on_live_event(event);
    if outcome != LiveOutcome::Ignored {
        revision.update(|n| *n = n.wrapping_add(1));
    }
}

/// Open the live channel and route inbound events into the controller.
pub fn connect(
    path: &str,
    controller: Controller,
    revision: RwSignal<u64>,
    status: RwSignal<ConnectionStatus>,
) {
    status.set(ConnectionStatus::Connecting);

    let Some(url) = channel_url(path) else {
        status.set(ConnectionStatus::Closed);
        return;
    };
    let ws = match WebSocket::new(&url) {
        Ok(ws) => ws,
        Err(error) => {
            tracing::warn!(%url, error = ?error, "could not open live channel");
            status.set(ConnectionStatus::Closed);
            return;
        }
    };

    let on_open = Closure::<dyn Fn()>::new(move || {
        tracing::debug!("live channel open");
        status.set(ConnectionStatus::Live);
    });
    ws.set_onopen(Some(on_open.as_ref().unchecked_ref()));

    let on_message = Closure::<dyn Fn(MessageEvent)>::new(move |e: MessageEvent| {
        let Some(data) = e.data().as_string() else {
            return;
        };
        handle_frame(&controller, revision, &data);
    });
    ws.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

    let on_close = Closure::<dyn Fn(CloseEvent)>::new(move |e: CloseEvent| {
        tracing::info!(code = e.code(), "live channel closed");
        status.set(ConnectionStatus::Closed);
    });
    ws.set_onclose(Some(on_close.as_ref().unchecked_ref()));

    let on_error = Closure::<dyn Fn()>::new(move || {
        tracing::warn!("live channel error");
    });
    ws.set_onerror(Some(on_error.as_ref().unchecked_ref()));

    CHANNEL.with(|slot| {
        let mut slot = slot.borrow_mut();
        if let Some(old) = slot.take() {
            old.close();
        }
        *slot = Some(ChannelConnection {
            ws,
            on_open,
            on_close,
            on_error,
            on_message,
        });
    });
}
