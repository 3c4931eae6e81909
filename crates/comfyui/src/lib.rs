//! ComfyUI WebSocket and REST client library.
//!
//! Provides typed message parsing, WebSocket connection management, HTTP
//! API wrappers, input-image normalization, and the per-submission monitor
//! loop with bounded reconnection.

pub mod api;
pub mod client;
pub mod events;
pub mod messages;
pub mod monitor;
pub mod reconnect;
pub mod upload;
