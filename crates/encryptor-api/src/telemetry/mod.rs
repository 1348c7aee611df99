//! The telemetry pipeline: connection manager, event envelope
//! constructors, background pollers, and the WebSocket handler (§4.10).

pub mod connection_manager;
pub mod events;
pub mod interface_poller;
pub mod tunnel_poller;
pub mod websocket;
