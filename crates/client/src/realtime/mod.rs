//! Real-time inventory events over Socket.IO.
//!
//! This module provides:
//! - A single managed connection with bounded auto-reconnect
//! - WebSocket transport with HTTP long-polling fallback
//! - A handler registry that outlives connections
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    EventClient                      │
//! │      (on / off / emit / join_room / connect)        │
//! └─────────────────────────────────────────────────────┘
//!            │ commands                    │ on / off
//!            ▼                             ▼
//!   ┌─────────────────┐  dispatch  ┌─────────────────┐
//!   │ ConnectionLoop  │───────────▶│ HandlerRegistry │
//!   │ (state, retry)  │            │ (event -> [fn]) │
//!   └─────────────────┘            └─────────────────┘
//!            │
//!     ┌──────┴──────┐
//!     ▼             ▼
//! ┌─────────┐ ┌─────────┐
//! │WebSocket│ │ Polling │
//! └─────────┘ └─────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let client = EventClient::new(RealtimeConfig::new("http://localhost:5000"));
//! client.on(events::STOCK_UPDATE, |payload| println!("stock changed: {payload}"));
//! client.connect(Some(&warehouse_id));
//! ```

mod client;
mod connection;
mod registry;
pub mod transport;

pub use client::EventClient;
pub use connection::{ConnectionState, RealtimeConfig, ReconnectConfig};
pub use registry::{Handler, HandlerRegistry, Subscription};
pub use transport::TransportKind;
