//! StockMaster Client
//!
//! Client library for the StockMaster inventory server: a REST API client
//! with the domain services, a persisted login session, and a real-time
//! event client for stock and operation updates.

pub mod api_client;
pub mod config;
pub mod logging;
pub mod realtime;
pub mod services;
pub mod storage;

pub use api_client::{ApiClient, SessionExpiredHook};
pub use config::ClientConfig;
pub use realtime::{ConnectionState, EventClient, RealtimeConfig, ReconnectConfig, Subscription};
pub use storage::SessionStore;
