//! Shared types for the StockMaster client: response envelopes, domain
//! records and the real-time wire protocol.

pub mod error;
pub mod models;
pub mod protocol;

pub use error::*;
pub use models::*;
pub use protocol::*;
