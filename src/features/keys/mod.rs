//! API Key 访问控制与用量台账。

pub mod auth;
pub mod handler;
pub mod ledger;
pub mod storage;

pub use handler::create_keys_router;
