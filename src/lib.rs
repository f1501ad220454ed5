pub mod auth;
pub mod config;
pub mod engine;
pub mod ical;
pub mod kyc;
pub mod lifecycle;
pub mod limits;
pub mod model;
pub mod observability;
pub mod phone;
pub mod sql;
pub mod tenant;
pub mod wal;
pub mod wire;
