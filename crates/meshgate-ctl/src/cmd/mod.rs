//! CLI command modules.

pub mod bus;
pub mod http;
pub mod radio;
pub mod status;
