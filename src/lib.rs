//! Library crate for droidlink: locate an Android phone over USB or the local
//! network, connect the debugging bridge and remember the endpoint.
pub mod bridge;
pub mod cache;
pub mod config;
pub mod connector;
pub mod error;
pub mod logging;
pub mod mirror;
pub mod neighbors;
pub mod netdetect;
pub mod ports;
pub mod process;
pub mod prober;
pub mod scanner;
pub mod source;
pub mod sweep;
pub mod types;
pub mod vendor;
