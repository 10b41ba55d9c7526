#![cfg_attr(not(test), no_std)]

#[macro_use]
mod log;

mod error;

pub mod config;
pub mod conversion;
pub mod device;
pub mod interface;
pub mod params;
pub mod registers;

pub use crate::device::{Ad7797, RegisterDump};
pub use crate::error::{Error, Result};
