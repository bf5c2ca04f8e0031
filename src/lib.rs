pub mod config;
pub mod dns;
pub mod errors;
pub mod logging;
pub mod metadataservice;
pub mod platform;
pub mod settings;
pub mod utils;

pub use crate::errors::Error;
