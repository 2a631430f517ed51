mod application_impl;
pub mod data;
mod progress;
mod runtime_config;

pub use application_impl::{Application, ApplicationError};
pub use runtime_config::RuntimeConfig;
