pub mod cli;
pub mod config;
pub mod engine;
pub mod logging;
pub mod parser;
pub mod script_host;

// Re-export main types
pub use config::{Config, EngineConfig};
pub use engine::{Engine, Host, HostEvent, ScriptError, Value, ValueType};
pub use script_host::ScriptHost;
