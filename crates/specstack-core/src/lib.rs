pub mod branch;
pub mod config;
pub mod context;
pub mod contract;
pub mod error;
pub mod events;
pub mod graph;
pub mod health;
pub mod import;
pub mod io;
pub mod paths;
pub mod registry;
pub mod stack;
pub mod surface;
pub mod types;
pub mod validator;
pub mod vcs;

pub use error::{Result, StackError};
