pub mod config;
pub mod create;
pub mod import;
pub mod list;
pub mod status;
pub mod submit;
pub mod update;
pub mod validate;
