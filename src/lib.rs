pub mod config;
pub mod dispatch;
pub mod error;
pub mod pipeline;
pub mod postprocess;
pub mod rate_limit;
pub mod requests;
pub mod response;
pub mod server;
pub mod templates;
pub mod validate;
