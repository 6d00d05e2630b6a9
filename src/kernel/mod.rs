/*!
 * Kernel Module
 * The public interception surface: request contexts, authenticators,
 * configuration, the call-to-permission mapper, and the façade itself
 */

pub mod auth;
pub mod config;
pub mod context;
pub mod facade;
pub mod mapper;

pub use auth::{
    ApiKeyAuthenticator, Authenticator, ChainAuthenticator, FuncAuthenticator,
    HeaderAuthenticator, StaticAuthenticator, API_KEY_METADATA_KEY,
};
pub use config::{Config, PerformanceConfig};
pub use context::{CancelToken, RequestContext};
pub use facade::WardenFs;
pub use mapper::FsCall;
