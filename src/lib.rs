//! API gateway core: dynamic configuration and the request pipeline.
//!
//! Definitions and policies are pulled from files, a control plane or an RPC
//! management node, compiled into per-API middleware chains and published as
//! an atomically swapped routing snapshot.

pub mod admin;
pub mod apidef;
pub mod auth;
pub mod chain;
pub mod config;
pub mod dashboard;
pub mod deployment;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod policy;
pub mod registry;
pub mod reload;
pub mod resilience;
pub mod rpc;
pub mod sources;
pub mod storage;

pub use config::GatewayConfig;
pub use deployment::DeploymentMode;
pub use http::GatewayServer;
pub use lifecycle::{Gateway, Shutdown};
