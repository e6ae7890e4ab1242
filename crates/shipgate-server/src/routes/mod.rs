//! HTTP route modules.

pub mod auth;
pub mod projects;
pub mod teams;
