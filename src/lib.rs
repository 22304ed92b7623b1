// OCP Gateway - authenticated session layer for OCP REST APIs

pub mod auth;
pub mod config;
pub mod error;
pub mod http_client;
pub mod middleware;
pub mod routes;
