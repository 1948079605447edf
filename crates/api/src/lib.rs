//! `gurukul-api` — HTTP surface of the identity authority.

pub mod app;
pub mod context;
pub mod errors;
pub mod middleware;
pub mod routes;
