//! HTTP surface for the wamux session gateway.
//!
//! Thin axum layer over [`wamux_sessions::SessionRegistry`]: signature
//! authentication, the versioned route table, the response envelope with
//! stable service codes, and QR rendering of pairing payloads.

pub mod auth;
pub mod health;
pub mod qr;
pub mod respond;
pub mod routes;
pub mod state;

pub use {routes::router, state::ApiState};
