//! Scrivano Publish Gateway Library
//!
//! This library exposes gateway internals for integration testing.
//! The main entry point for running the server is the `scrivano` binary.

pub mod config;
pub mod db;
pub mod error;
pub mod file;
pub mod lockout;
pub mod middleware;
pub mod models;
pub mod nonce;
pub mod routes;
pub mod sanitize;
pub mod secret;
pub mod services;
pub mod session;
pub mod state;
