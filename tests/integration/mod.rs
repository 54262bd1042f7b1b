//! Integration test suite for soldeploy
//!
//! End-to-end runs through the public API and the `soldeploy` binary.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **cli**: the binary against directory-backed portals
//! - **config**: global configuration discovery
//! - **deletion**: reverse-order deletion, checked and unchecked
//! - **deployment**: creation order, failure blocking, concurrency, sharing
//! - **packaging**: graph building and bundle persistence
//! - **webhooks**: webhook rewriting inside archive payloads

#[path = "../common/mod.rs"]
mod common;

mod cli;
mod config;
mod deletion;
mod deployment;
mod packaging;
mod webhooks;
