//! Integration tests for Forum-Mirror
//!
//! These tests use wiremock to stand in for a forum and drive the crate through its public API.

mod common;
mod discovery_tests;
mod mirror_tests;
mod store_tests;
