//! Shared helpers for the integration tests.

#![allow(dead_code)]

pub mod fixtures;
pub mod harness;
