//! Test helper modules for integration tests

#![allow(dead_code)]

pub mod fixtures;
pub mod mapping;
pub mod mock_remote;
pub mod stores;

pub use fixtures::*;
pub use mock_remote::*;
