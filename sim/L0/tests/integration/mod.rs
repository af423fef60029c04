//! Integration tests for the sim-scene and sim-teleop crates.
//!
//! These tests verify the end-to-end pipeline:
//! - Catalog sampling → fragment extraction → composition → dry-run launch
//! - Robot placement through a posed include
//! - Teleop session lifecycle against a running simulator

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod fixtures;
pub mod kitchen_scene;
pub mod robot_include;
pub mod teleop_lifecycle;
