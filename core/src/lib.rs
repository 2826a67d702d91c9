// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Build Number Core
//!
//! Tag-based distributed counter that hands out monotonically increasing
//! build numbers to CI pipeline runs.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Counter protocol (allocate, claim, sweep) and its adapters

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
