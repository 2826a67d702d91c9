// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Counter types and the contracts of the collaborators around them.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure types, no I/O

pub mod config;
pub mod counter;
pub mod error;
pub mod publisher;
pub mod run_cache;
pub mod tag_store;
