// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application
//!
//! Orchestrates the counter protocol over the domain contracts.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Retry, claim, sweep and publish

pub mod build_number_service;
pub mod cleanup;
pub mod retry;

pub use build_number_service::{BuildNumberOutcome, BuildNumberService, Provenance};
pub use cleanup::{CleanupFailure, CleanupReport, CleanupSweeper};
