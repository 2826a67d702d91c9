// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure
//!
//! Adapters behind the domain contracts.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Talk to the repository host, the workspace and the pipeline
//!
//! | Contract | Implementations |
//! |----------|-----------------|
//! | `TagStore` | `GitHubTagStore` |
//! | `RunCache` | `FileRunCache` |
//! | `Publisher` | `ActionsPublisher` |

pub mod actions_publisher;
pub mod file_run_cache;
pub mod github;

pub use actions_publisher::ActionsPublisher;
pub use file_run_cache::FileRunCache;
pub use github::GitHubTagStore;
