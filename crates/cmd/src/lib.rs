// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

pub mod commands;
pub mod common;
pub mod http;

pub use commands::{archive_command, audit_command, lookup_command, restore_command, serve_command};
pub use common::{Stores, TierContext};
