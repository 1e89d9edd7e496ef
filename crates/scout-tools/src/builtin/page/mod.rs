// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Page tools: a single browsing session shared by the setup, navigation,
//! snapshot, interaction and log tools of one run.

pub mod dom;
pub mod fetch;
pub mod session;
pub mod tools;
