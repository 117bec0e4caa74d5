// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Configuration module for Tether
//!
//! Handles loading, saving, and validating settings. Credentials are read
//! here and nowhere deeper: providers receive them through [`Settings`].

pub mod settings;

pub use settings::*;
