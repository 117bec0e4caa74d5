// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tracing setup for embedders
//!
//! The library only emits `tracing` events. Hosts that do not install their
//! own subscriber can call [`init`] to get formatted output on stderr.

use tracing_subscriber::EnvFilter;

/// Environment variable holding an extra filter directive list
pub const LOG_ENV: &str = "TETHER_LOG";

/// Build the env filter: `RUST_LOG` first, WARN as floor, `TETHER_LOG` on top.
pub fn env_filter(verbose: bool) -> EnvFilter {
    let mut filter = EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into());

    if verbose {
        for directive in ["tether::agent=debug", "tether::llm=debug"] {
            if let Ok(parsed) = directive.parse() {
                filter = filter.add_directive(parsed);
            }
        }
    }

    if let Ok(extra) = std::env::var(LOG_ENV) {
        for directive in extra.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            match directive.parse() {
                Ok(parsed) => filter = filter.add_directive(parsed),
                Err(e) => eprintln!("Ignoring invalid {} directive '{}': {}", LOG_ENV, directive, e),
            }
        }
    }

    filter
}

/// Install a global fmt subscriber. Safe to call more than once.
pub fn init(verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(std::io::stderr)
        .try_init();
}
