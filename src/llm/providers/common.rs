// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use futures::Stream;
use reqwest::header::{HeaderMap, RETRY_AFTER};

use crate::error::{ApiError, Result, TetherError};

/// Parse token counts from an arbitrary message by extracting the first numeric tokens.
pub(crate) fn parse_numeric_token_counts(message: &str) -> (u32, u32) {
    let numbers: Vec<u32> = message
        .split(|c: char| !c.is_ascii_digit())
        .filter_map(|s| s.parse().ok())
        .collect();

    match numbers.as_slice() {
        [current, limit, ..] => (*current, *limit),
        [single] => (*single, 0),
        _ => (0, 0),
    }
}

/// Parse numeric Retry-After header (seconds).
pub(crate) fn parse_retry_after_seconds(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
}

/// Construct a standardized server error.
pub(crate) fn server_error(status: u16, message: impl Into<String>) -> TetherError {
    TetherError::Api(ApiError::ServerError {
        status,
        message: message.into(),
    })
}

/// Map a request that never got a response onto the provider taxonomy.
pub(crate) fn transport_error(err: reqwest::Error) -> TetherError {
    if err.is_connect() {
        TetherError::Api(ApiError::Network(err.to_string()))
    } else {
        TetherError::Http(err)
    }
}

/// Split a raw SSE byte stream into event blocks (the text between blank lines).
///
/// Bytes are buffered until a full block arrives so multi-byte characters
/// split across network chunks are decoded intact.
pub(crate) fn sse_blocks<S, B, E>(byte_stream: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = std::result::Result<B, E>> + Send,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    async_stream::try_stream! {
        let mut buffer = Vec::<u8>::new();

        for await chunk in byte_stream {
            let chunk = chunk.map_err(|e| TetherError::Api(ApiError::StreamError(e.to_string())))?;
            buffer.extend_from_slice(chunk.as_ref());
            for block in drain_blocks(&mut buffer) {
                yield block;
            }
        }
    }
}

fn drain_blocks(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut blocks = Vec::new();
    loop {
        let Some((pos, sep_len)) = find_separator(buffer) else {
            break;
        };
        let block: Vec<u8> = buffer.drain(..pos + sep_len).take(pos).collect();
        blocks.push(String::from_utf8_lossy(&block).into_owned());
    }
    blocks
}

fn find_separator(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|p| (p, 2));
    let crlf = buffer
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|p| (p, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

/// Pull the `event:` name and joined `data:` payload out of an SSE block.
pub(crate) fn sse_fields(block: &str) -> (Option<&str>, Option<String>) {
    let mut event = None;
    let mut data: Option<String> = None;
    for line in block.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim());
        } else if let Some(rest) = line.strip_prefix("data:") {
            let rest = rest.strip_prefix(' ').unwrap_or(rest);
            match data.as_mut() {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(rest);
                }
                None => data = Some(rest.to_string()),
            }
        }
    }
    (event, data)
}
