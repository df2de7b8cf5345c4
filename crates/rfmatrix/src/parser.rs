// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reply parsers.
//!
//! Three independent parsers turn a decoded frame into a typed record. A
//! reply that does not have the expected shape yields `None`; parse failure
//! is "no usable data this cycle", never an error.

use crate::codec::{self, RawReply};
use serde::Serialize;
use std::fmt;

/// Header suffix of an alias dump reply.
pub const ALIAS_HEADER_SUFFIX: &str = "T?";

/// Header marker of a full status reply.
pub const STATUS_HEADER_MARKER: &str = "STATUS";

/// Quick status marker, at the third character of the inner content.
pub const QUICK_STATUS_MARKER: char = 'Q';

const QUICK_STATUS_MARKER_INDEX: usize = 2;
const QUICK_STATUS_MIN_LEN: usize = 6;
const HEALTH_FLAG_COUNT: usize = 4;
const STATUS_MIN_TOKENS: usize = 1 + 1 + HEALTH_FLAG_COUNT;

/// State of one health flag as reported by the device.
///
/// Only `O` and `F` carry meaning. Anything else is kept verbatim so that
/// an unexpected character is never mistaken for a healthy or faulty unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(tag = "state", content = "raw", rename_all = "snake_case")]
pub enum FlagState {
    /// `O`
    Ok,
    /// `F`
    Fault,
    /// Unrecognised flag text, stored as received.
    Other(String),
    /// Not reported yet, or absent from the reply.
    #[default]
    Unknown,
}

impl FlagState {
    /// Interpret a flag token.
    pub fn from_token(token: &str) -> Self {
        match token.trim() {
            "" => Self::Unknown,
            "O" => Self::Ok,
            "F" => Self::Fault,
            other => Self::Other(other.to_string()),
        }
    }

    /// Interpret a single flag character.
    pub fn from_char(c: char) -> Self {
        match c {
            'O' => Self::Ok,
            'F' => Self::Fault,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Fault)
    }
}

impl fmt::Display for FlagState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "O"),
            Self::Fault => write!(f, "F"),
            Self::Other(raw) => write!(f, "{}", raw),
            Self::Unknown => Ok(()),
        }
    }
}

/// Identifies one of the four health flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthFlag {
    Psu1,
    Psu2,
    Link,
    Summary,
}

impl HealthFlag {
    /// Wire order of the flags in every status reply.
    pub const ALL: [HealthFlag; HEALTH_FLAG_COUNT] =
        [Self::Psu1, Self::Psu2, Self::Link, Self::Summary];

    /// Variable name used in the published read model.
    pub fn name(self) -> &'static str {
        match self {
            Self::Psu1 => "psu1",
            Self::Psu2 => "psu2",
            Self::Link => "link",
            Self::Summary => "summary",
        }
    }
}

/// The four health flags, in wire order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct HealthFlags {
    pub psu1: FlagState,
    pub psu2: FlagState,
    pub link: FlagState,
    pub summary: FlagState,
}

impl HealthFlags {
    pub fn get(&self, flag: HealthFlag) -> &FlagState {
        match flag {
            HealthFlag::Psu1 => &self.psu1,
            HealthFlag::Psu2 => &self.psu2,
            HealthFlag::Link => &self.link,
            HealthFlag::Summary => &self.summary,
        }
    }

    fn from_states(mut states: impl Iterator<Item = FlagState>) -> Self {
        Self {
            psu1: states.next().unwrap_or_default(),
            psu2: states.next().unwrap_or_default(),
            link: states.next().unwrap_or_default(),
            summary: states.next().unwrap_or_default(),
        }
    }
}

/// Output and input labels reported by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasDump {
    /// Index 0 is output 1.
    pub outputs: Vec<String>,
    /// Index 0 is input 1.
    pub inputs: Vec<String>,
}

/// Routing table and health flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullStatus {
    /// Routed input number per output; index 0 is output 1, 0 means unknown.
    pub sources: Vec<u32>,
    pub flags: HealthFlags,
}

/// Health-only status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickStatus {
    pub flags: HealthFlags,
}

/// Any successfully parsed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Aliases(AliasDump),
    Status(FullStatus),
    QuickStatus(QuickStatus),
}

/// Parse an alias dump: `<hdr>T?,<out...>,<in...>`, split evenly.
pub fn parse_alias_dump(reply: &RawReply) -> Option<AliasDump> {
    let (header, rest) = reply.tokens.split_first()?;
    if !header.ends_with(ALIAS_HEADER_SUFFIX) {
        return None;
    }
    if rest.is_empty() || rest.len() % 2 != 0 {
        return None;
    }

    let (outputs, inputs) = rest.split_at(rest.len() / 2);
    Some(AliasDump {
        outputs: outputs.to_vec(),
        inputs: inputs.to_vec(),
    })
}

/// Parse a full status: `<hdr>STATUS,<n1>,...,<nK>,<psu1>,<psu2>,<link>,<summary>`.
///
/// A routing token that is not a base-10 integer reads as 0.
pub fn parse_full_status(reply: &RawReply) -> Option<FullStatus> {
    let tokens = &reply.tokens;
    if tokens.len() < STATUS_MIN_TOKENS || !tokens[0].contains(STATUS_HEADER_MARKER) {
        return None;
    }

    let flag_start = tokens.len() - HEALTH_FLAG_COUNT;
    let sources = tokens[1..flag_start]
        .iter()
        .map(|t| t.trim().parse::<u32>().unwrap_or(0))
        .collect();
    let flags =
        HealthFlags::from_states(tokens[flag_start..].iter().map(|t| FlagState::from_token(t)));

    Some(FullStatus { sources, flags })
}

/// Parse a quick status: inner content `..Q<psu1><psu2><link><summary>`.
pub fn parse_quick_status(reply: &RawReply) -> Option<QuickStatus> {
    let chars: Vec<char> = reply.inner.chars().collect();
    if chars.len() < QUICK_STATUS_MIN_LEN || chars[QUICK_STATUS_MARKER_INDEX] != QUICK_STATUS_MARKER
    {
        return None;
    }

    let flags = HealthFlags::from_states(
        chars[QUICK_STATUS_MARKER_INDEX + 1..]
            .iter()
            .take(HEALTH_FLAG_COUNT)
            .map(|&c| FlagState::from_char(c)),
    );
    Some(QuickStatus { flags })
}

/// Decode raw text and parse it as an alias dump.
pub fn alias_dump(raw: &str) -> Option<AliasDump> {
    codec::decode(raw).as_ref().and_then(parse_alias_dump)
}

/// Decode raw text and parse it as a full status.
pub fn full_status(raw: &str) -> Option<FullStatus> {
    codec::decode(raw).as_ref().and_then(parse_full_status)
}

/// Decode raw text and parse it as a quick status.
pub fn quick_status(raw: &str) -> Option<QuickStatus> {
    codec::decode(raw).as_ref().and_then(parse_quick_status)
}
