// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RF Matrix Switch Client
//!
//! Control and monitoring for RF matrix switches that speak bracketed,
//! checksummed ASCII packets over TCP.
//!
//! # Features
//!
//! - **Packet Codec**: `{<body>}<checksum>` framing and checksum
//! - **Transport**: one connection per request with idle and overall timeouts
//! - **Reply Parsers**: alias dump, full status and quick status
//! - **Matrix State**: topology, aliases, routing, health flags, selection
//! - **Pollers**: independent alias and status refresh timers
//! - **Routing Commands**: single and odd-anchored pair routes, validated
//!   against the current matrix bounds
//!
//! # Quick Start
//!
//! ```bash
//! # One-shot status
//! rfmatrix --host 192.168.1.50 status
//!
//! # Route input 3 to output 1
//! rfmatrix --host 192.168.1.50 route --output 1 --input 3
//!
//! # Poll continuously and print state changes
//! rfmatrix --config matrix.toml monitor
//! ```
//!
//! # Configuration File
//!
//! ```toml
//! name = "lab-matrix"
//! host = "192.168.1.50"
//! port = 4001
//! dest_address = "A"
//! source_address = "B"
//! outputs = 16
//! alias_poll_ms = 10000
//! status_poll_ms = 1000
//! status_mode = "full"
//! ```
//!
//! # Wire Protocol
//!
//! | Request        | Reply                                              |
//! |----------------|----------------------------------------------------|
//! | `AB?`          | `BASTATUS,<n1>,...,<nK>,<psu1>,<psu2>,<link>,<sum>` |
//! | `ABQ`          | `BAQ<psu1><psu2><link><sum>`                       |
//! | `ABT?`         | `BAT?,<out aliases...>,<in aliases...>`            |
//! | `ABs,OOO,III`  | device dependent, not parsed                       |

pub mod client;
pub mod codec;
pub mod command;
pub mod config;
pub mod error;
pub mod parser;
pub mod scheduler;
pub mod snapshot;
pub mod state;
pub mod transport;

pub use client::{MatrixClient, PollOutcome, Pollers};
pub use codec::{CodecError, RawReply};
pub use command::{BoundPolicy, CommandBuilder, ValidationError};
pub use config::{ConfigError, MatrixConfig, StatusMode};
pub use error::MatrixError;
pub use parser::{AliasDump, FlagState, FullStatus, HealthFlag, HealthFlags, QuickStatus, Reply};
pub use scheduler::Poller;
pub use snapshot::MatrixSnapshot;
pub use state::{ConnectionHealth, MatrixEvent, MatrixState, Topology, TopologySource};
pub use transport::{Session, Timeouts, TransportError};
