// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Client error type.

use crate::codec::CodecError;
use crate::command::ValidationError;
use crate::config::ConfigError;
use crate::transport::TransportError;
use thiserror::Error;

/// Errors returned by client operations.
#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl MatrixError {
    /// True for timeouts and socket errors.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
