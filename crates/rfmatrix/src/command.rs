// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Command bodies and routing validation.
//!
//! A body is everything between the braces: the two address characters
//! followed by the command text. Routing commands are validated against the
//! current matrix bounds before anything touches the network.

use thiserror::Error;

/// Full status request.
pub const CMD_STATUS: &str = "?";

/// Quick (health only) status request.
pub const CMD_QUICK_STATUS: &str = "Q";

/// Alias dump request.
pub const CMD_ALIASES: &str = "T?";

/// Port range accepted while the real count is unknown or smaller.
///
/// Route fields are zero-padded to three digits. A matrix reporting more
/// than 999 ports widens the field, and single and pair routes both accept
/// up to that reported count.
pub const MAX_PORT_INDEX: usize = 999;

/// Routing request rejected before sending.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Output {index} out of range {min}..={max}")]
    OutputOutOfRange { index: usize, min: usize, max: usize },

    #[error("Input {index} out of range {min}..={max}")]
    InputOutOfRange { index: usize, min: usize, max: usize },

    #[error("Pair anchor {0} {1} must be odd")]
    EvenAnchor(&'static str, usize),

    #[error("No output selected")]
    NoSelection,
}

/// Lower bound applied to the input number of a route.
///
/// The single-route action has always accepted input 0, while the paired
/// workflow requires a real input. Each call site names its policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundPolicy {
    /// Input may be 0.
    Legacy,
    /// Input must be at least 1.
    Paired,
}

impl BoundPolicy {
    fn min_input(self) -> usize {
        match self {
            Self::Legacy => 0,
            Self::Paired => 1,
        }
    }
}

/// Builds command bodies for one address pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandBuilder {
    dest: char,
    source: char,
}

impl CommandBuilder {
    pub fn new(dest: char, source: char) -> Self {
        Self { dest, source }
    }

    /// Prefix `command` with the address pair.
    pub fn body(&self, command: &str) -> String {
        format!("{}{}{}", self.dest, self.source, command)
    }

    pub fn status(&self) -> String {
        self.body(CMD_STATUS)
    }

    pub fn quick_status(&self) -> String {
        self.body(CMD_QUICK_STATUS)
    }

    pub fn aliases(&self) -> String {
        self.body(CMD_ALIASES)
    }

    /// Route `input` to `output`.
    ///
    /// `inputs`/`outputs` are the currently known counts (0 when unknown);
    /// the accepted range is always at least up to [`MAX_PORT_INDEX`].
    pub fn route(
        &self,
        output: usize,
        input: usize,
        outputs: usize,
        inputs: usize,
        policy: BoundPolicy,
    ) -> Result<String, ValidationError> {
        let max_output = outputs.max(MAX_PORT_INDEX);
        if !(1..=max_output).contains(&output) {
            return Err(ValidationError::OutputOutOfRange {
                index: output,
                min: 1,
                max: max_output,
            });
        }

        let min_input = policy.min_input();
        let max_input = inputs.max(MAX_PORT_INDEX);
        if !(min_input..=max_input).contains(&input) {
            return Err(ValidationError::InputOutOfRange {
                index: input,
                min: min_input,
                max: max_input,
            });
        }

        Ok(self.body(&format!("s,{:03},{:03}", output, input)))
    }

    /// Route inputs `input`, `input + 1` to outputs `output`, `output + 1`.
    ///
    /// Both anchors must be odd and the second member of each pair must
    /// stay within the known count (or [`MAX_PORT_INDEX`] when the count is
    /// still unknown). Either both bodies are returned or neither.
    pub fn route_pair(
        &self,
        output: usize,
        input: usize,
        outputs: usize,
        inputs: usize,
    ) -> Result<[String; 2], ValidationError> {
        if output % 2 == 0 {
            return Err(ValidationError::EvenAnchor("output", output));
        }
        if input % 2 == 0 {
            return Err(ValidationError::EvenAnchor("input", input));
        }

        let max_output = pair_limit(outputs);
        if output + 1 > max_output {
            return Err(ValidationError::OutputOutOfRange {
                index: output + 1,
                min: 1,
                max: max_output,
            });
        }
        let max_input = pair_limit(inputs);
        if input + 1 > max_input {
            return Err(ValidationError::InputOutOfRange {
                index: input + 1,
                min: 1,
                max: max_input,
            });
        }

        let policy = BoundPolicy::Paired;
        Ok([
            self.route(output, input, outputs, inputs, policy)?,
            self.route(output + 1, input + 1, outputs, inputs, policy)?,
        ])
    }
}

fn pair_limit(known: usize) -> usize {
    if known == 0 {
        MAX_PORT_INDEX
    } else {
        known
    }
}
