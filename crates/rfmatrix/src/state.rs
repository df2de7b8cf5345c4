// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Matrix state model and reconciliation.
//!
//! [`MatrixState`] is the single owner of topology, aliases, routing,
//! health flags and the output selection. Parsed replies are folded into it
//! by [`MatrixState::apply`], which returns the events the change produced.
//! Every reconciliation step is synchronous, so a caller holding the state
//! behind a lock never publishes a half-applied reply.

use crate::command::{ValidationError, MAX_PORT_INDEX};
use crate::parser::{
    AliasDump, FlagState, FullStatus, HealthFlag, HealthFlags, QuickStatus, Reply,
};
use serde::Serialize;
use std::fmt;

/// Where the current input/output counts came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologySource {
    #[default]
    Unknown,
    Configured,
    /// Output count from a status reply; the input count is not reported
    /// there and keeps its previous value.
    LearnedOutputs,
    /// Both counts from an alias dump.
    Learned,
}

/// Input and output counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Topology {
    pub inputs: usize,
    pub outputs: usize,
    pub source: TopologySource,
}

/// Link health derived from the outcome of the last exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionHealth {
    /// Nothing attempted yet.
    #[default]
    Unknown,
    /// Last exchange parsed successfully.
    Ok,
    /// Last exchange returned nothing usable; known values are stale.
    Warning,
    /// Last exchange timed out or hit a socket error.
    ConnectionFailure,
}

impl fmt::Display for ConnectionHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::ConnectionFailure => "connection_failure",
        };
        f.write_str(s)
    }
}

/// Change notifications published to state consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MatrixEvent {
    /// Input/output counts changed; dependent definitions must be rebuilt.
    TopologyChanged { inputs: usize, outputs: usize },
    /// Alias labels changed.
    AliasesChanged,
    /// Routed input changed on the listed outputs (1-based).
    RoutingChanged { outputs: Vec<usize> },
    HealthChanged { flags: HealthFlags },
    SelectionChanged { output: Option<usize> },
    ConnectionChanged { health: ConnectionHealth },
}

/// Authoritative in-memory model of one matrix.
#[derive(Debug, Clone, Default)]
pub struct MatrixState {
    topology: Topology,
    output_aliases: Vec<String>,
    input_aliases: Vec<String>,
    routes: Vec<u32>,
    health: HealthFlags,
    selection: Option<usize>,
    connection: ConnectionHealth,
    last_reply: String,
    last_error: String,
    last_alias_dump: String,
    last_status: String,
}

impl MatrixState {
    /// Empty state with unknown topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// State seeded with configured counts, used until the device reports.
    pub fn with_fallback(inputs: Option<usize>, outputs: Option<usize>) -> Self {
        let mut state = Self::new();
        if inputs.is_some() || outputs.is_some() {
            state.topology = Topology {
                inputs: inputs.unwrap_or(0),
                outputs: outputs.unwrap_or(0),
                source: TopologySource::Configured,
            };
            state.routes = vec![0; state.topology.outputs];
        }
        state
    }

    // -----------------------------------------------------------------------
    // Reconciliation
    // -----------------------------------------------------------------------

    /// Fold a parsed reply into the state and return the resulting events.
    pub fn apply(&mut self, reply: &Reply) -> Vec<MatrixEvent> {
        match reply {
            Reply::Aliases(dump) => self.apply_alias_dump(dump),
            Reply::Status(status) => self.apply_status(status),
            Reply::QuickStatus(quick) => self.apply_quick_status(quick),
        }
    }

    /// Pure form of [`apply`](Self::apply).
    pub fn reconcile(&self, reply: &Reply) -> (MatrixState, Vec<MatrixEvent>) {
        let mut next = self.clone();
        let events = next.apply(reply);
        (next, events)
    }

    pub fn apply_alias_dump(&mut self, dump: &AliasDump) -> Vec<MatrixEvent> {
        let mut events = Vec::new();
        self.learn_topology(
            dump.inputs.len(),
            dump.outputs.len(),
            TopologySource::Learned,
            &mut events,
        );

        if self.output_aliases != dump.outputs || self.input_aliases != dump.inputs {
            self.output_aliases = dump.outputs.clone();
            self.input_aliases = dump.inputs.clone();
            events.push(MatrixEvent::AliasesChanged);
        }

        events
    }

    pub fn apply_status(&mut self, status: &FullStatus) -> Vec<MatrixEvent> {
        let mut events = Vec::new();

        // Status alone can establish the output count.
        let source = match self.topology.source {
            TopologySource::Learned => TopologySource::Learned,
            _ => TopologySource::LearnedOutputs,
        };
        self.learn_topology(
            self.topology.inputs,
            status.sources.len(),
            source,
            &mut events,
        );

        let changed: Vec<usize> = status
            .sources
            .iter()
            .zip(self.routes.iter())
            .enumerate()
            .filter(|(_, (new, old))| new != old)
            .map(|(i, _)| i + 1)
            .collect();
        self.routes = status.sources.clone();
        if !changed.is_empty() {
            events.push(MatrixEvent::RoutingChanged { outputs: changed });
        }

        events.extend(self.replace_health(&status.flags));
        events
    }

    pub fn apply_quick_status(&mut self, quick: &QuickStatus) -> Vec<MatrixEvent> {
        self.replace_health(&quick.flags).into_iter().collect()
    }

    fn learn_topology(
        &mut self,
        inputs: usize,
        outputs: usize,
        source: TopologySource,
        events: &mut Vec<MatrixEvent>,
    ) {
        let changed = self.topology.inputs != inputs || self.topology.outputs != outputs;
        self.topology = Topology {
            inputs,
            outputs,
            source,
        };
        if !changed {
            return;
        }

        self.routes.resize(outputs, 0);
        events.push(MatrixEvent::TopologyChanged { inputs, outputs });
        if self.selection.is_some_and(|s| s > outputs) {
            events.extend(self.set_selection(None));
        }
    }

    fn replace_health(&mut self, flags: &HealthFlags) -> Option<MatrixEvent> {
        if self.health == *flags {
            return None;
        }
        self.health = flags.clone();
        Some(MatrixEvent::HealthChanged {
            flags: flags.clone(),
        })
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Select an output for the paired workflow.
    pub fn select_output(&mut self, output: usize) -> Result<Vec<MatrixEvent>, ValidationError> {
        let max = self.selectable_outputs();
        if !(1..=max).contains(&output) {
            return Err(ValidationError::OutputOutOfRange {
                index: output,
                min: 1,
                max,
            });
        }
        Ok(self.set_selection(Some(output)))
    }

    pub fn clear_selection(&mut self) -> Vec<MatrixEvent> {
        self.set_selection(None)
    }

    fn set_selection(&mut self, selection: Option<usize>) -> Vec<MatrixEvent> {
        if self.selection == selection {
            return Vec::new();
        }
        self.selection = selection;
        vec![MatrixEvent::SelectionChanged { output: selection }]
    }

    fn selectable_outputs(&self) -> usize {
        if self.topology.outputs == 0 {
            MAX_PORT_INDEX
        } else {
            self.topology.outputs
        }
    }

    // -----------------------------------------------------------------------
    // Exchange bookkeeping
    // -----------------------------------------------------------------------

    pub fn set_connection(&mut self, health: ConnectionHealth) -> Option<MatrixEvent> {
        if self.connection == health {
            return None;
        }
        self.connection = health;
        Some(MatrixEvent::ConnectionChanged { health })
    }

    pub fn record_reply(&mut self, raw: &str) {
        self.last_reply = raw.to_string();
    }

    pub fn record_alias_dump(&mut self, raw: &str) {
        self.last_alias_dump = raw.to_string();
    }

    pub fn record_status(&mut self, raw: &str) {
        self.last_status = raw.to_string();
    }

    pub fn record_error(&mut self, error: impl fmt::Display) {
        self.last_error = error.to_string();
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn health(&self) -> &HealthFlags {
        &self.health
    }

    pub fn connection(&self) -> ConnectionHealth {
        self.connection
    }

    pub fn selection(&self) -> Option<usize> {
        self.selection
    }

    pub fn routes(&self) -> &[u32] {
        &self.routes
    }

    pub fn output_aliases(&self) -> &[String] {
        &self.output_aliases
    }

    pub fn input_aliases(&self) -> &[String] {
        &self.input_aliases
    }

    pub fn last_reply(&self) -> &str {
        &self.last_reply
    }

    pub fn last_error(&self) -> &str {
        &self.last_error
    }

    pub fn last_alias_dump(&self) -> &str {
        &self.last_alias_dump
    }

    pub fn last_status(&self) -> &str {
        &self.last_status
    }

    /// Alias of a 1-based output, or its `Onnn` placeholder.
    pub fn output_name(&self, output: usize) -> String {
        alias_or_placeholder(&self.output_aliases, output, 'O')
    }

    /// Alias of a 1-based input, or its `Innn` placeholder.
    pub fn input_name(&self, input: usize) -> String {
        alias_or_placeholder(&self.input_aliases, input, 'I')
    }

    /// Input currently routed to a 1-based output (0 when unknown).
    pub fn routed_input(&self, output: usize) -> u32 {
        output
            .checked_sub(1)
            .and_then(|i| self.routes.get(i))
            .copied()
            .unwrap_or(0)
    }

    // -----------------------------------------------------------------------
    // Feedbacks
    // -----------------------------------------------------------------------

    pub fn is_routed(&self, output: usize, input: u32) -> bool {
        output >= 1 && output <= self.routes.len() && self.routed_input(output) == input
    }

    pub fn selected_is(&self, output: usize) -> bool {
        self.selection == Some(output)
    }

    pub fn selected_routed_from(&self, input: u32) -> bool {
        self.selection.is_some_and(|out| self.is_routed(out, input))
    }

    /// True when the selected odd output and its neighbour carry `input`
    /// and `input + 1`. An even selection never matches.
    pub fn pair_routed_from(&self, input: u32) -> bool {
        match self.selection {
            Some(out) if out % 2 == 1 && input >= 1 => {
                self.is_routed(out, input) && self.is_routed(out + 1, input + 1)
            }
            _ => false,
        }
    }

    pub fn health_is_ok(&self, flag: HealthFlag) -> bool {
        self.health.get(flag).is_ok()
    }

    pub fn flag(&self, flag: HealthFlag) -> &FlagState {
        self.health.get(flag)
    }
}

fn alias_or_placeholder(aliases: &[String], index: usize, prefix: char) -> String {
    index
        .checked_sub(1)
        .and_then(|i| aliases.get(i))
        .filter(|alias| !alias.is_empty())
        .cloned()
        .unwrap_or_else(|| format!("{}{:03}", prefix, index))
}
