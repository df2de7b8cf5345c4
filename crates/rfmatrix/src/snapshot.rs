// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Read model published to presentation layers.

use crate::parser::{HealthFlag, HealthFlags};
use crate::state::{ConnectionHealth, MatrixState, Topology};
use serde::Serialize;
use std::collections::BTreeMap;

/// One output row of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputView {
    pub index: usize,
    pub name: String,
    pub source: u32,
    pub source_name: String,
}

/// One input row of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputView {
    pub index: usize,
    pub name: String,
}

/// The current selection, resolved to its alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionView {
    pub output: usize,
    pub name: String,
}

/// Point-in-time copy of everything a UI shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatrixSnapshot {
    pub topology: Topology,
    pub connection: ConnectionHealth,
    pub health: HealthFlags,
    pub outputs: Vec<OutputView>,
    pub inputs: Vec<InputView>,
    pub selection: Option<SelectionView>,
    pub last_reply: String,
    pub last_error: String,
    pub last_alias_dump: String,
    pub last_status: String,
}

impl MatrixSnapshot {
    pub fn capture(state: &MatrixState) -> Self {
        let topology = state.topology();
        let outputs = (1..=topology.outputs)
            .map(|index| {
                let source = state.routed_input(index);
                OutputView {
                    index,
                    name: state.output_name(index),
                    source,
                    source_name: if source == 0 {
                        String::new()
                    } else {
                        state.input_name(source as usize)
                    },
                }
            })
            .collect();
        let inputs = (1..=topology.inputs)
            .map(|index| InputView {
                index,
                name: state.input_name(index),
            })
            .collect();
        let selection = state.selection().map(|output| SelectionView {
            output,
            name: state.output_name(output),
        });

        Self {
            topology,
            connection: state.connection(),
            health: state.health().clone(),
            outputs,
            inputs,
            selection,
            last_reply: state.last_reply().to_string(),
            last_error: state.last_error().to_string(),
            last_alias_dump: state.last_alias_dump().to_string(),
            last_status: state.last_status().to_string(),
        }
    }

    /// Flatten the snapshot into named variables.
    pub fn variables(&self) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        vars.insert("last_reply".into(), self.last_reply.clone());
        vars.insert("last_error".into(), self.last_error.clone());
        vars.insert("last_alias_dump".into(), self.last_alias_dump.clone());
        vars.insert("last_status".into(), self.last_status.clone());
        vars.insert("inputs".into(), self.topology.inputs.to_string());
        vars.insert("outputs".into(), self.topology.outputs.to_string());
        vars.insert("connection".into(), self.connection.to_string());

        for flag in HealthFlag::ALL {
            vars.insert(flag.name().into(), self.health.get(flag).to_string());
        }

        for out in &self.outputs {
            vars.insert(format!("output_{:03}_name", out.index), out.name.clone());
            vars.insert(format!("output_{:03}_source", out.index), out.source.to_string());
            vars.insert(
                format!("output_{:03}_source_name", out.index),
                out.source_name.clone(),
            );
        }
        for input in &self.inputs {
            vars.insert(format!("input_{:03}_name", input.index), input.name.clone());
        }

        let (selected, selected_name) = match &self.selection {
            Some(sel) => (sel.output.to_string(), sel.name.clone()),
            None => (String::new(), String::new()),
        };
        vars.insert("selected_output".into(), selected);
        vars.insert("selected_output_name".into(), selected_name);

        vars
    }
}
