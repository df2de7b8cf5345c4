// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Matrix client.
//!
//! Ties the transport, parsers, state and pollers together. Every exchange
//! ends in exactly one of three outcomes, each mapped to its own health
//! state:
//!
//! | outcome                     | health              | state        |
//! |-----------------------------|---------------------|--------------|
//! | reply parsed                | `Ok`                | updated      |
//! | empty or unparsable reply   | `Warning`           | kept (stale) |
//! | timeout or socket error     | `ConnectionFailure` | kept (stale) |

use crate::codec;
use crate::command::{BoundPolicy, CommandBuilder, ValidationError};
use crate::config::{MatrixConfig, StatusMode};
use crate::error::MatrixError;
use crate::parser::{self, Reply};
use crate::scheduler::Poller;
use crate::snapshot::MatrixSnapshot;
use crate::state::{ConnectionHealth, MatrixEvent, MatrixState};
use crate::transport::Session;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Result of a poll that reached the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Reply parsed and reconciled.
    Updated,
    /// Device closed the connection without sending anything.
    NoData,
    /// Reply did not have the expected shape (or failed checksum checks).
    Unparsable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyKind {
    Aliases,
    Status,
    QuickStatus,
}

impl ReplyKind {
    fn parse(self, raw: &codec::RawReply) -> Option<Reply> {
        match self {
            Self::Aliases => parser::parse_alias_dump(raw).map(Reply::Aliases),
            Self::Status => parser::parse_full_status(raw).map(Reply::Status),
            Self::QuickStatus => parser::parse_quick_status(raw).map(Reply::QuickStatus),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Aliases => "alias dump",
            Self::Status => "status",
            Self::QuickStatus => "quick status",
        }
    }
}

struct Inner {
    config: MatrixConfig,
    session: Session,
    commands: CommandBuilder,
    state: Mutex<MatrixState>,
    events: broadcast::Sender<MatrixEvent>,
}

/// Handle to one matrix. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct MatrixClient {
    inner: Arc<Inner>,
}

impl MatrixClient {
    /// Create a client from configuration. No connection is made.
    pub fn new(config: MatrixConfig) -> Result<Self, MatrixError> {
        config.validate()?;

        let session = Session::new(config.host.clone(), config.port, config.timeouts());
        let commands = CommandBuilder::new(config.dest_address, config.source_address);
        let state = MatrixState::with_fallback(config.inputs, config.outputs);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                session,
                commands,
                state: Mutex::new(state),
                events,
            }),
        })
    }

    pub fn config(&self) -> &MatrixConfig {
        &self.inner.config
    }

    /// Subscribe to state change events.
    pub fn subscribe(&self) -> broadcast::Receiver<MatrixEvent> {
        self.inner.events.subscribe()
    }

    /// Copy of the published read model.
    pub fn snapshot(&self) -> MatrixSnapshot {
        MatrixSnapshot::capture(&self.inner.state.lock())
    }

    /// Run a read-only query (feedback evaluation) against the state.
    pub fn with_state<R>(&self, f: impl FnOnce(&MatrixState) -> R) -> R {
        f(&self.inner.state.lock())
    }

    /// Mutate the state and publish the produced events in one step.
    fn update<R>(&self, f: impl FnOnce(&mut MatrixState, &mut Vec<MatrixEvent>) -> R) -> R {
        let mut state = self.inner.state.lock();
        let mut events = Vec::new();
        let result = f(&mut state, &mut events);
        for event in events {
            // no subscribers is fine
            let _ = self.inner.events.send(event);
        }
        result
    }

    // -----------------------------------------------------------------------
    // Polls
    // -----------------------------------------------------------------------

    /// Request the alias dump and reconcile it.
    pub async fn refresh_aliases(&self) -> Result<PollOutcome, MatrixError> {
        let result = self.poll(ReplyKind::Aliases).await;
        self.finish_refresh(result)
    }

    /// Request the full status and reconcile it.
    pub async fn refresh_status(&self) -> Result<PollOutcome, MatrixError> {
        let result = self.poll(ReplyKind::Status).await;
        self.finish_refresh(result)
    }

    /// Request the quick status and reconcile it.
    pub async fn refresh_quick_status(&self) -> Result<PollOutcome, MatrixError> {
        let result = self.poll(ReplyKind::QuickStatus).await;
        self.finish_refresh(result)
    }

    fn finish_refresh(
        &self,
        result: Result<PollOutcome, MatrixError>,
    ) -> Result<PollOutcome, MatrixError> {
        if let Err(ref err) = result {
            warn!("{}: refresh failed: {}", self.inner.config.name, err);
            self.report_failure(err);
        }
        result
    }

    fn status_kind(&self) -> ReplyKind {
        match self.inner.config.status_mode {
            StatusMode::Full => ReplyKind::Status,
            StatusMode::Quick => ReplyKind::QuickStatus,
        }
    }

    /// One exchange, unreported. Poller ticks report through their error hook.
    async fn poll(&self, kind: ReplyKind) -> Result<PollOutcome, MatrixError> {
        let body = match kind {
            ReplyKind::Aliases => self.inner.commands.aliases(),
            ReplyKind::Status => self.inner.commands.status(),
            ReplyKind::QuickStatus => self.inner.commands.quick_status(),
        };
        let raw = self.exchange(&body).await?;
        Ok(self.absorb(kind, &raw))
    }

    /// Translate a reply into state and health. Runs without awaiting.
    fn absorb(&self, kind: ReplyKind, raw: &str) -> PollOutcome {
        let verify = self.inner.config.verify_checksum;
        self.update(|state, events| {
            state.record_reply(raw);

            if raw.trim().is_empty() {
                debug!("{}: empty {} reply", self.inner.config.name, kind.label());
                events.extend(state.set_connection(ConnectionHealth::Warning));
                return PollOutcome::NoData;
            }

            let reply = codec::decode(raw)
                .filter(|r| !verify || r.checksum_valid())
                .and_then(|r| kind.parse(&r));
            let Some(reply) = reply else {
                debug!(
                    "{}: unparsable {} reply: {:?}",
                    self.inner.config.name,
                    kind.label(),
                    raw
                );
                events.extend(state.set_connection(ConnectionHealth::Warning));
                return PollOutcome::Unparsable;
            };

            match kind {
                ReplyKind::Aliases => state.record_alias_dump(raw),
                ReplyKind::Status => state.record_status(raw),
                ReplyKind::QuickStatus => {}
            }
            events.extend(state.apply(&reply));
            events.extend(state.set_connection(ConnectionHealth::Ok));
            PollOutcome::Updated
        })
    }

    async fn exchange(&self, body: &str) -> Result<String, MatrixError> {
        let packet = codec::encode_request(body)?;
        Ok(self.inner.session.request(&packet).await?)
    }

    /// Record a failed poll or command in the read model.
    ///
    /// Transport failures degrade connection health; validation and
    /// encoding failures only update the last error text.
    pub fn report_failure(&self, err: &MatrixError) {
        self.update(|state, events| {
            state.record_error(err);
            if err.is_transport() {
                events.extend(state.set_connection(ConnectionHealth::ConnectionFailure));
            }
        });
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Route `input` to `output` (input 0 accepted).
    pub async fn route(&self, output: usize, input: usize) -> Result<(), MatrixError> {
        let result = self.route_inner(output, input).await;
        self.finish_command(result)
    }

    /// Route inputs `input`, `input + 1` to outputs `output`, `output + 1`.
    pub async fn route_pair(&self, output: usize, input: usize) -> Result<(), MatrixError> {
        let result = self.route_pair_inner(output, input).await;
        self.finish_command(result)
    }

    /// Route `input` to the selected output.
    pub async fn route_selected(&self, input: usize) -> Result<(), MatrixError> {
        let result = self.route_selected_inner(input).await;
        self.finish_command(result)
    }

    /// Route the input pair anchored at `input` to the selected output pair.
    pub async fn route_selected_pair(&self, input: usize) -> Result<(), MatrixError> {
        let result = self.route_selected_pair_inner(input).await;
        self.finish_command(result)
    }

    async fn route_inner(&self, output: usize, input: usize) -> Result<(), MatrixError> {
        let body = self.with_topology(|outputs, inputs| {
            self.inner
                .commands
                .route(output, input, outputs, inputs, BoundPolicy::Legacy)
        })?;
        self.send(&body).await
    }

    async fn route_selected_inner(&self, input: usize) -> Result<(), MatrixError> {
        let output = self.selected()?;
        let body = self.with_topology(|outputs, inputs| {
            self.inner
                .commands
                .route(output, input, outputs, inputs, BoundPolicy::Paired)
        })?;
        self.send(&body).await
    }

    async fn route_selected_pair_inner(&self, input: usize) -> Result<(), MatrixError> {
        let output = self.selected()?;
        self.route_pair_inner(output, input).await
    }

    async fn route_pair_inner(&self, output: usize, input: usize) -> Result<(), MatrixError> {
        let [first, second] = self.with_topology(|outputs, inputs| {
            self.inner.commands.route_pair(output, input, outputs, inputs)
        })?;
        self.send(&first).await?;
        self.send(&second).await
    }

    async fn send(&self, body: &str) -> Result<(), MatrixError> {
        info!("{}: sending {}", self.inner.config.name, body);
        let raw = self.exchange(body).await?;
        self.update(|state, _| state.record_reply(&raw));
        Ok(())
    }

    fn with_topology<R>(&self, f: impl FnOnce(usize, usize) -> R) -> R {
        let topology = self.inner.state.lock().topology();
        f(topology.outputs, topology.inputs)
    }

    fn selected(&self) -> Result<usize, ValidationError> {
        self.inner
            .state
            .lock()
            .selection()
            .ok_or(ValidationError::NoSelection)
    }

    fn finish_command(&self, result: Result<(), MatrixError>) -> Result<(), MatrixError> {
        if let Err(ref err) = result {
            warn!("{}: command failed: {}", self.inner.config.name, err);
            self.report_failure(err);
        }
        result
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    pub fn select_output(&self, output: usize) -> Result<(), MatrixError> {
        self.update(|state, events| -> Result<(), MatrixError> {
            events.extend(state.select_output(output)?);
            Ok(())
        })
    }

    pub fn clear_selection(&self) {
        self.update(|state, events| events.extend(state.clear_selection()));
    }

    // -----------------------------------------------------------------------
    // Polling
    // -----------------------------------------------------------------------

    /// Start the alias and status pollers.
    pub fn start_polling(&self) -> Pollers {
        let name = &self.inner.config.name;
        let alias = {
            let client = self.clone();
            let reporter = self.clone();
            Poller::spawn(
                format!("{}/aliases", name),
                self.inner.config.alias_interval(),
                move || {
                    let client = client.clone();
                    async move { client.poll(ReplyKind::Aliases).await.map(|_| ()) }
                },
                move |err| reporter.report_failure(err),
            )
        };
        let status = {
            let client = self.clone();
            let reporter = self.clone();
            Poller::spawn(
                format!("{}/status", name),
                self.inner.config.status_interval(),
                move || {
                    let client = client.clone();
                    let kind = client.status_kind();
                    async move { client.poll(kind).await.map(|_| ()) }
                },
                move |err| reporter.report_failure(err),
            )
        };

        info!(
            "{}: polling {}:{} (aliases every {:?}, status every {:?})",
            name,
            self.inner.session.host(),
            self.inner.session.port(),
            alias.interval(),
            status.interval()
        );
        Pollers { alias, status }
    }
}

/// The two periodic pollers of a client.
#[derive(Debug)]
pub struct Pollers {
    alias: Poller,
    status: Poller,
}

impl Pollers {
    pub fn alias(&self) -> &Poller {
        &self.alias
    }

    pub fn status(&self) -> &Poller {
        &self.status
    }

    /// Stop both pollers without waiting.
    pub fn stop(&self) {
        self.alias.stop();
        self.status.stop();
    }

    /// Stop both pollers and wait for their tasks to exit.
    pub async fn shutdown(self) {
        let Self { alias, status } = self;
        tokio::join!(alias.shutdown(), status.shutdown());
    }
}
