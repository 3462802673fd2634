//! Synchronization bridge between the game's push stream and step/reset calls
//!
//! The game pushes state on its own clock. The bridge turns that into a
//! request/response exchange:
//!
//! ```text
//! Disconnected --connect--> Idle --send_action--> AwaitingObservation
//!      ^                     ^                          |
//!      |                     +---- fresh frame ---------+
//!      |                     +---- deadline (stale) ----+
//!      +--- reset ---------- Faulted <--- channel fault (from any state)
//! ```
//!
//! Frames that arrive before an action is sent are discarded; when several
//! frames arrive together only the newest is delivered.

use crate::protocol::{self, ActionPayload, ResetPayload, WireMessage};
use crate::transport::{Channel, Connector, Inbound};
use coin_rl_core::{
    Action, CoinRlError, EnvConfig, GameState, Observation, ObservationEncoder, Result, StepInfo,
};
use std::time::Duration;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Connection state of a bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Idle,
    AwaitingObservation,
    Faulted(String),
}

/// Outcome of waiting for an observation
#[derive(Debug, Clone, PartialEq)]
pub enum Awaited {
    /// A frame arrived before the deadline
    Fresh(Observation),
    /// The deadline elapsed with no valid frame
    Timeout,
}

/// Observation delivered for one reset or step, with bridge-side info filled in
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub observation: Observation,
    pub info: StepInfo,
}

/// Bridge that owns one channel to the game
pub struct SyncBridge<C: Connector> {
    connector: C,
    encoder: ObservationEncoder,
    per_step_timeout: Duration,
    default_action: Action,
    max_protocol_violations: u32,
    channel: Option<Channel>,
    state: LinkState,
    last_good: Option<Observation>,
    consecutive_violations: u32,
    /// Counters for the call in progress
    tally: StepInfo,
    call_started: Instant,
}

impl<C: Connector> SyncBridge<C> {
    /// Create a disconnected bridge
    pub fn new(connector: C, config: &EnvConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            connector,
            encoder: ObservationEncoder::new(config.max_enemies, config.max_coins),
            per_step_timeout: config.per_step_timeout(),
            default_action: Action::from_index(config.default_action as i64)?,
            max_protocol_violations: config.max_protocol_violations,
            channel: None,
            state: LinkState::Disconnected,
            last_good: None,
            consecutive_violations: 0,
            tally: StepInfo::default(),
            call_started: Instant::now(),
        })
    }

    pub fn state(&self) -> &LinkState {
        &self.state
    }

    pub fn encoder(&self) -> &ObservationEncoder {
        &self.encoder
    }

    pub fn per_step_timeout(&self) -> Duration {
        self.per_step_timeout
    }

    /// Most recent observation delivered since the last reset
    pub fn last_observation(&self) -> Option<&Observation> {
        self.last_good.as_ref()
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Open the channel if there is no healthy one
    pub async fn connect(&mut self) -> Result<()> {
        if self.channel.is_some() && !matches!(self.state, LinkState::Faulted(_)) {
            return Ok(());
        }
        self.channel = None;
        self.consecutive_violations = 0;

        match self.connector.connect().await {
            Ok(channel) => {
                self.channel = Some(channel);
                self.state = LinkState::Idle;
                info!("Bridge connected");
                Ok(())
            }
            Err(e) => {
                self.state = LinkState::Disconnected;
                Err(e)
            }
        }
    }

    /// Start a new episode and wait for its first observation
    ///
    /// Reconnects if the channel is absent or faulted. Unlike a step, a missed
    /// deadline here is an error: there is no earlier observation to fall back on.
    pub async fn reset(
        &mut self,
        seed: Option<u64>,
        options: Option<serde_json::Value>,
    ) -> Result<Frame> {
        self.begin_call();
        self.last_good = None;

        let reset = WireMessage::Reset(ResetPayload { seed, options });
        if self.prepare().await.is_err() || self.transmit(&reset).await.is_err() {
            info!("Reconnecting for reset");
            self.connect().await?;
            self.transmit(&reset).await?;
        }
        self.state = LinkState::AwaitingObservation;

        // Connecting is bounded by the connect timeout, not the step deadline
        let deadline = Instant::now() + self.per_step_timeout;
        match self.await_observation(deadline).await? {
            Awaited::Fresh(observation) => Ok(Frame {
                observation,
                info: self.take_info(),
            }),
            Awaited::Timeout => {
                warn!(
                    "No observation within {:?} after reset",
                    self.per_step_timeout
                );
                Err(CoinRlError::Timeout(self.per_step_timeout))
            }
        }
    }

    /// Send `action` and wait for the game's reply
    ///
    /// On a missed deadline the last good observation is returned with
    /// `stale = true` and the default action is transmitted in place of the
    /// superseded one.
    pub async fn step(&mut self, action: Action) -> Result<Frame> {
        self.begin_call();
        if self.last_good.is_none() {
            return Err(CoinRlError::NotReset);
        }

        self.send_action(action).await?;

        let deadline = self.call_started + self.per_step_timeout;
        let observation = match self.await_observation(deadline).await? {
            Awaited::Fresh(observation) => observation,
            Awaited::Timeout => {
                warn!(
                    "No observation within {:?} after {:?}, reusing last good observation",
                    self.per_step_timeout, action
                );
                self.transmit(&WireMessage::Action(self.default_action.into()))
                    .await?;
                self.tally.stale = true;
                self.tally.default_action_sent = true;
                self.last_good.clone().ok_or(CoinRlError::NotReset)?
            }
        };

        Ok(Frame {
            observation,
            info: self.take_info(),
        })
    }

    /// Transmit an action command
    ///
    /// Frames already queued predate the action and are discarded first.
    /// Returns once the transport has accepted the bytes.
    pub async fn send_action(&mut self, action: Action) -> Result<()> {
        self.discard_backlog()?;
        self.transmit(&WireMessage::Action(ActionPayload::from(action)))
            .await?;
        self.state = LinkState::AwaitingObservation;
        Ok(())
    }

    /// Wait until a decodable game state arrives or `deadline` passes
    ///
    /// Undecodable frames count as missed ticks. If several states are
    /// queued, the newest wins and the rest count as dropped.
    pub async fn await_observation(&mut self, deadline: Instant) -> Result<Awaited> {
        loop {
            let next = {
                let channel = self.channel_mut()?;
                tokio::time::timeout_at(deadline, channel.recv()).await
            };
            let event = match next {
                Err(_) => {
                    self.state = LinkState::Idle;
                    return Ok(Awaited::Timeout);
                }
                Ok(Ok(event)) => event,
                Ok(Err(RecvError::Lagged(n))) => {
                    self.tally.dropped_frames += n;
                    continue;
                }
                Ok(Err(RecvError::Closed)) => return Err(self.fault("reader task stopped")),
            };

            let Some(mut latest) = self.absorb(event)? else {
                continue;
            };
            self.drain_newer(&mut latest);

            let observation = self.encoder.encode(&latest);
            if !matches!(self.state, LinkState::Faulted(_)) {
                self.state = LinkState::Idle;
            }
            self.last_good = Some(observation.clone());
            return Ok(Awaited::Fresh(observation));
        }
    }

    /// Tear the channel down
    pub async fn close(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.close().await;
            info!("Bridge closed");
        }
        self.state = LinkState::Disconnected;
        self.last_good = None;
    }

    async fn prepare(&mut self) -> Result<()> {
        if self.channel.is_none() || matches!(self.state, LinkState::Faulted(_)) {
            self.connect().await?;
        }
        self.discard_backlog()
    }

    async fn transmit(&mut self, msg: &WireMessage) -> Result<()> {
        let data = protocol::encode(msg)?;
        let json_preview: String = String::from_utf8_lossy(&data).chars().take(200).collect();
        debug!("[Rust→Game] len={} json={}", data.len(), json_preview);

        let sent = self.channel_mut()?.send(&data).await;
        sent.map_err(|e| self.fault(e))
    }

    fn channel_mut(&mut self) -> Result<&mut Channel> {
        if let LinkState::Faulted(reason) = &self.state {
            return Err(CoinRlError::ChannelFault(reason.clone()));
        }
        self.channel
            .as_mut()
            .ok_or_else(|| CoinRlError::ChannelFault("not connected".into()))
    }

    /// Drop everything already queued
    fn discard_backlog(&mut self) -> Result<()> {
        loop {
            let next = self.channel_mut()?.try_recv();
            match next {
                Ok(event) => {
                    if self.absorb(event)?.is_some() {
                        self.tally.dropped_frames += 1;
                    }
                }
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Lagged(n)) => self.tally.dropped_frames += n,
                Err(TryRecvError::Closed) => return Err(self.fault("reader task stopped")),
            }
        }
    }

    /// Replace `latest` with any newer states already queued
    fn drain_newer(&mut self, latest: &mut GameState) {
        while let Some(channel) = self.channel.as_mut() {
            match channel.try_recv() {
                Ok(event) => match self.absorb(event) {
                    Ok(Some(newer)) => {
                        self.tally.dropped_frames += 1;
                        *latest = newer;
                    }
                    Ok(None) => {}
                    // Fault recorded; the frame in hand is still delivered
                    Err(_) => break,
                },
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Lagged(n)) => self.tally.dropped_frames += n,
                Err(TryRecvError::Closed) => {
                    let _ = self.fault("reader task stopped");
                    break;
                }
            }
        }
    }

    /// Apply policy to one inbound event; `Some` for a usable state
    fn absorb(&mut self, event: Inbound) -> Result<Option<GameState>> {
        match event {
            Inbound::State(state) => {
                self.consecutive_violations = 0;
                Ok(Some(state))
            }
            Inbound::Invalid(e) => {
                warn!("Dropping undecodable frame as a missed tick: {}", e);
                self.tally.decode_errors += 1;
                Ok(None)
            }
            Inbound::Unexpected(kind) => {
                let violation = CoinRlError::ProtocolViolation(format!(
                    "unexpected message type {:?}",
                    kind
                ));
                warn!("Ignoring message: {}", violation);
                self.tally.protocol_violations += 1;
                self.consecutive_violations += 1;
                if self.consecutive_violations > self.max_protocol_violations {
                    return Err(self.fault(format!(
                        "{} consecutive protocol violations, last: {}",
                        self.consecutive_violations, violation
                    )));
                }
                Ok(None)
            }
            Inbound::Closed(reason) => Err(self.fault(reason)),
        }
    }

    /// Enter `Faulted`, drop the channel and return the error to surface
    fn fault(&mut self, cause: impl Into<FaultCause>) -> CoinRlError {
        let reason = cause.into().0;
        error!("Channel fault: {}", reason);
        self.channel = None;
        self.state = LinkState::Faulted(reason.clone());
        CoinRlError::ChannelFault(reason)
    }

    fn begin_call(&mut self) {
        self.tally = StepInfo::default();
        self.call_started = Instant::now();
    }

    /// Counters gathered since the current reset or step began
    ///
    /// Also available after a failed call, e.g. to report a fault.
    pub fn take_info(&mut self) -> StepInfo {
        let mut info = std::mem::take(&mut self.tally);
        info.latency_ms = self.call_started.elapsed().as_secs_f64() * 1000.0;
        info
    }
}

/// Reason text for a fault, without nesting "Channel fault:" prefixes
struct FaultCause(String);

impl From<CoinRlError> for FaultCause {
    fn from(err: CoinRlError) -> Self {
        match err {
            CoinRlError::ChannelFault(reason) => FaultCause(reason),
            other => FaultCause(other.to_string()),
        }
    }
}

impl From<String> for FaultCause {
    fn from(reason: String) -> Self {
        FaultCause(reason)
    }
}

impl From<&str> for FaultCause {
    fn from(reason: &str) -> Self {
        FaultCause(reason.to_string())
    }
}
