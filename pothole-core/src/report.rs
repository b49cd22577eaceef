//! Defect reporting over a cellular modem.
//!
//! The bearer is attached once when the channel opens. Each report is then
//! one HTTP POST session (see [`pothole_proto::at`]). Delivery is best
//! effort: modem replies are drained and logged, never interpreted, and a
//! failed session drops the report unless retries are enabled.

use core::time::Duration;

use embedded_hal::delay::DelayNs;
use heapless::{Deque, String};
use log::{debug, error, info, trace, warn};
use pothole_proto::at::{
    DEFAULT_APN, DEFAULT_COLLECTOR_URL, HTTP_DATA_TIMEOUT_MS, JSON_CONTENT_TYPE,
};
use pothole_proto::{
    bearer_setup_commands, http_post_session, AtCommand, DefectEvent, Serialize, SerializeError,
    SessionStep, MAX_PAYLOAD_SIZE,
};

use crate::serial::{drain, SerialError, SerialPort, SerialWriter};
use crate::time::{duration_ns, Clock};

/// Wait after each command before the next.
pub const DEFAULT_COMMAND_SETTLE: Duration = Duration::from_secs(1);

/// Wait after writing the body.
pub const DEFAULT_BODY_SETTLE: Duration = Duration::from_secs(2);

pub const MAX_URL_LEN: usize = 128;
pub const MAX_APN_LEN: usize = 32;

/// Longest rendered command: the URL parameter plus its framing.
pub const MAX_COMMAND_LEN: usize = MAX_URL_LEN + 32;

/// Modem reply bytes kept for logging per command.
pub const RESPONSE_LOG_LEN: usize = 128;

/// Reports held for retry at most.
pub const RETRY_QUEUE_CAPACITY: usize = 8;

/// Error type for report delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReportError {
    /// No modem; the channel is running degraded.
    Unavailable,
    /// URL or APN too long.
    Config,
    Serialize(SerializeError),
    /// A session step could not be written.
    Transport(SerialError),
}

impl ReportError {
    /// Whether trying the same report again could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Serialize(SerializeError::WriteError)
        )
    }
}

impl From<SerialError> for ReportError {
    fn from(err: SerialError) -> Self {
        Self::Transport(err)
    }
}

impl From<SerializeError> for ReportError {
    fn from(err: SerializeError) -> Self {
        Self::Serialize(err)
    }
}

impl core::fmt::Display for ReportError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "report channel unavailable"),
            Self::Config => write!(f, "invalid report configuration"),
            Self::Serialize(e) => write!(f, "payload: {}", e),
            Self::Transport(e) => write!(f, "modem: {}", e),
        }
    }
}

/// Retry behaviour for failed sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Off by default: a failed report is lost.
    pub enabled: bool,
    /// Sessions per report, the first attempt included.
    pub max_attempts: u8,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: 5,
            initial_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(120),
        }
    }
}

/// Modem and endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    url: String<MAX_URL_LEN>,
    apn: String<MAX_APN_LEN>,
    pub command_settle: Duration,
    pub body_settle: Duration,
    pub http_data_timeout_ms: u32,
    pub retry: RetryPolicy,
}

impl ReportConfig {
    /// Settings for a given collector URL and access point.
    ///
    /// # Errors
    ///
    /// [`ReportError::Config`] if either string is too long.
    pub fn new(url: &str, apn: &str) -> Result<Self, ReportError> {
        let mut config = Self::default();
        config.url.clear();
        config.url.push_str(url).map_err(|_| ReportError::Config)?;
        config.apn.clear();
        config.apn.push_str(apn).map_err(|_| ReportError::Config)?;
        Ok(config)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn apn(&self) -> &str {
        &self.apn
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        let mut url = String::new();
        let _ = url.push_str(DEFAULT_COLLECTOR_URL);
        let mut apn = String::new();
        let _ = apn.push_str(DEFAULT_APN);

        Self {
            url,
            apn,
            command_settle: DEFAULT_COMMAND_SETTLE,
            body_settle: DEFAULT_BODY_SETTLE,
            http_data_timeout_ms: HTTP_DATA_TIMEOUT_MS,
            retry: RetryPolicy::default(),
        }
    }
}

/// Destination for detected defects.
pub trait EventSink {
    /// Deliver one event, best effort. Failures are handled (logged,
    /// dropped or queued) inside the sink.
    fn send(&mut self, event: &DefectEvent);

    /// Housekeeping between samples, e.g. due retries.
    fn service(&mut self) {}
}

impl<T: EventSink + ?Sized> EventSink for &mut T {
    #[inline]
    fn send(&mut self, event: &DefectEvent) {
        (**self).send(event)
    }

    #[inline]
    fn service(&mut self) {
        (**self).service()
    }
}

#[cfg(feature = "std")]
impl<T: EventSink + ?Sized> EventSink for std::boxed::Box<T> {
    #[inline]
    fn send(&mut self, event: &DefectEvent) {
        (**self).send(event)
    }

    #[inline]
    fn service(&mut self) {
        (**self).service()
    }
}

/// A report waiting for another attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingReport {
    pub event: DefectEvent,
    /// Failed attempts so far.
    pub attempts: u8,
    pub due_ns: u64,
}

/// Bounded FIFO of failed reports with exponential backoff.
///
/// When full, the oldest report is evicted.
pub struct RetryQueue<const N: usize> {
    pending: Deque<PendingReport, N>,
    policy: RetryPolicy,
}

impl<const N: usize> RetryQueue<N> {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            pending: Deque::new(),
            policy,
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Delay before the attempt following `attempts` failures.
    pub fn backoff(&self, attempts: u8) -> Duration {
        let shift = u32::from(attempts.saturating_sub(1)).min(16);
        self.policy
            .initial_backoff
            .saturating_mul(1 << shift)
            .min(self.policy.max_backoff)
    }

    /// Queue an event after its first failed attempt. Returns the event
    /// evicted to make room, if any.
    pub fn push(&mut self, event: DefectEvent, now_ns: u64) -> Option<DefectEvent> {
        self.enqueue(PendingReport {
            event,
            attempts: 1,
            due_ns: now_ns.saturating_add(duration_ns(self.backoff(1))),
        })
    }

    /// Take the oldest report if its backoff has elapsed.
    pub fn pop_due(&mut self, now_ns: u64) -> Option<PendingReport> {
        match self.pending.front() {
            Some(front) if front.due_ns <= now_ns => self.pending.pop_front(),
            _ => None,
        }
    }

    /// Put back a report whose retry failed. Returns `false` when it has
    /// used up its attempts and was dropped.
    pub fn requeue(&mut self, mut report: PendingReport, now_ns: u64) -> bool {
        report.attempts = report.attempts.saturating_add(1);
        if report.attempts >= self.policy.max_attempts {
            return false;
        }
        report.due_ns = now_ns.saturating_add(duration_ns(self.backoff(report.attempts)));
        if self.enqueue(report).is_some() {
            warn!("report: retry queue full, dropped oldest report");
        }
        true
    }

    fn enqueue(&mut self, report: PendingReport) -> Option<DefectEvent> {
        let evicted = if self.pending.is_full() {
            self.pending.pop_front().map(|p| p.event)
        } else {
            None
        };
        // Room was made above
        let _ = self.pending.push_back(report);
        evicted
    }
}

/// Cellular modem report channel.
pub struct ReportChannel<P, D, C> {
    port: Option<P>,
    delay: D,
    clock: C,
    config: ReportConfig,
    retries: RetryQueue<RETRY_QUEUE_CAPACITY>,
}

impl<P: SerialPort, D: DelayNs, C: Clock> ReportChannel<P, D, C> {
    /// Attach the modem's bearer and return a channel ready to send.
    ///
    /// If the modem cannot be written to, the channel comes up
    /// [unavailable](Self::unavailable) instead of failing.
    pub fn open(mut port: P, delay: D, clock: C, config: ReportConfig) -> Self {
        let mut channel = Self::unavailable(delay, clock, config);
        match channel.attach_bearer(&mut port) {
            Ok(()) => {
                info!("report: bearer attached (APN {})", channel.config.apn());
                channel.port = Some(port);
            }
            Err(e) => warn!("report: modem unavailable, reports will be dropped: {}", e),
        }
        channel
    }

    /// A channel without a modem. Every send is a logged no-op.
    pub fn unavailable(delay: D, clock: C, config: ReportConfig) -> Self {
        let retries = RetryQueue::new(config.retry);
        Self {
            port: None,
            delay,
            clock,
            config,
            retries,
        }
    }

    pub fn is_available(&self) -> bool {
        self.port.is_some()
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    pub fn pending_retries(&self) -> usize {
        self.retries.len()
    }

    fn attach_bearer(&mut self, port: &mut P) -> Result<(), ReportError> {
        for cmd in bearer_setup_commands(self.config.apn()) {
            send_command(port, &mut self.delay, &cmd, self.config.command_settle)?;
        }
        Ok(())
    }

    /// Run one POST session for `event`.
    ///
    /// # Errors
    ///
    /// Only failures to write a step are reported; what the modem answers
    /// is not checked.
    pub fn try_send(&mut self, event: &DefectEvent) -> Result<(), ReportError> {
        let Some(port) = self.port.as_mut() else {
            return Err(ReportError::Unavailable);
        };

        let body_len = event.serialized_len();
        if body_len > MAX_PAYLOAD_SIZE {
            return Err(SerializeError::BufferTooSmall.into());
        }

        let steps = http_post_session(
            self.config.url(),
            JSON_CONTENT_TYPE,
            body_len,
            self.config.http_data_timeout_ms,
        );
        for step in steps {
            match step {
                SessionStep::Command(cmd) => {
                    send_command(port, &mut self.delay, &cmd, self.config.command_settle)?;
                }
                SessionStep::Body => {
                    event.serialize_io(&mut SerialWriter::new(&mut *port))?;
                    trace!("modem >> <{} byte body>", body_len);
                    settle(&mut self.delay, self.config.body_settle);
                    log_replies(port);
                }
            }
        }
        Ok(())
    }
}

impl<P: SerialPort, D: DelayNs, C: Clock> EventSink for ReportChannel<P, D, C> {
    fn send(&mut self, event: &DefectEvent) {
        if !self.is_available() {
            debug!("report: no modem, dropping {} event", event.severity());
            return;
        }

        match self.try_send(event) {
            Ok(()) => info!(
                "report: sent {} cm {} defect",
                event.depth_cm(),
                event.severity()
            ),
            Err(e) => {
                error!("report: delivery failed: {}", e);
                if self.config.retry.enabled && e.is_retryable() {
                    let now = self.clock.now_ns();
                    if self.retries.push(*event, now).is_some() {
                        warn!("report: retry queue full, dropped oldest report");
                    }
                }
            }
        }
    }

    fn service(&mut self) {
        if !self.is_available() {
            return;
        }
        let now = self.clock.now_ns();
        // One session per call; a session blocks for several seconds
        let Some(pending) = self.retries.pop_due(now) else {
            return;
        };

        match self.try_send(&pending.event) {
            Ok(()) => info!("report: retry {} succeeded", pending.attempts),
            Err(e) => {
                if !self.retries.requeue(pending, self.clock.now_ns()) {
                    error!(
                        "report: giving up after {} attempts: {}",
                        pending.attempts + 1,
                        e
                    );
                }
            }
        }
    }
}

fn settle<D: DelayNs>(delay: &mut D, d: Duration) {
    delay.delay_ms(u32::try_from(d.as_millis()).unwrap_or(u32::MAX));
}

fn log_replies<P: SerialPort + ?Sized>(port: &mut P) {
    let reply: heapless::Vec<u8, RESPONSE_LOG_LEN> = drain(port);
    if !reply.is_empty() {
        let text = core::str::from_utf8(&reply).unwrap_or("<non-utf8>");
        debug!("modem << {}", text.trim());
    }
}

fn send_command<P: SerialPort + ?Sized, D: DelayNs>(
    port: &mut P,
    delay: &mut D,
    cmd: &AtCommand<'_>,
    settle_time: Duration,
) -> Result<(), ReportError> {
    let mut line = [0u8; MAX_COMMAND_LEN];
    let len = cmd.render(&mut line)?;
    port.write(&line[..len])?;
    trace!("modem >> {}", cmd);
    settle(delay, settle_time);
    log_replies(port);
    Ok(())
}
