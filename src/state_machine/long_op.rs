// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! FORMAT UNIT / FORMAT MEDIUM / SANITIZE with progress polling.
//!
//! With IMMED the device accepts the command at once and keeps working; the
//! caller then probes with TEST UNIT READY or REQUEST SENSE every interval
//! and reads the progress indication from the returned sense. The first
//! probe without progress ends the loop: devices drop the indication when
//! the operation completes. A final probe that fails with anything other
//! than NOT READY, NO SENSE or RECOVERED ERROR is returned as the error of
//! the operation.

use std::{
    cell::Cell,
    fmt,
    time::{Duration, Instant},
};

use tracing::{debug, info};

use crate::{
    cfg::{config::MAX_TIMEOUT_SECS, context::process_context, enums::ProbeKind},
    control_block::sanitize::SanitizeOptions,
    handlers::{
        common::HelperOpts,
        media::{OverwriteParams, format_medium, format_unit, sanitize},
        unit::probe_progress,
    },
    models::error::PtError,
    pt::session::PtTarget,
    state_machine::common::{StateMachine, StateMachineCtx, Transition},
};

/// Command timeout used when a long operation runs without IMMED.
pub const NON_IMMED_TIMEOUT_SECS: u32 = 20 * 60 * 60;

/// Time source of the poller.
pub trait Clock {
    /// Monotonic time since an arbitrary origin.
    fn now(&self) -> Duration;
    fn sleep(&self, d: Duration);
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, d: Duration) {
        std::thread::sleep(d);
    }
}

/// Clock whose `sleep` only advances a counter. Lets dry runs and tests
/// drive the poller without waiting.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
    sleeps: Cell<u32>,
}

impl ManualClock {
    pub fn sleeps(&self) -> u32 {
        self.sleeps.get()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&self, d: Duration) {
        self.now.set(self.now.get() + d);
        self.sleeps.set(self.sleeps.get() + 1);
    }
}

/// Progress indication: `raw / 65536` of the operation is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub raw: u16,
}

impl Progress {
    /// Percent in hundredths, rounded down.
    pub fn hundredths(&self) -> u32 {
        self.raw as u32 * 10_000 / 65_536
    }

    pub fn percent(&self) -> f64 {
        self.hundredths() as f64 / 100.0
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = self.hundredths();
        write!(f, "{}.{:02}%", h / 100, h % 100)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    pub probe: ProbeKind,
    /// Return right after a successful IMMED submission.
    pub early: bool,
}

impl Default for PollOptions {
    fn default() -> Self {
        let p = &process_context().polling;
        Self {
            interval: p.interval,
            probe: p.probe,
            early: p.early.as_bool(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollOutcome {
    /// Probes issued, including the final one without progress.
    pub ticks: u32,
    pub last: Option<Progress>,
    pub elapsed: Duration,
}

pub struct PollCtx<'a, T: PtTarget + ?Sized, C: Clock> {
    target: &'a T,
    clock: &'a C,
    probe: ProbeKind,
    interval: Duration,
    helper: HelperOpts,
    on_progress: &'a mut dyn FnMut(Progress),

    pub ticks: u32,
    pub last: Option<Progress>,
    started: Duration,
    state: Option<PollStates>,
}

impl<'a, T: PtTarget + ?Sized, C: Clock> PollCtx<'a, T, C> {
    pub fn new(
        target: &'a T,
        clock: &'a C,
        probe: ProbeKind,
        interval: Duration,
        helper: HelperOpts,
        on_progress: &'a mut dyn FnMut(Progress),
    ) -> Self {
        let probe = match probe {
            ProbeKind::Auto => ProbeKind::TestUnitReady,
            p => p,
        };
        Self {
            target,
            clock,
            probe,
            interval,
            helper,
            on_progress,
            ticks: 0,
            last: None,
            started: clock.now(),
            state: Some(PollStates::Wait(Wait)),
        }
    }

    fn probe_once(&mut self) -> Result<Option<Progress>, PtError> {
        self.ticks += 1;
        let raw = probe_progress(self.target, self.probe, &self.helper)?;
        Ok(raw.map(|raw| Progress { raw }))
    }
}

#[derive(Debug)]
pub struct Wait;
#[derive(Debug)]
pub struct Probe;

#[derive(Debug)]
pub enum PollStates {
    Wait(Wait),
    Probe(Probe),
}

type PollStepOut = Transition<PollStates, Result<(), PtError>>;

impl<T: PtTarget + ?Sized, C: Clock> StateMachine<PollCtx<'_, T, C>, PollStepOut> for Wait {
    fn step(&self, ctx: &mut PollCtx<'_, T, C>) -> PollStepOut {
        ctx.clock.sleep(ctx.interval);
        Transition::Next(PollStates::Probe(Probe), Ok(()))
    }
}

impl<T: PtTarget + ?Sized, C: Clock> StateMachine<PollCtx<'_, T, C>, PollStepOut> for Probe {
    fn step(&self, ctx: &mut PollCtx<'_, T, C>) -> PollStepOut {
        match ctx.probe_once() {
            Ok(Some(p)) => {
                info!("progress: {p} done");
                ctx.last = Some(p);
                (ctx.on_progress)(p);
                Transition::Next(PollStates::Wait(Wait), Ok(()))
            },
            Ok(None) => Transition::Done(Ok(())),
            Err(e) => Transition::Done(Err(e)),
        }
    }
}

impl<T: PtTarget + ?Sized, C: Clock> StateMachineCtx<PollCtx<'_, T, C>, PollOutcome> for PollCtx<'_, T, C> {
    fn execute(&mut self) -> Result<PollOutcome, PtError> {
        debug!(probe = %self.probe, "polling every {:?}", self.interval);
        loop {
            let Some(state) = self.state.take() else {
                return Err(PtError::syntax("poll state machine has no state"));
            };
            let tr = match state {
                PollStates::Wait(s) => s.step(self),
                PollStates::Probe(s) => s.step(self),
            };

            match tr {
                Transition::Next(next, r) => {
                    r?;
                    self.state = Some(next);
                },
                Transition::Stay(Ok(())) => {},
                Transition::Stay(Err(e)) => return Err(e),
                Transition::Done(r) => {
                    r?;
                    return Ok(PollOutcome {
                        ticks: self.ticks,
                        last: self.last,
                        elapsed: self.clock.now().saturating_sub(self.started),
                    });
                },
            }
        }
    }
}

/// Poll until the device stops reporting progress.
pub fn poll_until_done<T: PtTarget + ?Sized, C: Clock>(
    target: &T,
    clock: &C,
    popts: &PollOptions,
    helper: &HelperOpts,
    on_progress: &mut dyn FnMut(Progress),
) -> Result<PollOutcome, PtError> {
    if popts.interval.is_zero() {
        return Err(PtError::syntax("poll interval must be at least one second"));
    }
    PollCtx::new(target, clock, popts.probe, popts.interval, *helper, on_progress).execute()
}

/// A medium-wide operation that may run with IMMED.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LongOp {
    FormatUnit { fmtpinfo: u8 },
    FormatMedium { verify: bool, format: u8 },
    Sanitize {
        opts: SanitizeOptions,
        overwrite: Option<OverwriteParams>,
    },
}

impl LongOp {
    fn name(&self) -> &'static str {
        match self {
            LongOp::FormatUnit { .. } => "FORMAT UNIT",
            LongOp::FormatMedium { .. } => "FORMAT MEDIUM",
            LongOp::Sanitize { .. } => "SANITIZE",
        }
    }

    /// Probe used for [`ProbeKind::Auto`].
    fn auto_probe(&self) -> ProbeKind {
        match self {
            LongOp::FormatMedium { .. } => ProbeKind::RequestSense,
            _ => ProbeKind::TestUnitReady,
        }
    }
}

/// Submit `op` and, when `immed` is set, poll it to completion.
///
/// Without IMMED the command itself blocks until the device finishes, so
/// the command timeout is raised to [`NON_IMMED_TIMEOUT_SECS`] and nothing
/// is polled.
pub fn run_long_op<T: PtTarget + ?Sized, C: Clock>(
    target: &T,
    op: &LongOp,
    immed: bool,
    clock: &C,
    popts: &PollOptions,
    helper: &HelperOpts,
    on_progress: &mut dyn FnMut(Progress),
) -> Result<PollOutcome, PtError> {
    let submit_opts = if immed {
        *helper
    } else {
        helper.with_timeout(helper.timeout_secs.max(NON_IMMED_TIMEOUT_SECS).min(MAX_TIMEOUT_SECS))
    };
    match op {
        LongOp::FormatUnit { fmtpinfo } => format_unit(target, *fmtpinfo, immed, &submit_opts)?,
        LongOp::FormatMedium { verify, format } => {
            format_medium(target, *verify, immed, *format, &submit_opts)?
        },
        LongOp::Sanitize { opts, overwrite } => {
            let opts = SanitizeOptions { immed, ..*opts };
            sanitize(target, &opts, overwrite.as_ref(), &submit_opts)?
        },
    }
    info!("{} submitted{}", op.name(), if immed { " (IMMED)" } else { "" });

    if !immed || popts.early {
        return Ok(PollOutcome::default());
    }
    let popts = PollOptions {
        probe: match popts.probe {
            ProbeKind::Auto => op.auto_probe(),
            p => p,
        },
        ..*popts
    };
    let outcome = poll_until_done(target, clock, &popts, helper, on_progress)?;
    info!("{} finished after {} probes", op.name(), outcome.ticks);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;
    use crate::{
        control_block::sanitize::SanitizeAction,
        handlers::common::mock::*,
        models::error::ErrorKind,
    };

    fn helper() -> HelperOpts {
        HelperOpts {
            timeout_secs: 5,
            verbose: 0,
            strict: false,
        }
    }

    fn popts(probe: ProbeKind) -> PollOptions {
        PollOptions {
            interval: Duration::from_secs(60),
            probe,
            early: false,
        }
    }

    fn in_progress(raw: u16) -> Reply {
        let [hi, lo] = raw.to_be_bytes();
        check(&[0x72, 0x02, 0x04, 0x04, 0, 0, 0, 8, 0x02, 0x06, 0, 0, 0x80, hi, lo, 0])
    }

    #[test]
    fn percent_is_floored() {
        assert_eq!(Progress { raw: 0x1234 }.to_string(), "7.11%");
        assert_eq!(Progress { raw: 0x89ab }.to_string(), "53.77%");
        assert_eq!(Progress { raw: 0xffff }.hundredths(), 9999);
    }

    #[test]
    fn stops_at_first_probe_without_progress() {
        let t = MockTarget::with(vec![in_progress(0x8000), good(&[]), in_progress(0x9000)]);
        let clock = ManualClock::default();
        let mut seen = Vec::new();
        let out = poll_until_done(&t, &clock, &popts(ProbeKind::TestUnitReady), &helper(), &mut |p| {
            seen.push(p.raw)
        })
        .expect("poll");
        assert_eq!(seen, vec![0x8000]);
        assert_eq!(out.ticks, 2);
        assert_eq!(out.elapsed, Duration::from_secs(120));
        assert_eq!(t.cdbs().len(), 2);
    }

    #[test]
    fn early_skips_polling() {
        let t = MockTarget::with(vec![good(&[])]);
        let clock = ManualClock::default();
        let op = LongOp::Sanitize {
            opts: SanitizeOptions::new(SanitizeAction::CryptoErase),
            overwrite: None,
        };
        let p = PollOptions {
            early: true,
            ..popts(ProbeKind::Auto)
        };
        let out = run_long_op(&t, &op, true, &clock, &p, &helper(), &mut |_| {}).expect("sanitize");
        assert_eq!(out.ticks, 0);
        assert_eq!(clock.sleeps(), 0);
        assert_eq!(t.cdbs(), vec![hex!("48 83 00 00 00 00 00 00 00 00").to_vec()]);
    }

    #[test]
    fn format_medium_polls_with_request_sense() {
        let rs = hex!("70 00 02 00 00 00 00 0a 00 00 00 00 04 04 00 80 10 00");
        let t = MockTarget::with(vec![good(&[]), good(&rs), good(&[0x70, 0, 0, 0, 0, 0, 0, 0x0a])]);
        let clock = ManualClock::default();
        let op = LongOp::FormatMedium {
            verify: false,
            format: 0,
        };
        let out = run_long_op(&t, &op, true, &clock, &popts(ProbeKind::Auto), &helper(), &mut |_| {})
            .expect("format medium");
        assert_eq!(out.last, Some(Progress { raw: 0x1000 }));
        assert_eq!(t.cdbs()[1][0], 0x03);
    }

    #[test]
    fn format_failing_with_medium_error_is_reported() {
        let t = MockTarget::with(vec![
            good(&[]),
            in_progress(0x4000),
            check(&hex!("70 00 03 00 00 00 00 0a 00 00 00 00 31 01 00 00 00 00")),
        ]);
        let clock = ManualClock::default();
        let op = LongOp::FormatUnit { fmtpinfo: 0 };
        let err = run_long_op(&t, &op, true, &clock, &popts(ProbeKind::TestUnitReady), &helper(), &mut |_| {})
            .expect_err("format failed");
        assert_eq!(err.kind, ErrorKind::MediumHard);
        assert_eq!(t.cdbs().len(), 3);
    }

    #[test]
    fn transport_failure_while_polling() {
        let t = MockTarget::with(vec![Reply {
            host_status: 0x01,
            ..Default::default()
        }]);
        let clock = ManualClock::default();
        let err = poll_until_done(&t, &clock, &popts(ProbeKind::TestUnitReady), &helper(), &mut |_| {})
            .expect_err("no connect");
        assert_eq!(err.kind, ErrorKind::Transport);
    }
}
