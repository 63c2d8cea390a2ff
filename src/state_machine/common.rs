// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::models::error::PtError;

pub enum Transition<S, R> {
    Next(S, R),
    Stay(R),
    Done(R),
}

/// One state of a blocking state machine.
pub trait StateMachine<Ctx, Resp>: Sized {
    fn step(&self, ctx: &mut Ctx) -> Resp;
}

/// Drives the states of `Ctx` until one of them reports `Done`.
pub trait StateMachineCtx<Ctx, Out = ()>: Sized {
    fn execute(&mut self) -> Result<Out, PtError>;
}
