// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! JPU run state machine.
//!
//! The JPU streams coded data through two reload segments in the DMA window,
//! swapping between them ping-pong style. Every interrupt is turned into an
//! [`Event`] and fed through [`step`], a pure function which decides the next
//! [`State`], which segments are ready for transfer and which register
//! commands the run loop must issue. The encode and decode loops own the
//! side effects.

use crate::{
    context::{LINEBUFFER_HEIGHT, RELOAD_SIZE},
    error::Result,
    mmio::RegisterFile,
    regs::{Interrupts, JCCMD, JCCMD_END, JCCMD_RESET, JCDERR, JINTS},
    uio::DeviceNode,
};
use bitflags::bitflags;
use std::time::Duration;
use tracing::trace;

/// One of the two reload segments.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    First,
    Second,
}

impl Segment {
    pub fn other(self) -> Self {
        match self {
            Segment::First => Segment::Second,
            Segment::Second => Segment::First,
        }
    }

    /// Bit of this segment in a ready mask.
    pub fn mask(self) -> u8 {
        match self {
            Segment::First => 1,
            Segment::Second => 2,
        }
    }

    /// Byte offset of the segment in the DMA window.
    pub fn offset(self) -> usize {
        match self {
            Segment::First => 0,
            Segment::Second => RELOAD_SIZE,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    Start,
    Running(Segment),
    End,
}

bitflags! {
    /// Mode of one operation.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct OpFlags: u32 {
        const ENCODE = 1 << 0;
        const RELOAD = 1 << 1;
        /// Source strips are staged through the line buffers.
        const LINE_BUFFER = 1 << 2;
        /// Line buffers are filled by the VEU.
        const CONVERT = 1 << 3;
        /// Line buffers are filled by the CPU.
        const SOFT_CONVERT = 1 << 4;
    }
}

bitflags! {
    /// Register work requested by a transition.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct Actions: u32 {
        /// Kick the engine.
        const START = 1 << 0;
        /// Hand the ready segments back to the engine.
        const RELOAD = 1 << 1;
        /// Fill line buffer 1 with the next strip.
        const REFILL_LB0 = 1 << 2;
        /// Fill line buffer 2 with the next strip.
        const REFILL_LB1 = 1 << 3;
        /// Decode: program the output from the parsed header.
        const CONFIGURE_OUTPUT = 1 << 4;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Synthetic first event, nothing has been started yet.
    Begin,
    Interrupt { ints: Interrupts, error: u32 },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub next: State,
    /// Segments ready for transfer to (encode) or from (decode) the caller.
    pub ready: u8,
    /// Segment which was current when the event arrived, it is the oldest.
    pub from: Segment,
    pub actions: Actions,
    pub error: u32,
}

impl Transition {
    fn idle(state: State) -> Self {
        Self {
            next: state,
            ready: 0,
            from: Segment::First,
            actions: Actions::empty(),
            error: 0,
        }
    }

    /// Ready segments, oldest first.
    pub fn ready_segments(&self) -> impl Iterator<Item = Segment> + '_ {
        [self.from, self.from.other()]
            .into_iter()
            .filter(move |s| self.ready & s.mask() != 0)
    }
}

/// Computes the reaction to `event` in `state`.
pub fn step(state: State, event: &Event, flags: OpFlags) -> Transition {
    let encode = flags.contains(OpFlags::ENCODE);

    match (state, *event) {
        (State::Start, Event::Begin) => {
            let mut actions = Actions::START;
            if flags.contains(OpFlags::LINE_BUFFER) {
                actions |= Actions::REFILL_LB0 | Actions::REFILL_LB1;
            }
            Transition {
                next: State::Running(Segment::First),
                // the decoder needs both segments primed before it starts
                ready: if encode { 0 } else { 3 },
                from: Segment::First,
                actions,
                error: 0,
            }
        }
        (State::Running(current), Event::Interrupt { ints, error }) => {
            let mut segment = current;
            let mut ready = 0;
            let mut actions = Actions::empty();

            if ints.contains(Interrupts::LINEBUF0) {
                actions |= Actions::REFILL_LB0;
            }
            if ints.contains(Interrupts::LINEBUF1) {
                actions |= Actions::REFILL_LB1;
            }

            let swapped = if encode {
                Interrupts::LOADED
            } else {
                Interrupts::RELOAD
            };
            if ints.contains(swapped) {
                ready |= segment.mask();
                segment = segment.other();
                actions |= Actions::RELOAD;
            }

            if !encode && ints.contains(Interrupts::HEADER) {
                actions |= Actions::CONFIGURE_OUTPUT;
            }

            let finished = ints.contains(Interrupts::ERROR)
                || (encode && ints.contains(Interrupts::TRANSFER_DONE))
                || (!encode && ints.contains(Interrupts::DONE));

            if finished {
                if encode && ints.contains(Interrupts::TRANSFER_DONE) {
                    // the final, partially filled segment
                    ready |= segment.mask();
                }
                return Transition {
                    next: State::End,
                    ready,
                    from: current,
                    actions: Actions::empty(),
                    error,
                };
            }

            Transition {
                next: State::Running(segment),
                ready,
                from: current,
                actions,
                error: 0,
            }
        }
        (state, _) => Transition::idle(state),
    }
}

/// Source strips for line buffer mode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Strips {
    /// Physical address of the first line.
    pub source: u64,
    /// Bytes between the starts of consecutive strips.
    pub increment: u64,
    pub height: u32,
    pub next: u32,
}

impl Strips {
    pub fn new(source: u64, pitch: u32, height: u32) -> Self {
        Self {
            source,
            increment: pitch as u64 * LINEBUFFER_HEIGHT as u64,
            height,
            next: 0,
        }
    }

    /// Number of strips in the frame.
    pub fn total(&self) -> u32 {
        self.height.div_ceil(LINEBUFFER_HEIGHT)
    }
}

impl Iterator for Strips {
    /// Address and line count of the next strip.
    type Item = (u64, u32);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.total() {
            return None;
        }
        let first = self.next * LINEBUFFER_HEIGHT;
        let lines = (self.height - first).min(LINEBUFFER_HEIGHT);
        let addr = self.source + self.next as u64 * self.increment;
        self.next += 1;
        Some((addr, lines))
    }
}

/// Per-call state of one encode or decode.
#[derive(Debug)]
pub struct Operation {
    pub state: State,
    pub flags: OpFlags,
    pub ready: u8,
    /// Bytes delivered to the sink (encode) or consumed from the source
    /// (decode).
    pub transferred: usize,
    pub strips: Option<Strips>,
    pub error: u32,
}

impl Operation {
    pub fn new(flags: OpFlags, strips: Option<Strips>) -> Self {
        Self {
            state: State::Start,
            flags,
            ready: 0,
            transferred: 0,
            strips,
            error: 0,
        }
    }

    /// Advances the state machine by one event.
    pub fn apply(&mut self, event: &Event) -> Transition {
        let t = step(self.state, event, self.flags);
        trace!("{:?} + {:?} -> {:?}", self.state, event, t);
        self.state = t.next;
        self.ready = t.ready;
        if t.next == State::End {
            self.error = t.error;
        }
        t
    }

    pub fn is_done(&self) -> bool {
        self.state == State::End
    }
}

/// Interrupt plumbing shared by the encode and decode loops.
pub struct Engine<'a> {
    pub regs: &'a dyn RegisterFile,
    pub node: &'a dyn DeviceNode,
    pub timeout: Option<Duration>,
}

impl Engine<'_> {
    pub fn reset(&self) {
        self.regs.write32(JCCMD, JCCMD_RESET);
    }

    /// Blocks for the next interrupt and acknowledges it.
    pub fn wait_event(&self) -> Result<Event> {
        self.node.enable_interrupt()?;
        self.node.wait_interrupt(self.timeout)?;

        let ints = Interrupts::from_bits_truncate(self.regs.read32(JINTS));
        self.regs.write32(JINTS, !ints.bits() & Interrupts::all().bits());

        let mut error = 0;
        if ints.intersects(Interrupts::ERROR | Interrupts::DONE | Interrupts::TRANSFER_DONE) {
            error = self.regs.read32(JCDERR);
            self.regs.write32(JCCMD, JCCMD_END);
        }

        trace!("interrupt {ints:?} error 0x{error:x}");
        Ok(Event::Interrupt { ints, error })
    }

    /// Stops the engine after an aborted run.
    pub fn abort(&self) {
        self.regs.write32(JCCMD, JCCMD_END);
    }
}
