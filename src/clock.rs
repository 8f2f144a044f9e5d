// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Sample-counted engine time.
//!
//! The clock is split into a read side ([`GlobalClock`]) that any thread may
//! clone and a single write side ([`ClockWriter`]) that is moved into the
//! render loop. Time is stored as the bit pattern of an `f64` number of seconds.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Read-only view of the engine clock.
#[derive(Clone, Debug)]
pub struct GlobalClock {
    seconds: Arc<AtomicU64>,
}

/// The only handle that can move the engine clock forward.
#[derive(Debug)]
pub struct ClockWriter {
    seconds: Arc<AtomicU64>,
    sample_rate: u32,
    frames: u64,
}

impl GlobalClock {
    /// Creates a clock at t=0 along with its writer.
    pub fn new(sample_rate: u32) -> (GlobalClock, ClockWriter) {
        let seconds = Arc::new(AtomicU64::new(0.0f64.to_bits()));
        (
            GlobalClock {
                seconds: seconds.clone(),
            },
            ClockWriter {
                seconds,
                sample_rate: sample_rate.max(1),
                frames: 0,
            },
        )
    }

    /// Returns the current engine time in seconds.
    #[inline]
    pub fn now(&self) -> f64 {
        f64::from_bits(self.seconds.load(Ordering::Acquire))
    }
}

impl ClockWriter {
    /// Returns the time of the frame about to be rendered.
    #[inline]
    pub fn now(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }

    /// Advances the clock by exactly one frame and publishes the new time.
    ///
    /// Time is derived from the frame count rather than accumulated, so it
    /// never drifts and never decreases.
    #[inline]
    pub fn advance(&mut self) -> f64 {
        self.frames += 1;
        let now = self.now();
        self.seconds.store(now.to_bits(), Ordering::Release);
        now
    }

    /// Number of frames rendered so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// The fixed time step between frames.
    pub fn time_step(&self) -> f64 {
        1.0 / self.sample_rate as f64
    }
}
