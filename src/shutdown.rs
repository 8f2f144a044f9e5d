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
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use parking_lot::{Condvar, Mutex};
use tracing::info;

/// Why the engine is stopping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reason {
    /// An operator or control surface asked to stop.
    Requested,
    /// A device stopped accepting data.
    DriverFailure(String),
    /// The engine hit an error it can't run past.
    Fatal(String),
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Requested => write!(f, "shutdown requested"),
            Reason::DriverFailure(err) => write!(f, "driver failure: {}", err),
            Reason::Fatal(err) => write!(f, "fatal error: {}", err),
        }
    }
}

#[derive(Debug, PartialEq)]
enum State {
    Running,
    Stopping(Reason),
}

/// Coordinates shutdown between the render thread, the MIDI thread and the
/// control surface. The first reason given wins.
#[derive(Clone)]
pub struct ShutdownHandle {
    state: Arc<Mutex<State>>,
    condvar: Arc<Condvar>,
    /// Lets the render loop poll without taking the lock.
    requested: Arc<AtomicBool>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        ShutdownHandle::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> ShutdownHandle {
        ShutdownHandle {
            state: Arc::new(Mutex::new(State::Running)),
            condvar: Arc::new(Condvar::new()),
            requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns true once shutdown has been requested for any reason.
    #[inline]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// The reason shutdown was requested, if it has been.
    pub fn reason(&self) -> Option<Reason> {
        match &*self.state.lock() {
            State::Running => None,
            State::Stopping(reason) => Some(reason.clone()),
        }
    }

    /// Requests shutdown. Returns false if shutdown was already requested, in
    /// which case the earlier reason is kept.
    pub fn request(&self, reason: Reason) -> bool {
        let mut state = self.state.lock();
        if *state != State::Running {
            return false;
        }

        info!(reason = %reason, "Shutting down.");
        *state = State::Stopping(reason);
        self.requested.store(true, Ordering::Release);
        self.condvar.notify_all();
        true
    }

    /// Blocks until shutdown is requested and returns the reason.
    pub fn wait(&self) -> Reason {
        let mut state = self.state.lock();
        loop {
            if let State::Stopping(reason) = &*state {
                return reason.clone();
            }
            self.condvar.wait(&mut state);
        }
    }
}
