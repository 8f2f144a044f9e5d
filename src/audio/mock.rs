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
    collections::VecDeque,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tracing::{info, span, Level};

use super::{Block, TargetFormat};
use crate::error::EngineError;

const MOCK_CHANNELS: u16 = 2;

#[derive(Default)]
struct State {
    /// Sleep for each block's duration before completing it.
    paced: AtomicBool,
    /// Keep played blocks until the test releases them.
    hold: AtomicBool,
    fail_writes: AtomicBool,
    capture: AtomicBool,

    submitted: AtomicUsize,
    completed: AtomicUsize,
    max_in_flight: AtomicUsize,

    held: Mutex<VecDeque<Block>>,
    captured: Mutex<Vec<Vec<i32>>>,
    completions: Mutex<Option<Sender<Block>>>,
}

impl State {
    fn complete(&self, completions: &Sender<Block>, block: Block) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        // The pool may already be gone during shutdown.
        let _ = completions.send(block);
    }
}

/// A mock device. Plays blocks into the void, optionally at real time.
#[derive(Clone)]
pub struct Device {
    name: String,
    state: Arc<State>,
}

impl Device {
    /// Gets the given mock device. It plays at real time.
    pub fn get(name: &str) -> Device {
        let device = Device {
            name: name.to_string(),
            state: Arc::new(State::default()),
        };
        device.state.paced.store(true, Ordering::Relaxed);
        device
    }

    /// Completes blocks as soon as they're submitted.
    pub fn unpaced(self) -> Device {
        self.state.paced.store(false, Ordering::Relaxed);
        self
    }

    /// Holds played blocks until [`Device::release`] is called.
    pub fn holding(self) -> Device {
        self.state.hold.store(true, Ordering::Relaxed);
        self
    }

    /// Keeps a copy of every submitted block.
    pub fn capturing(self) -> Device {
        self.state.capture.store(true, Ordering::Relaxed);
        self
    }

    /// Makes every following submit fail.
    pub fn fail_writes(&self) {
        self.state.fail_writes.store(true, Ordering::Relaxed);
    }

    /// Returns up to `count` held blocks to the render loop. Returns the
    /// number released.
    pub fn release(&self, count: usize) -> usize {
        let completions = self.state.completions.lock().clone();
        let Some(completions) = completions else {
            return 0;
        };

        let mut released = 0;
        while released < count {
            let block = self.state.held.lock().pop_front();
            match block {
                Some(block) => {
                    self.state.complete(&completions, block);
                    released += 1;
                }
                None => break,
            }
        }
        released
    }

    /// The number of blocks waiting in [`Device::release`].
    pub fn held(&self) -> usize {
        self.state.held.lock().len()
    }

    pub fn submitted(&self) -> usize {
        self.state.submitted.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.state.completed.load(Ordering::SeqCst)
    }

    /// The most blocks ever submitted and not yet completed at once.
    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    /// Every captured block, in submission order.
    pub fn captured(&self) -> Vec<Vec<i32>> {
        self.state.captured.lock().clone()
    }
}

impl super::Device for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn max_channels(&self) -> u16 {
        MOCK_CHANNELS
    }

    fn open(
        &self,
        format: &TargetFormat,
        completions: Sender<Block>,
    ) -> Result<Box<dyn super::Output>, EngineError> {
        info!(device = self.name, format = %format, "Opening mock output.");

        *self.state.completions.lock() = Some(completions.clone());

        let (blocks_tx, blocks_rx) = crossbeam_channel::unbounded::<Block>();
        let state = self.state.clone();
        let block_duration = format.block_duration();
        let name = self.name.clone();
        let player = thread::Builder::new()
            .name(format!("{}-player", self.name))
            .spawn(move || {
                let span = span!(Level::INFO, "mock player");
                let _enter = span.enter();

                for block in blocks_rx.iter() {
                    if state.paced.load(Ordering::Relaxed) {
                        spin_sleep::sleep(block_duration);
                    }
                    if state.hold.load(Ordering::Relaxed) {
                        state.held.lock().push_back(block);
                    } else {
                        state.complete(&completions, block);
                    }
                }
                info!(device = name, "Mock output closed.");
            })
            .map_err(EngineError::driver)?;

        Ok(Box::new(Output {
            state: self.state.clone(),
            blocks: Some(blocks_tx),
            player: Some(player),
        }))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}

struct Output {
    state: Arc<State>,
    blocks: Option<Sender<Block>>,
    player: Option<thread::JoinHandle<()>>,
}

impl super::Output for Output {
    fn submit(&mut self, block: Block) -> Result<(), EngineError> {
        if self.state.fail_writes.load(Ordering::Relaxed) {
            return Err(EngineError::DriverFailure(
                "mock device write failed".to_string(),
            ));
        }

        if self.state.capture.load(Ordering::Relaxed) {
            self.state.captured.lock().push(block.samples().to_vec());
        }

        let submitted = self.state.submitted.fetch_add(1, Ordering::SeqCst) + 1;
        let in_flight = submitted - self.state.completed.load(Ordering::SeqCst);
        self.state.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        let blocks = self
            .blocks
            .as_ref()
            .ok_or_else(|| EngineError::DriverFailure("mock output closed".to_string()))?;
        blocks
            .send(block)
            .map_err(|_| EngineError::DriverFailure("mock player stopped".to_string()))
    }
}

impl Drop for Output {
    fn drop(&mut self) {
        // Closing the channel stops the player.
        self.blocks.take();
        if let Some(player) = self.player.take() {
            let _ = player.join();
        }
        self.state.completions.lock().take();
    }
}
