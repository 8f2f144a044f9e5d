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

//! The real-time render loop.
//!
//! Each pass takes the next block from the pool, waiting for the device to
//! hand it back if it's still in flight, renders one frame per sample into
//! it, and submits it. Waiting on the pool is the only place the loop
//! blocks, which ties the render rate to the rate the device plays at.

use std::thread;

use tracing::{error, info, span, Level};

use crate::{
    audio::{
        thread_priority::{
            configure_render_thread_priority, render_thread_priority, rt_audio_enabled,
        },
        BlockPool, Output, TargetFormat,
    },
    clock::ClockWriter,
    error::EngineError,
    mixer::{encode, FrameSource},
    shutdown::{Reason, ShutdownHandle},
};

pub struct BlockScheduler {
    clock: ClockWriter,
    pool: BlockPool,
    output: Box<dyn Output>,
    source: Option<Box<dyn FrameSource>>,
    format: TargetFormat,
    shutdown: ShutdownHandle,
}

impl BlockScheduler {
    /// Creates a scheduler with nothing to render. Call
    /// [`BlockScheduler::with_source`] before running it.
    pub fn new(
        clock: ClockWriter,
        pool: BlockPool,
        output: Box<dyn Output>,
        format: TargetFormat,
        shutdown: ShutdownHandle,
    ) -> BlockScheduler {
        BlockScheduler {
            clock,
            pool,
            output,
            source: None,
            format,
            shutdown,
        }
    }

    /// Sets the generator that produces each frame.
    pub fn with_source(mut self, source: Box<dyn FrameSource>) -> BlockScheduler {
        self.source = Some(source);
        self
    }

    /// Runs on a dedicated, raised-priority thread.
    pub fn spawn(self) -> Result<thread::JoinHandle<Result<(), EngineError>>, EngineError> {
        let priority = render_thread_priority();
        let rt_audio = rt_audio_enabled();
        thread::Builder::new()
            .name("render".to_string())
            .spawn(move || {
                configure_render_thread_priority(priority, rt_audio);
                self.run()
            })
            .map_err(EngineError::driver)
    }

    /// Renders until shutdown is requested. Shutdown is checked once per
    /// block, so the block being rendered is always finished and submitted.
    pub fn run(mut self) -> Result<(), EngineError> {
        let span = span!(Level::INFO, "render loop");
        let _enter = span.enter();

        let Some(mut source) = self.source.take() else {
            error!("Render loop has no sample generator, refusing to start.");
            self.shutdown
                .request(Reason::Fatal(EngineError::MissingGenerator.to_string()));
            return Err(EngineError::MissingGenerator);
        };

        info!(
            format = %self.format,
            latency = ?self.format.latency(),
            time_step = self.clock.time_step(),
            "Render loop started."
        );

        let scale = self.format.scale();
        let mut blocks: u64 = 0;
        while !self.shutdown.is_requested() {
            let mut block = match self.pool.acquire() {
                Ok(block) => block,
                Err(e) => return Err(self.fail(e)),
            };

            for sample in block.samples_mut() {
                *sample = encode(source.next_frame(self.clock.now()), scale);
                self.clock.advance();
            }

            if let Err(e) = self.output.submit(block) {
                return Err(self.fail(e));
            }
            blocks += 1;
        }

        info!(
            blocks,
            frames = self.clock.frames(),
            seconds = self.clock.now(),
            "Render loop stopped."
        );
        Ok(())
    }

    /// Reports a device failure to the rest of the engine.
    fn fail(&self, err: EngineError) -> EngineError {
        error!(err = %err, "Audio output failed, stopping render loop.");
        let reason = match &err {
            EngineError::DriverFailure(msg) => Reason::DriverFailure(msg.clone()),
            other => Reason::Fatal(other.to_string()),
        };
        self.shutdown.request(reason);
        err
    }
}
