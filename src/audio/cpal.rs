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
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use parking_lot::Mutex;
use tracing::{debug, error, info, span, Level};

use crate::{
    audio::{Block, Device as AudioDevice, Output as AudioOutput, TargetFormat},
    error::EngineError,
};

/// A cpal output device.
pub struct Device {
    name: String,
    max_channels: u16,
    host_id: cpal::HostId,
    device: cpal::Device,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

/// Plays submitted blocks out of the stream callback, one frame at a time.
struct BlockPlayer {
    queue: Receiver<Block>,
    completions: Sender<Block>,
    current: Option<Block>,
    position: usize,
    channels: usize,
    scale: f32,
    underruns: Arc<AtomicU64>,
}

impl BlockPlayer {
    /// Fills the device buffer. Each mono sample is written to every channel.
    /// Runs out of blocks as silence.
    fn fill<T>(&mut self, data: &mut [T])
    where
        T: cpal::Sample + cpal::FromSample<f32>,
    {
        let mut starved = false;
        for frame in data.chunks_mut(self.channels) {
            let value = match self.next_sample() {
                Some(sample) => sample as f32 / self.scale,
                None => {
                    starved = true;
                    0.0
                }
            };
            let value = T::from_sample(value);
            for channel in frame.iter_mut() {
                *channel = value;
            }
        }
        if starved {
            self.underruns.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn next_sample(&mut self) -> Option<i32> {
        loop {
            if let Some(block) = self.current.as_ref() {
                if let Some(sample) = block.samples().get(self.position) {
                    self.position += 1;
                    return Some(*sample);
                }
            }

            // The current block is done. Give it back and move on.
            if let Some(block) = self.current.take() {
                let _ = self.completions.send(block);
            }
            self.position = 0;
            match self.queue.try_recv() {
                Ok(block) => self.current = Some(block),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return None,
            }
        }
    }
}

/// Records a stream error for the next submit and wakes the stream thread.
fn report_failure(failure: &Mutex<Option<String>>, failed: &Sender<()>, err: String) {
    error!(err = %err, "CPAL output stream error.");
    failure.lock().get_or_insert(err);
    let _ = failed.try_send(());
}

/// Keeps `stream` alive until the output is dropped or the stream fails.
/// Dropping the stream drops its player, which closes the completion channel,
/// so a render loop waiting on a block sees the failure. Returns true if the
/// stream failed.
fn hold_stream<S>(stream: S, stop: &Receiver<()>, failed: &Receiver<()>) -> bool {
    let stream_failed = crossbeam_channel::select! {
        recv(stop) -> _ => false,
        recv(failed) -> msg => msg.is_ok(),
    };
    drop(stream);
    stream_failed
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut player: BlockPlayer,
    failure: Arc<Mutex<Option<String>>>,
    failed: Sender<()>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| player.fill(data),
        move |err| report_failure(&failure, &failed, err.to_string()),
        None,
    )
}

/// An open cpal stream. The stream isn't `Send`, so it lives on its own
/// thread until this output is dropped.
struct Output {
    queue: Option<Sender<Block>>,
    stop: Option<Sender<()>>,
    stream_thread: Option<thread::JoinHandle<()>>,
    failure: Arc<Mutex<Option<String>>>,
    underruns: Arc<AtomicU64>,
}

impl AudioOutput for Output {
    fn submit(&mut self, block: Block) -> Result<(), EngineError> {
        if let Some(err) = self.failure.lock().clone() {
            return Err(EngineError::DriverFailure(err));
        }

        let queue = self
            .queue
            .as_ref()
            .ok_or_else(|| EngineError::DriverFailure("output stream closed".to_string()))?;
        queue
            .send(block)
            .map_err(|_| EngineError::DriverFailure("output stream stopped".to_string()))
    }
}

impl Drop for Output {
    fn drop(&mut self) {
        self.queue.take();
        self.stop.take();
        if let Some(stream_thread) = self.stream_thread.take() {
            let _ = stream_thread.join();
        }
        let underruns = self.underruns.load(Ordering::Relaxed);
        if underruns > 0 {
            info!(underruns, "CPAL output closed.");
        }
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, EngineError> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn AudioDevice> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices.
    fn list_cpal_devices() -> Result<Vec<Device>, EngineError> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout().map_err(EngineError::driver)?;
        let _shh_stderr = shh::stderr().map_err(EngineError::driver)?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host = match cpal::host_from_id(host_id) {
                Ok(host) => host,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to open host"
                    );
                    continue;
                }
            };
            let host_devices = match host.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let output_configs = match device.supported_output_configs() {
                    Ok(output_configs) => output_configs,
                    Err(_) => continue,
                };
                let max_channels = output_configs
                    .map(|output_config| output_config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    let name = match device.name() {
                        Ok(name) => name,
                        Err(_) => continue,
                    };
                    devices.push(Device {
                        name,
                        max_channels,
                        host_id,
                        device,
                    })
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the given cpal device.
    pub fn get(name: &str) -> Result<Device, EngineError> {
        let devices = Device::list_cpal_devices()?;
        if devices.is_empty() {
            return Err(EngineError::DeviceUnavailable { kind: "audio" });
        }

        devices
            .into_iter()
            .find(|device| device.name.trim() == name.trim())
            .ok_or_else(|| EngineError::InvalidDeviceSelection {
                kind: "audio",
                name: name.to_string(),
                reason: "no device found with that name".to_string(),
            })
    }
}

impl AudioDevice for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn max_channels(&self) -> u16 {
        self.max_channels
    }

    fn open(
        &self,
        format: &TargetFormat,
        completions: Sender<Block>,
    ) -> Result<Box<dyn AudioOutput>, EngineError> {
        let span = span!(Level::INFO, "open output (cpal)");
        let _enter = span.enter();

        let sample_format = self
            .device
            .default_output_config()
            .map_err(EngineError::driver)?
            .sample_format();
        let config = cpal::StreamConfig {
            channels: self.max_channels,
            sample_rate: format.sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let (queue_tx, queue_rx) = crossbeam_channel::bounded::<Block>(format.block_count);
        let failure = Arc::new(Mutex::new(None));
        let underruns = Arc::new(AtomicU64::new(0));
        let player = BlockPlayer {
            queue: queue_rx,
            completions,
            current: None,
            position: 0,
            channels: usize::from(self.max_channels.max(1)),
            scale: format.scale() as f32,
            underruns: underruns.clone(),
        };

        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), EngineError>>(1);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let (failed_tx, failed_rx) = crossbeam_channel::bounded::<()>(1);
        let device = self.device.clone();
        let stream_failure = failure.clone();
        let name = self.name.clone();
        let stream_thread = thread::Builder::new()
            .name("cpal-stream".to_string())
            .spawn(move || {
                let stream = match sample_format {
                    cpal::SampleFormat::I16 => {
                        build_stream::<i16>(&device, &config, player, stream_failure, failed_tx)
                    }
                    cpal::SampleFormat::I32 => {
                        build_stream::<i32>(&device, &config, player, stream_failure, failed_tx)
                    }
                    cpal::SampleFormat::F32 => {
                        build_stream::<f32>(&device, &config, player, stream_failure, failed_tx)
                    }
                    other => {
                        let _ = ready_tx.send(Err(EngineError::DriverFailure(format!(
                            "unsupported device sample format {:?}",
                            other
                        ))));
                        return;
                    }
                };

                let stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(EngineError::driver(e)));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(EngineError::driver(e)));
                    return;
                }
                info!(device = name, "CPAL output stream started.");
                let _ = ready_tx.send(Ok(()));

                if hold_stream(stream, &stop_rx, &failed_rx) {
                    error!(device = name, "CPAL output stream failed, closing it.");
                } else {
                    debug!(device = name, "CPAL output stream stopping.");
                }
            })
            .map_err(EngineError::driver)?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = stream_thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = stream_thread.join();
                return Err(EngineError::DriverFailure(
                    "output stream thread exited".to_string(),
                ));
            }
        }

        info!(
            device = self.name,
            channels = self.max_channels,
            format = %format,
            sample_format = ?sample_format,
            "Opened output."
        );

        Ok(Box::new(Output {
            queue: Some(queue_tx),
            stop: Some(stop_tx),
            stream_thread: Some(stream_thread),
            failure,
            underruns,
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::audio::BlockPool;

    fn player(channels: usize, scale: f32) -> (BlockPlayer, Sender<Block>, BlockPool) {
        let (pool, completions) = BlockPool::new(2, 3);
        let (queue_tx, queue_rx) = crossbeam_channel::bounded(2);
        (
            BlockPlayer {
                queue: queue_rx,
                completions,
                current: None,
                position: 0,
                channels,
                scale,
                underruns: Arc::new(AtomicU64::new(0)),
            },
            queue_tx,
            pool,
        )
    }

    #[test]
    fn test_player_duplicates_mono_and_returns_blocks() {
        let (mut player, queue, mut pool) = player(2, i16::MAX as f32);
        let mut block = pool.acquire().unwrap();
        block.samples_mut().copy_from_slice(&[i16::MAX as i32, 0, -(i16::MAX as i32)]);
        queue.send(block).unwrap();

        let mut data = [0.5f32; 6];
        player.fill(&mut data);
        assert_eq!([1.0, 1.0, 0.0, 0.0, -1.0, -1.0], data);

        // The block comes back on the next pull; the rest is silence.
        let mut data = [0.5f32; 2];
        player.fill(&mut data);
        assert_eq!([0.0, 0.0], data);
        assert_eq!(1, player.underruns.load(Ordering::Relaxed));
        assert_eq!(0, pool.in_flight());
    }

    #[test]
    fn test_stream_failure_unblocks_waiting_render_loop() {
        let (player, queue, mut pool) = player(1, 1.0);
        // Every block is queued and the stream has stopped calling back.
        for _ in 0..2 {
            queue.send(pool.acquire().unwrap()).unwrap();
        }

        let failure = Arc::new(Mutex::new(None));
        let (failed_tx, failed_rx) = crossbeam_channel::bounded::<()>(1);
        let (_stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let stream = thread::spawn(move || hold_stream(player, &stop_rx, &failed_rx));

        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        thread::spawn(move || {
            let _ = result_tx.send(pool.acquire().map(|block| block.index()));
        });

        report_failure(&failure, &failed_tx, "device unplugged".to_string());
        assert_eq!(Some("device unplugged".to_string()), failure.lock().clone());

        let result = result_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("render loop stayed blocked after the stream failed");
        assert!(matches!(result, Err(EngineError::DriverFailure(_))));
        assert!(stream.join().unwrap());
    }

    #[test]
    fn test_stopped_stream_is_not_a_failure() {
        let (player, _queue, _pool) = player(1, 1.0);
        let (_failed_tx, failed_rx) = crossbeam_channel::bounded::<()>(1);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        drop(stop_tx);
        assert!(!hold_stream(player, &stop_rx, &failed_rx));
    }

    #[test]
    fn test_player_spans_blocks() {
        let (mut player, queue, mut pool) = player(1, 4.0);
        for value in [2, 4] {
            let mut block = pool.acquire().unwrap();
            block.samples_mut().fill(value);
            queue.send(block).unwrap();
        }

        let mut data = [0f32; 5];
        player.fill(&mut data);
        assert_eq!([0.5, 0.5, 0.5, 1.0, 1.0], data);
        assert_eq!(0, player.underruns.load(Ordering::Relaxed));
    }
}
