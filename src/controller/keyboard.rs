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
    io,
    thread::{self, JoinHandle},
};

use crossbeam_channel::Sender;
use tracing::{info, span, warn, Level};

use super::Event;
use crate::voice::Waveform;

const DETUNE_UP: &str = "detune+";
const DETUNE_DOWN: &str = "detune-";
const DEPTH_UP: &str = "depth+";
const DEPTH_DOWN: &str = "depth-";
const CARRIER: &str = "carrier";
const MODULATOR: &str = "modulator";
const RESET: &str = "reset";
const QUIT: &str = "quit";

/// A controller that adjusts the synth from lines typed on stdin.
#[derive(Default)]
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Parses a single command line.
    fn parse(input: &str) -> Option<Event> {
        let input = input.trim().to_lowercase();
        let mut words = input.split_whitespace();
        let command = words.next()?;
        let argument = words.next();
        if words.next().is_some() {
            return None;
        }

        match (command, argument) {
            (DETUNE_UP, None) => Some(Event::DetuneUp),
            (DETUNE_DOWN, None) => Some(Event::DetuneDown),
            (DEPTH_UP, None) => Some(Event::DepthUp),
            (DEPTH_DOWN, None) => Some(Event::DepthDown),
            (CARRIER, Some(waveform)) => waveform.parse::<Waveform>().ok().map(Event::Carrier),
            (MODULATOR, Some(waveform)) => {
                waveform.parse::<Waveform>().ok().map(Event::Modulator)
            }
            (RESET, None) => Some(Event::Reset),
            (QUIT, None) => Some(Event::Quit),
            _ => None,
        }
    }

    /// Prompts for and handles one line. Returns false once the input is
    /// exhausted.
    fn monitor_io<R, W>(events_tx: &Sender<Event>, mut reader: R, mut writer: W) -> io::Result<bool>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({}, {}, {}, {}, {} <waveform>, {} <waveform>, {}, {}): ",
            DETUNE_UP, DETUNE_DOWN, DEPTH_UP, DEPTH_DOWN, CARRIER, MODULATOR, RESET, QUIT,
        )?;
        writer.flush()?;
        let mut input = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        match Driver::parse(&input) {
            Some(event) => {
                events_tx
                    .send(event)
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            }
            None if input.trim().is_empty() => {}
            None => warn!(input = input.trim(), "Unrecognized input"),
        }
        Ok(true)
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        thread::spawn(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}
            info!("Keyboard input closed.");
            Ok(())
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader, BufWriter};

    use crate::controller::{keyboard::*, Event};
    use crate::voice::Waveform;

    fn get_event(event: &str) -> Result<Option<Event>, io::Error> {
        let (sender, receiver) = crossbeam_channel::bounded::<Event>(1);

        let reader = BufReader::new(event.as_bytes());
        let writer_bytes: Vec<u8> = vec![0; 255];
        let writer = BufWriter::new(writer_bytes);
        assert!(Driver::monitor_io(&sender, reader, writer)?);

        // Force the sender to close.
        drop(sender);
        Ok(receiver.recv().ok())
    }

    #[test]
    fn test_keyboard_events() -> Result<(), io::Error> {
        assert_eq!(Event::DetuneUp, get_event(DETUNE_UP)?.unwrap());
        assert_eq!(Event::DetuneDown, get_event(DETUNE_DOWN)?.unwrap());
        assert_eq!(Event::DepthUp, get_event(DEPTH_UP)?.unwrap());
        assert_eq!(Event::DepthDown, get_event("  DEPTH-\n")?.unwrap());
        assert_eq!(
            Event::Carrier(Waveform::Square),
            get_event("carrier square")?.unwrap()
        );
        assert_eq!(
            Event::Modulator(Waveform::Triangle),
            get_event("modulator triangle")?.unwrap()
        );
        assert_eq!(Event::Reset, get_event(RESET)?.unwrap());
        assert_eq!(Event::Quit, get_event(QUIT)?.unwrap());
        Ok(())
    }

    #[test]
    fn test_unrecognized_input() -> Result<(), io::Error> {
        assert_eq!(None, get_event("unrecognized")?);
        assert_eq!(None, get_event("carrier sawtooth")?);
        assert_eq!(None, get_event("carrier")?);
        assert_eq!(None, get_event("reset now")?);
        assert_eq!(None, get_event("\n")?);
        Ok(())
    }

    #[test]
    fn test_end_of_input() -> Result<(), io::Error> {
        let (sender, _receiver) = crossbeam_channel::bounded::<Event>(1);
        let reader = BufReader::new("".as_bytes());
        assert!(!Driver::monitor_io(&sender, reader, io::sink())?);
        Ok(())
    }
}
