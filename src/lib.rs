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
pub mod audio;
pub mod clock;
pub mod config;
pub mod controller;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod midi;
pub mod mixer;
pub mod note;
pub mod registry;
pub mod scheduler;
pub mod shutdown;
pub mod tunables;
pub mod voice;

#[cfg(test)]
mod testutil;
