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
//! A pitch-shifting sample player.
//!
//! A single recorded sample is played back on any of the 88 keys of a piano by varying its
//! playback rate according to equal temperament, with the sample assumed to sound at the
//! reference pitch on key 49 (A4).

pub mod audio;
pub mod config;
pub mod engine;
pub mod loader;
pub mod pitch;
pub mod playsync;
