//! `gammy` is the Rust crate implementing adaptive screen brightness and color temperature
//! through the display gamma ramp.
//!
//! # Structure
//!
//! Every tick of the [control loop](control::ControlLoop) captures the screen through a
//! [platform](platform) backend, reduces it to a brightness estimate, combines it with the
//! day/night [schedule](schedule), builds a [gamma ramp](ramp) and writes it to the display. The
//! ramp that was present at startup is restored on exit by the [`ramp::RampStore`].
//!
//! # License
//!
//! This source code is released under the [MIT-License](https://opensource.org/licenses/MIT)

#[macro_use]
extern crate tracing;

pub mod control;
pub mod image;
pub mod models;
pub mod platform;
pub mod ramp;
pub mod schedule;
