//! Screen perception and response pipeline.
//!
//! Captures a fixed region of the primary display, runs it through a
//! single-pass object detector, draws the results onto a copy of the frame
//! and publishes it for display, while an input-gated motion controller
//! synthesizes small pointer movements through a hardware relay or software
//! fallback.
//!
//! The `perceptd` binary wires these pieces together; the library crate
//! exposes them individually so each stage can be driven and tested on its
//! own.

pub mod capture;
pub mod config;
pub mod detect;
pub mod frame;
pub mod input;
pub mod inject;
pub mod motion;
pub mod overlay;
pub mod pipeline;

pub use config::PerceptConfig;
pub use frame::Frame;
