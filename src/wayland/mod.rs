//! Wayland client side of the bootstrap
//!
//! - [`registry`] decides which globals get bound,
//! - [`handshake`] holds the [`Sequencer`](handshake::Sequencer) state machine driving the
//!   configure handshake and the presentation loop,
//! - [`session`] connects the sequencer to a real compositor.

pub mod handshake;
pub mod registry;
pub mod session;
