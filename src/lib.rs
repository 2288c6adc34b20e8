#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
// Allow acronyms like EGL
#![allow(clippy::upper_case_acronyms)]

//! # wlboot: bootstrap a Wayland window
//!
//! This crate connects to a Wayland compositor, creates a single toplevel window and keeps
//! presenting frames to it until the compositor closes it or goes away.
//!
//! ## Structure of the crate
//!
//! - [`wayland`] contains the client side of the protocol: selection of the globals to
//!   bind, the [`Sequencer`](wayland::handshake::Sequencer) driving the configure handshake,
//!   and the [`Session`](wayland::session::Session) tying it to a live connection.
//! - [`backend`] contains the presentation strategies, OpenGL ES through EGL and
//!   shared-memory buffers painted by the CPU.
//! - [`config`] describes the window to create.
//!
//! ## The handshake
//!
//! A surface cannot be presented as soon as it exists. With `xdg_wm_base` the compositor first
//! sends a configure sequence, which the client acknowledges before anything is drawn. Pings
//! have to be answered at any time. The [`Sequencer`](wayland::handshake::Sequencer) never
//! touches the socket itself: it receives events and issues requests through the
//! [`Requests`](wayland::handshake::Requests) trait, so the whole handshake can be exercised
//! without a compositor.
//!
//! ### Logging
//!
//! wlboot makes extensive use of [`tracing`] for its internal logging. The binary installs
//! a subscriber through [`init_logging`], honoring `RUST_LOG`.

pub mod backend;
pub mod config;
mod error;
pub mod utils;
pub mod wayland;

pub use self::error::Error;

/// Install a compact [`tracing`] subscriber, filtered by `RUST_LOG` when it is set
pub fn init_logging() {
    if let Ok(env_filter) = tracing_subscriber::EnvFilter::try_from_default_env() {
        tracing_subscriber::fmt()
            .compact()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt().compact().init();
    }
}
