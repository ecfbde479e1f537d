#![forbid(unsafe_code)]

//! Terminal key-input decoding and event dispatch for interactive CLI
//! agents.
//!
//! The pipeline, leaves first:
//!
//! - [`sequence`] — stateless classification of raw escape sequences
//! - [`probe`] — one-shot kitty keyboard protocol detection
//! - [`decoder`] — the stateful decode ladder (paste, drag, shift-Enter)
//! - [`bus`] — subscriber fan-out for decoded events
//! - [`session`] — terminal lifecycle: raw mode in, everything restored out
//!
//! Most applications only need [`session::InputSession`]:
//!
//! ```no_run
//! use std::time::Duration;
//! use keywire::session::InputSession;
//!
//! let mut session = InputSession::with_defaults()?;
//! session.subscribe(|event| println!("{event:?}"));
//! while session.pump(Duration::from_millis(100))? {}
//! # Ok::<(), std::io::Error>(())
//! ```

pub mod bus;
pub mod decoder;
pub mod event;
pub mod probe;
pub mod sequence;

#[cfg(not(target_arch = "wasm32"))]
pub mod session;

pub use event::{Event, KeyCode, KeyEvent, Modifiers, PasteEvent, PasteSource};
