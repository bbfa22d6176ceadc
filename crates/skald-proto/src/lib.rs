//! # skald-proto
//!
//! Wire-level primitives for the skald chat bot: the [`Event`] value type
//! exchanged with chat backends, the [`Classifier`] that sorts raw inbound
//! lines into their recognized shapes, and a tokio codec for
//! delimiter-framed lines.
//!
//! ## Quick Start
//!
//! ```rust
//! use skald_proto::{Classifier, Event, Line};
//!
//! let classifier = Classifier::new().unwrap();
//!
//! match classifier.classify(":nick!u@h PRIVMSG #rust :hello\r\n") {
//!     Line::Addressed { sender, command, receiver, text } => {
//!         assert_eq!(command, "PRIVMSG");
//!         assert_eq!(receiver, "#rust");
//!         assert_eq!(text, "hello");
//!         assert_eq!(sender, "nick!u@h");
//!     }
//!     _ => unreachable!(),
//! }
//!
//! // Outbound events serialize themselves at send time.
//! assert_eq!(Event::join("#rust").to_line(), "JOIN #rust\n");
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod classify;
pub mod error;
pub mod event;
pub mod line;

pub use classify::{Classifier, Line};
pub use error::ProtocolError;
pub use event::Event;
pub use line::LineCodec;
