// Copyright © 2024 Nathaniel Hardesty
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to
// deal in the Software without restriction, including without limitation the
// rights to use, copy, modify, merge, publish, distribute, sublicense, and/or
// sell copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS
// IN THE SOFTWARE.

//! An asynchronous client for the RLOGIN remote-login protocol ([RFC 1282]).
//!
//! RLOGIN is a single TCP connection (historically port 513) carrying two
//! interleaved things: the user's terminal session, and a handful of
//! in-band control bytes the server uses to flip the connection between
//! "cooked" (line-buffered, XON/XOFF-capable) and "raw" modes, to request
//! the client's current window geometry, and to flush the client's pending
//! output. On top of that, BSD rlogin layers a client-side `~`-escape
//! convention (`~.` to disconnect, and a few others) so a stuck session can
//! always be torn down locally.
//!
//! ```no_run
//! use rlogin::{connect, ConnectionOptionsBuilder, DialerConfig, Event};
//!
//! # async fn run() -> Result<(), rlogin::RloginError> {
//! let options = ConnectionOptionsBuilder::new()
//!   .host("shell.example.com")
//!   .port(513)
//!   .client_username("alice")
//!   .server_username("alice")
//!   .terminal_type("xterm")
//!   .terminal_speed(9600)
//!   .build()?;
//!
//! let (connection, mut events) = connect(&options, None, DialerConfig::default()).await?;
//! while let Some(event) = events.recv().await {
//!   match event {
//!     Event::Data(bytes) => print!("{}", String::from_utf8_lossy(&bytes)),
//!     Event::Close => break,
//!     Event::Error(e) => eprintln!("rlogin error: {e}"),
//!     Event::Established => {}
//!   }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [RFC 1282]: https://www.rfc-editor.org/rfc/rfc1282
//!
//! # Module map
//!
//! - [`options`] — [`ConnectionOptions`]/[`ConnectionOptionsBuilder`] (host,
//!   port, usernames, terminal identity) and [`Properties`] (terminal
//!   geometry and the client escape byte).
//! - [`escape`] — the `~`-escape dispatch table.
//! - [`processor`] — the pure, synchronous byte processor implementing the
//!   protocol's mode flags and filtering rules. No I/O; unit-tested
//!   directly against byte slices.
//! - [`connection`] — [`Connection`], the handle returned to callers, and
//!   the single task that owns the [`processor::Processor`] for a session's
//!   lifetime.
//! - [`dialer`] — [`connect`], which dials the server, performs the
//!   handshake and spawns that task.
//! - [`events`] — [`Event`], the channel payload a caller reads to observe
//!   a session.
//! - [`error`] — [`RloginError`], the crate's single error type.

mod connection;
mod dialer;
mod error;
mod escape;
mod events;
mod options;
mod processor;

pub use connection::Connection;
pub use dialer::{connect, DialerConfig};
pub use error::RloginError;
pub use escape::{EscapeHandler, EscapeOutcome, EscapeTable, SuspendState};
pub use events::Event;
pub use options::{ConnectionOptions, ConnectionOptionsBuilder, Properties};
