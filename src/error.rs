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

//! # ERRORS
//!
//! Encapsulates the error taxonomy used throughout the crate: validation
//! failures raised synchronously at a call site, transport failures
//! surfaced through [`connect`](crate::dialer::connect), and state errors
//! raised by [`Connection::write`](crate::connection::Connection::write) and
//! [`Connection::send_wccs`](crate::connection::Connection::send_wccs).
//!
//! The message text of each variant is contractual where noted — callers and
//! tests may match on it.

use thiserror::Error;

/// ## RLOGIN ERROR
///
/// The single error type returned by every fallible operation in this crate.
#[derive(Error, Debug)]
pub enum RloginError {
  /// ### VALIDATION
  ///
  /// A missing or mistyped construction option, an out-of-range property, or
  /// a malformed [`add_client_escape`](crate::connection::Connection::add_client_escape_str)
  /// argument. Raised synchronously; the receiver is left unchanged.
  #[error("{0}")]
  Validation(String),

  /// ### TRANSPORT
  ///
  /// DNS resolution, TCP connection establishment, or an I/O failure on an
  /// already-established connection.
  #[error("transport error: {0}")]
  Transport(#[from] std::io::Error),

  /// ### TIMEOUT
  ///
  /// The connect timeout elapsed before the server acknowledged the
  /// handshake with its leading zero byte.
  #[error("connect timed out")]
  Timeout,

  /// ### NOT CONNECTED
  ///
  /// [`Connection::write`](crate::connection::Connection::write) or
  /// [`Connection::send_wccs`](crate::connection::Connection::send_wccs) was
  /// called while the connection was not in the CONNECTED state.
  #[error("RLogin client not connected")]
  NotConnected,

  /// ### INPUT SUSPENDED
  ///
  /// [`Connection::write`](crate::connection::Connection::write) was called
  /// while `suspend_input` was set.
  #[error("RLogin.send: input has been suspended.")]
  InputSuspended,
}

impl RloginError {
  /// ### MISSING OPTION
  ///
  /// Builds the contractual message for a missing required construction
  /// option.
  pub(crate) fn missing_option(name: &str) -> Self {
    RloginError::Validation(format!("Missing required option: '{name}'"))
  }

  /// ### INVALID TYPE
  ///
  /// Builds the contractual message for a construction option whose textual
  /// form could not be parsed as the expected type.
  pub(crate) fn invalid_type(name: &str, expected: &str) -> Self {
    RloginError::Validation(format!("Invalid type for '{name}': expected {expected}"))
  }

  /// ### INVALID SETTING
  ///
  /// Builds the contractual message for an out-of-range property or option
  /// value.
  pub(crate) fn invalid_setting(name: &str, value: impl std::fmt::Display) -> Self {
    RloginError::Validation(format!("Invalid '{name}' setting {value}"))
  }

  /// ### INVALID PROPERTY
  pub(crate) fn invalid_property(name: &str) -> Self {
    RloginError::Validation(format!("Invalid property: '{name}'"))
  }
}
