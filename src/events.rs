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

//! # EVENTS
//!
//! The asynchronous counterpart of the dynamically-typed source's
//! `EventEmitter` surface (`data`, `connection-established`, `close`,
//! `error`): a plain channel of [`Event`] values, consumed with
//! `mpsc::UnboundedReceiver::recv` instead of callback registration.

use crate::error::RloginError;
use bytes::Bytes;

/// ## EVENT
///
/// One notification raised by a running [`crate::connection::Connection`].
#[derive(Debug)]
pub enum Event {
  /// The server acknowledged the handshake. Raised at most once.
  Established,
  /// A chunk of steady-state data survived control/escape/flow-control
  /// filtering. Never raised with an empty payload.
  Data(Bytes),
  /// The connection was torn down, locally or by the peer. Raised at most
  /// once, and only if the connection had previously reached
  /// [`Event::Established`].
  Close,
  /// A transport-level failure occurred; the connection is no longer
  /// usable.
  Error(RloginError),
}
