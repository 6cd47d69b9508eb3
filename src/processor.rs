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

//! # STATE MACHINE CORE
//! **The hard part of this crate.**
//!
//! [`Processor`] is a pure, synchronous, per-connection byte processor: it
//! owns the handshake/cooked/raw/suspend mode flags and the
//! [`EscapeTable`], and turns an inbound byte chunk into an
//! [`InboundEffect`] (data to emit upward, WCCS replies to send, whether to
//! disconnect) or an outbound byte buffer into an [`OutboundEffect`]
//! (segments to write to the transport, whether to disconnect). It performs
//! no I/O of its own — that is [`crate::connection::Connection`]'s job,
//! which keeps session/mode state (this type) cleanly separated from the
//! TCP connection itself.
//!
//! Being I/O-free, every round-trip scenario worth covering can be (and is,
//! in `tests`) exercised directly against byte slices with no socket
//! involved.

use crate::escape::{EscapeOutcome, EscapeTable, SuspendState};
use crate::options::Properties;
use bytes::{Bytes, BytesMut};

const DISCARD: u8 = 0x02;
const RAW: u8 = 0x10;
const DC1_XON: u8 = 0x11;
const COOKED: u8 = 0x20;
const DC3_XOFF: u8 = 0x13;
const WINDOW: u8 = 0x80;
const CR: u8 = 0x0D;
const LF: u8 = 0x0A;
const CAN: u8 = 0x18;

/// ## INBOUND EFFECT
///
/// What [`Processor::process_inbound`] wants the caller to do with a chunk
/// of bytes it has just processed.
#[derive(Default, Debug)]
pub struct InboundEffect {
  /// The handshake's leading zero byte was just observed; raise
  /// `connection-established` before anything else in this chunk.
  pub established: bool,
  /// User-visible data to emit, preserving the order of non-filtered bytes.
  /// `None` means `suspend_output` was set and the chunk's data is dropped;
  /// `Some` (possibly empty) means it should be raised as a `data` event.
  pub data: Option<Bytes>,
  /// How many WCCS frames the caller should write in reply (0 or more; a
  /// pathological chunk could contain more than one `WINDOW` byte).
  pub wccs_requests: u32,
  /// The connection should be torn down: either an escape handler asked for
  /// it, or the server rejected the handshake.
  pub disconnect: bool,
}

/// ## OUTBOUND EFFECT
///
/// What [`Processor::process_outbound`] wants the caller to write to the
/// transport, in order, and whether to disconnect once it has.
#[derive(Default, Debug)]
pub struct OutboundEffect {
  pub segments: Vec<Bytes>,
  pub disconnect: bool,
}

/// ## PROCESSOR
///
/// Owns every mode flag plus the [`EscapeTable`]. See the module docs for
/// why this type performs no I/O.
pub struct Processor {
  connected: bool,
  cooked: bool,
  suspend: SuspendState,
  watch_for_client_escape: bool,
  client_has_escaped: bool,
  escape_byte: u8,
  escapes: EscapeTable,
}

impl Processor {
  /// Starts not connected, cooked, nothing suspended, watching for the
  /// escape byte from the very first byte of the stream.
  pub fn new(escape_byte: u8) -> Self {
    Processor {
      connected: false,
      cooked: true,
      suspend: SuspendState::default(),
      watch_for_client_escape: true,
      client_has_escaped: false,
      escape_byte,
      escapes: EscapeTable::with_defaults(),
    }
  }

  pub fn is_connected(&self) -> bool {
    self.connected
  }

  pub fn is_cooked(&self) -> bool {
    self.cooked
  }

  pub fn is_suspend_input(&self) -> bool {
    self.suspend.input
  }

  pub fn is_suspend_output(&self) -> bool {
    self.suspend.output
  }

  pub fn set_client_escape(&mut self, byte: u8) {
    self.escape_byte = byte;
  }

  pub fn escapes_mut(&mut self) -> &mut EscapeTable {
    &mut self.escapes
  }

  /// Marks the connection closed. Idempotent: calling this more than once
  /// has no further effect, matching `handleDisconnect`'s no-op-if-already-
  /// not-connected rule.
  pub fn mark_disconnected(&mut self) -> bool {
    let was_connected = self.connected;
    self.connected = false;
    was_connected
  }

  /// ### PROCESS INBOUND
  ///
  /// While not yet connected, looks only for the handshake's leading zero
  /// byte; once connected (possibly within the same call, if the ack and
  /// trailing data share a chunk) demultiplexes control bytes, escape
  /// sequences and cooked-mode flow control out of the byte stream.
  pub fn process_inbound(&mut self, chunk: &[u8]) -> InboundEffect {
    let mut effect = InboundEffect::default();
    let mut rest = chunk;

    if !self.connected {
      match rest.first() {
        Some(0x00) => {
          self.connected = true;
          effect.established = true;
          rest = &rest[1..];
          if rest.is_empty() {
            return effect;
          }
        }
        Some(_) => {
          // Server rejected the handshake: disconnect and stop. No data
          // from a not-yet-established connection is ever examined.
          effect.disconnect = true;
          return effect;
        }
        None => return effect,
      }
    }

    self.process_steady_state(rest, &mut effect);
    effect
  }

  fn process_steady_state(&mut self, bytes: &[u8], effect: &mut InboundEffect) {
    let mut emit = BytesMut::with_capacity(bytes.len());
    let mut previous: Option<u8> = None;

    for &b in bytes {
      match b {
        DISCARD => {
          emit.clear();
          previous = Some(b);
          continue;
        }
        RAW if self.cooked => {
          self.cooked = false;
          self.suspend.output = false;
          previous = Some(b);
          continue;
        }
        COOKED if !self.cooked => {
          self.cooked = true;
          previous = Some(b);
          continue;
        }
        WINDOW => {
          effect.wccs_requests += 1;
          previous = Some(b);
          continue;
        }
        _ => {}
      }

      if self.watch_for_client_escape && b == self.escape_byte {
        self.watch_for_client_escape = false;
        self.client_has_escaped = true;
        previous = Some(b);
        continue;
      }
      if self.client_has_escaped {
        self.client_has_escaped = false;
        if let Some(EscapeOutcome::Disconnect) = self.escapes.dispatch(b, &mut self.suspend) {
          effect.disconnect = true;
        }
        previous = Some(b);
        continue;
      }

      if self.cooked && (b == DC1_XON || b == DC3_XOFF) {
        self.suspend.output = b == DC3_XOFF;
        previous = Some(b);
        continue;
      }

      self.watch_for_client_escape = (previous == Some(CR) && b == LF) || b == CAN;

      emit.extend_from_slice(&[b]);
      previous = Some(b);
    }

    effect.data = if self.suspend.output {
      None
    } else {
      Some(emit.freeze())
    };
  }

  /// ### PROCESS OUTBOUND
  ///
  /// Mirrors the inbound escape and cooked-mode-flow-control steps over
  /// data the caller wants to send, so a local `~.` cleanly flushes
  /// preceding data before disconnecting. Control bytes (`DISCARD`/`RAW`/
  /// `COOKED`/`WINDOW`) are a server-to-client concept only and are never
  /// filtered out of outbound data.
  pub fn process_outbound(&mut self, bytes: &[u8]) -> OutboundEffect {
    let mut effect = OutboundEffect::default();
    let mut temp = BytesMut::with_capacity(bytes.len());

    for &b in bytes {
      if self.suspend.input {
        // Became suspended mid-buffer (or was already): drop the rest.
        temp.clear();
        return effect;
      }

      if self.watch_for_client_escape && b == self.escape_byte {
        self.watch_for_client_escape = false;
        self.client_has_escaped = true;
        continue;
      }
      if self.client_has_escaped {
        self.client_has_escaped = false;
        if let Some(outcome) = self.escapes.dispatch(b, &mut self.suspend) {
          if !temp.is_empty() {
            effect.segments.push(temp.split().freeze());
          }
          if outcome == EscapeOutcome::Disconnect {
            effect.disconnect = true;
            return effect;
          }
        }
        continue;
      }

      if self.cooked && (b == DC1_XON || b == DC3_XOFF) {
        self.suspend.output = b == DC3_XOFF;
        continue;
      }

      self.watch_for_client_escape = false;
      temp.extend_from_slice(&[b]);
    }

    if !self.suspend.input && !temp.is_empty() {
      effect.segments.push(temp.freeze());
    }
    effect
  }
}

/// ### ENCODE WCCS
///
/// `FF FF 73 73 <rows:u16-LE> <columns:u16-LE> <pixelsX:u16-LE> <pixelsY:u16-LE>`
pub fn encode_wccs(properties: &Properties) -> [u8; 12] {
  let mut frame = [0u8; 12];
  frame[0..4].copy_from_slice(&[0xFF, 0xFF, 0x73, 0x73]);
  frame[4..6].copy_from_slice(&properties.rows().to_le_bytes());
  frame[6..8].copy_from_slice(&properties.columns().to_le_bytes());
  frame[8..10].copy_from_slice(&properties.pixels_x().to_le_bytes());
  frame[10..12].copy_from_slice(&properties.pixels_y().to_le_bytes());
  frame
}

#[cfg(test)]
mod tests {
  use super::*;

  fn processor() -> Processor {
    Processor::new(b'~')
  }

  #[test]
  fn handshake_ack_alone() {
    let mut p = processor();
    let effect = p.process_inbound(&[0x00]);
    assert!(effect.established);
    assert!(p.is_connected());
    assert_eq!(effect.data, Some(Bytes::new()));
  }

  #[test]
  fn handshake_ack_plus_data_in_same_chunk() {
    let mut p = processor();
    let effect = p.process_inbound(b"\x00Welcome");
    assert!(effect.established);
    assert_eq!(effect.data.as_deref(), Some(&b"Welcome"[..]));
  }

  #[test]
  fn handshake_rejection_disconnects_without_established() {
    let mut p = processor();
    let effect = p.process_inbound(&[0x01, b'x']);
    assert!(!effect.established);
    assert!(effect.disconnect);
    assert!(!p.is_connected());
  }

  #[test]
  fn raw_mode_flow_scenario() {
    let mut p = processor();
    p.process_inbound(&[0x00]);
    let effect = p.process_inbound(b"Begin\x10Start\x11Stop\x13End");
    assert_eq!(effect.data.as_deref(), Some(&b"BeginStart\x11Stop\x13End"[..]));
    assert!(!p.is_cooked());
  }

  #[test]
  fn cooked_xon_xoff_scenario() {
    let mut p = processor();
    p.process_inbound(&[0x00]);
    let effect = p.process_inbound(b"Begin\x11Start\x13Stop\x11End");
    assert_eq!(effect.data.as_deref(), Some(&b"BeginStartStopEnd"[..]));
    assert!(p.is_cooked());
  }

  #[test]
  fn window_request_counts_and_does_not_emit() {
    let mut p = processor();
    p.process_inbound(&[0x00]);
    let effect = p.process_inbound(&[0x80]);
    assert_eq!(effect.wccs_requests, 1);
    assert_eq!(effect.data, Some(Bytes::new()));
  }

  #[test]
  fn discard_clears_only_current_chunk_pending_emit() {
    let mut p = processor();
    p.process_inbound(&[0x00]);
    let effect = p.process_inbound(b"abc\x02def");
    assert_eq!(effect.data.as_deref(), Some(&b"def"[..]));
  }

  #[test]
  fn mode_toggle_noop_emits_byte_as_data() {
    let mut p = processor();
    p.process_inbound(&[0x00]);
    // Already cooked: 0x20 is a no-op and is emitted as data.
    let effect = p.process_inbound(&[0x20]);
    assert_eq!(effect.data.as_deref(), Some(&[0x20][..]));
    assert!(p.is_cooked());
  }

  #[test]
  fn escape_only_honoured_at_armed_position() {
    let mut p = processor();
    p.process_inbound(&[0x00]);
    // '~' at start of stream is armed; '.' after it disconnects.
    let effect = p.process_outbound(b"~.");
    assert!(effect.disconnect);
    assert!(effect.segments.is_empty());
  }

  #[test]
  fn escape_byte_not_armed_is_literal() {
    let mut p = processor();
    p.process_inbound(&[0x00]);
    // First byte 'a' disarms the initial watch; '~' that follows is literal.
    let effect = p.process_outbound(b"a~.");
    assert!(!effect.disconnect);
    assert_eq!(effect.segments, vec![Bytes::from_static(b"a~.")]);
  }

  #[test]
  fn outbound_flushes_before_disconnect_handler() {
    let mut p = processor();
    p.process_inbound(&[0x00]);
    p.process_outbound(b"Hello");
    let effect = p.process_outbound(b"World~\x2E");
    assert_eq!(effect.segments, vec![Bytes::from_static(b"World")]);
    assert!(effect.disconnect);
  }

  #[test]
  fn outbound_drops_remainder_once_suspend_input_set() {
    let mut p = processor();
    p.process_inbound(&[0x00]);
    let effect = p.process_outbound(&[b'~', EscapeTable::EOM, b'x', b'y']);
    assert!(effect.segments.is_empty());
    assert!(p.is_suspend_input());
  }

  #[test]
  fn wccs_frame_matches_defaults() {
    let properties = Properties::default();
    let frame = encode_wccs(&properties);
    assert_eq!(
      frame,
      [0xFF, 0xFF, 0x73, 0x73, 0x18, 0x00, 0x50, 0x00, 0x80, 0x02, 0xE0, 0x01]
    );
  }
}
