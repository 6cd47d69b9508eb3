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

//! # CLIENT ESCAPE TABLE
//!
//! A user-side escape mechanism modelled on BSD rlogin's `~`-escapes: once
//! the state machine sees the configured escape byte at a position where
//! watching for it is armed, the following byte is looked up in this table
//! instead of being treated as ordinary data.
//!
//! Handlers close over nothing but the two suspend flags they are allowed to
//! mutate ([`SuspendState`]) and report whether they want the connection to
//! disconnect: boxed callbacks invoked by the state machine on the caller's
//! behalf.

use crate::error::RloginError;
use std::collections::HashMap;

/// ## SUSPEND STATE
///
/// The two mode flags an escape handler is permitted to mutate. Exposed as a
/// narrow view rather than the whole connection so that a user-installed
/// handler cannot reach into unrelated state.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuspendState {
  pub input: bool,
  pub output: bool,
}

/// ## ESCAPE OUTCOME
///
/// What the state machine should do after a handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeOutcome {
  /// Nothing beyond whatever mutation the handler made to [`SuspendState`].
  Continue,
  /// The connection should disconnect once any bytes buffered ahead of the
  /// escape have been flushed.
  Disconnect,
}

/// A zero-argument escape handler, boxed so the table can hold a
/// heterogeneous mix of built-in and user-installed closures.
pub type EscapeHandler = Box<dyn FnMut(&mut SuspendState) -> EscapeOutcome + Send>;

/// ## ESCAPE TABLE
///
/// `byte -> handler` dispatch map. Seeded at construction with the four
/// built-in entries; additional entries may be installed at runtime with
/// [`insert`](Self::insert) / [`insert_str`](Self::insert_str).
pub struct EscapeTable {
  handlers: HashMap<u8, EscapeHandler>,
}

impl EscapeTable {
  /// The `.` escape: disconnect.
  pub const DOT: u8 = 0x2E;
  /// The EOT escape: disconnect.
  pub const EOT: u8 = 0x04;
  /// The SUB escape: toggle `suspend_input` and `suspend_output` together.
  pub const SUB: u8 = 0x1A;
  /// The EOM escape: toggle `suspend_input`, force `suspend_output` off.
  pub const EOM: u8 = 0x19;

  /// ### WITH DEFAULTS
  ///
  /// Builds the table seeded with the four built-in escapes.
  pub fn with_defaults() -> Self {
    let mut table = EscapeTable {
      handlers: HashMap::new(),
    };
    table.insert(Self::DOT, Box::new(|_| EscapeOutcome::Disconnect));
    table.insert(Self::EOT, Box::new(|_| EscapeOutcome::Disconnect));
    table.insert(
      Self::SUB,
      Box::new(|suspend| {
        let toggled = !suspend.input;
        suspend.input = toggled;
        suspend.output = toggled;
        EscapeOutcome::Continue
      }),
    );
    table.insert(
      Self::EOM,
      Box::new(|suspend| {
        suspend.input = !suspend.input;
        suspend.output = false;
        EscapeOutcome::Continue
      }),
    );
    table
  }

  /// ### INSERT
  ///
  /// Installs or replaces the handler for `byte`.
  pub fn insert(&mut self, byte: u8, handler: EscapeHandler) {
    self.handlers.insert(byte, handler);
  }

  /// ### INSERT (STRING FORM)
  ///
  /// Accepts a single-character string, converted by ordinal, matching the
  /// dynamically-typed source's `addClientEscape`. Any other string length
  /// fails with `addClientEscape: invalid string argument`.
  pub fn insert_str(&mut self, key: &str, handler: EscapeHandler) -> Result<(), RloginError> {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
      (Some(c), None) if c.is_ascii() => {
        self.insert(c as u8, handler);
        Ok(())
      }
      _ => Err(RloginError::Validation(
        "addClientEscape: invalid string argument".to_string(),
      )),
    }
  }

  /// ### DISPATCH
  ///
  /// Looks up `byte` and, if found, runs its handler against `suspend`,
  /// returning the handler's outcome. Bytes with no installed handler are
  /// silently dropped by the caller (this returns `None`).
  pub fn dispatch(&mut self, byte: u8, suspend: &mut SuspendState) -> Option<EscapeOutcome> {
    self.handlers.get_mut(&byte).map(|handler| handler(suspend))
  }
}

impl std::fmt::Debug for EscapeTable {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("EscapeTable")
      .field("installed", &self.handlers.keys().collect::<Vec<_>>())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dot_and_eot_disconnect() {
    let mut table = EscapeTable::with_defaults();
    let mut suspend = SuspendState::default();
    assert_eq!(
      table.dispatch(EscapeTable::DOT, &mut suspend),
      Some(EscapeOutcome::Disconnect)
    );
    assert_eq!(
      table.dispatch(EscapeTable::EOT, &mut suspend),
      Some(EscapeOutcome::Disconnect)
    );
  }

  #[test]
  fn sub_toggles_both_in_lockstep() {
    let mut table = EscapeTable::with_defaults();
    let mut suspend = SuspendState::default();
    table.dispatch(EscapeTable::SUB, &mut suspend);
    assert_eq!(suspend, SuspendState { input: true, output: true });
    table.dispatch(EscapeTable::SUB, &mut suspend);
    assert_eq!(suspend, SuspendState { input: false, output: false });
  }

  #[test]
  fn eom_toggles_input_and_forces_output_off() {
    let mut table = EscapeTable::with_defaults();
    let mut suspend = SuspendState { input: false, output: true };
    table.dispatch(EscapeTable::EOM, &mut suspend);
    assert_eq!(suspend, SuspendState { input: true, output: false });
  }

  #[test]
  fn unknown_byte_is_not_dispatched() {
    let mut table = EscapeTable::with_defaults();
    let mut suspend = SuspendState::default();
    assert_eq!(table.dispatch(b'x', &mut suspend), None);
  }

  #[test]
  fn insert_str_rejects_multi_character_strings() {
    let mut table = EscapeTable::with_defaults();
    let err = table
      .insert_str("....", Box::new(|_| EscapeOutcome::Continue))
      .unwrap_err();
    assert_eq!(err.to_string(), "addClientEscape: invalid string argument");
  }

  #[test]
  fn insert_str_accepts_single_character() {
    let mut table = EscapeTable::with_defaults();
    table
      .insert_str("q", Box::new(|_| EscapeOutcome::Disconnect))
      .unwrap();
    let mut suspend = SuspendState::default();
    assert_eq!(
      table.dispatch(b'q', &mut suspend),
      Some(EscapeOutcome::Disconnect)
    );
  }
}
