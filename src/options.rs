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

//! # CONNECTION OPTIONS AND PROPERTIES
//!
//! [Connection Options] are the immutable parameters supplied at
//! construction time (host, port, usernames, terminal identity).
//! [Properties] are the mutable, validated terminal-geometry and
//! client-escape settings consulted at connect time and by
//! [`send_wccs`](crate::connection::Connection::send_wccs).
//!
//! [Connection Options] has required fields with no sensible default, so
//! it is assembled through [`ConnectionOptionsBuilder`], a plain builder
//! validated at [`build`](ConnectionOptionsBuilder::build) time, rather
//! than through [`Default`] the way [Properties] is.
//!
//! [Connection Options]: ConnectionOptions
//! [Properties]:         Properties
//! [Connect Procedure]:  crate::dialer::connect

use crate::error::RloginError;

/// ## CONNECTION OPTIONS
///
/// Immutable after construction. See [`ConnectionOptionsBuilder`] for how to
/// build one.
#[derive(Clone, Debug)]
pub struct ConnectionOptions {
  pub host: String,
  pub port: u16,
  pub client_username: String,
  pub server_username: String,
  pub terminal_type: String,
  pub terminal_speed: u32,
}

/// ## CONNECTION OPTIONS BUILDER
///
/// Assembles a [`ConnectionOptions`], validating presence, non-emptiness and
/// range at [`build`](Self::build) time rather than at each setter — matching
/// the contract that invalid input leaves prior state unchanged, since there
/// is no prior state for a builder to corrupt.
///
/// The `_str` setters exist for callers that receive the client's connection
/// options as text (a config file, a CLI) rather than already-typed values;
/// they parse and map failures to the same
/// `Invalid type for 'X': expected <kind>` message the dynamically-typed
/// source implementation raises when given an option of the wrong type.
#[derive(Default, Debug)]
pub struct ConnectionOptionsBuilder {
  host: Option<String>,
  port: Option<u16>,
  client_username: Option<String>,
  server_username: Option<String>,
  terminal_type: Option<String>,
  terminal_speed: Option<u32>,
}

impl ConnectionOptionsBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn host(mut self, host: impl Into<String>) -> Self {
    self.host = Some(host.into());
    self
  }

  pub fn port(mut self, port: u16) -> Self {
    self.port = Some(port);
    self
  }

  /// Parses `port` from its textual form, failing with the contractual
  /// `Invalid type for 'port': expected integer` message on a bad parse.
  pub fn port_str(mut self, port: &str) -> Result<Self, RloginError> {
    self.port = Some(
      port
        .parse()
        .map_err(|_| RloginError::invalid_type("port", "integer"))?,
    );
    Ok(self)
  }

  pub fn client_username(mut self, username: impl Into<String>) -> Self {
    self.client_username = Some(username.into());
    self
  }

  pub fn server_username(mut self, username: impl Into<String>) -> Self {
    self.server_username = Some(username.into());
    self
  }

  pub fn terminal_type(mut self, terminal_type: impl Into<String>) -> Self {
    self.terminal_type = Some(terminal_type.into());
    self
  }

  pub fn terminal_speed(mut self, speed: u32) -> Self {
    self.terminal_speed = Some(speed);
    self
  }

  /// Parses `terminal_speed` from its textual form, failing with
  /// `Invalid type for 'terminalSpeed': expected integer` on a bad parse.
  pub fn terminal_speed_str(mut self, speed: &str) -> Result<Self, RloginError> {
    self.terminal_speed = Some(
      speed
        .parse()
        .map_err(|_| RloginError::invalid_type("terminalSpeed", "integer"))?,
    );
    Ok(self)
  }

  /// ### BUILD
  ///
  /// Validates and finishes construction. Each required option is checked
  /// for presence and, for strings, non-emptiness; `terminal_speed` is
  /// checked for being strictly positive.
  pub fn build(self) -> Result<ConnectionOptions, RloginError> {
    let host = non_empty("host", self.host)?;
    let port = self.port.ok_or_else(|| RloginError::missing_option("port"))?;
    if port == 0 {
      return Err(RloginError::invalid_setting("port", port));
    }
    let client_username = non_empty("clientUsername", self.client_username)?;
    let server_username = non_empty("serverUsername", self.server_username)?;
    let terminal_type = non_empty("terminalType", self.terminal_type)?;
    let terminal_speed = self
      .terminal_speed
      .ok_or_else(|| RloginError::missing_option("terminalSpeed"))?;
    if terminal_speed == 0 {
      return Err(RloginError::invalid_setting("terminalSpeed", terminal_speed));
    }
    Ok(ConnectionOptions {
      host,
      port,
      client_username,
      server_username,
      terminal_type,
      terminal_speed,
    })
  }
}

fn non_empty(name: &str, value: Option<String>) -> Result<String, RloginError> {
  match value {
    None => Err(RloginError::missing_option(name)),
    Some(s) if s.is_empty() => Err(RloginError::invalid_setting(name, "''")),
    Some(s) => Ok(s),
  }
}

/// ## PROPERTIES
///
/// Mutable terminal-geometry and client-escape settings. Defaults to
/// 24 rows, 80 columns, 640×480 pixels, `~` (0x7E) escape.
///
/// Every field is private; mutation only happens through the validated
/// setters below, so an instance can never hold an invalid value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Properties {
  rows: u16,
  columns: u16,
  pixels_x: u16,
  pixels_y: u16,
  client_escape: u8,
}

impl Default for Properties {
  fn default() -> Self {
    Self {
      rows: 24,
      columns: 80,
      pixels_x: 640,
      pixels_y: 480,
      client_escape: 0x7E,
    }
  }
}

impl Properties {
  pub fn rows(&self) -> u16 {
    self.rows
  }

  pub fn columns(&self) -> u16 {
    self.columns
  }

  pub fn pixels_x(&self) -> u16 {
    self.pixels_x
  }

  pub fn pixels_y(&self) -> u16 {
    self.pixels_y
  }

  pub fn client_escape(&self) -> u8 {
    self.client_escape
  }

  /// Validates `rows` is a strictly positive integer representable as a
  /// `u16` before writing it.
  pub fn set_rows(&mut self, rows: i64) -> Result<(), RloginError> {
    self.rows = positive_u16("rows", rows)?;
    Ok(())
  }

  pub fn set_columns(&mut self, columns: i64) -> Result<(), RloginError> {
    self.columns = positive_u16("columns", columns)?;
    Ok(())
  }

  pub fn set_pixels_x(&mut self, pixels_x: i64) -> Result<(), RloginError> {
    self.pixels_x = positive_u16("pixelsX", pixels_x)?;
    Ok(())
  }

  pub fn set_pixels_y(&mut self, pixels_y: i64) -> Result<(), RloginError> {
    self.pixels_y = positive_u16("pixelsY", pixels_y)?;
    Ok(())
  }

  /// Sets the client escape byte directly. Always valid, since `u8` is
  /// already exactly one byte.
  pub fn set_client_escape(&mut self, client_escape: u8) {
    self.client_escape = client_escape;
  }

  /// Sets the client escape byte from a string, as the dynamically-typed
  /// source implementation allows (a single-character string converted by
  /// ordinal). Any other string length fails with the contractual
  /// `Invalid 'clientEscape' setting <value>` message.
  pub fn set_client_escape_str(&mut self, client_escape: &str) -> Result<(), RloginError> {
    let mut chars = client_escape.chars();
    match (chars.next(), chars.next()) {
      (Some(c), None) if c.is_ascii() => {
        self.client_escape = c as u8;
        Ok(())
      }
      _ => Err(RloginError::invalid_setting("clientEscape", client_escape)),
    }
  }
}

impl Properties {
  /// ### SET PROPERTY (STRING FORM)
  ///
  /// Generic name/value setter over `{rows, columns, pixelsX, pixelsY,
  /// clientEscape}`, for callers driven by configuration rather than
  /// already-typed calls. Fails with `Invalid property: 'X'` for any other
  /// name.
  pub fn set_property_str(&mut self, name: &str, value: &str) -> Result<(), RloginError> {
    match name {
      "rows" => self.set_rows(parse_i64(name, value)?),
      "columns" => self.set_columns(parse_i64(name, value)?),
      "pixelsX" => self.set_pixels_x(parse_i64(name, value)?),
      "pixelsY" => self.set_pixels_y(parse_i64(name, value)?),
      "clientEscape" => self.set_client_escape_str(value),
      _ => Err(RloginError::invalid_property(name)),
    }
  }

  /// ### GET PROPERTY (STRING FORM)
  ///
  /// Generic name reader over the same five names as
  /// [`set_property_str`](Self::set_property_str).
  pub fn get_property_str(&self, name: &str) -> Result<String, RloginError> {
    match name {
      "rows" => Ok(self.rows.to_string()),
      "columns" => Ok(self.columns.to_string()),
      "pixelsX" => Ok(self.pixels_x.to_string()),
      "pixelsY" => Ok(self.pixels_y.to_string()),
      "clientEscape" => Ok((self.client_escape as char).to_string()),
      _ => Err(RloginError::invalid_property(name)),
    }
  }
}

fn parse_i64(name: &str, value: &str) -> Result<i64, RloginError> {
  value.parse().map_err(|_| RloginError::invalid_type(name, "integer"))
}

fn positive_u16(name: &str, value: i64) -> Result<u16, RloginError> {
  if value <= 0 || value > u16::MAX as i64 {
    return Err(RloginError::invalid_setting(name, value));
  }
  Ok(value as u16)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builder_rejects_missing_host() {
    let err = ConnectionOptionsBuilder::new()
      .port(513)
      .client_username("a")
      .server_username("b")
      .terminal_type("vt100")
      .terminal_speed(9600)
      .build()
      .unwrap_err();
    assert_eq!(err.to_string(), "Missing required option: 'host'");
  }

  #[test]
  fn builder_port_str_rejects_non_integer() {
    let err = ConnectionOptionsBuilder::new()
      .port_str("not-a-port")
      .unwrap_err();
    assert_eq!(err.to_string(), "Invalid type for 'port': expected integer");
  }

  #[test]
  fn set_rows_rejects_negative() {
    let mut properties = Properties::default();
    let err = properties.set_rows(-1).unwrap_err();
    assert_eq!(err.to_string(), "Invalid 'rows' setting -1");
    assert_eq!(properties.rows(), 24);
  }

  #[test]
  fn set_client_escape_str_rejects_multi_character() {
    let mut properties = Properties::default();
    let err = properties.set_client_escape_str("too long").unwrap_err();
    assert_eq!(err.to_string(), "Invalid 'clientEscape' setting too long");
  }

  #[test]
  fn set_property_str_rejects_unknown_name() {
    let mut properties = Properties::default();
    let err = properties.set_property_str("bogus", "1").unwrap_err();
    assert_eq!(err.to_string(), "Invalid property: 'bogus'");
  }

  #[test]
  fn set_property_str_dispatches_to_typed_setters() {
    let mut properties = Properties::default();
    properties.set_property_str("columns", "132").unwrap();
    assert_eq!(properties.columns(), 132);
    assert_eq!(properties.get_property_str("columns").unwrap(), "132");
  }
}
