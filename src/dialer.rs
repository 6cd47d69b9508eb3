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

//! # DIALER
//!
//! [`connect`] is the sole entry point for establishing a session: it opens
//! the TCP connection, writes the four-string handshake, spawns the single
//! task that will own the [`Processor`](crate::processor::Processor) for
//! the life of the connection, and resolves once the server's leading
//! `0x00` byte has been observed (or the configured timeout elapses). A
//! short, fallible async function that hands back a live client plus
//! whatever the caller needs to keep listening.

use crate::connection::{self, shared_state, Command, Connection};
use crate::error::RloginError;
use crate::events::Event;
use crate::options::{ConnectionOptions, Properties};
use crate::processor::Processor;
use std::time::Duration;
use tokio::io::{self, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// ## DIALER CONFIG
///
/// Tunables for [`connect`] that are not part of the RLOGIN wire protocol
/// itself: a plain struct with a documented [`Default`].
#[derive(Clone, Copy, Debug)]
pub struct DialerConfig {
  /// How long to wait for the server to acknowledge the handshake before
  /// giving up with [`RloginError::Timeout`].
  pub connect_timeout: Duration,
}

impl Default for DialerConfig {
  fn default() -> Self {
    DialerConfig {
      connect_timeout: Duration::from_secs(10),
    }
  }
}

/// ### CONNECT
///
/// Dials `options.host:options.port`, writes the handshake, and waits for
/// the server's acknowledgement. On success, returns a [`Connection`]
/// handle and the [`Event`] receiver the caller should poll for the
/// lifetime of the session.
///
/// `overrides`, if supplied, replaces the default terminal geometry and
/// escape byte ([`Properties::default`]) used for this connection's
/// [`Connection::send_wccs`] replies; since [`Properties`] can only be
/// constructed with all five fields validated, there is no way to supply
/// some but not others, which is how the "well-typed overrides are all
/// present or none are" rule is enforced here.
pub async fn connect(
  options: &ConnectionOptions,
  overrides: Option<Properties>,
  config: DialerConfig,
) -> Result<(Connection, mpsc::UnboundedReceiver<Event>), RloginError> {
  let stream = timeout(
    config.connect_timeout,
    TcpStream::connect((options.host.as_str(), options.port)),
  )
  .await
  .map_err(|_| RloginError::Timeout)?
  .map_err(RloginError::Transport)?;

  stream.set_nodelay(true).map_err(RloginError::Transport)?;

  tracing::debug!(host = %options.host, port = options.port, "dialed");
  handshake_over(stream, options, overrides, config).await
}

/// Runs the handshake and spawns the connection task over any transport,
/// not just a dialed [`TcpStream`]. Shared by [`connect`] and by tests that
/// drive a session over `tokio::io::duplex`.
pub(crate) async fn handshake_over<T>(
  transport: T,
  options: &ConnectionOptions,
  overrides: Option<Properties>,
  config: DialerConfig,
) -> Result<(Connection, mpsc::UnboundedReceiver<Event>), RloginError>
where
  T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
  let (mut reader, mut writer) = io::split(transport);

  let handshake = encode_handshake(options);
  timeout(config.connect_timeout, writer.write_all(&handshake))
    .await
    .map_err(|_| RloginError::Timeout)?
    .map_err(RloginError::Transport)?;

  let initial_properties = overrides.unwrap_or_default();
  let mut processor = Processor::new(initial_properties.client_escape());
  let state = shared_state();

  let mut ack = [0u8; 1];
  loop {
    let n = timeout(config.connect_timeout, reader.read(&mut ack))
      .await
      .map_err(|_| RloginError::Timeout)?
      .map_err(RloginError::Transport)?;
    if n == 0 {
      return Err(RloginError::Transport(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "connection closed during handshake",
      )));
    }
    let effect = processor.process_inbound(&ack[..n]);
    if effect.disconnect {
      tracing::warn!("server rejected handshake");
      return Err(RloginError::Transport(io::Error::new(
        io::ErrorKind::ConnectionRefused,
        "server rejected handshake",
      )));
    }
    if effect.established {
      break;
    }
  }
  tracing::info!("handshake complete");

  let (commands_tx, commands_rx) = mpsc::unbounded_channel::<Command>();
  let (events_tx, events_rx) = mpsc::unbounded_channel::<Event>();
  state.mark_connected();
  // The established transition happened above, before this channel existed;
  // forward it now so the caller's very first recv() sees it.
  let _ = events_tx.send(Event::Established);

  tokio::spawn(connection::run(
    reader,
    writer,
    processor,
    initial_properties,
    commands_rx,
    events_tx,
    state.clone(),
  ));

  Ok((Connection::new(commands_tx, state), events_rx))
}

/// ### ENCODE HANDSHAKE
///
/// `0x00 clientUsername 0x00 serverUsername 0x00 terminalType "/" terminalSpeed 0x00`
fn encode_handshake(options: &ConnectionOptions) -> Vec<u8> {
  let mut frame = Vec::with_capacity(
    options.client_username.len() + options.server_username.len() + options.terminal_type.len() + 24,
  );
  frame.push(0x00);
  frame.extend_from_slice(options.client_username.as_bytes());
  frame.push(0x00);
  frame.extend_from_slice(options.server_username.as_bytes());
  frame.push(0x00);
  frame.extend_from_slice(options.terminal_type.as_bytes());
  frame.push(b'/');
  frame.extend_from_slice(options.terminal_speed.to_string().as_bytes());
  frame.push(0x00);
  frame
}

#[cfg(test)]
mod tests {
  use super::*;

  fn options() -> ConnectionOptions {
    crate::options::ConnectionOptionsBuilder::new()
      .host("localhost")
      .port(513)
      .client_username("user1")
      .server_username("user2")
      .terminal_type("vt100")
      .terminal_speed(9600)
      .build()
      .unwrap()
  }

  #[test]
  fn handshake_matches_wire_format() {
    let frame = encode_handshake(&options());
    assert_eq!(
      frame,
      vec![
        0x00, 0x75, 0x73, 0x65, 0x72, 0x31, 0x00, 0x75, 0x73, 0x65, 0x72, 0x32, 0x00, 0x76, 0x74,
        0x31, 0x30, 0x30, 0x2F, 0x39, 0x36, 0x30, 0x30, 0x00,
      ]
    );
  }

  #[tokio::test]
  async fn established_event_fires_after_server_acks() {
    let (client_side, mut server_side) = tokio::io::duplex(256);
    let server = tokio::spawn(async move {
      let mut handshake = [0u8; 24];
      server_side.read_exact(&mut handshake).await.unwrap();
      server_side.write_all(&[0x00]).await.unwrap();
      server_side
    });

    let (connection, mut events) =
      handshake_over(client_side, &options(), None, DialerConfig::default())
        .await
        .unwrap();
    server.await.unwrap();

    assert!(connection.is_connected());
    assert!(matches!(events.recv().await, Some(Event::Established)));
  }

  #[tokio::test]
  async fn handshake_rejection_surfaces_as_error() {
    let (client_side, mut server_side) = tokio::io::duplex(256);
    tokio::spawn(async move {
      let mut handshake = [0u8; 24];
      server_side.read_exact(&mut handshake).await.unwrap();
      server_side.write_all(&[0x01]).await.unwrap();
    });

    let result = handshake_over(client_side, &options(), None, DialerConfig::default()).await;
    assert!(result.is_err());
  }

  #[tokio::test]
  async fn data_flows_after_established_and_escape_disconnects() {
    let (client_side, mut server_side) = tokio::io::duplex(256);
    let server = tokio::spawn(async move {
      let mut handshake = [0u8; 24];
      server_side.read_exact(&mut handshake).await.unwrap();
      server_side.write_all(b"\x00hello").await.unwrap();

      let mut echoed = [0u8; 2];
      server_side.read_exact(&mut echoed).await.unwrap();
      assert_eq!(&echoed, b"hi");
      server_side
    });

    let (connection, mut events) =
      handshake_over(client_side, &options(), None, DialerConfig::default())
        .await
        .unwrap();
    assert!(matches!(events.recv().await, Some(Event::Established)));
    match events.recv().await {
      Some(Event::Data(bytes)) => assert_eq!(&bytes[..], b"hello"),
      other => panic!("expected data event, got {other:?}"),
    }

    connection.write(&b"hi"[..]).await.unwrap();
    connection.write(&b"~."[..]).await.unwrap();
    assert!(matches!(events.recv().await, Some(Event::Close)));
    assert!(!connection.is_connected());

    drop(server.await.unwrap());
  }

  #[tokio::test]
  async fn window_byte_triggers_automatic_wccs_reply() {
    let (client_side, mut server_side) = tokio::io::duplex(256);
    let server = tokio::spawn(async move {
      let mut handshake = [0u8; 24];
      server_side.read_exact(&mut handshake).await.unwrap();
      server_side.write_all(&[0x00]).await.unwrap();
      server_side.write_all(&[0x80]).await.unwrap();

      let mut reply = [0u8; 12];
      server_side.read_exact(&mut reply).await.unwrap();
      reply
    });

    let (_connection, mut events) =
      handshake_over(client_side, &options(), None, DialerConfig::default())
        .await
        .unwrap();
    assert!(matches!(events.recv().await, Some(Event::Established)));

    let reply = server.await.unwrap();
    assert_eq!(
      reply,
      [0xFF, 0xFF, 0x73, 0x73, 0x18, 0x00, 0x50, 0x00, 0x80, 0x02, 0xE0, 0x01]
    );
  }

  #[tokio::test]
  async fn explicit_send_wccs_reflects_updated_rows() {
    let (client_side, mut server_side) = tokio::io::duplex(256);
    let server = tokio::spawn(async move {
      let mut handshake = [0u8; 24];
      server_side.read_exact(&mut handshake).await.unwrap();
      server_side.write_all(&[0x00]).await.unwrap();

      let mut reply = [0u8; 12];
      server_side.read_exact(&mut reply).await.unwrap();
      reply
    });

    let (connection, mut events) =
      handshake_over(client_side, &options(), None, DialerConfig::default())
        .await
        .unwrap();
    assert!(matches!(events.recv().await, Some(Event::Established)));

    connection.set_rows(50).await.unwrap();
    connection.send_wccs().await.unwrap();

    let reply = server.await.unwrap();
    assert_eq!(
      reply,
      [0xFF, 0xFF, 0x73, 0x73, 0x32, 0x00, 0x50, 0x00, 0x80, 0x02, 0xE0, 0x01]
    );
    assert_eq!(connection.properties().await.rows(), 50);
  }

  #[tokio::test]
  async fn overrides_seed_initial_properties() {
    let (client_side, mut server_side) = tokio::io::duplex(256);
    tokio::spawn(async move {
      let mut handshake = [0u8; 24];
      server_side.read_exact(&mut handshake).await.unwrap();
      server_side.write_all(&[0x00]).await.unwrap();
      server_side
    });

    let mut overrides = Properties::default();
    overrides.set_columns(132).unwrap();

    let (connection, mut events) =
      handshake_over(client_side, &options(), Some(overrides), DialerConfig::default())
        .await
        .unwrap();
    assert!(matches!(events.recv().await, Some(Event::Established)));
    assert_eq!(connection.properties().await.columns(), 132);
  }
}
