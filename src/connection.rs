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

//! # CONNECTION
//!
//! [`Connection`] is the public handle returned by
//! [`crate::dialer::connect`]. It is cheap to clone and carries only a
//! command channel plus a handful of atomics for the synchronous getters;
//! all protocol state lives in a single task running [`run`], so mutation
//! of [`crate::processor::Processor`] never needs a lock. A thin client
//! handle talks to the task that owns connection state over a channel.

use crate::error::RloginError;
use crate::escape::EscapeHandler;
use crate::events::Event;
use crate::options::Properties;
use crate::processor::{encode_wccs, Processor};
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot};

/// Read buffer size for the connection's single inbound read loop.
const READ_BUFFER: usize = 4096;

type PropertyUpdate = Box<dyn FnOnce(&mut Properties) -> Result<(), RloginError> + Send>;

pub(crate) enum Command {
  Write(Bytes, oneshot::Sender<Result<(), RloginError>>),
  SendWccs(oneshot::Sender<Result<(), RloginError>>),
  UpdateProperties(PropertyUpdate, oneshot::Sender<Result<(), RloginError>>),
  Properties(oneshot::Sender<Properties>),
  AddEscape(u8, EscapeHandler, oneshot::Sender<()>),
  SetClientEscape(u8, oneshot::Sender<()>),
  End(oneshot::Sender<()>),
  Disconnect(oneshot::Sender<()>),
}

#[derive(Default)]
struct SharedState {
  connected: AtomicBool,
  cooked: AtomicBool,
}

impl SharedState {
  /// Called once by the dialer after the handshake ack has already been
  /// consumed, since that transition happens before `run` starts polling.
  pub(crate) fn mark_connected(&self) {
    self.connected.store(true, Ordering::Release);
  }
}

/// ## CONNECTION
///
/// A live RLOGIN session. Obtained from [`crate::dialer::connect`] together
/// with an [`Event`] receiver.
#[derive(Clone)]
pub struct Connection {
  commands: mpsc::UnboundedSender<Command>,
  state: Arc<SharedState>,
}

impl Connection {
  pub(crate) fn new(commands: mpsc::UnboundedSender<Command>, state: Arc<SharedState>) -> Self {
    Connection { commands, state }
  }

  /// `true` once the handshake has been acknowledged and until the
  /// connection is torn down.
  pub fn is_connected(&self) -> bool {
    self.state.connected.load(Ordering::Acquire)
  }

  /// `true` while the connection is in cooked mode (the default; `false`
  /// after the server has switched it to raw with the `RAW` control byte).
  pub fn is_cooked(&self) -> bool {
    self.state.cooked.load(Ordering::Acquire)
  }

  /// ### WRITE
  ///
  /// Sends `data` after escape and cooked-mode filtering. Fails with
  /// [`RloginError::NotConnected`] or [`RloginError::InputSuspended`]
  /// without writing anything.
  pub async fn write(&self, data: impl Into<Bytes>) -> Result<(), RloginError> {
    let (reply_tx, reply_rx) = oneshot::channel();
    self
      .commands
      .send(Command::Write(data.into(), reply_tx))
      .map_err(|_| RloginError::NotConnected)?;
    reply_rx.await.map_err(|_| RloginError::NotConnected)?
  }

  /// ### SEND WCCS
  ///
  /// Encodes and writes a Window Change Control Sequence built from the
  /// connection's current [`Properties`]. Fails with
  /// [`RloginError::NotConnected`] if not connected.
  pub async fn send_wccs(&self) -> Result<(), RloginError> {
    let (reply_tx, reply_rx) = oneshot::channel();
    self
      .commands
      .send(Command::SendWccs(reply_tx))
      .map_err(|_| RloginError::NotConnected)?;
    reply_rx.await.map_err(|_| RloginError::NotConnected)?
  }

  /// Returns a snapshot of the connection's current [`Properties`].
  pub async fn properties(&self) -> Properties {
    let (reply_tx, reply_rx) = oneshot::channel();
    if self.commands.send(Command::Properties(reply_tx)).is_ok() {
      if let Ok(properties) = reply_rx.await {
        return properties;
      }
    }
    Properties::default()
  }

  async fn update_properties(
    &self,
    update: impl FnOnce(&mut Properties) -> Result<(), RloginError> + Send + 'static,
  ) -> Result<(), RloginError> {
    let (reply_tx, reply_rx) = oneshot::channel();
    self
      .commands
      .send(Command::UpdateProperties(Box::new(update), reply_tx))
      .map_err(|_| RloginError::NotConnected)?;
    reply_rx.await.map_err(|_| RloginError::NotConnected)?
  }

  /// Validates and sets the terminal row count reported by [`send_wccs`](Self::send_wccs).
  pub async fn set_rows(&self, rows: i64) -> Result<(), RloginError> {
    self.update_properties(move |p| p.set_rows(rows)).await
  }

  /// Validates and sets the terminal column count reported by [`send_wccs`](Self::send_wccs).
  pub async fn set_columns(&self, columns: i64) -> Result<(), RloginError> {
    self.update_properties(move |p| p.set_columns(columns)).await
  }

  /// Validates and sets the terminal pixel width reported by [`send_wccs`](Self::send_wccs).
  pub async fn set_pixels_x(&self, pixels_x: i64) -> Result<(), RloginError> {
    self.update_properties(move |p| p.set_pixels_x(pixels_x)).await
  }

  /// Validates and sets the terminal pixel height reported by [`send_wccs`](Self::send_wccs).
  pub async fn set_pixels_y(&self, pixels_y: i64) -> Result<(), RloginError> {
    self.update_properties(move |p| p.set_pixels_y(pixels_y)).await
  }

  /// ### ADD CLIENT ESCAPE
  ///
  /// Installs or replaces the handler invoked when `byte` is seen in an
  /// armed escape position.
  pub async fn add_client_escape(&self, byte: u8, handler: EscapeHandler) {
    let (reply_tx, reply_rx) = oneshot::channel();
    if self
      .commands
      .send(Command::AddEscape(byte, handler, reply_tx))
      .is_ok()
    {
      let _ = reply_rx.await;
    }
  }

  /// String-keyed form of [`add_client_escape`](Self::add_client_escape),
  /// matching the dynamically-typed source's single-character convention.
  pub async fn add_client_escape_str(
    &self,
    key: &str,
    handler: EscapeHandler,
  ) -> Result<(), RloginError> {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
      (Some(c), None) if c.is_ascii() => {
        self.add_client_escape(c as u8, handler).await;
        Ok(())
      }
      _ => Err(RloginError::Validation(
        "addClientEscape: invalid string argument".to_string(),
      )),
    }
  }

  /// Changes the escape byte watched for at an armed position.
  pub async fn set_client_escape(&self, byte: u8) {
    let (reply_tx, reply_rx) = oneshot::channel();
    if self
      .commands
      .send(Command::SetClientEscape(byte, reply_tx))
      .is_ok()
    {
      let _ = reply_rx.await;
    }
  }

  /// ### END
  ///
  /// Half-closes the outbound side of the transport without tearing down
  /// the connection; inbound data and `Close` still arrive normally when
  /// the peer closes its side.
  pub async fn end(&self) {
    let (reply_tx, reply_rx) = oneshot::channel();
    if self.commands.send(Command::End(reply_tx)).is_ok() {
      let _ = reply_rx.await;
    }
  }

  /// ### DISCONNECT
  ///
  /// Tears the connection down in both directions. Idempotent: calling this
  /// more than once, or after the peer has already closed, is a no-op.
  pub async fn disconnect(&self) {
    let (reply_tx, reply_rx) = oneshot::channel();
    if self.commands.send(Command::Disconnect(reply_tx)).is_ok() {
      let _ = reply_rx.await;
    }
  }

  /// Alias for [`disconnect`](Self::disconnect), matching the source
  /// implementation's `close()` naming.
  pub async fn close(&self) {
    self.disconnect().await;
  }
}

pub(crate) fn shared_state() -> Arc<SharedState> {
  Arc::new(SharedState {
    connected: AtomicBool::new(false),
    cooked: AtomicBool::new(true),
  })
}

/// Drives one connection to completion. Spawned once by
/// [`crate::dialer::connect`]; the only task that ever touches `processor`.
pub(crate) async fn run<R, W>(
  mut reader: ReadHalf<R>,
  mut writer: WriteHalf<W>,
  mut processor: Processor,
  mut current_properties: Properties,
  mut commands: mpsc::UnboundedReceiver<Command>,
  events: mpsc::UnboundedSender<Event>,
  state: Arc<SharedState>,
) where
  R: tokio::io::AsyncRead + Unpin + Send,
  W: tokio::io::AsyncWrite + Unpin + Send,
{
  let mut buf = [0u8; READ_BUFFER];

  loop {
    tokio::select! {
      biased;

      read_result = reader.read(&mut buf) => {
        match read_result {
          Ok(0) => {
            tracing::debug!("peer closed the connection");
            if processor.mark_disconnected() {
              state.connected.store(false, Ordering::Release);
              let _ = events.send(Event::Close);
            }
            break;
          }
          Ok(n) => {
            let effect = processor.process_inbound(&buf[..n]);
            if effect.established {
              tracing::info!("handshake acknowledged");
              state.connected.store(true, Ordering::Release);
              let _ = events.send(Event::Established);
            }
            state.cooked.store(processor.is_cooked(), Ordering::Release);
            if let Some(data) = effect.data {
              if !data.is_empty() {
                let _ = events.send(Event::Data(data));
              }
            }
            // Replies use the connection's current properties.
            let mut transport_failed = false;
            for _ in 0..effect.wccs_requests {
              let frame = encode_wccs(&current_properties);
              if writer.write_all(&frame).await.is_err() {
                transport_failed = true;
                break;
              }
            }
            if effect.disconnect {
              tracing::debug!("escape handler requested disconnect");
              let _ = writer.shutdown().await;
              if processor.mark_disconnected() {
                state.connected.store(false, Ordering::Release);
                let _ = events.send(Event::Close);
              }
              break;
            }
            if transport_failed {
              tracing::warn!("write failed while replying to a window request");
              break;
            }
          }
          Err(e) => {
            tracing::warn!(error = %e, "read failed");
            let _ = events.send(Event::Error(RloginError::Transport(e)));
            if processor.mark_disconnected() {
              state.connected.store(false, Ordering::Release);
              let _ = events.send(Event::Close);
            }
            break;
          }
        }
      }

      command = commands.recv() => {
        let Some(command) = command else { break };
        match command {
          Command::Write(data, reply) => {
            if !processor.is_connected() {
              let _ = reply.send(Err(RloginError::NotConnected));
              continue;
            }
            if processor.is_suspend_input() {
              let _ = reply.send(Err(RloginError::InputSuspended));
              continue;
            }
            let effect = processor.process_outbound(&data);
            let mut outcome = Ok(());
            for segment in effect.segments {
              if let Err(e) = writer.write_all(&segment).await {
                outcome = Err(RloginError::Transport(e));
                break;
              }
            }
            if outcome.is_ok() && effect.disconnect {
              let _ = writer.shutdown().await;
              if processor.mark_disconnected() {
                state.connected.store(false, Ordering::Release);
                let _ = events.send(Event::Close);
              }
            }
            let _ = reply.send(outcome);
          }
          Command::SendWccs(reply) => {
            if !processor.is_connected() {
              let _ = reply.send(Err(RloginError::NotConnected));
              continue;
            }
            let frame = encode_wccs(&current_properties);
            let outcome = writer
              .write_all(&frame)
              .await
              .map_err(RloginError::Transport);
            let _ = reply.send(outcome);
          }
          Command::UpdateProperties(update, reply) => {
            let mut candidate = current_properties;
            let outcome = update(&mut candidate);
            if outcome.is_ok() {
              current_properties = candidate;
            }
            let _ = reply.send(outcome);
          }
          Command::Properties(reply) => {
            let _ = reply.send(current_properties);
          }
          Command::AddEscape(byte, handler, reply) => {
            processor.escapes_mut().insert(byte, handler);
            let _ = reply.send(());
          }
          Command::SetClientEscape(byte, reply) => {
            processor.set_client_escape(byte);
            current_properties.set_client_escape(byte);
            let _ = reply.send(());
          }
          Command::End(reply) => {
            let _ = writer.shutdown().await;
            let _ = reply.send(());
          }
          Command::Disconnect(reply) => {
            tracing::debug!("disconnect requested by caller");
            let _ = writer.shutdown().await;
            if processor.mark_disconnected() {
              state.connected.store(false, Ordering::Release);
              let _ = events.send(Event::Close);
            }
            let _ = reply.send(());
            break;
          }
        }
      }
    }
  }
}
