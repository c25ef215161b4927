use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::session::{outbound_text, Session, Snapshot};
use crate::config::ClientConfig;
use crate::error::{ClientError, ConfigError};
use crate::models::{now_ms, ConnectionState};

const COMMAND_QUEUE: usize = 64;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum Command {
    Send {
        payload: Value,
        reply: oneshot::Sender<Result<(), ClientError>>,
    },
    Clear,
}

/// Owns the connection task. Dropping it (or calling [`dispose`]) stops
/// the task; no reconnect fires afterwards.
///
/// [`dispose`]: ConnectionManager::dispose
pub struct ConnectionManager {
    handle: ConnectionHandle,
    task: JoinHandle<()>,
}

impl ConnectionManager {
    /// Start connecting immediately. Must be called inside a tokio runtime.
    pub fn spawn(config: ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let session = Session::new(&config);
        let (snapshots_tx, snapshots_rx) = watch::channel(session.snapshot());
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE);
        let cancel = CancellationToken::new();

        let driver = Driver {
            session,
            url: config.url,
            connect_timeout: config.connect_timeout,
            commands: commands_rx,
            snapshots: snapshots_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(driver.run());

        Ok(Self {
            handle: ConnectionHandle {
                commands: commands_tx,
                snapshots: snapshots_rx,
                cancel,
            },
            task,
        })
    }

    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    /// Cancel any pending reconnect, detach from the channel and close it.
    /// Returns once the connection task has finished.
    pub async fn dispose(mut self) {
        self.handle.cancel.cancel();
        if let Err(e) = (&mut self.task).await {
            warn!(error = %e, "connection task ended abnormally");
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.handle.cancel.cancel();
    }
}

/// Cheap handle for the UI: send, clear, read snapshots
#[derive(Clone)]
pub struct ConnectionHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<Snapshot>,
    cancel: CancellationToken,
}

impl ConnectionHandle {
    /// Push a payload to the server. Fails with `NotConnected` unless the
    /// channel is open; the failure also shows up in the feed.
    pub async fn send(&self, payload: Value) -> Result<(), ClientError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Send { payload, reply })
            .await
            .map_err(|_| ClientError::Disposed)?;
        rx.await.map_err(|_| ClientError::Disposed)?
    }

    /// Empty the feed; the connection is left alone
    pub async fn clear(&self) -> Result<(), ClientError> {
        self.commands
            .send(Command::Clear)
            .await
            .map_err(|_| ClientError::Disposed)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.snapshots.borrow().state
    }

    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    /// Wait until a published snapshot satisfies `predicate`
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<Snapshot, ClientError>
    where
        F: FnMut(&Snapshot) -> bool,
    {
        let mut rx = self.snapshots.clone();
        let snapshot = rx
            .wait_for(|s| predicate(s))
            .await
            .map_err(|_| ClientError::Disposed)?;
        Ok(snapshot.clone())
    }

    pub fn is_disposed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

enum Pump {
    Disposed,
    Closed(Option<String>),
}

/// The single logical thread: every transition and buffer mutation
/// happens here, one event at a time.
struct Driver {
    session: Session,
    url: Url,
    connect_timeout: Duration,
    commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<Snapshot>,
    cancel: CancellationToken,
}

impl Driver {
    async fn run(mut self) {
        loop {
            self.session.begin_connect();
            self.publish();

            let Some(attempt) = self.connect().await else {
                break;
            };
            match attempt {
                Ok(socket) => {
                    info!(url = %self.url, "push channel open");
                    self.session.on_open(now_ms());
                    self.publish();

                    match self.pump(socket).await {
                        Pump::Disposed => break,
                        Pump::Closed(Some(reason)) => {
                            warn!(url = %self.url, %reason, "push channel error");
                            self.session.on_error(&reason, now_ms());
                        }
                        Pump::Closed(None) => {}
                    }
                }
                Err(reason) => {
                    warn!(url = %self.url, %reason, "connect failed");
                    self.session.on_error(&reason, now_ms());
                }
            }

            let delay = self.session.on_close(now_ms());
            self.publish();
            info!(delay_ms = delay.as_millis() as u64, "reconnect scheduled");

            if !self.wait(delay).await {
                break;
            }
        }
        debug!(url = %self.url, "connection task stopped");
    }

    /// `None` when disposed mid-attempt
    async fn connect(&mut self) -> Option<Result<Socket, String>> {
        let connecting = tokio::time::timeout(
            self.connect_timeout,
            connect_async(self.url.to_string()),
        );
        tokio::pin!(connecting);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                command = self.commands.recv() => {
                    let command = command?;
                    self.offline(command);
                }
                result = &mut connecting => {
                    return Some(match result {
                        Ok(Ok((socket, _response))) => Ok(socket),
                        Ok(Err(e)) => Err(e.to_string()),
                        Err(_) => Err(format!(
                            "connect timed out after {:?}",
                            self.connect_timeout
                        )),
                    });
                }
            }
        }
    }

    async fn pump(&mut self, socket: Socket) -> Pump {
        let (mut sink, mut stream) = socket.split();

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    // read side goes first so nothing feeds a discarded session
                    drop(stream);
                    let _ = sink.close().await;
                    return Pump::Disposed;
                }
                command = self.commands.recv() => match command {
                    None => {
                        drop(stream);
                        let _ = sink.close().await;
                        return Pump::Disposed;
                    }
                    Some(Command::Send { payload, reply }) => {
                        let now = now_ms();
                        if let Err(e) = self.session.check_send(now) {
                            self.publish();
                            let _ = reply.send(Err(e));
                        } else {
                            let text = outbound_text(&payload);
                            match sink.send(Message::Text(text.clone())).await {
                                Ok(()) => {
                                    self.session.record_outbound(&text, now);
                                    // readers see the echo before the sender resumes
                                    self.publish();
                                    let _ = reply.send(Ok(()));
                                }
                                Err(e) => {
                                    let _ = reply.send(Err(ClientError::Channel(e.to_string())));
                                    return Pump::Closed(Some(e.to_string()));
                                }
                            }
                        }
                    }
                    Some(Command::Clear) => self.session.clear(),
                },
                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Text(text))) => self.session.on_message(&text, now_ms()),
                    Some(Ok(Message::Binary(bytes))) => {
                        self.session.on_message(&String::from_utf8_lossy(&bytes), now_ms());
                    }
                    Some(Ok(Message::Close(_))) => {
                        // flushes the queued close reply
                        let _ = sink.close().await;
                        return Pump::Closed(None);
                    }
                    None => return Pump::Closed(None),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Pump::Closed(Some(e.to_string())),
                },
            }
            self.publish();
        }
    }

    /// Reconnect timer. `false` when disposed before it fires.
    async fn wait(&mut self, delay: Duration) -> bool {
        let timer = tokio::time::sleep(delay);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return false,
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        return false;
                    };
                    self.offline(command);
                }
                _ = &mut timer => return true,
            }
        }
    }

    /// Commands while the channel is not open
    fn offline(&mut self, command: Command) {
        match command {
            Command::Send { reply, .. } => {
                let result = self.session.check_send(now_ms());
                self.publish();
                let _ = reply.send(result);
            }
            Command::Clear => {
                self.session.clear();
                self.publish();
            }
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.session.snapshot());
    }
}
