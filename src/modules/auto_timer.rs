use std::net::SocketAddr;
use std::time::Duration;

use log::{error, info, warn};
use snafu::ResultExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;

use crate::errors::{CustomResult, IoSnafu};
use crate::modules::race_machine::RaceEvent;
use crate::modules::session::SessionHandle;

const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Listens for the timing hardware on a TCP socket.
///
/// One client at a time; every non-empty line it sends is a lap signal.
/// The listener only queues events on the session, it never touches the race.
pub struct AutoTimerListener {
    listener: TcpListener,
}

impl AutoTimerListener {
    pub async fn bind(addr: &str) -> CustomResult<AutoTimerListener> {
        let listener = TcpListener::bind(addr).await.context(IoSnafu)?;
        info!(target: "auto_timer:bind", "waiting for automated timer on {}", addr);
        Ok(AutoTimerListener { listener })
    }

    pub fn local_addr(&self) -> CustomResult<SocketAddr> {
        self.listener.local_addr().context(IoSnafu)
    }

    pub async fn run(self, session: SessionHandle) {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(error) => {
                    error!(target: "auto_timer:accept", "error accepting timer connection: {}", error);
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                    continue;
                }
            };

            info!(target: "auto_timer:accept", "automated timer connected from {}", peer);
            if session.send(RaceEvent::AutoTimerConnection { connected: true }).is_err() {
                return;
            }

            let mut lines = BufReader::new(stream).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(_)) => {
                        if session.send(RaceEvent::CaptureAutLap).is_err() {
                            return;
                        }
                    }
                    Ok(None) => break,
                    Err(error) => {
                        warn!(target: "auto_timer:read", "automated timer connection lost: {}", error);
                        break;
                    }
                }
            }

            info!(target: "auto_timer:accept", "automated timer {} disconnected", peer);
            if session.send(RaceEvent::AutoTimerConnection { connected: false }).is_err() {
                return;
            }
        }
    }
}
