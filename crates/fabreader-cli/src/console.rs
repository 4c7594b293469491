//! Emulated card console.
//!
//! Reads one command per stdin line and applies it to the mock secure
//! element:
//!
//! ```text
//! present 04ABCDEF            supported card enters the field
//! present 04ABCDEF unsupported
//! remove                      field is empty again
//! fault                       reader IC stops answering
//! restore                     reader IC answers again
//! ```

use anyhow::{Context, bail};
use fabreader_core::CardUid;
use fabreader_hardware::mock::MockSecureElementHandle;
use std::io::BufRead;
use std::str::FromStr;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Present { uid: CardUid, supported: bool },
    Remove,
    Fault,
    Restore,
}

impl FromStr for ConsoleCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> anyhow::Result<Self> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            bail!("empty command");
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "present" => {
                let uid = words.next().context("usage: present <hex uid> [unsupported]")?;
                let uid = CardUid::from_hex(uid)?;
                let supported = match words.next() {
                    None => true,
                    Some("unsupported") => false,
                    Some(other) => bail!("unexpected argument '{other}'"),
                };
                ConsoleCommand::Present { uid, supported }
            }
            "remove" => ConsoleCommand::Remove,
            "fault" => ConsoleCommand::Fault,
            "restore" => ConsoleCommand::Restore,
            other => bail!("unknown command '{other}'"),
        };

        if let Some(extra) = words.next() {
            bail!("unexpected argument '{extra}'");
        }
        Ok(command)
    }
}

impl ConsoleCommand {
    pub async fn apply(&self, element: &MockSecureElementHandle) {
        match self {
            ConsoleCommand::Present { uid, supported } => {
                // Known cards keep their keys; only new unsupported ones
                // need registering.
                if !*supported {
                    element.add_card(uid.as_bytes().to_vec(), false).await;
                }
                element.present(uid.as_bytes()).await;
                info!(%uid, supported, "Card placed in field");
            }
            ConsoleCommand::Remove => {
                element.remove().await;
                info!("Card removed from field");
            }
            ConsoleCommand::Fault => {
                element.set_responding(false).await;
                warn!("Secure element fault injected");
            }
            ConsoleCommand::Restore => {
                element.set_responding(true).await;
                info!("Secure element restored");
            }
        }
    }
}

/// Start reading console commands from stdin until `shutdown` fires.
///
/// Stdin is read on a plain thread so a pending read never holds up
/// runtime shutdown.
pub fn spawn(element: MockSecureElementHandle, shutdown: CancellationToken) -> JoinHandle<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let reader = std::thread::Builder::new()
        .name("card-console".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = reader {
        warn!("Card console unavailable: {}", e);
    }

    tokio::spawn(async move {
        loop {
            let line = tokio::select! {
                _ = shutdown.cancelled() => break,
                line = rx.recv() => match line {
                    Some(line) => line,
                    None => break,
                },
            };
            if line.trim().is_empty() {
                continue;
            }

            match line.parse::<ConsoleCommand>() {
                Ok(command) => command.apply(&element).await,
                Err(e) => warn!("Console: {:#}", e),
            }
        }
        debug!("Card console stopped");
    })
}
