//! Directory-backed queue transport.
//!
//! Every queue is a directory below the endpoint and every message is one
//! regular file in it. Files whose names start with `.` are in the middle of
//! being written and are never delivered.

use std::fs;
use std::io::{self, Write};
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use camino::{Utf8Path, Utf8PathBuf};
use tracing::warn;

use super::{InboundMessage, QueueError, QueueSource, ResponseChannel};

const SPOOL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::queue::spool");

/// A queue stored as files in one directory.
#[derive(Debug)]
pub struct SpoolQueue {
    name: String,
    directory: Utf8PathBuf,
    sequence: AtomicU64,
}

impl SpoolQueue {
    /// Opens the queue `name` below `root`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::MissingQueue`] when the queue directory does not
    /// exist.
    pub fn open(root: &Utf8Path, name: &str) -> Result<Self, QueueError> {
        let directory = root.join(name);
        if !directory.is_dir() {
            return Err(QueueError::MissingQueue {
                name: name.to_owned(),
                location: directory,
            });
        }
        Ok(Self {
            name: name.to_owned(),
            directory,
            sequence: AtomicU64::new(0),
        })
    }

    /// Queue name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory holding the queue's messages.
    #[must_use]
    pub fn directory(&self) -> &Utf8Path {
        &self.directory
    }

    fn receive_error(&self, source: io::Error) -> QueueError {
        QueueError::Receive {
            queue: self.name.clone(),
            source: Arc::new(source),
        }
    }

    fn send_error(&self, source: io::Error) -> QueueError {
        QueueError::Send {
            queue: self.name.clone(),
            source: Arc::new(source),
        }
    }

    fn pending_names(&self) -> Result<Vec<String>, QueueError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.directory).map_err(|err| self.receive_error(err))? {
            let entry = entry.map_err(|err| self.receive_error(err))?;
            let is_file = entry
                .file_type()
                .map_err(|err| self.receive_error(err))?
                .is_file();
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if is_file && !name.starts_with('.') {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn next_file_name(&self) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or_default();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{nanos:020}-{}-{sequence:06}.yml", process::id())
    }
}

impl QueueSource for SpoolQueue {
    fn receive(&self, max: usize) -> Result<Vec<InboundMessage>, QueueError> {
        let mut batch = Vec::new();
        for name in self.pending_names()? {
            if batch.len() == max {
                break;
            }
            let bytes = match fs::read(self.directory.join(&name)) {
                Ok(bytes) => bytes,
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(self.receive_error(err)),
            };
            let body = String::from_utf8(bytes).ok();
            if body.is_none() {
                warn!(
                    target: SPOOL_TARGET,
                    queue = %self.name,
                    message_id = %name,
                    "message body is not valid UTF-8"
                );
            }
            batch.push(InboundMessage::new(name, body));
        }
        Ok(batch)
    }

    fn delete(&self, message: &InboundMessage) -> Result<(), QueueError> {
        fs::remove_file(self.directory.join(message.id())).map_err(|err| QueueError::Delete {
            queue: self.name.clone(),
            message_id: message.id().to_owned(),
            reason: err.to_string(),
        })
    }
}

impl ResponseChannel for SpoolQueue {
    fn send(&self, body: &str) -> Result<(), QueueError> {
        let mut file = tempfile::Builder::new()
            .prefix(".")
            .suffix(".tmp")
            .tempfile_in(&self.directory)
            .map_err(|err| self.send_error(err))?;
        file.write_all(body.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|err| self.send_error(err))?;
        let target = self.directory.join(self.next_file_name());
        file.persist_noclobber(&target)
            .map_err(|err| self.send_error(err.error))?;
        Ok(())
    }
}
