//! std stream serial adapter and device discovery.
//!
//! Line settings (baud rate, raw mode) are the device's current ones; set
//! them before opening, e.g. with `stty`.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};
use pothole_core::{SerialError, SerialPort};

use crate::error::{spawn_named, ControllerError};

const READ_CHUNK: usize = 64;

/// Idle wait when a non-blocking reader has nothing.
const WOULD_BLOCK_BACKOFF: Duration = Duration::from_millis(5);

/// [`SerialPort`] over a byte stream.
///
/// A background thread moves bytes from the reader into a queue, so
/// [`bytes_available`](SerialPort::bytes_available) is exact and reads can
/// time out. Bytes received before a read times out stay queued.
///
/// The reader thread exits at end of stream, on a read error, or on the
/// first chunk after the port is dropped.
pub struct StreamPort<W> {
    writer: W,
    rx: Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
    closed: bool,
}

impl<W: Write> StreamPort<W> {
    pub fn new<R>(mut reader: R, writer: W) -> Result<Self, ControllerError>
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        spawn_named("serial-rx", move || {
            let mut buf = [0u8; READ_CHUNK];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => {}
                    Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                        std::thread::sleep(WOULD_BLOCK_BACKOFF);
                    }
                    Err(e) => {
                        warn!("serial: read failed: {}", e);
                        break;
                    }
                }
            }
            trace!("serial: reader finished");
        })?;

        Ok(Self {
            writer,
            rx,
            pending: VecDeque::new(),
            closed: false,
        })
    }

    fn pump(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(chunk) => self.pending.extend(chunk),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
    }
}

impl<W: Write> SerialPort for StreamPort<W> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        self.writer
            .write_all(bytes)
            .and_then(|()| self.writer.flush())
            .map_err(|e| {
                debug!("serial: write failed: {}", e);
                SerialError::Io
            })
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<(), SerialError> {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump();
            let wanted = buf.len();
            if self.pending.len() >= wanted {
                for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..wanted)) {
                    *slot = byte;
                }
                return Ok(());
            }
            if self.closed {
                return Err(SerialError::TransportUnavailable);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(SerialError::Timeout);
            }
            match self.rx.recv_timeout(remaining) {
                Ok(chunk) => self.pending.extend(chunk),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => self.closed = true,
            }
        }
    }

    fn bytes_available(&mut self) -> usize {
        self.pump();
        self.pending.len()
    }
}

/// Open a device file for reading and writing as a [`StreamPort`].
pub fn open_device(path: &str) -> Result<StreamPort<File>, ControllerError> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| {
            debug!("serial: cannot open {}: {}", path, e);
            ControllerError::TransportUnavailable
        })?;
    let reader = file.try_clone().map_err(|e| {
        debug!("serial: cannot clone {}: {}", path, e);
        ControllerError::TransportUnavailable
    })?;
    StreamPort::new(reader, file)
}

/// Open the first candidate device that works.
///
/// # Errors
///
/// [`ControllerError::TransportUnavailable`] if none of them opens.
pub fn open_first<'a>(
    candidates: &[&'a str],
) -> Result<(&'a str, StreamPort<File>), ControllerError> {
    for &path in candidates {
        match open_device(path) {
            Ok(port) => {
                info!("serial: opened {}", path);
                return Ok((path, port));
            }
            Err(ControllerError::Spawn) => return Err(ControllerError::Spawn),
            Err(_) => continue,
        }
    }
    warn!("serial: none of {:?} could be opened", candidates);
    Err(ControllerError::TransportUnavailable)
}
