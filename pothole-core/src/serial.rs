//! Byte-oriented serial channel trait and error types.

use core::time::Duration;

/// Error type for serial channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerialError {
    /// The peripheral could not be opened or has gone away.
    TransportUnavailable,
    /// A blocking read exceeded its bound.
    Timeout,
    /// Line or device I/O failed.
    Io,
    /// Unusable channel parameters (e.g. zero baud rate).
    Config,
}

impl core::fmt::Display for SerialError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::TransportUnavailable => write!(f, "transport unavailable"),
            Self::Timeout => write!(f, "timed out"),
            Self::Io => write!(f, "I/O error"),
            Self::Config => write!(f, "invalid channel configuration"),
        }
    }
}

impl embedded_io::Error for SerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            Self::TransportUnavailable => embedded_io::ErrorKind::NotConnected,
            Self::Timeout => embedded_io::ErrorKind::TimedOut,
            Self::Io => embedded_io::ErrorKind::Other,
            Self::Config => embedded_io::ErrorKind::InvalidInput,
        }
    }
}

/// Blocking byte channel.
///
/// A channel has a single owner; implementations are not expected to
/// tolerate concurrent writers.
pub trait SerialPort {
    /// Transmit `bytes` in order. Returns once the last byte is on the wire
    /// or handed to the driver.
    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError>;

    /// Fill `buf` completely, waiting at most `timeout` in total.
    ///
    /// # Errors
    ///
    /// [`SerialError::Timeout`] if `buf` could not be filled in time.
    /// Whether bytes received before the timeout survive for the next read
    /// depends on the channel.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<(), SerialError>;

    /// Bytes that can be read without waiting.
    ///
    /// Some channels can only give a hint here; see the implementation.
    fn bytes_available(&mut self) -> usize;
}

impl<T: SerialPort + ?Sized> SerialPort for &mut T {
    #[inline]
    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        (**self).write(bytes)
    }

    #[inline]
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<(), SerialError> {
        (**self).read(buf, timeout)
    }

    #[inline]
    fn bytes_available(&mut self) -> usize {
        (**self).bytes_available()
    }
}

#[cfg(feature = "std")]
impl<T: SerialPort + ?Sized> SerialPort for std::boxed::Box<T> {
    #[inline]
    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        (**self).write(bytes)
    }

    #[inline]
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<(), SerialError> {
        (**self).read(buf, timeout)
    }

    #[inline]
    fn bytes_available(&mut self) -> usize {
        (**self).bytes_available()
    }
}

/// `embedded_io::Write` view of a [`SerialPort`], for streaming serializers.
pub struct SerialWriter<'a, P: ?Sized> {
    port: &'a mut P,
}

impl<'a, P: SerialPort + ?Sized> SerialWriter<'a, P> {
    pub fn new(port: &'a mut P) -> Self {
        Self { port }
    }
}

impl<P: SerialPort + ?Sized> embedded_io::ErrorType for SerialWriter<'_, P> {
    type Error = SerialError;
}

impl<P: SerialPort + ?Sized> embedded_io::Write for SerialWriter<'_, P> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.port.write(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Discard whatever is waiting on `port`, returning up to `N` of the bytes.
///
/// Used for modem chatter that is logged but never interpreted.
pub fn drain<P: SerialPort + ?Sized, const N: usize>(port: &mut P) -> heapless::Vec<u8, N> {
    let mut out = heapless::Vec::new();
    let mut byte = [0u8; 1];
    // Bounded so a chattering line cannot stall the caller
    for _ in 0..N {
        if port.bytes_available() == 0 {
            break;
        }
        if port.read(&mut byte, Duration::ZERO).is_err() {
            break;
        }
        let _ = out.push(byte[0]);
    }
    out
}
