//! [`DeviceLink`] / [`DeviceReader`] – the serial connection lifecycle.
//!
//! The port is opened exactly once at process start and split into a write
//! half (the [`DeviceLink`], handed to the orchestrator as a
//! [`CommandSink`]) and a read half (the [`DeviceReader`], which drives the
//! framer → decoder pipeline until the transport dies). There is no reopen
//! and no retry: any failure is reported once to the [`TelemetrySink`] and
//! the reader ends.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{info, warn};

use reflex_types::{BridgeError, CommandMessage};

use crate::decoder::{Decoded, decode};
use crate::framer::LineFramer;
use crate::sink::{CommandSink, TelemetrySink};

const READ_CHUNK: usize = 256;

/// Write half of the device connection.
pub struct DeviceLink {
    writer: Mutex<WriteHalf<SerialStream>>,
}

/// Read half of the device connection; consumed by [`run`][Self::run].
pub struct DeviceReader {
    reader: ReadHalf<SerialStream>,
}

impl DeviceLink {
    /// Open the serial port once and split it into its two halves.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Open`] when the port cannot be opened. The
    /// caller treats this as non-fatal and falls back to simulation.
    pub fn open(device: &str, baud: u32) -> Result<(DeviceLink, DeviceReader), BridgeError> {
        let stream = tokio_serial::new(device, baud)
            .open_native_async()
            .map_err(|e| BridgeError::Open(format!("{device}: {e}")))?;
        info!(device, baud, "serial port opened");

        let (reader, writer) = tokio::io::split(stream);
        Ok((
            DeviceLink {
                writer: Mutex::new(writer),
            },
            DeviceReader { reader },
        ))
    }
}

#[async_trait]
impl CommandSink for DeviceLink {
    async fn send(&self, cmd: &CommandMessage) -> Result<(), BridgeError> {
        let mut writer = self.writer.lock().await;
        writer
            .write_all(cmd.as_bytes())
            .await
            .map_err(map_write_error)?;
        writer.flush().await.map_err(map_write_error)
    }
}

/// A closed transport is a normal condition (`NotOpen`), anything else is a
/// real write failure.
fn map_write_error(e: io::Error) -> BridgeError {
    match e.kind() {
        io::ErrorKind::NotConnected | io::ErrorKind::BrokenPipe => BridgeError::NotOpen,
        _ => BridgeError::Write(e.to_string()),
    }
}

impl DeviceReader {
    /// Drive the read loop until the transport fails or closes.
    ///
    /// Every decoded record is handed to `sink`; the terminal transport
    /// error is reported exactly once via
    /// [`TelemetrySink::transport_failed`].
    pub async fn run(self, sink: Arc<dyn TelemetrySink>) {
        let error = match pump(self.reader, sink.as_ref()).await {
            Ok(()) => BridgeError::Transport("device stream closed".to_string()),
            Err(e) => e,
        };
        sink.transport_failed(error).await;
    }
}

/// Read chunks from `reader` and feed the framer → decoder pipeline.
///
/// Generic over [`AsyncRead`] so the pipeline is testable against
/// in-memory streams. Returns `Ok(())` on clean end-of-stream and
/// [`BridgeError::Transport`] on a read failure; decode failures and
/// diagnostic lines are logged here and never end the loop.
pub async fn pump<R>(mut reader: R, sink: &dyn TelemetrySink) -> Result<(), BridgeError>
where
    R: AsyncRead + Unpin,
{
    let mut framer = LineFramer::new();
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let n = reader
            .read(&mut chunk)
            .await
            .map_err(|e| BridgeError::Transport(e.to_string()))?;
        if n == 0 {
            return Ok(());
        }

        for record in framer.push(&chunk[..n]) {
            match decode(&record) {
                Ok(Decoded::Event(event)) => sink.telemetry(event).await,
                Ok(Decoded::Diagnostic) => info!(line = %record, "device log"),
                Err(e) => warn!(error = %e, "dropped malformed record"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflex_types::{SensorEvent, TelemetryEvent};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingSink {
        events: StdMutex<Vec<TelemetryEvent>>,
        failures: StdMutex<Vec<BridgeError>>,
    }

    #[async_trait]
    impl TelemetrySink for RecordingSink {
        async fn telemetry(&self, event: TelemetryEvent) {
            self.events.lock().unwrap().push(event);
        }

        async fn transport_failed(&self, error: BridgeError) {
            self.failures.lock().unwrap().push(error);
        }
    }

    #[tokio::test]
    async fn pump_forwards_events_and_skips_noise() {
        let stream: &[u8] = b"boot v1.2\n{\"type\":\"distance\",\"dist\":42.5}\n{\"type\":\"distance\",\"dist\":}\n{\"type\":\"ready\",\"level\":1}\n";
        let sink = RecordingSink::default();

        pump(stream, &sink).await.unwrap();

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 2, "diagnostic and malformed records emit nothing");
        assert!(matches!(
            events[0],
            TelemetryEvent::Sensor(SensorEvent::Distance { .. })
        ));
        assert!(matches!(
            events[1],
            TelemetryEvent::Sensor(SensorEvent::Ready { level: 1 })
        ));
    }

    #[tokio::test]
    async fn pump_survives_malformed_record_and_continues() {
        let stream: &[u8] = b"{\"type\":\"distance\",\"dist\":\n{\"type\":\"escape\",\"reaction\":250}\n";
        let sink = RecordingSink::default();

        pump(stream, &sink).await.unwrap();

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), "escape");
    }

    #[tokio::test]
    async fn pump_returns_ok_on_end_of_stream() {
        let sink = RecordingSink::default();
        assert!(pump(&b""[..], &sink).await.is_ok());
        assert!(sink.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn open_nonexistent_port_is_an_open_error() {
        let result = DeviceLink::open("/dev/tty-reflex-does-not-exist", 9600);
        assert!(matches!(result, Err(BridgeError::Open(_))));
    }

    #[test]
    fn write_error_mapping_distinguishes_not_open() {
        let closed = io::Error::new(io::ErrorKind::NotConnected, "gone");
        assert_eq!(map_write_error(closed), BridgeError::NotOpen);

        let broken = io::Error::new(io::ErrorKind::BrokenPipe, "gone");
        assert_eq!(map_write_error(broken), BridgeError::NotOpen);

        let other = io::Error::other("io exploded");
        assert!(matches!(map_write_error(other), BridgeError::Write(_)));
    }
}
