use super::{DeviceSession, SessionError};
use crate::wire::{Reply, Request};
use serialport::{ClearBuffer, SerialPort};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const PORT_READ_TIMEOUT_MS: u64 = 100;
const DEFAULT_REPLY_TIMEOUT_MS: u64 = 2000;

struct Link {
    port_name: String,
    writer: Box<dyn SerialPort>,
    reader: BufReader<Box<dyn SerialPort>>,
}

impl Link {
    /// Drops anything received since the last exchange, so a late reply to
    /// an abandoned request cannot answer the next one.
    fn discard_pending(&mut self) -> Result<(), SessionError> {
        let buffered = self.reader.buffer().len();
        if buffered > 0 {
            debug!("{}: discarding {} buffered byte(s)", self.port_name, buffered);
            self.reader.consume(buffered);
        }
        self.writer.clear(ClearBuffer::Input).map_err(std::io::Error::from)?;
        Ok(())
    }
}

/// Device session over a serial port (a Teensy on USB, or the slave side of
/// a native binary's pseudo-terminal).
pub struct SerialSession {
    device_name: String,
    reply_timeout: Duration,
    link: Option<Link>,
}

impl SerialSession {
    pub fn new(device_name: &str) -> Self {
        Self {
            device_name: device_name.to_string(),
            reply_timeout: Duration::from_millis(DEFAULT_REPLY_TIMEOUT_MS),
            link: None,
        }
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    fn transact(&mut self, request: &Request) -> Result<String, SessionError> {
        let link = self.link.as_mut().ok_or(SessionError::NotConnected)?;
        let field = request.field();

        let frame = request.encode()?;
        link.discard_pending()?;
        link.writer.write_all(frame.as_bytes())?;
        link.writer.flush()?;

        let deadline = Instant::now() + self.reply_timeout;
        let mut line = String::new();
        while Instant::now() < deadline {
            // A timed out read keeps its partial line for the next pass
            match link.reader.read_line(&mut line) {
                Ok(0) => {
                    return Err(SessionError::Io(std::io::Error::new(
                        ErrorKind::UnexpectedEof,
                        format!("{} closed", link.port_name),
                    )));
                }
                Ok(_) => {
                    match Reply::decode(&line) {
                        Some(reply) if reply.field == field => {
                            return match reply.err {
                                Some(reason) => Err(SessionError::Rejected {
                                    field: field.to_string(),
                                    reason,
                                }),
                                None => Ok(reply.val.unwrap_or_default()),
                            };
                        }
                        Some(reply) => {
                            debug!("{}: discarding stale reply for '{}'", self.device_name, reply.field);
                        }
                        None => {
                            debug!("{}> {}", self.device_name, line.trim_end());
                        }
                    }
                    line.clear();
                }
                Err(e) if e.kind() == ErrorKind::TimedOut => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(SessionError::Timeout(field.to_string()))
    }
}

impl DeviceSession for SerialSession {
    fn connect(&mut self, port: &str, baud_rate: u32) -> Result<(), SessionError> {
        let open_err = |e: serialport::Error| SessionError::Open {
            port: port.to_string(),
            reason: e.to_string(),
        };

        let writer = serialport::new(port, baud_rate)
            .timeout(Duration::from_millis(PORT_READ_TIMEOUT_MS))
            .open()
            .map_err(open_err)?;
        let reader = writer.try_clone().map_err(open_err)?;

        info!("{} connected on {} at {} baud", self.device_name, port, baud_rate);
        self.link = Some(Link {
            port_name: port.to_string(),
            writer,
            reader: BufReader::new(reader),
        });
        Ok(())
    }

    fn read_state(&mut self, field: &str) -> Result<String, SessionError> {
        self.transact(&Request::Read { field: field.to_string() })
    }

    fn write_state(&mut self, field: &str, value: &str) -> Result<(), SessionError> {
        self.transact(&Request::Write {
            field: field.to_string(),
            val: value.to_string(),
        })
        .map(|_| ())
    }

    fn override_state(&mut self, field: &str, value: &str) -> Result<(), SessionError> {
        self.transact(&Request::Override {
            field: field.to_string(),
            val: value.to_string(),
        })
        .map(|_| ())
    }

    fn release_override(&mut self, field: &str) -> Result<(), SessionError> {
        self.transact(&Request::Release { field: field.to_string() })
            .map(|_| ())
    }

    fn disconnect(&mut self) {
        if let Some(mut link) = self.link.take() {
            if let Err(e) = link.writer.flush() {
                warn!("{}: flush on disconnect failed: {}", self.device_name, e);
            }
            info!("{} disconnected from {}", self.device_name, link.port_name);
        }
    }
}
