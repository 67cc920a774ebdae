//! Serial/UART AT command channel for Quectel modems

use crate::hardware::{CommError, CommResult, FinalResult, ModemInterface, ModemResponse};
use log::trace;
use serialport::SerialPort;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::time::{Duration, Instant};

/// Longest command accepted by the modem's input buffer
const MAX_COMMAND_LENGTH: usize = 256;

/// Read timeout of the underlying port; bounds each blocking read
const PORT_READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Timeout for the `AT` probe used as power detection
const PROBE_TIMEOUT: Duration = Duration::from_millis(300);

/// How long a late reply to a timed out command is waited for before the next command
const STALE_REPLY_TIMEOUT: Duration = Duration::from_millis(500);

/// AT command channel over any line oriented byte stream
pub struct AtChannel<R, W> {
    reader: R,
    writer: W,
    pending: Vec<u8>,
    /// The last command timed out and its reply may still arrive
    stale: bool,
}

/// AT command channel on a serial port
pub type SerialModem = AtChannel<BufReader<Box<dyn SerialPort>>, Box<dyn SerialPort>>;

impl SerialModem {
    /// Open the modem's AT port
    pub fn open(port_name: &str, baud_rate: u32) -> CommResult<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(PORT_READ_TIMEOUT)
            .open()
            .map_err(|e| CommError::Io {
                operation: format!("open {}", port_name),
                details: e.to_string(),
            })?;
        let reader = port.try_clone().map_err(|e| CommError::Io {
            operation: "clone port".to_string(),
            details: e.to_string(),
        })?;

        Ok(AtChannel::new(BufReader::new(reader), port))
    }
}

impl<R: BufRead, W: Write> AtChannel<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            pending: Vec::with_capacity(256),
            stale: false,
        }
    }

    fn write_command(&mut self, command: &str) -> CommResult<()> {
        if command.len() > MAX_COMMAND_LENGTH {
            return Err(CommError::BufferError {
                length: command.len(),
                limit: MAX_COMMAND_LENGTH,
            });
        }

        self.writer
            .write_all(command.as_bytes())
            .and_then(|_| self.writer.write_all(b"\r\n"))
            .and_then(|_| self.writer.flush())
            .map_err(|e| CommError::io("write", e))
    }

    /// Read one complete line, keeping partial data across read timeouts
    fn read_line(&mut self, deadline: Instant) -> CommResult<Option<String>> {
        loop {
            if Instant::now() >= deadline {
                return Ok(None);
            }
            match self.reader.read_until(b'\n', &mut self.pending) {
                Ok(0) => return Err(CommError::ConnectionLost),
                Ok(_) if self.pending.ends_with(b"\n") => {
                    let line = String::from_utf8_lossy(&self.pending).trim().to_string();
                    self.pending.clear();
                    return Ok(Some(line));
                }
                Ok(_) => return Err(CommError::ConnectionLost),
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                    continue;
                }
                Err(e) => return Err(CommError::io("read", e)),
            }
        }
    }

    /// Consume the reply of a timed out command up to its final result code
    fn discard_stale_reply(&mut self) -> CommResult<()> {
        let deadline = Instant::now() + STALE_REPLY_TIMEOUT;
        while let Some(line) = self.read_line(deadline)? {
            trace!("Discarding stale line {:?}", line);
            if FinalResult::from_line(&line).is_some() {
                break;
            }
        }
        Ok(())
    }

    fn read_response(&mut self, command: &str, timeout: Duration) -> CommResult<ModemResponse> {
        let deadline = Instant::now() + timeout;
        let mut lines = Vec::new();

        loop {
            let line = match self.read_line(deadline)? {
                Some(line) => line,
                None => {
                    return Err(CommError::Timeout {
                        command: command.to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    })
                }
            };

            // Blank separators and the command echo
            if line.is_empty() || line == command {
                continue;
            }

            match FinalResult::from_line(&line) {
                Some(FinalResult::Ok) => return Ok(ModemResponse::ok(lines)),
                Some(FinalResult::Error) => {
                    if line != "ERROR" {
                        lines.push(line);
                    }
                    return Ok(ModemResponse::error(lines));
                }
                None => lines.push(line),
            }
        }
    }
}

impl<R: BufRead, W: Write> ModemInterface for AtChannel<R, W> {
    fn command(&mut self, command: &str, timeout: Duration) -> CommResult<ModemResponse> {
        if self.stale {
            self.stale = false;
            self.discard_stale_reply()?;
        }
        self.pending.clear();
        self.write_command(command)?;

        let response = match self.read_response(command, timeout) {
            Err(e @ CommError::Timeout { .. }) => {
                self.stale = true;
                return Err(e);
            }
            other => other?,
        };
        trace!("{} -> {} line(s)", command, response.lines.len());
        Ok(response)
    }

    fn is_powered(&mut self) -> bool {
        matches!(self.command("AT", PROBE_TIMEOUT), Ok(response) if response.is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    fn channel(input: &str) -> AtChannel<Cursor<Vec<u8>>, Vec<u8>> {
        AtChannel::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    const TIMEOUT: Duration = Duration::from_millis(200);

    #[test]
    fn test_command_is_terminated() {
        let mut modem = channel("OK\r\n");
        modem.command("AT+QGPS=1", TIMEOUT).unwrap();
        assert_eq!(modem.writer, b"AT+QGPS=1\r\n");
    }

    #[test]
    fn test_information_lines_collected() {
        let mut modem = channel(
            "AT+QGPSLOC=2\r\n\r\n+QGPSLOC: 061951.000,41.02044,-75.17022,1.3,285.9,3,000.00,0.0,0.0,110324,06\r\n\r\nOK\r\n",
        );
        let response = modem.command("AT+QGPSLOC=2", TIMEOUT).unwrap();
        assert!(response.is_ok());
        assert_eq!(response.lines.len(), 1);
        assert!(response.payload_line().starts_with("+QGPSLOC: 061951.000"));
    }

    #[test]
    fn test_cme_error_terminates_response() {
        let mut modem = channel("\r\n+CME ERROR: 516\r\n");
        let response = modem.command("AT+QGPSLOC=2", TIMEOUT).unwrap();
        assert_eq!(response.result, FinalResult::Error);
        assert_eq!(response.payload_line(), "+CME ERROR: 516");
    }

    #[test]
    fn test_bare_error() {
        let mut modem = channel("ERROR\r\n");
        let response = modem.command("AT+QGPSEND", TIMEOUT).unwrap();
        assert!(response.lines.is_empty());
        assert_eq!(response.payload_line(), "ERROR");
    }

    #[test]
    fn test_closed_stream() {
        let mut modem = channel("+QGPSLOC: 0612");
        assert_eq!(
            modem.command("AT+QGPSLOC=2", TIMEOUT),
            Err(CommError::ConnectionLost)
        );
    }

    #[test]
    fn test_oversized_command_rejected() {
        let mut modem = channel("OK\r\n");
        let command = format!("AT{}", "X".repeat(MAX_COMMAND_LENGTH));
        assert!(matches!(
            modem.command(&command, TIMEOUT),
            Err(CommError::BufferError { .. })
        ));
        assert!(modem.writer.is_empty());
    }

    struct SilentPort;

    impl Read for SilentPort {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            std::thread::sleep(Duration::from_millis(2));
            Err(std::io::Error::new(ErrorKind::TimedOut, "no data"))
        }
    }

    #[test]
    fn test_silent_modem_times_out() {
        let mut modem = AtChannel::new(BufReader::new(SilentPort), Vec::new());
        let result = modem.command("AT+QGPSLOC=2", Duration::from_millis(20));
        assert!(matches!(result, Err(CommError::Timeout { timeout_ms: 20, .. })));
        assert!(!modem.is_powered());
    }

    /// Delivers each chunk no earlier than its offset from creation
    struct LatePort {
        started: Instant,
        chunks: Vec<(Duration, &'static str)>,
    }

    impl Read for LatePort {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.chunks.first() {
                Some((at, _)) if self.started.elapsed() >= *at => {
                    let (_, chunk) = self.chunks.remove(0);
                    buf[..chunk.len()].copy_from_slice(chunk.as_bytes());
                    Ok(chunk.len())
                }
                _ => {
                    std::thread::sleep(Duration::from_millis(2));
                    Err(std::io::Error::new(ErrorKind::TimedOut, "no data"))
                }
            }
        }
    }

    #[test]
    fn test_late_reply_discarded_before_next_command() {
        let port = LatePort {
            started: Instant::now(),
            chunks: vec![
                (
                    Duration::from_millis(60),
                    "+QGPSLOC: 061951.000,41.02044,-75.17022,1.3,285.9,3,000.00,0.0,0.0,110324,06\r\nOK\r\n",
                ),
                (Duration::ZERO, "OK\r\n"),
                (
                    Duration::ZERO,
                    "+QGPSLOC: 061952.000,41.02050,-75.17030,1.1,286.0,3,000.00,0.0,0.0,110324,07\r\nOK\r\n",
                ),
            ],
        };
        let mut modem = AtChannel::new(BufReader::new(port), Vec::new());

        let first = modem.command("AT+QGPSLOC=2", Duration::from_millis(30));
        assert!(matches!(first, Err(CommError::Timeout { .. })));

        let probe = modem.command("AT", TIMEOUT).unwrap();
        assert!(probe.is_ok());
        assert!(probe.lines.is_empty());

        let second = modem.command("AT+QGPSLOC=2", TIMEOUT).unwrap();
        assert!(second.payload_line().starts_with("+QGPSLOC: 061952.000"));
    }

    #[test]
    fn test_probe_reports_power() {
        let mut modem = channel("AT\r\nOK\r\n");
        assert!(modem.is_powered());
    }
}
