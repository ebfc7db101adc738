/*++

Licensed under the Apache-2.0 license.

File Name:

    wire.rs

Abstract:

    File contains the bootstrap frame codec: start-of-frame sync, the
    fixed ASCII request/response layout, hex and binary payload modes,
    CRC-32C validation and the chunked data-transfer primitive.

--*/

use bitflags::bitflags;
use crc::{Crc, Digest, CRC_32_ISCSI};
use fwu_drivers::{cprintln, Console};
use fwu_error::{FwuError, FwuResult};

use crate::commands::CommandId;

/// Start-of-frame byte.
pub const BOOTSTRAP_SOF: u8 = b'>';

/// Width of the hex-encoded numeric frame fields.
const HEXFLD_LEN: usize = 8;

/// cmd ',' arg0[8] ',' len[8] delim
const FIXED_LEN: usize = 1 + 1 + HEXFLD_LEN + 1 + HEXFLD_LEN + 1;

static CRC32C: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

bitflags! {
    /// Per-request framing flags.
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub struct ReqFlags: u8 {
        /// Payload travels as raw bytes instead of hex pairs.
        const BINARY = 1 << 0;
    }
}

/// A validated request header. The payload, if any, is still on the wire
/// when this is handed to a handler; the handler pulls it through the
/// channel so oversized payloads are never buffered blindly.
#[derive(Debug, Copy, Clone)]
pub struct Request {
    pub cmd: CommandId,
    pub flags: ReqFlags,
    pub arg0: u32,
    pub len: u32,
}

impl Request {
    pub fn is_cmd(&self, cmd: CommandId) -> bool {
        self.cmd == cmd
    }
}

/// Outcome of one chunk of a bulk transfer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum XferOutcome {
    /// Chunk landed; this many bytes were received.
    Received(usize),

    /// Chunk was refused (and NACKed); the transfer is short.
    Failed,
}

/// Framed request/response channel over a console transport.
pub struct Channel<C: Console> {
    console: C,
    req_flags: ReqFlags,
    crc: Option<Digest<'static, u32>>,
}

impl<C: Console> Channel<C> {
    pub fn new(console: C) -> Self {
        Self {
            console,
            req_flags: ReqFlags::empty(),
            crc: None,
        }
    }

    pub fn into_console(self) -> C {
        self.console
    }

    fn get_exact(&mut self, buf: &mut [u8]) -> FwuResult<()> {
        for byte in buf.iter_mut() {
            *byte = self.console.getc()?;
        }
        Ok(())
    }

    /// Receives the next request frame.
    ///
    /// Blocks for start-of-frame, then reads and validates the fixed
    /// part. Requests without a payload have their CRC checked here;
    /// requests with a payload are checked once the payload has been
    /// pulled. A malformed frame is `BOOTSTRAP_GARBLED_REQUEST`; a dead
    /// transport is `DRIVER_CONSOLE_CLOSED`.
    pub fn rx_req(&mut self) -> FwuResult<Request> {
        self.req_flags = ReqFlags::empty();
        self.crc = None;

        // Synchronize on SOF.
        while self.console.getc()? != BOOTSTRAP_SOF {}

        let mut fixed = [0u8; FIXED_LEN];
        self.get_exact(&mut fixed)?;

        let pay_delim = fixed[FIXED_LEN - 1];
        if fixed[1] != b',' || fixed[10] != b',' || (pay_delim != b'#' && pay_delim != b'%') {
            return Err(FwuError::BOOTSTRAP_GARBLED_REQUEST);
        }
        let (arg0, len) = match (atohex(&fixed[2..10]), atohex(&fixed[11..19])) {
            (Some(arg0), Some(len)) => (arg0, len),
            _ => return Err(FwuError::BOOTSTRAP_GARBLED_REQUEST),
        };

        if pay_delim == b'%' {
            self.req_flags |= ReqFlags::BINARY;
        }

        let mut crc = CRC32C.digest();
        crc.update(&fixed);
        self.crc = Some(crc);

        let req = Request {
            cmd: CommandId(fixed[0]),
            flags: self.req_flags,
            arg0,
            len,
        };

        // Commands with payloads are checked after the payload.
        if req.len == 0 && !self.rx_crc_ok()? {
            return Err(FwuError::BOOTSTRAP_GARBLED_REQUEST);
        }
        Ok(req)
    }

    /// Pulls `req.len` payload bytes into `data`, decoding hex mode.
    pub fn rx_payload(&mut self, req: &Request, data: &mut [u8]) -> FwuResult<()> {
        let len = req.len as usize;
        let data = &mut data[..len];

        if req.flags.contains(ReqFlags::BINARY) {
            self.get_exact(data)?;
            if let Some(crc) = self.crc.as_mut() {
                crc.update(data);
            }
        } else {
            for byte in data.iter_mut() {
                let mut pair = [0u8; 2];
                self.get_exact(&mut pair)?;
                *byte = match (hex2nibble(pair[0]), hex2nibble(pair[1])) {
                    (Some(hi), Some(lo)) => (hi << 4) | lo,
                    _ => 0,
                };
                if let Some(crc) = self.crc.as_mut() {
                    crc.update(&pair);
                }
            }
        }
        Ok(())
    }

    /// Reads the frame trailer and compares it against the running CRC.
    pub fn rx_crc_ok(&mut self) -> FwuResult<bool> {
        let mut hexdigest = [0u8; HEXFLD_LEN];
        self.get_exact(&mut hexdigest)?;
        let sent = atohex(&hexdigest);
        let computed = match self.crc.take() {
            Some(crc) => crc.finalize(),
            None => return Ok(false),
        };
        Ok(sent == Some(computed))
    }

    /// Pulls the payload and validates the trailer in one step.
    pub fn rx_data_crc(&mut self, req: &Request, data: &mut [u8]) -> FwuResult<bool> {
        self.rx_payload(req, data)?;
        self.rx_crc_ok()
    }

    /// Receives one DATA chunk of a bulk transfer into `data`, which is
    /// the staging window starting at `offset`.
    ///
    /// The chunk is acknowledged with its offset; misordered, oversized
    /// or corrupt chunks are NACKed with a specific reason and reported
    /// as a failed transfer, never silently dropped.
    pub fn rx_data(&mut self, data: &mut [u8], offset: usize) -> FwuResult<XferOutcome> {
        let mut errtxt = "Expected DATA";
        let mut arg = 0;

        match self.rx_req() {
            Ok(req) if req.is_cmd(CommandId::DATA) => {
                arg = req.arg0;
                if req.len as usize > data.len() {
                    errtxt = "Too much data";
                } else if req.arg0 as usize != offset {
                    errtxt = "Data misordering";
                } else {
                    let len = req.len as usize;
                    if self.rx_data_crc(&req, &mut data[..len])? {
                        self.tx(CommandId::ACK, req.arg0, &[]);
                        return Ok(XferOutcome::Received(len));
                    }
                    errtxt = "CRC failure";
                }
            }
            Ok(_) => {}
            Err(err) if err == FwuError::BOOTSTRAP_GARBLED_REQUEST => {}
            Err(err) => return Err(err),
        }

        self.tx(CommandId::NACK, arg, errtxt.as_bytes());
        Ok(XferOutcome::Failed)
    }

    /// Sends one response frame. The payload is encoded in the mode of
    /// the request being answered.
    pub fn tx(&mut self, cmd: CommandId, status: u32, payload: &[u8]) {
        let binary = self.req_flags.contains(ReqFlags::BINARY);

        let mut fixed = [0u8; FIXED_LEN];
        fixed[0] = cmd.into();
        fixed[1] = b',';
        hex2str(&mut fixed[2..10], status);
        fixed[10] = b',';
        hex2str(&mut fixed[11..19], payload.len() as u32);
        fixed[FIXED_LEN - 1] = if binary { b'%' } else { b'#' };

        let mut crc = CRC32C.digest();
        self.console.putc(BOOTSTRAP_SOF);
        self.put_all(&fixed);
        crc.update(&fixed);

        if binary {
            self.put_all(payload);
            crc.update(payload);
        } else {
            for &byte in payload {
                let mut pair = [0u8; 2];
                hex2str_byte(&mut pair, byte);
                self.put_all(&pair);
                crc.update(&pair);
            }
        }

        let mut hexdigest = [0u8; HEXFLD_LEN];
        hex2str(&mut hexdigest, crc.finalize());
        self.put_all(&hexdigest);
        self.console.flush();
    }

    pub fn tx_ack(&mut self) {
        self.tx(CommandId::ACK, 0, &[]);
    }

    pub fn tx_ack_data(&mut self, data: &[u8]) {
        self.tx(CommandId::ACK, 0, data);
    }

    pub fn tx_ack_data_arg(&mut self, arg: u32, data: &[u8]) {
        self.tx(CommandId::ACK, arg, data);
    }

    pub fn tx_ack_str(&mut self, text: &str) {
        self.tx(CommandId::ACK, 0, text.as_bytes());
    }

    pub fn tx_nack(&mut self, reason: &str) {
        cprintln!("[bootstrap] NACK: {}", reason);
        self.tx(CommandId::NACK, 0, reason.as_bytes());
    }

    pub fn tx_nack_rc(&mut self, reason: &str, rc: u32) {
        cprintln!("[bootstrap] NACK: {}", reason);
        self.tx(CommandId::NACK, rc, reason.as_bytes());
    }

    fn put_all(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.console.putc(byte);
        }
    }
}

fn hex2nibble(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'a'..=b'f' => Some(10 + ch - b'a'),
        b'A'..=b'F' => Some(10 + ch - b'A'),
        _ => None,
    }
}

fn atohex(buf: &[u8]) -> Option<u32> {
    let mut value = 0u32;
    for &ch in buf {
        value = (value << 4) | u32::from(hex2nibble(ch)?);
    }
    Some(value)
}

fn hex2str_byte(buf: &mut [u8], val: u8) {
    const CVT: &[u8; 16] = b"0123456789ABCDEF";
    buf[0] = CVT[usize::from(val >> 4)];
    buf[1] = CVT[usize::from(val & 0xF)];
}

fn hex2str(buf: &mut [u8], val: u32) {
    hex2str_byte(&mut buf[0..2], (val >> 24) as u8);
    hex2str_byte(&mut buf[2..4], (val >> 16) as u8);
    hex2str_byte(&mut buf[4..6], (val >> 8) as u8);
    hex2str_byte(&mut buf[6..8], val as u8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_field_round_trip() {
        let mut buf = [0u8; 8];
        hex2str(&mut buf, 0xDEAD_BEEF);
        assert_eq!(&buf, b"DEADBEEF");
        assert_eq!(atohex(&buf), Some(0xDEAD_BEEF));
        assert_eq!(atohex(b"0000002a"), Some(42));
        assert_eq!(atohex(b"00zz002a"), None);
    }
}
