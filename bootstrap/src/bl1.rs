/*++

Licensed under the Apache-2.0 license.

File Name:

    bl1.rs

Abstract:

    File contains the BL1 bootstrap monitor: the early-boot subset of
    the provisioning commands, including strap override, SJTAG unlock
    and authenticated firmware-update entry.

--*/

use fwu_drivers::{cprintln, Console, Key32, Otp, Sjtag, Trng};
use fwu_error::{FwuError, FwuResult};

use crate::commands::CommandId;
use crate::io::IoPolicy;
use crate::otp_cmds;
use crate::wire::{Channel, Request, XferOutcome};

/// Hardware services the BL1 monitor runs against.
pub trait Bl1Platform: Otp + Trng + Sjtag {
    fn version_string(&self) -> &'static str;

    /// Latches a strapping override for the rest of the boot.
    fn set_strapping(&mut self, value: u8);

    /// Authenticates the staged firmware-update image (signature chain
    /// verification is the platform's black box).
    fn authenticate(&mut self, image: &[u8]) -> FwuResult<()>;

    /// Arms the firmware-update path for the next boot stage.
    fn trigger_fwu(&mut self);

    /// Validates and arms execution of the downloaded code; the jump
    /// happens once the monitor has exited and the transport is quiet.
    fn execute(&mut self, offset: usize) -> FwuResult<()>;
}

/// BL1 bootstrap monitor.
///
/// Downloads land as high in the staging region as possible, 256-byte
/// aligned, and are registered with the IO policy as a RAM-resident FIP
/// for the authenticate path.
pub struct Bl1Monitor<'a, C: Console, P: Bl1Platform> {
    channel: Channel<C>,
    platform: P,
    staging: &'a mut [u8],
    io: IoPolicy,
    received: Option<(usize, usize)>,
}

impl<'a, C: Console, P: Bl1Platform> Bl1Monitor<'a, C, P> {
    pub fn new(console: C, platform: P, staging: &'a mut [u8], io: IoPolicy) -> Self {
        Self {
            channel: Channel::new(console),
            platform,
            staging,
            io,
            received: None,
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn io_policy(&self) -> &IoPolicy {
        &self.io
    }

    /// Staged download as (offset, length), once one has completed.
    pub fn received(&self) -> Option<(usize, usize)> {
        self.received
    }

    /// Serves requests until continue-boot, a successful authenticate or
    /// execute, or loss of the transport.
    pub fn run(&mut self) -> FwuResult<()> {
        cprintln!("*** ENTERING BOOTSTRAP MONITOR ***");
        let result = self.serve();
        cprintln!("*** EXITING BOOTSTRAP MONITOR ***");
        result
    }

    fn serve(&mut self) -> FwuResult<()> {
        loop {
            let req = match self.channel.rx_req() {
                Ok(req) => req,
                Err(err) if err == FwuError::BOOTSTRAP_GARBLED_REQUEST => {
                    self.channel.tx_nack("Garbled command");
                    continue;
                }
                Err(err) => return Err(err),
            };

            if req.is_cmd(CommandId::CONT) {
                self.channel.tx_ack();
                return Ok(());
            } else if req.is_cmd(CommandId::VERS) {
                let version = self.platform.version_string();
                self.channel.tx_ack_data(version.as_bytes());
            } else if req.is_cmd(CommandId::SEND) {
                self.handle_send_data(&req)?;
            } else if req.is_cmd(CommandId::STRAP) {
                self.channel.tx_ack();
                self.platform.set_strapping(req.arg0 as u8);
            } else if req.is_cmd(CommandId::OTP_DATA) {
                otp_cmds::handle_otp_data(&mut self.channel, &mut self.platform, &req)?;
            } else if req.is_cmd(CommandId::OTP_RANDOM) {
                otp_cmds::handle_otp_random(&mut self.channel, &mut self.platform, &req)?;
            } else if req.is_cmd(CommandId::OTP_COMMIT) {
                if self.platform.commit_emulation().is_ok() {
                    self.channel.tx_ack();
                } else {
                    self.channel.tx_nack("OTP commit failed");
                }
            } else if req.is_cmd(CommandId::AUTH) {
                if self.handle_auth() {
                    return Ok(());
                }
            } else if req.is_cmd(CommandId::EXEC) {
                if self.handle_exec() {
                    return Ok(());
                }
            } else if req.is_cmd(CommandId::SJTAG_RD) {
                self.handle_sjtag_rd();
            } else if req.is_cmd(CommandId::SJTAG_WR) {
                self.handle_sjtag_wr(&req)?;
            } else {
                self.channel.tx_nack("Unknown command");
            }
        }
    }

    fn handle_send_data(&mut self, req: &Request) -> FwuResult<()> {
        let length = req.arg0 as usize;
        self.received = None;

        if length == 0 || length > self.staging.len() {
            self.channel.tx_nack("Length Error");
            return Ok(());
        }

        // Put the download as high in the staging region as possible.
        let start = (self.staging.len() - length) & !0xFF;

        self.channel.tx_ack();

        let mut offset = 0;
        while offset < length {
            let window = &mut self.staging[start + offset..start + length];
            match self.channel.rx_data(window, offset)? {
                XferOutcome::Received(n) if n > 0 => offset += n,
                _ => break,
            }
        }

        if offset != length {
            cprintln!("[bl1] rx data error: received {} of {} bytes", offset, length);
            return Ok(());
        }

        self.received = Some((start, length));

        // Make the upload visible to the image loader as a RAM FIP.
        self.io.enable_ram_fip(start as u64, length as u64);
        cprintln!("[bl1] received {} bytes", length);
        Ok(())
    }

    /// Returns true when authentication succeeded and the monitor should
    /// hand over to the firmware-update flow.
    fn handle_auth(&mut self) -> bool {
        let (start, length) = match self.received {
            Some(span) => span,
            None => {
                self.channel.tx_nack("Authenticate fails, no data");
                return false;
            }
        };

        match self.platform.authenticate(&self.staging[start..start + length]) {
            Ok(()) => {
                self.channel.tx_ack();
                self.platform.trigger_fwu();
                true
            }
            Err(err) => {
                self.channel.tx_nack_rc("Authenticate fails", err.into());
                false
            }
        }
    }

    /// Returns true when control was handed to the downloaded code.
    fn handle_exec(&mut self) -> bool {
        let (start, _) = match self.received {
            Some(span) => span,
            None => {
                self.channel.tx_nack("No downloaded data");
                return false;
            }
        };

        match self.platform.execute(start) {
            Ok(()) => {
                self.channel.tx_ack();
                true
            }
            Err(err) => {
                self.channel.tx_nack_rc("Execute fails", err.into());
                false
            }
        }
    }

    fn handle_sjtag_rd(&mut self) {
        let mut challenge = Key32::default();
        if self.platform.read_challenge(&mut challenge).is_ok() {
            self.channel.tx_ack_data(&challenge.0);
        } else {
            self.channel.tx_nack("SJTAG read challenge failed");
        }
    }

    fn handle_sjtag_wr(&mut self, req: &Request) -> FwuResult<()> {
        let mut response = Key32::default();

        if req.len as usize != response.0.len()
            || !self.channel.rx_data_crc(req, &mut response.0)?
        {
            self.channel.tx_nack("SJTAG rx data failed or illegal data size");
            return Ok(());
        }

        if self.platform.write_response(&response).is_ok() {
            self.channel.tx(CommandId::ACK, req.arg0, &[]);
        } else {
            self.channel.tx_nack("SJTAG unlock failed");
        }
        Ok(())
    }
}
