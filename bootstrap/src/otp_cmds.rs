/*++

Licensed under the Apache-2.0 license.

File Name:

    otp_cmds.rs

Abstract:

    File contains the OTP provisioning command handlers shared by the
    BL1 and BL2U monitors.

--*/

use fwu_drivers::{otp_all_zero, Console, Otp, Trng, OTP_MEM_SIZE};
use fwu_error::FwuResult;
use zeroize::Zeroize;

use crate::wire::{Channel, Request};
use crate::{CommandId, MAX_OTP_DATA};

/// Programs host-supplied bytes into OTP. The payload is wiped from the
/// receive buffer on every path.
pub(crate) fn handle_otp_data<C: Console, P: Otp>(
    channel: &mut Channel<C>,
    otp: &mut P,
    req: &Request,
) -> FwuResult<()> {
    let mut data = [0u8; MAX_OTP_DATA];
    let len = req.len as usize;

    if len == 0 || len >= MAX_OTP_DATA {
        channel.tx_nack("OTP rx data failed or illegal data size");
        return Ok(());
    }

    let crc_ok = match channel.rx_data_crc(req, &mut data[..len]) {
        Ok(ok) => ok,
        Err(err) => {
            data[..len].zeroize();
            return Err(err);
        }
    };
    if !crc_ok {
        data[..len].zeroize();
        channel.tx_nack("OTP rx data failed or illegal data size");
        return Ok(());
    }

    if otp.write_bytes(req.arg0 as usize, &data[..len]).is_ok() {
        channel.tx(CommandId::ACK, req.arg0, &[]);
    } else {
        channel.tx_nack("OTP program failed");
    }
    data[..len].zeroize();
    Ok(())
}

/// Fills an OTP region with hardware random data.
///
/// Refuses regions that do not currently read back all-zero: random
/// provisioning must never overwrite fuse data that is already in use.
pub(crate) fn handle_otp_random<C: Console, P: Otp + Trng>(
    channel: &mut Channel<C>,
    platform: &mut P,
    req: &Request,
) -> FwuResult<()> {
    let mut req_len = [0u8; 4];
    if req.len as usize != req_len.len() || !channel.rx_data_crc(req, &mut req_len)? {
        channel.tx_nack("OTP random data illegal req length");
        return Ok(());
    }

    let datalen = u32::from_be_bytes(req_len) as usize;
    if datalen == 0 || datalen >= MAX_OTP_DATA {
        channel.tx_nack("OTP random data illegal length");
        return Ok(());
    }

    let mut cur_data = [0u8; MAX_OTP_DATA];
    if platform
        .read_bytes_raw(req.arg0 as usize, &mut cur_data[..datalen])
        .is_err()
    {
        channel.tx_nack("Unable to read OTP data");
        return Ok(());
    }

    if !otp_all_zero(&cur_data[..datalen]) {
        channel.tx_nack("OTP data already non-zero");
        cur_data[..datalen].zeroize();
        return Ok(());
    }

    let mut data = [0u8; MAX_OTP_DATA];
    platform.fill(&mut data[..datalen]);

    if platform.write_bytes(req.arg0 as usize, &data[..datalen]).is_ok() {
        channel.tx(CommandId::ACK, req.arg0, &[]);
    } else {
        channel.tx_nack("OTP program random failed");
    }

    data[..datalen].zeroize();
    cur_data[..datalen].zeroize();
    Ok(())
}

/// Reads an OTP region, either through the emulation layer or raw.
pub(crate) fn handle_otp_read<C: Console, P: Otp>(
    channel: &mut Channel<C>,
    otp: &mut P,
    req: &Request,
    raw: bool,
) -> FwuResult<()> {
    let mut req_len = [0u8; 4];
    if req.len as usize != req_len.len() || !channel.rx_data_crc(req, &mut req_len)? {
        channel.tx_nack("OTP read illegal length");
        return Ok(());
    }

    let mut data = [0u8; 256];
    let datalen = u32::from_be_bytes(req_len) as usize;
    let offset = req.arg0 as usize;

    if datalen == 0 || datalen >= data.len() || offset + datalen > OTP_MEM_SIZE {
        channel.tx_nack("OTP read illegal length");
        return Ok(());
    }

    let result = if raw {
        otp.read_bytes_raw(offset, &mut data[..datalen])
    } else {
        otp.read_bytes(offset, &mut data[..datalen])
    };
    match result {
        Ok(()) => channel.tx_ack_data(&data[..datalen]),
        Err(err) => channel.tx_nack_rc("OTP read fails", err.into()),
    }
    Ok(())
}
