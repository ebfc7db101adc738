// Licensed under the Apache-2.0 license

//! Shared harness for the monitor integration tests: an in-memory
//! console transport, a host-side frame codec and instrumented fake
//! platforms.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crc::{Crc, CRC_32_ISCSI};
use fwu_bootstrap::{Bl1Platform, Bl2uPlatform, BootSource};
use fwu_drivers::{
    AesGcm, BlockDevice, Console, DdrConfig, DdrController, EncKeys, Inflate, Key32, NorFlash,
    Otp, PartitionEntry, PartitionTable, Sha, ShaAlgo, Sjtag, Trng,
};
use fwu_error::{FwuError, FwuResult};
use fwu_image_types::{FwEncStatus, ENC_IV_SIZE, ENC_KEY_SIZE, ENC_TAG_SIZE};

pub static CRC32C: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

pub const SSK: [u8; ENC_KEY_SIZE] = [0x5A; ENC_KEY_SIZE];
pub const BSSK: [u8; ENC_KEY_SIZE] = [0xC3; ENC_KEY_SIZE];

// ---------------------------------------------------------------------------
// Transport

/// Console fed from a canned input script, capturing everything sent.
pub struct TestConsole {
    input: VecDeque<u8>,
    output: Rc<RefCell<Vec<u8>>>,
}

impl TestConsole {
    pub fn new(input: Vec<u8>) -> (Self, Rc<RefCell<Vec<u8>>>) {
        let output = Rc::new(RefCell::new(Vec::new()));
        (
            Self {
                input: input.into(),
                output: Rc::clone(&output),
            },
            output,
        )
    }
}

impl Console for TestConsole {
    fn getc(&mut self) -> FwuResult<u8> {
        self.input.pop_front().ok_or(FwuError::DRIVER_CONSOLE_CLOSED)
    }

    fn putc(&mut self, byte: u8) {
        self.output.borrow_mut().push(byte);
    }
}

// ---------------------------------------------------------------------------
// Host-side frame codec

fn hexify(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(format!("{value:08X}").as_bytes());
}

/// Encodes one request frame the way the host tool does.
pub fn encode_req(cmd: u8, arg0: u32, payload: &[u8], binary: bool) -> Vec<u8> {
    let mut fixed = vec![cmd, b','];
    hexify(&mut fixed, arg0);
    fixed.push(b',');
    hexify(&mut fixed, payload.len() as u32);
    fixed.push(if binary { b'%' } else { b'#' });

    let mut wire_payload = Vec::new();
    if binary {
        wire_payload.extend_from_slice(payload);
    } else {
        for &byte in payload {
            wire_payload.extend_from_slice(format!("{byte:02X}").as_bytes());
        }
    }

    let mut digest = CRC32C.digest();
    digest.update(&fixed);
    digest.update(&wire_payload);
    let crc = digest.finalize();

    let mut frame = vec![b'>'];
    frame.extend_from_slice(&fixed);
    frame.extend_from_slice(&wire_payload);
    hexify(&mut frame, crc);
    frame
}

/// Same frame with the CRC trailer corrupted.
pub fn encode_garbled_req(cmd: u8, arg0: u32, payload: &[u8]) -> Vec<u8> {
    let mut frame = encode_req(cmd, arg0, payload, true);
    let last = frame.len() - 1;
    frame[last] = if frame[last] == b'0' { b'1' } else { b'0' };
    frame
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub cmd: u8,
    pub arg0: u32,
    pub payload: Vec<u8>,
}

impl Response {
    pub fn reason(&self) -> &str {
        std::str::from_utf8(&self.payload).unwrap()
    }
}

fn unhex(bytes: &[u8]) -> u32 {
    u32::from_str_radix(std::str::from_utf8(bytes).unwrap(), 16).unwrap()
}

/// Splits the captured output stream back into response frames,
/// verifying each CRC along the way.
pub fn parse_responses(stream: &[u8]) -> Vec<Response> {
    let mut responses = Vec::new();
    let mut at = 0;

    while at < stream.len() {
        assert_eq!(stream[at], b'>', "expected SOF at byte {at}");
        let fixed = &stream[at + 1..at + 21];
        let cmd = fixed[0];
        let arg0 = unhex(&fixed[2..10]);
        let len = unhex(&fixed[11..19]) as usize;
        let binary = match fixed[19] {
            b'%' => true,
            b'#' => false,
            other => panic!("bad payload delimiter {other:#x}"),
        };

        let wire_len = if binary { len } else { len * 2 };
        let wire_payload = &stream[at + 21..at + 21 + wire_len];
        let payload = if binary {
            wire_payload.to_vec()
        } else {
            wire_payload
                .chunks(2)
                .map(|pair| unhex_byte(pair))
                .collect()
        };

        let mut digest = CRC32C.digest();
        digest.update(fixed);
        digest.update(wire_payload);
        let crc_at = at + 21 + wire_len;
        assert_eq!(
            unhex(&stream[crc_at..crc_at + 8]),
            digest.finalize(),
            "response CRC mismatch"
        );

        responses.push(Response { cmd, arg0, payload });
        at = crc_at + 8;
    }
    responses
}

fn unhex_byte(pair: &[u8]) -> u8 {
    u8::from_str_radix(std::str::from_utf8(pair).unwrap(), 16).unwrap()
}

/// Splits a payload into DATA-command chunk frames for a bulk upload.
pub fn data_chunks(payload: &[u8], chunk_size: usize) -> Vec<u8> {
    let mut frames = Vec::new();
    let mut offset = 0;
    while offset < payload.len() {
        let end = (offset + chunk_size).min(payload.len());
        frames.extend_from_slice(&encode_req(
            b'D',
            offset as u32,
            &payload[offset..end],
            true,
        ));
        offset = end;
    }
    frames
}

// ---------------------------------------------------------------------------
// Fake crypto shared with the image producer side of the tests

pub fn xor_cipher(data: &mut [u8], key: &[u8]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= key[i % key.len()];
    }
}

pub fn fake_tag(key: &[u8], iv: &[u8]) -> [u8; ENC_TAG_SIZE] {
    let mut tag = [0u8; ENC_TAG_SIZE];
    for (i, byte) in tag.iter_mut().enumerate() {
        *byte = key[i % key.len()] ^ iv[i % iv.len()] ^ i as u8;
    }
    tag
}

pub fn fold_digest(data: &[u8]) -> [u8; 32] {
    let mut digest = [0u8; 32];
    for (i, byte) in data.iter().enumerate() {
        digest[i % 32] ^= byte;
    }
    digest
}

// ---------------------------------------------------------------------------
// Fake devices

pub struct FakeMmc {
    pub data: Vec<u8>,
    pub write_calls: usize,
    /// Return a short count on every write after this many calls.
    pub fail_after: Option<usize>,
}

impl FakeMmc {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
            write_calls: 0,
            fail_after: None,
        }
    }
}

impl BlockDevice for FakeMmc {
    fn read_blocks(&mut self, lba: u32, buf: &mut [u8]) -> FwuResult<usize> {
        let at = lba as usize * 512;
        buf.copy_from_slice(&self.data[at..at + buf.len()]);
        Ok(buf.len())
    }

    fn write_blocks(&mut self, lba: u32, buf: &[u8]) -> FwuResult<usize> {
        self.write_calls += 1;
        if matches!(self.fail_after, Some(limit) if self.write_calls > limit) {
            return Ok(buf.len() / 2);
        }
        let at = lba as usize * 512;
        self.data[at..at + buf.len()].copy_from_slice(buf);
        Ok(buf.len())
    }
}

pub struct FakeNor {
    pub data: Vec<u8>,
}

impl NorFlash for FakeNor {
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> FwuResult<usize> {
        let at = offset as usize;
        buf.copy_from_slice(&self.data[at..at + buf.len()]);
        Ok(buf.len())
    }

    fn write(&mut self, offset: u64, buf: &[u8]) -> FwuResult<()> {
        let at = offset as usize;
        self.data[at..at + buf.len()].copy_from_slice(buf);
        Ok(())
    }
}

pub struct FakeParts {
    pub entries: Vec<(&'static str, PartitionEntry)>,
    pub init_calls: usize,
}

impl PartitionTable for FakeParts {
    fn init(&mut self) -> FwuResult<()> {
        self.init_calls += 1;
        Ok(())
    }

    fn entry(&self, name: &str) -> Option<PartitionEntry> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, entry)| *entry)
    }
}

// ---------------------------------------------------------------------------
// BL2U fake platform

pub struct FakePlatform {
    pub otp_mem: Vec<u8>,
    pub otp_write_calls: usize,
    pub fail_otp_write: bool,
    pub trng_state: u32,
    pub ssk: Option<[u8; ENC_KEY_SIZE]>,
    pub bssk: Option<[u8; ENC_KEY_SIZE]>,
    pub ddr_init_calls: usize,
    pub fail_ddr_init: bool,
    pub sha_calls: usize,
    pub mmc: FakeMmc,
    pub nor: FakeNor,
    pub parts: FakeParts,
    pub io_init_calls: usize,
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self {
            otp_mem: vec![0; 1024],
            otp_write_calls: 0,
            fail_otp_write: false,
            trng_state: 0x1234_5678,
            ssk: Some(SSK),
            bssk: Some(BSSK),
            ddr_init_calls: 0,
            fail_ddr_init: false,
            sha_calls: 0,
            mmc: FakeMmc::new(1 << 20),
            nor: FakeNor {
                data: vec![0; 1 << 20],
            },
            parts: FakeParts {
                entries: vec![
                    (
                        "fip",
                        PartitionEntry {
                            start: 0x2_0000,
                            length: 0x4_0000,
                        },
                    ),
                    (
                        "fip.bak",
                        PartitionEntry {
                            start: 0x8_0000,
                            length: 0x4_0000,
                        },
                    ),
                ],
                init_calls: 0,
            },
            io_init_calls: 0,
        }
    }
}

impl Otp for FakePlatform {
    fn read_bytes(&mut self, offset: usize, dst: &mut [u8]) -> FwuResult<()> {
        self.read_bytes_raw(offset, dst)
    }

    fn read_bytes_raw(&mut self, offset: usize, dst: &mut [u8]) -> FwuResult<()> {
        if offset + dst.len() > self.otp_mem.len() {
            return Err(FwuError::DRIVER_OTP_OUT_OF_BOUNDS);
        }
        dst.copy_from_slice(&self.otp_mem[offset..offset + dst.len()]);
        Ok(())
    }

    fn write_bytes(&mut self, offset: usize, src: &[u8]) -> FwuResult<()> {
        self.otp_write_calls += 1;
        if self.fail_otp_write {
            return Err(FwuError::DRIVER_OTP_WRITE_FAILURE);
        }
        if offset + src.len() > self.otp_mem.len() {
            return Err(FwuError::DRIVER_OTP_OUT_OF_BOUNDS);
        }
        self.otp_mem[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }

    fn commit_emulation(&mut self) -> FwuResult<()> {
        Ok(())
    }
}

impl Trng for FakePlatform {
    fn read_word(&mut self) -> u32 {
        self.trng_state = self.trng_state.wrapping_mul(0x0001_9660).wrapping_add(1);
        self.trng_state
    }
}

impl Sha for FakePlatform {
    fn hash(&mut self, _algo: ShaAlgo, data: &[u8], digest: &mut [u8]) -> FwuResult<()> {
        self.sha_calls += 1;
        digest.copy_from_slice(&fold_digest(data));
        Ok(())
    }
}

impl AesGcm for FakePlatform {
    fn gcm_encrypt(
        &mut self,
        data: &mut [u8],
        key: &[u8],
        iv: &[u8; ENC_IV_SIZE],
        tag: &mut [u8; ENC_TAG_SIZE],
    ) -> FwuResult<()> {
        xor_cipher(data, key);
        tag.copy_from_slice(&fake_tag(key, iv));
        Ok(())
    }

    fn gcm_decrypt(
        &mut self,
        data: &mut [u8],
        key: &[u8],
        iv: &[u8],
        tag: &[u8],
    ) -> FwuResult<()> {
        if tag != fake_tag(key, iv).as_slice() {
            return Err(FwuError::DRIVER_AES_TAG_MISMATCH);
        }
        xor_cipher(data, key);
        Ok(())
    }
}

impl EncKeys for FakePlatform {
    fn enc_key(&mut self, kind: FwEncStatus, key: &mut [u8; ENC_KEY_SIZE]) -> FwuResult<usize> {
        let material = match kind {
            FwEncStatus::Ssk => self.ssk,
            FwEncStatus::Bssk => self.bssk,
        };
        match material {
            Some(bytes) => {
                key.copy_from_slice(&bytes);
                Ok(ENC_KEY_SIZE)
            }
            None => Err(FwuError::DRIVER_KEY_UNAVAILABLE),
        }
    }
}

impl Inflate for FakePlatform {
    fn gunzip(&mut self, input: &[u8], output: &mut [u8]) -> FwuResult<usize> {
        // Canned codec: the "compressed" stream is the gzip magic
        // followed by the plain bytes.
        if input.len() < 2 || input[..2] != [0x1f, 0x8b] {
            return Err(FwuError::DRIVER_INFLATE_FAILURE);
        }
        let body = &input[2..];
        if body.len() > output.len() {
            return Err(FwuError::DRIVER_INFLATE_FAILURE);
        }
        output[..body.len()].copy_from_slice(body);
        Ok(body.len())
    }
}

impl DdrController for FakePlatform {
    fn init(&mut self, _config: &DdrConfig) -> FwuResult<()> {
        self.ddr_init_calls += 1;
        if self.fail_ddr_init {
            return Err(FwuError::DRIVER_DDR_INIT_FAILURE);
        }
        Ok(())
    }
}

impl Bl2uPlatform for FakePlatform {
    fn version_string(&self) -> &'static str {
        "v2023.12-test"
    }

    fn chip_id(&mut self) -> u32 {
        0x9668_0417
    }

    fn boot_source(&mut self) -> BootSource {
        BootSource::Emmc
    }

    fn io_init_dev(&mut self, _source: BootSource) -> FwuResult<()> {
        self.io_init_calls += 1;
        Ok(())
    }

    fn block_device(&mut self) -> &mut dyn BlockDevice {
        &mut self.mmc
    }

    fn nor_flash(&mut self) -> &mut dyn NorFlash {
        &mut self.nor
    }

    fn partitions(&mut self) -> &mut dyn PartitionTable {
        &mut self.parts
    }

    fn default_ddr_config(&self) -> DdrConfig {
        let mut config = DdrConfig::default();
        config.info.speed.set(2400);
        config.info.size.set(1 << 16);
        config.info.bus_width.set(16);
        config
    }
}

// ---------------------------------------------------------------------------
// BL1 fake platform

pub struct Bl1FakePlatform {
    pub otp_mem: Vec<u8>,
    pub otp_write_calls: usize,
    pub trng_state: u32,
    pub strapping: Option<u8>,
    pub challenge: [u8; 32],
    pub unlock_calls: usize,
    pub expected_response: [u8; 32],
    pub auth_result: FwuResult<()>,
    pub fwu_triggered: bool,
    pub exec_armed: Option<usize>,
    pub commit_calls: usize,
}

impl Default for Bl1FakePlatform {
    fn default() -> Self {
        Self {
            otp_mem: vec![0; 1024],
            otp_write_calls: 0,
            trng_state: 0x0BAD_5EED,
            strapping: None,
            challenge: [0x21; 32],
            unlock_calls: 0,
            expected_response: [0x7E; 32],
            auth_result: Ok(()),
            fwu_triggered: false,
            exec_armed: None,
            commit_calls: 0,
        }
    }
}

impl Otp for Bl1FakePlatform {
    fn read_bytes(&mut self, offset: usize, dst: &mut [u8]) -> FwuResult<()> {
        self.read_bytes_raw(offset, dst)
    }

    fn read_bytes_raw(&mut self, offset: usize, dst: &mut [u8]) -> FwuResult<()> {
        if offset + dst.len() > self.otp_mem.len() {
            return Err(FwuError::DRIVER_OTP_OUT_OF_BOUNDS);
        }
        dst.copy_from_slice(&self.otp_mem[offset..offset + dst.len()]);
        Ok(())
    }

    fn write_bytes(&mut self, offset: usize, src: &[u8]) -> FwuResult<()> {
        self.otp_write_calls += 1;
        if offset + src.len() > self.otp_mem.len() {
            return Err(FwuError::DRIVER_OTP_OUT_OF_BOUNDS);
        }
        self.otp_mem[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }

    fn commit_emulation(&mut self) -> FwuResult<()> {
        self.commit_calls += 1;
        Ok(())
    }
}

impl Trng for Bl1FakePlatform {
    fn read_word(&mut self) -> u32 {
        self.trng_state = self.trng_state.wrapping_mul(0x0001_9660).wrapping_add(1);
        self.trng_state
    }
}

impl Sjtag for Bl1FakePlatform {
    fn read_challenge(&mut self, challenge: &mut Key32) -> FwuResult<()> {
        challenge.0.copy_from_slice(&self.challenge);
        Ok(())
    }

    fn write_response(&mut self, response: &Key32) -> FwuResult<()> {
        self.unlock_calls += 1;
        if response.0 == self.expected_response {
            Ok(())
        } else {
            Err(FwuError::DRIVER_SJTAG_UNLOCK_FAILURE)
        }
    }
}

impl Bl1Platform for Bl1FakePlatform {
    fn version_string(&self) -> &'static str {
        "v2023.12-bl1-test"
    }

    fn set_strapping(&mut self, value: u8) {
        self.strapping = Some(value);
    }

    fn authenticate(&mut self, _image: &[u8]) -> FwuResult<()> {
        self.auth_result
    }

    fn trigger_fwu(&mut self) {
        self.fwu_triggered = true;
    }

    fn execute(&mut self, offset: usize) -> FwuResult<()> {
        self.exec_armed = Some(offset);
        Ok(())
    }
}
