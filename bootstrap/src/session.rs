/*++

Licensed under the Apache-2.0 license.

File Name:

    session.rs

Abstract:

    File contains the per-session protocol state shared between the
    bootstrap command handlers.

--*/

use fwu_drivers::DdrConfig;

/// Mutable state one bootstrap session threads through its handlers.
///
/// The staging buffer models the DDR-backed download region. The
/// received-length counter is owned by exactly one command at a time: it
/// is reset when a load begins, set only once the full declared length
/// has arrived, and consumed by the write/bind/unzip/hash commands.
pub struct Session<'a> {
    staging: &'a mut [u8],
    data_rcv_length: usize,

    /// DDR configuration the next (re-)initialization will use.
    pub ddr_config: DdrConfig,

    /// Set once DDR training has succeeded this session.
    pub ddr_initialized: bool,
}

impl<'a> Session<'a> {
    pub fn new(staging: &'a mut [u8]) -> Self {
        Self {
            staging,
            data_rcv_length: 0,
            ddr_config: DdrConfig::default(),
            ddr_initialized: false,
        }
    }

    /// Staging capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.staging.len()
    }

    /// Number of staged bytes from the last completed load.
    pub fn received_len(&self) -> usize {
        self.data_rcv_length
    }

    pub(crate) fn set_received_len(&mut self, len: usize) {
        self.data_rcv_length = len;
    }

    /// The staged bytes of the last completed load.
    pub fn received(&self) -> &[u8] {
        &self.staging[..self.data_rcv_length]
    }

    pub(crate) fn received_mut(&mut self) -> &mut [u8] {
        &mut self.staging[..self.data_rcv_length]
    }

    pub fn staging(&self) -> &[u8] {
        self.staging
    }

    pub(crate) fn staging_mut(&mut self) -> &mut [u8] {
        self.staging
    }
}
