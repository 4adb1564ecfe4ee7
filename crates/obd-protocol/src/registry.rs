//! Supported-PID Registry
//!
//! Mode 01 PIDs 0x00, 0x20 and 0x40 answer with 32-bit bitmaps of the
//! parameters the ECU supports in the following range.

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};
use tracing::warn;

/// Bitmap PIDs queried on refresh
pub const BITMAP_BASES: [u8; 3] = [0x00, 0x20, 0x40];

/// Immutable set of supported Mode 01 PIDs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupportedPidSet {
    pids: BTreeSet<u8>,
}

impl SupportedPidSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the PIDs flagged in a bitmap reply for `base`.
    ///
    /// Bit i (MSB-first across the four bytes) marks PID `base + 1 + i`.
    /// Payloads shorter than four bytes contribute nothing.
    pub fn absorb_bitmap(&mut self, base: u8, payload: &[u8]) {
        if payload.len() < 4 {
            warn!(
                "Bitmap for base {:02X} has {} bytes, ignoring",
                base,
                payload.len()
            );
            return;
        }
        for i in 0..32u8 {
            let byte = payload[(i / 8) as usize];
            let bit = 7 - (i % 8);
            if (byte >> bit) & 0x01 == 1 {
                self.pids.insert(base.wrapping_add(1).wrapping_add(i));
            }
        }
    }

    pub fn contains(&self, pid: u8) -> bool {
        self.pids.contains(&pid)
    }

    pub fn len(&self) -> usize {
        self.pids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.pids.iter().copied()
    }
}

impl FromIterator<u8> for SupportedPidSet {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        Self {
            pids: iter.into_iter().collect(),
        }
    }
}

/// Shared handle to the current [`SupportedPidSet`].
///
/// A refresh builds a complete new set and swaps it in, so readers only ever
/// see a finished set.
#[derive(Debug, Clone, Default)]
pub struct SupportedPids {
    current: Arc<RwLock<Arc<SupportedPidSet>>>,
}

impl SupportedPids {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current set
    pub fn snapshot(&self) -> Arc<SupportedPidSet> {
        self.current
            .read()
            .map(|set| Arc::clone(&set))
            .unwrap_or_default()
    }

    pub fn is_supported(&self, pid: u8) -> bool {
        self.current
            .read()
            .map(|set| set.contains(pid))
            .unwrap_or(false)
    }

    /// Replace the current set
    pub fn replace(&self, set: SupportedPidSet) {
        let next = Arc::new(set);
        match self.current.write() {
            Ok(mut current) => *current = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}
