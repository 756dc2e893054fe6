//! Owned UTF-16 buffers handed to host calls.

use super::wipe;
use std::cell::Cell;
use std::string::FromUtf16Error;
use std::fmt::{Debug, Formatter};

thread_local! {
    static LEDGER: Cell<BufferLedger> = const { Cell::new(BufferLedger::new()) };
}

/// Per-thread count of buffers allocated and released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferLedger {
    pub allocated: usize,
    pub released: usize,
}

impl BufferLedger {
    const fn new() -> Self {
        Self {
            allocated: 0,
            released: 0,
        }
    }

    /// Buffers allocated but not yet released.
    pub fn outstanding(&self) -> usize {
        self.allocated.saturating_sub(self.released)
    }

    /// Activity recorded between `earlier` and `self`.
    pub fn since(&self, earlier: BufferLedger) -> BufferLedger {
        BufferLedger {
            allocated: self.allocated - earlier.allocated,
            released: self.released - earlier.released,
        }
    }
}

/// Returns the buffer ledger of the calling thread.
pub fn buffer_ledger() -> BufferLedger {
    LEDGER.with(Cell::get)
}

fn record(update: impl FnOnce(&mut BufferLedger)) {
    LEDGER.with(|cell| {
        let mut ledger = cell.get();
        update(&mut ledger);
        cell.set(ledger);
    });
}

/// Zero-initialized UTF-16 buffer of fixed capacity.
///
/// Contents are wiped when the buffer is released, so the same type serves
/// both plain and secret transfers.
pub struct WideBuffer {
    units: Vec<u16>,
}

impl WideBuffer {
    /// Allocates `capacity` zeroed code units.
    pub fn allocate(capacity: usize) -> Self {
        record(|ledger| ledger.allocated += 1);
        Self {
            units: vec![0; capacity],
        }
    }

    /// Copies `value` into a new zero-terminated buffer.
    pub fn from_text(value: &str) -> Self {
        let mut buffer = Self::allocate(value.encode_utf16().count() + 1);
        for (slot, unit) in buffer.units.iter_mut().zip(value.encode_utf16()) {
            *slot = unit;
        }
        buffer
    }

    pub fn capacity(&self) -> usize {
        self.units.len()
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.units
    }

    pub fn as_mut_slice(&mut self) -> &mut [u16] {
        &mut self.units
    }

    pub fn as_mut_ptr(&mut self) -> *mut u16 {
        self.units.as_mut_ptr()
    }

    /// Counts code units before the first terminator within `limit`.
    ///
    /// The scan never reads past the allocation, whatever `limit` says.
    pub fn terminated_len(&self, limit: usize) -> usize {
        let bound = limit.min(self.units.len());
        self.units[..bound]
            .iter()
            .position(|unit| *unit == 0)
            .unwrap_or(bound)
    }

    /// Decodes the first `len` code units; unpaired surrogates are an error.
    pub fn decode(&self, len: usize) -> Result<String, FromUtf16Error> {
        String::from_utf16(&self.units[..len.min(self.units.len())])
    }

    /// Clears one code unit in place.
    pub(crate) fn wipe_unit(&mut self, index: usize) {
        if let Some(unit) = self.units.get_mut(index) {
            wipe(std::slice::from_mut(unit));
        }
    }
}

impl Drop for WideBuffer {
    fn drop(&mut self) {
        wipe(&mut self.units);
        record(|ledger| ledger.released += 1);
    }
}

impl Debug for WideBuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WideBuffer")
            .field("capacity", &self.units.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{buffer_ledger, WideBuffer};

    #[test]
    fn from_text_appends_terminator() {
        let buffer = WideBuffer::from_text("abc");
        assert_eq!(buffer.capacity(), 4);
        assert_eq!(buffer.as_slice(), &[97, 98, 99, 0]);
        assert_eq!(buffer.terminated_len(buffer.capacity()), 3);
    }

    #[test]
    fn terminated_len_is_bounded_by_allocation() {
        let mut buffer = WideBuffer::allocate(2);
        buffer.as_mut_slice().copy_from_slice(&[65, 66]);
        assert_eq!(buffer.terminated_len(100), 2);
        assert_eq!(buffer.terminated_len(1), 1);
        assert_eq!(buffer.decode(2).expect("valid text"), "AB");
    }

    #[test]
    fn decode_rejects_unpaired_surrogate() {
        let mut buffer = WideBuffer::allocate(3);
        buffer.as_mut_slice().copy_from_slice(&[0xD800, 0x41, 0]);
        let len = buffer.terminated_len(buffer.capacity());
        assert!(buffer.decode(len).is_err());
    }

    #[test]
    fn ledger_tracks_allocation_and_release() {
        let before = buffer_ledger();
        {
            let _first = WideBuffer::allocate(8);
            let _second = WideBuffer::from_text("x");
            assert_eq!(buffer_ledger().since(before).outstanding(), 2);
        }
        let delta = buffer_ledger().since(before);
        assert_eq!(delta.allocated, 2);
        assert_eq!(delta.released, 2);
    }
}
