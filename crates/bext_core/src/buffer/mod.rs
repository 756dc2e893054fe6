//! Native buffer primitives shared by the variable and engine facades.
//!
//! # Responsibility
//! - Own every transient UTF-16 buffer exchanged with the host.
//! - Provide the two-phase size negotiation used by string-returning calls.
//! - Hold secret values without leaving plaintext copies behind.
//!
//! # Invariants
//! - Every buffer allocated here is released (and wiped) on all exit paths.
//! - Allocation and release are recorded in a per-thread ledger.

mod negotiate;
mod secure;
mod wide;

pub use negotiate::{negotiate, Negotiated, NegotiatedBuffer, TextBuilder, INITIAL_CAPACITY};
pub use secure::{SecureString, SecureStringError};
pub use wide::{buffer_ledger, BufferLedger, WideBuffer};

use std::sync::atomic::{compiler_fence, Ordering};

/// Overwrites code units with zero in a way the optimizer may not elide.
pub(crate) fn wipe(units: &mut [u16]) {
    for unit in units.iter_mut() {
        // SAFETY: `unit` is a valid, aligned, exclusive reference.
        unsafe { std::ptr::write_volatile(unit, 0) };
    }
    compiler_fence(Ordering::SeqCst);
}
