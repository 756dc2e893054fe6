//! Two-phase size negotiation for string-returning host calls.
//!
//! # Contract
//! - First call uses a buffer of the caller's starting capacity.
//! - A "buffer too small" status triggers exactly one reallocation to the
//!   capacity the host reported, followed by exactly one more call.
//! - Any other failure ends the negotiation with that status.
//! - Buffers are released on every path, including a failing second call.

use super::wide::WideBuffer;
use crate::status::HResult;
use log::debug;

/// Starting capacity, in UTF-16 code units, for negotiated string calls.
pub const INITIAL_CAPACITY: usize = 80;

/// Output target that can be sized for a negotiated host call.
pub trait NegotiatedBuffer: Sized {
    fn allocate(capacity: usize) -> Self;
}

impl NegotiatedBuffer for WideBuffer {
    fn allocate(capacity: usize) -> Self {
        WideBuffer::allocate(capacity)
    }
}

impl NegotiatedBuffer for TextBuilder {
    fn allocate(capacity: usize) -> Self {
        TextBuilder::with_capacity(capacity)
    }
}

/// Successful negotiation outcome.
#[derive(Debug)]
pub struct Negotiated<B> {
    pub buffer: B,
    /// Capacity value the host left in the in/out slot on success.
    pub capacity: usize,
}

/// Runs the two-phase protocol over `call(buffer, in/out capacity)`.
pub fn negotiate<B, F>(initial_capacity: usize, mut call: F) -> Result<Negotiated<B>, HResult>
where
    B: NegotiatedBuffer,
    F: FnMut(&mut B, &mut usize) -> HResult,
{
    let mut capacity = initial_capacity;
    let mut buffer = B::allocate(capacity);
    let mut status = call(&mut buffer, &mut capacity);

    if status.is_buffer_too_small() {
        debug!(
            "event=buffer_resize module=buffer status=start initial={} required={}",
            initial_capacity, capacity
        );
        // Assignment releases the undersized buffer.
        buffer = B::allocate(capacity);
        status = call(&mut buffer, &mut capacity);
    }

    if status.is_failure() {
        return Err(status);
    }

    Ok(Negotiated { buffer, capacity })
}

/// Growable text output used by `escape_string` and `format_string`.
///
/// The host sees a capacity in UTF-16 code units (terminator included) and
/// replaces the whole text when it fits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBuilder {
    text: String,
    capacity: usize,
}

impl TextBuilder {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            text: String::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether `text` plus a terminator fits in this builder.
    pub fn fits(&self, text: &str) -> bool {
        text.encode_utf16().count() < self.capacity
    }

    /// Replaces the builder contents.
    pub fn set_text(&mut self, text: &str) {
        self.text.clear();
        self.text.push_str(text);
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }
}
