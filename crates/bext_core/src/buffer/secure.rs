//! Secret string storage.
//!
//! # Invariants
//! - Units are appended one at a time; the value is never built from a
//!   plain `String`.
//! - Growing the backing storage wipes the old allocation.
//! - Storage is wiped on `clear` and on drop.
//! - `Debug` never prints contents.

use super::wide::WideBuffer;
use super::wipe;
use std::char::DecodeUtf16Error;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

const MIN_GROWTH: usize = 16;

/// UTF-16 secret held outside ordinary string types.
#[derive(Default)]
pub struct SecureString {
    units: Vec<u16>,
    read_only: bool,
}

impl SecureString {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-sizes storage so the first `capacity` appends never reallocate.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            units: Vec::with_capacity(capacity),
            read_only: false,
        }
    }

    /// Appends one UTF-16 code unit.
    pub fn push_unit(&mut self, unit: u16) -> Result<(), SecureStringError> {
        if self.read_only {
            return Err(SecureStringError::ReadOnly);
        }
        if self.units.len() == self.units.capacity() {
            self.grow();
        }
        self.units.push(unit);
        Ok(())
    }

    /// Appends one character as one or two code units.
    pub fn push(&mut self, ch: char) -> Result<(), SecureStringError> {
        let mut scratch = [0u16; 2];
        let encoded = ch.encode_utf16(&mut scratch);
        let result = encoded.iter().try_for_each(|unit| self.push_unit(*unit));
        wipe(&mut scratch);
        result
    }

    /// Length in UTF-16 code units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn make_read_only(&mut self) {
        self.read_only = true;
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Wipes and empties the value.
    pub fn clear(&mut self) -> Result<(), SecureStringError> {
        if self.read_only {
            return Err(SecureStringError::ReadOnly);
        }
        wipe(&mut self.units);
        self.units.clear();
        Ok(())
    }

    pub fn unit_at(&self, index: usize) -> Option<u16> {
        self.units.get(index).copied()
    }

    /// Decodes the value one character at a time.
    pub fn chars(&self) -> impl Iterator<Item = Result<char, DecodeUtf16Error>> + '_ {
        char::decode_utf16(self.units.iter().copied())
    }

    /// One-way copy into a zero-terminated transient buffer for a host call.
    ///
    /// The returned buffer is wiped when dropped.
    pub fn to_plain_buffer(&self) -> WideBuffer {
        let mut buffer = WideBuffer::allocate(self.units.len() + 1);
        buffer.as_mut_slice()[..self.units.len()].copy_from_slice(&self.units);
        buffer
    }

    fn grow(&mut self) {
        let target = (self.units.capacity() * 2).max(MIN_GROWTH);
        let mut grown = Vec::with_capacity(target);
        grown.extend_from_slice(&self.units);
        wipe(&mut self.units);
        self.units = grown;
    }
}

impl FromIterator<char> for SecureString {
    fn from_iter<T: IntoIterator<Item = char>>(iter: T) -> Self {
        let mut value = SecureString::new();
        for ch in iter {
            // A fresh value is never read-only.
            let _ = value.push(ch);
        }
        value
    }
}

impl Drop for SecureString {
    fn drop(&mut self) {
        wipe(&mut self.units);
    }
}

impl Debug for SecureString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureString")
            .field("len", &self.units.len())
            .field("read_only", &self.read_only)
            .finish()
    }
}

/// Secure string mutation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecureStringError {
    ReadOnly,
}

impl Display for SecureStringError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "secure string is read-only"),
        }
    }
}

impl Error for SecureStringError {}

#[cfg(test)]
mod tests {
    use super::{SecureString, SecureStringError};

    #[test]
    fn grows_past_initial_capacity() {
        let value: SecureString = "a fairly long secret phrase".chars().collect();
        assert_eq!(value.len(), 27);
        let decoded: String = value.chars().map(|ch| ch.expect("valid utf16")).collect();
        assert_eq!(decoded, "a fairly long secret phrase");
    }

    #[test]
    fn supplementary_characters_use_two_units() {
        let value: SecureString = "\u{1F512}".chars().collect();
        assert_eq!(value.len(), 2);
        assert_eq!(value.chars().count(), 1);
    }

    #[test]
    fn read_only_rejects_mutation() {
        let mut value: SecureString = "pin".chars().collect();
        value.make_read_only();
        assert_eq!(value.push('x'), Err(SecureStringError::ReadOnly));
        assert_eq!(value.clear(), Err(SecureStringError::ReadOnly));
        assert_eq!(value.len(), 3);
    }

    #[test]
    fn debug_redacts_contents() {
        let value: SecureString = "hunter2".chars().collect();
        let rendered = format!("{value:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("len: 7"));
    }

    #[test]
    fn plain_buffer_is_terminated() {
        let value: SecureString = "ok".chars().collect();
        let buffer = value.to_plain_buffer();
        assert_eq!(buffer.as_slice(), &[111, 107, 0]);
    }
}
