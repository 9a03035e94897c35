// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::inline_ptr::{InlinePtr, INLINE_PTR_SIZE};
use std::cmp::Ordering;
use std::io::{Read, Write};

/// Serialized size of an entry
pub const ENTRY_SIZE: usize = 2 * INLINE_PTR_SIZE;

/// Key pointer + value pointer
///
/// The unit stored everywhere: in memtables, in the WAL, and in level entry files.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Entry {
    /// Key descriptor
    pub key: InlinePtr,

    /// Value descriptor, null for tombstones
    pub value: InlinePtr,
}

impl Entry {
    /// Pairs two pointers
    #[must_use]
    pub fn new(key: InlinePtr, value: InlinePtr) -> Self {
        Self { key, value }
    }

    /// Builds an entry from raw key/value bytes, pointers start at offset 0
    #[must_use]
    pub fn from_bytes(key: &[u8], value: Option<&[u8]>) -> Self {
        Self {
            key: InlinePtr::new(key),
            value: InlinePtr::from_option(value),
        }
    }

    /// Number of bytes that follow this entry out-of-line
    #[must_use]
    pub fn out_of_line_len(&self) -> usize {
        [self.key, self.value]
            .iter()
            .filter(|ptr| ptr.is_pointer())
            .map(InlinePtr::len)
            .sum()
    }

    /// Writes the 32-byte wire form
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn encode_into<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.key.encode_into(writer)?;
        self.value.encode_into(writer)
    }

    /// Returns the 32-byte wire form
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(ENTRY_SIZE);

        // NOTE: Writing into a Vec does not fail
        #[allow(clippy::expect_used)]
        self.encode_into(&mut buf).expect("should encode into vec");

        buf
    }

    /// Reads an entry from its 32-byte wire form
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or either pointer is malformed.
    pub fn decode_from<R: Read>(reader: &mut R) -> crate::Result<Self> {
        let mut buf = [0; ENTRY_SIZE];
        reader.read_exact(&mut buf)?;

        let mut reader = &buf[..];
        let key = InlinePtr::decode_from(&mut reader)?;
        let value = InlinePtr::decode_from(&mut reader)?;

        Ok(Self { key, value })
    }
}

/// Orders two keys by prefix first, only comparing bytes on a prefix tie
///
/// `resolve` is called lazily, so callers holding unresolved pointers only
/// pay for dereferencing when the prefixes collide.
pub fn compare_keys<'a, F>(a: &'a InlinePtr, b: &'a InlinePtr, mut resolve: F) -> Ordering
where
    F: FnMut(&'a InlinePtr) -> &'a [u8],
{
    match a.prefix().cmp(&b.prefix()) {
        Ordering::Equal => resolve(a).cmp(resolve(b)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn entry_roundtrip() -> crate::Result<()> {
        let entry = Entry::new(
            InlinePtr::new(b"a-somewhat-longer-key"),
            InlinePtr::new(b"v").with_offset(3),
        )
        .to_bytes();
        assert_eq!(ENTRY_SIZE, entry.len());

        let decoded = Entry::decode_from(&mut &entry[..])?;
        assert!(decoded.key.is_pointer());
        assert_eq!(Some(&b"v"[..]), decoded.value.inline_data());
        assert_eq!(21, decoded.out_of_line_len());

        Ok(())
    }

    #[test]
    fn entry_tombstone_roundtrip() -> crate::Result<()> {
        let entry = Entry::from_bytes(b"gone", None);
        let decoded = Entry::decode_from(&mut &entry.to_bytes()[..])?;

        assert_eq!(entry, decoded);
        assert!(decoded.value.is_null());
        assert_eq!(0, decoded.out_of_line_len());

        Ok(())
    }

    #[test]
    fn entry_compare_keys_by_prefix_then_bytes() {
        let region = b"abcdefgh-1abcdefgh-2".to_vec();
        let a = InlinePtr::new(b"abcdefgh-1xxxx").with_offset(0);
        let b = InlinePtr::new(b"abcdefgh-2xxxx").with_offset(10);

        let mut lookups = 0;
        let ord = compare_keys(&a, &b, |ptr| {
            lookups += 1;
            let start = ptr.offset().unwrap_or_default() as usize;
            &region[start..start + 10]
        });
        assert_eq!(Ordering::Less, ord);
        assert_eq!(2, lookups);

        let c = InlinePtr::new(b"b");
        let mut lookups = 0;
        let ord = compare_keys(&a, &c, |_| {
            lookups += 1;
            &[]
        });
        assert_eq!(Ordering::Less, ord);
        assert_eq!(0, lookups);
    }
}
