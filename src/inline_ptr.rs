// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Serialized size of an inline pointer
pub const INLINE_PTR_SIZE: usize = 16;

/// Data up to this many bytes is stored inside the pointer itself
pub const MAX_INLINE_LEN: usize = 13;

/// Largest offset a pointer can carry (40 bits)
pub const MAX_OFFSET: u64 = (1 << 40) - 1;

const PREFIX_LEN: usize = 8;

/// Wire tag of an inline pointer
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Tag {
    /// Absent data
    Null = 0,

    /// Out-of-line data
    Pointer = 1,

    /// Embedded data
    Inline = 2,
}

impl TryFrom<u8> for Tag {
    type Error = crate::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Null),
            1 => Ok(Self::Pointer),
            2 => Ok(Self::Inline),
            _ => Err(crate::Error::InvalidTag(("InlinePtr", value))),
        }
    }
}

impl From<Tag> for u8 {
    fn from(val: Tag) -> Self {
        val as Self
    }
}

/// Fixed-size descriptor of a key or value
///
/// Data is either absent, embedded (up to [`MAX_INLINE_LEN`] bytes), or
/// referenced by offset + length into a byte region owned by someone else
/// (a memtable's arena, or a level's values file).
///
/// Every variant can produce an 8-byte prefix, which orders two pointers
/// without resolving either of them in the common case.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum InlinePtr {
    /// No data
    #[default]
    Null,

    /// Embedded data, bytes past `len` are zero
    Inline {
        /// Data length
        len: u8,

        /// Data bytes, zero padded
        data: [u8; MAX_INLINE_LEN],
    },

    /// Reference into an external byte region
    Pointer {
        /// Data length, always more than [`MAX_INLINE_LEN`]
        len: u16,

        /// First 8 bytes of the data
        prefix: [u8; PREFIX_LEN],

        /// Position of the data in its region
        offset: u64,
    },
}

/// Returns the first up-to-8 bytes of `bytes`, zero padded, as a big-endian integer
#[must_use]
pub fn prefix_of(bytes: &[u8]) -> u64 {
    let mut buf = [0; PREFIX_LEN];

    for (dst, src) in buf.iter_mut().zip(bytes) {
        *dst = *src;
    }

    u64::from_be_bytes(buf)
}

impl InlinePtr {
    /// Describes `bytes`, choosing the inline form when it fits.
    ///
    /// A pointer starts out with offset 0; the caller sets the
    /// real offset after appending the bytes to a region.
    #[must_use]
    pub fn new(bytes: &[u8]) -> Self {
        debug_assert!(bytes.len() <= usize::from(u16::MAX));

        if bytes.len() <= MAX_INLINE_LEN {
            let mut data = [0; MAX_INLINE_LEN];

            for (dst, src) in data.iter_mut().zip(bytes) {
                *dst = *src;
            }

            // NOTE: Checked above
            #[allow(clippy::cast_possible_truncation)]
            let len = bytes.len() as u8;

            Self::Inline { len, data }
        } else {
            let mut prefix = [0; PREFIX_LEN];

            for (dst, src) in prefix.iter_mut().zip(bytes) {
                *dst = *src;
            }

            // NOTE: Keys and values are limited to u16::MAX bytes before they get here
            #[allow(clippy::cast_possible_truncation)]
            let len = bytes.len() as u16;

            Self::Pointer {
                len,
                prefix,
                offset: 0,
            }
        }
    }

    /// Like [`InlinePtr::new`], but `None` maps to [`InlinePtr::Null`]
    #[must_use]
    pub fn from_option(bytes: Option<&[u8]>) -> Self {
        bytes.map_or(Self::Null, Self::new)
    }

    /// Sets the region offset of a pointer, no-op for other variants
    pub fn set_offset(&mut self, value: u64) {
        debug_assert!(value <= MAX_OFFSET);

        if let Self::Pointer { offset, .. } = self {
            *offset = value;
        }
    }

    /// Builder-style [`InlinePtr::set_offset`]
    #[must_use]
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.set_offset(offset);
        self
    }

    /// Wire tag of this pointer
    #[must_use]
    pub fn tag(&self) -> Tag {
        match self {
            Self::Null => Tag::Null,
            Self::Pointer { .. } => Tag::Pointer,
            Self::Inline { .. } => Tag::Inline,
        }
    }

    /// Returns `true` for absent data (tombstone values)
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` if the data lives out-of-line
    #[must_use]
    pub fn is_pointer(&self) -> bool {
        matches!(self, Self::Pointer { .. })
    }

    /// Length of the described data
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Null => 0,
            Self::Inline { len, .. } => usize::from(*len),
            Self::Pointer { len, .. } => usize::from(*len),
        }
    }

    /// Returns `true` if the described data has no bytes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Region offset, only meaningful for pointers
    #[must_use]
    pub fn offset(&self) -> Option<u64> {
        match self {
            Self::Pointer { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    /// First up-to-8 bytes of the logical data as a big-endian integer
    ///
    /// Independent of the storage mode: the inline and pointer form of the
    /// same bytes have the same prefix.
    #[must_use]
    pub fn prefix(&self) -> u64 {
        match self {
            Self::Null => 0,
            Self::Inline { data, .. } => prefix_of(data),
            Self::Pointer { prefix, .. } => u64::from_be_bytes(*prefix),
        }
    }

    /// Embedded bytes of an inline pointer
    #[must_use]
    pub fn inline_data(&self) -> Option<&[u8]> {
        match self {
            Self::Inline { len, data } => data.get(..usize::from(*len)),
            _ => None,
        }
    }

    /// Resolves the described bytes against the region the pointer belongs to
    ///
    /// Returns `None` for null pointers.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidPointer`] if a pointer reaches past the region.
    pub fn resolve<'a>(&'a self, region: &'a [u8]) -> crate::Result<Option<&'a [u8]>> {
        match self {
            Self::Null => Ok(None),
            Self::Inline { len, data } => data
                .get(..usize::from(*len))
                .map(Some)
                .ok_or(crate::Error::MalformedLength(("InlinePtr", u16::from(*len)))),
            Self::Pointer { len, offset, .. } => {
                let invalid = || crate::Error::InvalidPointer {
                    offset: *offset,
                    len: *len,
                };

                let start = usize::try_from(*offset).map_err(|_| invalid())?;
                let end = start.checked_add(usize::from(*len)).ok_or_else(invalid)?;

                region.get(start..end).map(Some).ok_or_else(invalid)
            }
        }
    }

    /// Writes the 16-byte wire form
    ///
    /// Layout: tag (1) | length LE u16 (2) | 13 payload bytes.
    /// Inline payload is the data; pointer payload is the 8 prefix bytes
    /// followed by the 40-bit big-endian offset.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn encode_into<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_u8(self.tag().into())?;

        match self {
            Self::Null => {
                writer.write_all(&[0; INLINE_PTR_SIZE - 1])?;
            }
            Self::Inline { len, data } => {
                writer.write_u16::<LittleEndian>(u16::from(*len))?;
                writer.write_all(data)?;
            }
            Self::Pointer {
                len,
                prefix,
                offset,
            } => {
                writer.write_u16::<LittleEndian>(*len)?;
                writer.write_all(prefix)?;
                writer.write_uint::<BigEndian>(*offset & MAX_OFFSET, 5)?;
            }
        }

        Ok(())
    }

    /// Reads the 16-byte wire form
    ///
    /// # Errors
    ///
    /// Fails on I/O errors (a short read surfaces as `UnexpectedEof`),
    /// unknown tags, and lengths that do not fit the tag.
    pub fn decode_from<R: Read>(reader: &mut R) -> crate::Result<Self> {
        let mut buf = [0; INLINE_PTR_SIZE];
        reader.read_exact(&mut buf)?;

        let mut reader = &buf[..];

        match Tag::try_from(reader.read_u8()?)? {
            Tag::Null => Ok(Self::Null),
            Tag::Inline => {
                let len = reader.read_u16::<LittleEndian>()?;

                if usize::from(len) > MAX_INLINE_LEN {
                    return Err(crate::Error::MalformedLength(("InlinePtr", len)));
                }

                let mut data = [0; MAX_INLINE_LEN];
                reader.read_exact(&mut data)?;

                // Bytes past the length are padding
                for byte in data.iter_mut().skip(usize::from(len)) {
                    *byte = 0;
                }

                // NOTE: Checked above
                #[allow(clippy::cast_possible_truncation)]
                let len = len as u8;

                Ok(Self::Inline { len, data })
            }
            Tag::Pointer => {
                let len = reader.read_u16::<LittleEndian>()?;

                if usize::from(len) <= MAX_INLINE_LEN {
                    return Err(crate::Error::MalformedLength(("InlinePtr", len)));
                }

                let mut prefix = [0; PREFIX_LEN];
                reader.read_exact(&mut prefix)?;

                let offset = reader.read_uint::<BigEndian>(5)?;

                Ok(Self::Pointer {
                    len,
                    prefix,
                    offset,
                })
            }
        }
    }
}

impl std::fmt::Display for InlinePtr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "N"),
            Self::Inline { len, .. } => write!(f, "I:{len:02}:{:016x}", self.prefix()),
            Self::Pointer { len, offset, .. } => {
                write!(f, "P:{len:02}:{:016x}:{offset}", self.prefix())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn roundtrip(ptr: InlinePtr) -> crate::Result<InlinePtr> {
        let mut buf = vec![];
        ptr.encode_into(&mut buf)?;
        assert_eq!(INLINE_PTR_SIZE, buf.len());
        InlinePtr::decode_from(&mut &buf[..])
    }

    #[test]
    fn inline_ptr_chooses_mode_by_length() {
        assert!(matches!(InlinePtr::new(b""), InlinePtr::Inline { len: 0, .. }));
        assert!(matches!(
            InlinePtr::new(b"0123456789abc"),
            InlinePtr::Inline { len: 13, .. }
        ));
        assert!(InlinePtr::new(b"0123456789abcd").is_pointer());
        assert!(InlinePtr::from_option(None).is_null());
    }

    #[test]
    fn inline_ptr_prefix_ignores_storage_mode() {
        let short = InlinePtr::new(b"abcdefgh");
        let long = InlinePtr::new(b"abcdefgh-and-then-some");

        assert_eq!(short.prefix(), long.prefix());
        assert_eq!(u64::from_be_bytes(*b"abcdefgh"), short.prefix());

        assert_eq!(prefix_of(b"ab"), InlinePtr::new(b"ab").prefix());
        assert!(InlinePtr::new(b"ab").prefix() < InlinePtr::new(b"b").prefix());
        assert_eq!(0, InlinePtr::Null.prefix());
    }

    #[test]
    fn inline_ptr_wire_layout() -> crate::Result<()> {
        let mut buf = vec![];
        InlinePtr::new(b"key").encode_into(&mut buf)?;
        assert_eq!(&[2, 3, 0, b'k', b'e', b'y', 0], &buf[..7]);

        buf.clear();
        InlinePtr::new(b"0123456789abcdef")
            .with_offset(0x01_0203_0405)
            .encode_into(&mut buf)?;
        assert_eq!(&[1, 16, 0], &buf[..3]);
        assert_eq!(b"01234567", &buf[3..11]);
        assert_eq!(&[1, 2, 3, 4, 5], &buf[11..]);

        Ok(())
    }

    #[test]
    fn inline_ptr_roundtrip_offsets() -> crate::Result<()> {
        let data = vec![7; 100];

        for offset in [0, 1, 4_096, u64::from(u32::MAX), MAX_OFFSET] {
            let ptr = InlinePtr::new(&data).with_offset(offset);
            assert_eq!(ptr, roundtrip(ptr)?);
            assert_eq!(Some(offset), roundtrip(ptr)?.offset());
        }

        for ptr in [
            InlinePtr::Null,
            InlinePtr::new(b""),
            InlinePtr::new(b"x"),
            InlinePtr::new(&[255; MAX_INLINE_LEN]),
            InlinePtr::new(&vec![1; usize::from(u16::MAX)]),
        ] {
            assert_eq!(ptr, roundtrip(ptr)?);
        }

        Ok(())
    }

    #[test]
    fn inline_ptr_decode_rejects_garbage() {
        let mut buf = [0u8; INLINE_PTR_SIZE];

        buf[0] = 9;
        assert!(matches!(
            InlinePtr::decode_from(&mut &buf[..]),
            Err(crate::Error::InvalidTag(("InlinePtr", 9)))
        ));

        buf[0] = 2;
        buf[1] = 14;
        assert!(matches!(
            InlinePtr::decode_from(&mut &buf[..]),
            Err(crate::Error::MalformedLength(("InlinePtr", 14)))
        ));

        buf[0] = 1;
        buf[1] = 5;
        assert!(matches!(
            InlinePtr::decode_from(&mut &buf[..]),
            Err(crate::Error::MalformedLength(("InlinePtr", 5)))
        ));

        assert!(matches!(
            InlinePtr::decode_from(&mut &buf[..4]),
            Err(crate::Error::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof
        ));
    }

    #[test]
    fn inline_ptr_resolve_checks_bounds() -> crate::Result<()> {
        let region = b"..........0123456789abcdef".to_vec();
        let ptr = InlinePtr::new(b"0123456789abcdef").with_offset(10);

        assert_eq!(Some(&b"0123456789abcdef"[..]), ptr.resolve(&region)?);
        assert_eq!(Some(&b"abc"[..]), InlinePtr::new(b"abc").resolve(&[])?);
        assert_eq!(None, InlinePtr::Null.resolve(&region)?);

        let ptr = ptr.with_offset(11);
        assert!(matches!(
            ptr.resolve(&region),
            Err(crate::Error::InvalidPointer { offset: 11, len: 16 })
        ));

        let ptr = ptr.with_offset(MAX_OFFSET);
        assert!(ptr.resolve(&region).is_err());

        Ok(())
    }
}
