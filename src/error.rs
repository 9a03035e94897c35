// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

/// Represents errors that can occur in the store
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// Unknown tag byte while decoding
    InvalidTag((&'static str, u8)),

    /// Length field that is impossible for its tag
    MalformedLength((&'static str, u16)),

    /// Pointer referencing bytes outside of its byte region
    InvalidPointer {
        /// Start of the referenced range
        offset: u64,

        /// Length of the referenced range
        len: u16,
    },

    /// A level file pair is structurally damaged
    Corrupted(&'static str),

    /// Key is longer than the length field can describe
    KeyTooLarge(usize),

    /// Value is longer than the length field can describe
    ValueTooLarge(usize),

    /// A values file grew past the addressable offset range
    OffsetOverflow(u64),

    /// Compaction would need a level slot beyond the configured maximum
    TooManyLevels(usize),

    /// A journal write failed earlier, so the store refuses further writes
    Poisoned,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StoreError: {self:?}")
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Store result
pub type Result<T> = std::result::Result<T, Error>;
