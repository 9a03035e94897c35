// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};

#[allow(clippy::module_name_repetitions)]
pub fn absolute_path<P: AsRef<Path>>(path: P) -> std::io::Result<PathBuf> {
    path.as_ref()
        .absolutize()
        .map(std::borrow::Cow::into_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn absolute_path_is_absolute() -> crate::Result<()> {
        assert!(absolute_path("relative/store")?.is_absolute());
        assert_eq!(Path::new("/a/c"), absolute_path("/a/b/../c")?);
        Ok(())
    }
}
