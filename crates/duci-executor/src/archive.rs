//! Build-context packing.
//!
//! Packs a directory tree into an uncompressed tar stream suitable as a
//! Docker build context. Every non-directory file is archived under its
//! path relative to the packed directory with mode 0600; symlinks are
//! resolved to their targets. File modes inside the image come from the
//! Dockerfile, not the context.

use std::fs;
use std::path::Path;

use duci_core::{Error, Result};

/// Pack `dir` into an in-memory tar archive.
pub fn pack(dir: &Path) -> Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    append_dir(&mut builder, dir, dir)?;
    builder
        .into_inner()
        .map_err(|e| Error::Build(format!("failed to finish build context: {e}")))
}

fn append_dir(builder: &mut tar::Builder<Vec<u8>>, root: &Path, dir: &Path) -> Result<()> {
    let entries =
        fs::read_dir(dir).map_err(|e| Error::Build(format!("failed to walk {}: {e}", dir.display())))?;

    for entry in entries {
        let entry = entry.map_err(|e| Error::Build(format!("failed to walk {}: {e}", dir.display())))?;
        let path = entry.path();
        let metadata = fs::metadata(&path)
            .map_err(|e| Error::Build(format!("failed to stat {}: {e}", path.display())))?;

        if metadata.is_dir() {
            append_dir(builder, root, &path)?;
            continue;
        }

        let data = fs::read(&path)
            .map_err(|e| Error::Build(format!("failed to read {}: {e}", path.display())))?;
        let name = path
            .strip_prefix(root)
            .map_err(|e| Error::Build(format!("path outside context: {e}")))?;

        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o600);
        builder
            .append_data(&mut header, name, data.as_slice())
            .map_err(|e| Error::Build(format!("failed to archive {}: {e}", path.display())))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Read;

    fn unpack(data: &[u8]) -> HashMap<String, (u32, Vec<u8>)> {
        let mut archive = tar::Archive::new(data);
        let mut entries = HashMap::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let name = entry.path().unwrap().to_string_lossy().into_owned();
            let mode = entry.header().mode().unwrap();
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents).unwrap();
            entries.insert(name, (mode, contents));
        }
        entries
    }

    #[test]
    fn pack_archives_files_relative_to_the_context() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Dockerfile"), b"FROM alpine\n").unwrap();
        fs::create_dir_all(dir.path().join(".duci")).unwrap();
        fs::write(dir.path().join(".duci/config.yml"), b"volumes: []\n").unwrap();

        let tar = pack(dir.path()).unwrap();
        let entries = unpack(&tar);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries["Dockerfile"].1, b"FROM alpine\n");
        assert_eq!(entries[".duci/config.yml"].1, b"volumes: []\n");
    }

    #[test]
    fn pack_applies_mode_0600_to_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("run.sh"), b"#!/bin/sh\n").unwrap();

        let tar = pack(dir.path()).unwrap();
        let entries = unpack(&tar);

        assert_eq!(entries["run.sh"].0, 0o600);
    }

    #[test]
    fn pack_skips_directories_themselves() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("empty")).unwrap();

        let tar = pack(dir.path()).unwrap();

        assert!(unpack(&tar).is_empty());
    }

    #[test]
    fn pack_fails_on_a_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");

        assert!(pack(&missing).is_err());
    }
}
