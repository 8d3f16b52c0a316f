// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! On-disk layout of spaces.
//!
//! ```text
//! {root}/{user}/{name}/docker-compose.yml
//! {root}/{user}/{name}/pubkey            (optional)
//! ```
//!
//! The manifest file is the existence predicate for a space. Paths are a pure
//! function of the identity; nothing here is cached.

use std::fs;
use std::io;
use std::path::PathBuf;

use crate::domain::manifest::{MANIFEST_FILE, PUBKEY_FILE};
use crate::domain::name_allocator;
use crate::domain::space::SpaceIdentity;

#[derive(Debug, Clone)]
pub struct SpaceStore {
    root: PathBuf,
}

impl SpaceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn user_dir(&self, user: &str) -> PathBuf {
        self.root.join(user)
    }

    pub fn space_dir(&self, id: &SpaceIdentity) -> PathBuf {
        self.user_dir(&id.user).join(&id.name)
    }

    pub fn manifest_path(&self, id: &SpaceIdentity) -> PathBuf {
        self.space_dir(id).join(MANIFEST_FILE)
    }

    pub fn manifest_exists(&self, id: &SpaceIdentity) -> bool {
        self.manifest_path(id).is_file()
    }

    pub fn dir_exists(&self, id: &SpaceIdentity) -> bool {
        self.space_dir(id).is_dir()
    }

    /// Write the credential file (if any) and then the manifest, so a space
    /// only becomes visible once everything it needs is on disk.
    pub fn write_space(&self, id: &SpaceIdentity, manifest: &str, pubkey: Option<&str>) -> io::Result<PathBuf> {
        let dir = self.space_dir(id);
        fs::create_dir_all(&dir)?;

        let pubkey_path = dir.join(PUBKEY_FILE);
        match pubkey.filter(|key| !key.is_empty()) {
            Some(key) => fs::write(&pubkey_path, key)?,
            None if pubkey_path.exists() => fs::remove_file(&pubkey_path)?,
            None => {}
        }

        fs::write(dir.join(MANIFEST_FILE), manifest)?;
        Ok(dir)
    }

    /// Names of the directories under a user's root. A missing user
    /// directory yields an empty list.
    pub fn list_space_dirs(&self, user: &str) -> io::Result<Vec<String>> {
        let entries = match fs::read_dir(self.user_dir(user)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn remove_space(&self, id: &SpaceIdentity) -> io::Result<()> {
        match fs::remove_dir_all(self.space_dir(id)) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    pub fn pick_name(&self, user: &str, candidates: &[&str]) -> Option<String> {
        name_allocator::pick_name(&self.user_dir(user), candidates).map(String::from)
    }
}
