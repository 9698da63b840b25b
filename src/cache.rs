/*
 * Copyright 2025 Michael Krolikowski
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::{
    collections::BTreeMap,
    fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::update::{
    github_release::GitHubRepository, image_reference::ImageReference, tag_filter::TagFilter,
};

pub trait Clock {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// What a latest-version lookup was about. Lookups with a non-default tag
/// filter get their own entry, since the filter decides the result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheKey {
    Registry {
        registry: String,
        namespace: String,
        repository: String,
        filter: Option<String>,
    },
    GitHub {
        owner: String,
        repo: String,
        filter: Option<String>,
    },
}

impl CacheKey {
    pub fn registry(reference: &ImageReference, filter: &TagFilter) -> CacheKey {
        CacheKey::Registry {
            registry: reference.registry.clone(),
            namespace: reference.namespace.clone(),
            repository: reference.repository.clone(),
            filter: filter.describe(),
        }
    }

    pub fn github(repository: &GitHubRepository, filter: &TagFilter) -> CacheKey {
        CacheKey::GitHub {
            owner: repository.owner.clone(),
            repo: repository.repo.clone(),
            filter: filter.describe(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let filter = match self {
            CacheKey::Registry {
                registry,
                namespace,
                repository,
                filter,
            } => {
                write!(f, "registry:{registry}/{namespace}/{repository}")?;
                filter
            }
            CacheKey::GitHub {
                owner,
                repo,
                filter,
            } => {
                write!(f, "github:{owner}/{repo}")?;
                filter
            }
        };
        match filter {
            Some(filter) => write!(f, "#{filter}"),
            None => Ok(()),
        }
    }
}

pub trait Cache {
    fn get(&self, key: &CacheKey) -> Option<String>;
    fn put(&mut self, key: &CacheKey, value: &str);
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub version: String,
    /// Unix timestamp in seconds.
    pub captured_at: i64,
}

/// Latest-version cache kept in a JSON file.
pub struct FileCache<C: Clock = SystemClock> {
    path: Option<PathBuf>,
    ttl: Duration,
    clock: C,
    read: bool,
    dirty: bool,
    entries: BTreeMap<String, CacheEntry>,
}

impl FileCache<SystemClock> {
    pub fn open(path: &Path, ttl: Duration) -> FileCache<SystemClock> {
        FileCache::open_with_clock(path, ttl, SystemClock)
    }
}

impl<C: Clock> FileCache<C> {
    /// Loads `path` if it exists. A corrupt cache file is logged and started
    /// over rather than failing the run.
    pub fn open_with_clock(path: &Path, ttl: Duration, clock: C) -> FileCache<C> {
        let entries = match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Ignoring unreadable cache {}: {e}", path.display());
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        FileCache {
            path: Some(path.to_path_buf()),
            ttl,
            clock,
            read: true,
            dirty: false,
            entries,
        }
    }

    /// Cache that is never written to disk.
    pub fn in_memory(ttl: Duration, clock: C) -> FileCache<C> {
        FileCache {
            path: None,
            ttl,
            clock,
            read: true,
            dirty: false,
            entries: BTreeMap::new(),
        }
    }

    /// Keeps recording fresh results but never serves cached ones.
    pub fn bypass_reads(mut self) -> Self {
        self.read = false;
        self
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        let age = self.clock.now().unix_timestamp() - entry.captured_at;
        age >= 0 && (age as u64) < self.ttl.as_secs()
    }

    pub fn save(&mut self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }
        let now = self.clock.now().unix_timestamp();
        let ttl = self.ttl.as_secs() as i64;
        self.entries.retain(|_, e| now - e.captured_at < ttl);
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(&self.entries)?;
        fs::write(path, content).with_context(|| format!("Cannot write {}", path.display()))?;
        debug!("Saved {} cache entries to {}", self.entries.len(), path.display());
        self.dirty = false;
        Ok(())
    }
}

impl<C: Clock> Cache for FileCache<C> {
    fn get(&self, key: &CacheKey) -> Option<String> {
        if !self.read {
            return None;
        }
        self.entries
            .get(&key.to_string())
            .filter(|e| self.is_fresh(e))
            .map(|e| e.version.clone())
    }

    fn put(&mut self, key: &CacheKey, value: &str) {
        let entry = CacheEntry {
            version: value.to_string(),
            captured_at: self.clock.now().unix_timestamp(),
        };
        self.entries.insert(key.to_string(), entry);
        self.dirty = true;
    }
}
