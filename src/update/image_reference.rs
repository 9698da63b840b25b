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

use std::{fmt, str::FromStr};

use thiserror::Error;

use super::resolve::PLACEHOLDER_MARKER;

pub const DEFAULT_REGISTRY: &str = "docker.io";
pub const OFFICIAL_NAMESPACE: &str = "library";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("image reference `{0}` has no tag")]
    MissingTag(String),
    #[error("image reference `{0}` has more than one `:`")]
    AmbiguousTag(String),
    #[error("image reference `{0}` contains an unresolved placeholder")]
    Unresolved(String),
    #[error("image reference `{0}` is pinned by digest")]
    Digest(String),
    #[error("image reference `{0}` has an empty name component")]
    EmptyComponent(String),
}

/// Parsed identity of a container image as written in a template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    pub registry: String,
    pub namespace: String,
    pub repository: String,
    pub tag: String,
}

impl ImageReference {
    /// Splits `raw` into registry, namespace, repository and tag.
    ///
    /// Exactly one `:` must separate the name from the tag. References with a
    /// registry port, a digest or a leftover template placeholder are rejected
    /// instead of guessed at.
    pub fn parse(raw: &str) -> Result<ImageReference, ReferenceError> {
        if raw.contains(PLACEHOLDER_MARKER) {
            return Err(ReferenceError::Unresolved(raw.to_string()));
        }
        if raw.contains('@') {
            return Err(ReferenceError::Digest(raw.to_string()));
        }
        let (name, tag) = match raw.split_once(':') {
            None => return Err(ReferenceError::MissingTag(raw.to_string())),
            Some((_, tag)) if tag.contains(':') => {
                return Err(ReferenceError::AmbiguousTag(raw.to_string()));
            }
            Some((name, tag)) => (name, tag),
        };
        if tag.is_empty() {
            return Err(ReferenceError::MissingTag(raw.to_string()));
        }

        let segments = name.split('/').collect::<Vec<_>>();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(ReferenceError::EmptyComponent(raw.to_string()));
        }
        let (registry, namespace, repository) = match segments.as_slice() {
            [repository] => (DEFAULT_REGISTRY, OFFICIAL_NAMESPACE, repository.to_string()),
            [namespace, repository] => (DEFAULT_REGISTRY, *namespace, repository.to_string()),
            [registry, namespace, rest @ ..] => (*registry, *namespace, rest.join("/")),
            [] => return Err(ReferenceError::EmptyComponent(raw.to_string())),
        };

        Ok(ImageReference {
            registry: registry.to_string(),
            namespace: namespace.to_string(),
            repository,
            tag: tag.to_string(),
        })
    }

    pub fn is_official(&self) -> bool {
        self.namespace == OFFICIAL_NAMESPACE
    }

    /// Repository path as the registry API expects it, e.g. `library/nginx`.
    pub fn path(&self) -> String {
        format!("{}/{}", self.namespace, self.repository)
    }
}

impl FromStr for ImageReference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImageReference::parse(s)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.path(), self.tag)
    }
}
