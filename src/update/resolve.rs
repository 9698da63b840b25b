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

use super::image_reference::{ImageReference, ReferenceError};

pub const PLACEHOLDER_MARKER: &str = "$$cap_";

/// A template variable and the value it defaults to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableBinding {
    pub id: String,
    pub default_value: String,
}

impl VariableBinding {
    pub fn new(id: impl Into<String>, default_value: impl Into<String>) -> Self {
        VariableBinding {
            id: id.into(),
            default_value: default_value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub image: String,
    pub has_variables: bool,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        !self.image.contains(PLACEHOLDER_MARKER)
    }
}

enum Piece<'a> {
    Template(String),
    Substituted(&'a str),
}

/// Substitutes every binding id in `raw` with its default value.
///
/// Bindings are applied in order, each one everywhere it occurs, but only in
/// text that came from `raw` itself: a default value is never scanned for
/// further placeholders.
pub fn resolve(raw: &str, bindings: &[VariableBinding]) -> Resolution {
    if !raw.contains(PLACEHOLDER_MARKER) {
        return Resolution {
            image: raw.to_string(),
            has_variables: false,
        };
    }

    let mut pieces = vec![Piece::Template(raw.to_string())];
    for binding in bindings.iter().filter(|b| !b.id.is_empty()) {
        pieces = pieces
            .into_iter()
            .flat_map(|piece| match piece {
                Piece::Template(text) if text.contains(&binding.id) => {
                    let mut split = Vec::new();
                    for (i, part) in text.split(binding.id.as_str()).enumerate() {
                        if i > 0 {
                            split.push(Piece::Substituted(binding.default_value.as_str()));
                        }
                        if !part.is_empty() {
                            split.push(Piece::Template(part.to_string()));
                        }
                    }
                    split
                }
                piece => vec![piece],
            })
            .collect();
    }

    let image = pieces
        .iter()
        .map(|piece| match piece {
            Piece::Template(text) => text.as_str(),
            Piece::Substituted(value) => *value,
        })
        .collect();
    Resolution {
        image,
        has_variables: true,
    }
}

/// One deployable unit of a template after variable expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedService {
    pub service_name: String,
    pub original_image: String,
    pub resolved_image: String,
    pub has_variables: bool,
    pub parsed: Result<ImageReference, ReferenceError>,
}

impl ResolvedService {
    /// Resolves and parses `image`. A reference with leftover placeholders is
    /// never handed to the parser.
    pub fn new(service_name: &str, image: &str, bindings: &[VariableBinding]) -> Self {
        let resolution = resolve(image, bindings);
        let parsed = if resolution.is_complete() {
            ImageReference::parse(&resolution.image)
        } else {
            Err(ReferenceError::Unresolved(resolution.image.clone()))
        };
        ResolvedService {
            service_name: service_name.to_string(),
            original_image: image.to_string(),
            resolved_image: resolution.image,
            has_variables: resolution.has_variables,
            parsed,
        }
    }

    pub fn reference(&self) -> Option<&ImageReference> {
        self.parsed.as_ref().ok()
    }
}
