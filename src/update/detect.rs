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

use serde::Serialize;

use super::version::{UpdateType, classify, compare_versions};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateVerdict {
    pub current_version: String,
    pub candidate_version: String,
    pub has_update: bool,
    pub update_type: Option<UpdateType>,
}

/// Compares `current` against a discovered `candidate`. Without a candidate
/// there is nothing to say, which is different from being up to date.
pub fn detect(current: &str, candidate: Option<&str>) -> Option<UpdateVerdict> {
    let candidate = candidate?;
    let has_update = compare_versions(candidate, current).is_gt();
    Some(UpdateVerdict {
        current_version: current.to_string(),
        candidate_version: candidate.to_string(),
        has_update,
        update_type: has_update.then(|| classify(current, candidate)),
    })
}
