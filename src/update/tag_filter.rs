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

use anyhow::Result;
use regex::Regex;
use semver::{Version, VersionReq};

use super::version::compare_versions;

pub const DEFAULT_VERSION_REGEX: &str = r"^v?\d+(\.\d+)*$";
const UNSTABLE_REGEX: &str =
    r"(?i)(^|[.\-_+])(alpha|beta|rc|pre|dev|nightly|edge|snapshot|canary|preview|test|latest)";

/// Decides which tags count as stable release candidates.
#[derive(Debug, Clone)]
pub struct TagFilter {
    version_regex: Regex,
    unstable_regex: Regex,
    version_req: Option<VersionReq>,
}

fn semver_of(tag: &str) -> Option<Version> {
    let tag = tag.strip_prefix('v').unwrap_or(tag);
    let padded = match tag.split('.').count() {
        1 => format!("{tag}.0.0"),
        2 => format!("{tag}.0"),
        _ => tag.to_string(),
    };
    Version::parse(&padded).ok()
}

impl TagFilter {
    pub fn new(version_regex: Option<&str>, version_req: Option<&str>) -> Result<TagFilter> {
        let version_regex = Regex::new(version_regex.unwrap_or(DEFAULT_VERSION_REGEX))?;
        let unstable_regex = Regex::new(UNSTABLE_REGEX)?;
        let version_req = version_req.map(VersionReq::parse).transpose()?;
        Ok(TagFilter {
            version_regex,
            unstable_regex,
            version_req,
        })
    }

    pub fn is_stable(&self, tag: &str) -> bool {
        if !self.version_regex.is_match(tag) || self.unstable_regex.is_match(tag) {
            return false;
        }
        match &self.version_req {
            Some(req) => semver_of(tag).is_some_and(|v| req.matches(&v)),
            None => true,
        }
    }

    /// Short form of a non-default filter, `None` for the default one.
    pub fn describe(&self) -> Option<String> {
        let regex = self.version_regex.as_str();
        let regex = (regex != DEFAULT_VERSION_REGEX).then(|| format!("regex={regex}"));
        let req = self.version_req.as_ref().map(|req| format!("req={req}"));
        match (regex, req) {
            (Some(regex), Some(req)) => Some(format!("{regex};{req}")),
            (regex, req) => regex.or(req),
        }
    }

    /// Greatest stable tag according to [`compare_versions`].
    pub fn latest<'a, I>(&self, tags: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        tags.into_iter()
            .filter(|tag| self.is_stable(tag))
            .max_by(|a, b| compare_versions(a, b))
    }
}

/// Adds or removes a leading `v` on `candidate` so it is written the way
/// `current` is.
pub fn match_prefix(current: &str, candidate: &str) -> String {
    match (current.starts_with('v'), candidate.strip_prefix('v')) {
        (true, None) => format!("v{candidate}"),
        (false, Some(stripped)) => stripped.to_string(),
        _ => candidate.to_string(),
    }
}
