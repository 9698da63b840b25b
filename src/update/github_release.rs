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

use std::{fmt, str::FromStr, time::Duration};

use anyhow::{Result, anyhow};
use log::debug;
use reqwest::{Client, header};
use serde::Deserialize;

use super::{image_reference::ImageReference, tag_filter::TagFilter};

const GITHUB_API: &str = "https://api.github.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubRepository {
    pub owner: String,
    pub repo: String,
}

impl GitHubRepository {
    /// Images published to the GitHub container registry usually share their
    /// name with the repository that releases them.
    pub fn infer(image: &ImageReference) -> Option<GitHubRepository> {
        if image.registry != "ghcr.io" || image.repository.contains('/') {
            return None;
        }
        Some(GitHubRepository {
            owner: image.namespace.clone(),
            repo: image.repository.clone(),
        })
    }
}

impl FromStr for GitHubRepository {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
                Ok(GitHubRepository {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                })
            }
            _ => Err(anyhow!("Expected `owner/repo`, got `{s}`")),
        }
    }
}

impl fmt::Display for GitHubRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
}

fn latest_release<'a>(releases: &'a [Release], filter: &TagFilter) -> Option<&'a str> {
    filter.latest(
        releases
            .iter()
            .filter(|r| !r.draft && !r.prerelease)
            .map(|r| r.tag_name.as_str()),
    )
}

pub struct GitHubReleases {
    client: Client,
    token: Option<String>,
}

impl GitHubReleases {
    pub fn new(timeout: Duration, token: Option<String>) -> Result<GitHubReleases> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(GitHubReleases { client, token })
    }

    pub async fn latest_version(
        &self,
        repository: &GitHubRepository,
        filter: &TagFilter,
    ) -> Result<Option<String>> {
        let url = format!("{GITHUB_API}/repos/{repository}/releases?per_page=50");
        let mut request = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let releases = request
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Release>>()
            .await?;
        debug!("{repository} has {} releases", releases.len());
        Ok(latest_release(&releases, filter).map(str::to_string))
    }
}
