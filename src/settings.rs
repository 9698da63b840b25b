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

use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Deserializer};

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LookupKind {
    Registry,
    GitHub,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Ignore {
    pub template: String,
    pub service: Option<String>,
}

impl Ignore {
    pub fn matches(&self, template: &str, service: &str) -> bool {
        self.template == template && self.service.as_ref().is_none_or(|s| s == service)
    }
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct Override {
    pub template: String,
    pub github: Option<String>,
    pub version_regex: Option<String>,
    pub version_req: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,
    #[serde(default = "default_cache_file")]
    pub cache_file: PathBuf,
    #[serde(deserialize_with = "parse_duration", default = "default_cache_ttl")]
    pub cache_ttl: Duration,
    #[serde(deserialize_with = "parse_duration", default = "default_request_delay")]
    pub request_delay: Duration,
    #[serde(
        deserialize_with = "parse_duration",
        default = "default_request_timeout"
    )]
    pub request_timeout: Duration,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_lookups")]
    pub lookups: Vec<LookupKind>,
    pub github_token: Option<String>,
    #[serde(default = "Vec::new")]
    pub ignore: Vec<Ignore>,
    #[serde(default = "Vec::new")]
    pub overrides: Vec<Override>,
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("public/v4/apps")
}

fn default_cache_file() -> PathBuf {
    PathBuf::from(".cache/template-tag-radar.json")
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(6 * 60 * 60)
}

fn default_request_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_concurrency() -> usize {
    4
}

fn default_lookups() -> Vec<LookupKind> {
    vec![LookupKind::Registry, LookupKind::GitHub]
}

fn parse_duration<'d, D: Deserializer<'d>>(
    deserializer: D,
) -> std::result::Result<Duration, D::Error> {
    let s: String = Deserialize::deserialize(deserializer)?;
    let d = s
        .parse::<iso8601_duration::Duration>()
        .map_err(|_| serde::de::Error::custom("Cannot parse ISO-8601 duration"))?;
    d.to_std()
        .ok_or(serde::de::Error::custom("Cannot convert to duration"))
}

impl Settings {
    pub fn read(filename: &str) -> Result<Settings> {
        let config = Config::builder()
            .add_source(
                File::with_name(filename)
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(Environment::with_prefix("TTR"))
            .build()?;
        let settings = config.try_deserialize()?;
        Ok(settings)
    }

    pub fn is_ignored(&self, template: &str, service: &str) -> bool {
        self.ignore.iter().any(|i| i.matches(template, service))
    }

    pub fn find_override(&self, template: &str) -> Option<&Override> {
        self.overrides.iter().find(|o| o.template == template)
    }

    pub fn lookup_enabled(&self, kind: LookupKind) -> bool {
        self.lookups.contains(&kind)
    }
}
