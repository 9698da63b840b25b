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

mod markdown;
mod table;

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::update::{ServiceReport, Status, version::UpdateType};

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Table,
    Markdown,
    Json,
}

#[derive(Serialize, Default, Debug, PartialEq, Eq)]
pub struct Summary {
    pub checked: usize,
    pub updates: usize,
    pub up_to_date: usize,
    pub no_candidate: usize,
    pub not_checkable: usize,
    pub major: usize,
    pub minor: usize,
    pub patch: usize,
    pub other: usize,
}

impl Summary {
    pub fn of(reports: &[ServiceReport]) -> Summary {
        let mut summary = Summary {
            checked: reports.len(),
            ..Summary::default()
        };
        for report in reports {
            match report.status {
                Status::UpdateAvailable => summary.updates += 1,
                Status::UpToDate => summary.up_to_date += 1,
                Status::NoCandidate => summary.no_candidate += 1,
                Status::Unresolved | Status::InvalidReference => summary.not_checkable += 1,
            }
            match report.update_type {
                Some(UpdateType::Major) => summary.major += 1,
                Some(UpdateType::Minor) => summary.minor += 1,
                Some(UpdateType::Patch) => summary.patch += 1,
                Some(UpdateType::Other) => summary.other += 1,
                None => (),
            }
        }
        summary
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    summary: Summary,
    services: &'a [ServiceReport],
}

pub fn render(
    format: Format,
    reports: &[ServiceReport],
    generated_at: OffsetDateTime,
) -> Result<String> {
    let generated_at = generated_at.format(&Rfc3339)?;
    let rendered = match format {
        Format::Table => table::render(reports),
        Format::Markdown => markdown::render(reports, &generated_at)?,
        Format::Json => {
            let report = JsonReport {
                generated_at,
                summary: Summary::of(reports),
                services: reports,
            };
            serde_json::to_string_pretty(&report)? + "\n"
        }
    };
    Ok(rendered)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::{settings::Settings, template::Template, update::plan};
    use std::path::Path;

    pub fn reports() -> Vec<ServiceReport> {
        let settings = Settings::read("does-not-exist.yaml").unwrap();
        let checks = [
            ("wordpress", "wordpress:$$cap_v", Some("6.7.1")),
            ("nginx", "nginx:1.27", Some("2.0")),
            ("redis", "redis:7.2", Some("7.2")),
            ("ghost", "ghost:$$cap_missing", None),
            ("gitea", "gitea/gitea:1.22", None),
        ];
        checks
            .into_iter()
            .map(|(name, image, candidate)| {
                let content = format!(
                    "services:\n  $$cap_appname:\n    image: {image}\ncaproverOneClickApp:\n  displayName: {name}\n  variables:\n    - id: $$cap_v\n      defaultValue: 6.7.0\n"
                );
                let path = format!("apps/{name}.yml");
                let template = Template::parse(Path::new(&path), &content).unwrap();
                let service = &plan(&template, &settings)[0];
                ServiceReport::new(&template, service, candidate)
            })
            .collect()
    }

    #[test]
    fn summary_counts() {
        assert_eq!(
            Summary::of(&reports()),
            Summary {
                checked: 5,
                updates: 2,
                up_to_date: 1,
                no_candidate: 1,
                not_checkable: 1,
                major: 1,
                minor: 0,
                patch: 1,
                other: 0,
            }
        );
    }

    #[test]
    fn json_report() {
        let generated_at = OffsetDateTime::from_unix_timestamp(0).unwrap();
        let json = render(Format::Json, &reports(), generated_at).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["generated_at"], "1970-01-01T00:00:00Z");
        assert_eq!(value["summary"]["updates"], 2);
        let wordpress = &value["services"][0];
        assert_eq!(wordpress["template"], "wordpress");
        assert_eq!(wordpress["current_version"], "6.7.0");
        assert_eq!(wordpress["latest_version"], "6.7.1");
        assert_eq!(wordpress["has_update"], true);
        assert_eq!(wordpress["update_type"], "patch");
        assert_eq!(wordpress["status"], "update_available");
        assert_eq!(value["services"][3]["status"], "unresolved");
        assert_eq!(value["services"][4]["latest_version"], serde_json::Value::Null);
    }
}
