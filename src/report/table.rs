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


use crate::update::{ServiceReport, Status};

const HEADER: [&str; 6] = ["TEMPLATE", "IMAGE", "CURRENT", "LATEST", "UPDATE", "STATUS"];

fn status(report: &ServiceReport) -> &'static str {
    match report.status {
        Status::UpToDate => "up to date",
        Status::UpdateAvailable => "update available",
        Status::NoCandidate => "no candidate",
        Status::Unresolved => "unresolved",
        Status::InvalidReference => "invalid reference",
    }
}

fn row(report: &ServiceReport) -> [String; 6] {
    let or_dash = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
    [
        report.template.clone(),
        report.image.clone(),
        or_dash(report.current_version.clone()),
        or_dash(report.latest_version.clone()),
        or_dash(report.update_type.map(|t| t.to_string())),
        status(report).to_string(),
    ]
}

pub fn render(reports: &[ServiceReport]) -> String {
    let rows = reports.iter().map(row).collect::<Vec<_>>();
    let mut widths = HEADER.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let header = HEADER.map(str::to_string);
    let mut out = String::new();
    for row in std::iter::once(&header).chain(&rows) {
        let line = row
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ");
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}
