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


use std::fmt::{self, Write};

use super::Summary;
use crate::update::{ServiceReport, Status};

fn escape(cell: &str) -> String {
    cell.replace('|', "\\|")
}

fn title(report: &ServiceReport) -> String {
    match &report.display_name {
        Some(display_name) => format!("{} (`{}`)", escape(display_name), report.template),
        None => format!("`{}`", report.template),
    }
}

pub fn render(reports: &[ServiceReport], generated_at: &str) -> Result<String, fmt::Error> {
    let summary = Summary::of(reports);
    let mut out = String::new();
    writeln!(out, "# Template image updates\n")?;
    writeln!(out, "Generated at {generated_at}.\n")?;
    writeln!(out, "| Checked | Updates | Up to date | No candidate | Not checkable |")?;
    writeln!(out, "|---:|---:|---:|---:|---:|")?;
    writeln!(
        out,
        "| {} | {} | {} | {} | {} |\n",
        summary.checked,
        summary.updates,
        summary.up_to_date,
        summary.no_candidate,
        summary.not_checkable
    )?;

    writeln!(out, "## Available updates\n")?;
    let updates = reports
        .iter()
        .filter(|r| r.status == Status::UpdateAvailable)
        .collect::<Vec<_>>();
    if updates.is_empty() {
        writeln!(out, "All checked templates are up to date.")?;
    } else {
        writeln!(out, "| Template | Image | Current | Latest | Type |")?;
        writeln!(out, "|---|---|---|---|---|")?;
        for report in updates {
            writeln!(
                out,
                "| {} | `{}` | {} | {} | {} |",
                title(report),
                escape(&report.image),
                report.current_version.as_deref().unwrap_or("-"),
                report.latest_version.as_deref().unwrap_or("-"),
                report.update_type.map(|t| t.to_string()).unwrap_or_default(),
            )?;
        }
    }

    let unchecked = reports
        .iter()
        .filter(|r| matches!(r.status, Status::Unresolved | Status::InvalidReference))
        .collect::<Vec<_>>();
    if !unchecked.is_empty() {
        writeln!(out, "\n## Not checked\n")?;
        for report in unchecked {
            let reason = report.reason.as_deref().unwrap_or("unknown reason");
            writeln!(out, "- {}: {}", title(report), reason)?;
        }
    }
    Ok(out)
}
