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


use std::{collections::BTreeSet, fs, path::Path};

use anyhow::{Context, Result, anyhow};
use log::{info, warn};
use regex::Regex;

use crate::{
    template::Template,
    update::{ServiceReport, Status, resolve::VariableBinding},
};

#[derive(Debug, PartialEq, Eq)]
pub struct Rewrite {
    pub content: String,
    pub replacements: usize,
}

fn indent(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn body(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

fn replace_line(line: &str, pattern: &Regex, replacement: &str) -> Option<String> {
    let body = body(line);
    let caps = pattern.captures(body)?;
    let ending = &line[body.len()..];
    Some(format!("{}{replacement}{}{ending}", &caps[1], &caps[2]))
}

/// Line indexes of every list item that declares variable `id`, including
/// the lines nested below the item.
fn variable_items(lines: &[&str], id: &str) -> Result<BTreeSet<usize>> {
    let id_line = Regex::new(&format!(
        r#"^\s*(?:-\s+)?id:\s*["']?{}["']?\s*(?:#.*)?$"#,
        regex::escape(id)
    ))?;
    let item_start = Regex::new(r"^\s*-\s")?;

    let mut selected = BTreeSet::new();
    for (start, line) in lines.iter().enumerate() {
        if !item_start.is_match(line) {
            continue;
        }
        let depth = indent(line);
        let end = lines[start + 1..]
            .iter()
            .position(|l| !body(l).trim().is_empty() && indent(l) <= depth)
            .map_or(lines.len(), |p| start + 1 + p);
        let item = start..end;
        if item.clone().any(|i| id_line.is_match(body(lines[i]))) {
            selected.extend(item);
        }
    }
    Ok(selected)
}

/// Replaces `old` with `new` in the `image:` lines showing `image` and in the
/// `defaultValue` of every variable used by `image` that is set to `old`.
///
/// This is plain text editing: any other line that happens to look the same
/// is changed too.
pub fn rewrite(
    content: &str,
    image: &str,
    variables: &[VariableBinding],
    old: &str,
    new: &str,
) -> Result<Rewrite> {
    let mut lines = content.split_inclusive('\n').collect::<Vec<_>>();
    if lines.is_empty() {
        lines.push("");
    }
    let mut rewritten = lines.iter().map(|l| l.to_string()).collect::<Vec<_>>();
    let mut replacements = 0;

    let (name, tag) = image
        .split_once(':')
        .ok_or_else(|| anyhow!("Image {image} has no tag"))?;
    if tag.contains(old) {
        let image_line = Regex::new(&format!(
            r#"^(\s*image:\s*["']?){}(["']?\s*(?:#.*)?)$"#,
            regex::escape(image)
        ))?;
        let replacement = format!("{name}:{}", tag.replace(old, new));
        for (i, line) in lines.iter().enumerate() {
            if let Some(line) = replace_line(line, &image_line, &replacement) {
                rewritten[i] = line;
                replacements += 1;
            }
        }
    }

    let value_line = Regex::new(&format!(
        r#"^(\s*(?:-\s+)?defaultValue:\s*["']?){}(["']?\s*(?:#.*)?)$"#,
        regex::escape(old)
    ))?;
    for variable in variables
        .iter()
        .filter(|v| v.default_value == old && image.contains(&v.id))
    {
        for i in variable_items(&lines, &variable.id)? {
            if let Some(line) = replace_line(lines[i], &value_line, new) {
                rewritten[i] = line;
                replacements += 1;
            }
        }
    }

    Ok(Rewrite {
        content: rewritten.concat(),
        replacements,
    })
}

/// Writes the newer version of `report` into its template file. Returns the
/// number of replaced occurrences; with `dry_run` nothing is written.
pub fn apply_update(report: &ServiceReport, dry_run: bool) -> Result<usize> {
    let (Status::UpdateAvailable, Some(old), Some(new)) = (
        report.status,
        report.current_version.as_deref(),
        report.latest_version.as_deref(),
    ) else {
        return Ok(0);
    };
    let path: &Path = &report.file;
    let content =
        fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
    let template = Template::parse(path, &content)?;
    let rewrite = rewrite(&content, &report.image, &template.variables, old, new)?;

    if rewrite.replacements == 0 {
        warn!(
            "{}: found no occurrence of {old} to replace for {}",
            report.template, report.image
        );
        return Ok(0);
    }
    if dry_run {
        info!(
            "{}: would update {old} -> {new} ({} replacements)",
            report.template, rewrite.replacements
        );
    } else {
        fs::write(path, &rewrite.content)
            .with_context(|| format!("Cannot write {}", path.display()))?;
        info!(
            "{}: updated {old} -> {new} ({} replacements)",
            report.template, rewrite.replacements
        );
    }
    Ok(rewrite.replacements)
}
