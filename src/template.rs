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

use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use log::warn;
use serde::{Deserialize, Deserializer};
use serde_yaml::Value;

use crate::update::resolve::VariableBinding;

pub const APP_NAME_PLACEHOLDER: &str = "$$cap_appname";

#[derive(Deserialize)]
struct Document {
    #[serde(default)]
    services: BTreeMap<String, Option<ServiceDefinition>>,
    #[serde(rename = "caproverOneClickApp")]
    one_click_app: Option<OneClickApp>,
}

#[derive(Deserialize)]
struct ServiceDefinition {
    image: Option<String>,
}

#[derive(Deserialize)]
struct OneClickApp {
    #[serde(rename = "displayName")]
    display_name: Option<String>,
    #[serde(default)]
    variables: Vec<Variable>,
}

#[derive(Deserialize)]
struct Variable {
    id: String,
    #[serde(rename = "defaultValue", default, deserialize_with = "scalar")]
    default_value: String,
}

fn scalar<'d, D: Deserializer<'d>>(deserializer: D) -> std::result::Result<String, D::Error> {
    let value: Option<Value> = Deserialize::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(_) => Err(serde::de::Error::custom("defaultValue must be a scalar")),
    }
}

/// A one-click app definition from the catalog.
#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub path: PathBuf,
    pub display_name: Option<String>,
    /// Service name to image, for services that have one.
    pub services: BTreeMap<String, String>,
    pub variables: Vec<VariableBinding>,
}

impl Template {
    pub fn parse(path: &Path, content: &str) -> Result<Template> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("Invalid template file name {}", path.display()))?
            .to_string();
        let document: Document = serde_yaml::from_str(content)
            .with_context(|| format!("Cannot parse template {}", path.display()))?;

        let services = document
            .services
            .into_iter()
            .filter_map(|(service, definition)| Some((service, definition?.image?)))
            .collect();

        let (display_name, declared) = match document.one_click_app {
            Some(app) => (app.display_name, app.variables),
            None => (None, Vec::new()),
        };
        let mut seen = HashSet::new();
        let mut variables = Vec::new();
        for variable in declared {
            if !seen.insert(variable.id.clone()) {
                warn!("{name}: ignoring duplicate variable {}", variable.id);
                continue;
            }
            variables.push(VariableBinding::new(variable.id, variable.default_value));
        }

        Ok(Template {
            name,
            path: path.to_path_buf(),
            display_name,
            services,
            variables,
        })
    }

    pub fn read(path: &Path) -> Result<Template> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
        Template::parse(path, &content)
    }

    /// Whether `service` is the app itself rather than a database, cache or
    /// other helper shipped alongside it.
    pub fn is_primary(&self, service: &str) -> bool {
        match service.strip_prefix(APP_NAME_PLACEHOLDER) {
            Some("") => true,
            Some(suffix) => suffix.strip_prefix('-') == Some(self.name.as_str()),
            None => false,
        }
    }

    pub fn primary_services(&self) -> impl Iterator<Item = (&str, &str)> {
        self.services
            .iter()
            .filter(|(service, _)| self.is_primary(service))
            .map(|(service, image)| (service.as_str(), image.as_str()))
    }
}

fn is_template(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|e| e == "yml" || e == "yaml")
}

/// Template files in `dir`, sorted by name. A non-empty `names` keeps only the
/// templates with those base names.
pub fn scan(dir: &Path, names: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Cannot list {}", dir.display()))? {
        let path = entry?.path();
        if !is_template(&path) {
            continue;
        }
        let selected = names.is_empty()
            || path
                .file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|stem| names.iter().any(|n| n == stem));
        if selected {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
