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

pub mod detect;
pub mod github_release;
pub mod image_reference;
mod latest_image_version;
pub mod resolve;
pub mod tag_filter;
mod throttle;
pub mod version;

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::Result;
use detect::detect;
use github_release::{GitHubReleases, GitHubRepository};
use image_reference::{ImageReference, ReferenceError};
use latest_image_version::LatestImageVersion;
use log::{debug, error, info};
use oci_client::client::ClientConfig;
use resolve::ResolvedService;
use serde::Serialize;
use tag_filter::{TagFilter, match_prefix};
use throttle::Throttle;
use tokio::{sync::Semaphore, task::JoinSet};
use version::{UpdateType, compare_versions};

use crate::{
    cache::{Cache, CacheKey},
    log::LogError,
    settings::{LookupKind, Settings},
    template::Template,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    UpToDate,
    UpdateAvailable,
    NoCandidate,
    Unresolved,
    InvalidReference,
}

/// Outcome of checking one primary service of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceReport {
    pub template: String,
    pub display_name: Option<String>,
    pub file: PathBuf,
    pub service: String,
    pub image: String,
    pub resolved_image: String,
    pub has_variables: bool,
    pub current_version: Option<String>,
    pub latest_version: Option<String>,
    pub has_update: bool,
    pub update_type: Option<UpdateType>,
    pub status: Status,
    pub reason: Option<String>,
}

impl ServiceReport {
    pub fn new(template: &Template, service: &ResolvedService, candidate: Option<&str>) -> Self {
        let (status, verdict, reason) = match &service.parsed {
            Err(e @ ReferenceError::Unresolved(_)) => {
                (Status::Unresolved, None, Some(e.to_string()))
            }
            Err(e) => (Status::InvalidReference, None, Some(e.to_string())),
            Ok(reference) => match detect(&reference.tag, candidate) {
                None => (Status::NoCandidate, None, None),
                Some(v) if v.has_update => (Status::UpdateAvailable, Some(v), None),
                Some(v) => (Status::UpToDate, Some(v), None),
            },
        };
        ServiceReport {
            template: template.name.clone(),
            display_name: template.display_name.clone(),
            file: template.path.clone(),
            service: service.service_name.clone(),
            image: service.original_image.clone(),
            resolved_image: service.resolved_image.clone(),
            has_variables: service.has_variables,
            current_version: service.reference().map(|r| r.tag.clone()),
            latest_version: verdict.as_ref().map(|v| v.candidate_version.clone()),
            has_update: verdict.as_ref().is_some_and(|v| v.has_update),
            update_type: verdict.and_then(|v| v.update_type),
            status,
            reason,
        }
    }
}

/// The services of `template` that get checked automatically.
pub fn plan(template: &Template, settings: &Settings) -> Vec<ResolvedService> {
    template
        .primary_services()
        .filter(|(service, _)| {
            let ignored = settings.is_ignored(&template.name, service);
            if ignored {
                info!("{}: ignoring {service}", template.name);
            }
            !ignored
        })
        .map(|(service, image)| ResolvedService::new(service, image, &template.variables))
        .collect()
}

struct Lookups<C> {
    settings: Settings,
    registry: Option<oci_client::Client>,
    github: Option<GitHubReleases>,
    registry_throttle: Throttle,
    github_throttle: Throttle,
    cache: Arc<Mutex<C>>,
}

impl<C: Cache> Lookups<C> {
    fn new(settings: Settings, cache: Arc<Mutex<C>>) -> Result<Lookups<C>> {
        let registry = settings
            .lookup_enabled(LookupKind::Registry)
            .then(|| oci_client::Client::new(ClientConfig::default()));
        let github = if settings.lookup_enabled(LookupKind::GitHub) {
            Some(GitHubReleases::new(
                settings.request_timeout,
                settings.github_token.clone(),
            )?)
        } else {
            None
        };
        Ok(Lookups {
            registry_throttle: Throttle::new(settings.request_delay, settings.request_timeout),
            github_throttle: Throttle::new(settings.request_delay, settings.request_timeout),
            settings,
            registry,
            github,
            cache,
        })
    }

    fn cache_get(&self, key: &CacheKey) -> Option<String> {
        self.cache.lock().ok()?.get(key)
    }

    fn cache_put(&self, key: &CacheKey, value: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, value);
        }
    }

    async fn cached<F>(&self, key: CacheKey, fetch: F) -> Option<String>
    where
        F: Future<Output = Result<Option<String>>>,
    {
        if let Some(version) = self.cache_get(&key) {
            debug!("Cached {key}: {version}");
            return Some(version);
        }
        let version = fetch
            .await
            .map_err(|e| e.context(format!("Lookup of {key} failed")))
            .log_error()
            .flatten()?;
        debug!("Found {key}: {version}");
        self.cache_put(&key, &version);
        Some(version)
    }

    async fn candidate(&self, template: &str, reference: &ImageReference) -> Option<String> {
        let overrides = self.settings.find_override(template);
        let filter = TagFilter::new(
            overrides.and_then(|o| o.version_regex.as_deref()),
            overrides.and_then(|o| o.version_req.as_deref()),
        )
        .map_err(|e| e.context(format!("{template}: invalid version filter")))
        .log_error()?;

        let mut candidates = Vec::new();
        if let Some(client) = &self.registry {
            let key = CacheKey::registry(reference, &filter);
            let fetch = reference.latest_image_version(client, &self.registry_throttle, &filter);
            candidates.extend(self.cached(key, fetch).await);
        }
        if let Some(github) = &self.github {
            let repository = match overrides.and_then(|o| o.github.as_deref()) {
                Some(repository) => repository
                    .parse::<GitHubRepository>()
                    .map_err(|e| e.context(format!("{template}: invalid github override")))
                    .log_error(),
                None => GitHubRepository::infer(reference),
            };
            if let Some(repository) = repository {
                let key = CacheKey::github(&repository, &filter);
                let fetch = self
                    .github_throttle
                    .request(github.latest_version(&repository, &filter));
                let release = self.cached(key, fetch).await;
                candidates.extend(release.map(|r| match_prefix(&reference.tag, &r)));
            }
        }
        candidates.into_iter().max_by(|a, b| compare_versions(a, b))
    }
}

pub struct Update<C> {
    concurrency: usize,
    settings: Settings,
    lookups: Arc<Lookups<C>>,
}

impl<C: Cache + Send + 'static> Update<C> {
    pub fn new(settings: Settings, cache: Arc<Mutex<C>>) -> Result<Update<C>> {
        let lookups = Lookups::new(settings.clone(), cache)?;
        Ok(Update {
            concurrency: settings.concurrency.max(1),
            settings,
            lookups: Arc::new(lookups),
        })
    }

    /// Checks the primary services of all `templates`. Reports come back in
    /// template order; a failing lookup only affects its own service.
    pub async fn check_all(&self, templates: Vec<Template>) -> Vec<ServiceReport> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut index = 0;
        for template in templates {
            let template = Arc::new(template);
            for service in plan(&template, &self.settings) {
                let template = template.clone();
                let lookups = self.lookups.clone();
                let semaphore = semaphore.clone();
                let i = index;
                index += 1;
                tasks.spawn(async move {
                    let candidate = match service.reference() {
                        Some(reference) => {
                            let _permit = semaphore.acquire_owned().await.ok();
                            info!("Checking {} ({})", template.name, reference);
                            lookups.candidate(&template.name, reference).await
                        }
                        None => None,
                    };
                    (i, ServiceReport::new(&template, &service, candidate.as_deref()))
                });
            }
        }

        let mut reports = Vec::with_capacity(index);
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(report) => reports.push(report),
                Err(e) => error!("Check failed: {e}"),
            }
        }
        reports.sort_by_key(|(i, _)| *i);
        reports.into_iter().map(|(_, report)| report).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::{FileCache, tests::FakeClock},
        settings::Override,
    };
    use anyhow::anyhow;
    use detect::UpdateVerdict;
    use std::{path::Path, time::Duration};

    const WORDPRESS: &str = r#"
captainVersion: 4
services:
    $$cap_appname:
        image: wordpress:$$cap_v
    $$cap_appname-db:
        image: mysql:$$cap_db_version
caproverOneClickApp:
    variables:
        - id: $$cap_v
          defaultValue: 6.7.0
"#;

    fn settings() -> Settings {
        let mut settings = Settings::read("does-not-exist.yaml").unwrap();
        settings.lookups = Vec::new();
        settings
    }

    fn template(name: &str, content: &str) -> Template {
        Template::parse(Path::new(&format!("{name}.yml")), content).unwrap()
    }

    #[test]
    fn end_to_end_patch_update() {
        let template = template("wordpress", WORDPRESS);
        let services = plan(&template, &settings());
        assert_eq!(services.len(), 1);
        let service = &services[0];
        let reference = service.reference().unwrap();

        let verdict = detect(&reference.tag, Some("6.7.1"));
        assert_eq!(
            verdict,
            Some(UpdateVerdict {
                current_version: "6.7.0".to_string(),
                candidate_version: "6.7.1".to_string(),
                has_update: true,
                update_type: Some(UpdateType::Patch),
            })
        );

        let report = ServiceReport::new(&template, service, Some("6.7.1"));
        assert_eq!(report.status, Status::UpdateAvailable);
        assert_eq!(report.current_version.as_deref(), Some("6.7.0"));
        assert_eq!(report.latest_version.as_deref(), Some("6.7.1"));
        assert_eq!(report.update_type, Some(UpdateType::Patch));
        assert_eq!(report.file, PathBuf::from("wordpress.yml"));
    }

    #[test]
    fn report_statuses() {
        let template = template("wordpress", WORDPRESS);
        let service = &plan(&template, &settings())[0];

        let report = ServiceReport::new(&template, service, None);
        assert_eq!(report.status, Status::NoCandidate);
        assert_eq!(report.latest_version, None);
        assert!(!report.has_update);

        let report = ServiceReport::new(&template, service, Some("6.7.0"));
        assert_eq!(report.status, Status::UpToDate);
        assert_eq!(report.latest_version.as_deref(), Some("6.7.0"));
        assert_eq!(report.update_type, None);
    }

    #[test]
    fn unresolved_and_invalid_services() {
        let template = template(
            "ghost",
            "services:\n  $$cap_appname:\n    image: ghost:$$cap_ghost_version\n",
        );
        let service = &plan(&template, &settings())[0];
        let report = ServiceReport::new(&template, service, Some("5.0.0"));
        assert_eq!(report.status, Status::Unresolved);
        assert_eq!(report.current_version, None);
        assert!(!report.has_update);

        let template = template_with_image("redis", "redis");
        let service = &plan(&template, &settings())[0];
        let report = ServiceReport::new(&template, service, Some("7.0"));
        assert_eq!(report.status, Status::InvalidReference);
        assert!(report.reason.is_some());
    }

    fn template_with_image(name: &str, image: &str) -> Template {
        template(name, &format!("services:\n  $$cap_appname:\n    image: {image}\n"))
    }

    #[test]
    fn ignored_services_are_not_planned() {
        let mut settings = settings();
        settings.ignore.push(crate::settings::Ignore {
            template: "wordpress".to_string(),
            service: None,
        });
        assert!(plan(&template("wordpress", WORDPRESS), &settings).is_empty());
    }

    #[tokio::test]
    async fn check_all_without_lookups() {
        let cache = FileCache::in_memory(Duration::from_secs(60), FakeClock::at(0));
        let update = Update::new(settings(), Arc::new(Mutex::new(cache))).unwrap();
        let reports = update
            .check_all(vec![
                template("wordpress", WORDPRESS),
                template_with_image("nginx", "nginx:1.27"),
                template_with_image("broken", "broken"),
            ])
            .await;
        let summary = reports
            .iter()
            .map(|r| (r.template.as_str(), r.status))
            .collect::<Vec<_>>();
        assert_eq!(
            summary,
            vec![
                ("wordpress", Status::NoCandidate),
                ("nginx", Status::NoCandidate),
                ("broken", Status::InvalidReference),
            ]
        );
    }

    type TestCache = FileCache<FakeClock>;

    fn lookups(kinds: &[LookupKind], overrides: Vec<Override>) -> Lookups<TestCache> {
        let mut settings = settings();
        settings.lookups = kinds.to_vec();
        settings.overrides = overrides;
        let cache = FileCache::in_memory(Duration::from_secs(60), FakeClock::at(0));
        Lookups::new(settings, Arc::new(Mutex::new(cache))).unwrap()
    }

    fn filter(version_req: Option<&str>) -> TagFilter {
        TagFilter::new(None, version_req).unwrap()
    }

    fn github(reference: &ImageReference) -> CacheKey {
        CacheKey::github(&GitHubRepository::infer(reference).unwrap(), &filter(None))
    }

    #[tokio::test]
    async fn version_requirement_survives_cached_lookups() {
        let pg15 = Override {
            template: "pg15".to_string(),
            version_req: Some("^15".to_string()),
            ..Override::default()
        };
        let lookups = lookups(&[LookupKind::Registry], vec![pg15]);
        let reference = ImageReference::parse("postgres:15.1").unwrap();
        lookups.cache_put(&CacheKey::registry(&reference, &filter(None)), "17.0");

        assert_eq!(lookups.candidate("postgres", &reference).await.as_deref(), Some("17.0"));

        lookups.cache_put(&CacheKey::registry(&reference, &filter(Some("^15"))), "15.8");
        assert_eq!(lookups.candidate("pg15", &reference).await.as_deref(), Some("15.8"));
        assert_eq!(lookups.candidate("postgres", &reference).await.as_deref(), Some("17.0"));
    }

    #[tokio::test]
    async fn greatest_candidate_wins() {
        let lookups = lookups(&[LookupKind::Registry, LookupKind::GitHub], Vec::new());
        let reference = ImageReference::parse("ghcr.io/owner/app:1.0.0").unwrap();
        lookups.cache_put(&CacheKey::registry(&reference, &filter(None)), "1.1.0");
        lookups.cache_put(&github(&reference), "v1.2.0");
        assert_eq!(lookups.candidate("app", &reference).await.as_deref(), Some("1.2.0"));

        lookups.cache_put(&CacheKey::registry(&reference, &filter(None)), "1.3.0");
        assert_eq!(lookups.candidate("app", &reference).await.as_deref(), Some("1.3.0"));
    }

    #[tokio::test]
    async fn github_release_follows_current_prefix() {
        let lookups = lookups(&[LookupKind::GitHub], Vec::new());
        let reference = ImageReference::parse("ghcr.io/owner/app:v1.0.0").unwrap();
        lookups.cache_put(&github(&reference), "1.2.0");
        assert_eq!(lookups.candidate("app", &reference).await.as_deref(), Some("v1.2.0"));
    }

    #[tokio::test]
    async fn failed_lookups_have_no_candidate() {
        let lookups = lookups(&[], Vec::new());
        let reference = ImageReference::parse("ghcr.io/owner/app:1.0.0").unwrap();
        let key = github(&reference);

        let failed = async { Err(anyhow!("503 Service Unavailable")) };
        assert_eq!(lookups.cached(key.clone(), failed).await, None);
        let empty = lookups.cached(key.clone(), async { Ok(None) });
        assert_eq!(empty.await, None);
        assert_eq!(lookups.cache_get(&key), None);

        let found = lookups.cached(key.clone(), async { Ok(Some("1.1.0".to_string())) });
        assert_eq!(found.await.as_deref(), Some("1.1.0"));
        assert_eq!(lookups.cache_get(&key).as_deref(), Some("1.1.0"));
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_lookups_have_no_candidate() {
        let lookups = lookups(&[], Vec::new());
        let reference = ImageReference::parse("ghcr.io/owner/app:1.0.0").unwrap();
        let slow = lookups.github_throttle.request(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Some("9.9.9".to_string()))
        });
        assert_eq!(lookups.cached(github(&reference), slow).await, None);
    }
}
