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


mod apply;
mod cache;
mod log;
mod report;
mod settings;
mod template;
mod update;

use std::{
    fs,
    io::stdout,
    path::PathBuf,
    process::ExitCode,
    sync::{Arc, Mutex},
};

use ::log::info;
use anyhow::{Context, Result};
use cache::{FileCache, SystemClock};
use clap::{ArgAction, CommandFactory, Parser};
use clap_complete::Shell;
use log::LogError;
use report::Format;
use settings::Settings;
use template::Template;
use time::OffsetDateTime;
use update::Update;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Only check these templates (file names without extension)
    templates: Vec<String>,
    #[arg(short, long, env = "TTR_CONFIG", default_value = "config.yaml")]
    config: String,
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    format: Format,
    /// Write the report to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Write newer versions back into the template files
    #[arg(long)]
    apply: bool,
    /// Only log what --apply would change
    #[arg(long, requires = "apply")]
    dry_run: bool,
    /// Ignore cached lookup results
    #[arg(long)]
    no_cache: bool,
    /// Exit with status 1 if any update is available
    #[arg(long)]
    fail_on_update: bool,
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    /// Print shell completions and exit
    #[arg(long, value_name = "SHELL")]
    completions: Option<Shell>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    if let Some(shell) = cli.completions {
        clap_complete::generate(shell, &mut Cli::command(), env!("CARGO_PKG_NAME"), &mut stdout());
        return Ok(ExitCode::SUCCESS);
    }
    log::init(cli.quiet, cli.verbose)?;
    let settings = Settings::read(&cli.config)?;

    let templates = template::scan(&settings.templates_dir, &cli.templates)?
        .iter()
        .filter_map(|path| Template::read(path).log_error())
        .collect::<Vec<_>>();
    info!("Loaded {} templates", templates.len());

    let mut cache = if settings.cache_ttl.is_zero() {
        FileCache::in_memory(settings.cache_ttl, SystemClock)
    } else {
        FileCache::open(&settings.cache_file, settings.cache_ttl)
    };
    if cli.no_cache {
        cache = cache.bypass_reads();
    }
    let cache = Arc::new(Mutex::new(cache));
    let update = Update::new(settings, cache.clone())?;
    let reports = update.check_all(templates).await;
    if let Ok(mut cache) = cache.lock() {
        cache.save().log_error();
    }

    let rendered = report::render(cli.format, &reports, OffsetDateTime::now_utc())?;
    match &cli.output {
        Some(path) => fs::write(path, rendered)
            .with_context(|| format!("Cannot write {}", path.display()))?,
        None => print!("{rendered}"),
    }

    if cli.apply {
        for report in reports.iter().filter(|r| r.has_update) {
            apply::apply_update(report, cli.dry_run).log_error();
        }
    }

    let has_updates = reports.iter().any(|r| r.has_update);
    info!("Finished");
    if cli.fail_on_update && has_updates {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

#[cfg(test)]
mod tests {
    use crate::Cli;
    use clap::{CommandFactory, Parser};

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_arguments() {
        let cli = Cli::try_parse_from([
            "template-tag-radar",
            "--format",
            "markdown",
            "--apply",
            "--dry-run",
            "-vv",
            "wordpress",
            "ghost",
        ])
        .unwrap();
        assert_eq!(cli.templates, vec!["wordpress", "ghost"]);
        assert_eq!(cli.format, crate::report::Format::Markdown);
        assert!(cli.apply && cli.dry_run);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn dry_run_requires_apply() {
        assert!(Cli::try_parse_from(["template-tag-radar", "--dry-run"]).is_err());
    }
}
