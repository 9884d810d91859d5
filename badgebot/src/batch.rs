// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Batch driver turning a list of app records into per-record statuses.
//!
//! A batch runs in two phases. The survey resolves every record to a
//! repository and checks its README for the badge without mutating anything.
//! The fork phase then orchestrates the records still missing the badge,
//! but only after the [`ConfirmationGate`] approves. Errors never escape a
//! record: they become [`ProcessingStatus::Failed`] entries and the batch moves
//! on.
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    cache::{RepositoryCache, RepositoryHandle},
    coords::{CoordinateParser, RepoCoordinate},
    error::Error,
    host::RepositoryHost,
    input::{AppRecord, Selection},
    inspector::inspect,
    orchestrator::{OrchestrationRequest, Orchestrator},
    process::CommandRunner,
    status::ProcessingStatus,
};

/// Operator controls for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,)]
pub struct RunOptions
{
    /// Log every record's resolution at info level.
    pub auto_expand:        bool,
    /// Start the fork phase without asking the confirmation gate.
    pub auto_process:       bool,
    /// Attach README text to surveyed entries.
    pub show_readmes:       bool,
    /// Open pull requests after committing to forks.
    pub send_pull_requests: bool,
    /// Clone every fork into the local forks directory.
    pub clone_forks:        bool,
    /// Range of the records missing the badge to fork; all of them when
    /// `None`.
    pub fork_selection:     Option<Selection,>,
}

/// Approves the mutating phase of a batch.
pub trait ConfirmationGate
{
    /// Returns `true` to proceed with the action described by `prompt`.
    fn confirm(&self, prompt: &str,) -> bool;
}

/// Gate returning a fixed answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq,)]
pub struct FixedAnswer(pub bool,);

impl ConfirmationGate for FixedAnswer
{
    fn confirm(&self, prompt: &str,) -> bool
    {
        debug!("{} -> {}", prompt, self.0);
        self.0
    }
}

/// Result of processing one record.
#[derive(Debug, Clone, PartialEq, Serialize,)]
pub struct BatchEntry
{
    /// Position of the record in the input.
    pub index:           usize,
    /// Input row this entry reports on.
    pub record:          AppRecord,
    /// Coordinate parsed from the record URL, if any.
    pub coordinate:      Option<RepoCoordinate,>,
    /// Branch named by the URL or, when absent, the default branch.
    pub resolved_branch: Option<String,>,
    /// Whether the README carried the badge during the survey.
    pub has_badge:       bool,
    /// README text, attached when `show_readmes` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readme:          Option<String,>,
    /// Append-only status history; the last element is the final status.
    pub statuses:        Vec<ProcessingStatus,>,
    #[serde(skip)]
    handle:              Option<RepositoryHandle,>,
}

impl BatchEntry
{
    fn new(index: usize, record: AppRecord,) -> Self
    {
        Self {
            index,
            record,
            coordinate: None,
            resolved_branch: None,
            has_badge: false,
            readme: None,
            statuses: Vec::new(),
            handle: None,
        }
    }

    /// Returns the latest recorded status.
    pub fn final_status(&self,) -> Option<&ProcessingStatus,>
    {
        self.statuses.last()
    }

    fn push(&mut self, status: ProcessingStatus,)
    {
        self.statuses.push(status,);
    }
}

/// Statuses of a whole batch, one entry per input record in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize,)]
pub struct BatchReport
{
    /// One entry per input record, in input order.
    pub entries:   Vec<BatchEntry,>,
    /// Indices of the records selected for the fork phase.
    pub pending:   Vec<usize,>,
    /// Whether the fork phase ran.
    pub confirmed: bool,
}

/// Drives surveys and fork phases over a shared cache.
#[derive(Debug,)]
pub struct BatchDriver<H, R,>
{
    cache:        RepositoryCache<H,>,
    parser:       CoordinateParser,
    orchestrator: Orchestrator,
    runner:       R,
    options:      RunOptions,
}

fn progress_bar(len: usize,) -> ProgressBar
{
    let bar = ProgressBar::new(len as u64,);
    match ProgressStyle::with_template("{spinner:.yellow} [{elapsed_precise}] {bar:30} {pos}/{len} {msg}",) {
        Ok(style,) => bar.set_style(style,),
        Err(e,) => debug!("progress template rejected: {}", e),
    }
    bar
}

impl<H: RepositoryHost, R: CommandRunner,> BatchDriver<H, R,>
{
    pub fn new(
        cache: RepositoryCache<H,>,
        parser: CoordinateParser,
        orchestrator: Orchestrator,
        runner: R,
        options: RunOptions,
    ) -> Self
    {
        Self {
            cache,
            parser,
            orchestrator,
            runner,
            options,
        }
    }

    pub fn cache(&self,) -> &RepositoryCache<H,>
    {
        &self.cache
    }

    pub fn options(&self,) -> RunOptions
    {
        self.options
    }

    /// Resolves every candidate and checks it for the badge.
    ///
    /// Makes no mutating call. The report holds one entry per candidate in
    /// input order.
    pub async fn survey(&mut self, candidates: &[AppRecord],) -> BatchReport
    {
        let bar = progress_bar(candidates.len(),);
        let mut entries = Vec::with_capacity(candidates.len(),);

        for (index, record,) in candidates.iter().enumerate() {
            let label = record.url().unwrap_or("<no url>",).to_owned();
            bar.set_message(label.clone(),);

            let entry = self.survey_one(index, record.clone(),).await;
            if let Some(status,) = entry.final_status() {
                if self.options.auto_expand {
                    bar.suspend(|| info!("[{}] {}: {}", index, label, status),);
                } else {
                    debug!("[{}] {}: {}", index, label, status);
                }
            }
            entries.push(entry,);
            bar.inc(1,);
        }

        bar.finish_with_message(format!("Surveyed {} apps", candidates.len()),);
        BatchReport {
            entries,
            ..BatchReport::default()
        }
    }

    async fn survey_one(&mut self, index: usize, record: AppRecord,) -> BatchEntry
    {
        let mut entry = BatchEntry::new(index, record,);
        let Some(url,) = entry.record.url().map(str::to_owned,) else {
            entry.push(ProcessingStatus::NoUrl,);
            return entry;
        };

        let status = match self.resolve(&url, &mut entry,).await {
            Ok(status,) => status,
            Err(error,) => {
                warn!("Failed to survey {}: {}", url, error);
                ProcessingStatus::failed(&error,)
            }
        };
        entry.push(status,);
        entry
    }

    async fn resolve(&mut self, url: &str, entry: &mut BatchEntry,) -> Result<ProcessingStatus, Error,>
    {
        let coordinate = match self.parser.parse(url,) {
            Ok(Some(coordinate,),) => coordinate,
            Ok(None,) => {
                return Ok(ProcessingStatus::UnparsableUrl {
                    reason: format!("{url} matches no known URL prefix"),
                },);
            }
            Err(error @ Error::UrlParse {
                ..
            },) => {
                return Ok(ProcessingStatus::UnparsableUrl {
                    reason: error.to_string(),
                },);
            }
            Err(error,) => return Err(error,),
        };
        entry.coordinate = Some(coordinate.clone(),);

        let handle = match self.cache.get_repository(&coordinate,).await {
            Ok(Some(handle,),) => handle,
            Ok(None,) => return Ok(ProcessingStatus::RepoNotFound,),
            Err(Error::RepoHasNoBranches {
                ..
            },) => return Ok(ProcessingStatus::RepoHasNoBranches,),
            Err(error,) => return Err(error,),
        };
        entry.resolved_branch = Some(coordinate.resolved_branch(&handle.default_branch,).to_owned(),);
        entry.handle = Some(handle.clone(),);

        if handle.is_fork {
            return Ok(ProcessingStatus::IsForkOfAnother,);
        }

        let inspection = inspect(&mut self.cache, &handle, self.orchestrator.badge(),).await?;
        let Some(readme,) = inspection.readme else {
            return Ok(ProcessingStatus::NoReadme,);
        };
        if self.options.show_readmes {
            entry.readme = Some(readme.text,);
        }

        entry.has_badge = inspection.has_badge;
        Ok(if inspection.has_badge { ProcessingStatus::HasBadge } else { ProcessingStatus::NoBadge },)
    }

    /// Surveys `candidates`, then forks the ones missing the badge once
    /// `gate` approves (or right away with `auto_process`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptySelection`] when `fork_selection` selects none
    /// of the records missing the badge; nothing has been mutated then.
    /// Per-record failures never surface here.
    pub async fn run_batch<G: ConfirmationGate,>(
        &mut self,
        candidates: &[AppRecord],
        gate: &G,
    ) -> Result<BatchReport, Error,>
    {
        let mut report = self.survey(candidates,).await;

        let missing: Vec<usize,> = report
            .entries
            .iter()
            .filter(|entry| entry.final_status() == Some(&ProcessingStatus::NoBadge),)
            .map(|entry| entry.index,)
            .collect();
        report.pending = match self.options.fork_selection {
            Some(selection,) => selection.apply(&missing,)?.to_vec(),
            None => missing,
        };

        if report.pending.is_empty() {
            info!("No apps need a badge");
            return Ok(report,);
        }

        let prompt = format!("Fork {} apps and add the badge?", report.pending.len());
        report.confirmed = self.options.auto_process || gate.confirm(&prompt,);
        if !report.confirmed {
            info!("Fork phase declined; no repository was modified");
            return Ok(report,);
        }

        let bar = progress_bar(report.pending.len(),);
        for index in report.pending.clone() {
            let entry = &mut report.entries[index];
            bar.set_message(entry.record.url().unwrap_or_default().to_owned(),);
            self.fork_one(entry,).await;
            bar.inc(1,);
        }
        bar.finish_with_message(format!("Processed {} forks", report.pending.len()),);

        Ok(report,)
    }

    async fn fork_one(&mut self, entry: &mut BatchEntry,)
    {
        let (Some(coordinate,), Some(handle,), Some(url,),) =
            (entry.coordinate.clone(), entry.handle.clone(), entry.record.url().map(str::to_owned,),)
        else {
            return;
        };

        let request = OrchestrationRequest {
            coordinate:         &coordinate,
            app_url:            &url,
            original:           &handle,
            original_has_badge: entry.has_badge,
            send_pull_request:  self.options.send_pull_requests,
            clone_fork:         self.options.clone_forks,
        };

        match self.orchestrator.process(&mut self.cache, &self.runner, request,).await {
            Ok(statuses,) => {
                for status in &statuses {
                    info!("[{}] {}: {}", entry.index, coordinate, status);
                }
                entry.statuses.extend(statuses,);
            }
            Err(error,) => {
                warn!("Failed to process {}: {}", coordinate, error);
                entry.push(ProcessingStatus::failed(&error,),);
            }
        }
    }
}
