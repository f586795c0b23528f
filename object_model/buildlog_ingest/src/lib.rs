//! Applies already-decoded target events of a build log to [`Project`] nodes.
//!
//! The events of a project arrive in log order, which isn't the order in which
//! the information about a target becomes complete. The [`Ingestor`] resolves
//! every event to a [`Target`] through the project's
//! [`buildlog_project::TargetRegistry`], places the target in the tree as soon
//! as its parent is known and, once the stream ends, attaches the targets
//! whose parent never showed up.

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use buildlog_project::{GetTargetError, Project, Target};
use buildlog_tree::Container;
use derive_new::new;
use log::{debug, trace, warn};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};

const fn unassigned_id() -> i32 { Target::UNASSIGNED_ID }

/// A target event of a single project.
///
/// Timestamps are milliseconds since the unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Event {
    /// A target began executing.
    TargetStarted {
        /// The name of the target.
        name: String,

        /// The id of the target, [`Target::UNASSIGNED_ID`] if the log doesn't
        /// carry one.
        #[serde(default = "unassigned_id")]
        id: i32,

        /// The name of the target that caused this one to run.
        #[serde(default)]
        parent_target: Option<String>,

        /// When the target started.
        timestamp: u64,
    },

    /// A target finished executing.
    TargetFinished {
        /// The name of the target, empty if the log only identifies the
        /// target by id.
        #[serde(default)]
        name: String,

        /// The id of the target.
        #[serde(default = "unassigned_id")]
        id: i32,

        /// Whether the target succeeded.
        succeeded: bool,

        /// When the target finished.
        timestamp: u64,
    },

    /// A target was referenced but its execution was skipped.
    TargetSkipped {
        /// The name of the target.
        name: String,

        /// When the target was skipped.
        timestamp: u64,
    },
}

/// Options controlling how events are applied to a project.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(default)]
pub struct IngestOptions {
    /// Attach the targets that are still unparented to the project when the
    /// stream ends.
    pub recover_orphans: bool,

    /// Attach a started target under the target named as its parent instead
    /// of directly under the project.
    pub nest_under_parent_target: bool,

    /// Treat a finish event that matches no target as an error instead of
    /// skipping it.
    pub strict_finish: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            recover_orphans: true,
            nest_under_parent_target: true,
            strict_finish: false,
        }
    }
}

/// Counters describing what an [`Ingestor`] did with its stream.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
pub struct Summary {
    /// The number of events applied.
    pub events: usize,

    /// The number of target started events.
    pub targets_started: usize,

    /// The number of target skipped events.
    pub targets_skipped: usize,

    /// The number of finish events that matched no target.
    pub unmatched_finishes: usize,

    /// The number of targets attached by the orphan recovery.
    pub recovered_orphans: usize,
}

/// Errors that can occur while applying events with
/// [`IngestOptions::strict_finish`] enabled.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    thiserror::Error,
    displaydoc::Display,
)]
pub enum IngestError {
    /// finish event for target `{name}` (id {id}) matches no target
    UnmatchedFinish {
        /// The name carried by the event.
        name: String,

        /// The id carried by the event.
        id: i32,
    },

    /// {0}
    UnknownTarget(#[from] GetTargetError),
}

fn to_system_time(timestamp: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_millis(timestamp)
}

/// Applies the event stream of one project.
#[derive(Debug, new)]
#[allow(missing_copy_implementations)]
pub struct Ingestor<'a> {
    project: &'a Project,
    options: IngestOptions,

    #[new(default)]
    summary: Summary,
}

impl Ingestor<'_> {
    /// Applies a single event to the project.
    ///
    /// # Errors
    ///
    /// Only fails with [`IngestOptions::strict_finish`] enabled; see
    /// [`IngestError`].
    pub fn apply(&mut self, event: &Event) -> Result<(), IngestError> {
        self.summary.events += 1;

        match event {
            Event::TargetStarted { name, id, parent_target, timestamp } => {
                self.target_started(
                    name,
                    *id,
                    parent_target.as_deref(),
                    *timestamp,
                );
                Ok(())
            }
            Event::TargetFinished { name, id, succeeded, timestamp } => {
                self.target_finished(name, *id, *succeeded, *timestamp)
            }
            Event::TargetSkipped { name, timestamp } => {
                self.target_skipped(name, *timestamp);
                Ok(())
            }
        }
    }

    /// Ends the stream, running the orphan recovery if enabled.
    #[must_use]
    pub fn finish(mut self) -> Summary {
        if self.options.recover_orphans {
            self.summary.recovered_orphans = self.project.recover_orphans();
        }

        debug!("finished ingesting {}: {:?}", self.project, self.summary);

        self.summary
    }

    fn target_started(
        &mut self,
        name: &str,
        id: i32,
        parent_target: Option<&str>,
        timestamp: u64,
    ) {
        let targets = self.project.targets();

        let target = if id == Target::UNASSIGNED_ID {
            targets.get_or_create_by_name(name)
        } else {
            targets.create_or_update(name, id)
        };

        target.set_start_time(to_system_time(timestamp));
        self.summary.targets_started += 1;

        let parent_target = parent_target
            .filter(|x| self.options.nest_under_parent_target && !x.is_empty());

        let Some(parent_name) = parent_target else {
            self.project.try_add_target(&target);
            return;
        };

        let parent = targets.get_or_create_by_name(parent_name);

        if Arc::ptr_eq(&parent, &target) {
            self.project.try_add_target(&target);
        } else if let Err(error) = parent.add_child(Arc::clone(&target)) {
            trace!("not nesting `{name}` under `{parent_name}`: {error}");
        }
    }

    fn target_finished(
        &mut self,
        name: &str,
        id: i32,
        succeeded: bool,
        timestamp: u64,
    ) -> Result<(), IngestError> {
        let targets = self.project.targets();

        let found = if name.is_empty() && self.options.strict_finish {
            Some(targets.get_by_id(id)?)
        } else {
            targets.get(name, id)
        };

        let Some(target) = found else {
            if self.options.strict_finish {
                return Err(IngestError::UnmatchedFinish {
                    name: name.to_owned(),
                    id,
                });
            }

            warn!(
                "finish event for target `{name}` (id {id}) in {} matches no \
                 target",
                self.project
            );
            self.summary.unmatched_finishes += 1;

            return Ok(());
        };

        // the id of a target started without one is first revealed here
        if target.confirmed_id().is_none() && id != Target::UNASSIGNED_ID {
            target.set_id(id);
        }

        target.set_end_time(to_system_time(timestamp));
        target.set_succeeded(succeeded);

        Ok(())
    }

    fn target_skipped(&mut self, name: &str, timestamp: u64) {
        let target = self.project.targets().get_or_create_by_name(name);
        let time = to_system_time(timestamp);

        if target.start_time().is_none() {
            target.set_start_time(time);
        }
        if target.end_time().is_none() {
            target.set_end_time(time);
        }

        self.summary.targets_skipped += 1;
    }
}

/// Applies every event of `events` to `project` and ends the stream.
///
/// # Errors
///
/// See [`Ingestor::apply`].
pub fn ingest(
    project: &Project,
    events: &[Event],
    options: IngestOptions,
) -> Result<Summary, IngestError> {
    let mut ingestor = Ingestor::new(project, options);

    for event in events {
        ingestor.apply(event)?;
    }

    Ok(ingestor.finish())
}

/// Ingests the streams of several projects in parallel, one project per
/// worker.
///
/// The results are in the same order as `streams`.
#[must_use]
pub fn ingest_all(
    streams: &[(&Project, &[Event])],
    options: IngestOptions,
) -> Vec<Result<Summary, IngestError>> {
    streams
        .par_iter()
        .map(|(project, events)| ingest(project, events, options))
        .collect()
}
