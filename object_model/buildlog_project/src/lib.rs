//! Contains the definition of [`Project`], the node that owns every [`Target`]
//! executed for a single project file of a build.

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use buildlog_tree::{Children, Container, Node, TimedNode};
use derive_more::Deref;
use getset::Getters;
use log::debug;

pub mod registry;
pub mod target;

pub use registry::{GetTargetError, TargetRegistry};
pub use target::Target;

/// Represents a project node of the build log.
///
/// Dereferences to its [`TimedNode`] header.
#[derive(Debug, Deref, Getters)]
pub struct Project {
    #[deref]
    node: TimedNode,

    /// The full path to the project file, if the log reported one.
    #[get = "pub"]
    project_file: Option<PathBuf>,

    /// The targets executed within this project, keyed by name and by id.
    #[get = "pub"]
    targets: TargetRegistry,

    children: Children<Target>,
    low_relevance: AtomicBool,
    selected: AtomicBool,
}

impl Project {
    /// Creates a new project node without any target.
    #[must_use]
    pub fn new(name: impl Into<String>, project_file: Option<PathBuf>) -> Self {
        Self {
            node: TimedNode::new(name),
            project_file,
            targets: TargetRegistry::new(),
            children: Children::default(),
            low_relevance: AtomicBool::new(false),
            selected: AtomicBool::new(false),
        }
    }

    /// Returns the path of the source file this node was produced from, which
    /// is the project file.
    #[must_use]
    pub fn source_file_path(&self) -> Option<&Path> {
        self.project_file.as_deref()
    }

    /// Returns the lower-cased extension of the project file including the
    /// leading dot, such as `.csproj`.
    ///
    /// Returns an empty string if there's no project file or it has no
    /// extension.
    #[must_use]
    pub fn project_file_extension(&self) -> String {
        self.project_file
            .as_deref()
            .and_then(Path::extension)
            .map(|x| format!(".{}", x.to_string_lossy().to_lowercase()))
            .unwrap_or_default()
    }

    /// Returns `true` if the project should be de-emphasized.
    ///
    /// A selected project is never considered low relevance.
    #[must_use]
    pub fn is_low_relevance(&self) -> bool {
        self.low_relevance.load(Ordering::Acquire) && !self.is_selected()
    }

    /// Sets the low relevance flag.
    ///
    /// # Returns
    ///
    /// Returns `true` if the stored value changed.
    pub fn set_low_relevance(&self, low_relevance: bool) -> bool {
        self.low_relevance.swap(low_relevance, Ordering::AcqRel)
            != low_relevance
    }

    /// Returns `true` if the project is currently selected.
    #[must_use]
    pub fn is_selected(&self) -> bool { self.selected.load(Ordering::Acquire) }

    /// Sets the selection state of the project.
    pub fn set_selected(&self, selected: bool) {
        self.selected.store(selected, Ordering::Release);
    }

    /// Attaches `target` as a child of this project unless it already has a
    /// parent.
    ///
    /// # Returns
    ///
    /// Returns `true` if the target was attached by this call.
    pub fn try_add_target(&self, target: &Arc<Target>) -> bool {
        if !target.is_rootless() {
            return false;
        }

        // another thread may have attached it in between; losing that race is
        // the same as finding a parent above
        self.add_child(Arc::clone(target)).is_ok()
    }

    /// Returns the targets of this project that aren't attached anywhere,
    /// ordered by start time.
    #[must_use]
    pub fn unparented_targets(&self) -> Vec<Arc<Target>> {
        self.targets.unparented()
    }

    /// Attaches every unparented target to this project in start time order.
    ///
    /// Meant to run once the whole log of the project has been ingested, to
    /// place the targets whose parent never showed up.
    ///
    /// # Returns
    ///
    /// Returns the number of targets attached.
    pub fn recover_orphans(&self) -> usize {
        let mut attached = 0;

        for target in self.unparented_targets() {
            if self.try_add_target(&target) {
                debug!("attached orphan target `{}` to {self}", target.name());
                attached += 1;
            }
        }

        attached
    }
}

impl Node for Project {
    fn timed(&self) -> &TimedNode { &self.node }
}

impl Container for Project {
    type Child = Target;

    fn children(&self) -> &Children<Target> { &self.children }
}

impl std::fmt::Display for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Project Id={} Name={} File=",
            self.id().index(),
            self.name()
        )?;

        match &self.project_file {
            Some(file) => write!(f, "{}", file.display()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod test;
