//! Contains the definition of [`TargetRegistry`], the per-project index that
//! reconciles target names and target ids into a single set of [`Target`]
//! nodes.
//!
//! The log streams target events out of order: a target can be mentioned by
//! its name long before its id shows up, or the other way around. The registry
//! keeps two indices over the same [`Target`] instances:
//!
//! - the name index, the source of truth for name-based identity, compared
//!   case-insensitively.
//! - the id index, a memoization layer filled as ids become known. Entries are
//!   only ever added or repointed to a newer node, never removed.
//!
//! Neither index owns the set of targets: a fork takes over the name slot and
//! a reused id repoints its id slot, so an older execution can drop out of
//! both. Every created target is therefore also appended to a creation list,
//! which is what [`TargetRegistry::targets`] and
//! [`TargetRegistry::unparented`] read.
//!
//! The two indices are synchronized differently. Creation by name only touches
//! the name index and relies on the shard lock taken by [`DashMap::entry`]
//! for its insert-if-absent, so concurrent first-creations of the same name
//! agree on a single winner. [`TargetRegistry::create_or_update`] reads the
//! name index, decides whether to fork, then writes both indices; that whole
//! sequence runs while holding the id index mutex. The fallback scan of
//! [`TargetRegistry::get_by_id`] takes the same mutex before writing its result
//! back. The mutex is always acquired before any name index lock. The creation
//! list has its own mutex, which is only ever taken last and never held while
//! acquiring another lock.

use std::{
    collections::HashMap,
    sync::Arc,
};

use dashmap::{mapref::entry::Entry, DashMap};
use log::{debug, trace};
use parking_lot::Mutex;

use crate::target::Target;


/// The error type returned by [`TargetRegistry::get_by_id()`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    thiserror::Error,
    displaydoc::Display,
)]
pub enum GetTargetError {
    /// no target with id {0} has been seen in this project
    NotFound(i32),
}

/// The case-folded form of a target name used as the name index key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct NameKey(String);

impl NameKey {
    fn new(name: &str) -> Self { Self(name.to_lowercase()) }
}

/// The target index of a single project.
///
/// See the [module level documentation](self) for the synchronization model.
#[derive(Debug, Default)]
pub struct TargetRegistry {
    targets_by_name: DashMap<NameKey, Arc<Target>>,
    targets_by_id: Mutex<HashMap<i32, Arc<Target>>>,
    created: Mutex<Vec<Arc<Target>>>,
}

impl TargetRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    fn create(&self, name: &str) -> Arc<Target> {
        let target = Arc::new(Target::new(name));
        self.created.lock().push(Arc::clone(&target));
        target
    }

    /// Gets the target with the given name, creating it with an unassigned id
    /// if no target with that name exists yet.
    ///
    /// Names are compared case-insensitively. When several threads race on a
    /// name that hasn't been seen, exactly one of them creates the target and
    /// all of them receive that instance.
    pub fn get_or_create_by_name(&self, name: &str) -> Arc<Target> {
        let entry =
            self.targets_by_name.entry(NameKey::new(name)).or_insert_with(
                || {
                    trace!("creating target `{name}` by name");
                    self.create(name)
                },
            );

        Arc::clone(entry.value())
    }

    /// Gets or creates the target with the given name and assigns it `id`.
    ///
    /// If a target with the same name exists but already carries a different
    /// assigned id, the name is being reused by another execution of the
    /// target: a new [`Target`] is created and takes over the name index slot.
    /// The previous instance stays reachable through its own id, unless that
    /// id already resolves to another node.
    ///
    /// [`Target::UNASSIGNED_ID`] is never recorded in the id index.
    pub fn create_or_update(&self, name: &str, id: i32) -> Arc<Target> {
        let mut targets_by_id = self.targets_by_id.lock();

        let target = match self.targets_by_name.entry(NameKey::new(name)) {
            Entry::Occupied(mut entry) => {
                match entry.get().confirmed_id() {
                    Some(existing) if existing != id => {
                        debug!(
                            "target `{name}` reappeared with id {id} \
                             (previously {existing}), creating a new instance"
                        );

                        // the displaced instance may have got its id through
                        // `Target::set_id` and never been indexed
                        targets_by_id
                            .entry(existing)
                            .or_insert_with(|| Arc::clone(entry.get()));

                        let target = self.create(name);
                        entry.insert(Arc::clone(&target));
                        target
                    }
                    _ => Arc::clone(entry.get()),
                }
            }
            Entry::Vacant(entry) => {
                trace!("creating target `{name}` with id {id}");

                let target = self.create(name);
                entry.insert(Arc::clone(&target));
                target
            }
        };

        target.set_id(id);

        if id != Target::UNASSIGNED_ID {
            targets_by_id.insert(id, Arc::clone(&target));
        }

        target
    }

    /// Gets the target with the given id.
    ///
    /// The id index is consulted first. On a miss the name index is scanned
    /// for a target whose assigned id is `id`; a hit is written back to the id
    /// index so the next lookup doesn't scan.
    ///
    /// # Errors
    ///
    /// Returns [`GetTargetError::NotFound`] if no target carries the id.
    pub fn get_by_id(&self, id: i32) -> Result<Arc<Target>, GetTargetError> {
        let mut targets_by_id = self.targets_by_id.lock();

        if let Some(target) = targets_by_id.get(&id) {
            return Ok(Arc::clone(target));
        }

        let target = self
            .targets_by_name
            .iter()
            .find(|x| x.value().confirmed_id() == Some(id))
            .map(|x| Arc::clone(x.value()))
            .ok_or(GetTargetError::NotFound(id))?;

        trace!("backfilling id {id} for target `{}`", target.name());
        targets_by_id.insert(id, Arc::clone(&target));

        Ok(target)
    }

    /// Looks a target up by name, or by id if `name` is empty.
    ///
    /// A non-empty name takes precedence: the id is ignored and there is no
    /// fallback to the id index.
    ///
    /// # Returns
    ///
    /// Returns `None` if no matching target has been seen yet.
    #[must_use]
    pub fn get(&self, name: &str, id: i32) -> Option<Arc<Target>> {
        if name.is_empty() {
            return self.get_by_id(id).ok();
        }

        self.targets_by_name
            .get(&NameKey::new(name))
            .map(|x| Arc::clone(x.value()))
    }

    /// Returns `true` if `id` is currently served by the id index without a
    /// fallback scan.
    #[must_use]
    pub fn is_id_indexed(&self, id: i32) -> bool {
        self.targets_by_id.lock().contains_key(&id)
    }

    /// Returns every target ever created by this registry, including the
    /// instances a fork displaced from the name index.
    ///
    /// The targets are ordered by their creation.
    #[must_use]
    pub fn targets(&self) -> Vec<Arc<Target>> {
        let mut targets = self.created.lock().clone();

        // racing creations of different names may push out of node id order
        targets.sort_by_key(|x| x.node_id());

        targets
    }

    /// Returns the targets that haven't been attached to any node, ordered by
    /// start time.
    ///
    /// Targets without a start time come first; targets with equal start
    /// times are ordered by their creation.
    #[must_use]
    pub fn unparented(&self) -> Vec<Arc<Target>> {
        let mut targets = self.targets();

        targets.retain(|x| x.is_rootless());
        targets.sort_by_key(|x| x.start_time());

        targets
    }

    /// Returns the number of distinct names in the name index.
    #[must_use]
    pub fn name_count(&self) -> usize { self.targets_by_name.len() }
}
