use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::model::TagGroup;

/// One group of the index: its name and tags in stored order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedGroup {
  pub name: String,
  pub tags: Vec<String>,
}

/// Tag groups of one gallery, in the order the store returned them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagIndex {
  groups: Vec<IndexedGroup>,
}

impl TagIndex {
  pub fn from_groups(groups: &[TagGroup]) -> Self {
    Self { groups: groups.iter().map(|g| IndexedGroup { name: g.name.clone(), tags: g.tags.clone() }).collect() }
  }

  pub fn groups(&self) -> &[IndexedGroup] {
    &self.groups
  }

  #[cfg(test)]
  pub fn get(&self, name: &str) -> Option<&IndexedGroup> {
    self.groups.iter().find(|g| g.name == name)
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    self.groups.len()
  }

  #[cfg(test)]
  pub fn is_empty(&self) -> bool {
    self.groups.is_empty()
  }
}

/// The user's in-progress tag filter: group name -> selected tag names.
///
/// A group is present only while it has at least one selected tag, so the
/// serialized form never carries empty arrays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActiveTags(BTreeMap<String, BTreeSet<String>>);

impl ActiveTags {
  pub fn new() -> Self {
    Self::default()
  }

  /// Select `tag` in `group`, or deselect it if already selected.
  pub fn toggle(&mut self, group: &str, tag: &str) {
    match self.0.get_mut(group) {
      Some(selected) if selected.contains(tag) => {
        selected.remove(tag);
        if selected.is_empty() {
          self.0.remove(group);
        }
      }
      Some(selected) => {
        selected.insert(tag.to_string());
      }
      None => {
        self.0.insert(group.to_string(), BTreeSet::from([tag.to_string()]));
      }
    }
  }

  pub fn is_active(&self, group: &str, tag: &str) -> bool {
    self.0.get(group).is_some_and(|s| s.contains(tag))
  }

  pub fn selected(&self, group: &str) -> Option<&BTreeSet<String>> {
    self.0.get(group)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
    self.0.iter()
  }

  /// Total number of selected tags across all groups.
  pub fn count(&self) -> usize {
    self.0.values().map(BTreeSet::len).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn clear(&mut self) {
    self.0.clear();
  }

  /// Drop empty groups that may arrive from a hand-edited link.
  pub fn pruned(mut self) -> Self {
    self.0.retain(|_, tags| !tags.is_empty());
    self
  }
}
