//! In-memory record store.
//!
//! Backs offline use (`--seed gallery.json`) and the test suite. Records live in
//! insertion-ordered vectors behind `tokio::sync::RwLock`; listings sort the same
//! way the hosted backend does. State is lost when the process exits.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{GalleryFilter, RecordStore, StoreError, StoreResult};
use crate::model::{
  Gallery, NewGallery, NewTagGroup, NewVideo, Profile, TagGroup, TagGroupPatch, Video, VideoPatch,
};

/// Serialized contents of a store, as read from a seed file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Seed {
  #[serde(default)]
  pub galleries: Vec<Gallery>,
  #[serde(default)]
  pub videos: Vec<Video>,
  #[serde(default)]
  pub tag_groups: Vec<TagGroup>,
  #[serde(default)]
  pub profiles: Vec<Profile>,
}

impl Seed {
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    use anyhow::Context;
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read seed {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse seed {}", path.display()))
  }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
  data: Arc<RwLock<Seed>>,
}

fn new_id() -> String {
  Uuid::new_v4().to_string()
}

impl MemoryStore {
  #[cfg(test)]
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_seed(seed: Seed) -> Self {
    Self { data: Arc::new(RwLock::new(seed)) }
  }
}

#[async_trait]
impl RecordStore for MemoryStore {
  async fn list_videos(&self, gallery_id: &str) -> StoreResult<Vec<Video>> {
    let data = self.data.read().await;
    let mut videos: Vec<Video> = data.videos.iter().rev().filter(|v| v.gallery_id == gallery_id).cloned().collect();
    videos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(videos)
  }

  async fn get_video(&self, id: &str) -> StoreResult<Video> {
    let data = self.data.read().await;
    data.videos.iter().find(|v| v.id == id).cloned().ok_or_else(|| StoreError::NotFound(format!("video {id}")))
  }

  async fn insert_video(&self, video: NewVideo) -> StoreResult<Video> {
    let now = Utc::now();
    let record = Video {
      id: new_id(),
      gallery_id: video.gallery_id,
      title: video.title,
      description: video.description,
      youtube_id: video.youtube_id,
      tags: Some(video.tags),
      created_at: now,
      updated_at: now,
    };
    debug!(id = %record.id, gallery = %record.gallery_id, "memory: insert video");
    self.data.write().await.videos.push(record.clone());
    Ok(record)
  }

  async fn update_video(&self, id: &str, patch: VideoPatch) -> StoreResult<Video> {
    let mut data = self.data.write().await;
    let video = data.videos.iter_mut().find(|v| v.id == id).ok_or_else(|| StoreError::NotFound(format!("video {id}")))?;
    if let Some(title) = patch.title {
      video.title = title;
    }
    if let Some(description) = patch.description {
      video.description = Some(description);
    }
    if let Some(youtube_id) = patch.youtube_id {
      video.youtube_id = youtube_id;
    }
    if let Some(tags) = patch.tags {
      video.tags = Some(tags);
    }
    video.updated_at = Utc::now();
    Ok(video.clone())
  }

  async fn delete_video(&self, id: &str) -> StoreResult<()> {
    let mut data = self.data.write().await;
    let before = data.videos.len();
    data.videos.retain(|v| v.id != id);
    if data.videos.len() == before {
      return Err(StoreError::NotFound(format!("video {id}")));
    }
    Ok(())
  }

  async fn list_tag_groups(&self, gallery_id: &str) -> StoreResult<Vec<TagGroup>> {
    let data = self.data.read().await;
    let mut groups: Vec<TagGroup> = data.tag_groups.iter().filter(|g| g.gallery_id == gallery_id).cloned().collect();
    groups.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(groups)
  }

  async fn get_tag_group(&self, id: &str) -> StoreResult<TagGroup> {
    let data = self.data.read().await;
    data.tag_groups.iter().find(|g| g.id == id).cloned().ok_or_else(|| StoreError::NotFound(format!("tag group {id}")))
  }

  async fn insert_tag_group(&self, group: NewTagGroup) -> StoreResult<TagGroup> {
    let mut data = self.data.write().await;
    if data.tag_groups.iter().any(|g| g.gallery_id == group.gallery_id && g.name == group.name) {
      return Err(StoreError::Rejected {
        status: 409,
        message: format!("tag group '{}' already exists in this gallery", group.name),
      });
    }
    let now = Utc::now();
    let record = TagGroup {
      id: new_id(),
      gallery_id: group.gallery_id,
      name: group.name,
      tags: group.tags,
      created_at: now,
      updated_at: now,
    };
    data.tag_groups.push(record.clone());
    Ok(record)
  }

  async fn update_tag_group(&self, id: &str, patch: TagGroupPatch) -> StoreResult<TagGroup> {
    let mut data = self.data.write().await;
    let group =
      data.tag_groups.iter_mut().find(|g| g.id == id).ok_or_else(|| StoreError::NotFound(format!("tag group {id}")))?;
    if let Some(name) = patch.name {
      group.name = name;
    }
    if let Some(tags) = patch.tags {
      group.tags = tags;
    }
    group.updated_at = Utc::now();
    Ok(group.clone())
  }

  async fn delete_tag_group(&self, id: &str) -> StoreResult<()> {
    let mut data = self.data.write().await;
    let before = data.tag_groups.len();
    data.tag_groups.retain(|g| g.id != id);
    if data.tag_groups.len() == before {
      return Err(StoreError::NotFound(format!("tag group {id}")));
    }
    Ok(())
  }

  async fn get_gallery(&self, id: &str) -> StoreResult<Option<Gallery>> {
    Ok(self.data.read().await.galleries.iter().find(|g| g.id == id).cloned())
  }

  async fn list_galleries(&self, filter: &GalleryFilter) -> StoreResult<Vec<Gallery>> {
    let data = self.data.read().await;
    let mut galleries: Vec<Gallery> = data.galleries.iter().rev().filter(|g| filter.admits(g)).cloned().collect();
    galleries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(galleries)
  }

  async fn insert_gallery(&self, gallery: NewGallery) -> StoreResult<Gallery> {
    let now = Utc::now();
    let record = Gallery {
      id: new_id(),
      user_id: gallery.user_id,
      name: gallery.name,
      description: gallery.description,
      visibility: gallery.visibility,
      category: gallery.category,
      created_at: now,
      updated_at: now,
    };
    self.data.write().await.galleries.push(record.clone());
    Ok(record)
  }

  async fn get_profile(&self, user_id: &str) -> StoreResult<Option<Profile>> {
    Ok(self.data.read().await.profiles.iter().find(|p| p.id == user_id).cloned())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::VideoTags;

  fn new_video(gallery: &str, title: &str) -> NewVideo {
    NewVideo {
      gallery_id: gallery.into(),
      title: title.into(),
      description: None,
      youtube_id: "abc".into(),
      tags: VideoTags::new(),
    }
  }

  #[tokio::test]
  async fn videos_listed_newest_first_per_gallery() {
    let store = MemoryStore::new();
    store.insert_video(new_video("g1", "first")).await.unwrap();
    store.insert_video(new_video("g2", "other")).await.unwrap();
    store.insert_video(new_video("g1", "second")).await.unwrap();

    let titles: Vec<String> = store.list_videos("g1").await.unwrap().into_iter().map(|v| v.title).collect();
    assert_eq!(titles, vec!["second", "first"]);
  }

  #[tokio::test]
  async fn tag_groups_sorted_by_name() {
    let store = MemoryStore::new();
    for name in ["skill", "level", "drill"] {
      store.insert_tag_group(NewTagGroup { gallery_id: "g1".into(), name: name.into(), tags: vec![] }).await.unwrap();
    }
    let names: Vec<String> = store.list_tag_groups("g1").await.unwrap().into_iter().map(|g| g.name).collect();
    assert_eq!(names, vec!["drill", "level", "skill"]);
  }

  #[tokio::test]
  async fn duplicate_group_name_rejected() {
    let store = MemoryStore::new();
    let group = NewTagGroup { gallery_id: "g1".into(), name: "skill".into(), tags: vec![] };
    store.insert_tag_group(group.clone()).await.unwrap();
    assert!(matches!(store.insert_tag_group(group).await, Err(StoreError::Rejected { status: 409, .. })));
  }

  #[tokio::test]
  async fn delete_missing_record_is_not_found() {
    let store = MemoryStore::new();
    assert!(matches!(store.delete_video("nope").await, Err(StoreError::NotFound(_))));
    assert!(matches!(store.delete_tag_group("nope").await, Err(StoreError::NotFound(_))));
  }

  #[tokio::test]
  async fn update_applies_only_set_fields() {
    let store = MemoryStore::new();
    let v = store.insert_video(new_video("g1", "before")).await.unwrap();
    let updated =
      store.update_video(&v.id, VideoPatch { title: Some("after".into()), ..Default::default() }).await.unwrap();
    assert_eq!(updated.title, "after");
    assert_eq!(updated.youtube_id, "abc");
    assert!(updated.updated_at >= v.updated_at);
  }

  #[test]
  fn seed_parses_from_json() {
    let raw = r#"{
      "galleries": [{
        "id": "g1", "user_id": "u1", "name": "Football", "visibility": "public", "category": "education",
        "created_at": "2024-01-01T00:00:00Z", "updated_at": "2024-01-01T00:00:00Z"
      }],
      "profiles": [{"id": "u1", "username": "coach"}]
    }"#;
    let seed: Seed = serde_json::from_str(raw).unwrap();
    assert_eq!(seed.galleries.len(), 1);
    assert!(seed.videos.is_empty());
    assert_eq!(seed.profiles[0].username, "coach");
  }

  #[tokio::test]
  async fn demo_seed_loads() {
    let seed: Seed = serde_json::from_str(include_str!("../../demos/sample_gallery.json")).unwrap();
    let store = MemoryStore::from_seed(seed);
    let videos = store.list_videos("c0a8e1f2-basketball").await.unwrap();
    assert_eq!(videos.len(), 4);
    assert_eq!(videos[0].title, "Defensive slides");
    assert_eq!(videos[0].tags, None);
  }
}
