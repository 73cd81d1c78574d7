//! Gallery service: cached reads and write paths over the record store.
//!
//! Reads of video and tag-group lists go through per-gallery read-through caches.
//! Every write goes to the store first; only after it succeeds is the affected
//! gallery's cache entry dropped and an event published. Nothing is applied
//! optimistically and nothing is retried.

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::cache::ReadThroughCache;
use crate::constants::constants;
use crate::events::{EventBus, GalleryEvent};
use crate::forms::{GalleryForm, VideoForm};
use crate::model::{Gallery, NewGallery, NewTagGroup, NewVideo, Profile, TagGroup, TagGroupPatch, Video, VideoPatch};
use crate::session::Session;
use crate::store::{GalleryFilter, RecordStore, StoreError};

#[derive(Debug, Error)]
pub enum ServiceError {
  #[error(transparent)]
  Store(#[from] StoreError),
  #[error("{0}")]
  Invalid(String),
  #[error("{0}")]
  Forbidden(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Everything the gallery view needs for one gallery.
#[derive(Debug, Clone)]
pub struct GallerySnapshot {
  pub gallery: Option<Gallery>,
  pub videos: Vec<Video>,
  pub tag_groups: Vec<TagGroup>,
}

#[derive(Clone)]
pub struct GalleryService {
  store: Arc<dyn RecordStore>,
  videos: ReadThroughCache<Vec<Video>>,
  tag_groups: ReadThroughCache<Vec<TagGroup>>,
  events: EventBus,
}

impl GalleryService {
  pub fn new(store: Arc<dyn RecordStore>) -> Self {
    let ttl = constants().cache_ttl();
    Self {
      store,
      videos: ReadThroughCache::new("videos", ttl),
      tag_groups: ReadThroughCache::new("tag_groups", ttl),
      events: EventBus::new(64),
    }
  }

  pub fn events(&self) -> &EventBus {
    &self.events
  }

  fn invalidate(&self, gallery_id: &str) {
    self.videos.invalidate(gallery_id);
    self.tag_groups.invalidate(gallery_id);
  }

  // --- Reads ---

  pub async fn videos(&self, gallery_id: &str) -> ServiceResult<Vec<Video>> {
    let store = Arc::clone(&self.store);
    Ok(self.videos.get_or_fetch(gallery_id, || async move { store.list_videos(gallery_id).await }).await?)
  }

  pub async fn tag_groups(&self, gallery_id: &str) -> ServiceResult<Vec<TagGroup>> {
    let store = Arc::clone(&self.store);
    Ok(self.tag_groups.get_or_fetch(gallery_id, || async move { store.list_tag_groups(gallery_id).await }).await?)
  }

  pub async fn gallery(&self, id: &str) -> ServiceResult<Option<Gallery>> {
    Ok(self.store.get_gallery(id).await?)
  }

  /// Galleries visible to `session`; with `only_owned`, just the ones it owns.
  pub async fn galleries(&self, session: &Session, only_owned: bool) -> ServiceResult<Vec<Gallery>> {
    let filter = GalleryFilter { viewer: session.user_id.clone(), only_owned };
    Ok(self.store.list_galleries(&filter).await?)
  }

  /// Gallery, videos and tag groups fetched concurrently.
  pub async fn load_gallery(&self, gallery_id: &str) -> ServiceResult<GallerySnapshot> {
    let (gallery, videos, tag_groups) =
      futures::try_join!(self.gallery(gallery_id), self.videos(gallery_id), self.tag_groups(gallery_id))?;
    Ok(GallerySnapshot { gallery, videos, tag_groups })
  }

  /// Drop the cached lists for a gallery and load it fresh from the store.
  pub async fn reload_gallery(&self, gallery_id: &str) -> ServiceResult<GallerySnapshot> {
    self.invalidate(gallery_id);
    self.load_gallery(gallery_id).await
  }

  /// Ownership check that treats any lookup failure as "not the owner".
  pub async fn is_owner(&self, gallery_id: &str, session: &Session) -> bool {
    let Some(user_id) = session.user_id.as_deref() else { return false };
    match self.store.get_gallery(gallery_id).await {
      Ok(Some(gallery)) => gallery.user_id == user_id,
      Ok(None) => false,
      Err(e) => {
        warn!(gallery = %gallery_id, err = %e, "ownership check failed");
        false
      }
    }
  }

  pub async fn profile(&self, user_id: &str) -> ServiceResult<Option<Profile>> {
    Ok(self.store.get_profile(user_id).await?)
  }

  // --- Video writes ---

  pub async fn add_video(&self, gallery_id: &str, form: VideoForm) -> ServiceResult<Video> {
    if form.title.trim().is_empty() {
      return Err(ServiceError::Invalid("Title is required".to_string()));
    }
    let video = self
      .store
      .insert_video(NewVideo {
        gallery_id: gallery_id.to_string(),
        title: form.title.trim().to_string(),
        description: form.description,
        youtube_id: form.youtube_id,
        tags: form.tags,
      })
      .await?;
    info!(gallery = %gallery_id, video = %video.id, "video added");
    self.invalidate(gallery_id);
    self.events.publish(GalleryEvent::VideoAdded { gallery_id: gallery_id.to_string(), video: video.clone() });
    Ok(video)
  }

  pub async fn update_video(&self, id: &str, patch: VideoPatch) -> ServiceResult<Video> {
    if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
      return Err(ServiceError::Invalid("Title cannot be empty".to_string()));
    }
    let video = self.store.update_video(id, patch).await?;
    info!(gallery = %video.gallery_id, video = %video.id, "video updated");
    self.invalidate(&video.gallery_id);
    self.events.publish(GalleryEvent::VideoUpdated { gallery_id: video.gallery_id.clone(), video: video.clone() });
    Ok(video)
  }

  pub async fn delete_video(&self, id: &str) -> ServiceResult<()> {
    // The row is gone after the delete, so resolve its gallery first.
    let gallery_id = self.store.get_video(id).await?.gallery_id;
    self.store.delete_video(id).await?;
    info!(gallery = %gallery_id, video = %id, "video deleted");
    self.invalidate(&gallery_id);
    self.events.publish(GalleryEvent::VideoDeleted { gallery_id, video_id: id.to_string() });
    Ok(())
  }

  // --- Tag group writes ---

  pub async fn add_tag_group(&self, gallery_id: &str, name: &str) -> ServiceResult<TagGroup> {
    let name = name.trim();
    if name.is_empty() {
      return Err(ServiceError::Invalid("Group name is required".to_string()));
    }
    let group = self
      .store
      .insert_tag_group(NewTagGroup { gallery_id: gallery_id.to_string(), name: name.to_string(), tags: Vec::new() })
      .await?;
    info!(gallery = %gallery_id, group = %group.name, "tag group added");
    self.tag_groups_changed(gallery_id);
    Ok(group)
  }

  pub async fn update_tag_group(&self, id: &str, mut patch: TagGroupPatch) -> ServiceResult<TagGroup> {
    if let Some(name) = patch.name.as_mut() {
      let trimmed = name.trim();
      if trimmed.is_empty() {
        return Err(ServiceError::Invalid("Group name cannot be empty".to_string()));
      }
      *name = trimmed.to_string();
    }
    let group = self.store.update_tag_group(id, patch).await?;
    self.tag_groups_changed(&group.gallery_id);
    Ok(group)
  }

  /// Append `tag` to a group by rewriting its full tag list.
  pub async fn add_tag(&self, group_id: &str, tag: &str) -> ServiceResult<TagGroup> {
    let tag = tag.trim();
    if tag.is_empty() {
      return Err(ServiceError::Invalid("Tag name is required".to_string()));
    }
    let group = self.store.get_tag_group(group_id).await?;
    if group.tags.iter().any(|t| t == tag) {
      return Err(ServiceError::Invalid(format!("'{}' is already in {}", tag, group.name)));
    }
    let mut tags = group.tags;
    tags.push(tag.to_string());
    self.update_tag_group(group_id, TagGroupPatch { tags: Some(tags), ..Default::default() }).await
  }

  /// Remove `tag` from a group. Videos that carry it keep it.
  pub async fn remove_tag(&self, group_id: &str, tag: &str) -> ServiceResult<TagGroup> {
    let group = self.store.get_tag_group(group_id).await?;
    let tags: Vec<String> = group.tags.into_iter().filter(|t| t != tag).collect();
    self.update_tag_group(group_id, TagGroupPatch { tags: Some(tags), ..Default::default() }).await
  }

  /// Delete a group and its tag list. Tags already stored on videos are left alone.
  pub async fn delete_tag_group(&self, id: &str) -> ServiceResult<()> {
    let gallery_id = self.store.get_tag_group(id).await?.gallery_id;
    self.store.delete_tag_group(id).await?;
    info!(gallery = %gallery_id, group = %id, "tag group deleted");
    self.tag_groups_changed(&gallery_id);
    Ok(())
  }

  fn tag_groups_changed(&self, gallery_id: &str) {
    self.invalidate(gallery_id);
    self.events.publish(GalleryEvent::TagGroupsChanged { gallery_id: gallery_id.to_string() });
  }

  // --- Galleries ---

  pub async fn create_gallery(&self, session: &Session, form: GalleryForm) -> ServiceResult<Gallery> {
    let Some(user_id) = session.user_id.clone() else {
      return Err(ServiceError::Forbidden("Sign in to create galleries".to_string()));
    };
    if form.name.trim().is_empty() {
      return Err(ServiceError::Invalid("Gallery name is required".to_string()));
    }
    let gallery = self
      .store
      .insert_gallery(NewGallery {
        user_id,
        name: form.name.trim().to_string(),
        description: form.description,
        visibility: form.visibility,
        category: form.category,
      })
      .await?;
    info!(gallery = %gallery.id, name = %gallery.name, "gallery created");
    self.events.publish(GalleryEvent::GalleryCreated { gallery: gallery.clone() });
    Ok(gallery)
  }
}
