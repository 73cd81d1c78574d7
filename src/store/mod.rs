//! Record store seam: the external backend that owns galleries, videos and tag groups.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{
  Gallery, NewGallery, NewTagGroup, NewVideo, Profile, TagGroup, TagGroupPatch, Video, VideoPatch,
};

pub mod memory;
pub mod rest;

pub use memory::{MemoryStore, Seed};
pub use rest::{RestConfig, RestStore};

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("not found: {0}")]
  NotFound(String),
  #[error("rejected by backend ({status}): {message}")]
  Rejected { status: u16, message: String },
  #[error("transport error: {0}")]
  Transport(String),
  #[error("malformed response: {0}")]
  Decode(String),
  #[error(transparent)]
  Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Which galleries a listing should return.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GalleryFilter {
  /// Signed-in user, if any.
  pub viewer: Option<String>,
  /// Only galleries owned by `viewer`.
  pub only_owned: bool,
}

impl GalleryFilter {
  pub fn admits(&self, gallery: &Gallery) -> bool {
    match (&self.viewer, self.only_owned) {
      (Some(viewer), true) => gallery.user_id == *viewer,
      (None, true) => false,
      (viewer, false) => gallery.visibility.readable_by(&gallery.user_id, viewer.as_deref()),
    }
  }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
  /// Videos of a gallery, newest first.
  async fn list_videos(&self, gallery_id: &str) -> StoreResult<Vec<Video>>;
  async fn get_video(&self, id: &str) -> StoreResult<Video>;
  async fn insert_video(&self, video: NewVideo) -> StoreResult<Video>;
  async fn update_video(&self, id: &str, patch: VideoPatch) -> StoreResult<Video>;
  async fn delete_video(&self, id: &str) -> StoreResult<()>;

  /// Tag groups of a gallery, ordered by name.
  async fn list_tag_groups(&self, gallery_id: &str) -> StoreResult<Vec<TagGroup>>;
  async fn get_tag_group(&self, id: &str) -> StoreResult<TagGroup>;
  async fn insert_tag_group(&self, group: NewTagGroup) -> StoreResult<TagGroup>;
  async fn update_tag_group(&self, id: &str, patch: TagGroupPatch) -> StoreResult<TagGroup>;
  async fn delete_tag_group(&self, id: &str) -> StoreResult<()>;

  async fn get_gallery(&self, id: &str) -> StoreResult<Option<Gallery>>;
  /// Galleries admitted by `filter`, newest first.
  async fn list_galleries(&self, filter: &GalleryFilter) -> StoreResult<Vec<Gallery>>;
  async fn insert_gallery(&self, gallery: NewGallery) -> StoreResult<Gallery>;

  async fn get_profile(&self, user_id: &str) -> StoreResult<Option<Profile>>;
}
