//! View state for browsing one gallery: tag selection, title search, paging and
//! the load lifecycle of the data underneath.
//!
//! Filter and paging changes operate on data already fetched and never pass
//! through a loading state. Fetches are tagged with a generation number; a result
//! that belongs to a superseded fetch (the user navigated elsewhere, or a newer
//! refresh started) is discarded instead of overwriting newer state.

use tracing::{debug, info};

use crate::constants::constants;
use crate::events::GalleryEvent;
use crate::filter::VideoFilter;
use crate::link::{FilterQuery, Route};
use crate::model::{Gallery, TagGroup, Video};
use crate::pager::{clamp_page, paginate, total_pages};
use crate::service::GallerySnapshot;
use crate::tags::{ActiveTags, TagIndex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
  Loading,
  Ready,
  Error(String),
}

/// Identifies one fetch so its result can be matched against current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
  pub gallery_id: String,
  generation: u64,
}

/// The slice of filtered videos on screen.
#[derive(Debug)]
pub struct PageView<'a> {
  pub videos: Vec<&'a Video>,
  pub number: usize,
  pub total_pages: usize,
  pub total_matches: usize,
  pub start: usize,
}

#[derive(Debug)]
pub struct GalleryView {
  gallery_id: String,
  gallery: Option<Gallery>,
  videos: Vec<Video>,
  tag_groups: Vec<TagGroup>,
  tag_index: TagIndex,
  active: ActiveTags,
  search: String,
  per_page: usize,
  page: usize,
  load: LoadState,
  generation: u64,
}

impl GalleryView {
  pub fn new(gallery_id: impl Into<String>, query: FilterQuery, per_page: usize) -> Self {
    let per_page = if constants().is_page_size(per_page) { per_page } else { constants().default_page_size };
    Self {
      gallery_id: gallery_id.into(),
      gallery: None,
      videos: Vec::new(),
      tag_groups: Vec::new(),
      tag_index: TagIndex::default(),
      active: query.tags,
      search: query.search,
      per_page,
      page: 1,
      load: LoadState::Loading,
      generation: 0,
    }
  }

  // --- Accessors ---

  pub fn gallery_id(&self) -> &str {
    &self.gallery_id
  }

  pub fn gallery(&self) -> Option<&Gallery> {
    self.gallery.as_ref()
  }

  pub fn videos(&self) -> &[Video] {
    &self.videos
  }

  pub fn tag_groups(&self) -> &[TagGroup] {
    &self.tag_groups
  }

  pub fn tag_index(&self) -> &TagIndex {
    &self.tag_index
  }

  pub fn active(&self) -> &ActiveTags {
    &self.active
  }

  pub fn search(&self) -> &str {
    &self.search
  }

  pub fn per_page(&self) -> usize {
    self.per_page
  }

  #[cfg(test)]
  pub fn page(&self) -> usize {
    self.page
  }

  pub fn load_state(&self) -> &LoadState {
    &self.load
  }

  pub fn is_loading(&self) -> bool {
    self.load == LoadState::Loading
  }

  pub fn find_video(&self, id: &str) -> Option<&Video> {
    self.videos.iter().find(|v| v.id == id)
  }

  // --- Load lifecycle ---

  /// Switch to another gallery. Data from the previous gallery is dropped and any
  /// fetch still in flight for it becomes stale.
  pub fn navigate(&mut self, gallery_id: &str, query: FilterQuery) {
    if gallery_id == self.gallery_id {
      if self.query() != query {
        self.active = query.tags;
        self.search = query.search;
        self.page = 1;
      }
      return;
    }
    info!(from = %self.gallery_id, to = %gallery_id, "gallery view: navigate");
    let per_page = self.per_page;
    let generation = self.generation + 1;
    *self = Self::new(gallery_id, query, per_page);
    self.generation = generation;
  }

  /// Start a (re)fetch. Already loaded data stays visible until the result arrives.
  pub fn begin_fetch(&mut self) -> FetchTicket {
    self.generation += 1;
    self.load = LoadState::Loading;
    FetchTicket { gallery_id: self.gallery_id.clone(), generation: self.generation }
  }

  /// Apply a fetch result. Returns false when the ticket is stale and the result was ignored.
  pub fn finish_fetch(&mut self, ticket: &FetchTicket, result: Result<GallerySnapshot, String>) -> bool {
    if ticket.generation != self.generation || ticket.gallery_id != self.gallery_id {
      debug!(
        gallery = %ticket.gallery_id,
        generation = ticket.generation,
        current = self.generation,
        "gallery view: stale fetch discarded"
      );
      return false;
    }
    match result {
      Ok(snapshot) => {
        self.gallery = snapshot.gallery;
        self.tag_index = TagIndex::from_groups(&snapshot.tag_groups);
        self.tag_groups = snapshot.tag_groups;
        self.videos = snapshot.videos;
        self.load = LoadState::Ready;
        self.clamp();
      }
      Err(message) => {
        self.load = LoadState::Error(message);
      }
    }
    true
  }

  /// Fold a confirmed write into local state. Returns true when the change
  /// cannot be applied locally and a refetch is needed.
  pub fn apply_event(&mut self, event: &GalleryEvent) -> bool {
    if event.gallery_id() != self.gallery_id {
      return false;
    }
    match event {
      GalleryEvent::VideoAdded { video, .. } => {
        if self.find_video(&video.id).is_none() {
          self.videos.insert(0, video.clone());
        }
      }
      GalleryEvent::VideoUpdated { video, .. } => match self.videos.iter_mut().find(|v| v.id == video.id) {
        Some(existing) => *existing = video.clone(),
        None => return true,
      },
      GalleryEvent::VideoDeleted { video_id, .. } => {
        self.videos.retain(|v| v.id != *video_id);
      }
      GalleryEvent::TagGroupsChanged { .. } | GalleryEvent::GalleryCreated { .. } => return true,
    }
    self.clamp();
    false
  }

  // --- Filter and paging ---

  pub fn toggle_tag(&mut self, group: &str, tag: &str) {
    self.active.toggle(group, tag);
    self.page = 1;
  }

  pub fn clear_tags(&mut self) {
    self.active.clear();
    self.page = 1;
  }

  pub fn set_search(&mut self, term: &str) {
    if self.search != term {
      self.search = term.to_string();
      self.page = 1;
    }
  }

  /// Returns false (and changes nothing) for sizes outside the allowed set.
  pub fn set_per_page(&mut self, per_page: usize) -> bool {
    if !constants().is_page_size(per_page) {
      return false;
    }
    self.per_page = per_page;
    self.page = 1;
    true
  }

  pub fn cycle_per_page(&mut self) -> usize {
    let options = &constants().page_size_options;
    let idx = options.iter().position(|&n| n == self.per_page).unwrap_or(0);
    let next = options[(idx + 1) % options.len()];
    self.set_per_page(next);
    next
  }

  pub fn total_pages(&self) -> usize {
    total_pages(self.filtered().len(), self.per_page)
  }

  pub fn next_page(&mut self) {
    self.page = clamp_page(self.page + 1, self.total_pages());
  }

  pub fn prev_page(&mut self) {
    self.page = clamp_page(self.page.saturating_sub(1), self.total_pages());
  }

  fn clamp(&mut self) {
    self.page = clamp_page(self.page, self.total_pages());
  }

  pub fn filtered(&self) -> Vec<&Video> {
    VideoFilter::new(&self.active, &self.search).apply(&self.videos)
  }

  pub fn current_page(&self) -> PageView<'_> {
    let filtered = self.filtered();
    let page = paginate(&filtered, self.per_page, self.page);
    PageView {
      videos: page.items.to_vec(),
      number: page.number,
      total_pages: page.total_pages,
      total_matches: page.total_items,
      start: page.start,
    }
  }

  // --- Share link ---

  pub fn query(&self) -> FilterQuery {
    FilterQuery { search: self.search.clone(), tags: self.active.clone() }
  }

  pub fn route(&self) -> Route {
    Route::Gallery { id: self.gallery_id.clone(), query: self.query() }
  }
}
