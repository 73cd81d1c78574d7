use anyhow::{Context, Result, anyhow};
use ratatui::widgets::ListState;
use std::future::Future;
use tokio::sync::{broadcast, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::constants::constants;
use crate::events::GalleryEvent;
use crate::forms::{parse_gallery_form, parse_video_form};
use crate::gallery_view::{FetchTicket, GalleryView, LoadState};
use crate::link::{FilterQuery, History, Route};
use crate::model::{Gallery, Profile, TagGroup, Video, VideoPatch};
use crate::service::{GalleryService, GallerySnapshot, ServiceError, ServiceResult};
use crate::session::Session;
use crate::theme::{THEMES, theme_index};

// --- Types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
  /// Gallery list.
  Galleries,
  /// Paged video list of one gallery.
  Gallery,
  /// Tag pane focused; toggling tags narrows the video list.
  Tags,
  /// Editing the title search.
  Search,
  /// One video's details.
  Video,
  /// Owner view of every video in the gallery.
  Manage,
  /// Owner view of tag groups.
  ManageTags,
  /// Single-line form input.
  Prompt,
  /// Yes/no before a destructive write.
  Confirm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptKind {
  NewGallery,
  AddVideo,
  RenameVideo { video_id: String },
  AddTagGroup,
  AddTag { group_id: String, group: String },
}

impl PromptKind {
  pub fn title(&self) -> String {
    match self {
      PromptKind::NewGallery => " New gallery: name | visibility | category | description ".to_string(),
      PromptKind::AddVideo => " Add video: title | youtube url or id | group:tag,tag; group:tag ".to_string(),
      PromptKind::RenameVideo { .. } => " Rename video ".to_string(),
      PromptKind::AddTagGroup => " New tag group ".to_string(),
      PromptKind::AddTag { group, .. } => format!(" Add tag to {} ", group),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmKind {
  DeleteVideo { video_id: String, title: String },
  DeleteTagGroup { group_id: String, name: String },
  RemoveTag { group_id: String, tag: String },
}

impl ConfirmKind {
  pub fn question(&self) -> String {
    match self {
      ConfirmKind::DeleteVideo { title, .. } => format!("Delete video '{}'?", title),
      ConfirmKind::DeleteTagGroup { name, .. } => {
        format!("Delete tag group '{}'? Videos keep the tags they already have.", name)
      }
      ConfirmKind::RemoveTag { tag, .. } => format!("Remove tag '{}'?", tag),
    }
  }
}

/// What a finished write asks the UI to do next.
#[derive(Debug)]
pub enum WriteOutcome {
  Message(String),
  GalleryCreated(Gallery),
}

/// In-flight async task receivers.
#[derive(Default)]
pub(crate) struct AsyncTasks {
  pub(crate) galleries_rx: Option<oneshot::Receiver<ServiceResult<Vec<Gallery>>>>,
  pub(crate) gallery_rx: Option<(FetchTicket, oneshot::Receiver<ServiceResult<GallerySnapshot>>)>,
  pub(crate) owner_rx: Option<oneshot::Receiver<(String, bool)>>,
  pub(crate) profile_rx: Option<oneshot::Receiver<ServiceResult<Option<Profile>>>>,
  pub(crate) write_rx: Option<oneshot::Receiver<Result<WriteOutcome>>>,
}

impl AsyncTasks {
  fn any(&self) -> bool {
    self.galleries_rx.is_some()
      || self.gallery_rx.is_some()
      || self.owner_rx.is_some()
      || self.profile_rx.is_some()
      || self.write_rx.is_some()
  }
}

enum Polled<T> {
  Pending,
  Ready(T),
  Lost,
}

fn poll_slot<T>(slot: &mut Option<oneshot::Receiver<T>>) -> Polled<T> {
  let Some(mut rx) = slot.take() else { return Polled::Pending };
  match rx.try_recv() {
    Ok(value) => Polled::Ready(value),
    Err(oneshot::error::TryRecvError::Empty) => {
      *slot = Some(rx);
      Polled::Pending
    }
    Err(oneshot::error::TryRecvError::Closed) => Polled::Lost,
  }
}

/// Move a list selection one step, wrapping at both ends.
pub fn step_selection(state: &mut ListState, count: usize, forward: bool) {
  if count == 0 {
    state.select(None);
    return;
  }
  let i = match state.selected() {
    Some(i) if forward => (i + 1) % count,
    Some(i) => {
      if i == 0 {
        count - 1
      } else {
        i - 1
      }
    }
    None => 0,
  };
  state.select(Some(i));
}

fn clamp_selection(state: &mut ListState, count: usize) {
  match (state.selected(), count) {
    (_, 0) => state.select(None),
    (None, _) => state.select(Some(0)),
    (Some(i), n) if i >= n => state.select(Some(n - 1)),
    _ => {}
  }
}

pub struct App {
  pub service: GalleryService,
  pub session: Session,
  pub history: History,
  pub mode: AppMode,
  /// Mode to return to when a prompt, confirmation or search closes.
  return_mode: AppMode,
  pub theme_index: usize,
  config: Config,
  pub galleries: Vec<Gallery>,
  pub galleries_loading: bool,
  pub gallery_list: ListState,
  /// Galleries list shows only the session's own galleries.
  pub only_owned: bool,
  pub view: Option<GalleryView>,
  pub video_list: ListState,
  pub tag_list: ListState,
  pub manage_list: ListState,
  pub group_list: ListState,
  /// Tag position inside the selected group on the tag management screen.
  pub tag_cursor: usize,
  pub is_owner: bool,
  pub detail_video_id: Option<String>,
  pub input: String,
  pub cursor_position: usize,
  pub input_scroll: usize,
  pub prompt: Option<PromptKind>,
  pub confirm: Option<ConfirmKind>,
  pub last_error: Option<String>,
  pub status_message: Option<String>,
  /// Informational message, shown below status and error in priority.
  pub info_message: Option<String>,
  pub should_quit: bool,
  pub(crate) tasks: AsyncTasks,
  events: broadcast::Receiver<GalleryEvent>,
  /// When the last error was set, for auto-dismiss.
  error_time: Option<Instant>,
  per_page: usize,
}

impl App {
  pub fn new(service: GalleryService, session: Session, config: Config, start: Route) -> Self {
    let events = service.events().subscribe();
    let theme_index = theme_index(config.theme_name.as_deref());
    let per_page = config.videos_per_page.unwrap_or(constants().default_page_size);
    Self {
      service,
      session,
      history: History::new(start),
      mode: AppMode::Galleries,
      return_mode: AppMode::Galleries,
      theme_index,
      config,
      galleries: Vec::new(),
      galleries_loading: false,
      gallery_list: ListState::default(),
      only_owned: false,
      view: None,
      video_list: ListState::default(),
      tag_list: ListState::default(),
      manage_list: ListState::default(),
      group_list: ListState::default(),
      tag_cursor: 0,
      is_owner: false,
      detail_video_id: None,
      input: String::new(),
      cursor_position: 0,
      input_scroll: 0,
      prompt: None,
      confirm: None,
      last_error: None,
      status_message: None,
      info_message: None,
      should_quit: false,
      tasks: AsyncTasks::default(),
      events,
      error_time: None,
      per_page,
    }
  }

  /// Open the starting route and kick off the first profile fetch.
  pub fn start(&mut self) {
    self.open_current();
    self.maybe_refresh_profile();
  }

  pub fn theme(&self) -> &'static crate::theme::Theme {
    &THEMES[self.theme_index]
  }

  pub fn next_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
    self.config.theme_name = Some(self.theme().name.to_string());
    self.config.save();
  }

  /// Set an error message with auto-dismiss tracking.
  pub fn set_error(&mut self, msg: String) {
    warn!(err = %msg, "app: error shown");
    self.last_error = Some(msg);
    self.error_time = Some(Instant::now());
  }

  /// Failed writes stay on screen until acknowledged with a key press.
  fn set_write_error(&mut self, msg: String) {
    self.set_error(msg);
    self.error_time = None;
  }

  pub fn error_needs_ack(&self) -> bool {
    self.last_error.is_some() && self.error_time.is_none()
  }

  /// Dismiss a failed-write message. Returns true if there was one to dismiss.
  pub fn acknowledge_error(&mut self) -> bool {
    if self.error_needs_ack() {
      self.last_error = None;
      return true;
    }
    false
  }

  pub fn clear_error(&mut self) {
    self.last_error = None;
    self.error_time = None;
  }

  /// Clear stale error messages after the display period.
  pub fn expire_error(&mut self) {
    if let Some(t) = self.error_time
      && t.elapsed() >= constants().error_display()
    {
      self.last_error = None;
      self.error_time = None;
    }
  }

  /// Screen underneath the open prompt, confirmation or search box.
  pub fn return_mode(&self) -> AppMode {
    self.return_mode
  }

  pub fn has_pending(&self) -> bool {
    self.tasks.any()
  }

  // --- Navigation ---

  /// Move to `route`, leaving a history entry to come back to.
  pub fn navigate(&mut self, route: Route) {
    info!(link = %route.to_link(), "navigate");
    self.history.push(route);
    self.open_current();
  }

  /// Step back in history. Returns false when there is nowhere to go.
  pub fn go_back(&mut self) -> bool {
    if self.history.back() {
      self.open_current();
      true
    } else {
      false
    }
  }

  pub fn share_link(&self) -> String {
    self.history.current().to_link()
  }

  fn open_current(&mut self) {
    self.info_message = None;
    match self.history.current().clone() {
      Route::Galleries => {
        self.mode = AppMode::Galleries;
        self.trigger_galleries();
      }
      Route::Gallery { id, query } => {
        self.enter_gallery(&id, Some(query));
        self.mode = AppMode::Gallery;
      }
      Route::Video { gallery_id, video_id } => {
        self.enter_gallery(&gallery_id, None);
        self.detail_video_id = Some(video_id);
        self.mode = AppMode::Video;
      }
      Route::ManageTags { id } => {
        self.enter_gallery(&id, None);
        self.group_list.select(Some(0));
        self.tag_cursor = 0;
        self.mode = AppMode::ManageTags;
      }
    }
  }

  /// Point the gallery view at `id`. Switching galleries drops the old data and
  /// starts a fetch; staying on the same one only applies `query`, if given.
  fn enter_gallery(&mut self, id: &str, query: Option<FilterQuery>) {
    if self.view.as_ref().is_some_and(|v| v.gallery_id() == id) {
      if let (Some(view), Some(query)) = (self.view.as_mut(), query) {
        view.navigate(id, query);
        clamp_selection(&mut self.video_list, view.current_page().videos.len());
      }
      return;
    }
    let query = query.unwrap_or_default();
    match self.view.as_mut() {
      Some(view) => view.navigate(id, query),
      None => self.view = Some(GalleryView::new(id, query, self.per_page)),
    }
    self.video_list.select(Some(0));
    self.tag_list.select(Some(0));
    self.manage_list.select(Some(0));
    self.group_list.select(Some(0));
    self.tag_cursor = 0;
    self.is_owner = false;
    self.trigger_gallery_fetch(false);
    self.trigger_owner_check();
  }

  /// Keep the current history entry in step with the gallery filter. Replaces
  /// rather than pushes, so stepping back never walks through filter edits.
  pub fn sync_route(&mut self) {
    let Some(view) = self.view.as_ref() else { return };
    if let Route::Gallery { id, .. } = self.history.current()
      && id == view.gallery_id()
    {
      self.history.replace(view.route());
    }
  }

  // --- Background work ---

  pub fn trigger_galleries(&mut self) {
    let service = self.service.clone();
    let session = self.session.clone();
    let only_owned = self.only_owned;
    self.galleries_loading = true;
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(service.galleries(&session, only_owned).await);
    });
    self.tasks.galleries_rx = Some(rx);
  }

  /// Fetch the current gallery. With `reload` the cached lists are bypassed.
  pub fn trigger_gallery_fetch(&mut self, reload: bool) {
    let Some(view) = self.view.as_mut() else { return };
    let ticket = view.begin_fetch();
    let service = self.service.clone();
    let session = self.session.clone();
    let gallery_id = ticket.gallery_id.clone();
    debug!(gallery = %gallery_id, reload, "gallery fetch started");
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let result =
        if reload { service.reload_gallery(&gallery_id).await } else { service.load_gallery(&gallery_id).await };
      let result = result.and_then(|snapshot| match &snapshot.gallery {
        Some(gallery) if !session.can_view(gallery) => {
          Err(ServiceError::Forbidden("This gallery is not shared with you".to_string()))
        }
        _ => Ok(snapshot),
      });
      let _ = tx.send(result);
    });
    self.tasks.gallery_rx = Some((ticket, rx));
  }

  fn trigger_owner_check(&mut self) {
    let Some(view) = self.view.as_ref() else { return };
    if !self.session.is_signed_in() {
      return;
    }
    let service = self.service.clone();
    let session = self.session.clone();
    let gallery_id = view.gallery_id().to_string();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let owner = service.is_owner(&gallery_id, &session).await;
      let _ = tx.send((gallery_id, owner));
    });
    self.tasks.owner_rx = Some(rx);
  }

  /// Fetch the profile unless one was fetched within the refresh interval.
  pub fn maybe_refresh_profile(&mut self) {
    if self.tasks.profile_rx.is_some() {
      return;
    }
    let now = Instant::now();
    if !self.session.profile_refresh_due(now, constants().profile_refresh_interval()) {
      return;
    }
    let Some(user_id) = self.session.user_id.clone() else { return };
    // A failed fetch still counts toward the interval.
    self.session.record_profile(None, now);
    let service = self.service.clone();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(service.profile(&user_id).await);
    });
    self.tasks.profile_rx = Some(rx);
  }

  /// Terminal focus came back: refresh what is on screen and, rate limited, the profile.
  pub fn on_focus_gained(&mut self) {
    debug!("focus gained");
    match self.mode {
      AppMode::Galleries => self.trigger_galleries(),
      _ if self.view.is_some() => self.trigger_gallery_fetch(false),
      _ => {}
    }
    self.maybe_refresh_profile();
  }

  fn spawn_write<F>(&mut self, status: String, job: F)
  where
    F: Future<Output = Result<WriteOutcome>> + Send + 'static,
  {
    if self.tasks.write_rx.is_some() {
      self.set_error("Still saving the previous change.".to_string());
      return;
    }
    self.clear_error();
    self.status_message = Some(status);
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(job.await);
    });
    self.tasks.write_rx = Some(rx);
  }

  pub fn check_pending(&mut self) {
    match poll_slot(&mut self.tasks.galleries_rx) {
      Polled::Ready(Ok(galleries)) => {
        self.galleries_loading = false;
        self.galleries = galleries;
        clamp_selection(&mut self.gallery_list, self.galleries.len());
      }
      Polled::Ready(Err(e)) => {
        self.galleries_loading = false;
        self.set_error(format!("Failed to load galleries: {}", e));
      }
      Polled::Lost => {
        self.galleries_loading = false;
        self.set_error("Gallery list task failed.".to_string());
      }
      Polled::Pending => {}
    }

    if let Some((ticket, mut rx)) = self.tasks.gallery_rx.take() {
      let result = match rx.try_recv() {
        Ok(result) => Some(result.map_err(|e| e.to_string())),
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.gallery_rx = Some((ticket.clone(), rx));
          None
        }
        Err(oneshot::error::TryRecvError::Closed) => Some(Err("Gallery load task failed.".to_string())),
      };
      if let Some(result) = result
        && let Some(view) = self.view.as_mut()
        && view.finish_fetch(&ticket, result)
      {
        let error = match view.load_state() {
          LoadState::Error(msg) => Some(msg.clone()),
          _ => None,
        };
        let count = view.current_page().videos.len();
        clamp_selection(&mut self.video_list, count);
        self.clamp_lists();
        if let Some(msg) = error {
          self.set_error(format!("Failed to load gallery: {}", msg));
        }
      }
    }

    if let Polled::Ready((gallery_id, owner)) = poll_slot(&mut self.tasks.owner_rx)
      && self.view.as_ref().is_some_and(|v| v.gallery_id() == gallery_id)
    {
      self.is_owner = owner;
    }

    match poll_slot(&mut self.tasks.profile_rx) {
      Polled::Ready(Ok(profile)) => {
        if profile.is_none() {
          debug!("profile: none stored for session user");
        }
        self.session.record_profile(profile, Instant::now());
      }
      Polled::Ready(Err(e)) => warn!(err = %e, "profile: refresh failed"),
      Polled::Lost | Polled::Pending => {}
    }

    match poll_slot(&mut self.tasks.write_rx) {
      Polled::Ready(result) => {
        self.status_message = None;
        match result {
          Ok(WriteOutcome::Message(msg)) => self.info_message = Some(msg),
          Ok(WriteOutcome::GalleryCreated(gallery)) => {
            self.info_message = Some(format!("Created '{}'", gallery.name));
            self.navigate(Route::gallery(gallery.id));
          }
          Err(e) => self.set_write_error(format!("Save failed: {:#}", e)),
        }
      }
      Polled::Lost => {
        self.status_message = None;
        self.set_write_error("Save task failed.".to_string());
      }
      Polled::Pending => {}
    }

    self.drain_events();
  }

  /// Apply confirmed writes published by the service.
  fn drain_events(&mut self) {
    let mut refetch = false;
    let mut galleries_changed = false;
    loop {
      match self.events.try_recv() {
        Ok(event) => {
          debug!(gallery = %event.gallery_id(), "app: event received");
          if matches!(event, GalleryEvent::GalleryCreated { .. }) {
            galleries_changed = true;
          }
          if let Some(view) = self.view.as_mut() {
            refetch |= view.apply_event(&event);
          }
        }
        Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
          warn!(skipped, "app: missed events, refetching");
          refetch = true;
          galleries_changed = true;
        }
        Err(_) => break,
      }
    }
    if refetch {
      self.trigger_gallery_fetch(false);
    }
    if galleries_changed && self.mode == AppMode::Galleries {
      self.trigger_galleries();
    }
    self.clamp_lists();
  }

  fn clamp_lists(&mut self) {
    let Some(view) = self.view.as_ref() else { return };
    let page_len = view.current_page().videos.len();
    let videos = view.videos().len();
    let tags = self.tag_entries().len();
    let groups = view.tag_groups().len();
    clamp_selection(&mut self.video_list, page_len);
    clamp_selection(&mut self.manage_list, videos);
    clamp_selection(&mut self.tag_list, tags);
    clamp_selection(&mut self.group_list, groups);
    let group_tags = self.selected_group().map_or(0, |g| g.tags.len());
    self.tag_cursor = self.tag_cursor.min(group_tags.saturating_sub(1));
  }

  // --- Selections ---

  pub fn selected_gallery(&self) -> Option<&Gallery> {
    self.gallery_list.selected().and_then(|i| self.galleries.get(i))
  }

  /// Video under the cursor on the current page.
  pub fn selected_video(&self) -> Option<&Video> {
    let view = self.view.as_ref()?;
    let i = self.video_list.selected()?;
    view.current_page().videos.get(i).copied()
  }

  pub fn selected_managed_video(&self) -> Option<&Video> {
    let view = self.view.as_ref()?;
    view.videos().get(self.manage_list.selected()?)
  }

  pub fn selected_group(&self) -> Option<&TagGroup> {
    let view = self.view.as_ref()?;
    view.tag_groups().get(self.group_list.selected()?)
  }

  /// Video shown on the detail screen, if it is in the loaded set.
  pub fn detail_video(&self) -> Option<&Video> {
    let id = self.detail_video_id.as_deref()?;
    self.view.as_ref()?.find_video(id)
  }

  /// Tag pane rows: every `(group, tag)` pair in display order.
  pub fn tag_entries(&self) -> Vec<(String, String)> {
    let Some(view) = self.view.as_ref() else { return Vec::new() };
    view
      .tag_index()
      .groups()
      .iter()
      .flat_map(|g| g.tags.iter().map(move |t| (g.name.clone(), t.clone())))
      .collect()
  }

  // --- Gallery view actions ---

  pub fn open_selected_gallery(&mut self) {
    if let Some(id) = self.selected_gallery().map(|g| g.id.clone()) {
      self.navigate(Route::gallery(id));
    }
  }

  pub fn toggle_owned_filter(&mut self) {
    if !self.session.is_signed_in() {
      self.set_error("Sign in to see your own galleries.".to_string());
      return;
    }
    self.only_owned = !self.only_owned;
    self.trigger_galleries();
  }

  pub fn open_selected_video(&mut self) {
    let Some(view) = self.view.as_ref() else { return };
    if let Some(video) = self.selected_video() {
      let route = Route::Video { gallery_id: view.gallery_id().to_string(), video_id: video.id.clone() };
      self.navigate(route);
    }
  }

  pub fn toggle_selected_tag(&mut self) {
    let entries = self.tag_entries();
    let Some((group, tag)) = self.tag_list.selected().and_then(|i| entries.get(i)) else { return };
    if let Some(view) = self.view.as_mut() {
      view.toggle_tag(group, tag);
    }
    self.video_list.select(Some(0));
    self.sync_route();
  }

  pub fn clear_tags(&mut self) {
    if let Some(view) = self.view.as_mut() {
      view.clear_tags();
    }
    self.video_list.select(Some(0));
    self.sync_route();
  }

  pub fn update_search(&mut self) {
    if let Some(view) = self.view.as_mut() {
      view.set_search(self.input.trim());
    }
    self.video_list.select(Some(0));
    self.sync_route();
  }

  pub fn begin_search(&mut self) {
    let current = self.view.as_ref().map(|v| v.search().to_string()).unwrap_or_default();
    self.return_mode = self.mode;
    self.set_input(current);
    self.mode = AppMode::Search;
  }

  /// Leave the search box. `keep` false clears the term.
  pub fn end_search(&mut self, keep: bool) {
    if !keep {
      self.input.clear();
      self.update_search();
    }
    self.reset_input();
    self.mode = self.return_mode;
  }

  pub fn change_page(&mut self, forward: bool) {
    let Some(view) = self.view.as_mut() else { return };
    if forward {
      view.next_page();
    } else {
      view.prev_page();
    }
    self.video_list.select(Some(0));
  }

  pub fn cycle_page_size(&mut self) {
    let Some(view) = self.view.as_mut() else { return };
    let size = view.cycle_per_page();
    self.per_page = size;
    self.config.videos_per_page = Some(size);
    self.config.save();
    self.video_list.select(Some(0));
    self.info_message = Some(format!("{} videos per page", size));
  }

  pub fn show_share_link(&mut self) {
    self.info_message = Some(format!("Link: {}", self.share_link()));
  }

  // --- Input line ---

  fn set_input(&mut self, text: String) {
    self.cursor_position = text.chars().count();
    self.input = text;
    self.input_scroll = 0;
  }

  fn reset_input(&mut self) {
    self.input.clear();
    self.cursor_position = 0;
    self.input_scroll = 0;
  }

  pub fn open_prompt(&mut self, kind: PromptKind, initial: String) {
    self.return_mode = self.mode;
    self.prompt = Some(kind);
    self.set_input(initial);
    self.mode = AppMode::Prompt;
  }

  pub fn cancel_prompt(&mut self) {
    self.prompt = None;
    self.reset_input();
    self.mode = self.return_mode;
  }

  /// Validate the prompt line and start the write. Invalid input keeps the prompt open.
  pub fn submit_prompt(&mut self) {
    let Some(kind) = self.prompt.clone() else { return };
    let line = self.input.trim().to_string();
    match self.start_prompt_write(kind, &line) {
      Ok(()) => {
        self.prompt = None;
        self.reset_input();
        self.mode = self.return_mode;
      }
      Err(e) => self.set_error(format!("{:#}", e)),
    }
  }

  fn current_gallery_id(&self) -> Result<String> {
    self.view.as_ref().map(|v| v.gallery_id().to_string()).ok_or_else(|| anyhow!("No gallery open"))
  }

  fn start_prompt_write(&mut self, kind: PromptKind, line: &str) -> Result<()> {
    let service = self.service.clone();
    match kind {
      PromptKind::NewGallery => {
        let form = parse_gallery_form(line)?;
        let session = self.session.clone();
        self.spawn_write(format!("Creating '{}'…", form.name), async move {
          let gallery = service.create_gallery(&session, form).await.context("Failed to create gallery")?;
          Ok(WriteOutcome::GalleryCreated(gallery))
        });
      }
      PromptKind::AddVideo => {
        let form = parse_video_form(line)?;
        let gallery_id = self.current_gallery_id()?;
        self.spawn_write(format!("Adding '{}'…", form.title), async move {
          let video = service.add_video(&gallery_id, form).await.context("Failed to add video")?;
          Ok(WriteOutcome::Message(format!("Added '{}'", video.title)))
        });
      }
      PromptKind::RenameVideo { video_id } => {
        if line.is_empty() {
          return Err(anyhow!("Title is required"));
        }
        let patch = VideoPatch { title: Some(line.to_string()), ..Default::default() };
        self.spawn_write("Renaming…".to_string(), async move {
          let video = service.update_video(&video_id, patch).await.context("Failed to rename video")?;
          Ok(WriteOutcome::Message(format!("Renamed to '{}'", video.title)))
        });
      }
      PromptKind::AddTagGroup => {
        let gallery_id = self.current_gallery_id()?;
        let name = line.to_string();
        self.spawn_write(format!("Adding group '{}'…", name), async move {
          let group = service.add_tag_group(&gallery_id, &name).await.context("Failed to add tag group")?;
          Ok(WriteOutcome::Message(format!("Added group '{}'", group.name)))
        });
      }
      PromptKind::AddTag { group_id, group } => {
        let tag = line.to_string();
        self.spawn_write(format!("Adding '{}' to {}…", tag, group), async move {
          service.add_tag(&group_id, &tag).await.context("Failed to add tag")?;
          Ok(WriteOutcome::Message(format!("Added '{}' to {}", tag, group)))
        });
      }
    }
    Ok(())
  }

  pub fn open_confirm(&mut self, kind: ConfirmKind) {
    self.return_mode = self.mode;
    self.confirm = Some(kind);
    self.mode = AppMode::Confirm;
  }

  pub fn cancel_confirm(&mut self) {
    self.confirm = None;
    self.mode = self.return_mode;
  }

  pub fn accept_confirm(&mut self) {
    let Some(kind) = self.confirm.take() else { return };
    self.mode = self.return_mode;
    let service = self.service.clone();
    match kind {
      ConfirmKind::DeleteVideo { video_id, title } => {
        self.spawn_write(format!("Deleting '{}'…", title), async move {
          service.delete_video(&video_id).await.context("Failed to delete video")?;
          Ok(WriteOutcome::Message(format!("Deleted '{}'", title)))
        });
      }
      ConfirmKind::DeleteTagGroup { group_id, name } => {
        self.spawn_write(format!("Deleting group '{}'…", name), async move {
          service.delete_tag_group(&group_id).await.context("Failed to delete tag group")?;
          Ok(WriteOutcome::Message(format!("Deleted group '{}'", name)))
        });
      }
      ConfirmKind::RemoveTag { group_id, tag } => {
        self.spawn_write(format!("Removing '{}'…", tag), async move {
          service.remove_tag(&group_id, &tag).await.context("Failed to remove tag")?;
          Ok(WriteOutcome::Message(format!("Removed '{}'", tag)))
        });
      }
    }
  }

  // --- Owner actions ---

  fn require_owner(&mut self) -> bool {
    if !self.is_owner {
      self.set_error("Only the gallery owner can manage it.".to_string());
    }
    self.is_owner
  }

  pub fn open_manage(&mut self) {
    if self.require_owner() {
      self.manage_list.select(Some(0));
      self.mode = AppMode::Manage;
    }
  }

  pub fn open_tag_management(&mut self) {
    let Ok(id) = self.current_gallery_id() else { return };
    if self.require_owner() {
      self.navigate(Route::ManageTags { id });
    }
  }

  pub fn prompt_new_gallery(&mut self) {
    if !self.session.is_signed_in() {
      self.set_error("Sign in to create galleries.".to_string());
      return;
    }
    self.open_prompt(PromptKind::NewGallery, String::new());
  }

  pub fn prompt_add_video(&mut self) {
    if self.require_owner() {
      self.open_prompt(PromptKind::AddVideo, String::new());
    }
  }

  pub fn prompt_rename_video(&mut self) {
    let Some(video) = self.selected_managed_video() else { return };
    let (video_id, title) = (video.id.clone(), video.title.clone());
    if self.require_owner() {
      self.open_prompt(PromptKind::RenameVideo { video_id }, title);
    }
  }

  pub fn confirm_delete_video(&mut self) {
    let Some(video) = self.selected_managed_video() else { return };
    let kind = ConfirmKind::DeleteVideo { video_id: video.id.clone(), title: video.title.clone() };
    if self.require_owner() {
      self.open_confirm(kind);
    }
  }

  pub fn prompt_add_group(&mut self) {
    if self.require_owner() {
      self.open_prompt(PromptKind::AddTagGroup, String::new());
    }
  }

  pub fn prompt_add_tag(&mut self) {
    let Some(group) = self.selected_group() else { return };
    let kind = PromptKind::AddTag { group_id: group.id.clone(), group: group.name.clone() };
    if self.require_owner() {
      self.open_prompt(kind, String::new());
    }
  }

  pub fn confirm_remove_tag(&mut self) {
    let Some(group) = self.selected_group() else { return };
    let Some(tag) = group.tags.get(self.tag_cursor) else { return };
    let kind = ConfirmKind::RemoveTag { group_id: group.id.clone(), tag: tag.clone() };
    if self.require_owner() {
      self.open_confirm(kind);
    }
  }

  pub fn confirm_delete_group(&mut self) {
    let Some(group) = self.selected_group() else { return };
    let kind = ConfirmKind::DeleteTagGroup { group_id: group.id.clone(), name: group.name.clone() };
    if self.require_owner() {
      self.open_confirm(kind);
    }
  }

  pub fn step_tag_cursor(&mut self, forward: bool) {
    let count = self.selected_group().map_or(0, |g| g.tags.len());
    if count == 0 {
      self.tag_cursor = 0;
    } else if forward {
      self.tag_cursor = (self.tag_cursor + 1) % count;
    } else {
      self.tag_cursor = if self.tag_cursor == 0 { count - 1 } else { self.tag_cursor - 1 };
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{Category, Visibility, VideoTags};
  use crate::store::{MemoryStore, Seed};
  use chrono::{Duration as ChronoDuration, Utc};
  use std::sync::Arc;
  use std::time::Duration;

  fn gallery(id: &str, owner: &str, visibility: Visibility) -> Gallery {
    Gallery {
      id: id.into(),
      user_id: owner.into(),
      name: format!("Gallery {id}"),
      description: String::new(),
      visibility,
      category: Category::Education,
      created_at: Utc::now(),
      updated_at: Utc::now(),
    }
  }

  fn video(n: i64, gallery_id: &str, title: &str, tags: &[(&str, &[&str])]) -> Video {
    let tags: VideoTags =
      tags.iter().map(|(g, ts)| (g.to_string(), ts.iter().map(|t| t.to_string()).collect())).collect();
    Video {
      id: format!("v{n}"),
      gallery_id: gallery_id.into(),
      title: title.into(),
      description: None,
      youtube_id: "dQw4w9WgXcQ".into(),
      tags: Some(tags),
      created_at: Utc::now() - ChronoDuration::minutes(n),
      updated_at: Utc::now(),
    }
  }

  fn seed() -> Seed {
    Seed {
      galleries: vec![gallery("g1", "alice", Visibility::Public), gallery("g2", "bob", Visibility::Private)],
      videos: vec![
        video(1, "g1", "Intro", &[("skill", &["passing"])]),
        video(2, "g1", "Drill A", &[("skill", &["shooting"])]),
        video(3, "g2", "Secret", &[]),
      ],
      tag_groups: vec![TagGroup {
        id: "tg1".into(),
        gallery_id: "g1".into(),
        name: "skill".into(),
        tags: vec!["passing".into(), "shooting".into()],
        created_at: Utc::now(),
        updated_at: Utc::now(),
      }],
      profiles: vec![Profile { id: "alice".into(), username: "alice_k".into() }],
    }
  }

  fn make_app(user: Option<&str>, start: Route) -> App {
    let service = GalleryService::new(Arc::new(MemoryStore::from_seed(seed())));
    let session = user.map(|u| Session::signed_in(u, None)).unwrap_or_default();
    let mut app = App::new(service, session, Config::default(), start);
    app.start();
    app
  }

  async fn settle(app: &mut App) {
    for _ in 0..200 {
      app.check_pending();
      if !app.has_pending() {
        return;
      }
      tokio::task::yield_now().await;
    }
    panic!("background tasks did not finish");
  }

  fn titles(app: &App) -> Vec<String> {
    let view = app.view.as_ref().unwrap();
    view.current_page().videos.iter().map(|v| v.title.clone()).collect()
  }

  #[tokio::test]
  async fn galleries_respect_visibility() {
    let mut anon = make_app(None, Route::Galleries);
    settle(&mut anon).await;
    let ids: Vec<&str> = anon.galleries.iter().map(|g| g.id.as_str()).collect();
    assert_eq!(ids, vec!["g1"]);

    let mut bob = make_app(Some("bob"), Route::Galleries);
    settle(&mut bob).await;
    assert_eq!(bob.galleries.len(), 2);
    bob.toggle_owned_filter();
    settle(&mut bob).await;
    assert_eq!(bob.galleries.len(), 1);
  }

  #[tokio::test]
  async fn link_restores_filter() {
    let mut app = make_app(None, Route::parse("vg://gallery/g1?search=drill").unwrap());
    settle(&mut app).await;
    assert_eq!(app.mode, AppMode::Gallery);
    assert_eq!(titles(&app), vec!["Drill A"]);
  }

  #[tokio::test]
  async fn filter_edits_replace_history_entry() {
    let mut app = make_app(None, Route::Galleries);
    settle(&mut app).await;
    app.open_selected_gallery();
    settle(&mut app).await;
    assert_eq!(app.history.len(), 2);

    app.tag_list.select(Some(0));
    app.toggle_selected_tag();
    assert_eq!(titles(&app), vec!["Intro"]);
    assert_eq!(app.history.len(), 2);
    assert!(app.share_link().contains("tags="));

    assert!(app.go_back());
    assert_eq!(app.mode, AppMode::Galleries);
  }

  #[tokio::test]
  async fn detail_and_missing_video() {
    let mut app = make_app(None, Route::gallery("g1"));
    settle(&mut app).await;
    app.video_list.select(Some(1));
    app.open_selected_video();
    assert_eq!(app.mode, AppMode::Video);
    assert_eq!(app.detail_video().unwrap().title, "Drill A");

    let mut missing = App::new(
      app.service.clone(),
      Session::anonymous(),
      Config::default(),
      Route::Video { gallery_id: "g1".into(), video_id: "nope".into() },
    );
    missing.start();
    settle(&mut missing).await;
    assert_eq!(missing.mode, AppMode::Video);
    assert!(missing.view.as_ref().is_some_and(|v| !v.is_loading()));
    assert!(missing.detail_video().is_none());
  }

  #[tokio::test]
  async fn private_gallery_hidden_from_others() {
    let mut app = make_app(None, Route::gallery("g2"));
    settle(&mut app).await;
    let view = app.view.as_ref().unwrap();
    assert!(matches!(view.load_state(), LoadState::Error(_)));
    assert!(view.videos().is_empty());
    assert!(app.last_error.is_some());

    let mut bob = make_app(Some("bob"), Route::gallery("g2"));
    settle(&mut bob).await;
    assert_eq!(titles(&bob), vec!["Secret"]);
  }

  #[tokio::test]
  async fn non_owner_cannot_manage() {
    let mut app = make_app(Some("bob"), Route::gallery("g1"));
    settle(&mut app).await;
    assert!(!app.is_owner);
    app.open_manage();
    assert_eq!(app.mode, AppMode::Gallery);
    assert!(app.last_error.is_some());
  }

  #[tokio::test]
  async fn owner_adds_and_deletes_video() {
    let mut app = make_app(Some("alice"), Route::gallery("g1"));
    settle(&mut app).await;
    assert!(app.is_owner);

    app.open_manage();
    assert_eq!(app.mode, AppMode::Manage);
    app.prompt_add_video();
    app.input = "Warm-up | https://youtu.be/dQw4w9WgXcQ | skill:passing".into();
    app.submit_prompt();
    assert_eq!(app.mode, AppMode::Manage);
    settle(&mut app).await;
    assert_eq!(app.view.as_ref().unwrap().videos().len(), 3);
    assert_eq!(app.info_message.as_deref(), Some("Added 'Warm-up'"));

    app.manage_list.select(Some(0));
    app.confirm_delete_video();
    assert_eq!(app.mode, AppMode::Confirm);
    app.accept_confirm();
    settle(&mut app).await;
    assert_eq!(app.mode, AppMode::Manage);
    assert_eq!(app.view.as_ref().unwrap().videos().len(), 2);
  }

  #[tokio::test]
  async fn invalid_prompt_stays_open() {
    let mut app = make_app(Some("alice"), Route::gallery("g1"));
    settle(&mut app).await;
    app.prompt_add_video();
    app.input = "No link here".into();
    app.submit_prompt();
    assert_eq!(app.mode, AppMode::Prompt);
    assert!(app.last_error.is_some());
    app.cancel_prompt();
    assert_eq!(app.mode, AppMode::Gallery);
  }

  #[tokio::test]
  async fn tag_group_changes_refetch() {
    let mut app = make_app(Some("alice"), Route::ManageTags { id: "g1".into() });
    settle(&mut app).await;
    app.prompt_add_group();
    app.input = "level".into();
    app.submit_prompt();
    settle(&mut app).await;
    let names: Vec<&str> = app.view.as_ref().unwrap().tag_groups().iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["level", "skill"]);
  }

  #[tokio::test]
  async fn signed_out_user_cannot_create_gallery() {
    let mut app = make_app(None, Route::Galleries);
    app.prompt_new_gallery();
    assert_eq!(app.mode, AppMode::Galleries);
    assert!(app.last_error.is_some());
  }

  #[tokio::test]
  async fn created_gallery_opens() {
    let mut app = make_app(Some("alice"), Route::Galleries);
    settle(&mut app).await;
    app.prompt_new_gallery();
    app.input = "Keeper drills | private | education".into();
    app.submit_prompt();
    settle(&mut app).await;
    assert_eq!(app.mode, AppMode::Gallery);
    assert_eq!(app.view.as_ref().unwrap().gallery().unwrap().name, "Keeper drills");
    assert!(app.is_owner);
  }

  #[tokio::test(start_paused = true)]
  async fn profile_refresh_on_focus_is_rate_limited() {
    let mut app = make_app(Some("alice"), Route::gallery("g1"));
    settle(&mut app).await;
    assert_eq!(app.session.display_name(), Some("alice_k"));

    app.on_focus_gained();
    assert!(app.tasks.profile_rx.is_none());
    assert!(app.tasks.gallery_rx.is_some());
    settle(&mut app).await;

    tokio::time::advance(Duration::from_secs(61)).await;
    app.on_focus_gained();
    assert!(app.tasks.profile_rx.is_some());
    settle(&mut app).await;
  }

  #[tokio::test(start_paused = true)]
  async fn errors_auto_dismiss() {
    let mut app = make_app(None, Route::Galleries);
    app.set_error("boom".into());
    tokio::time::advance(Duration::from_secs(4)).await;
    app.expire_error();
    assert!(app.last_error.is_some());
    tokio::time::advance(Duration::from_secs(1)).await;
    app.expire_error();
    assert!(app.last_error.is_none());
  }

  #[tokio::test(start_paused = true)]
  async fn failed_writes_wait_for_acknowledgment() {
    let mut app = make_app(None, Route::Galleries);
    app.set_write_error("Save failed: gone".into());
    tokio::time::advance(Duration::from_secs(30)).await;
    app.expire_error();
    assert!(app.error_needs_ack());
    assert!(app.acknowledge_error());
    assert!(app.last_error.is_none());

    app.set_error("timed".into());
    assert!(!app.acknowledge_error());
    assert!(app.last_error.is_some());
  }

  #[test]
  fn selection_wraps() {
    let mut state = ListState::default();
    step_selection(&mut state, 3, true);
    assert_eq!(state.selected(), Some(0));
    step_selection(&mut state, 3, false);
    assert_eq!(state.selected(), Some(2));
    step_selection(&mut state, 3, true);
    assert_eq!(state.selected(), Some(0));
    step_selection(&mut state, 0, true);
    assert_eq!(state.selected(), None);
  }
}
