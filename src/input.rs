use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::debug;

use crate::app::{App, AppMode, step_selection};
use crate::link::Route;
use crate::youtube::watch_url;

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

/// Apply a line-editing key to `app.input`. Returns true when the text changed.
fn edit_line(app: &mut App, key: KeyEvent) -> bool {
  match key.code {
    KeyCode::Char(c) => {
      let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
      app.input.insert(byte_idx, c);
      app.cursor_position += 1;
      true
    }
    KeyCode::Backspace => {
      if app.cursor_position > 0 {
        app.cursor_position -= 1;
        let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
        app.input.remove(byte_idx);
        true
      } else {
        false
      }
    }
    KeyCode::Delete => {
      if app.cursor_position < app.input.chars().count() {
        let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
        app.input.remove(byte_idx);
        true
      } else {
        false
      }
    }
    KeyCode::Left => {
      app.cursor_position = app.cursor_position.saturating_sub(1);
      false
    }
    KeyCode::Right => {
      if app.cursor_position < app.input.chars().count() {
        app.cursor_position += 1;
      }
      false
    }
    KeyCode::Home => {
      app.cursor_position = 0;
      false
    }
    KeyCode::End => {
      app.cursor_position = app.input.chars().count();
      false
    }
    _ => false,
  }
}

fn open_in_browser(app: &mut App, url: &str) {
  // Use platform-appropriate command to open URL in default browser.
  #[cfg(target_os = "macos")]
  let cmd = "open";
  #[cfg(not(target_os = "macos"))]
  let cmd = "xdg-open";
  match std::process::Command::new(cmd)
    .arg(url)
    .stdin(std::process::Stdio::null())
    .stdout(std::process::Stdio::null())
    .stderr(std::process::Stdio::null())
    .spawn()
  {
    Ok(mut child) => {
      // Reap the child in a background thread to avoid zombie processes.
      std::thread::spawn(move || {
        let _ = child.wait();
      });
    }
    Err(e) => {
      app.set_error(format!("Failed to open browser: {}", e));
    }
  }
}

// --- Event Handling ---

pub fn handle_key_event(app: &mut App, key: KeyEvent) {
  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
    app.should_quit = true;
    return;
  }

  if app.acknowledge_error() {
    return;
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('t') {
    app.next_theme();
    return;
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('o') {
    let video = match app.mode {
      AppMode::Video => app.detail_video(),
      AppMode::Gallery => app.selected_video(),
      AppMode::Manage => app.selected_managed_video(),
      _ => None,
    };
    if let Some(url) = video.map(|v| watch_url(&v.youtube_id)) {
      debug!(url = %url, "opening in browser");
      open_in_browser(app, &url);
    }
    return;
  }

  match app.mode {
    AppMode::Galleries => handle_galleries_key(app, key),
    AppMode::Gallery => handle_gallery_key(app, key),
    AppMode::Tags => handle_tags_key(app, key),
    AppMode::Search => handle_search_key(app, key),
    AppMode::Video => handle_video_key(app, key),
    AppMode::Manage => handle_manage_key(app, key),
    AppMode::ManageTags => handle_manage_tags_key(app, key),
    AppMode::Prompt => handle_prompt_key(app, key),
    AppMode::Confirm => handle_confirm_key(app, key),
  }
}

/// Leave a gallery screen: back through history, or to the gallery list when
/// the app was opened straight into this screen.
fn leave(app: &mut App) {
  if !app.go_back() {
    app.navigate(Route::Galleries);
  }
}

fn handle_galleries_key(app: &mut App, key: KeyEvent) {
  match key.code {
    KeyCode::Down | KeyCode::Char('j') => step_selection(&mut app.gallery_list, app.galleries.len(), true),
    KeyCode::Up | KeyCode::Char('k') => step_selection(&mut app.gallery_list, app.galleries.len(), false),
    KeyCode::Enter => app.open_selected_gallery(),
    KeyCode::Char('n') => app.prompt_new_gallery(),
    KeyCode::Char('o') => app.toggle_owned_filter(),
    KeyCode::Char('r') => app.trigger_galleries(),
    KeyCode::Char('y') => app.show_share_link(),
    KeyCode::Esc | KeyCode::Char('q') => app.should_quit = true,
    _ => {}
  }
}

fn handle_gallery_key(app: &mut App, key: KeyEvent) {
  let page_len = app.view.as_ref().map_or(0, |v| v.current_page().videos.len());
  match key.code {
    KeyCode::Down | KeyCode::Char('j') => step_selection(&mut app.video_list, page_len, true),
    KeyCode::Up | KeyCode::Char('k') => step_selection(&mut app.video_list, page_len, false),
    KeyCode::Enter => app.open_selected_video(),
    KeyCode::Tab | KeyCode::Char('t') => app.mode = AppMode::Tags,
    KeyCode::Char('/') => app.begin_search(),
    KeyCode::Char(']') | KeyCode::Right => app.change_page(true),
    KeyCode::Char('[') | KeyCode::Left => app.change_page(false),
    KeyCode::Char('+') => app.cycle_page_size(),
    KeyCode::Char('c') => app.clear_tags(),
    KeyCode::Char('r') => app.trigger_gallery_fetch(true),
    KeyCode::Char('y') => app.show_share_link(),
    KeyCode::Char('m') => app.open_manage(),
    KeyCode::Char('g') => app.open_tag_management(),
    KeyCode::Esc | KeyCode::Backspace => leave(app),
    _ => {}
  }
}

fn handle_tags_key(app: &mut App, key: KeyEvent) {
  let count = app.tag_entries().len();
  match key.code {
    KeyCode::Down | KeyCode::Char('j') => step_selection(&mut app.tag_list, count, true),
    KeyCode::Up | KeyCode::Char('k') => step_selection(&mut app.tag_list, count, false),
    KeyCode::Char(' ') | KeyCode::Enter => app.toggle_selected_tag(),
    KeyCode::Char('c') => app.clear_tags(),
    KeyCode::Char('/') => app.begin_search(),
    KeyCode::Tab | KeyCode::Esc | KeyCode::Char('t') => app.mode = AppMode::Gallery,
    _ => {}
  }
}

fn handle_search_key(app: &mut App, key: KeyEvent) {
  match key.code {
    KeyCode::Enter | KeyCode::Down => app.end_search(true),
    KeyCode::Esc => app.end_search(false),
    _ => {
      if edit_line(app, key) {
        app.update_search();
      }
    }
  }
}

fn handle_video_key(app: &mut App, key: KeyEvent) {
  match key.code {
    KeyCode::Char('y') => app.show_share_link(),
    KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('q') => leave(app),
    _ => {}
  }
}

fn handle_manage_key(app: &mut App, key: KeyEvent) {
  let count = app.view.as_ref().map_or(0, |v| v.videos().len());
  match key.code {
    KeyCode::Down | KeyCode::Char('j') => step_selection(&mut app.manage_list, count, true),
    KeyCode::Up | KeyCode::Char('k') => step_selection(&mut app.manage_list, count, false),
    KeyCode::Char('a') => app.prompt_add_video(),
    KeyCode::Char('e') => app.prompt_rename_video(),
    KeyCode::Char('d') => app.confirm_delete_video(),
    KeyCode::Char('g') => app.open_tag_management(),
    KeyCode::Esc => app.mode = AppMode::Gallery,
    _ => {}
  }
}

fn handle_manage_tags_key(app: &mut App, key: KeyEvent) {
  let count = app.view.as_ref().map_or(0, |v| v.tag_groups().len());
  match key.code {
    KeyCode::Down | KeyCode::Char('j') => {
      step_selection(&mut app.group_list, count, true);
      app.tag_cursor = 0;
    }
    KeyCode::Up | KeyCode::Char('k') => {
      step_selection(&mut app.group_list, count, false);
      app.tag_cursor = 0;
    }
    KeyCode::Right | KeyCode::Char('l') => app.step_tag_cursor(true),
    KeyCode::Left | KeyCode::Char('h') => app.step_tag_cursor(false),
    KeyCode::Char('a') => app.prompt_add_group(),
    KeyCode::Char('t') => app.prompt_add_tag(),
    KeyCode::Char('x') => app.confirm_remove_tag(),
    KeyCode::Char('D') => app.confirm_delete_group(),
    KeyCode::Char('y') => app.show_share_link(),
    KeyCode::Esc | KeyCode::Char('q') => leave(app),
    _ => {}
  }
}

fn handle_prompt_key(app: &mut App, key: KeyEvent) {
  app.clear_error();
  match key.code {
    KeyCode::Enter => app.submit_prompt(),
    KeyCode::Esc => app.cancel_prompt(),
    _ => {
      edit_line(app, key);
    }
  }
}

fn handle_confirm_key(app: &mut App, key: KeyEvent) {
  match key.code {
    KeyCode::Char('y') | KeyCode::Char('Y') => app.accept_confirm(),
    KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.cancel_confirm(),
    _ => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Config;
  use crate::service::GalleryService;
  use crate::session::Session;
  use crate::store::MemoryStore;
  use std::sync::Arc;

  // --- char_to_byte_index ---

  #[test]
  fn char_to_byte_ascii() {
    assert_eq!(char_to_byte_index("hello", 0), 0);
    assert_eq!(char_to_byte_index("hello", 3), 3);
    assert_eq!(char_to_byte_index("hello", 5), 5); // past end
  }

  #[test]
  fn char_to_byte_multibyte() {
    let s = "aé日"; // a=1 byte, é=2 bytes, 日=3 bytes
    assert_eq!(char_to_byte_index(s, 0), 0);
    assert_eq!(char_to_byte_index(s, 1), 1);
    assert_eq!(char_to_byte_index(s, 2), 3);
    assert_eq!(char_to_byte_index(s, 3), 6);
  }

  #[test]
  fn char_to_byte_empty() {
    assert_eq!(char_to_byte_index("", 0), 0);
    assert_eq!(char_to_byte_index("", 5), 0);
  }

  // --- key handling ---

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn empty_app(start: Route) -> App {
    let service = GalleryService::new(Arc::new(MemoryStore::new()));
    let mut app = App::new(service, Session::anonymous(), Config::default(), start);
    app.start();
    app
  }

  #[tokio::test]
  async fn search_box_edits_and_syncs_link() {
    let mut app = empty_app(Route::gallery("g1"));
    handle_key_event(&mut app, key(KeyCode::Char('/')));
    assert_eq!(app.mode, AppMode::Search);
    for c in "drilé".chars() {
      handle_key_event(&mut app, key(KeyCode::Char(c)));
    }
    handle_key_event(&mut app, key(KeyCode::Backspace));
    handle_key_event(&mut app, key(KeyCode::Char('l')));
    handle_key_event(&mut app, key(KeyCode::Enter));
    assert_eq!(app.mode, AppMode::Gallery);
    assert_eq!(app.view.as_ref().unwrap().search(), "drill");
    assert_eq!(app.share_link(), "vg://gallery/g1?search=drill");
  }

  #[tokio::test]
  async fn escape_clears_search() {
    let mut app = empty_app(Route::gallery("g1"));
    handle_key_event(&mut app, key(KeyCode::Char('/')));
    handle_key_event(&mut app, key(KeyCode::Char('x')));
    handle_key_event(&mut app, key(KeyCode::Esc));
    assert_eq!(app.view.as_ref().unwrap().search(), "");
    assert_eq!(app.share_link(), "vg://gallery/g1");
  }

  #[tokio::test]
  async fn leaving_linked_gallery_goes_to_list() {
    let mut app = empty_app(Route::gallery("g1"));
    handle_key_event(&mut app, key(KeyCode::Esc));
    assert_eq!(app.mode, AppMode::Galleries);
    assert!(!app.should_quit);
    handle_key_event(&mut app, key(KeyCode::Char('q')));
    assert!(app.should_quit);
  }

  #[tokio::test]
  async fn ctrl_c_quits_from_prompt() {
    let mut app = empty_app(Route::Galleries);
    app.session = Session::signed_in("alice", None);
    handle_key_event(&mut app, key(KeyCode::Char('n')));
    assert_eq!(app.mode, AppMode::Prompt);
    handle_key_event(&mut app, KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
    assert!(app.should_quit);
  }
}
