use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Rect},
  style::{Modifier, Style, Stylize},
  text::{Line, Span},
  widgets::{Block, BorderType, List, ListItem, Padding, Paragraph, Wrap},
};

use crate::app::{App, AppMode};
use crate::gallery_view::LoadState;
use crate::model::Video;
use crate::theme::Theme;
use crate::youtube::{thumbnail_url, watch_url};

// --- Helpers ---

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  use unicode_width::UnicodeWidthChar;
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate a string to `max_width` characters, appending "…" if truncated.
fn truncate_str(s: &str, max_width: usize) -> String {
  if s.chars().count() <= max_width {
    s.to_string()
  } else {
    let truncated: String = s.chars().take(max_width.saturating_sub(1)).collect();
    format!("{}…", truncated)
  }
}

/// All tags of a video in group order, comma separated.
fn tag_summary(video: &Video) -> String {
  video.tags.as_ref().map(|tags| tags.values().flatten().cloned().collect::<Vec<_>>().join(", ")).unwrap_or_default()
}

fn panel<'a>(theme: &Theme, title: impl Into<Line<'a>>, focused: bool) -> Block<'a> {
  let color = if focused { theme.accent } else { theme.border };
  Block::bordered()
    .title(title)
    .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(color))
}

/// Title on the left, muted metadata flush right, within `inner_w` columns.
fn row_line(theme: &Theme, title: &str, right: &str, inner_w: usize, fg: ratatui::style::Color) -> Line<'static> {
  if right.is_empty() {
    return Line::from(Span::styled(truncate_str(title, inner_w), Style::default().fg(fg)));
  }
  let right = truncate_str(right, inner_w / 2);
  let right_w = right.chars().count();
  let title = truncate_str(title, inner_w.saturating_sub(right_w + 2));
  let gap = inner_w.saturating_sub(title.chars().count() + right_w);
  Line::from(vec![
    Span::styled(title, Style::default().fg(fg)),
    Span::raw(" ".repeat(gap)),
    Span::styled(right, Style::default().fg(theme.muted)),
  ])
}

fn centered_message(frame: &mut Frame, block: Block, theme: &Theme, lines: Vec<(String, bool)>, area: Rect) {
  let mut text = vec![Line::from("")];
  for (line, strong) in lines {
    let style = if strong {
      Style::default().fg(theme.fg).add_modifier(Modifier::BOLD)
    } else {
      Style::default().fg(theme.muted)
    };
    text.push(Line::from(Span::styled(line, style)));
  }
  frame.render_widget(Paragraph::new(text).alignment(Alignment::Center).block(block), area);
}

// --- UI Rendering ---

pub fn ui(frame: &mut Frame, app: &mut App) {
  let theme = app.theme();

  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), frame.area());

  let [header_area, main_area, status_area, input_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Min(3),
    Constraint::Length(1),
    Constraint::Length(3),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, app, header_area);
  render_main(frame, app, main_area);
  render_status(frame, app, status_area);
  render_input(frame, app, input_area);
  render_footer(frame, app, footer_area);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let mut spans = vec![Span::styled(" ▶ vg ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))];
  if app.mode != AppMode::Galleries
    && let Some(gallery) = app.view.as_ref().and_then(|v| v.gallery())
  {
    spans.push(Span::styled(format!("/ {} ", gallery.name), Style::default().fg(theme.fg)));
  }
  frame.render_widget(Line::from(spans), area);

  let who = app.session.display_name().unwrap_or("guest");
  let right_text = format!("{} · v{} ", who, env!("CARGO_PKG_VERSION"));
  let width = right_text.chars().count() as u16;
  let right = Line::from(Span::styled(right_text, Style::default().fg(theme.muted)));
  let right_area = Rect { x: area.x + area.width.saturating_sub(width), width: width.min(area.width), ..area };
  frame.render_widget(right, right_area);
}

fn render_main(frame: &mut Frame, app: &mut App, area: Rect) {
  let mode = match app.mode {
    AppMode::Prompt | AppMode::Confirm => app.return_mode(),
    mode => mode,
  };
  match mode {
    AppMode::Gallery | AppMode::Tags | AppMode::Search => render_gallery(frame, app, area),
    AppMode::Video => render_video(frame, app, area),
    AppMode::Manage => render_manage(frame, app, area),
    AppMode::ManageTags => render_manage_tags(frame, app, area),
    AppMode::Galleries | AppMode::Prompt | AppMode::Confirm => render_galleries(frame, app, area),
  }
}

fn render_galleries(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let inner_w = area.width.saturating_sub(4) as usize;
  let mut title = if app.only_owned { " My galleries ".to_string() } else { " Galleries ".to_string() };
  if app.galleries_loading {
    title.push_str("(loading…) ");
  }
  let block = panel(theme, title, true);

  if app.galleries.is_empty() {
    let mut lines = vec![(
      if app.galleries_loading { "Loading galleries…" } else { "No galleries to show." }.to_string(),
      true,
    )];
    if app.session.is_signed_in() {
      lines.push(("Press n to create one.".to_string(), false));
    } else {
      lines.push(("Private galleries appear once you are signed in.".to_string(), false));
    }
    centered_message(frame, block, theme, lines, area);
    return;
  }

  let selected = app.gallery_list.selected();
  let items: Vec<ListItem> = app
    .galleries
    .iter()
    .enumerate()
    .map(|(i, g)| {
      let is_selected = Some(i) == selected;
      let fg = if is_selected { theme.highlight_fg } else { theme.fg };
      let bg = if i % 2 == 1 { theme.stripe_bg } else { theme.bg };
      let mine = app.session.owns(g);
      let right = format!("{}{} · {}", if mine { "mine · " } else { "" }, g.category.label(), g.visibility.label());
      let mut lines = vec![row_line(theme, &g.name, &right, inner_w, fg)];
      if !g.description.is_empty() {
        let text = truncate_str(&g.description, inner_w.saturating_sub(2));
        lines.push(Line::from(Span::styled(format!("  {}", text), Style::default().fg(theme.muted))));
      }
      ListItem::new(lines).bg(bg)
    })
    .collect();

  let list = List::new(items)
    .block(block)
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));
  frame.render_stateful_widget(list, area, &mut app.gallery_list);
}

fn render_gallery(frame: &mut Frame, app: &mut App, area: Rect) {
  let [tags_area, videos_area] =
    Layout::horizontal([Constraint::Percentage(28), Constraint::Percentage(72)]).areas(area);
  render_tag_pane(frame, app, tags_area);
  render_videos(frame, app, videos_area);
}

fn render_tag_pane(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let focused = app.mode == AppMode::Tags;
  let Some(view) = app.view.as_ref() else { return };
  let active = view.active();
  let title = if active.is_empty() { " Tags ".to_string() } else { format!(" Tags ({}) ", active.count()) };
  let block = panel(theme, title, focused);

  let entries = app.tag_entries();
  if entries.is_empty() {
    let msg = if view.is_loading() { "Loading…" } else { "No tags defined." };
    centered_message(frame, block, theme, vec![(msg.to_string(), false)], area);
    return;
  }

  let inner_w = area.width.saturating_sub(4) as usize;
  let items: Vec<ListItem> = entries
    .iter()
    .map(|(group, tag)| {
      let on = active.is_active(group, tag);
      let (marker, color) = if on { ("● ", theme.tag_on) } else { ("○ ", theme.muted) };
      let tag_w = inner_w.saturating_sub(group.chars().count() + 5);
      ListItem::new(Line::from(vec![
        Span::styled(marker, Style::default().fg(color)),
        Span::styled(truncate_str(tag, tag_w), Style::default().fg(if on { theme.tag_on } else { theme.fg })),
        Span::styled(format!("  {}", group), Style::default().fg(theme.muted)),
      ]))
    })
    .collect();

  let list = List::new(items).block(block);
  if focused {
    let list = list
      .highlight_symbol("▶ ")
      .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));
    frame.render_stateful_widget(list, area, &mut app.tag_list);
  } else {
    frame.render_widget(list, area);
  }
}

fn render_videos(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let focused = app.mode == AppMode::Gallery;
  let Some(view) = app.view.as_ref() else { return };
  let page = view.current_page();
  let name = view.gallery().map_or("Gallery", |g| g.name.as_str());
  let title = format!(" {} · page {}/{} · {} per page ", name, page.number, page.total_pages.max(1), view.per_page());

  if page.videos.is_empty() {
    let block = panel(theme, title, focused);
    let lines = match view.load_state() {
      LoadState::Loading => vec![("Loading videos…".to_string(), true)],
      LoadState::Error(e) => vec![("Could not load this gallery.".to_string(), true), (e.clone(), false)],
      LoadState::Ready if view.videos().is_empty() => vec![("No videos in this gallery yet.".to_string(), true)],
      LoadState::Ready => vec![
        ("No videos match the current filter.".to_string(), true),
        ("c clears tags, / edits the search.".to_string(), false),
      ],
    };
    centered_message(frame, block, theme, lines, area);
    return;
  }

  let inner_w = area.width.saturating_sub(4) as usize;
  let selected = app.video_list.selected();
  let items: Vec<ListItem> = page
    .videos
    .iter()
    .enumerate()
    .map(|(i, video)| {
      let is_selected = focused && Some(i) == selected;
      let fg = if is_selected { theme.highlight_fg } else { theme.fg };
      let bg = if i % 2 == 1 { theme.stripe_bg } else { theme.bg };
      ListItem::new(row_line(theme, &video.title, &tag_summary(video), inner_w, fg)).bg(bg)
    })
    .collect();

  let showing = format!(
    " Showing {}-{} of {}{} ",
    page.start + 1,
    page.start + page.videos.len(),
    page.total_matches,
    if view.is_loading() { " · refreshing…" } else { "" }
  );
  let block = panel(theme, title, focused).title_bottom(Line::from(Span::styled(showing, theme.muted)).right_aligned());
  let list = List::new(items).block(block);
  if focused {
    let list = list
      .highlight_symbol("▶ ")
      .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));
    frame.render_stateful_widget(list, area, &mut app.video_list);
  } else {
    frame.render_widget(list, area);
  }
}

fn render_video(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let Some(video) = app.detail_video() else {
    let loading = app.view.as_ref().is_some_and(|v| v.is_loading());
    let block = panel(theme, " Video ", true);
    let lines = if loading {
      vec![("Loading…".to_string(), true)]
    } else {
      vec![
        ("Video not found".to_string(), true),
        ("It is not part of this gallery, or it was deleted.".to_string(), false),
        ("Esc to go back.".to_string(), false),
      ]
    };
    centered_message(frame, block, theme, lines, area);
    return;
  };

  let inner_w = area.width.saturating_sub(4) as usize;
  let label = |name: &'static str| Span::styled(format!("{:<11}", name), Style::default().fg(theme.muted));
  let mut lines = vec![
    Line::from(""),
    Line::from(Span::styled(
      truncate_str(&video.title, inner_w),
      Style::default().fg(theme.fg).add_modifier(Modifier::BOLD),
    )),
    Line::from(""),
    Line::from(vec![
      label("Watch"),
      Span::styled(watch_url(&video.youtube_id), Style::default().fg(theme.accent).add_modifier(Modifier::UNDERLINED)),
    ]),
    Line::from(vec![label("Thumbnail"), Span::styled(thumbnail_url(&video.youtube_id), theme.fg)]),
    Line::from(vec![label("Added"), Span::styled(video.created_at.format("%Y-%m-%d %H:%M").to_string(), theme.fg)]),
  ];
  if video.updated_at != video.created_at {
    lines.push(Line::from(vec![
      label("Updated"),
      Span::styled(video.updated_at.format("%Y-%m-%d %H:%M").to_string(), theme.fg),
    ]));
  }
  if let Some(tags) = video.tags.as_ref().filter(|t| !t.is_empty()) {
    lines.push(Line::from(""));
    for (group, names) in tags {
      lines.push(Line::from(vec![label("Tags"), Span::styled(format!("{}: {}", group, names.join(", ")), theme.fg)]));
    }
  }
  if let Some(description) = video.description.as_deref().filter(|d| !d.is_empty()) {
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(description.to_string(), theme.fg)));
  }

  let block = panel(theme, " Video ", true).padding(Padding::horizontal(1));
  let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false }).block(block);
  frame.render_widget(paragraph, area);
}

fn render_manage(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let Some(view) = app.view.as_ref() else { return };
  let name = view.gallery().map_or("Gallery", |g| g.name.as_str());
  let title = format!(" Manage {} · {} videos ", name, view.videos().len());
  let block = panel(theme, title, true);

  if view.videos().is_empty() {
    centered_message(frame, block, theme, vec![("No videos yet. Press a to add one.".to_string(), false)], area);
    return;
  }

  let inner_w = area.width.saturating_sub(4) as usize;
  let selected = app.manage_list.selected();
  let items: Vec<ListItem> = view
    .videos()
    .iter()
    .enumerate()
    .map(|(i, video)| {
      let fg = if Some(i) == selected { theme.highlight_fg } else { theme.fg };
      let bg = if i % 2 == 1 { theme.stripe_bg } else { theme.bg };
      let right = format!("{}  {}", tag_summary(video), video.youtube_id);
      ListItem::new(row_line(theme, &video.title, right.trim(), inner_w, fg)).bg(bg)
    })
    .collect();

  let list = List::new(items)
    .block(block)
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));
  frame.render_stateful_widget(list, area, &mut app.manage_list);
}

fn render_manage_tags(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let [groups_area, tags_area] =
    Layout::horizontal([Constraint::Percentage(35), Constraint::Percentage(65)]).areas(area);
  let Some(view) = app.view.as_ref() else { return };

  if !app.is_owner {
    let lines = if view.is_loading() {
      vec![("Loading…".to_string(), true)]
    } else {
      vec![("Only the gallery owner can manage tags.".to_string(), true)]
    };
    centered_message(frame, panel(theme, " Tag groups ", true), theme, lines, area);
    return;
  }

  let groups_block = panel(theme, " Tag groups ", true);
  if view.tag_groups().is_empty() {
    centered_message(frame, groups_block, theme, vec![("No groups. Press a to add one.".to_string(), false)], area);
    return;
  }

  let inner_w = groups_area.width.saturating_sub(4) as usize;
  let items: Vec<ListItem> = view
    .tag_groups()
    .iter()
    .map(|g| ListItem::new(row_line(theme, &g.name, &g.tags.len().to_string(), inner_w, theme.fg)))
    .collect();
  let selected_group = app.group_list.selected().and_then(|i| view.tag_groups().get(i)).cloned();
  let list = List::new(items)
    .block(groups_block)
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));
  frame.render_stateful_widget(list, groups_area, &mut app.group_list);

  let Some(group) = selected_group else { return };
  let mut spans = Vec::new();
  for (i, tag) in group.tags.iter().enumerate() {
    let style = if i == app.tag_cursor {
      Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD)
    } else {
      Style::default().fg(theme.fg).bg(theme.stripe_bg)
    };
    spans.push(Span::styled(format!(" {} ", tag), style));
    spans.push(Span::raw(" "));
  }
  let mut lines = vec![Line::from("")];
  if spans.is_empty() {
    lines.push(Line::from(Span::styled("No tags in this group. Press t to add one.", theme.muted)));
  } else {
    lines.push(Line::from(spans));
  }
  lines.push(Line::from(""));
  lines.push(Line::from(Span::styled("Removing a tag or group leaves existing videos untouched.", theme.muted)));
  let paragraph = Paragraph::new(lines)
    .wrap(Wrap { trim: false })
    .block(panel(theme, format!(" {} ", group.name), false).padding(Padding::horizontal(1)));
  frame.render_widget(paragraph, tags_area);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let (text, style) = if let Some(msg) = &app.status_message {
    (format!(" ⏳ {}", msg), Style::default().fg(theme.status))
  } else if let Some(err) = &app.last_error {
    let hint = if app.error_needs_ack() { "  (press any key)" } else { "" };
    (format!(" ⚠  {}{}", err, hint), Style::default().fg(theme.error))
  } else if let Some(info) = &app.info_message {
    (format!(" ℹ  {}", info), Style::default().fg(theme.status))
  } else if app.has_pending() {
    (" ⏳ Loading…".to_string(), Style::default().fg(theme.status))
  } else {
    (" Ready".to_string(), Style::default().fg(theme.muted))
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_input(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let editing = matches!(app.mode, AppMode::Search | AppMode::Prompt);
  let title = match app.mode {
    AppMode::Search => " Search titles ".to_string(),
    AppMode::Prompt => app.prompt.as_ref().map(|p| p.title()).unwrap_or_default(),
    AppMode::Confirm => " Confirm ".to_string(),
    _ => " Link ".to_string(),
  };
  let border_color = if editing || app.mode == AppMode::Confirm { theme.accent } else { theme.border };
  let input_block = Block::bordered()
    .title(title)
    .title_style(Style::default().fg(border_color))
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(border_color))
    .padding(Padding::horizontal(1));

  let inner_w = area.width.saturating_sub(4) as usize;

  if !editing {
    let (text, style) = match app.mode {
      AppMode::Confirm => (
        app.confirm.as_ref().map(|c| format!("{}  (y/n)", c.question())).unwrap_or_default(),
        Style::default().fg(theme.error),
      ),
      _ => (app.share_link(), Style::default().fg(theme.muted)),
    };
    frame.render_widget(Paragraph::new(truncate_str(&text, inner_w)).style(style).block(input_block), area);
    return;
  }

  let cursor_col = display_width(&app.input, app.cursor_position);

  if cursor_col < app.input_scroll {
    app.input_scroll = cursor_col;
  } else if cursor_col >= app.input_scroll + inner_w {
    app.input_scroll = cursor_col.saturating_sub(inner_w) + 1;
  }

  let visible: String = app
    .input
    .chars()
    .scan(0usize, |col, c| {
      let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= app.input_scroll)
    .take_while(|(start, _, _)| *start < app.input_scroll + inner_w)
    .map(|(_, _, c)| c)
    .collect();

  let paragraph = Paragraph::new(visible).style(Style::default().fg(theme.fg)).block(input_block);
  frame.render_widget(paragraph, area);

  let cursor_x = area.x + 2 + (cursor_col - app.input_scroll) as u16;
  frame.set_cursor_position((cursor_x, area.y + 1));
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let owner = app.is_owner;
  let keys: Vec<(&str, &str)> = match app.mode {
    AppMode::Galleries => {
      let mut k = vec![("Enter", "Open"), ("j/k", "Navigate"), ("r", "Refresh")];
      if app.session.is_signed_in() {
        k.push(("n", "New"));
        k.push(("o", if app.only_owned { "All" } else { "Mine" }));
      }
      k.push(("q", "Quit"));
      k
    }
    AppMode::Gallery => {
      let mut k =
        vec![("Enter", "Details"), ("t", "Tags"), ("/", "Search"), ("[/]", "Page"), ("+", "Per page"), ("y", "Link")];
      if owner {
        k.push(("m", "Manage"));
      }
      k.push(("Esc", "Back"));
      k
    }
    AppMode::Tags => vec![("Space", "Toggle"), ("j/k", "Navigate"), ("c", "Clear"), ("Esc", "Videos")],
    AppMode::Search => vec![("Enter", "Done"), ("Esc", "Clear")],
    AppMode::Video => vec![("^o", "Open in browser"), ("y", "Link"), ("Esc", "Back")],
    AppMode::Manage => vec![("a", "Add"), ("e", "Rename"), ("d", "Delete"), ("g", "Tags"), ("Esc", "Back")],
    AppMode::ManageTags => vec![
      ("a", "Add group"),
      ("t", "Add tag"),
      ("h/l", "Tag"),
      ("x", "Remove tag"),
      ("D", "Delete group"),
      ("Esc", "Back"),
    ],
    AppMode::Prompt => vec![("Enter", "Save"), ("Esc", "Cancel")],
    AppMode::Confirm => vec![("y", "Yes"), ("n", "No")],
  };

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(theme.key_fg).bg(theme.key_bg)),
        Span::styled(format!(" {} ", action), Style::default().fg(theme.muted)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw("  "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);

  let theme_label = format!("{} ", theme.name);
  let right = Line::from(Span::styled(&theme_label, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(theme_label.len() as u16), width: theme_label.len() as u16, ..area };
  frame.render_widget(right, right_area);
}
