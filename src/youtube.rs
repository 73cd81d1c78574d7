use reqwest::Url;

use crate::constants::constants;

/// YouTube ids are 11 chars of `[A-Za-z0-9_-]`.
fn is_video_id(s: &str) -> bool {
  s.len() == 11 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Extract a video id from a bare id or any of the common YouTube URL shapes:
/// `watch?v=`, `youtu.be/<id>`, `/embed/<id>`, `/shorts/<id>`, `/live/<id>`.
pub fn parse_video_id(input: &str) -> Option<String> {
  let trimmed = input.trim();
  if is_video_id(trimmed) {
    return Some(trimmed.to_string());
  }

  let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
    trimmed.to_string()
  } else {
    format!("https://{trimmed}")
  };
  let url = Url::parse(&with_scheme).ok()?;
  let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");

  let candidate = match host {
    "youtu.be" => url.path_segments()?.next().map(str::to_string),
    "youtube.com" | "youtube-nocookie.com" | "music.youtube.com" => {
      let mut segments = url.path_segments()?;
      match segments.next() {
        Some("watch") => url.query_pairs().find(|(k, _)| k == "v").map(|(_, v)| v.into_owned()),
        Some("embed" | "shorts" | "live" | "v") => segments.next().map(str::to_string),
        _ => None,
      }
    }
    _ => None,
  }?;

  is_video_id(&candidate).then_some(candidate)
}

pub fn watch_url(video_id: &str) -> String {
  format!("{}{}", constants().watch_url_prefix, video_id)
}

pub fn thumbnail_url(video_id: &str) -> String {
  constants().thumbnail_url_template.replace("{id}", video_id)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bare_id() {
    assert_eq!(parse_video_id("dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
    assert_eq!(parse_video_id("  dQw4w9WgXcQ ").as_deref(), Some("dQw4w9WgXcQ"));
  }

  #[test]
  fn url_shapes() {
    for input in [
      "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
      "https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
      "youtube.com/watch?v=dQw4w9WgXcQ",
      "https://m.youtube.com/watch?v=dQw4w9WgXcQ&t=42",
      "https://youtu.be/dQw4w9WgXcQ?si=abc",
      "https://www.youtube.com/embed/dQw4w9WgXcQ",
      "https://www.youtube.com/shorts/dQw4w9WgXcQ",
      "https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ",
    ] {
      assert_eq!(parse_video_id(input).as_deref(), Some("dQw4w9WgXcQ"), "{input}");
    }
  }

  #[test]
  fn rejects_non_videos() {
    for input in [
      "",
      "short",
      "https://vimeo.com/123456789",
      "https://www.youtube.com/@channel",
      "https://www.youtube.com/watch?list=PL123",
      "https://youtu.be/toolongtobeanid",
    ] {
      assert_eq!(parse_video_id(input), None, "{input}");
    }
  }

  #[test]
  fn urls_from_id() {
    assert_eq!(watch_url("dQw4w9WgXcQ"), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    assert_eq!(thumbnail_url("dQw4w9WgXcQ"), "https://img.youtube.com/vi/dQw4w9WgXcQ/0.jpg");
  }
}
