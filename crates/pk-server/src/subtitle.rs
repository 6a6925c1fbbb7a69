//! SubRip to WebVTT conversion.
//!
//! A pure whole-file transform: strip a UTF-8 BOM, normalise line endings,
//! prepend the `WEBVTT` signature, and rewrite only the cue timing lines
//! (`00:00:01,000 --> 00:00:02,000` becomes `00:00:01.000 --> 00:00:02.000`).
//! Cue numbers and text lines are left untouched, commas included.

use std::sync::OnceLock;

use regex::Regex;

/// WebVTT signature line plus the blank line that must follow it.
pub const VTT_HEADER: &str = "WEBVTT\n\n";

/// Content type served for converted tracks.
pub const VTT_CONTENT_TYPE: &str = "text/vtt; charset=utf-8";

/// Largest sidecar the subtitle route will read into memory.
pub const MAX_SUBTITLE_BYTES: u64 = 5 * 1024 * 1024;

fn timing_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*(\d{1,2}:\d{2}:\d{2})[,.](\d{1,3})\s*-->\s*(\d{1,2}:\d{2}:\d{2})[,.](\d{1,3})(.*)$",
        )
        .expect("valid regex")
    })
}

/// Strip a BOM and convert CRLF / lone CR to LF.
pub fn normalize_line_endings(input: &str) -> String {
    input
        .strip_prefix('\u{feff}')
        .unwrap_or(input)
        .replace("\r\n", "\n")
        .replace('\r', "\n")
}

/// Convert SubRip text to WebVTT.
pub fn srt_to_vtt(srt: &str) -> String {
    let normalized = normalize_line_endings(srt);
    let body = normalized.trim_start_matches('\n');

    let mut out = String::with_capacity(VTT_HEADER.len() + body.len());
    out.push_str(VTT_HEADER);

    for (i, line) in body.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&rewrite_timing(line));
    }

    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Pass a WebVTT file through with normalised line endings.
pub fn normalize_vtt(vtt: &str) -> String {
    let mut out = normalize_line_endings(vtt);
    if !out.starts_with("WEBVTT") {
        out.insert_str(0, VTT_HEADER);
    }
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn rewrite_timing(line: &str) -> std::borrow::Cow<'_, str> {
    let re = timing_regex();
    if !re.is_match(line) {
        return line.into();
    }
    re.replace(line, |caps: &regex::Captures<'_>| {
        format!(
            "{}.{:0<3} --> {}.{:0<3}{}",
            &caps[1], &caps[2], &caps[3], &caps[4], &caps[5]
        )
    })
}
