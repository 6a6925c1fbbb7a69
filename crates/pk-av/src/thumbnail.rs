//! Single-frame JPEG extraction via ffmpeg.

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::command::ToolCommand;
use crate::tools::ToolRegistry;

const THUMBNAIL_WIDTH: u32 = 320;
const THUMBNAIL_HEIGHT: u32 = 180;
const THUMBNAIL_TIMEOUT: Duration = Duration::from_secs(20);

/// Default seek position when the caller gives none.
pub const DEFAULT_THUMBNAIL_TIME: &str = "00:00:10";

fn time_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:\d{1,2}:[0-5]\d:[0-5]\d(?:\.\d{1,3})?|\d+(?:\.\d+)?)$")
            .expect("valid regex")
    })
}

/// Accepts `HH:MM:SS[.fff]` or a plain number of seconds.
pub fn validate_seek_time(time: &str) -> pk_core::Result<&str> {
    if time_regex().is_match(time) {
        Ok(time)
    } else {
        Err(pk_core::Error::invalid(format!(
            "invalid thumbnail time '{time}'; expected HH:MM:SS or seconds"
        )))
    }
}

/// Grab one frame at `time` and return it as JPEG bytes.
pub async fn extract_thumbnail(
    tools: &ToolRegistry,
    input: &Path,
    time: &str,
) -> pk_core::Result<Vec<u8>> {
    let time = validate_seek_time(time)?;
    let ffmpeg = tools.require("ffmpeg")?;

    tracing::debug!(input = %input.display(), time, "Extracting thumbnail");

    let mut cmd = ToolCommand::new(ffmpeg.to_path_buf());
    cmd.args(["-hide_banner", "-loglevel", "error", "-nostdin"]);
    // Input seeking is fast and accurate enough for a preview frame.
    cmd.args(["-ss", time, "-i"]);
    cmd.arg(input.to_string_lossy().as_ref());
    cmd.args(["-frames:v", "1"]);
    cmd.arg("-vf");
    cmd.arg(format!(
        "scale={THUMBNAIL_WIDTH}:{THUMBNAIL_HEIGHT}:force_original_aspect_ratio=decrease"
    ));
    cmd.args(["-f", "image2", "-c:v", "mjpeg", "pipe:1"]);
    cmd.timeout(THUMBNAIL_TIMEOUT);

    let output = cmd.execute().await?;
    if output.stdout.is_empty() {
        return Err(pk_core::Error::tool(
            "ffmpeg",
            format!("no frame at {time} in {}", input.display()),
        ));
    }
    Ok(output.stdout)
}
