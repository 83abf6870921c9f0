use std::path::Path;

use tokio::fs;
use tracing::info;

use crate::engine::Segment;
use crate::error::{Result, SubgenError};

/// Render segments as SubRip text: 1-based index, `HH:MM:SS,mmm` range,
/// caption text, blank separator. An empty slice renders as an empty
/// string.
pub fn render_srt(segments: &[Segment]) -> String {
    let mut srt_content = String::new();

    for (index, segment) in segments.iter().enumerate() {
        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            format_srt_timestamp(segment.start),
            format_srt_timestamp(segment.end),
            sanitize_caption(&segment.text),
        ));
    }

    srt_content
}

/// Write segments to an SRT file.
pub async fn write_srt<P: AsRef<Path>>(segments: &[Segment], output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!("Writing SRT file: {}", output_path.display());

    fs::write(output_path, render_srt(segments))
        .await
        .map_err(SubgenError::Io)?;

    Ok(())
}

/// Parse SubRip text back into segments. Indices are not trusted; block
/// order wins.
pub fn parse_srt(content: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();

    for block in content.split("\n\n") {
        let lines: Vec<&str> = block.lines().filter(|line| !line.trim().is_empty()).collect();
        if lines.is_empty() {
            continue;
        }
        if lines.len() < 2 {
            return Err(SubgenError::Subtitle(format!(
                "Malformed SRT block: {:?}",
                block
            )));
        }

        let (start_raw, end_raw) = lines[1].split_once("-->").ok_or_else(|| {
            SubgenError::Subtitle(format!("Missing time range in SRT block: {:?}", lines[1]))
        })?;

        segments.push(Segment {
            start: parse_srt_timestamp(start_raw.trim())?,
            end: parse_srt_timestamp(end_raw.trim())?,
            text: lines[2..].join("\n"),
        });
    }

    Ok(segments)
}

/// Caption text must not contain the cue arrow; a stray `-->` would end
/// the cue early in most players.
fn sanitize_caption(text: &str) -> String {
    text.trim().replace("-->", "->")
}

/// Format time in seconds as the SRT time format (HH:MM:SS,mmm).
/// Milliseconds are truncated, not rounded, so an end time never spills
/// into the following cue.
fn format_srt_timestamp(seconds: f64) -> String {
    let total_milliseconds = (seconds * 1000.0) as u64;
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

fn parse_srt_timestamp(raw: &str) -> Result<f64> {
    let invalid = || SubgenError::Subtitle(format!("Invalid SRT timestamp: {}", raw));

    let (clock, millis) = raw.split_once(',').ok_or_else(invalid)?;
    let parts: Vec<&str> = clock.split(':').collect();
    if parts.len() != 3 {
        return Err(invalid());
    }

    let hours: u64 = parts[0].parse().map_err(|_| invalid())?;
    let minutes: u64 = parts[1].parse().map_err(|_| invalid())?;
    let secs: u64 = parts[2].parse().map_err(|_| invalid())?;
    let millis: u64 = millis.trim().parse().map_err(|_| invalid())?;
    if minutes >= 60 || secs >= 60 || millis >= 1000 {
        return Err(invalid());
    }

    let total_milliseconds = hours * 3_600_000 + minutes * 60_000 + secs * 1_000 + millis;
    Ok(total_milliseconds as f64 / 1000.0)
}
