//! Argument lists for the two conversion attempts.

use serde::{Deserialize, Serialize};

pub const INPUT_FILE: &str = "input.mov";
pub const OUTPUT_FILE: &str = "output.mp4";

/// Quality settings for the full re-encode used when stream copy is refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReencodeProfile {
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl Default for ReencodeProfile {
    fn default() -> Self {
        Self {
            video_codec: "libx264".into(),
            preset: "medium".into(),
            crf: 18,
            audio_codec: "aac".into(),
            audio_bitrate: "192k".into(),
        }
    }
}

/// Remux into MP4 without touching the encoded streams.
pub fn stream_copy(input: &str, output: &str) -> Vec<String> {
    [
        "-i",
        input,
        "-c:v",
        "copy",
        "-c:a",
        "copy",
        "-movflags",
        "+faststart",
        "-y",
        output,
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

pub fn reencode(input: &str, output: &str, profile: &ReencodeProfile) -> Vec<String> {
    vec![
        "-i".into(),
        input.into(),
        "-c:v".into(),
        profile.video_codec.clone(),
        "-preset".into(),
        profile.preset.clone(),
        "-crf".into(),
        profile.crf.to_string(),
        "-c:a".into(),
        profile.audio_codec.clone(),
        "-b:a".into(),
        profile.audio_bitrate.clone(),
        "-movflags".into(),
        "+faststart".into(),
        "-y".into(),
        output.into(),
    ]
}
