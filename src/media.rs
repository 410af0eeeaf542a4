use std::fmt::Display;

/// Container/codec the user asked for. Mp4 keeps the video stream, the
/// audio formats extract and re-encode audio only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    Mp4,
    Mp3,
    Wav,
}

impl MediaFormat {
    /// Accepts the format name or the numeric shorthand 1/2/3.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "1" | "mp4" => Some(Self::Mp4),
            "2" | "mp3" => Some(Self::Mp3),
            "3" | "wav" => Some(Self::Wav),
            _ => None,
        }
    }

    pub const fn ext(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
        }
    }

    pub const fn category(self) -> MediaCategory {
        match self {
            Self::Mp4 => MediaCategory::Video,
            Self::Mp3 | Self::Wav => MediaCategory::Audio,
        }
    }
}

impl Display for MediaFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.ext())
    }
}

/// Requested stream quality. Free-text input is validated weakly: anything
/// that is not a recognizable height cap means "best available".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Best,
    MaxHeight(u32),
}

impl Quality {
    pub fn parse(input: &str) -> Self {
        let normalized = input.trim().to_ascii_lowercase();
        if normalized.is_empty() || normalized == "best" {
            return Self::Best;
        }

        let digits = normalized.strip_suffix('p').unwrap_or(&normalized);
        match digits.parse::<u32>() {
            Ok(height) if height > 0 => Self::MaxHeight(height),
            _ => Self::Best,
        }
    }
}

/// Target audio bitrate for Spotify-sourced downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bitrate {
    High,
    Low,
}

impl Bitrate {
    pub const fn engine_arg(self) -> &'static str {
        match self {
            Self::High => "320k",
            Self::Low => "128k",
        }
    }
}

/// Which bucket of the download directory a file lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCategory {
    Video,
    Audio,
    Spotify,
}

impl MediaCategory {
    pub const fn subdir(self) -> &'static str {
        match self {
            Self::Video => "yt_video_dw",
            Self::Audio => "yt_audio_dw",
            Self::Spotify => "spotify_dw",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_accepts_names_and_numeric_shorthand() {
        assert_eq!(MediaFormat::parse("mp4"), Some(MediaFormat::Mp4));
        assert_eq!(MediaFormat::parse(" MP3 "), Some(MediaFormat::Mp3));
        assert_eq!(MediaFormat::parse("wav"), Some(MediaFormat::Wav));
        assert_eq!(MediaFormat::parse("1"), Some(MediaFormat::Mp4));
        assert_eq!(MediaFormat::parse("2"), Some(MediaFormat::Mp3));
        assert_eq!(MediaFormat::parse("3"), Some(MediaFormat::Wav));
    }

    #[test]
    fn unknown_format_defaults_to_mp4_at_the_call_site() {
        assert_eq!(MediaFormat::parse("flac"), None);
        assert_eq!(MediaFormat::parse("webm"), None);
        assert_eq!(
            MediaFormat::parse("flac").unwrap_or(MediaFormat::Mp4),
            MediaFormat::Mp4
        );
    }

    #[test]
    fn formats_map_to_categories() {
        assert_eq!(MediaFormat::Mp4.category(), MediaCategory::Video);
        assert_eq!(MediaFormat::Mp3.category(), MediaCategory::Audio);
        assert_eq!(MediaFormat::Wav.category(), MediaCategory::Audio);
    }

    #[test]
    fn quality_parses_height_caps_and_degrades_to_best() {
        assert_eq!(Quality::parse("best"), Quality::Best);
        assert_eq!(Quality::parse(""), Quality::Best);
        assert_eq!(Quality::parse("720p"), Quality::MaxHeight(720));
        assert_eq!(Quality::parse("1080"), Quality::MaxHeight(1080));
        assert_eq!(Quality::parse("potato"), Quality::Best);
        assert_eq!(Quality::parse("0p"), Quality::Best);
    }

    #[test]
    fn bitrate_maps_to_engine_args() {
        assert_eq!(Bitrate::High.engine_arg(), "320k");
        assert_eq!(Bitrate::Low.engine_arg(), "128k");
    }
}
