//! Pre-upload media checks against per-platform limits
//!
//! Size and aspect findings are advisory. Only an unsupported file type, a
//! reel without video, or a file over the absolute size ceiling marks the
//! candidate invalid.

use std::path::Path;

use crate::error::{Result, SparkError};
use crate::types::{MediaType, PostType, SocialPlatform};

const MIB: f64 = 1024.0 * 1024.0;

/// Ratio band every platform accepts without cropping
const RATIO_MIN: f64 = 0.95;
const RATIO_ALL_MAX: f64 = 1.91;
const RATIO_LINKEDIN_MAX: f64 = 2.0;
const RATIO_X_MAX: f64 = 2.1;

/// Outcome of decoding an image header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionProbe {
    Decoded { width: u32, height: u32 },
    Failed,
    NotProbed,
}

/// File metadata the validator looks at
#[derive(Debug, Clone, PartialEq)]
pub struct MediaCandidate {
    pub file_name: Option<String>,
    pub mime_type: String,
    pub size: u64,
    pub dimensions: DimensionProbe,
}

impl MediaCandidate {
    pub fn new(mime_type: impl Into<String>, size: u64) -> Self {
        Self {
            file_name: None,
            mime_type: mime_type.into(),
            size,
            dimensions: DimensionProbe::NotProbed,
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.dimensions = DimensionProbe::Decoded { width, height };
        self
    }

    pub fn media_type(&self) -> Option<MediaType> {
        MediaType::from_mime(&self.mime_type)
    }
}

/// A candidate together with its content, ready to upload
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub candidate: MediaCandidate,
    pub bytes: Vec<u8>,
}

impl MediaFile {
    /// Read a file from disk, inferring its MIME type from the extension
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            SparkError::InvalidInput(format!(
                "Failed to read media file {}: {}",
                path.display(),
                e
            ))
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::from_bytes(name, bytes))
    }

    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime_type = mime_from_name(&file_name).to_string();
        let dimensions = if mime_type.starts_with("image/") {
            probe_dimensions(&bytes)
        } else {
            DimensionProbe::NotProbed
        };

        Self {
            candidate: MediaCandidate {
                file_name: Some(file_name),
                mime_type,
                size: bytes.len() as u64,
                dimensions,
            },
            bytes,
        }
    }
}

/// MIME type for a file name, `application/octet-stream` when unknown
pub fn mime_from_name(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}

/// Read pixel dimensions from a PNG, GIF, JPEG or WebP header
pub fn probe_dimensions(bytes: &[u8]) -> DimensionProbe {
    let decoded = png_dimensions(bytes)
        .or_else(|| gif_dimensions(bytes))
        .or_else(|| jpeg_dimensions(bytes))
        .or_else(|| webp_dimensions(bytes));

    match decoded {
        Some((width, height)) if width > 0 && height > 0 => {
            DimensionProbe::Decoded { width, height }
        }
        _ => DimensionProbe::Failed,
    }
}

fn be16(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 2)?;
    Some(u32::from(u16::from_be_bytes([b[0], b[1]])))
}

fn le16(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 2)?;
    Some(u32::from(u16::from_le_bytes([b[0], b[1]])))
}

fn be32(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 4)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn le24(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 3)?;
    Some(u32::from(b[0]) | u32::from(b[1]) << 8 | u32::from(b[2]) << 16)
}

fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    const SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
    if !bytes.starts_with(SIGNATURE) || bytes.get(12..16)? != b"IHDR" {
        return None;
    }
    Some((be32(bytes, 16)?, be32(bytes, 20)?))
}

fn gif_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    if !bytes.starts_with(b"GIF87a") && !bytes.starts_with(b"GIF89a") {
        return None;
    }
    Some((le16(bytes, 6)?, le16(bytes, 8)?))
}

fn jpeg_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return None;
    }

    let mut i = 2;
    while i + 1 < bytes.len() {
        if bytes[i] != 0xFF {
            return None;
        }
        // Fill bytes
        while bytes.get(i + 1) == Some(&0xFF) {
            i += 1;
        }
        let marker = *bytes.get(i + 1)?;

        match marker {
            0xD0..=0xD9 | 0x01 => {
                i += 2;
                continue;
            }
            0xC0..=0xCF if marker != 0xC4 && marker != 0xC8 && marker != 0xCC => {
                let height = be16(bytes, i + 5)?;
                let width = be16(bytes, i + 7)?;
                return Some((width, height));
            }
            _ => {
                let len = be16(bytes, i + 2)? as usize;
                if len < 2 {
                    return None;
                }
                i += 2 + len;
            }
        }
    }
    None
}

fn webp_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    if bytes.get(0..4)? != b"RIFF" || bytes.get(8..12)? != b"WEBP" {
        return None;
    }

    match bytes.get(12..16)? {
        b"VP8X" => Some((le24(bytes, 24)? + 1, le24(bytes, 27)? + 1)),
        b"VP8 " => {
            if bytes.get(23..26)? != [0x9D, 0x01, 0x2A] {
                return None;
            }
            Some((le16(bytes, 26)? & 0x3FFF, le16(bytes, 28)? & 0x3FFF))
        }
        b"VP8L" => {
            if *bytes.get(20)? != 0x2F {
                return None;
            }
            let b = bytes.get(21..25)?;
            let bits = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
            Some(((bits & 0x3FFF) + 1, ((bits >> 14) & 0x3FFF) + 1))
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WarningLevel {
    Ok,
    Info,
    Caution,
    Error,
}

impl WarningLevel {
    fn label(&self) -> &'static str {
        match self {
            WarningLevel::Ok => "ok",
            WarningLevel::Info => "info",
            WarningLevel::Caution => "warning",
            WarningLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub level: WarningLevel,
    pub message: String,
}

impl Warning {
    fn new(level: WarningLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.level.label(), self.message)
    }
}

/// Validator verdict; warnings are in evaluation order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MediaValidation {
    pub is_valid: bool,
    pub warnings: Vec<Warning>,
}

impl MediaValidation {
    pub fn has_errors(&self) -> bool {
        self.warnings.iter().any(|w| w.level == WarningLevel::Error)
    }

    pub fn has_cautions(&self) -> bool {
        self.warnings.iter().any(|w| w.level >= WarningLevel::Caution)
    }

    pub fn messages(&self) -> Vec<String> {
        self.warnings.iter().map(ToString::to_string).collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MediaValidator;

impl MediaValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, candidate: &MediaCandidate, post_type: PostType) -> MediaValidation {
        let mut warnings = Vec::new();

        let media_type = match candidate.media_type() {
            Some(t) => t,
            None => {
                warnings.push(Warning::new(
                    WarningLevel::Error,
                    format!(
                        "Only images and videos are supported (got {})",
                        candidate.mime_type
                    ),
                ));
                return MediaValidation {
                    is_valid: false,
                    warnings,
                };
            }
        };

        if post_type == PostType::Reel && media_type != MediaType::Video {
            warnings.push(Warning::new(
                WarningLevel::Error,
                "Reels require video content, not images",
            ));
            return MediaValidation {
                is_valid: false,
                warnings,
            };
        }

        let is_valid = match media_type {
            MediaType::Image => check_image(candidate, &mut warnings),
            MediaType::Video => check_video(candidate, post_type, &mut warnings),
        };

        MediaValidation { is_valid, warnings }
    }
}

fn size_mb(size: u64) -> String {
    format!("{:.1}MB", size as f64 / MIB)
}

fn limit(limit: Option<u64>) -> u64 {
    limit.unwrap_or(u64::MAX)
}

fn check_image(candidate: &MediaCandidate, warnings: &mut Vec<Warning>) -> bool {
    let linkedin_cap = limit(SocialPlatform::Linkedin.image_size_limit());
    let x_cap = limit(SocialPlatform::X.image_size_limit());
    let mut is_valid = true;

    if candidate.size > linkedin_cap {
        warnings.push(Warning::new(
            WarningLevel::Error,
            format!(
                "Image too large ({}). Max: 8MB for LinkedIn, 5MB for X",
                size_mb(candidate.size)
            ),
        ));
        is_valid = false;
    } else if candidate.size > x_cap {
        warnings.push(Warning::new(
            WarningLevel::Caution,
            format!(
                "Image too large for X ({}, max 5MB). Will work on LinkedIn only.",
                size_mb(candidate.size)
            ),
        ));
    }

    match candidate.dimensions {
        DimensionProbe::Decoded { width, height } => {
            let ratio = f64::from(width) / f64::from(height);
            warnings.push(Warning::new(
                WarningLevel::Info,
                format!("Image: {}x{} ({:.2}:1)", width, height, ratio),
            ));

            if !(RATIO_MIN..=RATIO_LINKEDIN_MAX).contains(&ratio) {
                warnings.push(Warning::new(
                    WarningLevel::Caution,
                    "LinkedIn may crop image (ideal ratio: 1:1 to 1.91:1)",
                ));
            }
            if !(RATIO_MIN..=RATIO_X_MAX).contains(&ratio) {
                warnings.push(Warning::new(
                    WarningLevel::Caution,
                    "X may crop image (ideal ratio: 1:1 to 2:1)",
                ));
            }
            if (RATIO_MIN..=RATIO_ALL_MAX).contains(&ratio) {
                warnings.push(Warning::new(
                    WarningLevel::Ok,
                    "Aspect ratio works on all platforms",
                ));
            }
        }
        DimensionProbe::Failed => {
            warnings.push(Warning::new(
                WarningLevel::Caution,
                "Could not validate dimensions",
            ));
        }
        DimensionProbe::NotProbed => {}
    }

    is_valid
}

fn check_video(candidate: &MediaCandidate, post_type: PostType, warnings: &mut Vec<Warning>) -> bool {
    let linkedin_cap = limit(SocialPlatform::Linkedin.video_size_limit());
    let x_cap = limit(SocialPlatform::X.video_size_limit());
    let mut is_valid = true;

    if candidate.size > x_cap {
        warnings.push(Warning::new(
            WarningLevel::Error,
            format!("Video too large ({}). Max: 512MB", size_mb(candidate.size)),
        ));
        is_valid = false;
    } else if candidate.size > linkedin_cap {
        warnings.push(Warning::new(
            WarningLevel::Caution,
            format!(
                "Video too large for LinkedIn ({}, max 200MB). Will work on X only.",
                size_mb(candidate.size)
            ),
        ));
    } else {
        warnings.push(Warning::new(
            WarningLevel::Ok,
            format!("Video size OK ({})", size_mb(candidate.size)),
        ));
    }

    let guidance = match post_type {
        PostType::Reel => "Reel: make sure the video is 9:16 (vertical) and 3-90s long",
        PostType::Post => "Video: LinkedIn max 10min, X max 2:20min",
    };
    warnings.push(Warning::new(WarningLevel::Info, guidance));

    is_valid
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    fn image(size: u64, width: u32, height: u32) -> MediaCandidate {
        MediaCandidate::new("image/png", size).with_dimensions(width, height)
    }

    fn has(validation: &MediaValidation, needle: &str) -> bool {
        validation.warnings.iter().any(|w| w.message.contains(needle))
    }

    #[test]
    fn test_disallowed_mime_rejected_first() {
        let validator = MediaValidator::new();
        for mime in ["application/pdf", "text/plain", "audio/mpeg", ""] {
            for post_type in [PostType::Post, PostType::Reel] {
                let result = validator.validate(&MediaCandidate::new(mime, 100 * MB), post_type);
                assert!(!result.is_valid);
                assert_eq!(result.warnings.len(), 1);
                assert!(has(&result, "Only images and videos are supported"));
            }
        }
    }

    #[test]
    fn test_reel_with_image_short_circuits() {
        let result = MediaValidator::new().validate(&image(20 * MB, 100, 100), PostType::Reel);
        assert!(!result.is_valid);
        assert_eq!(result.warnings.len(), 1);
        assert!(has(&result, "Reels require video content"));
    }

    #[test]
    fn test_image_over_8mb_invalid() {
        let result = MediaValidator::new().validate(&image(8 * MB + 1, 1000, 1000), PostType::Post);
        assert!(!result.is_valid);
        assert!(result.has_errors());
        assert!(has(&result, "Image too large (8.0MB)"));
    }

    #[test]
    fn test_image_between_5_and_8mb_warns_for_x() {
        for size in [5 * MB + 1, 6 * MB, 8 * MB] {
            let result = MediaValidator::new().validate(&image(size, 1000, 1000), PostType::Post);
            assert!(result.is_valid, "size {} should be valid", size);
            assert!(has(&result, "Image too large for X"));
            assert!(result.has_cautions());
        }
    }

    #[test]
    fn test_image_at_5mb_has_no_size_warning() {
        let result = MediaValidator::new().validate(&image(5 * MB, 1000, 1000), PostType::Post);
        assert!(result.is_valid);
        assert!(!has(&result, "too large"));
    }

    #[test]
    fn test_aspect_ratio_bands() {
        let validator = MediaValidator::new();
        let cases = [
            // (width, height, all_ok, linkedin_crop, x_crop)
            (1000, 1000, true, false, false),
            (1910, 1000, true, false, false),
            (950, 1000, true, false, false),
            (1950, 1000, false, false, false),
            (2050, 1000, false, true, false),
            (2200, 1000, false, true, true),
            (900, 1000, false, true, true),
            (1080, 1920, false, true, true),
        ];

        for (w, h, all_ok, linkedin, x) in cases {
            let result = validator.validate(&image(MB, w, h), PostType::Post);
            assert!(result.is_valid);
            assert_eq!(has(&result, "works on all platforms"), all_ok, "{}x{}", w, h);
            assert_eq!(has(&result, "LinkedIn may crop"), linkedin, "{}x{}", w, h);
            assert_eq!(has(&result, "X may crop"), x, "{}x{}", w, h);
        }
    }

    #[test]
    fn test_dimension_line_format() {
        let result = MediaValidator::new().validate(&image(MB, 1200, 630), PostType::Post);
        assert_eq!(result.warnings[0].message, "Image: 1200x630 (1.90:1)");
        assert_eq!(result.warnings[0].level, WarningLevel::Info);
    }

    #[test]
    fn test_failed_probe_is_soft() {
        let mut candidate = MediaCandidate::new("image/jpeg", MB);
        candidate.dimensions = DimensionProbe::Failed;
        let result = MediaValidator::new().validate(&candidate, PostType::Post);
        assert!(result.is_valid);
        assert!(has(&result, "Could not validate dimensions"));
    }

    #[test]
    fn test_video_size_rules() {
        let validator = MediaValidator::new();

        let huge = validator.validate(&MediaCandidate::new("video/mp4", 512 * MB + 1), PostType::Post);
        assert!(!huge.is_valid);
        assert!(has(&huge, "Max: 512MB"));

        let big = validator.validate(&MediaCandidate::new("video/mp4", 300 * MB), PostType::Post);
        assert!(big.is_valid);
        assert!(has(&big, "Video too large for LinkedIn (300.0MB"));

        let ok = validator.validate(&MediaCandidate::new("video/mp4", 12 * MB), PostType::Post);
        assert!(ok.is_valid);
        assert!(has(&ok, "Video size OK (12.0MB)"));
        assert!(!ok.has_cautions());
    }

    #[test]
    fn test_video_guidance_depends_on_post_type() {
        let validator = MediaValidator::new();
        let reel = validator.validate(&MediaCandidate::new("video/mp4", MB), PostType::Reel);
        assert!(reel.is_valid);
        assert!(reel.warnings.last().unwrap().message.contains("9:16"));

        let post = validator.validate(&MediaCandidate::new("video/mp4", MB), PostType::Post);
        assert_eq!(
            post.warnings.last().unwrap().message,
            "Video: LinkedIn max 10min, X max 2:20min"
        );
    }

    #[test]
    fn test_warning_display_has_level_prefix() {
        let result = MediaValidator::new().validate(&image(9 * MB, 1000, 1000), PostType::Post);
        assert!(result.messages()[0].starts_with("error: Image too large"));
    }

    fn png_header(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.extend_from_slice(&13u32.to_be_bytes());
        bytes.extend_from_slice(b"IHDR");
        bytes.extend_from_slice(&width.to_be_bytes());
        bytes.extend_from_slice(&height.to_be_bytes());
        bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
        bytes
    }

    #[test]
    fn test_probe_png() {
        assert_eq!(
            probe_dimensions(&png_header(1200, 630)),
            DimensionProbe::Decoded { width: 1200, height: 630 }
        );
    }

    #[test]
    fn test_probe_gif() {
        let mut bytes = b"GIF89a".to_vec();
        bytes.extend_from_slice(&320u16.to_le_bytes());
        bytes.extend_from_slice(&240u16.to_le_bytes());
        assert_eq!(
            probe_dimensions(&bytes),
            DimensionProbe::Decoded { width: 320, height: 240 }
        );
    }

    #[test]
    fn test_probe_jpeg_skips_app_segments() {
        let mut bytes = vec![0xFF, 0xD8];
        // APP0 with a 16 byte payload
        bytes.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
        bytes.extend_from_slice(&[0u8; 14]);
        // SOF0: length, precision, height, width
        bytes.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
        bytes.extend_from_slice(&480u16.to_be_bytes());
        bytes.extend_from_slice(&640u16.to_be_bytes());
        bytes.extend_from_slice(&[0u8; 10]);

        assert_eq!(
            probe_dimensions(&bytes),
            DimensionProbe::Decoded { width: 640, height: 480 }
        );
    }

    #[test]
    fn test_probe_garbage_fails() {
        assert_eq!(probe_dimensions(b"not an image"), DimensionProbe::Failed);
        assert_eq!(probe_dimensions(&[0xFF, 0xD8, 0x00]), DimensionProbe::Failed);
        assert_eq!(probe_dimensions(&png_header(0, 10)), DimensionProbe::Failed);
    }

    #[test]
    fn test_media_file_from_bytes_infers_type() {
        let file = MediaFile::from_bytes("banner.PNG", png_header(1000, 1000));
        assert_eq!(file.candidate.mime_type, "image/png");
        assert_eq!(file.candidate.media_type(), Some(MediaType::Image));
        assert_eq!(
            file.candidate.dimensions,
            DimensionProbe::Decoded { width: 1000, height: 1000 }
        );

        let video = MediaFile::from_bytes("clip.mov", vec![0u8; 64]);
        assert_eq!(video.candidate.mime_type, "video/quicktime");
        assert_eq!(video.candidate.dimensions, DimensionProbe::NotProbed);
        assert_eq!(video.candidate.size, 64);

        let other = MediaFile::from_bytes("notes.txt", vec![1, 2, 3]);
        assert_eq!(other.candidate.media_type(), None);
    }

    #[test]
    fn test_media_file_open_missing() {
        let result = MediaFile::open(Path::new("/definitely/not/here.png"));
        assert!(matches!(result, Err(SparkError::InvalidInput(_))));
    }
}
