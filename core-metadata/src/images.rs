//! Image candidates. Candidates from different providers are listed side by
//! side for the caller to pick from; they are never merged.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MetadataError;
use crate::models::ProviderId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    Thumb,
    Fanart,
    Logo,
    Banner,
}

impl ImageType {
    pub const ALL: [ImageType; 4] = [
        ImageType::Thumb,
        ImageType::Fanart,
        ImageType::Logo,
        ImageType::Banner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageType::Thumb => "thumb",
            ImageType::Fanart => "fanart",
            ImageType::Logo => "logo",
            ImageType::Banner => "banner",
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageType {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        ImageType::ALL
            .into_iter()
            .find(|t| t.as_str() == lowered)
            .ok_or_else(|| MetadataError::InvalidImageType(s.to_string()))
    }
}

/// One remote image offered by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCandidate {
    pub image_type: ImageType,
    pub url: String,
    /// Pixel width, 0 when unknown
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub likes: u32,
    pub provider: ProviderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl ImageCandidate {
    pub fn new(provider: ProviderId, image_type: ImageType, url: impl Into<String>) -> Self {
        Self {
            image_type,
            url: url.into(),
            width: 0,
            height: 0,
            likes: 0,
            provider,
            language: None,
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_likes(mut self, likes: u32) -> Self {
        self.likes = likes;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Both dimensions are zero; the prober fills these in.
    pub fn needs_probe(&self) -> bool {
        self.width == 0 && self.height == 0
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Most liked first, then largest area. Stable for full ties.
pub fn sort_candidates(candidates: &mut [ImageCandidate]) {
    candidates.sort_by(|a, b| {
        b.likes
            .cmp(&a.likes)
            .then_with(|| b.area().cmp(&a.area()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(url: &str, likes: u32, w: u32, h: u32) -> ImageCandidate {
        ImageCandidate::new(ProviderId::Fanart, ImageType::Thumb, url)
            .with_likes(likes)
            .with_dimensions(w, h)
    }

    #[test]
    fn test_sort_by_likes_then_area() {
        let mut images = vec![
            candidate("small", 3, 100, 100),
            candidate("popular", 9, 10, 10),
            candidate("large", 3, 1000, 1000),
            candidate("unsized", 3, 0, 0),
        ];
        sort_candidates(&mut images);
        let order: Vec<_> = images.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(order, ["popular", "large", "small", "unsized"]);
    }

    #[test]
    fn test_image_type_parsing() {
        assert_eq!("Banner".parse::<ImageType>().unwrap(), ImageType::Banner);
        assert!(matches!(
            "poster".parse::<ImageType>(),
            Err(MetadataError::InvalidImageType(_))
        ));
    }

    #[test]
    fn test_needs_probe_only_when_both_zero() {
        assert!(candidate("a", 0, 0, 0).needs_probe());
        assert!(!candidate("a", 0, 500, 0).needs_probe());
    }
}
