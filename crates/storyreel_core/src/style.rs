//! Visual style tags.

use serde::{Deserialize, Serialize};

/// Art direction applied to a scene's image prompt.
///
/// # Examples
///
/// ```
/// use std::str::FromStr;
/// use storyreel_core::StyleTag;
///
/// assert_eq!(StyleTag::from_str("realistic").unwrap(), StyleTag::Realistic);
/// assert_eq!(StyleTag::default().to_string(), "anime");
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StyleTag {
    /// Cel-shaded anime illustration
    #[default]
    Anime,
    /// Photographic realism
    Realistic,
}

impl StyleTag {
    /// Descriptor appended to image prompts for this style.
    pub fn prompt_suffix(&self) -> &'static str {
        match self {
            StyleTag::Anime => "anime style illustration, clean line art, vibrant cel shading",
            StyleTag::Realistic => {
                "photorealistic, cinematic lighting, natural colors, high detail"
            }
        }
    }
}
