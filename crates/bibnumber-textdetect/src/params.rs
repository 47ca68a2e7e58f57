use serde::{Deserialize, Serialize};

/// What to do with components that overlap other components.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ContainmentPolicy {
    /// Containment counts are computed but nothing is removed.
    #[default]
    KeepAll,
    /// Drop a component whose box lies inside a strictly larger survivor's box.
    DropNested,
    /// Drop a component whose box strictly contains the centers of more than
    /// `max_contained` other survivors.
    DropCrowded { max_contained: usize },
}

/// Configuration for [`crate::TextDetector`].
///
/// Every field has a default; partial JSON documents override only the keys
/// they name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextDetectionParams {
    /// Text is darker than its background. Flips the ray direction.
    pub dark_on_light: bool,
    /// Longest admissible stroke, in pixels. Longer rays are discarded.
    pub max_stroke_length: f32,
    /// Components shorter than this (pixels, inclusive height) are rejected.
    pub min_character_height: i32,
    /// Components taller than this are rejected.
    pub max_character_height: i32,
    /// Chains narrower than `image_width / ratio` are not sent to OCR.
    pub max_img_width_to_text_ratio: f32,
    /// Advisory rotation limit in degrees for the OCR stage.
    pub max_angle: f32,
    /// Components whose top row is above this line are rejected.
    pub top_border: i32,
    /// Components reaching within this many rows of the bottom are rejected.
    pub bottom_border: i32,
    /// Minimal number of components in a reported chain.
    pub min_chain_len: usize,
    /// Chains up to this length are routed through the verification model.
    /// `0` disables verification.
    pub model_verif_len_crit: usize,
    /// Minimal chain height for the verification model.
    pub model_verif_min_height: i32,
    /// Margin (pixels) the OCR stage keeps around regions.
    pub border_margin: i32,
    /// Reject components with `variance > ratio * mean` stroke width.
    /// `None` keeps every component regardless of stroke variance.
    pub max_variance_ratio: Option<f32>,
    /// Containment-based pruning of filtered components.
    pub containment: ContainmentPolicy,
}

impl Default for TextDetectionParams {
    fn default() -> Self {
        Self {
            dark_on_light: true,
            max_stroke_length: 30.0,
            min_character_height: 11,
            max_character_height: 300,
            max_img_width_to_text_ratio: 100.0,
            max_angle: 45.0,
            top_border: 0,
            bottom_border: 0,
            min_chain_len: 3,
            model_verif_len_crit: 0,
            model_verif_min_height: 0,
            border_margin: 0,
            max_variance_ratio: None,
            containment: ContainmentPolicy::KeepAll,
        }
    }
}

impl TextDetectionParams {
    /// Defaults with the OCR margin scaled to the image height (0.5 %).
    pub fn for_image_height(height: usize) -> Self {
        Self {
            border_margin: (height * 5 / 1000) as i32,
            ..Self::default()
        }
    }

    /// Profile used when a chain-verification model is available: shorter
    /// chains are admitted and the model arbitrates them.
    pub fn with_verification_model(self) -> Self {
        Self {
            min_chain_len: 2,
            model_verif_len_crit: 2,
            model_verif_min_height: 15,
            ..self
        }
    }

    /// Whether a chain of `len` components needs model verification.
    #[inline]
    pub fn needs_verification(&self, len: usize) -> bool {
        self.model_verif_len_crit > 0 && len <= self.model_verif_len_crit
    }
}
