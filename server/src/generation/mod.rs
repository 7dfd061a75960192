//! Turning a user's generation form into a validated request for the image model.

use rand::Rng as _;
use serde::Deserialize;

use crate::validation::{Issue, Issues};

pub mod model;
pub mod service;

pub const PROMPT_MIN_CHARS: usize = 3;
pub const PROMPT_MAX_CHARS: usize = 500;
pub const NEGATIVE_PROMPT_MAX_CHARS: usize = 500;
pub const DEFAULT_GUIDANCE_SCALE: f64 = 7.5;

/// Exclusive upper bound for generated seeds
pub const SEED_CEILING: i64 = 2_147_483;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorScheme {
    Neon,
    Warm,
    Monochrome,
    Vibrant,
    Cool,
    Pastel,
    Dark,
    Bright,
    Muted,
}

impl ColorScheme {
    pub const ALL: [ColorScheme; 9] = [
        ColorScheme::Neon,
        ColorScheme::Warm,
        ColorScheme::Monochrome,
        ColorScheme::Vibrant,
        ColorScheme::Cool,
        ColorScheme::Pastel,
        ColorScheme::Dark,
        ColorScheme::Bright,
        ColorScheme::Muted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColorScheme::Neon => "Neon",
            ColorScheme::Warm => "Warm",
            ColorScheme::Monochrome => "Monochrome",
            ColorScheme::Vibrant => "Vibrant",
            ColorScheme::Cool => "Cool",
            ColorScheme::Pastel => "Pastel",
            ColorScheme::Dark => "Dark",
            ColorScheme::Bright => "Bright",
            ColorScheme::Muted => "Muted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Landscape,
    Portrait,
    Square,
}

impl Orientation {
    pub const ALL: [Orientation; 3] = [
        Orientation::Landscape,
        Orientation::Portrait,
        Orientation::Square,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Landscape => "landscape 1920x1080",
            Orientation::Portrait => "portrait 512x1024",
            Orientation::Square => "square 1024x1024",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Orientation::Landscape => "Landscape",
            Orientation::Portrait => "Portrait",
            Orientation::Square => "Square",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.as_str() == value)
    }
}

/// Generation parameters as submitted by the client
///
/// Every field is optional at this layer so that a half filled form produces
/// validation issues rather than a deserialization error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageInput {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    #[serde(default)]
    pub color_scheme: Option<String>,
    #[serde(default)]
    pub orientation: String,
    #[serde(default)]
    pub guidance_scale: Option<f64>,
    #[serde(default)]
    pub seed: Option<i64>,
}

/// A validated generation request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub color_scheme: Option<ColorScheme>,
    pub orientation: Orientation,
    pub guidance_scale: f64,
    pub seed: i64,
}

impl GenerateImageInput {
    /// Validate every field, reporting all problems at once
    pub fn validate(self) -> Result<GenerationRequest, Vec<Issue>> {
        let mut issues = Issues::new();

        let prompt = self.prompt.trim().to_string();
        issues.check_length(
            "prompt",
            &prompt,
            PROMPT_MIN_CHARS,
            PROMPT_MAX_CHARS,
            "Prompt must be at least 3 characters",
            "Prompt is too long",
        );

        let negative_prompt = crate::validation::non_empty(self.negative_prompt);
        if let Some(negative) = &negative_prompt {
            if negative.chars().count() > NEGATIVE_PROMPT_MAX_CHARS {
                issues.push("negativePrompt", "Negative prompt is too long");
            }
        }

        let color_scheme = match self.color_scheme.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(value) => {
                let parsed = ColorScheme::parse(value);
                if parsed.is_none() {
                    issues.push("colorScheme", "Invalid color scheme");
                }
                parsed
            }
        };

        let orientation = Orientation::parse(self.orientation.trim());
        if orientation.is_none() {
            issues.push("orientation", "Invalid orientation");
        }

        let guidance_scale = self.guidance_scale.unwrap_or(DEFAULT_GUIDANCE_SCALE);
        if !(0.0..=10.0).contains(&guidance_scale) {
            issues.push("guidanceScale", "Guidance scale must be between 0 and 10");
        }

        let seed = self.seed.unwrap_or_else(random_seed);

        issues.finish(())?;
        let orientation =
            orientation.ok_or_else(|| vec![Issue::new("orientation", "Invalid orientation")])?;

        Ok(GenerationRequest {
            prompt,
            negative_prompt,
            color_scheme,
            orientation,
            guidance_scale,
            seed,
        })
    }
}

impl GenerationRequest {
    /// The full prompt text sent to the model
    pub fn compose_prompt(&self) -> String {
        compose_prompt(
            &self.prompt,
            self.color_scheme,
            self.negative_prompt.as_deref(),
        )
    }
}

pub fn compose_prompt(
    prompt: &str,
    color_scheme: Option<ColorScheme>,
    negative_prompt: Option<&str>,
) -> String {
    let mut full = prompt.to_string();

    if let Some(scheme) = color_scheme {
        full.push_str(&format!(" Use a {} color scheme.", scheme.as_str()));
    }

    if let Some(negative) = negative_prompt {
        full.push_str(&format!(" Avoid: {}.", negative));
    }

    full
}

pub fn random_seed() -> i64 {
    rand::thread_rng().gen_range(0..SEED_CEILING)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(prompt: &str, orientation: &str) -> GenerateImageInput {
        GenerateImageInput {
            prompt: prompt.to_string(),
            orientation: orientation.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn valid_input_gets_defaults() {
        let request = input("a lighthouse at dusk", "square 1024x1024")
            .validate()
            .unwrap();

        assert_eq!(request.orientation, Orientation::Square);
        assert_eq!(request.guidance_scale, DEFAULT_GUIDANCE_SCALE);
        assert!((0..SEED_CEILING).contains(&request.seed));
        assert_eq!(request.color_scheme, None);
    }

    #[test]
    fn explicit_seed_is_kept() {
        let mut i = input("a lighthouse", "portrait 512x1024");
        i.seed = Some(42);
        assert_eq!(i.validate().unwrap().seed, 42);
    }

    #[test]
    fn reports_every_issue() {
        let mut i = input("hi", "diagonal");
        i.color_scheme = Some("Plaid".to_string());
        i.guidance_scale = Some(11.0);
        i.negative_prompt = Some("x".repeat(501));

        let issues = i.validate().unwrap_err();
        let paths: Vec<_> = issues.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["prompt", "negativePrompt", "colorScheme", "orientation", "guidanceScale"]
        );
    }

    #[test]
    fn empty_color_scheme_means_none() {
        let mut i = input("a forest", "landscape 1920x1080");
        i.color_scheme = Some(String::new());
        assert_eq!(i.validate().unwrap().color_scheme, None);
    }

    #[test]
    fn prompt_bounds_are_inclusive() {
        assert!(input("abc", "square 1024x1024").validate().is_ok());
        assert!(input(&"a".repeat(500), "square 1024x1024").validate().is_ok());
        assert!(input(&"a".repeat(501), "square 1024x1024").validate().is_err());
    }

    #[test]
    fn compose_prompt_appends_scheme_then_negative() {
        assert_eq!(
            compose_prompt("A cat", Some(ColorScheme::Neon), Some("dogs")),
            "A cat Use a Neon color scheme. Avoid: dogs."
        );
        assert_eq!(compose_prompt("A cat", None, None), "A cat");
    }

    #[test]
    fn deserializes_camel_case_json() {
        let i: GenerateImageInput = serde_json::from_value(serde_json::json!({
            "prompt": "a fox",
            "negativePrompt": "blur",
            "colorScheme": "Warm",
            "orientation": "square 1024x1024",
            "guidanceScale": 3.5,
        }))
        .unwrap();

        let request = i.validate().unwrap();
        assert_eq!(request.color_scheme, Some(ColorScheme::Warm));
        assert_eq!(request.negative_prompt.as_deref(), Some("blur"));
        assert_eq!(request.guidance_scale, 3.5);
    }
}
