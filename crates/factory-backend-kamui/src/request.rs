//! Generation request types.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KamuiResult;
use crate::output::{default_file_name, validate_file_name, OutputLayout};

/// Default image style.
pub const DEFAULT_IMAGE_STYLE: &str = "photorealistic";
/// Default image aspect ratio.
pub const DEFAULT_ASPECT_RATIO: &str = "1:1";
/// Default video length in seconds.
pub const DEFAULT_VIDEO_DURATION_SECS: u32 = 5;
/// Default video frame rate.
pub const DEFAULT_VIDEO_FPS: u32 = 24;
/// Default music length in seconds.
pub const DEFAULT_MUSIC_DURATION_SECS: u32 = 30;
/// Default music genre.
pub const DEFAULT_MUSIC_GENRE: &str = "ambient";
/// Default 3D model complexity.
pub const DEFAULT_MODEL_COMPLEXITY: &str = "medium";
/// Default image-to-video motion.
pub const DEFAULT_MOTION: &str = "gentle movement";

/// Kind of media a request produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Image,
    Video,
    Music,
    Model3d,
    ImageToVideo,
}

impl Modality {
    /// All modalities.
    pub const ALL: [Modality; 5] = [
        Modality::Image,
        Modality::Video,
        Modality::Music,
        Modality::Model3d,
        Modality::ImageToVideo,
    ];

    /// Returns the string identifier for this modality.
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Image => "image",
            Modality::Video => "video",
            Modality::Music => "music",
            Modality::Model3d => "model3d",
            Modality::ImageToVideo => "image_to_video",
        }
    }

    /// The policy operation this modality runs as.
    pub fn operation(&self) -> &'static str {
        match self {
            Modality::Image => "generate_image",
            Modality::Video => "generate_video",
            Modality::Music => "generate_music",
            Modality::Model3d => "generate_3d_model",
            Modality::ImageToVideo => "image_to_video",
        }
    }

    /// Output subdirectory under the output root.
    pub fn output_subdir(&self) -> &'static str {
        match self {
            Modality::Image => "images",
            Modality::Video | Modality::ImageToVideo => "videos",
            Modality::Music => "audio",
            Modality::Model3d => "3d",
        }
    }

    /// Prefix for generated default file names.
    pub fn file_prefix(&self) -> &'static str {
        match self {
            Modality::Image => "image",
            Modality::Video => "video",
            Modality::Music => "music",
            Modality::Model3d => "model",
            Modality::ImageToVideo => "i2v",
        }
    }

    /// Extension for generated default file names.
    pub fn default_extension(&self) -> &'static str {
        match self {
            Modality::Image => "jpg",
            Modality::Video | Modality::ImageToVideo => "mp4",
            Modality::Music => "mp3",
            Modality::Model3d => "obj",
        }
    }

    /// File extensions an artifact of this modality may carry.
    pub fn accepted_extensions(&self) -> &'static [&'static str] {
        match self {
            Modality::Image => &["jpg", "jpeg", "png", "gif"],
            Modality::Video | Modality::ImageToVideo => &["mp4", "mov"],
            Modality::Music => &["mp3", "wav"],
            Modality::Model3d => &["obj", "fbx", "gltf"],
        }
    }

    /// Human-readable noun used in instruction payloads.
    pub fn noun(&self) -> &'static str {
        match self {
            Modality::Image => "image",
            Modality::Video | Modality::ImageToVideo => "video",
            Modality::Music => "piece of music",
            Modality::Model3d => "3D model",
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "image" => Ok(Modality::Image),
            "video" => Ok(Modality::Video),
            "music" | "audio" => Ok(Modality::Music),
            "3d" | "model3d" | "model" => Ok(Modality::Model3d),
            "image-to-video" | "image_to_video" | "i2v" => Ok(Modality::ImageToVideo),
            other => Err(format!("unknown modality '{}'", other)),
        }
    }
}

/// Modality-specific generation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "modality", rename_all = "snake_case")]
pub enum GenerationParams {
    Image {
        style: String,
        aspect_ratio: String,
    },
    Video {
        duration_secs: u32,
        fps: u32,
    },
    Music {
        duration_secs: u32,
        genre: String,
    },
    Model3d {
        complexity: String,
    },
    ImageToVideo {
        source_image: PathBuf,
        motion: String,
        duration_secs: u32,
    },
}

impl GenerationParams {
    /// Image parameters with defaults.
    pub fn image() -> Self {
        Self::Image {
            style: DEFAULT_IMAGE_STYLE.to_string(),
            aspect_ratio: DEFAULT_ASPECT_RATIO.to_string(),
        }
    }

    /// Video parameters with defaults.
    pub fn video() -> Self {
        Self::Video {
            duration_secs: DEFAULT_VIDEO_DURATION_SECS,
            fps: DEFAULT_VIDEO_FPS,
        }
    }

    /// Music parameters with defaults.
    pub fn music() -> Self {
        Self::Music {
            duration_secs: DEFAULT_MUSIC_DURATION_SECS,
            genre: DEFAULT_MUSIC_GENRE.to_string(),
        }
    }

    /// 3D model parameters with defaults.
    pub fn model3d() -> Self {
        Self::Model3d {
            complexity: DEFAULT_MODEL_COMPLEXITY.to_string(),
        }
    }

    /// Image-to-video parameters for a source image, other fields defaulted.
    pub fn image_to_video(source_image: impl Into<PathBuf>) -> Self {
        Self::ImageToVideo {
            source_image: source_image.into(),
            motion: DEFAULT_MOTION.to_string(),
            duration_secs: DEFAULT_VIDEO_DURATION_SECS,
        }
    }

    /// The modality these parameters belong to.
    pub fn modality(&self) -> Modality {
        match self {
            GenerationParams::Image { .. } => Modality::Image,
            GenerationParams::Video { .. } => Modality::Video,
            GenerationParams::Music { .. } => Modality::Music,
            GenerationParams::Model3d { .. } => Modality::Model3d,
            GenerationParams::ImageToVideo { .. } => Modality::ImageToVideo,
        }
    }
}

/// A single generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Free-text subject prompt.
    pub prompt: String,
    /// Modality and its parameters.
    pub params: GenerationParams,
    /// Explicit output file name; derived from the prompt when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_name: Option<String>,
}

impl GenerationRequest {
    /// Creates a request.
    pub fn new(prompt: impl Into<String>, params: GenerationParams) -> Self {
        Self {
            prompt: prompt.into(),
            params,
            output_name: None,
        }
    }

    /// Image request with default parameters.
    pub fn image(prompt: impl Into<String>) -> Self {
        Self::new(prompt, GenerationParams::image())
    }

    /// Video request with default parameters.
    pub fn video(prompt: impl Into<String>) -> Self {
        Self::new(prompt, GenerationParams::video())
    }

    /// Music request with default parameters.
    pub fn music(prompt: impl Into<String>) -> Self {
        Self::new(prompt, GenerationParams::music())
    }

    /// 3D model request with default parameters.
    pub fn model3d(prompt: impl Into<String>) -> Self {
        Self::new(prompt, GenerationParams::model3d())
    }

    /// Default-parameter request for a modality.
    ///
    /// Returns `None` for image-to-video, which needs a source image.
    pub fn for_modality(modality: Modality, prompt: impl Into<String>) -> Option<Self> {
        let params = match modality {
            Modality::Image => GenerationParams::image(),
            Modality::Video => GenerationParams::video(),
            Modality::Music => GenerationParams::music(),
            Modality::Model3d => GenerationParams::model3d(),
            Modality::ImageToVideo => return None,
        };
        Some(Self::new(prompt, params))
    }

    /// Sets an explicit output file name.
    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }

    /// The request's modality.
    pub fn modality(&self) -> Modality {
        self.params.modality()
    }

    /// The policy operation this request runs as.
    pub fn operation(&self) -> &'static str {
        self.modality().operation()
    }

    /// The output file name: explicit, or derived from the prompt.
    ///
    /// Image-to-video names derive from the motion description.
    pub fn file_name(&self) -> KamuiResult<String> {
        if let Some(ref name) = self.output_name {
            validate_file_name(name)?;
            return Ok(name.clone());
        }

        let seed_text = match &self.params {
            GenerationParams::ImageToVideo { motion, .. } => motion.as_str(),
            _ => self.prompt.as_str(),
        };
        Ok(default_file_name(self.modality(), seed_text))
    }

    /// Where the artifact is planned to land under `layout`.
    pub fn planned_output_path(&self, layout: &OutputLayout) -> KamuiResult<PathBuf> {
        Ok(layout.dir_for(self.modality()).join(self.file_name()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    #[test]
    fn test_modality_from_str() {
        assert_eq!("image".parse::<Modality>().unwrap(), Modality::Image);
        assert_eq!("3d".parse::<Modality>().unwrap(), Modality::Model3d);
        assert_eq!("Music".parse::<Modality>().unwrap(), Modality::Music);
        assert_eq!(
            "image-to-video".parse::<Modality>().unwrap(),
            Modality::ImageToVideo
        );
        assert!("hologram".parse::<Modality>().is_err());
    }

    #[test]
    fn test_modality_operations_and_dirs() {
        assert_eq!(Modality::Image.operation(), "generate_image");
        assert_eq!(Modality::Model3d.operation(), "generate_3d_model");
        assert_eq!(Modality::ImageToVideo.operation(), "image_to_video");
        assert_eq!(Modality::Music.output_subdir(), "audio");
        assert_eq!(Modality::ImageToVideo.output_subdir(), "videos");
    }

    #[test]
    fn test_params_modality() {
        for modality in Modality::ALL {
            let request = match GenerationRequest::for_modality(modality, "x") {
                Some(r) => r,
                None => GenerationRequest::new(
                    "",
                    GenerationParams::image_to_video("frame.png"),
                ),
            };
            assert_eq!(request.modality(), modality);
        }
    }

    #[test]
    fn test_default_file_name_is_deterministic() {
        let a = GenerationRequest::image("A simple red circle");
        let b = GenerationRequest::image("A simple red circle");
        let c = GenerationRequest::image("A simple blue square");

        let name = a.file_name().unwrap();
        assert_eq!(name, b.file_name().unwrap());
        assert_ne!(name, c.file_name().unwrap());
        assert!(name.starts_with("image_"));
        assert!(name.ends_with(".jpg"));
    }

    #[test]
    fn test_i2v_name_derives_from_motion() {
        let a = GenerationRequest::new(
            "first",
            GenerationParams::image_to_video("frame.png"),
        );
        let b = GenerationRequest::new(
            "second",
            GenerationParams::image_to_video("other.png"),
        );
        assert_eq!(a.file_name().unwrap(), b.file_name().unwrap());
        assert!(a.file_name().unwrap().starts_with("i2v_"));
    }

    #[test]
    fn test_planned_output_path() {
        let layout = OutputLayout::new("outputs");
        let request = GenerationRequest::music("rain").with_output_name("rain.mp3");
        assert_eq!(
            request.planned_output_path(&layout).unwrap(),
            Path::new("outputs").join("audio").join("rain.mp3")
        );
    }

    #[test]
    fn test_explicit_name_must_be_plain() {
        let layout = OutputLayout::new("outputs");
        let request = GenerationRequest::image("x").with_output_name("../escape.jpg");
        assert!(request.planned_output_path(&layout).is_err());
    }

    #[test]
    fn test_params_serialization() {
        let json = serde_json::to_string(&GenerationParams::video()).unwrap();
        assert!(json.contains("\"modality\":\"video\""));
        assert!(json.contains("\"fps\":24"));

        let parsed: GenerationParams = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, GenerationParams::video());
    }
}
