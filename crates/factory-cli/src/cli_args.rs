//! CLI argument definitions for the Creative Factory command-line interface.
//!
//! The `#[derive(Parser)]` type lives here, keeping `main.rs` focused on
//! dispatch logic.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use factory_backend_kamui::Modality;

/// Creative Factory - media generation through the Kamui backend
#[derive(Debug, Parser)]
#[command(name = "creative-factory")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Content type to generate
    #[arg(short = 't', long = "type", value_enum, required_unless_present = "list_operations")]
    pub content_type: Option<ContentType>,

    /// Subject prompt
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Output file name (placed under the content type's directory)
    #[arg(short, long)]
    pub output: Option<String>,

    /// List known operations and how they are classified
    #[arg(long)]
    pub list_operations: bool,

    /// Output root directory (default: ./outputs)
    #[arg(long)]
    pub out_root: Option<PathBuf>,

    /// Kamui MCP configuration file (default: $KAMUI_MCP_CONFIG or ~/.claude/mcp-kamuicode.json)
    #[arg(long)]
    pub mcp_config: Option<PathBuf>,

    /// Strict mode (default: $KAMUI_STRICT_MODE, enabled when unset)
    #[arg(long, value_name = "BOOL", action = clap::ArgAction::Set)]
    pub strict: Option<bool>,

    /// Source image for image-to-video
    #[arg(long, required_if_eq("content_type", "image-to-video"))]
    pub image: Option<PathBuf>,

    /// Motion description for image-to-video
    #[arg(long)]
    pub motion: Option<String>,

    /// Duration in seconds for video, music and image-to-video
    #[arg(long)]
    pub duration: Option<u32>,

    /// Output machine-readable JSON (no colored output)
    #[arg(long)]
    pub json: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

/// Content types selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ContentType {
    Image,
    Video,
    Music,
    #[value(name = "3d", alias = "model3d")]
    Model3d,
    ImageToVideo,
    /// Image, video, music and 3D, one after another
    All,
}

impl ContentType {
    /// Modalities generated for this content type, in run order.
    pub fn modalities(&self) -> Vec<Modality> {
        match self {
            ContentType::Image => vec![Modality::Image],
            ContentType::Video => vec![Modality::Video],
            ContentType::Music => vec![Modality::Music],
            ContentType::Model3d => vec![Modality::Model3d],
            ContentType::ImageToVideo => vec![Modality::ImageToVideo],
            ContentType::All => vec![
                Modality::Image,
                Modality::Video,
                Modality::Music,
                Modality::Model3d,
            ],
        }
    }
}
