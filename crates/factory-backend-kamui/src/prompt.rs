//! Instruction payloads sent to the backend.
//!
//! Every payload carries the subject, the modality parameters, and a fixed
//! trailer asking the backend to print the full download URL, save the
//! result into the target directory, and echo the URL on a tagged line.

use std::path::{Path, PathBuf};

use crate::request::{GenerationParams, GenerationRequest};
use crate::response::ARTIFACT_TAG;

/// Builds the instruction payload for `request`.
///
/// `target_dir` is where the backend is asked to place the result.
pub fn build_instruction(request: &GenerationRequest, target_dir: &Path) -> String {
    let modality = request.modality();
    let mut out = String::new();

    match &request.params {
        GenerationParams::ImageToVideo {
            source_image,
            motion,
            duration_secs,
        } => {
            out.push_str("Generate a video from an image.\n\n");
            out.push_str(&format!(
                "Source image: {}\n",
                resolve_path(source_image).display()
            ));
            out.push_str(&format!("Motion: {}\n", motion));
            out.push_str(&format!("Duration: {} seconds\n", duration_secs));
            if !request.prompt.trim().is_empty() {
                out.push_str(&format!("Subject: {}\n", request.prompt.trim()));
            }
            out.push_str(
                "\nWhen the source image needs a hosted URL, use the full, unabridged URL.\n",
            );
        }
        params => {
            out.push_str(&format!(
                "Generate a {} on the theme of: {}\n\n",
                modality.noun(),
                request.prompt.trim()
            ));
            out.push_str("Settings:\n");
            write_settings(&mut out, params);
            out.push_str("- Generate at high quality\n");
        }
    }

    write_trailer(&mut out, target_dir);
    out
}

fn write_settings(out: &mut String, params: &GenerationParams) {
    match params {
        GenerationParams::Image {
            style,
            aspect_ratio,
        } => {
            out.push_str(&format!("- Style: {}\n", style));
            out.push_str(&format!("- Aspect ratio: {}\n", aspect_ratio));
        }
        GenerationParams::Video { duration_secs, fps } => {
            out.push_str(&format!("- Duration: {} seconds\n", duration_secs));
            out.push_str(&format!("- FPS: {}\n", fps));
        }
        GenerationParams::Music {
            duration_secs,
            genre,
        } => {
            out.push_str(&format!("- Duration: {} seconds\n", duration_secs));
            out.push_str(&format!("- Genre: {}\n", genre));
        }
        GenerationParams::Model3d { complexity } => {
            out.push_str(&format!("- Complexity: {}\n", complexity));
        }
        GenerationParams::ImageToVideo { .. } => {}
    }
}

fn write_trailer(out: &mut String, target_dir: &Path) {
    out.push_str("\nWhen generation is complete, you must:\n");
    out.push_str("1. Print the full download URL, without abbreviating any part of it\n");
    out.push_str(&format!(
        "2. Download the file into this directory: {}\n",
        resolve_path(target_dir).display()
    ));
    out.push_str("3. Print the full path of the saved file\n");
    out.push_str(&format!(
        "\nFinally, print the download URL on its own line as:\n{} <url>\n",
        ARTIFACT_TAG
    ));
}

/// Absolute form of `path`, canonicalized when it exists.
fn resolve_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
