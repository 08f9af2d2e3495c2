//! Image analysis command implementation

use crate::client;
use crate::config::GigactlConfig;
use crate::output;
use gigaflow_core::errors::CoreError;
use std::path::Path;
use tracing::info;

/// Handle analyze command
pub async fn handle_analyze_command(image: &Path, prompt: &str, config: &GigactlConfig) -> Result<(), CoreError> {
    let mime_type = mime_type_for(image)?;
    let file_name = image
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    let bytes = std::fs::read(image)
        .map_err(|e| CoreError::Configuration(format!("Failed to read {}: {}", image.display(), e)))?;

    let connector = client::connect(config).await?;
    info!("Analyzing {} ({} bytes)", file_name, bytes.len());
    let analysis = connector
        .analyze_image(bytes, &file_name, mime_type, prompt, Some(&config.model))
        .await?;

    output::display_analysis(&analysis, &config.default_format)
}

/// MIME type of the image formats the API accepts
fn mime_type_for(path: &Path) -> Result<&'static str, CoreError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "png" => Ok("image/png"),
        "tiff" | "tif" => Ok("image/tiff"),
        "bmp" => Ok("image/bmp"),
        other => Err(CoreError::Configuration(format!(
            "Unsupported image type: {:?}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_type_detection() {
        assert_eq!(mime_type_for(Path::new("cat.JPG")).unwrap(), "image/jpeg");
        assert_eq!(mime_type_for(Path::new("/tmp/scan.png")).unwrap(), "image/png");
        assert!(mime_type_for(Path::new("notes.txt")).is_err());
        assert!(mime_type_for(Path::new("no_extension")).is_err());
    }
}
