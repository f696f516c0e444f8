use async_trait::async_trait;
use std::path::Path;

/// Optional OCR collaborator. The engine never blocks on OCR being
/// installed; a missing engine just means the fallback stays silent.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Extract text from an image file. An empty string is a valid
    /// answer, not an error.
    async fn image_to_string(&self, path: &Path) -> std::io::Result<String>;
}

/// Shells out to the `tesseract` CLI when it is on PATH.
pub struct TesseractCli;

#[async_trait]
impl OcrEngine for TesseractCli {
    async fn image_to_string(&self, path: &Path) -> std::io::Result<String> {
        let output = tokio::process::Command::new("tesseract")
            .arg(path)
            .arg("stdout")
            .arg("--psm")
            .arg("3")
            .output()
            .await?;
        if !output.status.success() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!(
                    "tesseract exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr)
                ),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl TesseractCli {
    /// Whether the binary is reachable at all.
    pub fn available() -> bool {
        std::process::Command::new("tesseract")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    pub struct FixedOcr(pub String);

    #[async_trait]
    impl OcrEngine for FixedOcr {
        async fn image_to_string(&self, _path: &Path) -> io::Result<String> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn fixed_engine_returns_its_text() {
        let engine = FixedOcr("Midnight Blue\nAdd to Cart".into());
        let text = engine
            .image_to_string(Path::new("/tmp/ignored.png"))
            .await
            .expect("text");
        assert!(text.contains("Midnight Blue"));
    }
}
