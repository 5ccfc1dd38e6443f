use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info};

use crate::config::ConverterConfig;
use crate::error::{DeckError, Result};

/// An office-suite invocation.
#[derive(Debug, Clone)]
pub struct ConvertCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl ConvertCommand {
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    pub fn headless(self) -> Self {
        self.arg("--headless")
    }

    /// Target filter, e.g. `pptx`.
    pub fn convert_to<S: Into<String>>(self, format: S) -> Self {
        self.arg("--convert-to").arg(format)
    }

    pub fn output_dir<P: AsRef<Path>>(self, dir: P) -> Self {
        self.arg("--outdir").arg(dir.as_ref().to_string_lossy().to_string())
    }

    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Run to completion, turning a non-zero exit into a conversion error carrying stderr.
    pub async fn execute(&self) -> Result<String> {
        debug!("Executing converter: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| DeckError::Conversion(format!("Failed to execute {}: {}", self.binary_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DeckError::Conversion(format!("{} failed: {}", self.description, stderr.trim())));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Converts legacy `.ppt` files to `.pptx` with a headless office suite.
#[derive(Debug, Clone)]
pub struct LegacyConverter {
    config: ConverterConfig,
}

impl LegacyConverter {
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    pub fn command<S: Into<String>>(&self, description: S) -> ConvertCommand {
        ConvertCommand::new(self.config.binary_path.clone(), description)
    }

    /// Convert `input` into `output_dir`, returning the path of the new `.pptx`.
    pub async fn convert_to_pptx<P: AsRef<Path>, Q: AsRef<Path>>(&self, input: P, output_dir: Q) -> Result<PathBuf> {
        let input = input.as_ref();
        let output_dir = output_dir.as_ref();
        info!("Converting legacy presentation: {}", input.display());

        self.command(format!("Convert {} to pptx", input.display()))
            .headless()
            .convert_to("pptx")
            .output_dir(output_dir)
            .input(input)
            .execute()
            .await?;

        let stem = input
            .file_stem()
            .ok_or_else(|| DeckError::Conversion(format!("No file name in {}", input.display())))?;
        let converted = output_dir.join(format!("{}.pptx", stem.to_string_lossy()));

        if !converted.exists() {
            return Err(DeckError::Conversion(format!(
                "Converter reported success but {} was not produced",
                converted.display()
            )));
        }
        Ok(converted)
    }

    /// Check that the converter binary can be started.
    pub async fn check_availability(&self) -> Result<()> {
        let version = self.command("Query converter version").arg("--version").execute().await?;
        info!("Converter available: {}", version.trim());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_arguments() {
        let command = ConvertCommand::new("soffice", "test")
            .headless()
            .convert_to("pptx")
            .output_dir("/tmp/out")
            .input("/tmp/in/deck.ppt");
        assert_eq!(
            command.args,
            vec!["--headless", "--convert-to", "pptx", "--outdir", "/tmp/out", "/tmp/in/deck.ppt"]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_conversion_error() {
        let converter = LegacyConverter::new(ConverterConfig {
            binary_path: "/nonexistent/deckbridge-soffice".to_string(),
        });
        let dir = tempfile::tempdir().unwrap();
        let result = converter.convert_to_pptx(dir.path().join("deck.ppt"), dir.path()).await;
        assert!(matches!(result, Err(DeckError::Conversion(_))));
    }
}
