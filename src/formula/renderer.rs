//! Formula renderers: TeX/MathML source to SVG markup

use std::process::Stdio;

use async_trait::async_trait;
use log::debug;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::FormulaEncoding;
use crate::error::FormulaError;

/// Converts formula source to vector markup
#[async_trait]
pub trait FormulaRenderer: Send + Sync {
    async fn to_vector(
        &self,
        source: &str,
        encoding: FormulaEncoding,
        display: bool,
    ) -> Result<String, FormulaError>;
}

/// Runs an external converter per formula, e.g. a MathJax command line wrapper
///
/// The source is written to stdin and SVG is read from stdout. Arguments may
/// contain `{encoding}` (`tex`/`mml`) and `{display}` (`true`/`false`).
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: String,
    args: Vec<String>,
}

impl CommandRenderer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a configured command line; `None` when it is empty
    #[must_use]
    pub fn from_command_line(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }

    fn expand_args(&self, encoding: FormulaEncoding, display: bool) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{encoding}", encoding.as_str())
                    .replace("{display}", if display { "true" } else { "false" })
            })
            .collect()
    }
}

#[async_trait]
impl FormulaRenderer for CommandRenderer {
    async fn to_vector(
        &self,
        source: &str,
        encoding: FormulaEncoding,
        display: bool,
    ) -> Result<String, FormulaError> {
        let args = self.expand_args(encoding, display);
        debug!("Running formula renderer: {} {}", self.program, args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take()
            && let Err(e) = stdin.write_all(source.as_bytes()).await
            && e.kind() != std::io::ErrorKind::BrokenPipe
        {
            return Err(e.into());
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FormulaError::Render(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| FormulaError::Render(format!("renderer output is not UTF-8: {e}")))
    }
}

/// Renderer backed by a plain function
pub struct FnRenderer<F>(pub F);

#[async_trait]
impl<F> FormulaRenderer for FnRenderer<F>
where
    F: Fn(&str, FormulaEncoding, bool) -> Result<String, FormulaError> + Send + Sync,
{
    async fn to_vector(
        &self,
        source: &str,
        encoding: FormulaEncoding,
        display: bool,
    ) -> Result<String, FormulaError> {
        (self.0)(source, encoding, display)
    }
}

/// Stand-in when no renderer is configured: every formula takes the raster path
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableRenderer;

#[async_trait]
impl FormulaRenderer for UnavailableRenderer {
    async fn to_vector(
        &self,
        _source: &str,
        _encoding: FormulaEncoding,
        _display: bool,
    ) -> Result<String, FormulaError> {
        Err(FormulaError::Render("no formula renderer configured".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_placeholders() {
        let renderer = CommandRenderer::from_command_line(&[
            "tex2svg".to_string(),
            "--input={encoding}".to_string(),
            "--display={display}".to_string(),
        ])
        .unwrap();
        assert_eq!(
            renderer.expand_args(FormulaEncoding::Mml, true),
            vec!["--input=mml", "--display=true"]
        );
        assert!(CommandRenderer::from_command_line(&[]).is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_renderer_pipes_source_through() {
        let renderer = CommandRenderer::new("cat", Vec::new());
        let out = renderer
            .to_vector("<svg></svg>", FormulaEncoding::Tex, false)
            .await
            .unwrap();
        assert_eq!(out, "<svg></svg>");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_renderer_reports_failure() {
        let renderer = CommandRenderer::new("false", Vec::new());
        let err = renderer
            .to_vector("x", FormulaEncoding::Tex, false)
            .await
            .unwrap_err();
        assert!(matches!(err, FormulaError::Render(_)));
    }
}
