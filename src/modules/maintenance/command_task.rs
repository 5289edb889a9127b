use crate::shared::errors::{AppError, AppResult};
use crate::log_debug;
use anyhow::bail;
use tokio::process::Command;

/// Longest stderr excerpt carried into the task's error message
const STDERR_TAIL_CHARS: usize = 500;

/// A scheduled job that shells out to an external program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommandTask {
    program: String,
    args: Vec<String>,
}

impl ExternalCommandTask {
    pub fn new(argv: Vec<String>) -> AppResult<Self> {
        let mut argv = argv.into_iter();
        let program = argv
            .next()
            .filter(|program| !program.trim().is_empty())
            .ok_or_else(|| AppError::InvalidInput("Command must not be empty".to_string()))?;

        Ok(Self {
            program,
            args: argv.collect(),
        })
    }

    /// Run to completion; a non-zero exit is an error carrying the tail of stderr
    pub async fn run(&self) -> anyhow::Result<()> {
        log_debug!("Spawning `{}`", self.display());

        let output = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| anyhow::anyhow!("failed to spawn `{}`: {}", self.program, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "`{}` exited with {}: {}",
                self.display(),
                output.status,
                tail(stderr.trim(), STDERR_TAIL_CHARS)
            );
        }

        Ok(())
    }

    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn tail(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    match text.char_indices().nth(count - max_chars) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}
