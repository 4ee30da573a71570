use std::io::{self, BufRead, Write};

use camino::Utf8Path;

use crate::error::RankscanError;
use crate::output::OutputMode;
use crate::persist::CsvArtifact;

/// Asks whether `path` may be overwritten. Only an exact `yes` confirms.
pub fn confirm_overwrite<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    path: &Utf8Path,
) -> io::Result<bool> {
    write!(output, "Output file {path} already exists. Overwrite? (yes/no): ")?;
    output.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(answer.trim() == "yes")
}

/// Clears the way for a new run. Returns `false` when the user declined to
/// overwrite an existing artifact; the artifact is then left untouched.
///
/// `overwrite` skips the question. Without it, non-interactive runs refuse
/// to replace an existing artifact.
pub fn prepare_artifact<R: BufRead, W: Write>(
    artifact: &CsvArtifact,
    mode: OutputMode,
    overwrite: bool,
    input: &mut R,
    output: &mut W,
) -> Result<bool, RankscanError> {
    if !artifact.exists() {
        return Ok(true);
    }
    let confirmed = match mode {
        _ if overwrite => true,
        OutputMode::NonInteractive => {
            return Err(RankscanError::ArtifactExists(artifact.path().to_string()));
        }
        OutputMode::Interactive => confirm_overwrite(input, output, artifact.path())
            .map_err(|err| RankscanError::Prompt(err.to_string()))?,
    };
    if confirmed {
        artifact.remove()?;
        tracing::info!(path = %artifact.path(), "existing artifact removed");
    }
    Ok(confirmed)
}
