/**
Assembling and linking

Writes the emitted NASM text to disk, runs the assembler to produce an ELF
object and links it into a static executable. No libc is involved: the
program enters at `_start` and talks to the kernel directly.
*/

use super::error::{LinkError, LinkResult};
use crate::config::CompilerConfig;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Write assembly text to `path`
pub fn write_assembly(path: &Path, asm: &str) -> LinkResult<()> {
    fs::write(path, asm).map_err(|source| LinkError::Io {
        action: "writing",
        path: path.to_path_buf(),
        source,
    })
}

/// Run `tool` with `args`, failing unless it exits successfully
fn run_tool(tool: &str, args: &[&OsStr]) -> LinkResult<()> {
    tracing::debug!(tool, ?args, "running");
    let output = Command::new(tool)
        .args(args)
        .output()
        .map_err(|source| LinkError::Io {
            action: "spawning",
            path: PathBuf::from(tool),
            source,
        })?;

    if output.status.success() {
        Ok(())
    } else {
        Err(LinkError::ToolFailed {
            tool: tool.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Assemble `asm_path` into an ELF64 object at `object_path`
pub fn assemble(config: &CompilerConfig, asm_path: &Path, object_path: &Path) -> LinkResult<()> {
    run_tool(
        &config.assembler,
        &[OsStr::new("-felf64"), OsStr::new("-o"), object_path.as_os_str(), asm_path.as_os_str()],
    )
}

/// Link `object_path` into an executable at `output`
pub fn link(config: &CompilerConfig, object_path: &Path, output: &Path) -> LinkResult<()> {
    run_tool(
        &config.linker,
        &[OsStr::new("-o"), output.as_os_str(), object_path.as_os_str()],
    )
}

/// Write `<output>.asm`, assemble it and link `output`
///
/// Returns the path of the assembly file. The intermediate object is removed
/// once linking succeeds.
pub fn build_executable(config: &CompilerConfig, asm: &str, output: &Path) -> LinkResult<PathBuf> {
    let asm_path = output.with_extension("asm");
    let object_path = output.with_extension("o");

    write_assembly(&asm_path, asm)?;
    assemble(config, &asm_path, &object_path)?;
    link(config, &object_path, output)?;

    if let Err(err) = fs::remove_file(&object_path) {
        tracing::warn!(path = %object_path.display(), %err, "could not remove object file");
    }
    tracing::info!(output = %output.display(), "linked executable");
    Ok(asm_path)
}
