/**
Error types for the assembler and linker stage

Emission itself cannot fail. Turning the emitted text into an executable
shells out to external tools, and those failures are reported here.
*/

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinkError {
    /// Reading or writing a build artifact failed, or a tool could not be spawned
    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A tool ran and exited unsuccessfully
    #[error("{tool} failed ({status}):\n{stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },
}

pub type LinkResult<T> = Result<T, LinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LinkError::ToolFailed {
            tool: "nasm".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "out.asm:3: error: parser".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "nasm failed (exit status: 1):\nout.asm:3: error: parser"
        );

        let err = LinkError::Io {
            action: "writing",
            path: PathBuf::from("out.asm"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "writing out.asm: denied");
    }
}
