use anyhow::{Context, anyhow, bail};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};
use stoatc::CompilerConfig;
use stoatc::codegen::build_executable;
use stoatc::codegen::linker::write_assembly;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "stoat")]
#[command(about = "Compile Stoat programs to x86-64 Linux executables", version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a source file to an executable
    Compile {
        /// Source file
        input: PathBuf,

        /// Output executable (defaults to the input's file stem)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stop after writing the assembly file
        #[arg(long)]
        asm_only: bool,

        /// Run the executable after linking and exit with its status
        #[arg(long, conflicts_with = "asm_only")]
        run: bool,

        /// Words reserved for pinned values
        #[arg(long, default_value_t = CompilerConfig::default().pin_capacity)]
        pin_capacity: usize,

        /// Assembler to invoke (NASM syntax)
        #[arg(long, default_value = "nasm")]
        assembler: String,

        /// Linker to invoke
        #[arg(long, default_value = "ld")]
        linker: String,
    },

    /// Parse and verify a source file without generating code
    Check {
        /// Source file
        input: PathBuf,
    },

    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Compile errors share source file names through `Rc` and cannot cross
/// into `anyhow` directly
fn diagnostic(err: stoatc::Error) -> anyhow::Error {
    anyhow!(err.to_string())
}

fn read_source(input: &Path) -> anyhow::Result<String> {
    fs::read_to_string(input).with_context(|| format!("Failed to read {}", input.display()))
}

fn compile(input: &Path, output: Option<PathBuf>, asm_only: bool, run: bool, config: &CompilerConfig) -> anyhow::Result<ExitCode> {
    let source = read_source(input)?;
    let filename = input.display().to_string();

    tracing::info!(input = %filename, "compiling");
    let asm = stoatc::compile_source(&source, &filename, config).map_err(diagnostic)?;

    let output = output.unwrap_or_else(|| PathBuf::from(input.file_stem().unwrap_or(input.as_os_str())));

    if asm_only {
        let asm_path = output.with_extension("asm");
        write_assembly(&asm_path, &asm)?;
        println!("Wrote {}", asm_path.display());
        return Ok(ExitCode::SUCCESS);
    }

    build_executable(config, &asm, &output)?;

    if !run {
        println!("Compiled {}", output.display());
        return Ok(ExitCode::SUCCESS);
    }

    // A bare file name would be looked up on PATH
    let program = if output.components().count() == 1 {
        Path::new(".").join(&output)
    } else {
        output.clone()
    };
    let status = Command::new(&program)
        .status()
        .with_context(|| format!("Failed to run {}", program.display()))?;
    tracing::info!(%status, "program exited");

    match status.code() {
        Some(code) => Ok(ExitCode::from(u8::try_from(code).unwrap_or(1))),
        None => bail!("{} was terminated by a signal", program.display()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Compile {
            input,
            output,
            asm_only,
            run,
            pin_capacity,
            assembler,
            linker,
        } => {
            let config = CompilerConfig {
                pin_capacity,
                assembler,
                linker,
                ..CompilerConfig::default()
            };
            compile(&input, output, asm_only, run, &config)
        }
        Commands::Check { input } => read_source(&input).and_then(|source| {
            stoatc::check_source(&source, &input.display().to_string(), &CompilerConfig::default())
                .map_err(diagnostic)?;
            println!("{}: ok", input.display());
            Ok(ExitCode::SUCCESS)
        }),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "stoat", &mut std::io::stdout());
            Ok(ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}
