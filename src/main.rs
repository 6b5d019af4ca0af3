use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use hotwatch::notify::Event;
use hotwatch::{
    blocking::{Flow, Hotwatch},
    EventKind,
};
use miette::{bail, miette, IntoDiagnostic, Result, Severity};

use sim80::env::{self, DEFAULT_STEP_LIMIT};
use sim80::output::Output;
use sim80::{Assembly, CpuState, Program, Step, MEMORY_SIZE};

/// sim80 assembles and single-steps programs for the Intel 8080.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a `.asm` file to run
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run text `.asm` or binary `.bin` file until it halts and print the final state
    Run {
        /// `.asm` or `.bin` file to run
        name: PathBuf,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
        /// Print every executed instruction to stderr
        #[arg(short, long)]
        trace: bool,
        /// Give up after this many steps
        #[arg(short, long)]
        steps: Option<u64>,
    },
    /// Create binary `.bin` memory image to run later
    Compile {
        /// `.asm` file to compile
        name: PathBuf,
        /// Destination to output .bin file
        dest: Option<PathBuf>,
    },
    /// Check a `.asm` file without running or outputting binary
    Check {
        /// File to check
        name: PathBuf,
    },
    /// Print the address, bytes and instruction of every assembled line
    Dump {
        /// `.asm` file to disassemble
        name: PathBuf,
    },
    /// Place a watch on a `.asm` file to receive constant assembler updates
    Watch {
        /// `.asm` file to watch
        name: PathBuf,
    },
}

struct RunOptions {
    minimal: bool,
    trace: bool,
    steps: Option<u64>,
}

fn main() -> miette::Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    env::init();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(sim80::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    if let Some(command) = args.command {
        match command {
            Command::Run {
                name,
                minimal,
                trace,
                steps,
            } => run(
                &name,
                RunOptions {
                    minimal,
                    trace,
                    steps,
                },
            ),
            Command::Compile { name, dest } => {
                file_message(Green, "Assembling", &name);
                let contents = fs::read_to_string(&name).into_diagnostic()?;
                let assembly = assemble(&name, &contents)?;

                let out_file_name = dest.unwrap_or_else(|| name.with_extension("bin"));
                fs::write(&out_file_name, assembly.program.bytes()).into_diagnostic()?;

                message(Green, "Finished", "emit binary");
                file_message(Green, "Saved", &out_file_name);
                Ok(())
            }
            Command::Check { name } => {
                file_message(Green, "Checking", &name);
                let contents = fs::read_to_string(&name).into_diagnostic()?;
                let _ = assemble(&name, &contents)?;
                message(Green, "Success", "no errors found!");
                Ok(())
            }
            Command::Dump { name } => {
                file_message(Green, "Assembling", &name);
                let contents = fs::read_to_string(&name).into_diagnostic()?;
                let assembly = assemble(&name, &contents)?;
                Output::Normal.print_listing(&assembly);
                Ok(())
            }
            Command::Watch { name } => watch(name),
        }
    } else if let Some(path) = args.path {
        run(
            &path,
            RunOptions {
                minimal: false,
                trace: false,
                steps: None,
            },
        )
    } else {
        println!("\n~ sim80 v{VERSION} - Copyright (c) 2024 Artemis Rosman ~");
        println!("{}", LOGO.truecolor(255, 183, 197).bold());
        println!("{SHORT_INFO}");
        std::process::exit(0);
    }
}

#[allow(unused)]
enum MsgColor {
    Green,
    Cyan,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

fn message<S>(color: MsgColor, left: S, right: S)
where
    S: Colorize + std::fmt::Display,
{
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    println!("{left:>12} {right}");
}

fn run(name: &Path, options: RunOptions) -> Result<()> {
    file_message(MsgColor::Green, "Assembling", name);
    let mut state = match name.extension().and_then(OsStr::to_str) {
        Some("bin") => {
            let bytes = fs::read(name).into_diagnostic()?;
            let Some(program) = Program::from_bytes(&bytes) else {
                bail!(
                    "Binary file is {} bytes, larger than the {} byte memory",
                    bytes.len(),
                    MEMORY_SIZE
                );
            };
            CpuState::with_program(program)
        }
        Some("asm") => {
            let contents = fs::read_to_string(name).into_diagnostic()?;
            assemble(name, &contents)?.into_state()
        }
        Some(_) => bail!("File has unknown extension. Exiting..."),
        None => bail!("File has no extension. Exiting..."),
    };

    Output::set_minimal(options.minimal);
    let trace = options.trace || env::is_trace_enabled();
    // Flag wins over the environment
    let limit = options
        .steps
        .or_else(env::step_limit)
        .unwrap_or(DEFAULT_STEP_LIMIT);

    message(MsgColor::Green, "Running", "assembled program");
    let mut count = 0;
    while !state.is_finished() {
        if count == limit {
            Output::Normal.print_registers(&state);
            bail!(
                severity = Severity::Error,
                code = "run::step_limit",
                help = "raise the limit with `--steps` or `SIM80_STEP_LIMIT`",
                "Program did not halt within {limit} steps"
            );
        }
        let pc = state.pc();
        match sim80::step(&mut state) {
            Ok(Step::Executed(instr)) => {
                if trace {
                    Output::Trace.print_trace(pc, &instr);
                }
            }
            Ok(Step::Halted) => break,
            Err(err) => {
                Output::Normal.print_registers(&state);
                return Err(miette!(
                    severity = Severity::Error,
                    code = "run::step",
                    help = "the machine state above is from before the failing instruction",
                    "{err}"
                ));
            }
        }
        count += 1;
    }

    Output::Normal.print_registers(&state);
    Output::Normal.print_stack(&state);
    file_message(MsgColor::Green, "Completed", name);
    Ok(())
}

/// Re-check `name` on every change until interrupted
fn watch(name: PathBuf) -> Result<()> {
    if !name.exists() {
        bail!("File does not exist. Exiting...")
    }
    // Editors that swap files on save break a watch on the file itself
    let folder = match name.parent() {
        Some(pth) if pth.is_dir() => pth.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };

    watch_banner(&name, None);
    let mut watcher =
        Hotwatch::new_with_custom_delay(Duration::from_millis(500)).into_diagnostic()?;
    watcher
        .watch(folder, move |event: Event| {
            if let EventKind::Modify(_) | EventKind::Remove(_) = event.kind {
                watch_banner(&name, Some("file change detected"));
                // Makes reruns more obvious
                sleep(Duration::from_millis(50));
                let contents = match fs::read_to_string(&name) {
                    Ok(cts) => cts,
                    Err(e) => {
                        eprintln!("{e}. Exiting...");
                        std::process::exit(1)
                    }
                };
                match assemble(&name, &contents) {
                    Ok(_) => message(MsgColor::Green, "Success", "no errors found!"),
                    Err(e) => println!("\n{:?}", e),
                }
            }
            Flow::Continue
        })
        .into_diagnostic()?;
    watcher.run();
    Ok(())
}

fn watch_banner(name: &Path, reason: Option<&str>) {
    // Clear screen and move cursor to top left
    print!("\x1B[2J\x1B[2;1H");
    file_message(MsgColor::Green, "Watching", name);
    if let Some(reason) = reason {
        message(MsgColor::Green, "Re-checking", reason);
    }
    message(MsgColor::Cyan, "Help", "press CTRL+C to exit");
}

/// Assemble a source file, reporting every failing line
fn assemble(name: &Path, contents: &str) -> Result<Assembly> {
    let assembly = sim80::assemble(contents);
    if assembly.is_ok() {
        return Ok(assembly);
    }
    let source_name = name.display().to_string();
    for diag in &assembly.errors {
        eprintln!("{:?}", diag.to_report(&source_name, contents));
    }
    let count = assembly.errors.len();
    bail!(
        "Aborting due to {count} assembly error{}",
        if count == 1 { "" } else { "s" }
    )
}

const LOGO: &str = r#"
         _              ___   ___
   ___  (_)  __ _      ( _ ) / _ \
  (_-< / /  /  ' \    / _  |/ // /
 /___//_/  /_/_/_/    \___/ \___/ "#;

const SHORT_INFO: &str = r"
Welcome to sim80, an assembler and single-step interpreter
for Intel 8080 assembly code.
Please use `-h` or `--help` to access the usage instructions and documentation.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
