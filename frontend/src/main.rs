use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use zeta_core::core::machine::Machine;
use zeta_machines::rom_loader::{RomImage, RomLoadError};
use zeta_machines::{MachineError, Runner, registry};

mod config;
mod emulator;
mod input;
mod rom_path;

use config::{Config, ConfigError};
use input::{KeyMap, KeyScript, ScriptError};

#[derive(Parser, Debug)]
#[command(name = "zeta", version, about = "Z80 machine emulator")]
struct Cli {
    /// Configuration file (defaults to ~/.config/zeta/config.toml).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log every instruction-level event (overrides the configured level).
    #[arg(long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the available machines.
    List,
    /// Run a machine.
    Run(RunArgs),
    /// Execute single instructions, printing the CPU state after each.
    Step(StepArgs),
}

#[derive(Args, Debug)]
struct MachineArgs {
    /// Machine name, as shown by `zeta list`.
    machine: String,

    /// ROM file, ZIP archive or directory (defaults to the configured rom_dir).
    #[arg(long, value_name = "PATH")]
    rom: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    target: MachineArgs,

    /// Number of frames to run flat out.
    #[arg(long, default_value_t = 50, conflicts_with = "realtime")]
    frames: u64,

    /// Pace to wall-clock time with a timer thread raising interrupts.
    #[arg(long)]
    realtime: bool,

    /// Length of a real-time run.
    #[arg(long, default_value_t = 5.0, requires = "realtime")]
    seconds: f64,

    /// Key script: `frame:key:down|up` entries separated by commas.
    #[arg(long, value_name = "SCRIPT")]
    keys: Option<String>,

    /// Write the display file (0x4000-0x5AFF) here after the run.
    #[arg(long, value_name = "FILE.scr")]
    dump_screen: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct StepArgs {
    #[command(flatten)]
    target: MachineArgs,

    /// Instructions to execute.
    #[arg(long, default_value_t = 1)]
    count: u64,
}

#[derive(Debug)]
enum FrontendError {
    Config(ConfigError),
    UnknownMachine(String),
    Machine(MachineError),
    Script(ScriptError),
    Io(std::io::Error),
}

impl fmt::Display for FrontendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "{e}"),
            Self::UnknownMachine(name) => {
                let names: Vec<_> = registry::all().iter().map(|e| e.name).collect();
                write!(f, "unknown machine: {name} (available: {})", names.join(", "))
            }
            Self::Machine(e) => write!(f, "{e}"),
            Self::Script(e) => write!(f, "{e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for FrontendError {}

impl From<ConfigError> for FrontendError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<MachineError> for FrontendError {
    fn from(e: MachineError) -> Self {
        Self::Machine(e)
    }
}

impl From<RomLoadError> for FrontendError {
    fn from(e: RomLoadError) -> Self {
        Self::Machine(MachineError::Rom(e))
    }
}

impl From<ScriptError> for FrontendError {
    fn from(e: ScriptError) -> Self {
        Self::Script(e)
    }
}

impl From<std::io::Error> for FrontendError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

fn init_logging(trace: bool, config_level: Option<&str>) {
    let default = if trace {
        "trace"
    } else {
        config_level.unwrap_or("info")
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logging is configured from the file, so a bad file is reported plainly.
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(cli.trace, config.log_level.as_deref());

    match dispatch(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(command: Command, config: &Config) -> Result<(), FrontendError> {
    match command {
        Command::List => {
            for entry in registry::all() {
                let rom = entry.rom_name.unwrap_or("-");
                println!("{:<10} {:<8} {}", entry.name, rom, entry.description);
            }
            Ok(())
        }
        Command::Run(args) => run(args, config),
        Command::Step(args) => {
            let mut machine = create_machine(&args.target, config)?;
            emulator::step(machine.as_mut(), args.count)?;
            Ok(())
        }
    }
}

fn create_machine(
    args: &MachineArgs,
    config: &Config,
) -> Result<Box<dyn Machine>, FrontendError> {
    let entry = registry::find(&args.machine)
        .ok_or_else(|| FrontendError::UnknownMachine(args.machine.clone()))?;

    let image: Option<RomImage> = match entry.rom_name {
        Some(rom_name) => Some(rom_path::resolve(
            rom_name,
            args.rom.as_deref(),
            config.rom_dir.as_deref(),
        )?),
        None => args.rom.as_deref().map(RomImage::from_file).transpose()?,
    };
    let mut machine = (entry.create)(image.as_ref())?;
    machine.reset();
    info!(machine = entry.name, rom = image.as_ref().map(RomImage::name), "machine ready");
    Ok(machine)
}

fn run(args: RunArgs, config: &Config) -> Result<(), FrontendError> {
    let mut machine = create_machine(&args.target, config)?;

    let script_text = args.keys.as_deref().or(config.keys.script.as_deref());
    let script = match script_text {
        Some(text) => KeyScript::parse(text)?,
        None => KeyScript::default(),
    };
    script.check(&KeyMap::new(machine.input_map()))?;

    if args.realtime {
        let runner = Runner::new(config.cpu_clock_hz, config.frame_rate);
        emulator::run_realtime(
            machine.as_mut(),
            &runner,
            config.frame_rate,
            args.seconds,
            &script,
        )?;
    } else {
        emulator::run_frames(machine.as_mut(), args.frames, &script)?;
    }

    if let Some(path) = &args.dump_screen {
        emulator::dump_screen(machine.as_ref(), path)?;
    }
    Ok(())
}
