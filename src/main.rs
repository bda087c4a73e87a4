//! DCPU-16 Emulator - CLI Entry Point
//!
//! Commands:
//! - `dcpu-emu run <image>` - Run a program image on one CPU
//! - `dcpu-emu swarm <image>` - Run many CPUs at a fixed tick rate
//! - `dcpu-emu test` - Built-in self-test

use clap::{Parser, Subcommand, ValueEnum};
use dcpu::image::Endian;
use dcpu::{Cpu, HostConfig, ImageFormat, ProgramImage};

#[derive(Parser)]
#[command(name = "dcpu-emu")]
#[command(version)]
#[command(about = "An emulator for the DCPU-16 16-bit CPU")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program on a single CPU
    Run {
        /// Path to the program image
        image: String,
        /// Image encoding (default: from the file extension)
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,
        /// Load address of the first word
        #[arg(short, long, default_value = "0", value_parser = parse_word)]
        origin: u16,
        /// Maximum number of instructions to execute
        #[arg(short, long, default_value = "10000")]
        max_cycles: u64,
        /// Print every executed instruction
        #[arg(short, long)]
        trace: bool,
        /// Start from a saved CPU snapshot instead of a blank machine
        #[arg(long)]
        resume: Option<String>,
        /// Save the final CPU state to this file
        #[arg(long)]
        snapshot: Option<String>,
    },
    /// Run many independent CPUs at a fixed tick rate
    Swarm {
        /// Path to the program image
        image: String,
        /// Image encoding (default: from the file extension)
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,
        /// JSON host configuration
        #[arg(short, long)]
        config: Option<String>,
        /// Number of CPU instances
        #[arg(short, long)]
        instances: Option<usize>,
        /// Ticks per second (0 = as fast as possible)
        #[arg(long)]
        tick_rate: Option<u32>,
        /// Number of ticks to run
        #[arg(long)]
        ticks: Option<u64>,
        /// Worker threads
        #[arg(long)]
        threads: Option<usize>,
    },
    /// Run the built-in self-test
    Test,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    /// Whitespace-separated hex words
    Hex,
    /// Big-endian binary
    Bin,
    /// Little-endian binary
    BinLe,
}

impl From<FormatArg> for ImageFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Hex => ImageFormat::Hex,
            FormatArg::Bin => ImageFormat::Binary { endian: Endian::Big },
            FormatArg::BinLe => ImageFormat::Binary { endian: Endian::Little },
        }
    }
}

fn parse_word(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse::<u16>(),
    };
    parsed.map_err(|e| format!("invalid address '{}': {}", s, e))
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run { image, format, origin, max_cycles, trace, resume, snapshot }) => {
            run_program(&image, format, origin, max_cycles, trace, resume, snapshot);
        }
        Some(Commands::Swarm { image, format, config, instances, tick_rate, ticks, threads }) => {
            run_swarm(&image, format, config, instances, tick_rate, ticks, threads);
        }
        Some(Commands::Test) => {
            run_self_test();
        }
        None => {
            println!("DCPU-16 Emulator v{}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Use --help for available commands");
        }
    }
}

fn fail(message: String) -> ! {
    eprintln!("❌ {}", message);
    std::process::exit(1);
}

fn load_image(path: &str, format: Option<FormatArg>, origin: u16) -> ProgramImage {
    let format = format.map(ImageFormat::from).unwrap_or_else(|| ImageFormat::from_path(path));

    match ProgramImage::load(path, format) {
        Ok(mut image) => {
            image.origin = origin;
            println!("📂 Loaded {} words at {:#06x}", image.len(), origin);
            image
        }
        Err(e) => fail(format!("Failed to load image: {}", e)),
    }
}

fn run_program(
    path: &str,
    format: Option<FormatArg>,
    origin: u16,
    max_cycles: u64,
    trace: bool,
    resume: Option<String>,
    snapshot: Option<String>,
) {
    use dcpu::{load_snapshot, save_snapshot};

    println!("🔧 Running: {}", path);
    let image = load_image(path, format, origin);

    let mut cpu = match resume {
        Some(state) => match load_snapshot(&state) {
            Ok(cpu) => {
                println!("📂 Resumed from {}", state);
                cpu
            }
            Err(e) => fail(format!("Failed to load snapshot: {}", e)),
        },
        None => Cpu::new(),
    };

    if let Err(e) = image.load_into(&mut cpu) {
        fail(format!("Failed to load program: {}", e));
    }

    println!();
    println!("━━━ Execution ━━━");

    let mut cycles = 0u64;
    while cycles < max_cycles {
        let pc = cpu.pc();

        match cpu.step() {
            Ok(instr) => {
                if trace {
                    println!("{:04x}: {:<20} {:?}", pc, instr.to_string(), cpu.registers());
                }
                cycles += 1;
            }
            Err(e) => fail(format!("CPU fault: {}", e)),
        }
    }

    println!();
    println!("━━━ Result ━━━");
    println!("Cycles: {}", cycles);
    print_registers(&cpu);

    if let Some(path) = snapshot {
        match save_snapshot(&path, &cpu) {
            Ok(()) => println!("✓ Saved state to {}", path),
            Err(e) => fail(format!("Failed to save snapshot: {}", e)),
        }
    }
}

fn print_registers(cpu: &Cpu) {
    use dcpu::Register;

    for reg in Register::ALL {
        println!("{}:  {:#06x} ({})", reg, cpu.register(reg), cpu.register(reg));
    }
    println!("PC: {:#06x}", cpu.pc());
    println!("SP: {:#06x}", cpu.sp());
    println!("O:  {}", u16::from(cpu.overflow()));
}

fn run_swarm(
    path: &str,
    format: Option<FormatArg>,
    config: Option<String>,
    instances: Option<usize>,
    tick_rate: Option<u32>,
    ticks: Option<u64>,
    threads: Option<usize>,
) {
    use dcpu::Host;

    let mut config = match config {
        Some(file) => match HostConfig::from_json_file(&file) {
            Ok(c) => c,
            Err(e) => fail(format!("Failed to read config: {}", e)),
        },
        None => HostConfig::default(),
    };

    if let Some(n) = instances {
        config.instances = n;
    }
    if let Some(hz) = tick_rate {
        config.tick_rate_hz = hz;
    }
    if ticks.is_some() {
        config.max_ticks = ticks;
    }
    if let Some(n) = threads {
        config.threads = n;
    }

    let image = load_image(path, format, config.origin);

    let mut host = match Host::new(config) {
        Ok(h) => h,
        Err(e) => fail(format!("Invalid host configuration: {}", e)),
    };
    if let Err(e) = host.load_all(&image.words) {
        fail(format!("Failed to load program: {}", e));
    }

    match host.run() {
        Ok(summary) => {
            println!();
            println!("━━━ Result ━━━");
            println!("Ticks:        {}", summary.ticks);
            println!("Instructions: {}", summary.instructions);
            println!("Halted:       {}", summary.halted);
        }
        Err(e) => fail(format!("Host stopped: {}", e)),
    }
}

fn run_self_test() {
    use dcpu::cpu::decode::encode;
    use dcpu::{Opcode, Register, Value};

    println!("━━━ DCPU-16 Emulator Self-Test ━━━");
    println!();

    let a = Value::Register(Register::A);
    let mut passed = 0;
    let mut failed = 0;

    let mut check = |name: &str, program: &[u16], steps: u64, verify: &dyn Fn(&Cpu) -> bool| {
        print!("{}... ", name);
        let mut cpu = Cpu::new();
        let ok = cpu.load(0, program).is_ok()
            && cpu.run_limited(steps).is_ok()
            && verify(&cpu);
        if ok {
            println!("✓");
            passed += 1;
        } else {
            println!("✗ {:?}", cpu.registers());
            failed += 1;
        }
    };

    check(
        "SET literal",
        &[encode(Opcode::Set, a, Value::Literal(5))],
        1,
        &|cpu: &Cpu| cpu.register(Register::A) == 5 && cpu.pc() == 1,
    );

    check(
        "ADD wraps and sets O",
        &[
            encode(Opcode::Set, a, Value::NextWordLiteral),
            0xFFFF,
            encode(Opcode::Add, a, Value::Literal(1)),
        ],
        2,
        &|cpu: &Cpu| cpu.register(Register::A) == 0 && cpu.overflow(),
    );

    check(
        "SUB borrow",
        &[encode(Opcode::Sub, a, Value::Literal(1))],
        1,
        &|cpu: &Cpu| cpu.register(Register::A) == 0xFFFF && cpu.overflow(),
    );

    check(
        "DIV by zero",
        &[encode(Opcode::Div, a, Value::Literal(0))],
        1,
        &|cpu: &Cpu| cpu.register(Register::A) == 0 && cpu.overflow(),
    );

    check(
        "PUSH/POP roundtrip",
        &[
            encode(Opcode::Set, Value::Push, Value::Literal(9)),
            encode(Opcode::Set, a, Value::Pop),
        ],
        2,
        &|cpu: &Cpu| cpu.register(Register::A) == 9 && cpu.sp() == 0,
    );

    check(
        "IFE skips on mismatch",
        &[
            encode(Opcode::Ife, a, Value::Literal(1)),
            encode(Opcode::Set, a, Value::Literal(2)),
            encode(Opcode::Set, Value::Register(Register::B), Value::Literal(3)),
        ],
        2,
        &|cpu: &Cpu| cpu.register(Register::A) == 0 && cpu.register(Register::B) == 3,
    );

    check(
        "Reserved opcode is a no-op",
        &[0xFFF0],
        1,
        &|cpu: &Cpu| cpu.pc() == 1 && cpu.registers().gp == [0; 8],
    );

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}
