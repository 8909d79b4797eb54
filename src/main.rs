//! tiny16 Emulator - CLI Entry Point
//!
//! Commands:
//! - `tiny16-emu run <program>` - Run a ROM or ASM file
//! - `tiny16-emu debug <program>` - Interactive debugger
//! - `tiny16-emu asm <source>` - Assemble to a ROM image
//! - `tiny16-emu disasm <rom>` - Disassemble a ROM image
//! - `tiny16-emu test` - Built-in self-test

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tiny16-emu")]
#[command(version = "0.1.0")]
#[command(about = "An emulator for the tiny16 teaching machine")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the ROM or ASM file to execute
        program: String,
        /// Maximum number of cycles to run
        #[arg(short, long, default_value = "1000000")]
        max_cycles: u64,
        /// Print each executed instruction
        #[arg(short, long)]
        trace: bool,
        /// Write the final machine state to a JSON file
        #[arg(long)]
        dump_state: Option<String>,
    },
    /// Interactive debugger
    Debug {
        /// Path to the ROM or ASM file to debug
        program: String,
    },
    /// Assemble source to a ROM image
    Asm {
        /// Path to the source file
        source: String,
        /// Output ROM file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble a ROM image to readable text
    Disasm {
        /// Path to the ROM file
        rom: String,
    },
    /// Run the built-in self-test
    Test,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run {
            program,
            max_cycles,
            trace,
            dump_state,
        }) => {
            run_program(&program, max_cycles, trace, dump_state);
        }
        Some(Commands::Debug { program }) => {
            debug_program(&program);
        }
        Some(Commands::Asm { source, output }) => {
            assemble_file(&source, output);
        }
        Some(Commands::Disasm { rom }) => {
            disassemble_file(&rom);
        }
        Some(Commands::Test) => {
            run_self_test();
        }
        None => {
            println!("tiny16 Emulator v0.1.0");
            println!("A 16-bit teaching machine: 16 registers, 16 opcodes, 64K words");
            println!();
            println!("Use --help for available commands");
            println!();
            demo_machine_primitives();
        }
    }
}

/// Load program words from either an assembly source or a ROM image.
fn load_words(path: &str) -> Vec<u16> {
    use tiny16::{assemble, load_rom};

    if path.ends_with(".asm") {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("❌ Failed to read file: {}", e);
                std::process::exit(1);
            }
        };

        match assemble(&source) {
            Ok(words) => {
                println!("📝 Assembled {} words", words.len());
                words
            }
            Err(e) => {
                eprintln!("❌ Assembly error: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        match load_rom(path) {
            Ok(rom) => {
                println!("📂 Loaded {} words", rom.len());
                rom.words
            }
            Err(e) => {
                eprintln!("❌ Failed to load ROM: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn run_program(path: &str, max_cycles: u64, trace: bool, dump_state: Option<String>) {
    use tiny16::asm::disasm::disassemble_instruction;
    use tiny16::Cpu;

    println!("🔧 Running: {}", path);

    let words = load_words(path);

    if words.is_empty() {
        eprintln!("❌ No instructions to execute");
        std::process::exit(1);
    }

    // Create CPU and load program
    let mut cpu = Cpu::new();
    if let Err(e) = cpu.load_program(&words) {
        eprintln!("❌ Failed to load program: {}", e);
        std::process::exit(1);
    }

    println!();
    println!("━━━ Execution ━━━");

    // Run with optional trace
    let mut executed = 0u64;
    while cpu.is_running() && executed < max_cycles {
        let pc = cpu.pc();

        match cpu.step() {
            Ok(instr) => {
                if trace {
                    println!("{:04X}: {}", pc, disassemble_instruction(instr.encode()));
                }
                executed += 1;
            }
            Err(e) => {
                eprintln!("❌ CPU error at PC={:#06X}: {}", pc, e);
                dump_registers(&cpu);
                std::process::exit(1);
            }
        }
    }

    println!();
    println!("━━━ Result ━━━");
    println!("Cycles: {}", executed);
    println!("State: {:?}", cpu.state);
    dump_registers(&cpu);

    if executed >= max_cycles && cpu.is_running() {
        println!();
        println!(
            "⚠️  Reached max cycles limit ({}). Use --max-cycles to increase.",
            max_cycles
        );
    }

    if let Some(out_path) = dump_state {
        write_state(&cpu, &out_path);
    }
}

/// Print all 16 registers in binary, the machine's native debug dump.
fn dump_registers(cpu: &tiny16::Cpu) {
    for i in 0..16u8 {
        let value = cpu.regs.read(i);
        println!("r{:<2} {:016b} ({})", i, value, value);
    }
}

/// Serialize the whole machine (registers, memory, counters) to JSON.
fn write_state(cpu: &tiny16::Cpu, path: &str) {
    match serde_json::to_string(cpu) {
        Ok(json) => {
            if let Err(e) = std::fs::write(path, json) {
                eprintln!("❌ Failed to write state file: {}", e);
                std::process::exit(1);
            }
            println!("✓ State written to {}", path);
        }
        Err(e) => {
            eprintln!("❌ Failed to serialize state: {}", e);
            std::process::exit(1);
        }
    }
}

fn debug_program(path: &str) {
    use tiny16::tui::run_debugger;

    println!("🔍 Loading: {}", path);

    let words = load_words(path);

    if words.is_empty() {
        eprintln!("❌ No instructions to execute");
        std::process::exit(1);
    }

    println!("🚀 Launching debugger...");
    println!();

    if let Err(e) = run_debugger(words) {
        eprintln!("❌ Debugger error: {}", e);
        std::process::exit(1);
    }
}

fn assemble_file(source_path: &str, output: Option<String>) {
    use tiny16::asm::disasm::disassemble_instruction;
    use tiny16::{assemble, save_rom, RomFile};

    let out_path = output.unwrap_or_else(|| source_path.replace(".asm", ".rom"));

    println!("📝 Assembling: {} → {}", source_path, out_path);

    // Read source
    let source = match std::fs::read_to_string(source_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to read file: {}", e);
            std::process::exit(1);
        }
    };

    // Assemble
    let words = match assemble(&source) {
        Ok(words) => words,
        Err(e) => {
            eprintln!("❌ Assembly error: {}", e);
            std::process::exit(1);
        }
    };

    println!("✓ Assembled {} words", words.len());

    // Save ROM, annotated with the disassembly of each word
    let rom = RomFile {
        words: words.clone(),
        source_lines: words.iter().map(|&w| disassemble_instruction(w)).collect(),
    };

    if let Err(e) = save_rom(&out_path, &rom) {
        eprintln!("❌ Failed to save ROM: {}", e);
        std::process::exit(1);
    }

    println!("✓ Saved to {}", out_path);
}

fn disassemble_file(rom_path: &str) {
    use tiny16::asm::disasm::disassemble;
    use tiny16::load_rom;

    println!("📖 Disassembling: {}", rom_path);
    println!();

    let rom = match load_rom(rom_path) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("❌ Failed to load ROM: {}", e);
            std::process::exit(1);
        }
    };

    let output = disassemble(&rom.words);
    println!("{}", output);
}

fn demo_machine_primitives() {
    use tiny16::asm::disasm::disassemble_instruction;
    use tiny16::cpu::{alu, decode};

    println!("━━━ tiny16 Demo ━━━");
    println!();

    println!("Instruction words (four nibbles: opcode, dest, reg1, reg2):");
    for word in [0x0123u16, 0xA1FF, 0xF000] {
        let instr = decode::decode(word);
        println!(
            "  {:#06X} = {:016b} → {}  (opcode {:X})",
            word,
            word,
            disassemble_instruction(word),
            instr.opcode.to_nibble()
        );
    }
    println!();

    println!("ALU wraparound arithmetic (mod 2^16):");
    println!("  0xFFFF + 1 = {:#06X}", alu::add(0xFFFF, 1));
    println!("  0 - 1      = {:#06X}", alu::sub(0, 1));
    println!("  NOT 0      = {:#06X}", alu::not(0, 0));
    println!();

    println!("✓ Core machine primitives working!");
}

fn run_self_test() {
    use tiny16::cpu::{alu, decode::Opcode};
    use tiny16::{assemble, parse_rom, Cpu, RegisterFile};

    println!("━━━ tiny16 Emulator Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;

    // Test 1: ALU wraparound
    print!("ALU wraparound arithmetic... ");
    if alu::add(0xFFFF, 1) == 0 && alu::sub(0, 1) == 0xFFFF && alu::mul(0x4000, 4) == 0 {
        println!("✓");
        passed += 1;
    } else {
        println!("✗");
        failed += 1;
    }

    // Test 2: NOT ignores its second operand
    print!("NOT ignores second operand... ");
    if alu::not(0x00FF, 7) == alu::not(0x00FF, 0) && alu::not(0x00FF, 7) == 0xFF00 {
        println!("✓");
        passed += 1;
    } else {
        println!("✗");
        failed += 1;
    }

    // Test 3: Opcode encoding roundtrip
    print!("Opcode nibble roundtrip... ");
    let mut ok = true;
    for nibble in 0..16u8 {
        if Opcode::from_nibble(nibble).to_nibble() != nibble {
            ok = false;
            break;
        }
    }
    if ok {
        println!("✓");
        passed += 1;
    } else {
        println!("✗");
        failed += 1;
    }

    // Test 4: r0 is hardwired to zero
    print!("r0 discards writes... ");
    let mut regs = RegisterFile::new();
    regs.write(0, 0xFFFF);
    if regs.read(0) == 0 {
        println!("✓");
        passed += 1;
    } else {
        println!("✗");
        failed += 1;
    }

    // Test 5: HLT leaves the PC on itself
    print!("CPU halt instruction... ");
    let mut cpu = Cpu::new();
    cpu.load_program(&[0xF000]).unwrap();
    let result = cpu.run();
    if result.is_ok() && cpu.is_halted() && cpu.pc() == 0 {
        println!("✓");
        passed += 1;
    } else {
        println!("✗");
        failed += 1;
    }

    // Test 6: assembled countdown program
    print!("Assembled countdown runs... ");
    let source = "ADDI r1, #5\nLOOP: ADDI r1, #-1\nBNE r1, LOOP\nHLT\n";
    let mut cpu = Cpu::new();
    cpu.load_program(&assemble(source).unwrap()).unwrap();
    cpu.run().unwrap();
    if cpu.is_halted() && cpu.regs.read(1) == 0 {
        println!("✓");
        passed += 1;
    } else {
        println!("✗ (r1 = {})", cpu.regs.read(1));
        failed += 1;
    }

    // Test 7: ROM format validation
    print!("ROM format rejects bad lines... ");
    if parse_rom("0000000000000002\n").is_err() && parse_rom("101\n").is_err() {
        println!("✓");
        passed += 1;
    } else {
        println!("✗");
        failed += 1;
    }

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}
