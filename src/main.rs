//! 6502 Emulator - CLI Entry Point
//!
//! Commands:
//! - `mos6502-emu run <program>` - Run a binary or hex-listing image
//! - `mos6502-emu disasm <program>` - Disassemble an image
//! - `mos6502-emu test` - Run the built-in self-test

use clap::{Parser, Subcommand};
use mos6502::cpu::{Cpu, CpuError, Memory};
use mos6502::dis::{disassemble, disassemble_at};
use mos6502::rom::load_rom;

#[derive(Parser)]
#[command(name = "mos6502-emu")]
#[command(version = "0.1.0")]
#[command(about = "An instruction-level emulator of the MOS 6502 processor")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until an unknown opcode or the cycle limit
    Run {
        /// Path to the binary (or .hex listing) to execute
        program: String,
        /// Load origin for the image
        #[arg(short, long, default_value = "0x0600", value_parser = parse_addr)]
        origin: u16,
        /// Entry address (defaults to the load origin)
        #[arg(short, long, value_parser = parse_addr)]
        entry: Option<u16>,
        /// Maximum number of instructions to execute
        #[arg(short, long, default_value = "10000")]
        max_cycles: u64,
        /// Show a disassembled trace of each instruction
        #[arg(short, long)]
        trace: bool,
        /// Sleep this many milliseconds between instructions
        #[arg(long, default_value = "0")]
        throttle: u64,
        /// Hexdump this 256-byte page after the run (e.g. 0x02)
        #[arg(long, value_parser = parse_addr)]
        dump_page: Option<u16>,
        /// Write the final registers as JSON to this file
        #[arg(long)]
        state_json: Option<String>,
    },
    /// Disassemble an image to readable text
    Disasm {
        /// Path to the binary (or .hex listing)
        program: String,
        /// Address the image would be loaded at
        #[arg(short, long, default_value = "0x0600", value_parser = parse_addr)]
        origin: u16,
    },
    /// Run the built-in self-test
    Test,
}

/// Parse an address in decimal, `0x`, or `$` notation.
fn parse_addr(s: &str) -> Result<u16, String> {
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16)
    } else if let Some(hex) = s.strip_prefix('$') {
        u16::from_str_radix(hex, 16)
    } else {
        s.parse()
    };
    parsed.map_err(|_| format!("invalid address `{}`", s))
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run {
            program,
            origin,
            entry,
            max_cycles,
            trace,
            throttle,
            dump_page,
            state_json,
        }) => {
            run_program(
                &program,
                origin,
                entry.unwrap_or(origin),
                max_cycles,
                trace,
                throttle,
                dump_page,
                state_json,
            );
        }
        Some(Commands::Disasm { program, origin }) => {
            disassemble_file(&program, origin);
        }
        Some(Commands::Test) => {
            run_self_test();
        }
        None => {
            println!("6502 Emulator v0.1.0");
            println!("An instruction-level MOS 6502 emulator");
            println!();
            println!("Use --help for available commands");
            println!();
            demo_program();
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_program(
    path: &str,
    origin: u16,
    entry: u16,
    max_cycles: u64,
    trace: bool,
    throttle: u64,
    dump_page: Option<u16>,
    state_json: Option<String>,
) {
    println!("Running: {} (origin ${:04X}, entry ${:04X})", path, origin, entry);

    let rom = match load_rom(path, origin) {
        Ok(rom) => rom,
        Err(e) => {
            eprintln!("Failed to load image: {}", e);
            std::process::exit(1);
        }
    };

    if rom.is_empty() {
        eprintln!("No bytes to execute");
        std::process::exit(1);
    }
    println!("Loaded {} bytes", rom.len());

    let mut mem = Memory::new();
    if let Err(e) = rom.load_into(&mut mem) {
        eprintln!("Failed to place image: {}", e);
        std::process::exit(1);
    }

    let mut cpu = Cpu::new(&mut mem, entry);

    println!();
    println!("--- Execution ---");

    let halt = loop {
        if cpu.cycles >= max_cycles {
            break None;
        }
        if trace {
            let pc = cpu.regs.pc;
            let (text, _) = disassemble_at(cpu.mem(), pc);
            println!(
                "{:04X}: {:<14} A={:02X} X={:02X} Y={:02X} S={:02X} P={}",
                pc, text, cpu.regs.a, cpu.regs.x, cpu.regs.y, cpu.regs.s, cpu.regs.p
            );
        }
        match cpu.step() {
            Ok(_) => {
                if throttle > 0 {
                    std::thread::sleep(std::time::Duration::from_millis(throttle));
                }
            }
            Err(err) => break Some(err),
        }
    };

    println!();
    println!("--- Result ---");
    match halt {
        Some(CpuError::UnknownOpcode { opcode, at }) => {
            println!("Halted: unknown opcode ${:02X} at ${:04X}", opcode, at);
        }
        None => {
            println!(
                "Reached max cycles limit ({}). Use --max-cycles to increase.",
                max_cycles
            );
        }
    }
    println!("Cycles: {}", cpu.cycles);
    println!("A:  ${:02X}", cpu.regs.a);
    println!("X:  ${:02X}", cpu.regs.x);
    println!("Y:  ${:02X}", cpu.regs.y);
    println!("S:  ${:02X}", cpu.regs.s);
    println!("PC: ${:04X}", cpu.regs.pc);
    println!("P:  {}", cpu.regs.p);

    if let Some(path) = state_json {
        match serde_json::to_string_pretty(&cpu.regs) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&path, json) {
                    eprintln!("Failed to write {}: {}", path, e);
                    std::process::exit(1);
                }
                println!("Registers written to {}", path);
            }
            Err(e) => {
                eprintln!("Failed to serialize registers: {}", e);
                std::process::exit(1);
            }
        }
    }

    if let Some(page) = dump_page {
        println!();
        dump_memory_page(cpu.mem(), page);
    }
}

/// Hexdump one 256-byte page, 16 bytes per row.
fn dump_memory_page(mem: &Memory, page: u16) {
    let page = page & 0xFF;
    let base = page << 8;
    println!("--- Page ${:02X} ---", page);
    for row in 0..16u16 {
        let start = base + row * 16;
        let bytes: Vec<String> = mem
            .slice(start, 16)
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect();
        println!("{:04X}: {}", start, bytes.join(" "));
    }
}

fn disassemble_file(path: &str, origin: u16) {
    let rom = match load_rom(path, origin) {
        Ok(rom) => rom,
        Err(e) => {
            eprintln!("Failed to load image: {}", e);
            std::process::exit(1);
        }
    };

    print!("{}", disassemble(&rom.data, origin));
}

/// Run a tiny built-in demo: LDA #$05 then ADC #$03.
fn demo_program() {
    let mut mem = Memory::new();
    mem.load(0x0600, &[0xA9, 0x05, 0x69, 0x03])
        .expect("demo program fits");
    println!("--- Demo: LDA #$05 / ADC #$03 at $0600 ---");

    let mut cpu = Cpu::new(&mut mem, 0x0600);
    for _ in 0..2 {
        let pc = cpu.regs.pc;
        let (text, _) = disassemble_at(cpu.mem(), pc);
        match cpu.step() {
            Ok(_) => println!("{:04X}: {:<10} A={:02X} P={}", pc, text, cpu.regs.a, cpu.regs.p),
            Err(e) => {
                eprintln!("CPU error: {}", e);
                return;
            }
        }
    }

    println!();
    println!("A = ${:02X} after two instructions", cpu.regs.a);
}

fn run_self_test() {
    println!("--- 6502 Emulator Self-Test ---");
    println!();

    let mut passed = 0;
    let mut failed = 0;
    let mut check = |name: &str, ok: bool| {
        if ok {
            println!("{}... ok", name);
            passed += 1;
        } else {
            println!("{}... FAILED", name);
            failed += 1;
        }
    };

    // Load sets N/Z from the value
    {
        let mut mem = Memory::new();
        mem.load(0x0600, &[0xA9, 0x00]).unwrap();
        let mut cpu = Cpu::new(&mut mem, 0x0600);
        let ok = cpu.step().is_ok() && cpu.regs.p.zero() && !cpu.regs.p.negative();
        check("load sets zero flag", ok);
    }

    // LDA #$05 / ADC #$03 end-to-end
    {
        let mut mem = Memory::new();
        mem.load(0x0600, &[0xA9, 0x05, 0x69, 0x03]).unwrap();
        let mut cpu = Cpu::new(&mut mem, 0x0600);
        let ok = cpu.run_limited(2).is_ok()
            && cpu.regs.a == 8
            && !cpu.regs.p.carry()
            && cpu.regs.pc == 0x0604;
        check("immediate add", ok);
    }

    // ASL of $80 carries out and zeroes
    {
        let mut mem = Memory::new();
        mem.load(0x0600, &[0xA9, 0x80, 0x0A]).unwrap();
        let mut cpu = Cpu::new(&mut mem, 0x0600);
        let ok = cpu.run_limited(2).is_ok()
            && cpu.regs.a == 0
            && cpu.regs.p.carry()
            && cpu.regs.p.zero();
        check("shift left carry-out", ok);
    }

    // Subroutine call and return round-trip
    {
        let mut mem = Memory::new();
        mem.write(0x0700, 0x60); // RTS
        mem.load(0x0600, &[0x20, 0x00, 0x07]).unwrap();
        let mut cpu = Cpu::new(&mut mem, 0x0600);
        let ok = cpu.run_limited(2).is_ok() && cpu.regs.pc == 0x0603 && cpu.regs.s == 0;
        check("jsr/rts round-trip", ok);
    }

    // Unknown opcode reports and stops
    {
        let mut mem = Memory::new();
        mem.write(0x0600, 0xFF);
        let mut cpu = Cpu::new(&mut mem, 0x0600);
        let ok = matches!(
            cpu.step(),
            Err(CpuError::UnknownOpcode {
                opcode: 0xFF,
                at: 0x0600
            })
        ) && cpu.regs.pc == 0x0601;
        check("unknown opcode halt", ok);
    }

    println!();
    println!("Results: {} passed, {} failed", passed, failed);
    if failed > 0 {
        std::process::exit(1);
    }
}
