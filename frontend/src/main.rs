use std::path::PathBuf;
use std::process::ExitCode;

use backplane_core::card::DaisyLine;
use backplane_core::core::{Bus, BusMaster, HostRam};
use backplane_core::slotbus::SlotBus;
use backplane_machines::{BusConfig, registry};
use clap::Parser;
use log::info;

/// Assemble a slot bus from a TOML description and report its state.
#[derive(Parser)]
#[command(about)]
struct Args {
    /// Bus configuration file
    #[arg(required_unless_present = "list_cards")]
    config: Option<PathBuf>,

    /// List the card kinds a configuration may name
    #[arg(long)]
    list_cards: bool,

    /// Read an address through the bus (hex, e.g. C800); repeatable, in order
    #[arg(long = "read", value_name = "ADDR", value_parser = parse_addr)]
    reads: Vec<u16>,
}

fn parse_addr(s: &str) -> Result<u16, String> {
    let digits = s.trim_start_matches('$').trim_start_matches("0x");
    u16::from_str_radix(digits, 16).map_err(|e| format!("{s:?}: {e}"))
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    if args.list_cards {
        for entry in registry::all() {
            println!("{:<14} {}", entry.name, entry.summary);
        }
        return ExitCode::SUCCESS;
    }

    let Some(path) = args.config else {
        return ExitCode::FAILURE;
    };
    let mut bus = match BusConfig::load(&path).and_then(|c| c.build(HostRam::full())) {
        Ok(bus) => bus,
        Err(e) => {
            eprintln!("{}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    };
    info!("loaded {}", path.display());

    for addr in args.reads {
        let data = bus.read(BusMaster::Cpu(0), addr);
        println!("read ${addr:04X} = ${data:02X}");
    }
    report(&bus);
    ExitCode::SUCCESS
}

fn report(bus: &SlotBus) {
    let layout = bus.layout();
    for slot in bus.slots() {
        let window = layout.io_window(slot.index());
        println!(
            "slot {}  ${:04X}-${:04X}  {}",
            slot.index(),
            window.start,
            window.end,
            slot.label().unwrap_or("-")
        );
    }

    let overlay = bus.overlay_map();
    if overlay.is_empty() {
        println!("overlay: none");
    }
    for region in overlay.regions() {
        println!(
            "overlay ${:04X}-${:04X}  read {:?}  write {:?}",
            region.start, region.end, region.read, region.write
        );
    }

    println!("extended window owner: {:?}", bus.extended_owner());
    let daisy = bus.daisy_latches();
    for line in DaisyLine::ALL {
        println!("daisy {line:?} latched: {:?}", daisy.get(line));
    }
    let lines = bus.lines();
    let interrupts = bus.check_interrupts(BusMaster::Cpu(0));
    println!(
        "lines: halt-req {}  halt-ack {}  irq {}  nmi {}",
        lines.halt_request, lines.halt_acknowledge, interrupts.irq, interrupts.nmi
    );
}
