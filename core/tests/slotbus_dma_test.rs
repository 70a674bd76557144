mod common;

use backplane_core::card::{Card, FLOATING_BUS, Window};
use backplane_core::core::{Bus, BusMaster, HostLines, HostMemory, HostRam};
use backplane_core::device::{BankRam, DmaCard};
use backplane_core::slotbus::{DecodeLayout, Grant, SlotBus};
use common::{CPU, ProbeCard, build, io};
use pretty_assertions::assert_eq;

const START: u8 = 0x01;
const FILL: u8 = 0x02;
const IRQ: u8 = 0x04;
const STATUS: u16 = 7;
const STATUS_REFUSED: u8 = 0x04;

fn card(card: impl Card + 'static) -> Box<dyn Card> {
    Box::new(card)
}

fn bus_with(cards: Vec<(usize, Box<dyn Card>)>) -> SlotBus {
    build(DecodeLayout::apple2(), HostRam::full(), cards)
}

fn program(bus: &mut SlotBus, slot: usize, src: u16, dst: u16, count: u16, control: u8) {
    let base = io(bus, slot, 0);
    for (i, word) in [src, dst, count].into_iter().enumerate() {
        let [lo, hi] = word.to_le_bytes();
        bus.write(CPU, base + i as u16 * 2, lo);
        bus.write(CPU, base + i as u16 * 2 + 1, hi);
    }
    bus.write(CPU, base + STATUS, control);
}

/// Step the bus master until it lets go, returning the cycles run.
fn run_master(bus: &mut SlotBus) -> usize {
    let mut cycles = 0;
    while bus.step_master() {
        cycles += 1;
        assert!(cycles < 100_000, "transfer did not complete");
    }
    cycles
}

// ===== Grant scenario =====

#[test]
fn test_bus_master_write_visible_to_host_after_release() {
    let mut bus = bus_with(vec![(4, card(DmaCard::new()))]);
    assert!(!bus.is_halted_for(CPU));

    bus.write(CPU, io(&bus, 4, 6), 0xAB);
    program(&mut bus, 4, 0, 0x2000, 1, START | FILL);

    assert_eq!(bus.holder(), Some(4));
    assert_eq!(bus.bus_master(), BusMaster::Card(4));
    assert_eq!(
        bus.lines(),
        HostLines {
            halt_request: true,
            halt_acknowledge: true
        }
    );
    assert!(bus.is_halted_for(CPU));
    assert!(!bus.is_halted_for(BusMaster::Card(4)));

    assert_eq!(run_master(&mut bus), 1);
    assert_eq!(bus.read(CPU, 0x2000), 0xAB);

    assert_eq!(bus.holder(), None);
    assert_eq!(bus.lines(), HostLines::default());
    assert!(!bus.is_halted_for(CPU));
    assert!(!bus.step_master());
}

#[test]
fn test_copy_takes_two_cycles_per_byte() {
    let mut bus = bus_with(vec![(2, card(DmaCard::new()))]);
    bus.host_mut().load(0x1000, &[1, 2, 3, 4]);
    program(&mut bus, 2, 0x1000, 0x3000, 4, START);
    assert_eq!(run_master(&mut bus), 8);
    for (i, expected) in [1, 2, 3, 4].into_iter().enumerate() {
        assert_eq!(bus.read(CPU, 0x3000 + i as u16), expected);
    }
}

#[test]
fn test_master_cycles_use_the_overlay_path() {
    let mut bus = bus_with(vec![
        (1, card(BankRam::new(0xD000, 0xD0FF, 1))),
        (4, card(DmaCard::new())),
    ]);
    bus.write(CPU, io(&bus, 1, 0), 0x03);
    bus.host_mut().load(0x1000, &[0xC0, 0xDE]);

    program(&mut bus, 4, 0x1000, 0xD000, 2, START);
    run_master(&mut bus);

    assert_eq!(bus.read(CPU, 0xD000), 0xC0);
    assert_eq!(bus.read(CPU, 0xD001), 0xDE);
    assert_eq!(bus.host_mut().read(0xD000), Some(0x00));
}

// ===== Refusal =====

#[test]
fn test_second_requester_refused_not_queued() {
    let mut bus = bus_with(vec![(2, card(DmaCard::new())), (5, card(DmaCard::new()))]);
    program(&mut bus, 5, 0x1000, 0x3000, 3, START);
    assert_eq!(bus.holder(), Some(5));

    program(&mut bus, 2, 0x1000, 0x4000, 3, START);
    assert_eq!(bus.holder(), Some(5));
    let status = bus.read(CPU, io(&bus, 2, STATUS));
    assert_eq!(status & STATUS_REFUSED, STATUS_REFUSED);

    run_master(&mut bus);
    // The refused request was dropped, so the bus goes back to the CPU.
    assert_eq!(bus.holder(), None);

    program(&mut bus, 2, 0x1000, 0x4000, 3, START);
    assert_eq!(bus.holder(), Some(2));
}

#[test]
fn test_grant_and_release_alternate() {
    let mut bus = bus_with(vec![(3, card(DmaCard::new()))]);
    for round in 0..4 {
        program(&mut bus, 3, 0, 0x2000 + round, 1, START | FILL);
        assert_eq!(bus.holder(), Some(3), "round {round}");
        run_master(&mut bus);
        assert_eq!(bus.holder(), None, "round {round}");
    }
}

#[test]
fn test_gate_api_refuses_while_held() {
    let mut bus = bus_with(vec![
        (1, card(ProbeCard::new(1))),
        (2, card(DmaCard::new())),
        (6, card(DmaCard::new())),
    ]);
    assert_eq!(bus.request_bus_master(1), None, "no bus-master card");
    program(&mut bus, 6, 0, 0x2000, 2, START | FILL);
    assert_eq!(bus.request_bus_master(6), Some(Grant::AlreadyHeld));
    assert_eq!(bus.request_bus_master(2), Some(Grant::Refused { holder: 6 }));
    assert!(!bus.release_bus_master(2));
    assert_eq!(bus.holder(), Some(6));
}

#[test]
fn test_non_holder_card_access_refused() {
    let mut bus = bus_with(vec![(2, card(DmaCard::new()))]);
    bus.host_mut().load(0x1000, &[0x5A]);
    assert_eq!(bus.read(BusMaster::Card(2), 0x1000), FLOATING_BUS);
    bus.write(BusMaster::Card(2), 0x1000, 0x00);
    assert_eq!(bus.read(CPU, 0x1000), 0x5A);
    assert!(bus.is_halted_for(BusMaster::Card(2)));
}

// ===== Completion and reset =====

#[test]
fn test_completion_interrupt() {
    let mut bus = bus_with(vec![(2, card(DmaCard::new()))]);
    program(&mut bus, 2, 0, 0x2000, 1, START | FILL | IRQ);
    assert!(!bus.check_interrupts(CPU).irq);
    run_master(&mut bus);
    assert!(bus.check_interrupts(CPU).irq);
    assert!(!bus.check_interrupts(BusMaster::Card(2)).irq);

    bus.read(CPU, io(&bus, 2, STATUS));
    assert!(!bus.check_interrupts(CPU).irq);
}

#[test]
fn test_reset_revokes_grant_mid_transfer() {
    let mut bus = bus_with(vec![(2, card(DmaCard::new()))]);
    program(&mut bus, 2, 0x1000, 0x3000, 10, START);
    bus.step_master();
    bus.step_master();
    assert_eq!(bus.holder(), Some(2));

    bus.reset();
    assert_eq!(bus.holder(), None);
    assert_eq!(bus.lines(), HostLines::default());
    assert!(!bus.is_halted_for(CPU));
    assert!(!bus.step_master());
    assert_eq!(bus.read(CPU, io(&bus, 2, STATUS)), 0x00);
}

// ===== Card-side events =====

#[test]
fn test_card_side_start_takes_bus_before_returning() {
    let mut bus = bus_with(vec![(3, card(DmaCard::new()))]);
    bus.with_card_mut(3, |dma| {
        dma.write(Window::Io, 4, 2);
        dma.write(Window::Io, STATUS, START | FILL);
    });
    assert_eq!(bus.holder(), Some(3));
    assert!(bus.is_halted_for(CPU));
    assert_eq!(run_master(&mut bus), 2);
    assert_eq!(bus.holder(), None);
}
