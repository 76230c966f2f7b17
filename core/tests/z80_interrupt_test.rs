use std::thread;

use zeta_core::cpu::z80::Z80;
use zeta_core::cpu::{Cpu, InterruptRequest};
mod common;
use common::TestBus;

fn run_instruction(cpu: &mut Z80, bus: &mut TestBus) -> u32 {
    cpu.step(bus).unwrap()
}

/// CPU with interrupts enabled, SP at 0xF000 and NOPs everywhere.
fn enabled(im: u8) -> (Z80, TestBus) {
    let mut cpu = Z80::new();
    let bus = TestBus::new();
    cpu.regs.sp.set(0xF000);
    cpu.iff1 = true;
    cpu.iff2 = true;
    cpu.im = im;
    (cpu, bus)
}

// ============================================================
// NMI
// ============================================================

#[test]
fn test_nmi_pushes_pc_and_jumps() {
    let (mut cpu, mut bus) = enabled(1);
    cpu.regs.pc.set(0x1234);
    cpu.request_nmi();

    let cycles = run_instruction(&mut cpu, &mut bus);
    assert_eq!(cycles, 11);
    assert_eq!(cpu.pc(), 0x0066);
    assert_eq!(cpu.regs.sp(), 0xEFFE);
    assert_eq!(bus.memory.peek16(0xEFFE), 0x1234);
    assert!(!cpu.iff1);
    assert!(cpu.iff2, "IFF2 remembers IFF1");
    assert!(!cpu.interrupt_lines().nmi_pending());
}

#[test]
fn test_retn_restores_iff1() {
    let (mut cpu, mut bus) = enabled(1);
    bus.load(0x0066, &[0xED, 0x45]); // RETN
    cpu.regs.pc.set(0x0200);
    cpu.request_nmi();

    run_instruction(&mut cpu, &mut bus);
    let cycles = run_instruction(&mut cpu, &mut bus);
    assert_eq!(cycles, 14);
    assert_eq!(cpu.pc(), 0x0200);
    assert!(cpu.iff1);
    assert_eq!(bus.reti_count, 0);
}

#[test]
fn test_nmi_ignores_mask_and_wins_over_int() {
    let (mut cpu, mut bus) = enabled(1);
    cpu.iff1 = false;
    cpu.request_interrupt(0xFF);
    cpu.request_nmi();

    run_instruction(&mut cpu, &mut bus);
    assert_eq!(cpu.pc(), 0x0066);
    assert!(cpu.interrupt_lines().int_pending());
}

#[test]
fn test_nmi_not_held_back_by_ei() {
    let (mut cpu, mut bus) = enabled(1);
    cpu.iff1 = false;
    cpu.iff2 = false;
    bus.load(0x0000, &[0xFB]); // EI

    run_instruction(&mut cpu, &mut bus);
    cpu.request_nmi();
    let cycles = run_instruction(&mut cpu, &mut bus);
    assert_eq!(cycles, 11);
    assert_eq!(cpu.pc(), 0x0066);
    assert_eq!(bus.memory.peek16(0xEFFE), 0x0001);
    assert!(cpu.iff2, "EI had already set IFF1");
}

#[test]
fn test_int_still_waits_one_instruction_after_ei() {
    let (mut cpu, mut bus) = enabled(1);
    cpu.iff1 = false;
    cpu.iff2 = false;
    bus.load(0x0000, &[0xFB]); // EI, then NOPs

    run_instruction(&mut cpu, &mut bus);
    cpu.request_interrupt(0xFF);
    run_instruction(&mut cpu, &mut bus);
    assert_eq!(cpu.pc(), 0x0002);
    run_instruction(&mut cpu, &mut bus);
    assert_eq!(cpu.pc(), 0x0038);
}

// ============================================================
// Maskable interrupt modes
// ============================================================

#[test]
fn test_im1_restarts_at_38() {
    let (mut cpu, mut bus) = enabled(1);
    cpu.regs.pc.set(0x4000);
    cpu.request_interrupt(0xFF);

    let cycles = run_instruction(&mut cpu, &mut bus);
    assert_eq!(cycles, 13);
    assert_eq!(cpu.pc(), 0x0038);
    assert_eq!(bus.memory.peek16(0xEFFE), 0x4000);
    assert!(!cpu.iff1);
    assert!(!cpu.iff2);
    assert!(!cpu.interrupt_lines().int_pending());
}

#[test]
fn test_im2_vectors_through_table() {
    let (mut cpu, mut bus) = enabled(2);
    cpu.regs.i.set(0x40);
    bus.load(0x4010, &[0x34, 0x12]);
    cpu.request_interrupt(0x10);

    let cycles = run_instruction(&mut cpu, &mut bus);
    assert_eq!(cycles, 19);
    assert_eq!(cpu.pc(), 0x1234);
    assert_eq!(bus.memory.peek16(0xEFFE), 0x0000);
}

#[test]
fn test_im0_executes_data_bus_opcode() {
    let (mut cpu, mut bus) = enabled(0);
    cpu.regs.pc.set(0x0300);
    cpu.request_interrupt(0xCF); // RST 08h

    let cycles = run_instruction(&mut cpu, &mut bus);
    assert_eq!(cycles, 13);
    assert_eq!(cpu.pc(), 0x0008);
    assert_eq!(bus.memory.peek16(0xEFFE), 0x0300);
}

#[test]
fn test_reti_signals_bus() {
    let (mut cpu, mut bus) = enabled(1);
    bus.load(0x0038, &[0xFB, 0xED, 0x4D]); // EI; RETI
    cpu.regs.pc.set(0x0500);
    cpu.request_interrupt(0xFF);

    run_instruction(&mut cpu, &mut bus);
    run_instruction(&mut cpu, &mut bus);
    assert_eq!(run_instruction(&mut cpu, &mut bus), 14);
    assert_eq!(cpu.pc(), 0x0500);
    assert!(cpu.iff1);
    assert_eq!(bus.reti_count, 1);
}

// ============================================================
// Masking and EI delay
// ============================================================

#[test]
fn test_masked_int_stays_pending() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.regs.sp.set(0xF000);
    cpu.im = 1;
    bus.load(0, &[0x00, 0xFB, 0x00, 0x00]); // NOP; EI; NOP; NOP
    cpu.request_interrupt(0xFF);

    assert_eq!(run_instruction(&mut cpu, &mut bus), 4);
    assert!(cpu.interrupt_lines().int_pending());
    run_instruction(&mut cpu, &mut bus); // EI
    run_instruction(&mut cpu, &mut bus); // NOP runs before acceptance
    assert_eq!(cpu.pc(), 3);

    assert_eq!(run_instruction(&mut cpu, &mut bus), 13);
    assert_eq!(cpu.pc(), 0x0038);
    assert_eq!(bus.memory.peek16(0xEFFE), 0x0003);
}

#[test]
fn test_di_masks_requests() {
    let (mut cpu, mut bus) = enabled(1);
    bus.load(0, &[0xF3, 0x00]); // DI; NOP

    run_instruction(&mut cpu, &mut bus);
    cpu.request_interrupt(0xFF);
    run_instruction(&mut cpu, &mut bus);
    assert_eq!(cpu.pc(), 2);
    assert!(!cpu.iff1);
    assert!(!cpu.iff2);
}

#[test]
fn test_withdrawn_int_is_not_taken() {
    let (mut cpu, mut bus) = enabled(1);
    cpu.request_interrupt(0xFF);
    cpu.interrupt_lines().withdraw_int();

    run_instruction(&mut cpu, &mut bus);
    assert_eq!(cpu.pc(), 1);
}

// ============================================================
// HALT
// ============================================================

#[test]
fn test_halt_idles_until_interrupt() {
    let (mut cpu, mut bus) = enabled(1);
    bus.load(0, &[0x76]); // HALT

    assert_eq!(run_instruction(&mut cpu, &mut bus), 4);
    assert!(cpu.halted);
    assert!(cpu.is_sleeping());
    assert_eq!(cpu.pc(), 1);

    let r = cpu.regs.r.value();
    for _ in 0..10 {
        assert_eq!(run_instruction(&mut cpu, &mut bus), 4);
    }
    assert_eq!(cpu.pc(), 1);
    assert_eq!(cpu.regs.r.value(), r + 10);

    cpu.request_interrupt(0xFF);
    assert_eq!(run_instruction(&mut cpu, &mut bus), 13);
    assert!(!cpu.halted);
    assert_eq!(cpu.pc(), 0x0038);
    assert_eq!(bus.memory.peek16(0xEFFE), 0x0001, "returns past the HALT");
}

#[test]
fn test_halt_with_interrupts_disabled_stays_halted() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    bus.load(0, &[0x76]);
    cpu.request_interrupt(0xFF);

    run_instruction(&mut cpu, &mut bus);
    run_instruction(&mut cpu, &mut bus);
    assert!(cpu.halted);
    assert_eq!(cpu.pc(), 1);
}

// ============================================================
// Request plumbing
// ============================================================

#[test]
fn test_signal_interrupt_through_trait() {
    let (mut cpu, mut bus) = enabled(2);
    cpu.regs.i.set(0x80);
    bus.load(0x80FE, &[0x00, 0x90]);

    cpu.signal_interrupt(InterruptRequest::Int { data_bus: 0xFE });
    run_instruction(&mut cpu, &mut bus);
    assert_eq!(cpu.pc(), 0x9000);

    cpu.signal_interrupt(InterruptRequest::Nmi);
    run_instruction(&mut cpu, &mut bus);
    assert_eq!(cpu.pc(), 0x0066);
}

#[test]
fn test_request_from_another_thread() {
    let (mut cpu, mut bus) = enabled(1);
    let lines = cpu.interrupt_lines();
    thread::spawn(move || lines.request_int_with(0xFF))
        .join()
        .unwrap();

    run_instruction(&mut cpu, &mut bus);
    assert_eq!(cpu.pc(), 0x0038);
}

#[test]
fn test_reset_drops_pending_requests() {
    let (mut cpu, mut bus) = enabled(1);
    cpu.request_nmi();
    cpu.request_interrupt(0x00);
    cpu.reset();

    run_instruction(&mut cpu, &mut bus);
    assert_eq!(cpu.pc(), 1);
}
