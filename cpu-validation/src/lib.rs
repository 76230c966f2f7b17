//! Single-instruction test vectors for the Z80 core.
//!
//! Vectors use the SingleStepTests JSON layout: an initial machine state,
//! one instruction executed, and the expected final state. Files may be
//! plain `.json` or gzip-compressed `.json.gz`.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use rand::Rng;
use serde::{Deserialize, Serialize};
use zeta_core::core::{Bus, FLOATING_BUS, Memory};
use zeta_core::cpu::z80::{Pair, Reg8, Z80};
use zeta_core::cpu::{CpuStateTrait, Z80State};

/// Undocumented flag bits 3 and 5 are not modelled.
pub const FLAG_MASK: u8 = 0xD7;

const AF_MASK: u16 = 0xFF00 | FLAG_MASK as u16;

// --- ValidationBus: flat 64KB memory with a port log ---

/// One port access as recorded in a vector: `(port, data, "r" | "w")`.
pub type PortAccess = (u16, u8, String);

pub struct ValidationBus {
    pub memory: Memory,
    /// Values served to port reads in order, whatever the port.
    pub port_input: VecDeque<u8>,
    pub ports: Vec<PortAccess>,
}

impl ValidationBus {
    pub fn new() -> Self {
        Self {
            memory: Memory::new(),
            port_input: VecDeque::new(),
            ports: Vec::new(),
        }
    }
}

impl Default for ValidationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for ValidationBus {
    fn memory(&mut self) -> &mut Memory {
        &mut self.memory
    }

    fn io_read(&mut self, port: u16) -> u8 {
        let data = self.port_input.pop_front().unwrap_or(FLOATING_BUS);
        self.ports.push((port, data, "r".to_string()));
        data
    }

    fn io_write(&mut self, port: u16, data: u8) {
        self.ports.push((port, data, "w".to_string()));
    }
}

// --- JSON test vector types ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Z80TestCase {
    pub name: String,
    pub initial: Z80CpuState,
    #[serde(rename = "final")]
    pub final_state: Z80CpuState,
    /// One entry per T-state: `(address, data, pin activity)`.
    pub cycles: Vec<(Option<u16>, Option<u8>, String)>,
    #[serde(default)]
    pub ports: Vec<PortAccess>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Z80CpuState {
    pub pc: u16,
    pub sp: u16,
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub f: u8,
    pub h: u8,
    pub l: u8,
    pub i: u8,
    pub r: u8,
    pub ei: u8,
    pub wz: u16,
    pub ix: u16,
    pub iy: u16,
    #[serde(rename = "af_")]
    pub af_prime: u16,
    #[serde(rename = "bc_")]
    pub bc_prime: u16,
    #[serde(rename = "de_")]
    pub de_prime: u16,
    #[serde(rename = "hl_")]
    pub hl_prime: u16,
    pub im: u8,
    pub p: u8,
    pub q: u8,
    pub iff1: u8,
    pub iff2: u8,
    pub ram: Vec<(u16, u8)>,
}

impl Z80CpuState {
    fn from_snapshot(s: &Z80State, ei_delay: bool) -> Self {
        let word = |high: u8, low: u8| u16::from_be_bytes([high, low]);
        Self {
            pc: s.pc,
            sp: s.sp,
            a: s.a,
            b: s.b,
            c: s.c,
            d: s.d,
            e: s.e,
            f: s.f,
            h: s.h,
            l: s.l,
            i: s.i,
            r: s.r,
            ei: ei_delay as u8,
            ix: s.ix,
            iy: s.iy,
            af_prime: word(s.a_prime, s.f_prime),
            bc_prime: word(s.b_prime, s.c_prime),
            de_prime: word(s.d_prime, s.e_prime),
            hl_prime: word(s.h_prime, s.l_prime),
            im: s.im,
            iff1: s.iff1 as u8,
            iff2: s.iff2 as u8,
            ..Self::default()
        }
    }
}

// --- Loading ---

#[derive(Debug)]
pub enum VectorError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for VectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Json(e) => write!(f, "malformed vector file: {e}"),
        }
    }
}

impl std::error::Error for VectorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for VectorError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for VectorError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// True for `.json` and `.json.gz` files.
pub fn is_vector_file(path: &Path) -> bool {
    let name = path.file_name().unwrap_or_default().to_string_lossy();
    name.ends_with(".json") || name.ends_with(".json.gz")
}

/// Read every vector in a `.json` or `.json.gz` file.
pub fn load_vectors(path: &Path) -> Result<Vec<Z80TestCase>, VectorError> {
    let file = BufReader::new(File::open(path)?);
    let reader: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(serde_json::from_reader(reader)?)
}

// --- Running ---

/// Why a vector did not reproduce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    /// The core rejected the opcode.
    Fault(String),
    Register { name: &'static str, got: u16, expected: u16 },
    Memory { addr: u16, got: u8, expected: u8 },
    Cycles { got: u32, expected: usize },
    Ports { got: Vec<PortAccess>, expected: Vec<PortAccess> },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fault(e) => write!(f, "{e}"),
            Self::Register { name, got, expected } => {
                write!(f, "{name} (got 0x{got:X} exp 0x{expected:X})")
            }
            Self::Memory { addr, got, expected } => {
                write!(f, "RAM[0x{addr:04X}] (got 0x{got:02X} exp 0x{expected:02X})")
            }
            Self::Cycles { got, expected } => write!(f, "cycles (got {got} exp {expected})"),
            Self::Ports { got, expected } => write!(f, "ports (got {got:?} exp {expected:?})"),
        }
    }
}

/// Put `state` into a fresh CPU and bus. Memory not listed stays zero.
pub fn prepare(state: &Z80CpuState, ports: &[PortAccess]) -> (Z80, ValidationBus) {
    let mut cpu = Z80::new();
    let mut bus = ValidationBus::new();

    let regs = &mut cpu.regs;
    for (reg, value) in [
        (Reg8::A, state.a),
        (Reg8::F, state.f),
        (Reg8::B, state.b),
        (Reg8::C, state.c),
        (Reg8::D, state.d),
        (Reg8::E, state.e),
        (Reg8::H, state.h),
        (Reg8::L, state.l),
    ] {
        regs.set(reg, value);
    }
    regs.set_shadow_pair(Pair::AF, state.af_prime);
    regs.set_shadow_pair(Pair::BC, state.bc_prime);
    regs.set_shadow_pair(Pair::DE, state.de_prime);
    regs.set_shadow_pair(Pair::HL, state.hl_prime);
    regs.ix.set(state.ix);
    regs.iy.set(state.iy);
    regs.sp.set(state.sp);
    regs.pc.set(state.pc);
    regs.i.set(state.i);
    regs.r.set(state.r);
    cpu.iff1 = state.iff1 != 0;
    cpu.iff2 = state.iff2 != 0;
    cpu.im = state.im;
    cpu.ei_delay = state.ei != 0;

    for &(addr, value) in &state.ram {
        bus.memory.poke(addr, value);
    }
    bus.port_input = ports
        .iter()
        .filter(|(_, _, dir)| dir.starts_with('r'))
        .map(|&(_, data, _)| data)
        .collect();
    (cpu, bus)
}

/// Execute the vector's instruction and compare against its final state.
/// WZ, P and Q are not modelled; F is compared under [`FLAG_MASK`].
pub fn run_case(tc: &Z80TestCase) -> Result<(), Mismatch> {
    let (mut cpu, mut bus) = prepare(&tc.initial, &tc.ports);
    let t_states = cpu
        .step(&mut bus)
        .map_err(|fault| Mismatch::Fault(fault.to_string()))?;

    let got = Z80CpuState::from_snapshot(&cpu.snapshot(), cpu.ei_delay);
    let exp = &tc.final_state;

    let checks: [(&'static str, u16, u16); 22] = [
        ("A", got.a.into(), exp.a.into()),
        ("F", (got.f & FLAG_MASK).into(), (exp.f & FLAG_MASK).into()),
        ("B", got.b.into(), exp.b.into()),
        ("C", got.c.into(), exp.c.into()),
        ("D", got.d.into(), exp.d.into()),
        ("E", got.e.into(), exp.e.into()),
        ("H", got.h.into(), exp.h.into()),
        ("L", got.l.into(), exp.l.into()),
        ("I", got.i.into(), exp.i.into()),
        ("R", got.r.into(), exp.r.into()),
        ("IX", got.ix, exp.ix),
        ("IY", got.iy, exp.iy),
        ("SP", got.sp, exp.sp),
        ("PC", got.pc, exp.pc),
        ("IFF1", got.iff1.into(), (exp.iff1 != 0).into()),
        ("IFF2", got.iff2.into(), (exp.iff2 != 0).into()),
        ("IM", got.im.into(), exp.im.into()),
        ("EI", got.ei.into(), (exp.ei != 0).into()),
        ("AF'", got.af_prime & AF_MASK, exp.af_prime & AF_MASK),
        ("BC'", got.bc_prime, exp.bc_prime),
        ("DE'", got.de_prime, exp.de_prime),
        ("HL'", got.hl_prime, exp.hl_prime),
    ];
    for (name, got, expected) in checks {
        if got != expected {
            return Err(Mismatch::Register { name, got, expected });
        }
    }

    for &(addr, expected) in &exp.ram {
        let got = bus.memory.peek(addr);
        if got != expected {
            return Err(Mismatch::Memory { addr, got, expected });
        }
    }

    if t_states as usize != tc.cycles.len() {
        return Err(Mismatch::Cycles {
            got: t_states,
            expected: tc.cycles.len(),
        });
    }

    if !tc.ports.is_empty() && bus.ports != tc.ports {
        return Err(Mismatch::Ports {
            got: bus.ports,
            expected: tc.ports.clone(),
        });
    }
    Ok(())
}

// --- Generation ---

/// SingleStepTests naming: lowercase hex bytes, with `__` standing for the
/// displacement of an indexed bit instruction (`dd cb __ 06`).
pub fn vector_name(opcode: &[u8]) -> String {
    match opcode {
        &[prefix @ (0xDD | 0xFD), 0xCB, op] => format!("{prefix:02x} cb __ {op:02x}"),
        _ => opcode
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// Random operand bytes placed after the opcode bytes.
const OPERAND_BYTES: u16 = 3;

/// Build `count` vectors for the instruction starting with `opcode`, from
/// random register state and random bytes around every address the
/// instruction could touch. The expected state is whatever this core
/// produces, so generated files pin behaviour against regressions.
pub fn generate_cases(rng: &mut impl Rng, opcode: &[u8], count: usize) -> Vec<Z80TestCase> {
    let mut cases = Vec::with_capacity(count);
    let mut attempts = 0;
    while cases.len() < count && attempts < count * 10 {
        attempts += 1;
        if let Some(case) = generate_case(rng, opcode) {
            cases.push(case);
        }
    }
    cases
}

fn generate_case(rng: &mut impl Rng, opcode: &[u8]) -> Option<Z80TestCase> {
    let mut initial = Z80CpuState {
        pc: rng.r#gen(),
        sp: rng.r#gen(),
        a: rng.r#gen(),
        b: rng.r#gen(),
        c: rng.r#gen(),
        d: rng.r#gen(),
        e: rng.r#gen(),
        f: rng.r#gen(),
        h: rng.r#gen(),
        l: rng.r#gen(),
        i: rng.r#gen(),
        r: rng.r#gen(),
        ix: rng.r#gen(),
        iy: rng.r#gen(),
        af_prime: rng.r#gen(),
        bc_prime: rng.r#gen(),
        de_prime: rng.r#gen(),
        hl_prime: rng.r#gen(),
        im: rng.gen_range(0..=2),
        iff1: rng.gen_range(0..=1),
        iff2: rng.gen_range(0..=1),
        ..Z80CpuState::default()
    };

    // DD CB and FD CB put the displacement before the final opcode byte.
    let bytes = match opcode {
        &[prefix @ (0xDD | 0xFD), 0xCB, op] => vec![prefix, 0xCB, rng.r#gen(), op],
        _ => opcode.to_vec(),
    };

    // Instruction bytes first, then random bytes wherever it may read.
    let mut touched = BTreeSet::new();
    let mut image = vec![0u8; 0x1_0000];
    let length = bytes.len() as u16 + OPERAND_BYTES;
    for offset in 0..length {
        let addr = initial.pc.wrapping_add(offset);
        image[addr as usize] = match bytes.get(offset as usize) {
            Some(&byte) => byte,
            None => rng.r#gen(),
        };
        touched.insert(addr);
    }
    let operand = |offset: u16| {
        let low = image[initial.pc.wrapping_add(offset) as usize];
        let high = image[initial.pc.wrapping_add(offset + 1) as usize];
        u16::from_le_bytes([low, high])
    };
    let mut pointers = vec![
        u16::from_be_bytes([initial.b, initial.c]),
        u16::from_be_bytes([initial.d, initial.e]),
        u16::from_be_bytes([initial.h, initial.l]),
        initial.sp,
        operand(1),
        operand(2),
    ];
    // (IX+d) and (IY+d) reach 128 bytes either side.
    for base in [initial.ix, initial.iy] {
        pointers.extend((0..256u16).map(|d| base.wrapping_sub(128).wrapping_add(d)));
    }
    // IM 2 vector table entry.
    pointers.push(u16::from_be_bytes([initial.i, 0xFF]));
    for pointer in pointers {
        for addr in [pointer.wrapping_sub(1), pointer, pointer.wrapping_add(1)] {
            if touched.insert(addr) {
                image[addr as usize] = rng.r#gen();
            }
        }
    }
    initial.ram = touched.iter().map(|&addr| (addr, image[addr as usize])).collect();

    let (mut cpu, mut bus) = prepare(&initial, &[]);
    // Only the values actually served end up in the recorded port log.
    bus.port_input = (0..8).map(|_| rng.r#gen()).collect();
    let t_states = cpu.step(&mut bus).ok()?;

    let mut final_state = Z80CpuState::from_snapshot(&cpu.snapshot(), cpu.ei_delay);
    let mut changed = touched.clone();
    changed.extend(
        (0..=0xFFFFu16).filter(|&addr| bus.memory.peek(addr) != image[addr as usize]),
    );
    final_state.ram = changed
        .iter()
        .map(|&addr| (addr, bus.memory.peek(addr)))
        .collect();

    Some(Z80TestCase {
        name: vector_name(opcode),
        initial,
        final_state,
        cycles: vec![(None, None, "----".to_string()); t_states as usize],
        ports: bus.ports,
    })
}
