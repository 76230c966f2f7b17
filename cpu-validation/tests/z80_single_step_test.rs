use std::collections::BTreeSet;
use std::fs::{self, File};
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use rand::SeedableRng;
use rand::rngs::StdRng;
use zeta_cpu_validation::{
    Mismatch, Z80TestCase, generate_cases, is_vector_file, load_vectors, run_case,
};

/// `LD A,0x42` at 0x1000, in SingleStepTests layout.
const LD_A_N: &str = r#"{
    "name": "3e 0000",
    "initial": {
        "pc": 4096, "sp": 61440, "a": 0, "b": 1, "c": 2, "d": 3, "e": 4, "f": 255,
        "h": 5, "l": 6, "i": 0, "r": 16, "ei": 0, "wz": 0, "ix": 0, "iy": 0,
        "af_": 0, "bc_": 0, "de_": 0, "hl_": 0, "im": 1, "p": 0, "q": 0,
        "iff1": 0, "iff2": 0,
        "ram": [[4096, 62], [4097, 66]]
    },
    "final": {
        "pc": 4098, "sp": 61440, "a": 66, "b": 1, "c": 2, "d": 3, "e": 4, "f": 255,
        "h": 5, "l": 6, "i": 0, "r": 17, "ei": 0, "wz": 0, "ix": 0, "iy": 0,
        "af_": 0, "bc_": 0, "de_": 0, "hl_": 0, "im": 1, "p": 0, "q": 0,
        "iff1": 0, "iff2": 0,
        "ram": [[4096, 62], [4097, 66]]
    },
    "cycles": [
        [4096, null, "----"], [4096, null, "r-m-"], [null, null, "----"],
        [null, null, "----"], [4097, null, "----"], [4097, 66, "r-m-"],
        [4097, 66, "----"]
    ]
}"#;

fn ld_a_n() -> Z80TestCase {
    serde_json::from_str(LD_A_N).unwrap()
}

// =================================================================
// Vector replay
// =================================================================

#[test]
fn test_handwritten_vector_passes() {
    assert_eq!(run_case(&ld_a_n()), Ok(()));
}

#[test]
fn test_register_mismatch_is_named() {
    let mut tc = ld_a_n();
    tc.final_state.a = 0x43;
    assert_eq!(
        run_case(&tc),
        Err(Mismatch::Register {
            name: "A",
            got: 0x42,
            expected: 0x43
        })
    );
}

#[test]
fn test_undocumented_flag_bits_ignored() {
    let mut tc = ld_a_n();
    tc.final_state.f = 0xD7;
    assert_eq!(run_case(&tc), Ok(()));
}

#[test]
fn test_cycle_count_checked() {
    let mut tc = ld_a_n();
    tc.cycles.pop();
    assert_eq!(
        run_case(&tc),
        Err(Mismatch::Cycles {
            got: 7,
            expected: 6
        })
    );
}

#[test]
fn test_undefined_opcode_reports_fault() {
    let mut tc = ld_a_n();
    tc.initial.ram = vec![(0x1000, 0xED), (0x1001, 0x77)];
    match run_case(&tc) {
        Err(Mismatch::Fault(message)) => assert!(message.contains("ED 77"), "{message}"),
        other => panic!("expected a fault, got {other:?}"),
    }
}

#[test]
fn test_port_reads_served_from_vector() {
    // IN A,(0xFE) with A=0x7F reads port 0x7FFE.
    let mut tc = ld_a_n();
    tc.initial.a = 0x7F;
    tc.initial.ram = vec![(0x1000, 0xDB), (0x1001, 0xFE)];
    tc.ports = vec![(0x7FFE, 0xBF, "r".to_string())];
    tc.final_state.a = 0xBF;
    tc.final_state.ram = Vec::new();
    tc.cycles.extend((0..4).map(|_| (None, None, "----".to_string())));
    assert_eq!(run_case(&tc), Ok(()));
}

// =================================================================
// Generated vectors through gzip
// =================================================================

#[test]
fn test_generated_vectors_load_from_gzip() {
    let dir = std::env::temp_dir().join("zeta_single_step_test");
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();

    let mut rng = StdRng::seed_from_u64(42);
    let cases = generate_cases(&mut rng, &[0xED, 0xA1], 25); // CPI
    assert_eq!(cases.len(), 25);

    let path = dir.join("ed a1.json.gz");
    let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::fast());
    serde_json::to_writer(&mut encoder, &cases).unwrap();
    encoder.finish().unwrap();

    assert!(is_vector_file(&path));
    let loaded = load_vectors(&path).unwrap();
    assert_eq!(loaded.len(), 25);
    for tc in &loaded {
        assert_eq!(run_case(tc), Ok(()), "{}", tc.name);
    }

    fs::remove_dir_all(&dir).unwrap();
}

// =================================================================
// SingleStepTests data
// =================================================================

#[test]
#[ignore = "needs SingleStepTests data in cpu-validation/test_data/z80/v1"]
fn test_all_z80_opcodes() {
    let test_dir = Path::new("test_data/z80/v1");
    if !test_dir.exists() {
        eprintln!("No SingleStepTests data under {}", test_dir.display());
        return;
    }

    let mut entries: Vec<_> = fs::read_dir(test_dir)
        .expect("Failed to read test directory")
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|path| is_vector_file(path))
        .collect();
    entries.sort();

    let mut total_tests = 0;
    let mut failed_tests = 0;
    let mut undefined_files = 0;
    let mut failed_files = BTreeSet::new();
    let mut first_failures: Vec<String> = Vec::new();

    for path in &entries {
        let file_name = path.file_name().unwrap().to_string_lossy().to_string();
        let tests = load_vectors(path).unwrap_or_else(|e| panic!("{file_name}: {e}"));
        assert!(!tests.is_empty(), "Test file {file_name} is empty");

        // Opcodes this core treats as undefined fault on every vector.
        if matches!(run_case(&tests[0]), Err(Mismatch::Fault(_))) {
            undefined_files += 1;
            continue;
        }

        for tc in &tests {
            if let Err(mismatch) = run_case(tc) {
                failed_tests += 1;
                if failed_files.insert(file_name.clone()) && first_failures.len() < 50 {
                    first_failures.push(format!("{}: {mismatch}", tc.name));
                }
            }
        }
        total_tests += tests.len();
    }

    eprintln!(
        "\nZ80 SingleStepTests: {} passed, {} failed across {} files ({} undefined skipped)",
        total_tests - failed_tests,
        failed_tests,
        entries.len(),
        undefined_files
    );
    for err in &first_failures {
        eprintln!("  {err}");
    }

    assert_eq!(
        failed_tests,
        0,
        "{} tests failed across {} files",
        failed_tests,
        failed_files.len()
    );
}
