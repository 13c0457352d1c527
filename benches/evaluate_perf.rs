//! Performance benchmarks for the evaluation hot path.
//!
//! Run with: `cargo bench --bench evaluate_perf`
//!
//! Hook mode evaluates one command per process, so the numbers that matter
//! are single-command latencies for typical agent commands and the cost of
//! rejecting adversarial input near the size limit.

use std::fmt::Write as _;

use agent_shell_gate::config::Config;
use agent_shell_gate::evaluator::evaluate_command;
use agent_shell_gate::extract::extract_commands;
use agent_shell_gate::normalize::tokenize_words;
use agent_shell_gate::policy::Policy;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

// =============================================================================
// Benchmark Fixtures
// =============================================================================

const TYPICAL: &[(&str, &str)] = &[
    ("simple", "git status --short"),
    ("chain", "npm install && npm run build && npm test"),
    ("quoted", r#"git commit -m "fix: handle a; b && c | d""#),
    ("pkill", "pkill -f 'node server.js'"),
    ("init", "chmod +x init.sh && ./init.sh --production"),
    ("inline_shell", r#"bash -c "cd app && npm run dev""#),
    ("blocked", "ls && shutdown now"),
    ("suspicious", "$(echo pkill) node"),
];

/// A long `&&` chain of allowed commands.
fn long_chain(parts: usize) -> String {
    let mut cmd = String::from("ls");
    for i in 0..parts {
        let _ = write!(cmd, " && echo step{i}");
    }
    cmd
}

/// Deeply nested quoting without a closing quote.
fn unterminated(len: usize) -> String {
    let mut cmd = String::from("echo \"");
    cmd.push_str(&"a\\\" ".repeat(len));
    cmd
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_tokenize(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenize");
    for (name, cmd) in TYPICAL {
        group.bench_with_input(BenchmarkId::from_parameter(name), cmd, |b, cmd| {
            b.iter(|| tokenize_words(std::hint::black_box(cmd)));
        });
    }
    group.finish();
}

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract");
    for (name, cmd) in TYPICAL {
        group.bench_with_input(BenchmarkId::from_parameter(name), cmd, |b, cmd| {
            b.iter(|| extract_commands(std::hint::black_box(cmd)));
        });
    }
    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let policy = Policy::default();
    let mut group = c.benchmark_group("evaluate");
    for (name, cmd) in TYPICAL {
        group.bench_with_input(BenchmarkId::from_parameter(name), cmd, |b, cmd| {
            b.iter(|| evaluate_command(std::hint::black_box(cmd), &policy));
        });
    }
    group.finish();
}

fn bench_evaluate_with_overrides(c: &mut Criterion) {
    let config = Config::parse(
        r#"
[[overrides.block]]
pattern = "git\\s+push\\s+.*--force"
reason = "force push"

[[overrides.block]]
pattern = "curl\\s+.*\\|\\s*(ba)?sh"
reason = "pipe to shell"
"#,
    )
    .unwrap_or_default();
    let policy = Policy::from_config(&config);

    c.bench_function("evaluate_with_overrides", |b| {
        b.iter(|| {
            evaluate_command(
                std::hint::black_box("npm install && npm run build"),
                &policy,
            )
        });
    });
}

fn bench_stress(c: &mut Criterion) {
    let policy = Policy::default();
    let mut group = c.benchmark_group("stress");
    group.sample_size(20);

    for parts in [10, 100, 1000] {
        let cmd = long_chain(parts);
        group.bench_with_input(BenchmarkId::new("long_chain", parts), &cmd, |b, cmd| {
            b.iter(|| evaluate_command(std::hint::black_box(cmd), &policy));
        });
    }

    let cmd = unterminated(5000);
    group.bench_function("unterminated_quote", |b| {
        b.iter(|| evaluate_command(std::hint::black_box(&cmd), &policy));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_tokenize,
    bench_extract,
    bench_evaluate,
    bench_evaluate_with_overrides,
    bench_stress,
);
criterion_main!(benches);
