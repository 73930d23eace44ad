use std::path::PathBuf;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use examprep_core::generation::normalize_generated;
use examprep_core::parser::parse_bank_str;
use examprep_core::traits::GeneratedQuestion;

fn generate_bank_toml(count: usize) -> String {
    let mut s = String::from(
        "[bank]\nid = \"bench\"\nname = \"Bench Bank\"\ntime_limit_minutes = 60\n",
    );
    for i in 0..count {
        s.push_str(&format!(
            "\n[[questions]]\nid = \"q{i}\"\ntext = \"Question number {i}?\"\n\
             options = [\"alpha\", \"beta\", \"gamma\", \"delta\"]\nanswer = \"{}\"\n\
             category = \"Numerical Ability\"\ndifficulty = \"medium\"\n",
            ["A", "B", "C", "D"][i % 4]
        ));
    }
    s
}

fn bench_bank_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("bank_parsing");
    let path = PathBuf::from("bench.toml");

    for count in [10usize, 100, 500] {
        let toml = generate_bank_toml(count);
        group.bench_function(format!("{count}_questions"), |b| {
            b.iter(|| parse_bank_str(black_box(&toml), &path).unwrap())
        });
    }

    group.finish();
}

fn bench_normalize_generated(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize_generated");

    let keyed = GeneratedQuestion {
        question: Some("Which word is a synonym of RAPID?".into()),
        options: serde_json::json!({"D": "slow", "A": "quick", "C": "late", "B": "heavy"}),
        correct_answer: serde_json::json!("a"),
        category: Some("Verbal Ability".into()),
        ..Default::default()
    };
    let listed = GeneratedQuestion {
        options: serde_json::json!(["quick", "heavy", "late", "slow"]),
        answer: serde_json::json!("quick"),
        ..keyed.clone()
    };

    group.bench_function("keyed_options_letter", |b| {
        b.iter(|| normalize_generated(black_box(keyed.clone()), "General Information"))
    });
    group.bench_function("list_options_text", |b| {
        b.iter(|| normalize_generated(black_box(listed.clone()), "General Information"))
    });

    group.finish();
}

criterion_group!(benches, bench_bank_parsing, bench_normalize_generated);
criterion_main!(benches);
