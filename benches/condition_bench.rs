//! Quick benchmark for condition evaluation and prompt placeholder resolution

use aion::eval::{evaluate, Condition};
use aion::tasks::resolve_prompt;
use aion::{Memory, Record};
use serde_json::json;
use std::hint::black_box;
use std::time::Instant;

fn main() {
    let record: Record = match json!({
        "name": "Ana Lima",
        "age": 34,
        "status": "active",
        "email": "ana@example.com",
        "tags": ["admin", "beta"],
        "address": {"city": "Lyon"}
    }) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    };

    let conditions = vec![
        ("numeric >", json!({"field": "age", "operator": ">", "value": 18})),
        ("loose ==", json!({"field": "age", "operator": "==", "value": "34"})),
        ("in list", json!({"field": "status", "operator": "in", "value": ["active", "trial"]})),
        ("matches", json!({"field": "email", "operator": "matches", "value": "^[a-z]+@example\\.com$"})),
        ("nested path", json!({"field": "address.city", "operator": "startswith", "value": "Ly"})),
        ("all/any", json!({"all": [
            {"field": "age", "operator": ">=", "value": 21},
            {"any": [
                {"field": "tags", "operator": "contains", "value": "admin"},
                {"not": {"field": "status", "operator": "==", "value": "inactive"}}
            ]}
        ]})),
    ];

    println!("Condition Evaluation Performance Test");
    println!("=====================================\n");

    for (label, raw) in &conditions {
        let condition: Condition = match serde_json::from_value(raw.clone()) {
            Ok(c) => c,
            Err(e) => panic!("invalid bench condition {}: {}", label, e),
        };
        // Warm up the regex cache
        let _ = evaluate(&record, &condition);

        let iterations = 200_000;
        let start = Instant::now();
        for _ in 0..iterations {
            black_box(evaluate(black_box(&record), &condition));
        }
        let elapsed = start.elapsed();

        println!("Condition: {:12} {}", label, condition);
        println!("  Time for {} iterations: {:?}", iterations, elapsed);
        println!("  Per operation: {:?}\n", elapsed / iterations);
    }

    println!("Prompt Resolution Performance Test");
    println!("==================================\n");

    let memory = Memory::new();
    memory.set("tone", json!("formal"));
    let prompts = [
        "No placeholders at all",
        "Hello {{name}}",
        "{{name}} from {{address.city}} writes in a {{memory.tone}} tone, age {{age}}",
    ];

    for prompt in prompts {
        let iterations = 100_000;
        let start = Instant::now();
        for _ in 0..iterations {
            black_box(resolve_prompt(black_box(prompt), &record, &memory));
        }
        let elapsed = start.elapsed();

        println!("Prompt: {:60}", format!("\"{}\"", prompt));
        println!("  Time for {} iterations: {:?}", iterations, elapsed);
        println!("  Per operation: {:?}\n", elapsed / iterations);
    }
}
