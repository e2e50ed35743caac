use rand::{Rng, SeedableRng, rngs::StdRng};
use serde_json::{Value, json};

pub const PROFILE_TEMPLATE: &str = include_str!("profile.hbs");
pub const ITEM_PARTIAL: &str = "{{@index}}: {{name}} = {{value}}";

/// Builds `n` profile contexts from a fixed seed, so every run and every
/// engine sees the same data.
pub fn generate_random_contexts(n: usize) -> Vec<Value> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..n).map(|_| random_profile(&mut rng)).collect()
}

fn random_profile(rng: &mut StdRng) -> Value {
    let items: Vec<Value> = (0..rng.random_range(3..10))
        .map(|_| {
            json!({
                "name": random_word(rng, 3, 8),
                "value": rng.random_range(10..1000),
                "special": rng.random_bool(0.3),
            })
        })
        .collect();

    json!({
        "user": {
            "name": random_word(rng, 5, 10),
            "age": rng.random_range(18..80),
            "active": rng.random_bool(0.7),
        },
        "items": items,
        "show_details": rng.random_bool(0.8),
        "has_access": rng.random_bool(0.6),
    })
}

fn random_word(rng: &mut StdRng, min_len: usize, max_len: usize) -> String {
    let len = rng.random_range(min_len..=max_len);
    (0..len)
        .map(|_| char::from(b'a' + rng.random_range(0..26u8)))
        .collect()
}

pub fn print_binary_size() {
    let binary_path = std::env::current_exe().unwrap();
    let size_bytes = std::fs::metadata(&binary_path).unwrap().len();
    println!(
        "Binary size: {:.2} KB ({size_bytes} bytes) at {}",
        size_bytes as f64 / 1024.0,
        binary_path.display()
    );
}
