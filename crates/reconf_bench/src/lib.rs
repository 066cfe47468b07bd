//! Benchmark utilities.

use rand::seq::SliceRandom;
use rand::Rng;

const FUNCTIONS: &[&str] = &["last()", "avg(5m)", "max(#3)", "min(1h)", "nodata(10m)"];
const OPERATORS: &[&str] = &["=", "#", ">", "<", " and ", " or ", "+", "-", "*"];

/// Generate a random trigger expression with `operands` function macros
/// over `host`.
pub fn random_expression(host: &str, operands: usize) -> String {
    let mut rng = rand::thread_rng();
    let mut expression = String::new();
    for _ in 0..operands.max(1) {
        let key = format!("custom.metric[{},{}]", rng.gen_range(0..100), rng.gen_range(0..10));
        let function = FUNCTIONS.choose(&mut rng).copied().unwrap_or("last()");
        let operator = OPERATORS.choose(&mut rng).copied().unwrap_or("=");
        expression.push_str(&format!("{{{host}:{key}.{function}}}{operator}"));
    }
    expression.push_str(&rng.gen_range(0..1000).to_string());
    expression
}

/// Generate a trigger prototype expression using discovery macros.
pub fn prototype_expression(host: &str, operands: usize) -> String {
    let mut rng = rand::thread_rng();
    let parts: Vec<String> = (0..operands.max(1))
        .map(|_| {
            format!(
                "{{{host}:vfs.fs.size[{{#FSNAME}},pfree].last()}}<{}",
                rng.gen_range(1..50)
            )
        })
        .collect();
    parts.join(" or ")
}
