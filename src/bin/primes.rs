//! Finds P prime numbers in a stream of random integers, using N workers.
//!
//! Run with: cargo run --bin primes -- -p=10 -r=100000 -n=8

use std::process::ExitCode;
use std::time::Instant;

use sluice::pipeline::{Pipeline, PipelineConfig};
use sluice::stage::{accept_fn, convert_fn, generate_fn};
use sluice::Error;

const DEFAULT_NUM_PRIMES: usize = 10;
const DEFAULT_NUM_RANGE: i64 = 100_000;
const DEFAULT_NUM_WORKERS: usize = 8;

struct Options {
    num_primes: usize,
    num_range: i64,
    num_workers: usize,
    seed: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            num_primes: DEFAULT_NUM_PRIMES,
            num_range: DEFAULT_NUM_RANGE,
            num_workers: DEFAULT_NUM_WORKERS,
            seed: 0x2545_f491_4f6c_dd1d,
        }
    }
}

fn usage(program: &str) {
    println!("Usage: {program} [-p=<count>] [-r=<range>] [-n=<workers>] [-s=<seed>]");
    println!();
    println!("  -p  Number of prime numbers to generate (default {DEFAULT_NUM_PRIMES})");
    println!("  -r  Exclusive upper bound of the random values (default {DEFAULT_NUM_RANGE})");
    println!("  -n  Number of workers to concurrently process values (default {DEFAULT_NUM_WORKERS})");
    println!("  -s  Seed for the random value source");
}

fn parse_options(args: &[String]) -> Result<Options, String> {
    let mut options = Options::default();
    for arg in args {
        let (flag, value) = arg
            .split_once('=')
            .ok_or_else(|| format!("expected -flag=value, got '{arg}'"))?;
        match flag {
            "-p" => {
                options.num_primes = value
                    .parse()
                    .map_err(|_| format!("invalid count '{value}'"))?;
            }
            "-r" => {
                let range: i64 = value
                    .parse()
                    .map_err(|_| format!("invalid range '{value}'"))?;
                if range < 1 {
                    return Err(format!("range must be at least 1, got {range}"));
                }
                options.num_range = range;
            }
            "-n" => {
                options.num_workers = value
                    .parse()
                    .map_err(|_| format!("invalid worker count '{value}'"))?;
            }
            "-s" => {
                options.seed = value
                    .parse()
                    .map_err(|_| format!("invalid seed '{value}'"))?;
            }
            _ => return Err(format!("unknown flag '{flag}'")),
        }
    }
    Ok(options)
}

/// Seedable xorshift64 generator for the random value stream.
struct Xorshift64 {
    state: u64,
}

impl Xorshift64 {
    fn new(seed: u64) -> Self {
        Self {
            state: seed.max(1),
        }
    }

    fn next_random(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Next value in `[0, bound)`.
    fn next_below(&mut self, bound: i64) -> i64 {
        (self.next_random() % bound as u64) as i64
    }
}

/// Deterministic primality by trial division. 0 and 1 are not prime.
fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut d = 3u64;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let options = match parse_options(&args[1..]) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{message}");
            usage(&args[0]);
            return ExitCode::FAILURE;
        }
    };

    println!(
        "Generating {} random prime numbers within range 0-{}...",
        options.num_primes, options.num_range
    );
    println!("Creating {} workers...", options.num_workers);

    let start = Instant::now();

    let mut rng = Xorshift64::new(options.seed);
    let range = options.num_range;
    let handle = Pipeline::new(
        generate_fn(move || rng.next_below(range)),
        convert_fn(|raw: i64| {
            u64::try_from(raw).map_err(|_| Error::TypeMismatch(format!("negative value {raw}")))
        }),
        accept_fn(|n: &u64| is_prime(*n)),
    )
    .with_config(
        PipelineConfig::default()
            .with_workers(options.num_workers)
            .with_take(options.num_primes),
    )
    .start();

    println!("Prime numbers generated:");
    while let Some(prime) = handle.recv().await {
        println!("{prime}");
    }

    if let Err(e) = handle.wait().await {
        eprintln!("pipeline failed: {e}");
        return ExitCode::FAILURE;
    }

    println!("Duration: {:?}", start.elapsed());
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let args: Vec<String> = ["-p=5", "-r=100", "-n=2"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let options = parse_options(&args).unwrap();
        assert_eq!(options.num_primes, 5);
        assert_eq!(options.num_range, 100);
        assert_eq!(options.num_workers, 2);
    }

    #[test]
    fn rejects_malformed_flags() {
        assert!(parse_options(&["-p".to_string()]).is_err());
        assert!(parse_options(&["-p=abc".to_string()]).is_err());
        assert!(parse_options(&["-x=1".to_string()]).is_err());
        assert!(parse_options(&["-r=0".to_string()]).is_err());
    }

    #[test]
    fn primality_matches_known_values() {
        let primes: Vec<u64> = (0..30).filter(|&n| is_prime(n)).collect();
        assert_eq!(primes, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
        assert!(is_prime(7919));
        assert!(!is_prime(7917));
    }

    #[test]
    fn xorshift_stays_in_range() {
        let mut rng = Xorshift64::new(42);
        for _ in 0..1000 {
            let v = rng.next_below(100);
            assert!((0..100).contains(&v));
        }
    }
}
