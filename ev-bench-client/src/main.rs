//! HV battery voltage request-rate benchmark.
//!
//! Connects to an ELM327-compatible adapter (real or the mock one in
//! `ev-mock-adapter`), repeatedly requests HV battery voltage as fast as
//! possible, and prints request-rate and latency statistics.
//!
//! Usage: `ev-bench-client [OPTIONS]`

use clap::Parser;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "ev-bench-client")]
#[command(about = "Benchmark ELM327 request/response rate")]
struct Args {
    /// Adapter address to connect to.
    #[arg(short, long, default_value = "127.0.0.1:35000")]
    address: String,

    /// Duration to run the benchmark in seconds (0 = run forever).
    #[arg(short, long, default_value = "10")]
    duration: u64,

    /// Print each individual reading.
    #[arg(short, long)]
    verbose: bool,

    /// Interval between stats printouts in seconds.
    #[arg(short, long, default_value = "1")]
    interval: f64,
}

struct Stats {
    requests: u64,
    errors: u64,
    min_latency: Duration,
    max_latency: Duration,
    total_latency: Duration,
    interval_requests: u64,
    interval_errors: u64,
    interval_start: Instant,
    last_value: Option<f32>,
}

impl Stats {
    fn new() -> Self {
        Self {
            requests: 0,
            errors: 0,
            min_latency: Duration::MAX,
            max_latency: Duration::ZERO,
            total_latency: Duration::ZERO,
            interval_requests: 0,
            interval_errors: 0,
            interval_start: Instant::now(),
            last_value: None,
        }
    }

    fn record_success(&mut self, latency: Duration, value: f32) {
        self.requests += 1;
        self.interval_requests += 1;
        self.total_latency += latency;
        self.min_latency = self.min_latency.min(latency);
        self.max_latency = self.max_latency.max(latency);
        self.last_value = Some(value);
    }

    fn record_error(&mut self) {
        self.errors += 1;
        self.interval_errors += 1;
    }

    fn print_interval(&mut self, verbose: bool) {
        let elapsed = self.interval_start.elapsed();
        #[allow(clippy::cast_precision_loss)]
        let rate = self.interval_requests as f64 / elapsed.as_secs_f64();

        if verbose {
            if let Some(value) = self.last_value {
                println!(
                    "  {rate:.1} req/s | {} requests | {} errors | last: {value:.2} V",
                    self.interval_requests, self.interval_errors
                );
            } else {
                println!(
                    "  {rate:.1} req/s | {} requests | {} errors",
                    self.interval_requests, self.interval_errors
                );
            }
        } else {
            print!(
                "\r  {rate:.1} req/s | {} total | {} errors",
                self.requests, self.errors
            );
            std::io::stdout().flush().ok();
        }

        self.interval_requests = 0;
        self.interval_errors = 0;
        self.interval_start = Instant::now();
    }

    fn print_summary(&self, total_elapsed: Duration) {
        println!("\n\n=== Benchmark Summary ===");
        println!("Total time:     {:.2}s", total_elapsed.as_secs_f64());
        println!("Total requests: {}", self.requests);
        println!("Total errors:   {}", self.errors);

        if self.requests > 0 {
            #[allow(clippy::cast_precision_loss)]
            let rate = self.requests as f64 / total_elapsed.as_secs_f64();
            let avg_latency =
                self.total_latency / u32::try_from(self.requests).expect("request count exceeded u32::MAX");

            println!("Request rate:   {rate:.1} req/s");
            println!("Min latency:    {:.3}ms", self.min_latency.as_secs_f64() * 1000.0);
            println!("Max latency:    {:.3}ms", self.max_latency.as_secs_f64() * 1000.0);
            println!("Avg latency:    {:.3}ms", avg_latency.as_secs_f64() * 1000.0);
        }
    }
}

fn read_until_prompt(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut response = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        stream.read_exact(&mut byte)?;
        response.push(byte[0]);
        if byte[0] == b'>' {
            break;
        }
    }

    Ok(String::from_utf8_lossy(&response).to_string())
}

fn send_and_wait(stream: &mut TcpStream, cmd: &[u8]) -> std::io::Result<String> {
    stream.write_all(cmd)?;
    stream.write_all(b"\r")?;
    read_until_prompt(stream)
}

fn initialize_connection(stream: &mut TcpStream) -> std::io::Result<()> {
    send_and_wait(stream, b"ATZ")?;
    send_and_wait(stream, b"ATE0")?;
    send_and_wait(stream, b"ATS0")?;
    send_and_wait(stream, b"ATL0")?;
    send_and_wait(stream, b"ATSH797")?;
    send_and_wait(stream, b"ATCRA79A")?;
    Ok(())
}

/// HV battery voltage is `0x22 0x11 0x03` on the simulated leaf platform,
/// a single-frame request: PCI length 3, SID, then the two DID bytes.
const REQUEST: &[u8] = b"03221103";

/// `62 11 03 XX` -> `XX * 0.08` volts, matching the `leaf` decoder's scale
/// entry for this request.
fn parse_voltage_response(response: &str) -> Option<f32> {
    let clean = response.trim().trim_end_matches('>').trim();
    let hex: String = clean.chars().filter(char::is_ascii_hexdigit).collect();
    if hex.len() < 8 || !hex.to_uppercase().starts_with("621103") {
        return None;
    }
    let raw = u8::from_str_radix(&hex[6..8], 16).ok()?;
    Some(f32::from(raw) * 0.08)
}

fn request_voltage(stream: &mut TcpStream) -> std::io::Result<Option<f32>> {
    let response = send_and_wait(stream, REQUEST)?;
    Ok(parse_voltage_response(&response))
}

fn run_benchmark(args: &Args) -> std::io::Result<()> {
    println!("Connecting to {}...", args.address);

    let mut stream = TcpStream::connect(&args.address)?;
    stream.set_nodelay(true)?;

    println!("Connected. Initializing adapter...");
    initialize_connection(&mut stream)?;

    println!(
        "Starting benchmark{}...\n",
        if args.duration > 0 {
            format!(" for {}s", args.duration)
        } else {
            " (press Ctrl+C to stop)".to_string()
        }
    );

    let mut stats = Stats::new();
    let start = Instant::now();
    let duration = if args.duration > 0 {
        Some(Duration::from_secs(args.duration))
    } else {
        None
    };
    let interval = Duration::from_secs_f64(args.interval);

    loop {
        if let Some(d) = duration {
            if start.elapsed() >= d {
                break;
            }
        }

        let request_start = Instant::now();
        match request_voltage(&mut stream) {
            Ok(Some(value)) => {
                let latency = request_start.elapsed();
                stats.record_success(latency, value);
                if args.verbose {
                    println!("HV voltage: {:.2} V (latency: {:.2}ms)", value, latency.as_secs_f64() * 1000.0);
                }
            }
            Ok(None) => {
                stats.record_error();
                if args.verbose {
                    println!("Error: invalid response");
                }
            }
            Err(e) => {
                eprintln!("\nConnection error: {e}");
                break;
            }
        }

        if stats.interval_start.elapsed() >= interval {
            stats.print_interval(args.verbose);
        }
    }

    stats.print_summary(start.elapsed());
    Ok(())
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run_benchmark(&args) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
