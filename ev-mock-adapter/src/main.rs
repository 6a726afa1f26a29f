//! Mock ELM327 adapter: a TCP server that answers the AT-command
//! handshake and a small catalogue of UDS requests, so the stream
//! `Transport` back-end can be exercised without real vehicle hardware.

mod state;
mod vehicle;

use clap::Parser;
use state::{AdapterState, Firmware};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::Instant;

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Address to listen on.
    #[arg(short, long, default_value = "127.0.0.1:35000")]
    address: String,

    /// Report `ELM327 v1.5` on reset, to exercise the adapter driver's
    /// trailing-zero-stripping quirk handling.
    #[arg(long)]
    legacy_firmware: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    let firmware = if args.legacy_firmware {
        Firmware::Legacy
    } else {
        Firmware::Current
    };

    let listener = TcpListener::bind(&args.address).unwrap_or_else(|e| {
        log::error!("failed to bind {}: {e}", args.address);
        std::process::exit(1);
    });
    log::info!("mock adapter listening on {}", args.address);

    let start = Instant::now();
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                log::info!("client connected: {:?}", stream.peer_addr());
                std::thread::spawn(move || handle_client(stream, firmware, start));
            }
            Err(e) => log::warn!("accept error: {e}"),
        }
    }
}

fn handle_client(mut stream: TcpStream, firmware: Firmware, start: Instant) {
    let mut state = AdapterState::new(firmware);
    let mut buffer = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        match stream.read(&mut byte) {
            Ok(0) => {
                log::info!("client disconnected");
                break;
            }
            Ok(_) => {
                let ch = byte[0];
                if state.echo_enabled && stream.write_all(&byte).is_err() {
                    break;
                }
                if ch == b'\r' {
                    let command = String::from_utf8_lossy(&buffer).trim().to_uppercase();
                    buffer.clear();
                    if command.is_empty() {
                        continue;
                    }
                    let response = process_command(&command, &mut state, start);
                    if stream.write_all(response.as_bytes()).is_err() {
                        break;
                    }
                } else if ch != b'\n' {
                    buffer.push(ch);
                }
            }
            Err(e) => {
                log::warn!("read error: {e}");
                break;
            }
        }
    }
}

fn process_command(cmd: &str, state: &mut AdapterState, start: Instant) -> String {
    let le = state.line_ending();

    if let Some(stripped) = cmd.strip_prefix("AT") {
        let text = state.handle_at_command(&format!("AT{stripped}"));
        return format!("{le}{text}{le}>");
    }

    let Ok(bytes) = hex::decode(cmd) else {
        return format!("{le}?{le}>");
    };
    if bytes.is_empty() {
        return format!("{le}?{le}>");
    }

    let len = (bytes[0] & 0x0F) as usize;
    if len < 1 || bytes.len() < 1 + len {
        return format!("{le}?{le}>");
    }
    let sid = bytes[1];
    let sub = &bytes[2..1 + len];
    let req_id = state.req_id.unwrap_or(0);

    match vehicle::response_body(req_id, sid, sub, start) {
        Some(body) => {
            let mut full = vec![sid + 0x40];
            full.extend_from_slice(&body);
            let mut frame = vec![full.len() as u8];
            frame.extend_from_slice(&full);
            let line = state.format_frame(&frame);
            format!("{le}{line}{le}{le}>")
        }
        None => format!("{le}NO DATA{le}{le}>"),
    }
}
