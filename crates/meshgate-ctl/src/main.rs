//! meshgate-ctl — command-line interface for the meshgated daemon.

mod cmd;

use anyhow::{Context, Result};

use cmd::{bus, radio, status};

const DEFAULT_PORT: u16 = 9011;

fn print_usage() {
    println!("Usage: meshgate-ctl [--port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  status                              Show gateway identity and counters");
    println!("  neighbors                           List heard mesh nodes");
    println!("  send <text>                         Transmit a text frame over the radio");
    println!("  send-hex <hex>                      Transmit raw bytes over the radio");
    println!("  advert                              Broadcast an advert now");
    println!("  publish <topic> <payload> [--retain]  Publish onto the bus");
    println!("  retained                            Show retained bus messages");
    println!("  recent                              Show recently published bus messages");
    println!();
    println!("Options:");
    println!("  --port <port>   API port (default: {})", DEFAULT_PORT);
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut port = DEFAULT_PORT;
    let mut retain = false;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--port" => {
                i += 1;
                port = args
                    .get(i)
                    .context("--port requires a value")?
                    .parse()
                    .context("--port must be a number")?;
            }
            "--retain" => retain = true,
            other => remaining.push(other),
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | [] => status::cmd_status(port).await,
        ["neighbors"] => status::cmd_neighbors(port).await,
        ["send", text] => radio::cmd_send_text(port, text).await,
        ["send-hex", hex] => radio::cmd_send_hex(port, hex).await,
        ["advert"] => radio::cmd_advert(port).await,
        ["publish", topic, payload] => bus::cmd_publish(port, topic, payload, retain).await,
        ["retained"] => bus::cmd_retained(port).await,
        ["recent"] => bus::cmd_recent(port).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
