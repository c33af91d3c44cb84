//! Line-oriented debugging client for the fleet sync server.
//!
//! Every line typed on stdin is sent verbatim as one frame body, so both
//! well-formed (`REQUEST_DATA`, `SEND_DATA:[...]`) and deliberately broken
//! messages can be tried by hand. Everything the server sends is printed.

use std::env;
use std::error::Error;

use bytes::Bytes;
use fleet_protocol::text_codec::preview;
use fleet_protocol::{decode_message, FrameCodec};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Where to connect: env override or default.
    let addr = env::var("FLEET_CLIENT_ADDR").unwrap_or_else(|_| "127.0.0.1:5000".to_string());

    println!("Connecting to {}...", addr);
    let stream = TcpStream::connect(&addr).await?;
    println!("Connected.");
    println!("Type message bodies like:");
    println!("  REQUEST_DATA");
    println!("  SEND_DATA:[{{\"Brand\":\"Toyota\"}}]");
    println!("  PING");
    println!("Type 'quit' or 'exit' to leave.\n");

    let (mut sink, mut frames) = Framed::new(stream, FrameCodec::default()).split();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    println!("\nEOF on stdin, exiting client.");
                    break;
                };
                let trimmed = line.trim_end_matches(['\r', '\n']);
                if trimmed.eq_ignore_ascii_case("quit") || trimmed.eq_ignore_ascii_case("exit") {
                    println!("Exiting client.");
                    break;
                }
                sink.send(Bytes::from(trimmed.to_string())).await?;
            }
            frame = frames.next() => match frame {
                Some(Ok(body)) => match decode_message(body.clone()) {
                    Ok(msg) => println!("<< {:?}", msg),
                    Err(e) => println!("<< undecodable ({}): {}", e, preview(&body)),
                },
                Some(Err(e)) => {
                    eprintln!("Read error: {}", e);
                    break;
                }
                None => {
                    println!("Server closed the connection.");
                    break;
                }
            },
        }
    }

    Ok(())
}
