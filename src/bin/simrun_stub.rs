//! Stand-in for a native flight software build.
//!
//! Speaks the same line-delimited JSON frames as the firmware's debug
//! console on stdin/stdout, keeping state fields in memory. Point a native
//! device's `binary_filepath` at this to exercise a run without firmware.

use simrun::wire::{Reply, Request};
use std::collections::HashMap;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Debug, Default)]
struct StateFields {
    written: HashMap<String, String>,
    overridden: HashMap<String, String>,
}

impl StateFields {
    fn handle(&mut self, request: Request) -> Reply {
        match request {
            Request::Read { field } => {
                let value = self
                    .overridden
                    .get(&field)
                    .or_else(|| self.written.get(&field))
                    .cloned();
                match value {
                    Some(value) => Reply::value(&field, value),
                    None => Reply::error(&field, "no such field"),
                }
            }
            Request::Write { field, val } => {
                self.written.insert(field.clone(), val.clone());
                Reply::value(&field, val)
            }
            Request::Override { field, val } => {
                self.overridden.insert(field.clone(), val.clone());
                Reply::value(&field, val)
            }
            Request::Release { field } => match self.overridden.remove(&field) {
                Some(val) => Reply::value(&field, val),
                None => Reply::error(&field, "field is not overridden"),
            },
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut fields = StateFields::default();
    fields.written.insert("pan.state".to_string(), "startup".to_string());
    fields.written.insert("pan.cycle_no".to_string(), "0".to_string());

    stdout.write_all(b"[stub] flight software stand-in ready\n").await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = match Request::decode(&line) {
            Ok(request) => fields.handle(request),
            Err(e) => {
                stdout.write_all(format!("[stub] ignoring frame: {}\n", e).as_bytes()).await?;
                continue;
            }
        };
        stdout.write_all(reply.encode()?.as_bytes()).await?;
        stdout.flush().await?;
    }

    Ok(())
}
