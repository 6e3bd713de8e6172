//! Interactive keywire shell.
//!
//! Line-oriented loop over stdin. Failures print a one-line diagnostic and
//! the loop continues; `EXIT` or end-of-input leaves with code 0.
//!
//! ```text
//! > CONNECT 127.0.0.1 3000 secret
//! connected to 127.0.0.1:3000
//! > ADD greeting hello
//! ok
//! > FIND greeting
//! hello
//! ```

// Stdout/stderr are this binary's user interface.
#![allow(clippy::print_stdout, reason = "the shell speaks over stdout")]
#![allow(clippy::print_stderr, reason = "diagnostics go to stderr")]

mod repl;

use std::io::Write;

use keywire_client::Client;
use keywire_proto::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::repl::Command;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut client: Option<Client> = None;

    loop {
        prompt();
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            // End of input is a clean exit.
            Ok(None) => break,
            Err(error) => {
                eprintln!("input error: {error}");
                break;
            },
        };

        let command = match repl::parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(error) => {
                eprintln!("{error}");
                continue;
            },
        };

        match command {
            Command::Help => println!("{}", repl::USAGE),
            Command::Exit => break,
            Command::Connect { host, port, api_key } => {
                connect(&mut client, &host, port, &api_key).await;
            },
            Command::Add { key, value } => {
                let Some(client) = client.as_ref() else {
                    eprintln!("not connected; use CONNECT <ip> <port> <api-key>");
                    continue;
                };
                match client.add(&key, Value::Text(value)).await {
                    Ok(()) => println!("ok"),
                    Err(error) => eprintln!("add failed: {error}"),
                }
            },
            Command::Find { key } => {
                let Some(client) = client.as_ref() else {
                    eprintln!("not connected; use CONNECT <ip> <port> <api-key>");
                    continue;
                };
                match client.find(&key).await {
                    Ok(Some(value)) => println!("{}", render(&value)),
                    Ok(None) => println!("(not found)"),
                    Err(error) => eprintln!("find failed: {error}"),
                }
            },
            Command::Remove { key } => {
                let Some(client) = client.as_ref() else {
                    eprintln!("not connected; use CONNECT <ip> <port> <api-key>");
                    continue;
                };
                match client.remove(&key).await {
                    Ok(()) => println!("ok"),
                    Err(error) => eprintln!("remove failed: {error}"),
                }
            },
        }
    }

    if let Some(client) = client {
        client.close().await;
    }
}

/// Connect and authenticate, replacing any previous session.
async fn connect(client: &mut Option<Client>, host: &str, port: u16, api_key: &str) {
    if let Some(previous) = client.take() {
        previous.close().await;
    }

    let addr = format!("{host}:{port}");
    let connected = match Client::connect(&addr).await {
        Ok(connected) => connected,
        Err(error) => {
            eprintln!("connect failed: {error}");
            return;
        },
    };
    if let Err(error) = connected.authenticate(api_key).await {
        eprintln!("authentication failed: {error}");
        connected.close().await;
        return;
    }

    println!("connected to {addr}");
    *client = Some(connected);
}

fn render(value: &Value) -> String {
    match value {
        Value::Text(text) => text.clone(),
        Value::Int(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
    }
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}
