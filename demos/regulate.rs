// SPDX-License-Identifier: MPL-2.0

//! Home regulation example.
//!
//! Loads a home from a YAML configuration file, starts the regulation loop
//! and holds the rooms at the requested temperature, printing any
//! regulation errors as they occur.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example regulate -- <config.yaml> <desired_fahrenheit>
//! ```
//!
//! # Examples
//!
//! ```bash
//! cargo run --example regulate -- thermalink.yaml 72
//! ```

use std::env;
use std::time::Duration;

use thermalink::{Home, HomeConfig};

/// How long the example keeps regulating before shutting down.
const RUN_FOR: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: {} <config.yaml> <desired_fahrenheit>", args[0]);
        std::process::exit(1);
    }

    let config = HomeConfig::load(&args[1])?;
    let desired: f64 = args[2].parse()?;

    println!("=== {} ===", config.name);
    println!("Thermostat: {}", config.thermostat.ip);
    println!("Switches: {}", config.switches.len());
    println!();

    let mut home = Home::new(&config.name, config.thermostat.build());
    for section in &config.switches {
        let (switch, channel) = section.build()?;
        println!("  relay {} channel {channel}", section.uri);
        home.add_switch(switch, channel);
    }

    println!();
    println!("Connecting...");
    let mut handle = home.start().await?;
    handle.set_desired_temperature(desired);
    println!("Holding at {desired} F (running for {RUN_FOR:?}, Ctrl+C to exit)");
    println!();

    // Print regulation errors as they come in until the timer elapses.
    let deadline = tokio::time::sleep(RUN_FOR);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            () = &mut deadline => break,
            error = handle.next_error() => match error {
                Some(error) => println!("[Error] {error}"),
                None => break,
            },
        }
    }

    println!();
    println!("Shutting down...");
    handle.shutdown().await;

    Ok(())
}
