//! Register with a bridge and paint every light of a group.
//!
//! This example demonstrates:
//! - Link button registration, retried until the button is pressed
//! - Reading the light list through the response cache
//! - Setting a group to a hex color
//!
//! Run with: cargo run --example register_and_color -- <bridge-ip> [token] [#rrggbb]

use std::str::FromStr;
use std::time::Duration;

use hue_bridge_rs::{BridgeConfig, Brightness, Color, Error, LightState, RequestPipeline};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let Some(address) = args.next() else {
        eprintln!("usage: register_and_color <bridge-ip> [token] [#rrggbb]");
        return Ok(());
    };
    let token = args.next().filter(|t| t != "-");
    let color = Color::from_str(&args.next().unwrap_or_else(|| "#ff8000".to_string()))?;

    let pipeline = RequestPipeline::new(&address, token.as_deref(), &BridgeConfig::default())?;

    if !pipeline.is_registered() {
        println!("Press the link button on {}...", address);
        loop {
            match pipeline.register("hue_bridge_rs", "demo").await {
                Ok(token) => {
                    println!("Registered, token: {}", token);
                    break;
                }
                Err(Error::LinkButtonPending { .. }) => {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    let lights = pipeline.get("lights").await?;
    if let Some(lights) = lights.as_object() {
        println!("Found {} light(s):", lights.len());
        for (id, light) in lights {
            println!("  - {}: {}", id, light["name"].as_str().unwrap_or("?"));
        }
    }

    let mut state = LightState::new();
    state
        .on(true)
        .color(&color)
        .brightness(&Brightness::from_percent(80))
        .transition_time(4);

    match pipeline.set_group_state("0", &state).await {
        Ok(_) => println!("All lights set to {:?}", color.to_chromaticity()),
        Err(e) => eprintln!("Failed to set lights: {}", e),
    }

    Ok(())
}
