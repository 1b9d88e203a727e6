//! Airlink reading injection utility
//!
//! Publishes readings onto a topic so a fan node can be exercised on the
//! bench without a room node.
//!
//! ## Usage
//!
//! ```bash
//! # One polluted reading (fan should switch on)
//! inject-reading --topic sensors/bedroom --scenario polluted
//!
//! # Alternate clean and polluted readings every 5 seconds
//! inject-reading --topic sensors/bedroom --count 10 --interval-ms 5000
//!
//! # Arbitrary payload, e.g. a partial or malformed one
//! inject-reading --topic sensors/bedroom --raw '{"tvoc":50}'
//! ```

use airlink::protocol::{encode, validate_topic, Reading};
use airlink::session::generate_client_id;
use clap::{Parser, ValueEnum};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::time::{sleep, timeout, Duration};

#[derive(Parser)]
#[command(
    name = "inject-reading",
    about = "Publish air quality readings for bench testing"
)]
struct Args {
    /// Topic to publish on
    #[arg(long, default_value = "sensors/bedroom")]
    topic: String,

    /// Which readings to send
    #[arg(long, value_enum, default_value_t = Scenario::Alternate)]
    scenario: Scenario,

    /// Send this payload verbatim instead of generated readings
    #[arg(long)]
    raw: Option<String>,

    /// Number of messages to publish
    #[arg(long, default_value = "1")]
    count: u32,

    /// Delay between messages in milliseconds
    #[arg(long, default_value = "5000")]
    interval_ms: u64,

    /// MQTT broker host
    #[arg(long, default_value = "localhost")]
    broker_host: String,

    /// MQTT broker port
    #[arg(long, default_value = "1883")]
    broker_port: u16,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Scenario {
    /// Every pollutant below its threshold
    Clean,
    /// Every pollutant above its threshold
    Polluted,
    /// Polluted first, then clean, repeating
    Alternate,
}

const CLEAN: Reading = Reading {
    tvoc: 50,
    temperature: 24.5,
    humidity: 55.2,
    eco2: 450,
    aqi: 1,
};

const POLLUTED: Reading = Reading {
    tvoc: 300,
    temperature: 24.5,
    humidity: 55.2,
    eco2: 900,
    aqi: 4,
};

fn reading_for(scenario: Scenario, index: u32) -> Reading {
    match scenario {
        Scenario::Clean => CLEAN,
        Scenario::Polluted => POLLUTED,
        Scenario::Alternate if index % 2 == 0 => POLLUTED,
        Scenario::Alternate => CLEAN,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if let Err(e) = validate_topic(&args.topic) {
        eprintln!("✗ Invalid topic '{}': {e}", args.topic);
        std::process::exit(1);
    }

    let mut options = MqttOptions::new(
        generate_client_id("inject-reading"),
        args.broker_host.as_str(),
        args.broker_port,
    );
    options.set_keep_alive(Duration::from_secs(15));

    let (client, mut eventloop) = AsyncClient::new(options, 10);

    println!(
        "Connecting to MQTT broker {}:{}...",
        args.broker_host, args.broker_port
    );
    timeout(Duration::from_secs(10), async {
        loop {
            if let Event::Incoming(Packet::ConnAck(_)) = eventloop.poll().await? {
                return Ok::<(), rumqttc::ConnectionError>(());
            }
        }
    })
    .await??;
    println!("✓ Connected");

    // Keep the event loop running in background
    let driver = tokio::spawn(async move {
        loop {
            if let Err(e) = eventloop.poll().await {
                eprintln!("MQTT eventloop error: {e}");
                break;
            }
        }
    });

    for index in 0..args.count {
        let payload = match &args.raw {
            Some(raw) => raw.clone().into_bytes(),
            None => encode(&reading_for(args.scenario, index))?,
        };

        println!(
            "📤 [{:03}] {} <- {}",
            index + 1,
            args.topic,
            String::from_utf8_lossy(&payload)
        );
        client
            .publish(args.topic.as_str(), QoS::AtMostOnce, false, payload)
            .await?;

        if index + 1 < args.count {
            sleep(Duration::from_millis(args.interval_ms)).await;
        }
    }

    // Brief pause to allow message delivery
    sleep(Duration::from_millis(500)).await;
    client.disconnect().await?;
    let _ = timeout(Duration::from_secs(1), driver).await;

    println!("✓ Done");
    Ok(())
}
