//! Two components exchanging serial and A429 samples over an in-memory
//! network, with a backup link on the consumer side.
//!
//! Run with:
//!   cargo run -p ed247 --example loopback

use std::error::Error;

use ed247::runtime::{MemoryNetwork, RuntimeConfig};
use ed247::{Component, ComponentConfig};

const PRODUCER: &str = r#"{
    "name": "FlightComputer",
    "identifier": 1,
    "channels": [{
        "name": "Avionics",
        "link": { "remote": "239.1.1.1:2589" },
        "backup": { "remote": "239.1.1.2:2589" },
        "streams": [
            { "name": "Heading", "uid": 1, "kind": "A429", "direction": "out",
              "sample_max_size": 4, "sample_max_number": 8 },
            { "name": "Console", "uid": 2, "kind": "SERIAL", "direction": "out",
              "sample_max_size": 64, "sample_max_number": 8 }
        ]
    }]
}"#;

const CONSUMER: &str = r#"{
    "name": "Display",
    "identifier": 2,
    "channels": [{
        "name": "Avionics",
        "link": { "local": "239.1.1.1:2589" },
        "backup": { "local": "239.1.1.2:2589" },
        "streams": [
            { "name": "Heading", "uid": 1, "kind": "A429", "direction": "in",
              "sample_max_size": 4, "sample_max_number": 8 },
            { "name": "Console", "uid": 2, "kind": "SERIAL", "direction": "in",
              "sample_max_size": 64, "sample_max_number": 8 }
        ]
    }]
}"#;

fn main() -> Result<(), Box<dyn Error>> {
    let network = MemoryNetwork::new();
    let factory = network.factory();
    let producer = Component::load_with(
        &ComponentConfig::from_json(PRODUCER)?,
        &factory,
        RuntimeConfig::default(),
    )?;
    let consumer = Component::load_with(
        &ComponentConfig::from_json(CONSUMER)?,
        &factory,
        RuntimeConfig::default(),
    )?;

    let heading = producer.get_stream("Heading")?;
    let console = producer.get_stream("Console")?;
    for word in [0x1234_5678u32, 0x9abc_def0] {
        producer.push_sample(&heading, &word.to_be_bytes(), None)?;
    }
    producer.push_sample(&console, b"hello from the flight computer", None)?;
    let frames = producer.send_pushed_samples()?;
    println!("producer sent {frames} frame(s) on two links");

    let handled = consumer.poll_receive()?;
    println!("consumer handled {handled} frame(s), duplicates dropped");

    let mut streams = consumer.streams();
    while let Some(stream) = streams.get_next() {
        while let Some(sample) = consumer.pop_sample(&stream)? {
            println!(
                "{:>8} seq={} {:?}",
                stream.name(),
                sample.info.sequence_number,
                sample.data
            );
        }
    }

    let channel = consumer.get_channel("Avionics")?;
    println!("{:#?}", channel.stats());

    producer.unload()?;
    consumer.unload()?;
    Ok(())
}
