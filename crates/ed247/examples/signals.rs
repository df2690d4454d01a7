//! Composing analog and VNAD samples signal by signal.
//!
//! Run with:
//!   cargo run -p ed247 --example signals

use std::error::Error;

use ed247::runtime::{MemoryNetwork, RuntimeConfig, SignalValue};
use ed247::{Component, ComponentConfig};

fn topology(name: &str, identifier: u16, direction: &str, link: &str) -> String {
    format!(
        r#"{{
    "name": "{name}",
    "identifier": {identifier},
    "channels": [{{
        "name": "Sensors",
        "link": {link},
        "streams": [
            {{ "name": "Probes", "uid": 10, "kind": "ANALOG", "direction": "{direction}",
               "sample_max_size": 8,
               "signals": [
                   {{ "name": "Pressure", "byte_offset": 0, "unit": "hPa" }},
                   {{ "name": "Temperature", "byte_offset": 4, "unit": "degC" }}
               ] }},
            {{ "name": "Track", "uid": 11, "kind": "VNAD", "direction": "{direction}",
               "sample_max_size": 64,
               "signals": [
                   {{ "name": "Waypoints", "nad_type": "uint16", "max_number": 8 }},
                   {{ "name": "Leg", "nad_type": "uint8", "max_number": 1 }}
               ] }}
        ]
    }}]
}}"#
    )
}

fn main() -> Result<(), Box<dyn Error>> {
    let network = MemoryNetwork::new();
    let factory = network.factory();
    let sender = Component::load_with(
        &ComponentConfig::from_json(&topology(
            "Sensors",
            10,
            "out",
            r#"{ "remote": "127.0.0.1:4000" }"#,
        ))?,
        &factory,
        RuntimeConfig::default(),
    )?;
    let receiver = Component::load_with(
        &ComponentConfig::from_json(&topology(
            "Monitor",
            20,
            "in",
            r#"{ "local": "127.0.0.1:4000" }"#,
        ))?,
        &factory,
        RuntimeConfig::default(),
    )?;

    let mut probes = sender.get_stream("Probes")?.assistant()?;
    probes.write_value(&*sender.get_signal("Pressure")?, SignalValue::F32(1013.25))?;
    probes.write_value(&*sender.get_signal("Temperature")?, SignalValue::F32(-12.5))?;
    probes.push(None)?;

    let mut track = sender.get_stream("Track")?.assistant()?;
    let waypoints: Vec<u8> = [12u16, 40, 7].iter().flat_map(|w| w.to_ne_bytes()).collect();
    track.write_signal(&*sender.get_signal("Waypoints")?, &waypoints)?;
    track.write_value(&*sender.get_signal("Leg")?, SignalValue::U8(2))?;
    track.push(None)?;

    sender.send_pushed_samples()?;
    receiver.poll_receive()?;

    let mut probes = receiver.get_stream("Probes")?.assistant()?;
    if probes.pop()?.is_some() {
        for name in ["Pressure", "Temperature"] {
            let signal = receiver.get_signal(name)?;
            if let Some(value) = probes.read_value(&signal)? {
                println!("{name} = {value} {}", signal.unit().unwrap_or(""));
            }
        }
    }

    let mut track = receiver.get_stream("Track")?.assistant()?;
    if track.pop()?.is_some() {
        let raw = track.read_signal(&*receiver.get_signal("Waypoints")?)?;
        let waypoints: Vec<u16> = raw
            .chunks_exact(2)
            .map(|pair| u16::from_ne_bytes([pair[0], pair[1]]))
            .collect();
        println!("waypoints = {waypoints:?}");
        println!("leg = {:?}", track.read_value(&*receiver.get_signal("Leg")?)?);
    }

    Ok(())
}
