use std::fs;
use std::thread;

use ed247_runtime::{Component, Timestamp};
use serde::Serialize;
use tracing::debug;

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{io_error, runtime_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct SendOutput<'a> {
    stream: &'a str,
    channel: &'a str,
    samples: u32,
    frames: usize,
    sample_size: usize,
}

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let interval = args.interval.as_deref().map(parse_duration).transpose()?;
    let payload = resolve_payload(&args)?;

    let component =
        Component::from_path(&args.config).map_err(|err| runtime_error("load failed", err))?;
    let stream = component
        .get_stream(&args.stream)
        .map_err(|err| runtime_error("stream lookup failed", err))?;
    let channel = component
        .channel(stream.channel_id())
        .cloned()
        .ok_or_else(|| {
            CliError::new(INTERNAL, format!("stream {} has no channel", stream.name()))
        })?;
    let stamped = stream.layout().data_timestamp.is_enabled();

    let mut frames = 0usize;
    for index in 0..args.count {
        if index > 0 {
            if let Some(interval) = interval {
                thread::sleep(interval);
            }
        }
        let data_timestamp = stamped.then(Timestamp::now);
        stream
            .push(&payload, data_timestamp)
            .map_err(|err| runtime_error("push failed", err))?;
        frames += component
            .send_channel(&channel)
            .map_err(|err| runtime_error("send failed", err))?;
        debug!(stream = %stream.name(), index, "sample sent");
    }

    let out = SendOutput {
        stream: stream.name(),
        channel: channel.name(),
        samples: args.count,
        frames,
        sample_size: payload.len(),
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table | OutputFormat::Pretty => println!(
            "sent {} sample(s) of {} bytes on {} ({}) in {} frame(s)",
            out.samples, out.sample_size, out.stream, out.channel, out.frames
        ),
    }

    component
        .unload()
        .map_err(|err| runtime_error("unload failed", err))?;
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(hex) = &args.hex {
        return parse_hex(hex);
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Err(CliError::new(USAGE, "one of --data, --hex or --file is required"))
}

/// Decode hex digits, ignoring whitespace and an optional `0x` prefix.
fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input
        .trim()
        .trim_start_matches("0x")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if !digits.is_ascii() {
        return Err(CliError::new(USAGE, format!("invalid hex payload: {input}")));
    }
    if digits.len() % 2 != 0 {
        return Err(CliError::new(USAGE, "hex payload needs an even number of digits"));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| CliError::new(USAGE, format!("invalid hex payload: {input}")))
        })
        .collect()
}
