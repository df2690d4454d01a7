use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use ed247_runtime::{ComponentConfig, Direction, StreamKind};
use serde::Serialize;

use crate::cmd::InfoArgs;
use crate::exit::{runtime_error, CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct StreamInfo<'a> {
    name: &'a str,
    uid: u16,
    kind: StreamKind,
    direction: Direction,
    sample_max_size: usize,
    sample_max_number: usize,
    signals: Vec<&'a str>,
}

#[derive(Serialize)]
struct ChannelInfo<'a> {
    name: &'a str,
    link: String,
    backup: Option<String>,
    header: bool,
    simple: bool,
    max_frame_size: usize,
    streams: Vec<StreamInfo<'a>>,
}

#[derive(Serialize)]
struct InfoOutput<'a> {
    component: &'a str,
    identifier: u16,
    comment: &'a str,
    channels: Vec<ChannelInfo<'a>>,
}

/// Validates the topology without opening any link.
pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let config = ComponentConfig::from_path(&args.config)
        .map_err(|err| runtime_error("load failed", err))?;
    config
        .validate()
        .map_err(|err| runtime_error("invalid configuration", err))?;

    let out = InfoOutput {
        component: &config.name,
        identifier: config.identifier,
        comment: &config.comment,
        channels: config
            .channels
            .iter()
            .map(|channel| ChannelInfo {
                name: &channel.name,
                link: channel.link.to_string(),
                backup: channel.backup.as_ref().map(ToString::to_string),
                header: channel.header.enabled,
                simple: channel.simple,
                max_frame_size: channel.max_frame_size,
                streams: channel
                    .streams
                    .iter()
                    .map(|stream| StreamInfo {
                        name: &stream.name,
                        uid: stream.uid,
                        kind: stream.kind,
                        direction: stream.direction,
                        sample_max_size: stream.sample_max_size,
                        sample_max_number: stream.sample_max_number,
                        signals: stream.signals.iter().map(|s| s.name.as_str()).collect(),
                    })
                    .collect(),
            })
            .collect(),
    };

    print_info(&out, format);
    Ok(SUCCESS)
}

fn print_info(out: &InfoOutput<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            println!("Component {} (identifier {})", out.component, out.identifier);
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "CHANNEL", "STREAM", "UID", "KIND", "DIR", "SIZE", "DEPTH", "SIGNALS",
                ]);
            for channel in &out.channels {
                for stream in &channel.streams {
                    table.add_row(vec![
                        channel.name.to_string(),
                        stream.name.to_string(),
                        stream.uid.to_string(),
                        stream.kind.to_string(),
                        stream.direction.as_str().to_string(),
                        stream.sample_max_size.to_string(),
                        stream.sample_max_number.to_string(),
                        stream.signals.len().to_string(),
                    ]);
                }
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("Component: {} ({})", out.component, out.identifier);
            if !out.comment.is_empty() {
                println!("  {}", out.comment);
            }
            for channel in &out.channels {
                println!("  Channel {}: {}", channel.name, channel.link);
                if let Some(backup) = &channel.backup {
                    println!("    backup:  {backup}");
                }
                for stream in &channel.streams {
                    println!(
                        "    {} uid={} {} {} size={} depth={}",
                        stream.name,
                        stream.uid,
                        stream.kind,
                        stream.direction.as_str(),
                        stream.sample_max_size,
                        stream.sample_max_number
                    );
                    for signal in &stream.signals {
                        println!("      - {signal}");
                    }
                }
            }
        }
    }
}
