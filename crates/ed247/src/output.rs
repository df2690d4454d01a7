use std::fmt::Write as _;
use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use ed247_runtime::{PoppedSample, Stream, Timestamp};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct SampleOutput<'a> {
    stream: &'a str,
    uid: u16,
    size: usize,
    payload: String,
    component_identifier: u16,
    sequence_number: u16,
    transport_timestamp: String,
    data_timestamp: Option<String>,
    recv_timestamp: Option<String>,
}

pub fn print_sample(stream: &Stream, sample: &PoppedSample, format: OutputFormat) {
    let info = &sample.info;
    match format {
        OutputFormat::Json => {
            let out = SampleOutput {
                stream: stream.name(),
                uid: stream.uid(),
                size: sample.data.len(),
                payload: hex(&sample.data),
                component_identifier: info.component_identifier,
                sequence_number: info.sequence_number,
                transport_timestamp: info.transport_timestamp.to_string(),
                data_timestamp: sample.data_timestamp.map(|ts| ts.to_string()),
                recv_timestamp: sample.recv_timestamp.map(|ts| ts.to_string()),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["STREAM", "UID", "SIZE", "SOURCE", "SEQ", "DATA TS", "PAYLOAD"])
                .add_row(vec![
                    stream.name().to_string(),
                    stream.uid().to_string(),
                    sample.data.len().to_string(),
                    info.component_identifier.to_string(),
                    info.sequence_number.to_string(),
                    optional_timestamp(sample.data_timestamp),
                    hex(&sample.data),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "stream={} uid={} size={} source={} seq={} data_ts={} payload={}",
                stream.name(),
                stream.uid(),
                sample.data.len(),
                info.component_identifier,
                info.sequence_number,
                optional_timestamp(sample.data_timestamp),
                hex(&sample.data)
            );
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for byte in data {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn optional_timestamp(ts: Option<Timestamp>) -> String {
    ts.map(|ts| ts.to_string()).unwrap_or_else(|| "-".to_string())
}
