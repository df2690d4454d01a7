use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ed247_runtime::{Component, ErrorCategory, Stream};
use tracing::info;

use crate::cmd::{parse_duration, ListenArgs};
use crate::exit::{runtime_error, CliError, CliResult, INTERNAL, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_sample, OutputFormat};

/// Longest single wait, so Ctrl-C is noticed promptly.
const WAIT_SLICE: Duration = Duration::from_millis(200);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let deadline = args
        .timeout
        .as_deref()
        .map(parse_duration)
        .transpose()?
        .and_then(|timeout| Instant::now().checked_add(timeout));

    let component =
        Component::from_path(&args.config).map_err(|err| runtime_error("load failed", err))?;
    let streams: Vec<Arc<Stream>> = component
        .find_streams(&args.streams)
        .map_err(|err| runtime_error("stream lookup failed", err))?
        .iter()
        .filter(|stream| stream.direction().can_receive())
        .collect();
    if streams.is_empty() {
        return Err(CliError::new(
            USAGE,
            format!("no input stream matches '{}'", args.streams),
        ));
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    component
        .start_receiver()
        .map_err(|err| runtime_error("receiver start failed", err))?;
    info!(streams = streams.len(), "listening");

    let mut printed = 0usize;
    let mut expired = false;
    'listen: while running.load(Ordering::SeqCst) {
        let slice = match deadline {
            Some(deadline) => {
                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    expired = true;
                    break;
                }
                left.min(WAIT_SLICE)
            }
            None => WAIT_SLICE,
        };

        let ready = match component.wait_frame(&streams, slice) {
            Ok(ready) => ready,
            Err(err) if err.category() == ErrorCategory::Timeout => continue,
            Err(err) => return Err(runtime_error("wait failed", err)),
        };

        for stream in ready.iter() {
            while let Some(sample) = stream
                .pop()
                .map_err(|err| runtime_error("pop failed", err))?
            {
                print_sample(&stream, &sample, format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break 'listen;
                }
            }
        }
    }

    component
        .unload()
        .map_err(|err| runtime_error("unload failed", err))?;

    let short = args.count.map_or(printed == 0, |count| printed < count);
    if expired && short {
        return Err(CliError::new(
            TIMEOUT,
            format!("timed out after receiving {printed} sample(s)"),
        ));
    }
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
