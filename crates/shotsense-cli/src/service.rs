//! Persistent JSON-line service loop.
//!
//! One request per input line, one response line per request, in order.
//! Protocol output goes to the writer only; diagnostics go through
//! `tracing` (stderr) so the stream stays machine-parseable.

use std::io::{BufRead, Write};

use tracing::{debug, warn};

use shotsense_models::{Mode, ServiceRequest, ServiceResponse};
use shotsense_vision::FramePipeline;

/// Run the request/response loop until EOF or a closed output.
///
/// Every input line gets exactly one response line, so callers pairing
/// requests to responses by position never desync. A malformed line
/// (blank included) produces an error response and the loop keeps going;
/// only exhausted input or a write failure ends it.
pub fn run_service_loop<R: BufRead, W: Write>(
    input: R,
    mut output: W,
    pipeline: &FramePipeline,
) -> std::io::Result<()> {
    for line in input.lines() {
        let line = line?;
        let response = handle_line(&line, pipeline);
        serde_json::to_writer(&mut output, &response)?;
        output.write_all(b"\n")?;
        output.flush()?;
    }
    Ok(())
}

/// Process one request line into one response.
pub fn handle_line(line: &str, pipeline: &FramePipeline) -> ServiceResponse {
    let request: ServiceRequest = match serde_json::from_str(line) {
        Ok(req) => req,
        Err(e) => {
            warn!(error = %e, "rejecting malformed request line");
            return ServiceResponse::error(format!("invalid request: {e}"));
        }
    };

    let mode = request
        .mode
        .as_deref()
        .map(Mode::parse_or_default)
        .unwrap_or_default();

    debug!(path = %request.image_path, %mode, "processing request");

    let img = match image::open(&request.image_path) {
        Ok(img) => img,
        Err(e) => {
            return ServiceResponse::error(format!(
                "failed to read image {}: {e}",
                request.image_path
            ));
        }
    };

    match pipeline.process(&img, mode) {
        Ok(items) => ServiceResponse::Items(items),
        Err(e) => match e.trace() {
            Some(trace) => ServiceResponse::error_with_trace(e.to_string(), trace),
            None => ServiceResponse::error(e.to_string()),
        },
    }
}
