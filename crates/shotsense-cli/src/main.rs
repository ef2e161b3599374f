//! Inference front-end binary.
//!
//! Two modes of operation:
//! - `shotsense <image> [mode]` runs one inference and prints a single
//!   JSON document on stdout.
//! - `shotsense serve` runs the persistent JSON-line service over
//!   stdin/stdout.
//!
//! stdout carries protocol output only; all logging goes to stderr.

mod service;

use std::io::{BufWriter, Write};
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shotsense_models::{Mode, ServiceResponse};
use shotsense_vision::{FramePipeline, ModelPaths, ModelRegistry};

fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let Some(first) = args.first() else {
        // Contract: the missing-argument error is itself a JSON document.
        println!("{}", serde_json::json!({ "error": "No image path provided" }));
        std::process::exit(1);
    };

    let registry = Arc::new(ModelRegistry::load(&ModelPaths::from_env()));
    let pipeline = FramePipeline::new(registry);

    if first == "serve" {
        info!("Starting JSON-line service");
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        if let Err(e) = service::run_service_loop(stdin.lock(), stdout.lock(), &pipeline) {
            // A closed stdout is a normal way for the parent to end the
            // session; anything else is worth a nonzero exit.
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                return;
            }
            eprintln!("service loop failed: {e}");
            std::process::exit(1);
        }
        info!("Service input exhausted, shutting down");
        return;
    }

    let mode = args
        .get(1)
        .map(|s| Mode::parse_or_default(s))
        .unwrap_or_default();

    let response = run_once(first, mode, &pipeline);

    // Exit code 1 is reserved for the missing-argument case; a failed
    // stdout write (e.g. a closed pipe) still exits 0.
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if let Err(e) = write_response(&mut out, &response) {
        eprintln!("failed to write response: {e}");
    }
}

/// One-shot inference. Failures become a structured error document rather
/// than a nonzero exit, so callers always get parseable output.
fn run_once(image_path: &str, mode: Mode, pipeline: &FramePipeline) -> ServiceResponse {
    info!(path = image_path, %mode, "running one-shot inference");

    let img = match image::open(image_path) {
        Ok(img) => img,
        Err(e) => {
            return ServiceResponse::error(format!("failed to read image {image_path}: {e}"));
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

fn write_response<W: Write>(out: &mut W, response: &ServiceResponse) -> std::io::Result<()> {
    serde_json::to_writer(&mut *out, response)?;
    out.write_all(b"\n")?;
    out.flush()
}

fn init_tracing() {
    let env_filter = EnvFilter::from_default_env()
        .add_directive("shotsense=info".parse().unwrap())
        .add_directive("ort=warn".parse().unwrap());

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_file(false)
                .with_line_number(false),
        )
        .with(env_filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        }
    }

    // The caller logs this error and still exits 0; it must come back as a
    // plain io::Error, not a panic or process exit.
    #[test]
    fn write_failure_surfaces_as_io_error() {
        let err = write_response(&mut FailingWriter, &ServiceResponse::error("x")).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
    }
}
