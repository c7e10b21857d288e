//! Write the waitlist OpenAPI document to stdout as pretty-printed JSON.

use std::io::{self, Write};
use std::process::ExitCode;

use utoipa::OpenApi;
use waitlist::doc::ApiDoc;

fn main() -> ExitCode {
    let document = match ApiDoc::openapi().to_pretty_json() {
        Ok(document) => document,
        Err(error) => {
            let _ = writeln!(io::stderr(), "failed to serialise OpenAPI document: {error}");
            return ExitCode::FAILURE;
        }
    };
    let mut stdout = io::stdout().lock();
    match writeln!(stdout, "{document}") {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
