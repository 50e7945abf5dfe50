//! Dumps the compiled OpenAPI spec as pretty JSON.
//!
//! Writes to stdout by default, or to the file given as the first argument:
//!   cargo run --bin generate_openapi -- openapi.json

use std::{env, fs, process};

use aquamonitor_service::api::handlers::ApiDoc;
use utoipa::OpenApi;

fn main() {
    let json = ApiDoc::openapi()
        .to_pretty_json()
        .expect("Failed to serialise OpenAPI spec");

    match env::args().nth(1) {
        Some(path) => {
            if let Err(e) = fs::write(&path, &json) {
                eprintln!("Error writing to {path}: {e}");
                process::exit(1);
            }
            eprintln!("OpenAPI spec written to {path}");
        }
        None => println!("{json}"),
    }
}
