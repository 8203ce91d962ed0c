//! Dump the message catalog as JSON, for documentation tooling and
//! cross-implementation conformance checks.
//!
//! Usage: `cargo run --example export_catalog [out.json]`

use std::{env, fs, path::PathBuf};

use serde::Serialize;

use fanslink_models::{ArgKind, CatalogEntry, DOWNLINK_CATALOG, UPLINK_CATALOG};

#[derive(Serialize)]
struct Catalog {
    schema_version: String,
    messages: Vec<CatalogMessage>,
}

#[derive(Serialize)]
struct CatalogMessage {
    id: String,
    direction: String,
    template: String,
    args: Vec<String>,
    response: String,
    timeout_secs: Option<u16>,
    responses: Vec<String>,
}

fn arg_name(arg: ArgKind) -> String {
    format!("{arg:?}")
}

fn response_id(entry: &CatalogEntry, num: u16, subtype: u8) -> String {
    let prefix = if entry.is_downlink() { "UM" } else { "DM" };
    if subtype == 0 {
        format!("{prefix}{num}")
    } else {
        format!("{prefix}{num}{}", subtype as char)
    }
}

fn main() {
    let messages: Vec<CatalogMessage> = UPLINK_CATALOG
        .iter()
        .chain(DOWNLINK_CATALOG)
        .map(|entry| CatalogMessage {
            id: entry.id(),
            direction: entry.direction.to_string(),
            template: entry.template.to_string(),
            args: entry.args.iter().map(|a| arg_name(*a)).collect(),
            response: entry.response.to_string(),
            timeout_secs: entry.timeout_secs,
            responses: entry
                .responses
                .iter()
                .map(|(num, sub)| response_id(entry, *num, *sub))
                .collect(),
        })
        .collect();

    let catalog = Catalog {
        schema_version: "1".to_string(),
        messages,
    };
    let json = serde_json::to_string_pretty(&catalog).expect("catalog serializes");

    match env::args().nth(1).map(PathBuf::from) {
        Some(path) => {
            fs::write(&path, json).expect("write catalog file");
            eprintln!("wrote {} entries to {}", catalog.messages.len(), path.display());
        }
        None => println!("{json}"),
    }
}
