//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI document for the tutor REST API. The output path is the
//! first argument, `openapi.json` by default.

use api_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "openapi.json".to_string());
    let doc = ApiDoc::openapi().to_pretty_json()?;
    std::fs::write(&path, doc)?;
    println!("OpenAPI document written to {}", path);
    Ok(())
}
