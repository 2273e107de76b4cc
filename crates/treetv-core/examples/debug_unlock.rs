//! Debug script to walk the full unlock flow against the live site
//!
//! Run with: RUST_LOG=treetv_core=debug cargo run --example debug_unlock -p treetv-core -- /player/1503/21

use treetv_core::{PlayRequest, UnlockDriver};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("treetv_core=info")),
        )
        .init();

    let locator = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/player/1503/21".to_string());

    let driver = UnlockDriver::new()?;
    println!("Fingerprint cookie: {}\n", driver.session().fingerprint().cookie());

    let request = PlayRequest {
        locator: locator.clone(),
        title: "Debug".to_string(),
        referer: "/".to_string(),
        imdb_id: None,
    };

    match driver.resolve(&request).await {
        Ok(item) => {
            println!("✓ Unlocked {}", locator);
            println!("   URL: {}", item.stream.url);
            println!("   Mimetype: {}", item.stream.mimetype);
            println!("\nSegment headers:");
            for (name, value) in &driver.stream_headers(&item.stream.url)? {
                println!("   {}: {}", name, value.to_str().unwrap_or("<binary>"));
            }
            println!("\n{}", item.video_params());
        }
        Err(e) => {
            println!("✗ Failed to unlock {}: {}", locator, e);
        }
    }

    Ok(())
}
