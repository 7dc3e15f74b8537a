//! Minimal scan server against a canned Wi-Fi backend.
//!
//! Run with `RUST_LOG=debug cargo run --example scan_server`, then from
//! another terminal:
//!
//! ```text
//! $ printf 'scan' | nc 127.0.0.1 27015
//! ```

use moorline::dev_tracing;
use moorline::prelude::*;

/// Fake radio returning a fixed set of access points.
struct CannedRadio;

const ACCESS_POINTS: &[(&str, i32)] = &[
    ("home-ap", -41),
    ("guest-ap", -63),
    ("cafe-downstairs", -78),
];

impl WifiScan for CannedRadio {
    fn scan_all_access_points(&self) -> ScanResult {
        ScanResult {
            ap_count: ACCESS_POINTS.len(),
        }
    }

    fn format_scan_result(&self, max_len: usize) -> String {
        let mut text = String::new();
        for (ssid, rssi) in ACCESS_POINTS {
            text.push_str(&format!("\n{ssid} ({rssi})"));
        }
        text.truncate(max_len);
        text
    }
}

fn main() {
    dev_tracing::init_tracing();

    compio::runtime::Runtime::new()
        .expect("failed to create runtime")
        .block_on(async {
            let server = ConnectionServer::open(ServerOptions::default())
                .await
                .expect("failed to open server");
            println!("listening on {}", server.local_addr());

            let mut exchange = server.exchange();
            let driver = compio::runtime::spawn(async move {
                loop {
                    exchange.wait_accepted().await;
                    // Connection errors are logged by the exchange; the
                    // server stays up for the next client.
                    let _ = run_exchange(&exchange, &CannedRadio).await;
                }
            });

            if let Err(err) = server.run().await {
                eprintln!("server stopped: {err}");
            }
            drop(driver);
        });
}
