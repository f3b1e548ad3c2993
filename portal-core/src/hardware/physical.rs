//! Physical hardware backend: talks to an external EVOK-like HTTP/WS endpoint
//! (spec.md §6). Tolerant by construction — every method absorbs its own
//! errors and returns a neutral value, matching `uwb_hub.rs`'s "never crash
//! the race" posture for transport failures.

use std::time::Duration;

use futures_util::SinkExt;
use portal_wire::ChannelId;
use reqwest::Client;
use serde::Deserialize;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

/// Hardware port operations must time out within 200 ms (spec.md §5).
const IO_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Debug, Deserialize)]
struct DigitalValue {
    value: u8,
}

#[derive(Debug, Deserialize)]
struct CounterValue {
    value: u64,
}

pub struct PhysicalPort {
    client: Client,
    base_url: String,
    ws_url: String,
}

impl PhysicalPort {
    pub fn new(host: &str, port: u16) -> Self {
        let client = Client::builder()
            .timeout(IO_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: format!("http://{host}:{port}"),
            ws_url: format!("ws://{host}:{port}/ws"),
        }
    }

    pub async fn read_digital(&self, index: u32) -> u8 {
        let url = format!("{}/rest/input/{index}", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => match resp.json::<DigitalValue>().await {
                Ok(v) => v.value,
                Err(e) => {
                    debug!("hardware: malformed response from {url}: {e}");
                    0
                }
            },
            Err(e) => {
                warn!("hardware: read_digital({index}) failed: {e}");
                0
            }
        }
    }

    pub async fn write_digital(&self, index: u32, value: u8) {
        let payload = serde_json::json!({
            "cmd": "set",
            "dev": "relay",
            "circuit": index.to_string(),
            "value": if value != 0 { "1" } else { "0" },
        });

        let (mut ws, _) = match connect_async(&self.ws_url).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!("hardware: write_digital({index}) dropped, WS connect failed: {e}");
                return;
            }
        };

        if let Err(e) = ws.send(Message::Text(payload.to_string())).await {
            warn!("hardware: write_digital({index}) dropped, send failed: {e}");
        }
        let _ = ws.close(None).await;
    }

    pub async fn read_pulse_counter(&self, channel: ChannelId) -> u64 {
        let url = format!("{}/rest/input/{}/counter", self.base_url, channel.get());
        match self.client.get(&url).send().await {
            Ok(resp) => match resp.json::<CounterValue>().await {
                Ok(v) => v.value,
                Err(e) => {
                    debug!("hardware: malformed counter response from {url}: {e}");
                    0
                }
            },
            Err(e) => {
                warn!("hardware: read_pulse_counter({channel}) failed: {e}");
                0
            }
        }
    }
}
