//! Smoke test for a running reminder service.
//!
//! Replays the timed, event, recurring and unknown-event scenarios against
//! `REMINDER_BASE_URL` (default `http://localhost:3000`) and exits non-zero
//! if any of them fails.

use anyhow::{anyhow, Result};
use dotenvy::dotenv;
use log::debug;
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost:3000";

struct Probe {
    client: reqwest::Client,
    base_url: String,
}

impl Probe {
    fn new(base_url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Probe { client, base_url })
    }

    async fn post(&self, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.client.post(&url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.map_err(|e| {
            if e.is_connect() {
                anyhow!("Cannot connect to {}. Is the service running?", self.base_url)
            } else {
                anyhow!("POST {url} failed: {e}")
            }
        })?;
        debug!("POST {url} -> {}", response.status());
        Ok(response.json().await?)
    }

    async fn reminders(&self) -> Result<Vec<Value>> {
        let url = format!("{}/reminders", self.base_url);
        let response = self.client.get(&url).send().await?;
        Ok(response.json().await?)
    }

    async fn find(&self, id: &Value) -> Result<Option<Value>> {
        Ok(self.reminders().await?.into_iter().find(|r| &r["id"] == id))
    }

    /// Create a reminder and return its id, or None if the service refused
    async fn create(&self, path: &str, body: Value) -> Result<Option<Value>> {
        let result = self.post(path, Some(body)).await?;
        if result["success"] == true {
            Ok(Some(result["reminder"]["id"].clone()))
        } else {
            println!("Failed to create reminder: {}", result["error"]);
            Ok(None)
        }
    }

    async fn timed(&self) -> Result<bool> {
        println!("\n--- Testing Timed Reminder ---");
        let Some(id) = self
            .create("/reminders", json!({ "message": "Test timed reminder", "seconds": 5 }))
            .await?
        else {
            return Ok(false);
        };
        println!("Created reminder ID: {id}");
        println!("Waiting 6 seconds...");
        tokio::time::sleep(Duration::from_secs(6)).await;

        match self.find(&id).await? {
            Some(r) if r["fired"] == true => {
                println!("SUCCESS - Reminder fired: {}", r["message"]);
                Ok(true)
            }
            _ => {
                println!("FAILED - Reminder did not fire");
                Ok(false)
            }
        }
    }

    async fn event(&self) -> Result<bool> {
        println!("\n--- Testing Event Reminder ---");
        let Some(id) = self
            .create(
                "/reminders/event",
                json!({ "message": "Test event reminder", "eventName": "test_event" }),
            )
            .await?
        else {
            return Ok(false);
        };
        println!("Created event reminder ID: {id}");

        let trigger = self.post("/events/test_event", None).await?;
        println!("Triggered {} reminder(s)", trigger["remindersTriggered"]);

        match self.find(&id).await? {
            Some(r) if r["fired"] == true => {
                println!("SUCCESS - Event reminder fired: {}", r["message"]);
                Ok(true)
            }
            _ => {
                println!("FAILED - Event reminder did not fire");
                Ok(false)
            }
        }
    }

    async fn recurring(&self) -> Result<bool> {
        println!("\n--- Testing Recurring Reminder ---");
        let Some(id) = self
            .create(
                "/reminders/recurring",
                json!({
                    "message": "Test recurring reminder",
                    "duration_seconds": 2,
                    "recurrences": 3
                }),
            )
            .await?
        else {
            return Ok(false);
        };
        println!("Created recurring reminder ID: {id}");
        println!("Waiting for 3 recurrences (2 seconds each)...");
        tokio::time::sleep(Duration::from_secs(7)).await;

        match self.find(&id).await? {
            Some(r) if r["remaining"] == 0 => {
                println!("SUCCESS - All recurrences completed: {}", r["message"]);
                Ok(true)
            }
            Some(r) => {
                println!("FAILED - Remaining: {}", r["remaining"]);
                Ok(false)
            }
            None => {
                println!("FAILED - Remaining: N/A");
                Ok(false)
            }
        }
    }

    async fn unknown_event(&self) -> Result<bool> {
        println!("\n--- Testing Unknown Event ---");
        let before = self.reminders().await?;
        let trigger = self.post("/events/unknown_event", None).await?;
        let after = self.reminders().await?;

        if trigger["remindersTriggered"] == 0 && before == after {
            println!("SUCCESS - No reminders triggered");
            Ok(true)
        } else {
            println!(
                "FAILED - Triggered {} reminder(s)",
                trigger["remindersTriggered"]
            );
            Ok(false)
        }
    }

    async fn summary(&self) -> Result<()> {
        println!("\n--- Getting All Reminders ---");
        let reminders = self.reminders().await?;
        println!("Total reminders: {}", reminders.len());
        for r in &reminders {
            let status = if r["fired"] == true { "FIRED" } else { "PENDING" };
            println!("  - [{status}] {}", r["message"].as_str().unwrap_or_default());
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let base_url = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("REMINDER_BASE_URL").ok())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let probe = Probe::new(base_url.trim_end_matches('/').to_string())?;

    println!("Testing Reminder Microservice");
    println!("Server: {}", probe.base_url);

    let results = [
        probe.timed().await?,
        probe.event().await?,
        probe.recurring().await?,
        probe.unknown_event().await?,
    ];
    probe.summary().await?;

    let failed = results.iter().filter(|ok| !**ok).count();
    if failed > 0 {
        return Err(anyhow!("{failed} scenario(s) failed"));
    }

    println!("\nAll tests completed!");
    Ok(())
}
