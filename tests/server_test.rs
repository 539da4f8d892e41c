//! Integration tests for the plant ledger HTTP server

#[cfg(feature = "server")]
mod server_tests {
    use plant_ledger::server::{run, ServerConfig, ServerHandle, CALLER_HEADER};
    use plant_ledger::{store, Ledger, ManualClock};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    const START: u64 = 1_700_000_000;

    async fn start(state_path: Option<PathBuf>) -> (ServerHandle, String, ManualClock) {
        let clock = ManualClock::new(START);
        let ledger = Arc::new(Ledger::new(clock.clone()));
        // Port 0 picks a random free port
        let config = ServerConfig::new("127.0.0.1", 0, state_path);

        let handle = run(config, ledger).await.expect("Failed to start server");

        // Give server time to start
        tokio::time::sleep(Duration::from_millis(50)).await;

        let base = format!("http://{}", handle.addr());
        (handle, base, clock)
    }

    async fn register(client: &reqwest::Client, base: &str, owner: &str, name: &str) -> u64 {
        let response = client
            .post(format!("{base}/plants"))
            .header(CALLER_HEADER, owner)
            .json(&serde_json::json!({ "name": name, "species": "Nephrolepis" }))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), 201);

        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        body["id"].as_u64().expect("id should be a number")
    }

    fn reading(moisture: u8) -> serde_json::Value {
        serde_json::json!({
            "soil_moisture": moisture,
            "temperature": 2000,
            "humidity": 50,
            "ph": 650,
            "light_intensity": 1200
        })
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (handle, base, _) = start(None).await;

        let client = reqwest::Client::new();
        let response = client
            .get(format!("{base}/health"))
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_success());

        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["status"], "ok");
        assert!(body["version"].as_str().is_some());
        assert_eq!(body["plants"], 0);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_register_and_submit_reading() {
        let (handle, base, clock) = start(None).await;
        let client = reqwest::Client::new();

        let id = register(&client, &base, "alice", "Fern").await;
        assert_eq!(id, 1);

        clock.advance(30);
        let mut body = reading(25);
        body["timestamp"] = serde_json::json!(5);
        let response = client
            .post(format!("{base}/plants/{id}/readings"))
            .header(CALLER_HEADER, "alice")
            .json(&body)
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), 200);

        let outcome: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(outcome["score"], 80);
        assert_eq!(outcome["snapshot"]["timestamp"], START + 30);
        assert_eq!(outcome["alerts"].as_array().map(Vec::len), Some(1));
        assert_eq!(outcome["alerts"][0]["kind"], "LOW_SOIL_MOISTURE");

        let plant: serde_json::Value = client
            .get(format!("{base}/plants/{id}"))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(plant["owner"], "alice");
        assert_eq!(plant["last_updated"], START + 30);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let (handle, base, _) = start(None).await;
        let client = reqwest::Client::new();
        let id = register(&client, &base, "alice", "Fern").await;

        // Missing caller
        let response = client
            .post(format!("{base}/plants/{id}/readings"))
            .json(&reading(50))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), 401);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["code"], "MISSING_CALLER");

        // Wrong owner
        let response = client
            .post(format!("{base}/plants/{id}/readings"))
            .header(CALLER_HEADER, "mallory")
            .json(&reading(50))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), 403);

        // Unknown plant
        let response = client
            .get(format!("{base}/plants/42"))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), 404);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["code"], "NOT_FOUND");

        // Validation
        let mut bad = reading(50);
        bad["ph"] = serde_json::json!(1200);
        let response = client
            .post(format!("{base}/plants/{id}/readings"))
            .header(CALLER_HEADER, "alice")
            .json(&bad)
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), 400);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["code"], "INVALID_PH");

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_transfer_and_owner_listing() {
        let (handle, base, _) = start(None).await;
        let client = reqwest::Client::new();
        let fern = register(&client, &base, "alice", "Fern").await;
        let ivy = register(&client, &base, "alice", "Ivy").await;

        let response = client
            .post(format!("{base}/plants/{fern}/transfer"))
            .header(CALLER_HEADER, "alice")
            .json(&serde_json::json!({ "new_owner": "alice" }))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), 400);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["code"], "SELF_TRANSFER");

        let response = client
            .post(format!("{base}/plants/{fern}/transfer"))
            .header(CALLER_HEADER, "alice")
            .json(&serde_json::json!({ "new_owner": "bob" }))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), 200);
        let plant: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(plant["owner"], "bob");

        let owned: serde_json::Value = client
            .get(format!("{base}/owners/alice/plants"))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(owned["plants"], serde_json::json!([ivy]));

        let owned: serde_json::Value = client
            .get(format!("{base}/owners/bob/plants"))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(owned["plants"], serde_json::json!([fern]));

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_history_and_analytics() {
        let (handle, base, clock) = start(None).await;
        let client = reqwest::Client::new();
        let id = register(&client, &base, "alice", "Fern").await;

        for moisture in [40, 50, 60] {
            clock.advance(60);
            let response = client
                .post(format!("{base}/plants/{id}/readings"))
                .header(CALLER_HEADER, "alice")
                .json(&reading(moisture))
                .send()
                .await
                .expect("Failed to send request");
            assert!(response.status().is_success());
        }

        let history: serde_json::Value = client
            .get(format!("{base}/plants/{id}/history?limit=2"))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        let readings = history["readings"].as_array().expect("readings array");
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0]["soil_moisture"], 50);
        assert_eq!(readings[1]["soil_moisture"], 60);

        let report: serde_json::Value = client
            .get(format!("{base}/plants/{id}/analytics?extended=true"))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(report["total_readings"], 3);
        assert_eq!(report["avg_soil_moisture_7d"], 50);
        assert_eq!(report["health_score"], 100);
        assert_eq!(report["window"]["soil_moisture"]["count"], 3);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_dormant_status() {
        let (handle, base, _) = start(None).await;
        let client = reqwest::Client::new();
        let id = register(&client, &base, "alice", "Fern").await;

        let response = client
            .post(format!("{base}/plants/{id}/status"))
            .header(CALLER_HEADER, "alice")
            .json(&serde_json::json!({ "status": "dormant" }))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), 200);
        let plant: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(plant["status"], "dormant");

        let response = client
            .post(format!("{base}/plants/{id}/readings"))
            .header(CALLER_HEADER, "alice")
            .json(&reading(50))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), 400);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["code"], "DORMANT");

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_mutations_are_persisted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ledger.json");
        let (handle, base, _) = start(Some(path.clone())).await;
        let client = reqwest::Client::new();

        let id = register(&client, &base, "alice", "Fern").await;
        handle.shutdown().await;

        let snapshot = store::load(&path).expect("state file should exist");
        assert_eq!(snapshot.total_plants, 1);
        assert_eq!(snapshot.plants[0].plant.id.0, id);
        assert_eq!(snapshot.plants[0].plant.name, "Fern");
    }

    #[tokio::test]
    async fn test_cors_allows_localhost() {
        let (handle, base, _) = start(None).await;
        let client = reqwest::Client::new();

        let response = client
            .get(format!("{base}/health"))
            .header("Origin", "http://localhost")
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("http://localhost")
        );

        let response = client
            .get(format!("{base}/health"))
            .header("Origin", "https://evil.example")
            .send()
            .await
            .expect("Failed to send request");
        assert!(response.headers().get("access-control-allow-origin").is_none());

        handle.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_readings_are_all_persisted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ledger.json");
        let (handle, base, _) = start(Some(path.clone())).await;
        let client = reqwest::Client::new();
        let id = register(&client, &base, "alice", "Fern").await;

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..24u8 {
            let client = client.clone();
            let url = format!("{base}/plants/{id}/readings");
            tasks.spawn(async move {
                client
                    .post(url)
                    .header(CALLER_HEADER, "alice")
                    .json(&reading(30 + i))
                    .send()
                    .await
                    .expect("Failed to send request")
                    .status()
            });
        }
        while let Some(status) = tasks.join_next().await {
            assert_eq!(status.expect("task panicked"), 200);
        }

        // Every acknowledged reading is on disk before shutdown.
        let snapshot = store::load(&path).expect("state file should exist");
        assert_eq!(snapshot.plants[0].history.len(), 24);
        let leftovers = std::fs::read_dir(dir.path()).expect("read dir").count();
        assert_eq!(leftovers, 1);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_out_of_range_percentages_are_validation_errors() {
        let (handle, base, _) = start(None).await;
        let client = reqwest::Client::new();
        let id = register(&client, &base, "alice", "Fern").await;

        let mut body = reading(50);
        body["soil_moisture"] = serde_json::json!(300);
        let response = client
            .post(format!("{base}/plants/{id}/readings"))
            .header(CALLER_HEADER, "alice")
            .json(&body)
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), 400);
        let error: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(error["code"], "INVALID_MOISTURE");
        assert!(error["error"].as_str().unwrap_or_default().contains("300"));

        // Ownership is still checked first.
        let response = client
            .post(format!("{base}/plants/{id}/readings"))
            .header(CALLER_HEADER, "mallory")
            .json(&body)
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), 403);

        let mut body = reading(50);
        body["humidity"] = serde_json::json!(256);
        let response = client
            .post(format!("{base}/plants/{id}/readings"))
            .header(CALLER_HEADER, "alice")
            .json(&body)
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), 400);
        let error: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(error["code"], "INVALID_HUMIDITY");

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_malformed_body_uses_error_shape() {
        let (handle, base, _) = start(None).await;
        let client = reqwest::Client::new();
        let id = register(&client, &base, "alice", "Fern").await;

        let response = client
            .post(format!("{base}/plants/{id}/readings"))
            .header(CALLER_HEADER, "alice")
            .json(&serde_json::json!({ "soil_moisture": "wet" }))
            .send()
            .await
            .expect("Failed to send request");
        assert!(response.status().is_client_error());
        let error: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(error["code"], "INVALID_BODY");

        handle.shutdown().await;
    }
}
