mod common;

#[tokio::test(flavor = "multi_thread")]
async fn analyze_prints_the_analyzer_view() {
    let addr = common::serve(common::stub_api()).await;
    let out = common::command()
        .args(["analyze", "Nvidia beats on data center demand"])
        .env("NEWSBADGE_API_URL", format!("http://{addr}"))
        .output()
        .await
        .expect("run newsbadge analyze");
    assert!(out.status.success());
    let s = String::from_utf8_lossy(&out.stdout);
    assert!(s.contains("Sentiment: Buy"), "{s}");
    assert!(s.contains("Confidence: 0.82"), "{s}");
    assert!(s.contains("  Hold: 0.10"), "{s}");
    assert!(s.contains("NVDA (NVIDIA Corporation) NASDAQ [Technology]"), "{s}");
    assert!(s.contains("Explanation: Upbeat demand signals."), "{s}");
}

#[tokio::test(flavor = "multi_thread")]
async fn analyze_json_and_batch() {
    let addr = common::serve(common::stub_api()).await;
    let api = format!("http://{addr}");

    let out = common::command()
        .args(["analyze", "Utilities hold steady", "--output", "json", "--api-url", &api])
        .output()
        .await
        .unwrap();
    assert!(out.status.success());
    let v = common::stdout_json(&out);
    assert_eq!(v["sentiment"], "Hold");
    assert_eq!(v["confidence"], 0.82);

    let tmp = tempfile::tempdir().unwrap();
    let batch = tmp.path().join("texts.txt");
    std::fs::write(&batch, "first headline\n\n  second headline  \n").unwrap();
    let out = common::command()
        .args(["analyze", "--output", "json", "--api-url", &api, "--batch"])
        .arg(&batch)
        .output()
        .await
        .unwrap();
    assert!(out.status.success());
    let v = common::stdout_json(&out);
    assert_eq!(v["count"], 2);
    assert_eq!(v["results"][1]["text"], "second headline");
    assert_eq!(v["results"][1]["result"]["sentiment"], "Hold");
}

#[tokio::test(flavor = "multi_thread")]
async fn analyze_rejects_blank_text() {
    let out = common::command()
        .args(["analyze", "   "])
        .output()
        .await
        .unwrap();
    assert!(!out.status.success());
}

#[tokio::test(flavor = "multi_thread")]
async fn health_reports_connection_state() {
    let addr = common::serve(common::stub_api()).await;
    let out = common::command()
        .args(["health", "--api-url", &format!("http://{addr}")])
        .output()
        .await
        .unwrap();
    assert!(out.status.success());
    let v = common::stdout_json(&out);
    assert_eq!(v["connected"], true);
    assert_eq!(v["model_loaded"], true);

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead = listener.local_addr().unwrap();
    drop(listener);
    let out = common::command()
        .args(["health", "--api-url", &format!("http://{dead}")])
        .output()
        .await
        .unwrap();
    assert!(out.status.success());
    let v = common::stdout_json(&out);
    assert_eq!(v["connected"], false);
    assert_eq!(v["model_loaded"], false);
}
