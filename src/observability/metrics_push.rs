use tracing::info;

/// Push the rendered metrics snapshot to a Pushgateway under `job`/`instance`.
///
/// Short-lived batch runs are gone before a scraper could reach them, so the
/// snapshot is pushed once at the end of a run instead.
pub async fn push_to_gateway(base_url: &str, job: &str, instance: &str) -> anyhow::Result<()> {
    let Some(metrics_text) = super::metrics::render() else {
        info!("pushgateway: no recorder installed, skipping push");
        return Ok(());
    };

    let push_url = push_url(base_url, job, instance);
    info!("pushgateway: pushing {} bytes to {}", metrics_text.len(), push_url);

    let client = reqwest::Client::new();
    let response = client
        .put(&push_url)
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(metrics_text)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Pushgateway returned status {}: {}", status, body);
    }

    info!("pushgateway: pushed metrics for instance={}", instance);
    Ok(())
}

fn push_url(base_url: &str, job: &str, instance: &str) -> String {
    format!(
        "{}/metrics/job/{}/instance/{}",
        base_url.trim_end_matches('/'),
        job,
        instance
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_url() {
        assert_eq!(
            push_url("http://localhost:9091/", "sentiment_workflow", "run-1"),
            "http://localhost:9091/metrics/job/sentiment_workflow/instance/run-1"
        );
    }
}
