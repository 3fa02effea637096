use crate::error::{PipelineError, Result};
use crate::poll::{PollOutcome, Poller};
use crate::providers::{CrawlerService, CrawlerStatus};
use tracing::{info, instrument};

/// Start `name` and wait for it to finish; returns the crawled S3 path.
///
/// The crawler still reports the previous crawl's outcome right after the
/// start request, so the first probe never counts as terminal.
#[instrument(skip(service, poller))]
pub async fn run_crawler(
    service: &dyn CrawlerService,
    poller: &Poller,
    name: &str,
) -> Result<String> {
    if name.trim().is_empty() {
        return Err(PipelineError::invalid_input("crawler name must be non-empty"));
    }

    service.start_crawler(name).await?;
    info!(crawler = name, "Crawler started");

    let operation = format!("crawler '{}'", name);
    let mut first_probe = true;

    let path = poller
        .until(&operation, || {
            let is_first = std::mem::replace(&mut first_probe, false);
            async move {
                let snapshot = service.crawler_snapshot(name).await?;
                match snapshot.status {
                    CrawlerStatus::Running(state) => Ok(PollOutcome::Pending(state)),
                    CrawlerStatus::Ready | CrawlerStatus::Failed(_) if is_first => {
                        Ok(PollOutcome::Pending("STARTING".to_string()))
                    }
                    CrawlerStatus::Failed(reason) => Err(PipelineError::CrawlerFailed {
                        crawler: name.to_string(),
                        reason,
                    }),
                    CrawlerStatus::Ready => snapshot.target_path.map(PollOutcome::Done).ok_or_else(|| {
                        PipelineError::provider(
                            "Glue",
                            format!("crawler '{}' has no S3 target path", name),
                        )
                    }),
                }
            }
        })
        .await?;

    info!(crawler = name, path = %path, "Crawler finished");

    Ok(path)
}
