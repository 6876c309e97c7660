//! Pipeline worker: accumulate small catalogs, flush on size or timer.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use cairn_announce::AnnounceSender;
use cairn_catalog::{Catalog, MhCatalog};
use cairn_chain::AdAssembler;
use cairn_schema::Multihash;
use tokio::sync::mpsc;
use tokio::time::{Sleep, sleep};
use tracing::error;

use crate::BatchConfig;

/// Bound on a single flush (assembly plus announcement). The flush runs on
/// a worker-owned deadline, never the original caller's.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(120);

/// Which pipeline a worker drives.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Direction {
    Publish,
    Retract,
}

/// One pipeline worker. Single-threaded per direction, so flush order
/// equals arrival order and multihashes appear in catalog-arrival order
/// inside flushed advertisements.
pub(crate) async fn run_batcher(
    direction: Direction,
    mut rx: mpsc::Receiver<Box<dyn Catalog>>,
    config: BatchConfig,
    assembler: Arc<dyn AdAssembler>,
    announcer: Arc<dyn AnnounceSender>,
    publisher_http_addrs: Vec<String>,
) {
    let mut batch: Vec<Multihash> = Vec::with_capacity(config.count_threshold);
    let mut deadline: Option<Pin<Box<Sleep>>> = None;

    loop {
        tokio::select! {
            _ = async { deadline.as_mut().expect("deadline armed").await }, if deadline.is_some() => {
                deadline = None;
                flush(
                    direction,
                    &mut batch,
                    &config,
                    assembler.as_ref(),
                    announcer.as_ref(),
                    &publisher_http_addrs,
                )
                .await;
            }

            received = rx.recv() => {
                let Some(catalog) = received else {
                    // All senders dropped: flush what's pending and stop.
                    if !batch.is_empty() {
                        flush(
                            direction,
                            &mut batch,
                            &config,
                            assembler.as_ref(),
                            announcer.as_ref(),
                            &publisher_http_addrs,
                        )
                        .await;
                    }
                    return;
                };

                // Always drain the whole catalog, even if that overshoots
                // the batch limit.
                match catalog.iter().await {
                    Ok(mut iter) => loop {
                        match iter.next().await {
                            Ok(Some(mh)) => batch.push(mh),
                            Ok(None) => break,
                            Err(e) => {
                                error!(err = %e, "failed to iterate catalog into batch");
                                break;
                            }
                        }
                    },
                    Err(e) => {
                        error!(err = %e, "failed to get catalog iterator");
                        continue;
                    }
                }

                if batch.len() >= config.max_mhs_per_advertisement {
                    deadline = None;
                    flush(
                        direction,
                        &mut batch,
                        &config,
                        assembler.as_ref(),
                        announcer.as_ref(),
                        &publisher_http_addrs,
                    )
                    .await;
                    continue;
                }

                if deadline.is_none() {
                    deadline = Some(Box::pin(sleep(config.max_delay)));
                }
            }
        }
    }
}

/// Flush the accumulated batch as one raw-multihash advertisement, then
/// announce the new head. Errors are logged and dropped; the batch is
/// reset either way.
async fn flush(
    direction: Direction,
    batch: &mut Vec<Multihash>,
    config: &BatchConfig,
    assembler: &dyn AdAssembler,
    announcer: &dyn AnnounceSender,
    publisher_http_addrs: &[String],
) {
    let catalog = MhCatalog::new(std::mem::take(batch));
    batch.reserve(config.count_threshold);

    let flushed = tokio::time::timeout(FLUSH_TIMEOUT, async {
        let new_head = match direction {
            Direction::Publish => assembler.publish_raw_mhs(&catalog).await,
            Direction::Retract => assembler.retract_raw_mhs(&catalog).await,
        };
        let new_head = match new_head {
            Ok(head) => head,
            Err(e) => {
                error!(err = %e, "failed to publish or retract batch");
                return;
            }
        };

        if let Err(e) = cairn_announce::send(new_head, publisher_http_addrs, announcer).await {
            error!(err = %e, head = %new_head, "failed to announce new head");
        }
    })
    .await;

    if flushed.is_err() {
        error!("timed out flushing batch");
    }
}
