//! Background purge scheduler.

use std::{sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::{domain::MessageKind, usecase::PurgeCategoryUseCase};

/// Spawn a task that purges `kind` every `every`.
///
/// The first purge runs one full interval after startup.
pub fn spawn_purge_scheduler(
    purge_category_usecase: Arc<PurgeCategoryUseCase>,
    kind: MessageKind,
    every: Duration,
) -> JoinHandle<()> {
    tracing::info!("Scheduled purge of {} messages every {:?}", kind, every);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval の初回 tick は即座に完了する
        interval.tick().await;

        loop {
            interval.tick().await;
            match purge_category_usecase.execute(kind).await {
                Ok(removed) => tracing::debug!("Scheduled purge removed {} {} messages", removed, kind),
                Err(e) => tracing::warn!("Scheduled purge failed: {}", e),
            }
        }
    })
}
