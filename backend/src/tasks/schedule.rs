use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::{Job, TaskQueue};
use crate::db::DbPool;
use crate::error::AgriTechResult;
use crate::models::SatelliteType;

const DAILY: Duration = Duration::from_secs(86_400);
const SENSOR_PERIOD: Duration = Duration::from_secs(300);
const ANALYTICS_PERIOD: Duration = Duration::from_secs(3_600);

/// Starts the periodic producers. Each one only enqueues; the workers do the rest.
pub fn spawn_scheduler(pool: DbPool, tasks: TaskQueue) -> Vec<JoinHandle<()>> {
    tracing::info!("Periodic task schedule enabled");
    let satellite = {
        let tasks = tasks.clone();
        every(DAILY, "fetch_satellite_data", move || {
            let pool = pool.clone();
            let tasks = tasks.clone();
            async move { enqueue_satellite_fetches(&pool, &tasks).await }
        })
    };
    let sensors = {
        let tasks = tasks.clone();
        every(SENSOR_PERIOD, "process_sensor_data", move || {
            let tasks = tasks.clone();
            async move { tasks.enqueue(Job::ProcessSensorData).map(|_| ()) }
        })
    };
    let analytics = {
        let tasks = tasks.clone();
        every(ANALYTICS_PERIOD, "generate_daily_analytics", move || {
            let tasks = tasks.clone();
            async move { tasks.enqueue(Job::GenerateDailyAnalytics).map(|_| ()) }
        })
    };
    let reports = every(DAILY, "send_daily_reports", move || {
        let tasks = tasks.clone();
        async move { tasks.enqueue(Job::SendDailyReports).map(|_| ()) }
    });
    vec![satellite, sensors, analytics, reports]
}

fn every<F, Fut>(period: Duration, name: &'static str, mut tick: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = AgriTechResult<()>> + Send,
{
    tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(e) = tick().await {
                tracing::error!(task = name, error = %e, "Scheduled enqueue failed");
            }
        }
    })
}

/// One fetch per farm.
async fn enqueue_satellite_fetches(pool: &DbPool, tasks: &TaskQueue) -> AgriTechResult<()> {
    let farm_ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM farms ORDER BY id")
        .fetch_all(pool)
        .await?;
    for farm_id in &farm_ids {
        tasks.enqueue(Job::FetchSatelliteData {
            farm_id: *farm_id,
            satellite_type: SatelliteType::Sentinel2,
        })?;
    }
    tracing::debug!(farms = farm_ids.len(), "Scheduled satellite fetches");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_farm, seed_user, test_pool};

    #[tokio::test]
    async fn test_satellite_fetch_enqueues_per_farm() {
        let pool = test_pool().await;
        let owner = seed_user(&pool, "alice").await;
        seed_farm(&pool, owner.id, "F1").await;
        seed_farm(&pool, owner.id, "F2").await;
        let tasks = TaskQueue::start(pool.clone(), 1, Duration::from_secs(5));

        enqueue_satellite_fetches(&pool, &tasks).await.unwrap();
    }

    #[tokio::test]
    async fn test_scheduler_spawns_four_producers() {
        let pool = test_pool().await;
        let tasks = TaskQueue::start(pool.clone(), 1, Duration::from_secs(5));
        let handles = spawn_scheduler(pool, tasks);
        assert_eq!(handles.len(), 4);
        for handle in handles {
            handle.abort();
        }
    }
}
