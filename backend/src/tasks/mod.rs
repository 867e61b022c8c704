//! Fire-and-forget background jobs.
//!
//! Handlers enqueue a [`Job`] and return a [`TaskReceipt`] right away. A fixed
//! pool of workers drains the channel; each job runs under a hard time limit
//! and is never retried.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::{AgriTechError, AgriTechResult};
use crate::models::SatelliteType;

pub mod analytics;
pub mod notification;
pub mod satellite;
pub mod schedule;
pub mod sensor;

pub use schedule::spawn_scheduler;

const QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    FetchSatelliteData { farm_id: i64, satellite_type: SatelliteType },
    ProcessSatelliteImage { image_id: i64 },
    GenerateVegetationMap { farm_id: i64 },
    UpdateWeatherData { farm_id: i64 },
    ProcessSensorData,
    CheckSensorHealth,
    CalibrateSensor { sensor_id: i64 },
    GenerateDailyAnalytics,
    GenerateFarmReport { farm_id: i64 },
    PredictCropYield { crop_id: i64 },
    SendDailyReports,
    SendAlertNotification { user_id: i64, alert_type: String, message: String },
    SendWeatherAlerts,
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::FetchSatelliteData { .. } => "fetch_satellite_data",
            Job::ProcessSatelliteImage { .. } => "process_satellite_image",
            Job::GenerateVegetationMap { .. } => "generate_vegetation_map",
            Job::UpdateWeatherData { .. } => "update_weather_data",
            Job::ProcessSensorData => "process_sensor_data",
            Job::CheckSensorHealth => "check_sensor_health",
            Job::CalibrateSensor { .. } => "calibrate_sensor",
            Job::GenerateDailyAnalytics => "generate_daily_analytics",
            Job::GenerateFarmReport { .. } => "generate_farm_report",
            Job::PredictCropYield { .. } => "predict_crop_yield",
            Job::SendDailyReports => "send_daily_reports",
            Job::SendAlertNotification { .. } => "send_alert_notification",
            Job::SendWeatherAlerts => "send_weather_alerts",
        }
    }
}

/// What a caller gets back from [`TaskQueue::enqueue`].
#[derive(Debug, Clone, Serialize)]
pub struct TaskReceipt {
    pub task_id: Uuid,
    pub task: &'static str,
    pub status: &'static str,
}

/// Result of a finished job, tagged by job name when logged.
#[derive(Debug, Serialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum Outcome {
    SatelliteFetch(satellite::FetchOutcome),
    ImageProcessing(satellite::ImageOutcome),
    VegetationMap(satellite::VegetationMapOutcome),
    WeatherRefresh(satellite::WeatherRefreshOutcome),
    SensorBatch(sensor::BatchOutcome),
    SensorHealth(sensor::HealthOutcome),
    Calibration(sensor::CalibrationOutcome),
    DailyAnalytics(analytics::DailyOutcome),
    FarmReport(analytics::ReportOutcome),
    YieldPrediction(analytics::YieldOutcome),
    DailyReports(notification::DailyReportsOutcome),
    AlertNotification(notification::AlertOutcome),
    WeatherAlerts(notification::WeatherAlertsOutcome),
}

#[derive(Debug)]
pub enum TaskStatus {
    Completed(Outcome),
    Failed(AgriTechError),
    TimedOut,
}

struct Envelope {
    task_id: Uuid,
    job: Job,
}

#[derive(Clone)]
pub struct TaskQueue {
    sender: mpsc::Sender<Envelope>,
}

impl TaskQueue {
    /// Spawns `workers` consumers on the current runtime.
    pub fn start(pool: DbPool, workers: usize, time_limit: Duration) -> Self {
        let (sender, receiver) = mpsc::channel::<Envelope>(QUEUE_CAPACITY);
        let receiver = Arc::new(Mutex::new(receiver));

        for worker in 0..workers.max(1) {
            let pool = pool.clone();
            let receiver = Arc::clone(&receiver);
            tokio::spawn(async move {
                loop {
                    let next = receiver.lock().await.recv().await;
                    let Some(envelope) = next else {
                        break;
                    };
                    let (name, job) = execute(&pool, envelope.job);
                    supervise(envelope.task_id, name, time_limit, job).await;
                }
                tracing::debug!(worker, "Task worker stopped");
            });
        }

        tracing::info!(workers = workers.max(1), time_limit_secs = time_limit.as_secs(), "Task queue started");
        Self { sender }
    }

    pub fn enqueue(&self, job: Job) -> AgriTechResult<TaskReceipt> {
        let task_id = Uuid::new_v4();
        let task = job.name();
        self.sender
            .try_send(Envelope { task_id, job })
            .map_err(|e| {
                tracing::error!(task, error = %e, "Could not queue background task");
                AgriTechError::Internal(format!("could not queue {}", task))
            })?;

        tracing::info!(task, %task_id, "Queued background task");
        Ok(TaskReceipt {
            task_id,
            task,
            status: "processing",
        })
    }
}

type JobFuture<'a> = std::pin::Pin<Box<dyn Future<Output = AgriTechResult<Outcome>> + Send + 'a>>;

fn execute(pool: &DbPool, job: Job) -> (&'static str, JobFuture<'_>) {
    let name = job.name();
    let fut: JobFuture<'_> = match job {
        Job::FetchSatelliteData { farm_id, satellite_type } => Box::pin(async move {
            satellite::fetch_satellite_data(pool, farm_id, satellite_type)
                .await
                .map(Outcome::SatelliteFetch)
        }),
        Job::ProcessSatelliteImage { image_id } => Box::pin(async move {
            satellite::process_satellite_image(pool, image_id)
                .await
                .map(Outcome::ImageProcessing)
        }),
        Job::GenerateVegetationMap { farm_id } => Box::pin(async move {
            satellite::generate_vegetation_map(pool, farm_id)
                .await
                .map(Outcome::VegetationMap)
        }),
        Job::UpdateWeatherData { farm_id } => Box::pin(async move {
            satellite::update_weather_data(pool, farm_id)
                .await
                .map(Outcome::WeatherRefresh)
        }),
        Job::ProcessSensorData => Box::pin(async move {
            sensor::process_sensor_data(pool, chrono::Utc::now())
                .await
                .map(Outcome::SensorBatch)
        }),
        Job::CheckSensorHealth => {
            Box::pin(async move { sensor::check_sensor_health(pool).await.map(Outcome::SensorHealth) })
        }
        Job::CalibrateSensor { sensor_id } => Box::pin(async move {
            sensor::calibrate_sensor(pool, sensor_id)
                .await
                .map(Outcome::Calibration)
        }),
        Job::GenerateDailyAnalytics => Box::pin(async move {
            analytics::generate_daily_analytics(pool, chrono::Utc::now())
                .await
                .map(Outcome::DailyAnalytics)
        }),
        Job::GenerateFarmReport { farm_id } => Box::pin(async move {
            analytics::generate_farm_report(pool, farm_id)
                .await
                .map(Outcome::FarmReport)
        }),
        Job::PredictCropYield { crop_id } => Box::pin(async move {
            analytics::predict_crop_yield(pool, crop_id)
                .await
                .map(Outcome::YieldPrediction)
        }),
        Job::SendDailyReports => Box::pin(async move {
            notification::send_daily_reports(pool)
                .await
                .map(Outcome::DailyReports)
        }),
        Job::SendAlertNotification { user_id, alert_type, message } => Box::pin(async move {
            notification::send_alert_notification(pool, user_id, &alert_type, &message)
                .await
                .map(Outcome::AlertNotification)
        }),
        Job::SendWeatherAlerts => Box::pin(async move {
            notification::send_weather_alerts(pool, chrono::Utc::now())
                .await
                .map(Outcome::WeatherAlerts)
        }),
    };
    (name, fut)
}

/// Runs one job under `limit`, logging start and finish. Timeouts are fatal.
pub(crate) async fn supervise<F>(task_id: Uuid, task: &'static str, limit: Duration, job: F) -> TaskStatus
where
    F: Future<Output = AgriTechResult<Outcome>>,
{
    tracing::info!(task, %task_id, "Task started");
    match tokio::time::timeout(limit, job).await {
        Ok(Ok(outcome)) => {
            tracing::info!(task, %task_id, ?outcome, "Task finished");
            TaskStatus::Completed(outcome)
        }
        Ok(Err(e)) => {
            tracing::error!(task, %task_id, error = %e, "Task failed");
            TaskStatus::Failed(e)
        }
        Err(_) => {
            tracing::error!(task, %task_id, limit_secs = limit.as_secs(), "Task exceeded its time limit and was aborted");
            TaskStatus::TimedOut
        }
    }
}
