use std::sync::Arc;

use crate::auth::AuthService;
use crate::config::Settings;
use crate::db::DbPool;
use crate::tasks::TaskQueue;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub settings: Arc<Settings>,
    pub auth: AuthService,
    pub tasks: TaskQueue,
}

impl AppState {
    /// Builds the services and starts the background workers.
    pub fn new(pool: DbPool, settings: Settings) -> Self {
        let auth = AuthService::from_settings(pool.clone(), &settings);
        let tasks = TaskQueue::start(pool.clone(), settings.task_workers, settings.task_time_limit);
        Self {
            pool,
            settings: Arc::new(settings),
            auth,
            tasks,
        }
    }
}

impl axum::extract::FromRef<AppState> for DbPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl axum::extract::FromRef<AppState> for TaskQueue {
    fn from_ref(state: &AppState) -> Self {
        state.tasks.clone()
    }
}
