use std::{fmt::Debug, sync::Arc, time::SystemTime};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use tokio::sync::Mutex;
use uuid::Uuid;

/// A record of something the wallet did on behalf of the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: ActivityType,
    pub time: SystemTime,
    pub data: ActivityData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityType {
    #[serde(rename = "credential-activity")]
    Credential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityData {
    /// Who the wallet interacted with, e.g. the credential issuer.
    pub client: String,
    pub operation: String,
    pub status: ActivityStatus,
    #[serde(default)]
    pub params: Map<String, Json>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Success,
}

impl Activity {
    pub fn new(kind: ActivityType, data: ActivityData) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            time: SystemTime::now(),
            data,
        }
    }
}

/// Sink for [Activity] records.
#[async_trait]
pub trait ActivityLogger: Debug {
    async fn log(&self, activity: Activity) -> Result<()>;
}

/// Discards every activity.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopActivityLogger;

#[async_trait]
impl ActivityLogger for NoopActivityLogger {
    async fn log(&self, _activity: Activity) -> Result<()> {
        Ok(())
    }
}

/// Keeps activities in memory.
///
/// # Warning
/// Activities are lost when the logger is dropped; intended for tests and short-lived wallets.
#[derive(Debug, Clone, Default)]
pub struct MemoryActivityLogger {
    activities: Arc<Mutex<Vec<Activity>>>,
}

impl MemoryActivityLogger {
    /// Every activity logged so far, oldest first.
    pub async fn activities(&self) -> Vec<Activity> {
        self.activities.lock().await.clone()
    }
}

#[async_trait]
impl ActivityLogger for MemoryActivityLogger {
    async fn log(&self, activity: Activity) -> Result<()> {
        self.activities.lock().await.push(activity);
        Ok(())
    }
}
