use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Direction, Script};
use std::time::Duration;
use uuid::Uuid;

use super::{JobStore, QueueError};
use crate::models::job::{JobRecord, JobResult, JobStatus, QueuedJob};

const KEY_PREFIX: &str = "detect_jobs";

/// Writes a job record only if the status move is forward and the current
/// record is not terminal. Returns 1 when written, 0 when rejected.
///
/// The rank table must match `JobStatus::rank`, with terminal states at 2.
const TRANSITION_SCRIPT: &str = r#"
local rank = { PENDING = 0, PROCESSING = 1, SUCCESS = 2, FAIL = 2 }
local current = redis.call('GET', KEYS[1])
if current then
  local status = cjson.decode(current)['status']
  if rank[status] == 2 or rank[ARGV[1]] < rank[status] then
    return 0
  end
end
local ttl = tonumber(ARGV[3])
if ttl > 0 then
  redis.call('SET', KEYS[1], ARGV[2], 'EX', ttl)
else
  redis.call('SET', KEYS[1], ARGV[2])
end
return 1
"#;

/// Redis-backed job queue and result store.
///
/// Layout:
/// - `detect_jobs:queue`: pending payloads (LPUSH in, RPOP out)
/// - `detect_jobs:processing:{worker_id}`: payloads claimed by one worker
/// - `detect_jobs:job:{id}`: JSON [`JobRecord`]
pub struct RedisJobStore {
    client: redis::Client,
    worker_id: String,
    result_ttl: Option<Duration>,
    transition: Script,
}

impl RedisJobStore {
    pub fn new(
        redis_url: &str,
        worker_id: &str,
        result_ttl: Option<Duration>,
    ) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(QueueError::Redis)?;
        Ok(Self {
            client,
            worker_id: worker_id.to_string(),
            result_ttl,
            transition: Script::new(TRANSITION_SCRIPT),
        })
    }

    fn queue_key() -> String {
        format!("{KEY_PREFIX}:queue")
    }

    fn processing_key(&self) -> String {
        format!("{KEY_PREFIX}:processing:{}", self.worker_id)
    }

    fn job_key(job_id: Uuid) -> String {
        format!("{KEY_PREFIX}:job:{job_id}")
    }

    async fn connection(&self) -> Result<MultiplexedConnection, QueueError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)
    }

    async fn load(
        conn: &mut MultiplexedConnection,
        job_id: Uuid,
    ) -> Result<Option<JobRecord>, QueueError> {
        let raw: Option<String> = conn.get(Self::job_key(job_id)).await?;
        match raw {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// Remove one claimed payload from this worker's in-flight list.
    async fn release(
        &self,
        conn: &mut MultiplexedConnection,
        payload: &str,
    ) -> Result<(), QueueError> {
        conn.lrem::<_, _, ()>(self.processing_key(), 1, payload)
            .await?;
        Ok(())
    }

    /// Atomically store `record` unless that would move the job backwards.
    async fn write(
        &self,
        conn: &mut MultiplexedConnection,
        record: &JobRecord,
    ) -> Result<(), QueueError> {
        let payload = serde_json::to_string(record)?;
        let ttl = self.result_ttl.map(|ttl| ttl.as_secs()).unwrap_or(0);
        let written: i32 = self
            .transition
            .key(Self::job_key(record.job_id))
            .arg(record.status.to_string())
            .arg(payload)
            .arg(ttl)
            .invoke_async(conn)
            .await?;

        if written == 1 {
            Ok(())
        } else {
            Err(QueueError::InvalidTransition(record.job_id))
        }
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn submit(&self, image_path: &str) -> Result<Uuid, QueueError> {
        let mut conn = self.connection().await?;
        let job = QueuedJob::new(image_path);

        // Record first so a fast worker never claims a job without a record.
        self.write(&mut conn, &JobRecord::pending(&job)).await?;

        let payload = serde_json::to_string(&job)?;
        conn.lpush::<_, _, ()>(Self::queue_key(), &payload).await?;

        Ok(job.job_id)
    }

    async fn record(&self, job_id: Uuid) -> Result<Option<JobRecord>, QueueError> {
        let mut conn = self.connection().await?;
        Self::load(&mut conn, job_id).await
    }

    async fn claim(&self) -> Result<Option<QueuedJob>, QueueError> {
        let mut conn = self.connection().await?;
        loop {
            let payload: Option<String> = conn
                .rpoplpush(Self::queue_key(), self.processing_key())
                .await?;
            let Some(payload) = payload else {
                return Ok(None);
            };

            let job: QueuedJob = match serde_json::from_str(&payload) {
                Ok(job) => job,
                Err(e) => {
                    tracing::error!(error = %e, payload = %payload, "Dropping undecodable job payload");
                    self.release(&mut conn, &payload).await?;
                    continue;
                }
            };

            let record = match Self::load(&mut conn, job.job_id).await {
                Ok(record) => record.unwrap_or_else(|| JobRecord::pending(&job)),
                Err(QueueError::Serialize(e)) => {
                    tracing::error!(job_id = %job.job_id, error = %e, "Dropping job with undecodable record");
                    self.release(&mut conn, &payload).await?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            match self.write(&mut conn, &record.with_status(JobStatus::Processing)).await {
                Ok(()) => return Ok(Some(job)),
                // Finished by an earlier run that stopped before releasing it.
                Err(QueueError::InvalidTransition(_)) => {
                    tracing::info!(job_id = %job.job_id, "Skipping job that is already terminal");
                    self.release(&mut conn, &payload).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn record_retry(&self, job_id: Uuid, retries: u32) -> Result<(), QueueError> {
        let mut conn = self.connection().await?;
        let Some(record) = Self::load(&mut conn, job_id).await? else {
            tracing::warn!(job_id = %job_id, "Retry recorded for a job without a record");
            return Ok(());
        };

        let mut updated = record.with_status(JobStatus::Processing);
        updated.retries = retries;
        self.write(&mut conn, &updated).await
    }

    async fn complete(&self, job: &QueuedJob, result: &JobResult) -> Result<(), QueueError> {
        let mut conn = self.connection().await?;
        let record = Self::load(&mut conn, job.job_id)
            .await?
            .unwrap_or_else(|| JobRecord::pending(job));
        let written = self.write(&mut conn, &record.with_result(result)).await;

        // Release the slot even if the record was already terminal.
        let payload = serde_json::to_string(job)?;
        self.release(&mut conn, &payload).await?;

        written
    }

    async fn recover_in_flight(&self) -> Result<usize, QueueError> {
        let mut conn = self.connection().await?;
        let mut recovered = 0;
        loop {
            // Back onto the consumer end so recovered jobs run next.
            let moved: Option<String> = conn
                .lmove(
                    self.processing_key(),
                    Self::queue_key(),
                    Direction::Right,
                    Direction::Right,
                )
                .await?;
            if moved.is_none() {
                break;
            }
            recovered += 1;
        }
        Ok(recovered)
    }

    async fn queue_depth(&self) -> Result<u64, QueueError> {
        let mut conn = self.connection().await?;
        let depth: u64 = conn.llen(Self::queue_key()).await?;
        Ok(depth)
    }

    async fn health_check(&self) -> Result<(), QueueError> {
        let mut conn = self.connection().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }
}
