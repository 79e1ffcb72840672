use std::sync::LazyLock;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};

use crate::{
    Batch, BatchOp, CommitOutcome, Result,
    store::{KvStore, ScanPage},
};

/// Applies a batch in one server-side step.
///
/// KEYS[i] is the key of operation i. ARGV[1] is the operation count, then
/// ARGV[2i] / ARGV[2i+1] carry the opcode and value of operation i. Key types
/// and preconditions are checked for every operation before the first write.
/// Returns 0 when applied, or the 1-based index of the first operation whose
/// precondition failed.
const COMMIT_SCRIPT_SRC: &str = r#"
local n = tonumber(ARGV[1])

for i = 1, n do
    local code = ARGV[i * 2]
    local kind = redis.call('TYPE', KEYS[i])['ok']
    if code == 'sadd' or code == 'srem' then
        if kind ~= 'none' and kind ~= 'set' then
            return redis.error_reply('WRONGTYPE ' .. KEYS[i] .. ' does not hold a set')
        end
    elseif kind ~= 'none' and kind ~= 'string' then
        return redis.error_reply('WRONGTYPE ' .. KEYS[i] .. ' does not hold a string')
    end
end

for i = 1, n do
    local code = ARGV[i * 2]
    local exists = redis.call('EXISTS', KEYS[i])
    if code == 'setnx' and exists == 1 then
        return i
    end
    if (code == 'setxx' or code == 'delxx') and exists == 0 then
        return i
    end
end

for i = 1, n do
    local code = ARGV[i * 2]
    local value = ARGV[i * 2 + 1]
    if code == 'setnx' or code == 'setxx' then
        redis.call('SET', KEYS[i], value)
    elseif code == 'delxx' then
        redis.call('DEL', KEYS[i])
    elseif code == 'sadd' then
        redis.call('SADD', KEYS[i], value)
    elseif code == 'srem' then
        redis.call('SREM', KEYS[i], value)
    end
end

return 0
"#;

static COMMIT_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(COMMIT_SCRIPT_SRC));

fn opcode(op: &BatchOp) -> (&'static str, &str) {
    match op {
        BatchOp::SetIfAbsent { value, .. } => ("setnx", value),
        BatchOp::SetIfPresent { value, .. } => ("setxx", value),
        BatchOp::DeleteIfPresent { .. } => ("delxx", ""),
        BatchOp::SetAdd { member, .. } => ("sadd", member),
        BatchOp::SetRemove { member, .. } => ("srem", member),
    }
}

/// Maps the script's return value onto a [`CommitOutcome`].
fn outcome_from_reply(reply: u64) -> CommitOutcome {
    match reply {
        0 => CommitOutcome::Applied,
        index => CommitOutcome::NotApplied {
            op: (index - 1) as usize,
        },
    }
}

/// Redis-backed key-value store.
///
/// Holds a [`ConnectionManager`], which multiplexes one connection across all
/// clones and reconnects on failure. Clone it freely; every clone shares the
/// same connection.
///
/// # Example
///
/// ```no_run
/// use kv_store::RedisKvStore;
///
/// # async fn example() -> kv_store::Result<()> {
/// let store = RedisKvStore::connect("redis://127.0.0.1:6379").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisKvStore {
    conn_manager: ConnectionManager,
}

impl RedisKvStore {
    /// Opens a client for `redis_url` and establishes the managed connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed or the server is unreachable.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let conn_manager = ConnectionManager::new(client).await?;

        tracing::debug!(url = %redis_url, "connected to Redis");
        Ok(Self { conn_manager })
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn_manager.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        // MGET without keys is a syntax error on the server.
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn_manager.clone();
        let values: Vec<Option<String>> =
            redis::cmd("MGET").arg(keys).query_async(&mut conn).await?;
        Ok(values)
    }

    async fn sismember(&self, set: &str, member: &str) -> Result<bool> {
        let mut conn = self.conn_manager.clone();
        let is_member: bool = conn.sismember(set, member).await?;
        Ok(is_member)
    }

    async fn scard(&self, set: &str) -> Result<u64> {
        let mut conn = self.conn_manager.clone();
        let count: u64 = conn.scard(set).await?;
        Ok(count)
    }

    async fn sscan(&self, set: &str, cursor: u64, count: usize) -> Result<ScanPage> {
        let mut conn = self.conn_manager.clone();
        let (cursor, members): (u64, Vec<String>) = redis::cmd("SSCAN")
            .arg(set)
            .arg(cursor)
            .arg("COUNT")
            .arg(count.max(1))
            .query_async(&mut conn)
            .await?;
        Ok(ScanPage { cursor, members })
    }

    #[tracing::instrument(skip(self, batch), fields(ops = batch.len()))]
    async fn commit(&self, batch: Batch) -> Result<CommitOutcome> {
        batch.validate()?;

        let mut invocation = COMMIT_SCRIPT.prepare_invoke();
        invocation.arg(batch.len());
        for op in batch.ops() {
            let (code, value) = opcode(op);
            invocation.key(op.key()).arg(code).arg(value);
        }

        let mut conn = self.conn_manager.clone();
        let reply: u64 = invocation.invoke_async(&mut conn).await?;

        let outcome = outcome_from_reply(reply);
        if let CommitOutcome::NotApplied { op } = outcome {
            let name = batch.ops().get(op).map_or("unknown", BatchOp::name);
            tracing::debug!(op, name, "batch not applied");
        }
        Ok(outcome)
    }
}
