//! Command Handler Module
//!
//! Executes tokenized console lines against the document store and the
//! leaderboards and returns a [`Reply`].
//!
//! ## Supported Commands
//!
//! ### Document Commands
//! - `JSON.SET key path json` - Set the value at a path
//! - `JSON.GET key [path]` - Get the value at a path
//! - `JSON.DEL key [path]` - Delete a path (the whole key by default)
//! - `JSON.NUMINCRBY key path number` - Add to a number in place
//! - `JSON.ARRAPPEND key path json [json ...]` - Append to an array
//! - `JSON.ARRINSERT key path index json [json ...]` - Insert into an array
//! - `JSON.ARRPOP key [path [index]]` - Remove an array element (last by default)
//! - `JSON.ARRLEN key [path]` - Array length
//! - `JSON.TYPE key [path]` - Kind of the node at a path
//!
//! ### Key Commands
//! - `EXPIRE key seconds`, `PEXPIRE key milliseconds`, `EXPIREAT key timestamp`
//! - `PERSIST key` - Remove expiry
//! - `TTL key`, `PTTL key` - Remaining TTL (`-2` absent, `-1` persistent)
//! - `DEL key [key ...]`, `EXISTS key [key ...]`, `KEYS pattern`
//! - `DBSIZE`, `FLUSHDB`
//!
//! ### Leaderboard Commands
//! - `ZINCRBY board delta member`, `ZADD board score member [score member ...]`
//! - `ZSCORE board member`, `ZRANK board member`, `ZREVRANK board member`
//! - `ZRANGE board start stop [REV]`, `ZREVRANGE board start stop`
//! - `ZRANGEBYSCORE board min max [REV]`, `ZREM board member [member ...]`, `ZCARD board`
//!
//! ### Transaction Commands
//! - `WATCH key [key ...]`, `UNWATCH`, `MULTI`, `EXEC`, `DISCARD`
//!
//! ### Server Commands
//! - `PING [message]`, `ECHO message`, `INFO`, `COMMAND`
//!
//! ## Transactions
//!
//! Writes to the document store are parsed into an [`Operation`]. Outside
//! `MULTI` the operation runs at once; inside it is queued and the reply is
//! `QUEUED`. `EXEC` commits the queue with every `WATCH`ed version checked
//! and replies with one entry per queued command, or `(nil)` if a watched
//! key changed. Only document writes can be queued; anything else inside
//! `MULTI` is refused and makes the following `EXEC` fail.
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐  MULTI   ┌──────────────┐
//! │  split_line  │───>│  dispatch()  │─────────>│ Transaction  │
//! └──────────────┘    └──────┬───────┘          └──────┬───────┘
//!                            │ execute                 │ EXEC
//!                            ▼                         ▼
//!                     DocumentStore  <──────  DocumentStore::commit
//! ```

use crate::commands::reply::Reply;
use crate::document::{Number, Outcome, Path, Value};
use crate::error::StoreError;
use crate::ranking::{Entry, Leaderboards, Order};
use crate::storage::{DocumentStore, Operation, Transaction};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, trace};

/// Per-client transaction state.
#[derive(Debug, Default)]
struct Session {
    /// Watches and queued operations
    transaction: Option<Transaction>,
    /// Inside MULTI
    queuing: bool,
    /// A command was refused while queuing; EXEC will abort
    dirty: bool,
}

/// Executes console commands for one client session.
pub struct CommandHandler {
    store: Arc<DocumentStore>,
    boards: Arc<Leaderboards>,
    /// Start time for INFO
    start_time: Instant,
    session: Session,
}

impl CommandHandler {
    pub fn new(store: Arc<DocumentStore>, boards: Arc<Leaderboards>) -> Self {
        Self {
            store,
            boards,
            start_time: Instant::now(),
            session: Session::default(),
        }
    }

    /// Whether the session is inside `MULTI`.
    pub fn in_multi(&self) -> bool {
        self.session.queuing
    }

    /// Executes one command. `args[0]` is the command name (any case).
    pub fn execute(&mut self, args: &[String]) -> Reply {
        let Some((name, args)) = args.split_first() else {
            return Reply::error("ERR empty command");
        };
        let cmd = name.to_uppercase();
        trace!(command = %cmd, args = args.len(), "executing command");

        let reply = self.dispatch(&cmd, args);
        if let Reply::Error(message) = &reply {
            debug!(command = %cmd, error = %message, "command failed");
        }
        reply
    }

    fn dispatch(&mut self, cmd: &str, args: &[String]) -> Reply {
        match cmd {
            "MULTI" => return self.cmd_multi(args),
            "EXEC" => return self.cmd_exec(args),
            "DISCARD" => return self.cmd_discard(args),
            "WATCH" => return self.cmd_watch(args),
            "UNWATCH" => return self.cmd_unwatch(args),
            _ => {}
        }

        if let Some(parsed) = parse_operation(cmd, args) {
            return match parsed {
                Ok(operation) => self.run(operation),
                Err(reply) => {
                    self.refuse_while_queuing();
                    reply
                }
            };
        }

        if self.session.queuing {
            self.session.dirty = true;
            return Reply::error(format!("ERR '{}' cannot be queued inside MULTI", cmd));
        }

        match cmd {
            // Document reads
            "JSON.GET" => self.cmd_json_get(args),
            "JSON.ARRLEN" => self.cmd_json_arrlen(args),
            "JSON.TYPE" => self.cmd_json_type(args),

            // Key commands
            "TTL" => self.cmd_ttl(args, false),
            "PTTL" => self.cmd_ttl(args, true),
            "DEL" => self.cmd_del(args),
            "EXISTS" => self.cmd_exists(args),
            "KEYS" => self.cmd_keys(args),
            "DBSIZE" => Reply::integer(self.store.len() as i64),
            "FLUSHDB" | "FLUSHALL" => self.cmd_flushdb(),

            // Leaderboard commands
            "ZINCRBY" => self.cmd_zincrby(args),
            "ZADD" => self.cmd_zadd(args),
            "ZSCORE" => self.cmd_zscore(args),
            "ZRANK" => self.cmd_zrank(args, Order::Ascending, "ZRANK"),
            "ZREVRANK" => self.cmd_zrank(args, Order::Descending, "ZREVRANK"),
            "ZRANGE" => self.cmd_zrange(args, Order::Ascending, "ZRANGE"),
            "ZREVRANGE" => self.cmd_zrange(args, Order::Descending, "ZREVRANGE"),
            "ZRANGEBYSCORE" => self.cmd_zrangebyscore(args),
            "ZREM" => self.cmd_zrem(args),
            "ZCARD" => self.cmd_zcard(args),

            // Server commands
            "PING" => cmd_ping(args),
            "ECHO" => cmd_echo(args),
            "INFO" => self.cmd_info(),
            "COMMAND" => cmd_command(),

            _ => Reply::error(format!("ERR unknown command '{}'", cmd)),
        }
    }

    fn refuse_while_queuing(&mut self) {
        if self.session.queuing {
            self.session.dirty = true;
        }
    }

    /// Queues the operation inside MULTI, otherwise executes it.
    fn run(&mut self, operation: Operation) -> Reply {
        if self.session.queuing {
            self.session
                .transaction
                .get_or_insert_with(Transaction::new)
                .push(operation);
            return Reply::queued();
        }
        match self.store.execute(operation) {
            Ok(outcome) => outcome_reply(outcome),
            Err(err) => Reply::from(err),
        }
    }

    // ========================================================================
    // Transaction Commands
    // ========================================================================

    /// MULTI
    fn cmd_multi(&mut self, args: &[String]) -> Reply {
        if !args.is_empty() {
            return wrong_arity("MULTI");
        }
        if self.session.queuing {
            return Reply::error("ERR MULTI calls can not be nested");
        }
        self.session.queuing = true;
        self.session.dirty = false;
        self.session.transaction.get_or_insert_with(Transaction::new);
        Reply::ok()
    }

    /// EXEC
    fn cmd_exec(&mut self, args: &[String]) -> Reply {
        if !args.is_empty() {
            self.refuse_while_queuing();
            return wrong_arity("EXEC");
        }
        if !self.session.queuing {
            return Reply::error("ERR EXEC without MULTI");
        }

        let session = std::mem::take(&mut self.session);
        if session.dirty {
            return Reply::error("EXECABORT Transaction discarded because of previous errors");
        }

        let txn = session.transaction.unwrap_or_default();
        debug!(operations = txn.len(), "committing transaction");
        match self.store.commit(txn) {
            Ok(outcomes) => Reply::array(outcomes.into_iter().map(outcome_reply).collect()),
            Err(StoreError::Conflict { .. }) => Reply::Null,
            Err(err) => Reply::from(err),
        }
    }

    /// DISCARD
    fn cmd_discard(&mut self, args: &[String]) -> Reply {
        if !args.is_empty() {
            self.refuse_while_queuing();
            return wrong_arity("DISCARD");
        }
        if !self.session.queuing {
            return Reply::error("ERR DISCARD without MULTI");
        }
        self.session = Session::default();
        Reply::ok()
    }

    /// WATCH key [key ...]
    fn cmd_watch(&mut self, args: &[String]) -> Reply {
        if self.session.queuing {
            self.session.dirty = true;
            return Reply::error("ERR WATCH inside MULTI is not allowed");
        }
        if args.is_empty() {
            return wrong_arity("WATCH");
        }
        let txn = self.session.transaction.get_or_insert_with(Transaction::new);
        for key in args {
            txn.watch(&self.store, key);
        }
        Reply::ok()
    }

    /// UNWATCH
    fn cmd_unwatch(&mut self, args: &[String]) -> Reply {
        if !args.is_empty() {
            self.refuse_while_queuing();
            return wrong_arity("UNWATCH");
        }
        if self.session.queuing {
            self.session.dirty = true;
            return Reply::error("ERR UNWATCH inside MULTI is not allowed");
        }
        self.session.transaction = None;
        Reply::ok()
    }

    // ========================================================================
    // Document Reads
    // ========================================================================

    /// JSON.GET key [path]
    fn cmd_json_get(&self, args: &[String]) -> Reply {
        let (key, path) = match key_and_path(args, "JSON.GET") {
            Ok(parsed) => parsed,
            Err(reply) => return reply,
        };
        match self.store.get(key, &path) {
            Ok(value) => Reply::bulk_or_null(value.map(|v| v.to_json())),
            Err(err) => Reply::from(err),
        }
    }

    /// JSON.ARRLEN key [path]
    fn cmd_json_arrlen(&self, args: &[String]) -> Reply {
        let (key, path) = match key_and_path(args, "JSON.ARRLEN") {
            Ok(parsed) => parsed,
            Err(reply) => return reply,
        };
        match self.store.arr_len(key, &path) {
            Ok(Some(len)) => Reply::integer(len as i64),
            Ok(None) => Reply::Null,
            Err(err) => Reply::from(err),
        }
    }

    /// JSON.TYPE key [path]
    fn cmd_json_type(&self, args: &[String]) -> Reply {
        let (key, path) = match key_and_path(args, "JSON.TYPE") {
            Ok(parsed) => parsed,
            Err(reply) => return reply,
        };
        match self.store.type_of(key, &path) {
            Ok(Some(kind)) => Reply::simple(kind),
            Ok(None) => Reply::Null,
            Err(err) => Reply::from(err),
        }
    }

    // ========================================================================
    // Key Commands
    // ========================================================================

    /// TTL key / PTTL key
    fn cmd_ttl(&self, args: &[String], millis: bool) -> Reply {
        if args.len() != 1 {
            return wrong_arity(if millis { "PTTL" } else { "TTL" });
        }
        match self.store.ttl(&args[0]) {
            None => Reply::integer(-2),
            Some(ttl) if millis => Reply::integer(ttl.as_millis()),
            Some(ttl) => Reply::integer(ttl.as_secs()),
        }
    }

    /// DEL key [key ...]
    fn cmd_del(&self, args: &[String]) -> Reply {
        if args.is_empty() {
            return wrong_arity("DEL");
        }
        Reply::integer(self.store.delete_many(args) as i64)
    }

    /// EXISTS key [key ...]
    fn cmd_exists(&self, args: &[String]) -> Reply {
        if args.is_empty() {
            return wrong_arity("EXISTS");
        }
        Reply::integer(self.store.exists_many(args) as i64)
    }

    /// KEYS pattern
    fn cmd_keys(&self, args: &[String]) -> Reply {
        if args.len() != 1 {
            return wrong_arity("KEYS");
        }
        Reply::array(self.store.keys(&args[0]).into_iter().map(Reply::Bulk).collect())
    }

    /// FLUSHDB / FLUSHALL
    fn cmd_flushdb(&self) -> Reply {
        self.store.flush();
        self.boards.clear();
        Reply::ok()
    }

    // ========================================================================
    // Leaderboard Commands
    // ========================================================================

    /// ZINCRBY board delta member
    fn cmd_zincrby(&self, args: &[String]) -> Reply {
        if args.len() != 3 {
            return wrong_arity("ZINCRBY");
        }
        let delta = match score_arg(&args[1]) {
            Ok(delta) => delta,
            Err(reply) => return reply,
        };
        match self.boards.incr_by(&args[0], &args[2], delta) {
            Ok(score) => Reply::bulk(score.to_string()),
            Err(err) => Reply::from(err),
        }
    }

    /// ZADD board score member [score member ...]
    fn cmd_zadd(&self, args: &[String]) -> Reply {
        if args.len() < 3 || args.len() % 2 == 0 {
            return wrong_arity("ZADD");
        }
        let (board, pairs) = (&args[0], &args[1..]);

        // Parse everything first so a bad score adds nothing.
        let mut entries = Vec::with_capacity(pairs.len() / 2);
        for pair in pairs.chunks(2) {
            match score_arg(&pair[0]) {
                Ok(score) => entries.push((score, &pair[1])),
                Err(reply) => return reply,
            }
        }

        let mut added = 0;
        for (score, member) in entries {
            match self.boards.add(board, member, score) {
                Ok(true) => added += 1,
                Ok(false) => {}
                Err(err) => return Reply::from(err),
            }
        }
        Reply::integer(added)
    }

    /// ZSCORE board member
    fn cmd_zscore(&self, args: &[String]) -> Reply {
        if args.len() != 2 {
            return wrong_arity("ZSCORE");
        }
        Reply::bulk_or_null(self.boards.score_of(&args[0], &args[1]).map(|s| s.to_string()))
    }

    /// ZRANK board member / ZREVRANK board member
    fn cmd_zrank(&self, args: &[String], order: Order, name: &str) -> Reply {
        if args.len() != 2 {
            return wrong_arity(name);
        }
        match self.boards.rank_of(&args[0], &args[1], order) {
            Some(rank) => Reply::integer(rank as i64),
            None => Reply::Null,
        }
    }

    /// ZRANGE board start stop [REV] / ZREVRANGE board start stop
    fn cmd_zrange(&self, args: &[String], order: Order, name: &str) -> Reply {
        let order = match (args.len(), order) {
            (3, order) => order,
            (4, Order::Ascending) if args[3].eq_ignore_ascii_case("REV") => Order::Descending,
            (4, Order::Ascending) => return Reply::error("ERR syntax error"),
            _ => return wrong_arity(name),
        };
        let (start, stop) = match (int_arg(&args[1]), int_arg(&args[2])) {
            (Ok(start), Ok(stop)) => (start, stop),
            (Err(reply), _) | (_, Err(reply)) => return reply,
        };
        entries_reply(self.boards.range_by_rank(&args[0], start, stop, order))
    }

    /// ZRANGEBYSCORE board min max [REV]
    fn cmd_zrangebyscore(&self, args: &[String]) -> Reply {
        let order = match args.len() {
            3 => Order::Ascending,
            4 if args[3].eq_ignore_ascii_case("REV") => Order::Descending,
            4 => return Reply::error("ERR syntax error"),
            _ => return wrong_arity("ZRANGEBYSCORE"),
        };
        let (min, max) = match (score_arg(&args[1]), score_arg(&args[2])) {
            (Ok(min), Ok(max)) => (min, max),
            (Err(reply), _) | (_, Err(reply)) => return reply,
        };
        entries_reply(self.boards.range_by_score(&args[0], min, max, order))
    }

    /// ZREM board member [member ...]
    fn cmd_zrem(&self, args: &[String]) -> Reply {
        if args.len() < 2 {
            return wrong_arity("ZREM");
        }
        let removed = args[1..]
            .iter()
            .filter(|member| self.boards.remove(&args[0], member))
            .count();
        Reply::integer(removed as i64)
    }

    /// ZCARD board
    fn cmd_zcard(&self, args: &[String]) -> Reply {
        if args.len() != 1 {
            return wrong_arity("ZCARD");
        }
        Reply::integer(self.boards.len(&args[0]) as i64)
    }

    // ========================================================================
    // Server Commands
    // ========================================================================

    /// INFO
    fn cmd_info(&self) -> Reply {
        let stats = self.store.stats();
        let info = format!(
            "# Server\n\
             patchkv_version:{}\n\
             os:{}\n\
             uptime_in_seconds:{}\n\
             \n\
             # Keyspace\n\
             keys:{}\n\
             leaderboards:{}\n\
             \n\
             # Operations\n\
             reads:{}\n\
             writes:{}\n\
             deletes:{}\n\
             expired_keys:{}\n\
             watch_conflicts:{}\n",
            crate::VERSION,
            std::env::consts::OS,
            self.start_time.elapsed().as_secs(),
            stats.keys,
            self.boards.board_count(),
            stats.reads,
            stats.writes,
            stats.deletes,
            stats.expired,
            stats.conflicts,
        );
        Reply::bulk(info)
    }
}

// ============================================================================
// Document Writes
// ============================================================================

/// Parses a command that can run inside a transaction. `None` if `cmd` is
/// not one of them.
fn parse_operation(cmd: &str, args: &[String]) -> Option<Result<Operation, Reply>> {
    let parsed = match cmd {
        "JSON.SET" => op_json_set(args),
        "JSON.DEL" => op_json_del(args),
        "JSON.NUMINCRBY" => op_json_numincrby(args),
        "JSON.ARRAPPEND" => op_json_arrappend(args),
        "JSON.ARRINSERT" => op_json_arrinsert(args),
        "JSON.ARRPOP" => op_json_arrpop(args),
        "EXPIRE" => op_expire(args, "EXPIRE", Duration::from_secs),
        "PEXPIRE" => op_expire(args, "PEXPIRE", Duration::from_millis),
        "EXPIREAT" => op_expireat(args),
        "PERSIST" => op_persist(args),
        _ => return None,
    };
    Some(parsed)
}

/// JSON.SET key path json
fn op_json_set(args: &[String]) -> Result<Operation, Reply> {
    if args.len() != 3 {
        return Err(wrong_arity("JSON.SET"));
    }
    Ok(Operation::set(&args[0], path_arg(&args[1])?, json_arg(&args[2])?))
}

/// JSON.DEL key [path]
fn op_json_del(args: &[String]) -> Result<Operation, Reply> {
    let (key, path) = key_and_path(args, "JSON.DEL")?;
    Ok(Operation::delete(key, path))
}

/// JSON.NUMINCRBY key path number
fn op_json_numincrby(args: &[String]) -> Result<Operation, Reply> {
    if args.len() != 3 {
        return Err(wrong_arity("JSON.NUMINCRBY"));
    }
    let delta: Number = args[2]
        .parse()
        .map_err(|_| Reply::error("ERR value is not a number"))?;
    Ok(Operation::num_incr_by(&args[0], path_arg(&args[1])?, delta))
}

/// JSON.ARRAPPEND key path json [json ...]
fn op_json_arrappend(args: &[String]) -> Result<Operation, Reply> {
    if args.len() < 3 {
        return Err(wrong_arity("JSON.ARRAPPEND"));
    }
    let values = json_args(&args[2..])?;
    Ok(Operation::arr_append(&args[0], path_arg(&args[1])?, values))
}

/// JSON.ARRINSERT key path index json [json ...]
fn op_json_arrinsert(args: &[String]) -> Result<Operation, Reply> {
    if args.len() < 4 {
        return Err(wrong_arity("JSON.ARRINSERT"));
    }
    let index = int_arg(&args[2])?;
    let values = json_args(&args[3..])?;
    Ok(Operation::arr_insert(&args[0], path_arg(&args[1])?, index, values))
}

/// JSON.ARRPOP key [path [index]]
fn op_json_arrpop(args: &[String]) -> Result<Operation, Reply> {
    if args.is_empty() || args.len() > 3 {
        return Err(wrong_arity("JSON.ARRPOP"));
    }
    let path = match args.get(1) {
        Some(path) => path_arg(path)?,
        None => Path::root(),
    };
    let index = match args.get(2) {
        Some(index) => int_arg(index)?,
        None => -1,
    };
    Ok(Operation::arr_pop(&args[0], path, index))
}

/// EXPIRE key seconds / PEXPIRE key milliseconds
///
/// A non-positive TTL deletes the key.
fn op_expire(args: &[String], name: &str, unit: fn(u64) -> Duration) -> Result<Operation, Reply> {
    if args.len() != 2 {
        return Err(wrong_arity(name));
    }
    let amount = int_arg(&args[1])?;
    expire_or_delete(&args[0], amount, unit, name)
}

/// EXPIREAT key unix-timestamp
fn op_expireat(args: &[String]) -> Result<Operation, Reply> {
    if args.len() != 2 {
        return Err(wrong_arity("EXPIREAT"));
    }
    let timestamp = int_arg(&args[1])?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs() as i64;
    expire_or_delete(
        &args[0],
        timestamp.saturating_sub(now),
        Duration::from_secs,
        "EXPIREAT",
    )
}

fn expire_or_delete(
    key: &str,
    amount: i64,
    unit: fn(u64) -> Duration,
    name: &str,
) -> Result<Operation, Reply> {
    if amount <= 0 {
        return Ok(Operation::delete(key, Path::root()));
    }
    let ttl = unit(amount as u64);
    if Instant::now().checked_add(ttl).is_none() {
        return Err(Reply::error(format!(
            "ERR invalid expire time in '{}' command",
            name.to_lowercase()
        )));
    }
    Ok(Operation::expire(key, ttl))
}

/// PERSIST key
fn op_persist(args: &[String]) -> Result<Operation, Reply> {
    if args.len() != 1 {
        return Err(wrong_arity("PERSIST"));
    }
    Ok(Operation::persist(&args[0]))
}

// ============================================================================
// Server Commands
// ============================================================================

/// PING [message]
fn cmd_ping(args: &[String]) -> Reply {
    match args {
        [] => Reply::pong(),
        [message] => Reply::bulk(message.clone()),
        _ => wrong_arity("PING"),
    }
}

/// ECHO message
fn cmd_echo(args: &[String]) -> Reply {
    match args {
        [message] => Reply::bulk(message.clone()),
        _ => wrong_arity("ECHO"),
    }
}

/// COMMAND
fn cmd_command() -> Reply {
    let commands = [
        "JSON.SET", "JSON.GET", "JSON.DEL", "JSON.NUMINCRBY", "JSON.ARRAPPEND",
        "JSON.ARRINSERT", "JSON.ARRPOP", "JSON.ARRLEN", "JSON.TYPE", "EXPIRE", "PEXPIRE",
        "EXPIREAT", "PERSIST", "TTL", "PTTL", "DEL", "EXISTS", "KEYS", "DBSIZE", "FLUSHDB",
        "FLUSHALL", "ZINCRBY", "ZADD", "ZSCORE", "ZRANK", "ZREVRANK", "ZRANGE", "ZREVRANGE",
        "ZRANGEBYSCORE", "ZREM", "ZCARD", "WATCH", "UNWATCH", "MULTI", "EXEC", "DISCARD",
        "PING", "ECHO", "INFO", "COMMAND", "QUIT",
    ];
    Reply::array(commands.into_iter().map(Reply::bulk).collect())
}

// ============================================================================
// Helper functions
// ============================================================================

fn wrong_arity(cmd: &str) -> Reply {
    Reply::error(format!("ERR wrong number of arguments for '{}' command", cmd))
}

fn outcome_reply(outcome: Outcome) -> Reply {
    match outcome {
        Outcome::Done => Reply::ok(),
        Outcome::Removed(n) => Reply::integer(n as i64),
        Outcome::Number(n) => Reply::bulk(n.to_string()),
        Outcome::Length(n) => Reply::integer(n as i64),
        Outcome::Popped(value) => Reply::bulk(value.to_json()),
        Outcome::Applied(applied) => Reply::integer(applied as i64),
    }
}

/// `[member, score]` pairs.
fn entries_reply(entries: Vec<Entry>) -> Reply {
    Reply::array(
        entries
            .into_iter()
            .map(|entry| {
                Reply::array(vec![
                    Reply::Bulk(entry.member),
                    Reply::bulk(entry.score.to_string()),
                ])
            })
            .collect(),
    )
}

/// `key [path]`, the path defaulting to the root.
fn key_and_path<'a>(args: &'a [String], cmd: &str) -> Result<(&'a str, Path), Reply> {
    match args {
        [key] => Ok((key, Path::root())),
        [key, path] => Ok((key, path_arg(path)?)),
        _ => Err(wrong_arity(cmd)),
    }
}

fn path_arg(text: &str) -> Result<Path, Reply> {
    Path::parse(text).map_err(|err| Reply::from(StoreError::from(err)))
}

fn json_arg(text: &str) -> Result<Value, Reply> {
    Value::from_json(text).map_err(Reply::from)
}

fn json_args(texts: &[String]) -> Result<Vec<Value>, Reply> {
    texts.iter().map(|text| json_arg(text)).collect()
}

fn int_arg(text: &str) -> Result<i64, Reply> {
    text.parse()
        .map_err(|_| Reply::error("ERR value is not an integer or out of range"))
}

/// A score or delta. Accepts `inf`, `+inf` and `-inf`; rejects NaN.
fn score_arg(text: &str) -> Result<f64, Reply> {
    match text.parse::<f64>() {
        Ok(score) if !score.is_nan() => Ok(score),
        _ => Err(Reply::error("ERR value is not a valid float")),
    }
}
