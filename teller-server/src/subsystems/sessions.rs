//! Session store — reads and guarded mutations on `chat_sessions` rows.
//!
//! Mutating paths fetch the row with `FOR UPDATE` inside the caller's
//! transaction, so status checks and the subsequent update are atomic with
//! the agent-load adjustments made alongside them.

use sqlx::{PgConnection, PgPool};
use teller_core::models::{CallerIdentity, ChatSession, SessionRow, SessionStatus, TopicCategory};
use teller_core::{ChatError, ChatResult};
use uuid::Uuid;

const SESSION_COLUMNS: &str = "id, owner_user_id, contact_info, agent_id, previous_agent_id, \
     transfer_reason, transfer_count, topic_category, status, message_count, \
     user_satisfaction, feedback, started_at, last_activity, ended_at";

pub async fn fetch(conn: &mut PgConnection, session_id: Uuid) -> ChatResult<Option<ChatSession>> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE id = $1");
    let row: Option<SessionRow> = sqlx::query_as(&sql)
        .bind(session_id)
        .fetch_optional(conn)
        .await?;
    row.map(ChatSession::try_from).transpose()
}

/// Row-locked fetch for mutation paths.
pub async fn fetch_for_update(
    conn: &mut PgConnection,
    session_id: Uuid,
) -> ChatResult<Option<ChatSession>> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE id = $1 FOR UPDATE");
    let row: Option<SessionRow> = sqlx::query_as(&sql)
        .bind(session_id)
        .fetch_optional(conn)
        .await?;
    row.map(ChatSession::try_from).transpose()
}

/// Ownership check. An authenticated caller must own the session; an
/// anonymous caller may only touch ownerless sessions. The error never
/// distinguishes "wrong owner" from "no such session".
pub fn check_access(session: &ChatSession, caller: &CallerIdentity) -> ChatResult<()> {
    let allowed = match caller {
        CallerIdentity::User(user_id) => session.owner_user_id == Some(*user_id),
        CallerIdentity::Anonymous => session.owner_user_id.is_none(),
    };
    if allowed {
        Ok(())
    } else {
        Err(ChatError::InvalidSession)
    }
}

/// Terminal-state gate, checked after ownership so the rightful owner of an
/// ended session sees `InactiveSession` rather than an access denial.
pub fn check_active(session: &ChatSession) -> ChatResult<()> {
    if session.status.is_terminal() {
        Err(ChatError::InactiveSession)
    } else {
        Ok(())
    }
}

/// True only when the session exists, is owned by `user_id`, and is not in a
/// terminal state.
pub async fn validate_access(pool: &PgPool, session_id: Uuid, user_id: Uuid) -> ChatResult<bool> {
    let mut conn = pool.acquire().await?;
    let Some(session) = fetch(&mut conn, session_id).await? else {
        return Ok(false);
    };
    Ok(session.owner_user_id == Some(user_id) && !session.status.is_terminal())
}

/// True only when the session exists, has no owner, and is still active.
pub async fn validate_public_access(pool: &PgPool, session_id: Uuid) -> ChatResult<bool> {
    let mut conn = pool.acquire().await?;
    let Some(session) = fetch(&mut conn, session_id).await? else {
        return Ok(false);
    };
    Ok(session.owner_user_id.is_none() && session.status == SessionStatus::Active)
}

/// Insert a new session bound to the given agent. Caller supplies the state
/// (`active` for an attached agent, `waiting` for a queued one) and has
/// already validated the owner/contact mutual exclusion.
#[allow(clippy::too_many_arguments)]
pub async fn insert(
    conn: &mut PgConnection,
    owner_user_id: Option<Uuid>,
    contact_info: Option<serde_json::Value>,
    agent_id: Uuid,
    topic_category: TopicCategory,
    status: SessionStatus,
) -> ChatResult<ChatSession> {
    let id = Uuid::new_v4();
    let sql = format!(
        "INSERT INTO chat_sessions
             (id, owner_user_id, contact_info, agent_id, topic_category, status)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {SESSION_COLUMNS}"
    );
    let row: SessionRow = sqlx::query_as(&sql)
        .bind(id)
        .bind(owner_user_id)
        .bind(contact_info)
        .bind(agent_id)
        .bind(topic_category.as_str())
        .bind(status.as_str())
        .fetch_one(conn)
        .await?;
    row.try_into()
}

/// Rebind the session to a new agent, demoting the old binding to
/// `previous_agent_id`. State becomes `transferred`, which behaves like
/// `active` for further messaging.
pub async fn apply_transfer(
    conn: &mut PgConnection,
    session_id: Uuid,
    new_agent_id: Uuid,
    reason: &str,
) -> ChatResult<ChatSession> {
    let sql = format!(
        "UPDATE chat_sessions
            SET previous_agent_id = agent_id,
                agent_id = $2,
                transfer_reason = $3,
                transfer_count = transfer_count + 1,
                status = 'transferred',
                last_activity = now()
          WHERE id = $1
          RETURNING {SESSION_COLUMNS}"
    );
    let row: SessionRow = sqlx::query_as(&sql)
        .bind(session_id)
        .bind(new_agent_id)
        .bind(reason)
        .fetch_one(conn)
        .await?;
    row.try_into()
}

/// Move the session into a terminal state, setting `ended_at` exactly once.
pub async fn finalize(
    conn: &mut PgConnection,
    session_id: Uuid,
    status: SessionStatus,
    rating: Option<i32>,
    feedback: Option<&str>,
) -> ChatResult<ChatSession> {
    debug_assert!(status.is_terminal());
    let sql = format!(
        "UPDATE chat_sessions
            SET status = $2,
                user_satisfaction = $3,
                feedback = $4,
                ended_at = now()
          WHERE id = $1
          RETURNING {SESSION_COLUMNS}"
    );
    let row: SessionRow = sqlx::query_as(&sql)
        .bind(session_id)
        .bind(status.as_str())
        .bind(rating)
        .bind(feedback)
        .fetch_one(conn)
        .await?;
    row.try_into()
}

/// Promote a waiting session whose agent just accepted it.
pub async fn mark_active(conn: &mut PgConnection, session_id: Uuid) -> ChatResult<ChatSession> {
    let sql = format!(
        "UPDATE chat_sessions
            SET status = 'active',
                last_activity = now()
          WHERE id = $1
          RETURNING {SESSION_COLUMNS}"
    );
    let row: SessionRow = sqlx::query_as(&sql)
        .bind(session_id)
        .fetch_one(conn)
        .await?;
    row.try_into()
}

pub async fn active_session_count(pool: &PgPool) -> ChatResult<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM chat_sessions WHERE status IN ('active', 'transferred')",
    )
    .fetch_one(pool)
    .await?;
    Ok(count)
}
