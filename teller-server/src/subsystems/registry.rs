//! Agent registry — the catalog of support agents and the only code that
//! mutates an agent's `current_sessions` counter.
//!
//! Claiming an agent is a single compare-and-increment UPDATE with a
//! `FOR UPDATE SKIP LOCKED` subselect, so two concurrent session starts can
//! never over-book an agent past `max_concurrent_sessions`. Releases are
//! clamped at zero. When a desk has no catalog entry at all, a default agent
//! is seeded for it instead of failing the request.

use serde_json::json;
use sqlx::{PgConnection, PgPool};
use teller_core::config::ChatConfig;
use teller_core::models::{AccountTier, Agent, AgentRow, Specialization};
use teller_core::{ChatError, ChatResult};
use uuid::Uuid;

const AGENT_COLUMNS: &str = "id, name, specialization, is_available, max_concurrent_sessions, \
     current_sessions, avg_response_seconds, satisfaction_rating, total_sessions, created_at";

/// Atomically claim one free agent of the given specialization, incrementing
/// its load. Seeds a default agent when the desk has no catalog entry, and
/// returns `NoAgentAvailable` when every existing agent is at capacity.
pub async fn claim_agent(
    conn: &mut PgConnection,
    specialization: Specialization,
    chat: &ChatConfig,
) -> ChatResult<Agent> {
    if let Some(agent) = try_claim(&mut *conn, specialization).await? {
        return Ok(agent);
    }

    let existing: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM support_agents WHERE specialization = $1")
            .bind(specialization.as_str())
            .fetch_one(&mut *conn)
            .await?;

    if existing == 0 {
        seed_default_agent(&mut *conn, specialization, chat).await?;
        if let Some(agent) = try_claim(&mut *conn, specialization).await? {
            return Ok(agent);
        }
    }

    Err(ChatError::NoAgentAvailable { specialization })
}

async fn try_claim(
    conn: &mut PgConnection,
    specialization: Specialization,
) -> ChatResult<Option<Agent>> {
    let sql = format!(
        "UPDATE support_agents
            SET current_sessions = current_sessions + 1
          WHERE id = (
              SELECT id FROM support_agents
               WHERE specialization = $1
                 AND is_available
                 AND current_sessions < max_concurrent_sessions
               ORDER BY current_sessions ASC, total_sessions ASC
               LIMIT 1
               FOR UPDATE SKIP LOCKED
          )
          RETURNING {AGENT_COLUMNS}"
    );
    let row: Option<AgentRow> = sqlx::query_as(&sql)
        .bind(specialization.as_str())
        .fetch_optional(conn)
        .await?;
    row.map(Agent::try_from).transpose()
}

/// Least-loaded agent of a desk without touching its load. Used to bind
/// queued (waiting) sessions; the load is only taken when the sweeper
/// promotes the session. Seeds a default agent for an empty desk.
pub async fn pick_least_loaded(
    conn: &mut PgConnection,
    specialization: Specialization,
    chat: &ChatConfig,
) -> ChatResult<Agent> {
    let sql = format!(
        "SELECT {AGENT_COLUMNS} FROM support_agents
          WHERE specialization = $1
          ORDER BY is_available DESC, current_sessions ASC, total_sessions ASC
          LIMIT 1"
    );
    let row: Option<AgentRow> = sqlx::query_as(&sql)
        .bind(specialization.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    match row {
        Some(r) => r.try_into(),
        None => seed_default_agent(conn, specialization, chat).await,
    }
}

/// Conditional increment used when the sweeper attaches a waiting session.
/// Returns false if the agent has no free slot right now.
pub async fn attach_load(conn: &mut PgConnection, agent_id: Uuid) -> ChatResult<bool> {
    let claimed: Option<Uuid> = sqlx::query_scalar(
        "UPDATE support_agents
            SET current_sessions = current_sessions + 1
          WHERE id = $1
            AND is_available
            AND current_sessions < max_concurrent_sessions
          RETURNING id",
    )
    .bind(agent_id)
    .fetch_optional(conn)
    .await?;
    Ok(claimed.is_some())
}

/// Decrement an agent's load, clamped at zero.
pub async fn release_agent(conn: &mut PgConnection, agent_id: Uuid) -> ChatResult<()> {
    sqlx::query(
        "UPDATE support_agents
            SET current_sessions = GREATEST(current_sessions - 1, 0)
          WHERE id = $1",
    )
    .bind(agent_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Fold a session's satisfaction rating into the agent's running average,
/// weighted by lifetime session count, then bump the count.
pub async fn record_outcome(
    conn: &mut PgConnection,
    agent_id: Uuid,
    rating: i32,
) -> ChatResult<()> {
    sqlx::query(
        "UPDATE support_agents
            SET satisfaction_rating =
                    (satisfaction_rating * total_sessions + $2::double precision)
                    / (total_sessions + 1),
                total_sessions = total_sessions + 1
          WHERE id = $1",
    )
    .bind(agent_id)
    .bind(rating)
    .execute(conn)
    .await?;
    Ok(())
}

/// Fold one observed reply latency into the agent's running average
/// response time. Exponentially weighted so recent replies dominate; the
/// first observation seeds the average directly.
pub async fn record_response_latency(
    conn: &mut PgConnection,
    agent_id: Uuid,
    seconds: f64,
) -> ChatResult<()> {
    sqlx::query(
        "UPDATE support_agents
            SET avg_response_seconds = CASE
                    WHEN avg_response_seconds = 0 THEN $2
                    ELSE avg_response_seconds * 0.8 + $2 * 0.2
                END
          WHERE id = $1",
    )
    .bind(agent_id)
    .bind(seconds)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_agent(conn: &mut PgConnection, agent_id: Uuid) -> ChatResult<Agent> {
    let sql = format!("SELECT {AGENT_COLUMNS} FROM support_agents WHERE id = $1");
    let row: Option<AgentRow> = sqlx::query_as(&sql)
        .bind(agent_id)
        .fetch_optional(conn)
        .await?;
    match row {
        Some(r) => r.try_into(),
        None => Err(ChatError::InvalidRecord(format!(
            "session references missing agent {agent_id}"
        ))),
    }
}

async fn seed_default_agent(
    conn: &mut PgConnection,
    specialization: Specialization,
    chat: &ChatConfig,
) -> ChatResult<Agent> {
    let id = Uuid::new_v4();
    let sql = format!(
        "INSERT INTO support_agents
             (id, name, specialization, is_available, max_concurrent_sessions,
              satisfaction_rating)
         VALUES ($1, $2, $3, TRUE, $4, $5)
         RETURNING {AGENT_COLUMNS}"
    );
    let row: AgentRow = sqlx::query_as(&sql)
        .bind(id)
        .bind(specialization.default_agent_name())
        .bind(specialization.as_str())
        .bind(chat.default_agent_capacity)
        .bind(chat.default_agent_rating)
        .fetch_one(conn)
        .await?;
    tracing::info!(
        "Seeded default agent {} for {} desk",
        id,
        specialization.as_str()
    );
    row.try_into()
}

/// Per-agent summary for the `list agents` operation, filtered by the
/// caller's tier. Rows with an unparseable specialization fail the call
/// rather than being silently skipped.
pub async fn list_agents(pool: &PgPool, tier: AccountTier) -> ChatResult<Vec<serde_json::Value>> {
    let sql = format!(
        "SELECT {AGENT_COLUMNS} FROM support_agents ORDER BY specialization, name"
    );
    let rows: Vec<AgentRow> = sqlx::query_as(&sql).fetch_all(pool).await?;

    let mut summaries = Vec::new();
    for row in rows {
        let agent: Agent = row.try_into()?;
        if !tier.sees(agent.specialization) {
            continue;
        }
        summaries.push(json!({
            "id": agent.id,
            "name": agent.name,
            "specialization": agent.specialization.as_str(),
            "current_sessions": agent.current_sessions,
            "max_concurrent_sessions": agent.max_concurrent_sessions,
            "available": agent.has_capacity(),
            "satisfaction_rating": agent.satisfaction_rating,
        }));
    }
    Ok(summaries)
}

pub async fn agent_count(pool: &PgPool) -> ChatResult<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM support_agents")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
