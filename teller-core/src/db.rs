use crate::config::DatabaseConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
}

pub async fn health_check(pool: &PgPool) -> Result<String, sqlx::Error> {
    let row: (String,) = sqlx::query_as("SELECT version()").fetch_one(pool).await?;
    Ok(row.0)
}

/// Idempotent schema setup, run at server startup and by integration tests.
///
/// CHECK constraints carry the hard invariants: agent load stays within
/// `[0, max_concurrent_sessions]`, status/kind values stay within the closed
/// enums, ratings stay in 1..=5, and a session has an owner or a contact
/// blob, never both. `seq` on messages is the insertion-order tiebreak for
/// equal `sent_at` timestamps.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS support_agents (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL,
            specialization TEXT NOT NULL,
            is_available BOOLEAN NOT NULL DEFAULT TRUE,
            max_concurrent_sessions INT NOT NULL DEFAULT 10
                CHECK (max_concurrent_sessions >= 1),
            current_sessions INT NOT NULL DEFAULT 0,
            avg_response_seconds DOUBLE PRECISION NOT NULL DEFAULT 0,
            satisfaction_rating DOUBLE PRECISION NOT NULL DEFAULT 4.5
                CHECK (satisfaction_rating >= 0 AND satisfaction_rating <= 5),
            total_sessions BIGINT NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            CHECK (current_sessions >= 0 AND current_sessions <= max_concurrent_sessions)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_support_agents_specialization
         ON support_agents (specialization)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chat_sessions (
            id UUID PRIMARY KEY,
            owner_user_id UUID,
            contact_info JSONB,
            agent_id UUID NOT NULL REFERENCES support_agents(id),
            previous_agent_id UUID REFERENCES support_agents(id),
            transfer_reason TEXT,
            transfer_count INT NOT NULL DEFAULT 0,
            topic_category TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active'
                CHECK (status IN ('active', 'waiting', 'transferred', 'ended', 'abandoned')),
            message_count INT NOT NULL DEFAULT 0,
            user_satisfaction INT CHECK (user_satisfaction BETWEEN 1 AND 5),
            feedback TEXT,
            started_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            last_activity TIMESTAMPTZ NOT NULL DEFAULT now(),
            ended_at TIMESTAMPTZ,
            CHECK (owner_user_id IS NULL OR contact_info IS NULL)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chat_sessions_status
         ON chat_sessions (status)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chat_messages (
            id UUID PRIMARY KEY,
            session_id UUID NOT NULL REFERENCES chat_sessions(id),
            seq BIGINT GENERATED ALWAYS AS IDENTITY,
            kind TEXT NOT NULL
                CHECK (kind IN ('user', 'agent', 'system', 'transfer')),
            sender_user_id UUID,
            sender_agent_id UUID,
            body TEXT NOT NULL,
            edit_count INT NOT NULL DEFAULT 0,
            response_latency_ms BIGINT,
            confidence DOUBLE PRECISION
                CHECK (confidence >= 0 AND confidence <= 1),
            follow_up_required BOOLEAN,
            sent_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chat_messages_session_sent
         ON chat_messages (session_id, sent_at, seq)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
