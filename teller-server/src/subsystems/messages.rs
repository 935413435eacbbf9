//! Message log — append-only per-session record of user, agent, system, and
//! transfer messages.
//!
//! `append` inserts the message and bumps the parent session's
//! `message_count` and `last_activity` in the same connection, inside the
//! caller's transaction. There is no path that writes a message without
//! updating the session, which keeps `message_count` authoritative.

use sqlx::{PgConnection, PgPool};
use teller_core::models::{ChatMessage, MessageKind, MessageRow, ReplyMeta};
use teller_core::ChatResult;
use uuid::Uuid;

const MESSAGE_COLUMNS: &str = "id, session_id, seq, kind, sender_user_id, sender_agent_id, \
     body, edit_count, response_latency_ms, confidence, follow_up_required, sent_at";

/// Append a message to a session the caller has already verified is
/// non-terminal and row-locked.
pub async fn append(
    conn: &mut PgConnection,
    session_id: Uuid,
    kind: MessageKind,
    sender_user_id: Option<Uuid>,
    sender_agent_id: Option<Uuid>,
    body: &str,
    meta: Option<ReplyMeta>,
) -> ChatResult<ChatMessage> {
    let id = Uuid::new_v4();
    let sql = format!(
        "INSERT INTO chat_messages
             (id, session_id, kind, sender_user_id, sender_agent_id, body,
              response_latency_ms, confidence, follow_up_required)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         RETURNING {MESSAGE_COLUMNS}"
    );
    let row: MessageRow = sqlx::query_as(&sql)
        .bind(id)
        .bind(session_id)
        .bind(kind.as_str())
        .bind(sender_user_id)
        .bind(sender_agent_id)
        .bind(body)
        .bind(meta.map(|m| m.response_latency_ms))
        .bind(meta.map(|m| m.confidence))
        .bind(meta.map(|m| m.follow_up_required))
        .fetch_one(&mut *conn)
        .await?;

    sqlx::query(
        "UPDATE chat_sessions
            SET message_count = message_count + 1,
                last_activity = now()
          WHERE id = $1",
    )
    .bind(session_id)
    .execute(conn)
    .await?;

    row.try_into()
}

/// All messages of a session in chronological order. `seq` breaks ties
/// between equal timestamps, so re-reading yields the same sequence until a
/// new message is appended.
pub async fn read_history(pool: &PgPool, session_id: Uuid) -> ChatResult<Vec<ChatMessage>> {
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS} FROM chat_messages
          WHERE session_id = $1
          ORDER BY sent_at ASC, seq ASC"
    );
    let rows: Vec<MessageRow> = sqlx::query_as(&sql)
        .bind(session_id)
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(ChatMessage::try_from).collect()
}
