//! Session lifecycle API — the public operations (start, send, transfer,
//! end, history) composing the registry, session store, message log, and
//! router into request/response contracts.
//!
//! Every operation runs in one transaction. An agent-load increment can
//! never outlive a failed session insert: the claim and the insert commit or
//! roll back together.

use std::time::Instant;

use sqlx::PgPool;
use teller_core::config::ChatConfig;
use teller_core::models::{
    CallerIdentity, ChatMessage, ChatSession, MessageKind, ReplyMeta, SessionStatus,
    Specialization,
};
use teller_core::routing::{self, ResponseGenerator};
use teller_core::{ChatError, ChatResult};
use uuid::Uuid;

use super::{messages, registry, sessions};

/// Confidence reported on canned replies. Informational only.
const CANNED_REPLY_CONFIDENCE: f64 = 0.75;

#[derive(Debug, Clone)]
pub struct StartParams {
    pub user_id: Option<Uuid>,
    pub contact: Option<serde_json::Value>,
    pub specialization: Option<Specialization>,
    pub question: String,
    pub queue: bool,
}

#[derive(Debug)]
pub struct StartOutcome {
    pub session: ChatSession,
    pub specialization: Specialization,
    pub agent_name: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug)]
pub struct SendOutcome {
    pub session: ChatSession,
    pub user_message: ChatMessage,
    pub reply: ChatMessage,
    pub agent_name: String,
}

/// Open a session: resolve the desk (explicit hint or routed from the
/// question), claim an agent, create the session, and append the agent's
/// welcome. With `queue` set, a fully-booked desk yields a `waiting` session
/// bound to the least-loaded agent instead of `NoAgentAvailable`.
pub async fn start_session(
    pool: &PgPool,
    chat: &ChatConfig,
    responder: &dyn ResponseGenerator,
    params: StartParams,
) -> ChatResult<StartOutcome> {
    if params.question.trim().is_empty() {
        return Err(ChatError::MalformedRequest(
            "question is required".to_string(),
        ));
    }
    match (&params.user_id, &params.contact) {
        (Some(_), Some(_)) => {
            return Err(ChatError::MalformedRequest(
                "provide either user_id or contact, not both".to_string(),
            ));
        }
        (None, None) => {
            return Err(ChatError::MalformedRequest(
                "one of user_id or contact is required".to_string(),
            ));
        }
        _ => {}
    }

    let specialization = params
        .specialization
        .unwrap_or_else(|| routing::route(&params.question));
    let topic = routing::classify(&params.question);

    let mut tx = pool.begin().await?;

    let (agent, status) = match registry::claim_agent(&mut tx, specialization, chat).await {
        Ok(agent) => (agent, SessionStatus::Active),
        Err(ChatError::NoAgentAvailable { .. }) if params.queue => {
            let agent = registry::pick_least_loaded(&mut tx, specialization, chat).await?;
            (agent, SessionStatus::Waiting)
        }
        Err(e) => return Err(e),
    };

    let session = sessions::insert(
        &mut tx,
        params.user_id,
        params.contact,
        agent.id,
        topic,
        status,
    )
    .await?;

    let opening = match status {
        SessionStatus::Waiting => {
            messages::append(
                &mut tx,
                session.id,
                MessageKind::System,
                None,
                None,
                &responder.queue_notice(specialization),
                None,
            )
            .await?
        }
        _ => {
            messages::append(
                &mut tx,
                session.id,
                MessageKind::Agent,
                None,
                Some(agent.id),
                &responder.welcome(&agent.name, specialization),
                None,
            )
            .await?
        }
    };

    let session = sessions::fetch(&mut tx, session.id)
        .await?
        .ok_or(ChatError::InvalidSession)?;

    tx.commit().await?;

    tracing::info!(
        "Session {} opened ({}) on {} desk, agent {}",
        session.id,
        status,
        specialization.as_str(),
        agent.id
    );

    Ok(StartOutcome {
        session,
        specialization,
        agent_name: agent.name,
        messages: vec![opening],
    })
}

/// Append the caller's message and the generated agent reply in one
/// transaction. The reply is synchronous by design; an async agent backend
/// may replace it behind `ResponseGenerator` without changing this contract.
pub async fn send_message(
    pool: &PgPool,
    responder: &dyn ResponseGenerator,
    session_id: Uuid,
    caller: CallerIdentity,
    text: &str,
) -> ChatResult<SendOutcome> {
    if text.trim().is_empty() {
        return Err(ChatError::MalformedRequest(
            "message text is required".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let session = sessions::fetch_for_update(&mut tx, session_id)
        .await?
        .ok_or(ChatError::InvalidSession)?;
    sessions::check_access(&session, &caller)?;
    sessions::check_active(&session)?;

    let agent = registry::fetch_agent(&mut tx, session.agent_id).await?;

    let user_message = messages::append(
        &mut tx,
        session.id,
        MessageKind::User,
        caller.user_id(),
        None,
        text,
        None,
    )
    .await?;

    let started = Instant::now();
    let reply_body = responder.reply(agent.specialization, text);
    let meta = ReplyMeta {
        response_latency_ms: started.elapsed().as_millis() as i64,
        confidence: CANNED_REPLY_CONFIDENCE,
        follow_up_required: false,
    };
    let reply = messages::append(
        &mut tx,
        session.id,
        MessageKind::Agent,
        None,
        Some(agent.id),
        &reply_body,
        Some(meta),
    )
    .await?;

    registry::record_response_latency(
        &mut tx,
        agent.id,
        meta.response_latency_ms as f64 / 1000.0,
    )
    .await?;

    let session = sessions::fetch(&mut tx, session.id)
        .await?
        .ok_or(ChatError::InvalidSession)?;

    tx.commit().await?;

    Ok(SendOutcome {
        session,
        user_message,
        reply,
        agent_name: agent.name,
    })
}

/// Move the session to an agent of a new desk. Legal from any non-terminal
/// state; a waiting session has taken no load on its old agent, so none is
/// released for it.
pub async fn transfer(
    pool: &PgPool,
    chat: &ChatConfig,
    session_id: Uuid,
    caller: CallerIdentity,
    new_specialization: Specialization,
    reason: &str,
) -> ChatResult<ChatSession> {
    if reason.trim().is_empty() {
        return Err(ChatError::MalformedRequest(
            "transfer reason is required".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let session = sessions::fetch_for_update(&mut tx, session_id)
        .await?
        .ok_or(ChatError::InvalidSession)?;
    sessions::check_access(&session, &caller)?;
    sessions::check_active(&session)?;

    let was_waiting = session.status == SessionStatus::Waiting;
    let old_agent_id = session.agent_id;

    let new_agent = registry::claim_agent(&mut tx, new_specialization, chat).await?;

    let updated = sessions::apply_transfer(&mut tx, session.id, new_agent.id, reason).await?;

    if !was_waiting {
        registry::release_agent(&mut tx, old_agent_id).await?;
    }

    messages::append(
        &mut tx,
        session.id,
        MessageKind::Transfer,
        None,
        Some(new_agent.id),
        &format!("Session transferred to {}: {}", new_agent.name, reason),
        None,
    )
    .await?;

    let updated = sessions::fetch(&mut tx, updated.id)
        .await?
        .ok_or(ChatError::InvalidSession)?;

    tx.commit().await?;

    tracing::info!(
        "Session {} transferred to {} desk (agent {}), reason: {}",
        session.id,
        new_specialization.as_str(),
        new_agent.id,
        reason
    );

    Ok(updated)
}

/// End a session, releasing the agent's slot and folding an optional rating
/// into the agent's stats. A session that never left the queue holds no slot
/// and was never served, so its agent releases nothing and takes no rating;
/// the rating is still recorded on the session itself.
pub async fn end_session(
    pool: &PgPool,
    session_id: Uuid,
    caller: CallerIdentity,
    rating: Option<i32>,
    feedback: Option<&str>,
) -> ChatResult<ChatSession> {
    if let Some(r) = rating {
        if !(1..=5).contains(&r) {
            return Err(ChatError::MalformedRequest(format!(
                "rating must be between 1 and 5, got {r}"
            )));
        }
    }

    let mut tx = pool.begin().await?;

    let session = sessions::fetch_for_update(&mut tx, session_id)
        .await?
        .ok_or(ChatError::InvalidSession)?;
    sessions::check_access(&session, &caller)?;
    sessions::check_active(&session)?;

    let was_waiting = session.status == SessionStatus::Waiting;

    let ended =
        sessions::finalize(&mut tx, session.id, SessionStatus::Ended, rating, feedback).await?;

    if !was_waiting {
        registry::release_agent(&mut tx, session.agent_id).await?;
        if let Some(r) = rating {
            registry::record_outcome(&mut tx, session.agent_id, r).await?;
        }
    }

    tx.commit().await?;

    tracing::info!(
        "Session {} ended (rating: {:?}, messages: {})",
        ended.id,
        rating,
        ended.message_count
    );

    Ok(ended)
}

/// Chronological message history, authorized like any other mutation:
/// ownership first, then the terminal-state gate.
pub async fn history(
    pool: &PgPool,
    session_id: Uuid,
    caller: CallerIdentity,
) -> ChatResult<Vec<ChatMessage>> {
    let mut conn = pool.acquire().await?;
    let session = sessions::fetch(&mut conn, session_id)
        .await?
        .ok_or(ChatError::InvalidSession)?;
    drop(conn);
    sessions::check_access(&session, &caller)?;
    sessions::check_active(&session)?;
    messages::read_history(pool, session_id).await
}
