use crate::subsystems::{lifecycle, registry, sessions, sweeper};
use sqlx::PgPool;
use teller_core::ipc::{ChatRequest, ChatResponse};
use teller_core::models::{AccountTier, CallerIdentity, Specialization};
use teller_core::{ChatError, TellerConfig};

/// Dispatch one event-surface request. Both transports converge here: the
/// HTTP handlers build the same `ChatRequest` values, so every operation has
/// identical semantics on both surfaces.
pub async fn handle_request(
    request: ChatRequest,
    pool: &PgPool,
    config: &TellerConfig,
    responder: &dyn teller_core::ResponseGenerator,
) -> ChatResponse {
    match request {
        ChatRequest::Ping => ChatResponse::pong(),

        ChatRequest::Health => {
            let pg_ver = match teller_core::db::health_check(pool).await {
                Ok(v) => v,
                Err(e) => return ChatResponse::domain_err(&ChatError::Database(e)),
            };
            let agents = match registry::agent_count(pool).await {
                Ok(n) => n,
                Err(e) => return ChatResponse::domain_err(&e),
            };
            let active = match sessions::active_session_count(pool).await {
                Ok(n) => n,
                Err(e) => return ChatResponse::domain_err(&e),
            };
            ChatResponse::ok(serde_json::json!({
                "status": "healthy",
                "postgresql": pg_ver,
                "agents": agents,
                "active_sessions": active,
            }))
        }

        ChatRequest::StartSession {
            user_id,
            contact,
            specialization,
            question,
            queue,
        } => {
            let specialization = match parse_opt_specialization(specialization) {
                Ok(s) => s,
                Err(e) => return ChatResponse::domain_err(&e),
            };
            let params = lifecycle::StartParams {
                user_id,
                contact,
                specialization,
                question,
                queue,
            };
            match lifecycle::start_session(pool, &config.chat, responder, params).await {
                // "state" rather than "status": the HTTP surface stamps its
                // own "status": "ok" onto success bodies.
                Ok(outcome) => ChatResponse::ok(serde_json::json!({
                    "session_id": outcome.session.id,
                    "state": outcome.session.status,
                    "topic_category": outcome.session.topic_category,
                    "specialization": outcome.specialization,
                    "agent": outcome.agent_name,
                    "messages": outcome.messages,
                })),
                Err(e) => ChatResponse::domain_err(&e),
            }
        }

        ChatRequest::SendMessage {
            session_id,
            user_id,
            text,
        } => {
            let caller = CallerIdentity::from_user_id(user_id);
            match lifecycle::send_message(pool, responder, session_id, caller, &text).await {
                Ok(outcome) => ChatResponse::ok(serde_json::json!({
                    "message_id": outcome.user_message.id,
                    "message_count": outcome.session.message_count,
                    "reply": {
                        "id": outcome.reply.id,
                        "text": outcome.reply.body,
                        "agent": outcome.agent_name,
                    },
                })),
                Err(e) => ChatResponse::domain_err(&e),
            }
        }

        ChatRequest::Transfer {
            session_id,
            user_id,
            specialization,
            reason,
        } => {
            let specialization: Specialization = match specialization.parse() {
                Ok(s) => s,
                Err(e) => return ChatResponse::domain_err(&e),
            };
            let caller = CallerIdentity::from_user_id(user_id);
            match lifecycle::transfer(
                pool,
                &config.chat,
                session_id,
                caller,
                specialization,
                &reason,
            )
            .await
            {
                Ok(session) => ChatResponse::ok(serde_json::json!({
                    "success": true,
                    "session_id": session.id,
                    "state": session.status,
                    "transfer_count": session.transfer_count,
                })),
                Err(e) => ChatResponse::domain_err(&e),
            }
        }

        ChatRequest::EndSession {
            session_id,
            user_id,
            rating,
            feedback,
        } => {
            let caller = CallerIdentity::from_user_id(user_id);
            match lifecycle::end_session(pool, session_id, caller, rating, feedback.as_deref())
                .await
            {
                Ok(session) => ChatResponse::ok(serde_json::json!({
                    "success": true,
                    "session_id": session.id,
                    "state": session.status,
                    "ended_at": session.ended_at,
                })),
                Err(e) => ChatResponse::domain_err(&e),
            }
        }

        ChatRequest::History {
            session_id,
            user_id,
        } => {
            let caller = CallerIdentity::from_user_id(user_id);
            match lifecycle::history(pool, session_id, caller).await {
                Ok(messages) => ChatResponse::ok(serde_json::json!({
                    "session_id": session_id,
                    "count": messages.len(),
                    "messages": messages,
                })),
                Err(e) => ChatResponse::domain_err(&e),
            }
        }

        ChatRequest::ListAgents { tier } => {
            let tier = match tier {
                Some(t) => match t.parse::<AccountTier>() {
                    Ok(t) => t,
                    Err(e) => return ChatResponse::domain_err(&e),
                },
                None => AccountTier::Retail,
            };
            match registry::list_agents(pool, tier).await {
                Ok(agents) => ChatResponse::ok(serde_json::json!({
                    "count": agents.len(),
                    "agents": agents,
                })),
                Err(e) => ChatResponse::domain_err(&e),
            }
        }

        ChatRequest::Sweep => {
            match sweeper::run_sweep_cycle(pool, &config.chat, responder).await {
                Ok(report) => ChatResponse::ok(serde_json::json!({
                    "promoted": report.promoted,
                    "abandoned": report.abandoned,
                })),
                Err(e) => ChatResponse::domain_err(&e),
            }
        }
    }
}

fn parse_opt_specialization(
    raw: Option<String>,
) -> Result<Option<Specialization>, ChatError> {
    raw.map(|s| s.parse()).transpose()
}
