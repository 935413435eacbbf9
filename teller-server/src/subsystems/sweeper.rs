//! Background sweep loop.
//!
//! Two passes per cycle:
//! 1. Promote waiting sessions (oldest first) whose bound agent now has a
//!    free slot, using the same conditional increment the claim path uses.
//! 2. Abandon any non-terminal session with no activity for the configured
//!    idle window, releasing the agent slot (waiting sessions hold none).
//!
//! The external disconnect signal the state machine allows for is not wired
//! in-process; the idle timeout is the only abandonment trigger here.

use serde::Serialize;
use sqlx::PgPool;
use teller_core::config::ChatConfig;
use teller_core::models::{MessageKind, SessionStatus};
use teller_core::routing::ResponseGenerator;
use teller_core::ChatResult;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{messages, registry, sessions};

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SweepReport {
    pub promoted: usize,
    pub abandoned: usize,
}

pub async fn run_sweep_loop(
    pool: PgPool,
    chat: ChatConfig,
    responder: std::sync::Arc<dyn ResponseGenerator>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let interval = tokio::time::Duration::from_secs(chat.sweep_interval_seconds);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    tracing::info!(
        "Sweep loop started (interval: {}s, abandon after: {}min)",
        chat.sweep_interval_seconds,
        chat.abandon_after_minutes
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match run_sweep_cycle(&pool, &chat, responder.as_ref()).await {
                    Ok(report) => {
                        if report.promoted > 0 || report.abandoned > 0 {
                            tracing::info!(
                                "Sweep cycle complete: {} promoted, {} abandoned",
                                report.promoted,
                                report.abandoned
                            );
                        }
                    }
                    Err(e) => tracing::error!("Sweep cycle error: {}", e),
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Sweep loop shutting down");
                break;
            }
        }
    }
}

/// One sweep cycle. Also reachable via the manual `sweep` action on the
/// event surface.
pub async fn run_sweep_cycle(
    pool: &PgPool,
    chat: &ChatConfig,
    responder: &dyn ResponseGenerator,
) -> ChatResult<SweepReport> {
    let mut report = SweepReport::default();

    let waiting: Vec<Uuid> = sqlx::query_scalar(
        "SELECT id FROM chat_sessions WHERE status = 'waiting' ORDER BY started_at ASC",
    )
    .fetch_all(pool)
    .await?;

    for session_id in waiting {
        if promote_waiting(pool, responder, session_id).await? {
            report.promoted += 1;
        }
    }

    let cutoff = chrono::Utc::now() - chrono::Duration::minutes(chat.abandon_after_minutes);
    let stale: Vec<Uuid> = sqlx::query_scalar(
        "SELECT id FROM chat_sessions
          WHERE status IN ('active', 'waiting', 'transferred')
            AND last_activity < $1
          ORDER BY last_activity ASC",
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    for session_id in stale {
        if abandon_stale(pool, session_id, cutoff).await? {
            report.abandoned += 1;
        }
    }

    Ok(report)
}

/// Attach one waiting session to its bound agent if the agent has a free
/// slot. Re-checks status under the row lock; a session that was ended or
/// already promoted since the candidate scan is skipped.
async fn promote_waiting(
    pool: &PgPool,
    responder: &dyn ResponseGenerator,
    session_id: Uuid,
) -> ChatResult<bool> {
    let mut tx = pool.begin().await?;

    let Some(session) = sessions::fetch_for_update(&mut tx, session_id).await? else {
        return Ok(false);
    };
    if session.status != SessionStatus::Waiting {
        return Ok(false);
    }

    if !registry::attach_load(&mut tx, session.agent_id).await? {
        return Ok(false);
    }

    let session = sessions::mark_active(&mut tx, session.id).await?;
    let agent = registry::fetch_agent(&mut tx, session.agent_id).await?;
    messages::append(
        &mut tx,
        session.id,
        MessageKind::Agent,
        None,
        Some(agent.id),
        &responder.welcome(&agent.name, agent.specialization),
        None,
    )
    .await?;

    tx.commit().await?;
    tracing::info!("Waiting session {} promoted to agent {}", session.id, agent.id);
    Ok(true)
}

/// Mark one stale session abandoned. Re-checks idleness under the row lock
/// since a message may have arrived after the candidate scan.
async fn abandon_stale(
    pool: &PgPool,
    session_id: Uuid,
    cutoff: chrono::DateTime<chrono::Utc>,
) -> ChatResult<bool> {
    let mut tx = pool.begin().await?;

    let Some(session) = sessions::fetch_for_update(&mut tx, session_id).await? else {
        return Ok(false);
    };
    if session.status.is_terminal() || session.last_activity >= cutoff {
        return Ok(false);
    }

    let was_waiting = session.status == SessionStatus::Waiting;
    sessions::finalize(&mut tx, session.id, SessionStatus::Abandoned, None, None).await?;
    if !was_waiting {
        registry::release_agent(&mut tx, session.agent_id).await?;
    }

    tx.commit().await?;
    tracing::info!("Idle session {} abandoned", session_id);
    Ok(true)
}
