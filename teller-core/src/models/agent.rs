use crate::error::ChatError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The twelve support desks an agent can belong to.
///
/// Stored as snake_case text; parsing rejects anything outside the closed set
/// so an invalid row fails loudly instead of silently defaulting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specialization {
    GeneralBanking,
    Treasury,
    Compliance,
    TechnicalSupport,
    AccountServices,
    LoansCredit,
    Investments,
    International,
    IslamicBanking,
    BusinessBanking,
    SovereignBanking,
    StablecoinOperations,
}

impl Specialization {
    pub const ALL: [Specialization; 12] = [
        Specialization::GeneralBanking,
        Specialization::Treasury,
        Specialization::Compliance,
        Specialization::TechnicalSupport,
        Specialization::AccountServices,
        Specialization::LoansCredit,
        Specialization::Investments,
        Specialization::International,
        Specialization::IslamicBanking,
        Specialization::BusinessBanking,
        Specialization::SovereignBanking,
        Specialization::StablecoinOperations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Specialization::GeneralBanking => "general_banking",
            Specialization::Treasury => "treasury",
            Specialization::Compliance => "compliance",
            Specialization::TechnicalSupport => "technical_support",
            Specialization::AccountServices => "account_services",
            Specialization::LoansCredit => "loans_credit",
            Specialization::Investments => "investments",
            Specialization::International => "international",
            Specialization::IslamicBanking => "islamic_banking",
            Specialization::BusinessBanking => "business_banking",
            Specialization::SovereignBanking => "sovereign_banking",
            Specialization::StablecoinOperations => "stablecoin_operations",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Specialization::GeneralBanking => "General Banking",
            Specialization::Treasury => "Treasury",
            Specialization::Compliance => "Compliance",
            Specialization::TechnicalSupport => "Technical Support",
            Specialization::AccountServices => "Account Services",
            Specialization::LoansCredit => "Loans & Credit",
            Specialization::Investments => "Investments",
            Specialization::International => "International Banking",
            Specialization::IslamicBanking => "Islamic Banking",
            Specialization::BusinessBanking => "Business Banking",
            Specialization::SovereignBanking => "Sovereign Banking",
            Specialization::StablecoinOperations => "Stablecoin Operations",
        }
    }

    /// Name used when the registry seeds a default agent for a desk that has
    /// no catalog entry yet.
    pub fn default_agent_name(&self) -> &'static str {
        match self {
            Specialization::GeneralBanking => "General Banking Desk",
            Specialization::Treasury => "Treasury Desk",
            Specialization::Compliance => "Compliance Desk",
            Specialization::TechnicalSupport => "Technical Support Desk",
            Specialization::AccountServices => "Account Services Desk",
            Specialization::LoansCredit => "Loans & Credit Desk",
            Specialization::Investments => "Investments Desk",
            Specialization::International => "International Desk",
            Specialization::IslamicBanking => "Islamic Banking Desk",
            Specialization::BusinessBanking => "Business Banking Desk",
            Specialization::SovereignBanking => "Sovereign Banking Desk",
            Specialization::StablecoinOperations => "Stablecoin Operations Desk",
        }
    }

    /// Lowest account tier that sees this desk in `list agents`.
    pub fn min_tier(&self) -> AccountTier {
        match self {
            Specialization::GeneralBanking
            | Specialization::TechnicalSupport
            | Specialization::AccountServices
            | Specialization::LoansCredit
            | Specialization::Investments
            | Specialization::International
            | Specialization::IslamicBanking => AccountTier::Retail,
            Specialization::BusinessBanking | Specialization::Compliance => AccountTier::Business,
            Specialization::Treasury
            | Specialization::SovereignBanking
            | Specialization::StablecoinOperations => AccountTier::Institutional,
        }
    }
}

impl fmt::Display for Specialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Specialization {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Specialization::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| ChatError::MalformedRequest(format!("unknown specialization: {s}")))
    }
}

/// Caller tier used only to filter which desks `list agents` shows.
/// Ordering is hierarchical: a higher tier sees everything below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountTier {
    Retail,
    Business,
    Institutional,
}

impl AccountTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountTier::Retail => "retail",
            AccountTier::Business => "business",
            AccountTier::Institutional => "institutional",
        }
    }

    pub fn sees(&self, specialization: Specialization) -> bool {
        specialization.min_tier() <= *self
    }
}

impl FromStr for AccountTier {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "retail" => Ok(AccountTier::Retail),
            "business" => Ok(AccountTier::Business),
            "institutional" => Ok(AccountTier::Institutional),
            other => Err(ChatError::MalformedRequest(format!(
                "unknown account tier: {other}"
            ))),
        }
    }
}

/// Raw `support_agents` row as stored. Enum-typed fields are text in the
/// store; `Agent::try_from` is the only way to get a domain value out.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AgentRow {
    pub id: Uuid,
    pub name: String,
    pub specialization: String,
    pub is_available: bool,
    pub max_concurrent_sessions: i32,
    pub current_sessions: i32,
    pub avg_response_seconds: f64,
    pub satisfaction_rating: f64,
    pub total_sessions: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Agent {
    pub id: Uuid,
    pub name: String,
    pub specialization: Specialization,
    pub is_available: bool,
    pub max_concurrent_sessions: i32,
    pub current_sessions: i32,
    pub avg_response_seconds: f64,
    pub satisfaction_rating: f64,
    pub total_sessions: i64,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    /// An agent at capacity is implicitly unavailable even when flagged on.
    pub fn has_capacity(&self) -> bool {
        self.is_available && self.current_sessions < self.max_concurrent_sessions
    }
}

impl TryFrom<AgentRow> for Agent {
    type Error = ChatError;

    fn try_from(row: AgentRow) -> Result<Self, Self::Error> {
        let specialization = row.specialization.parse().map_err(|_| {
            ChatError::InvalidRecord(format!(
                "agent {} has unknown specialization {:?}",
                row.id, row.specialization
            ))
        })?;
        Ok(Agent {
            id: row.id,
            name: row.name,
            specialization,
            is_available: row.is_available,
            max_concurrent_sessions: row.max_concurrent_sessions,
            current_sessions: row.current_sessions,
            avg_response_seconds: row.avg_response_seconds,
            satisfaction_rating: row.satisfaction_rating,
            total_sessions: row.total_sessions,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specialization_round_trip() {
        for s in Specialization::ALL {
            assert_eq!(s.as_str().parse::<Specialization>().unwrap(), s);
        }
    }

    #[test]
    fn test_specialization_rejects_unknown() {
        assert!("crypto_desk".parse::<Specialization>().is_err());
        assert!("".parse::<Specialization>().is_err());
        // Display strings are not storage strings
        assert!("General Banking".parse::<Specialization>().is_err());
    }

    #[test]
    fn test_tier_visibility_is_hierarchical() {
        assert!(AccountTier::Retail.sees(Specialization::GeneralBanking));
        assert!(!AccountTier::Retail.sees(Specialization::Treasury));
        assert!(!AccountTier::Retail.sees(Specialization::BusinessBanking));
        assert!(AccountTier::Business.sees(Specialization::BusinessBanking));
        assert!(!AccountTier::Business.sees(Specialization::SovereignBanking));
        for s in Specialization::ALL {
            assert!(AccountTier::Institutional.sees(s));
        }
    }

    #[test]
    fn test_agent_row_rejects_bad_specialization() {
        let row = AgentRow {
            id: Uuid::new_v4(),
            name: "Test Desk".into(),
            specialization: "astrology".into(),
            is_available: true,
            max_concurrent_sessions: 10,
            current_sessions: 0,
            avg_response_seconds: 0.0,
            satisfaction_rating: 4.5,
            total_sessions: 0,
            created_at: Utc::now(),
        };
        assert!(matches!(
            Agent::try_from(row),
            Err(ChatError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_has_capacity() {
        let mut agent = Agent {
            id: Uuid::new_v4(),
            name: "Treasury Desk".into(),
            specialization: Specialization::Treasury,
            is_available: true,
            max_concurrent_sessions: 2,
            current_sessions: 1,
            avg_response_seconds: 0.0,
            satisfaction_rating: 4.5,
            total_sessions: 0,
            created_at: Utc::now(),
        };
        assert!(agent.has_capacity());
        agent.current_sessions = 2;
        assert!(!agent.has_capacity());
        agent.current_sessions = 0;
        agent.is_available = false;
        assert!(!agent.has_capacity());
    }
}
