//! Topic classification, agent routing, and canned reply generation.
//!
//! `classify` is a keyword-membership classifier over a fixed priority list:
//! rules are checked in order and the first match wins. `route` maps the
//! finer-grained topic categories onto the twelve agent specializations.
//! Reply generation sits behind the `ResponseGenerator` trait so a real NLU
//! backend can replace `CannedResponder` without touching any caller.

use crate::models::{Specialization, TopicCategory};

/// Keyword rules in priority order. First matching rule wins.
const CLASSIFIER_RULES: &[(&[&str], TopicCategory)] = &[
    (
        &["account", "balance", "deposit", "withdraw"],
        TopicCategory::AccountServices,
    ),
    (
        &["transfer", "payment", "send", "receive"],
        TopicCategory::Transfers,
    ),
    (
        &["loan", "credit", "mortgage", "borrow"],
        TopicCategory::LoansCredit,
    ),
    (
        &["investment", "portfolio", "stocks", "bonds"],
        TopicCategory::Investments,
    ),
    (&["card", "debit", "atm"], TopicCategory::Cards),
    (
        &["compliance", "regulation", "kyc", "aml"],
        TopicCategory::Compliance,
    ),
    (
        &["treasury", "liquidity", "risk"],
        TopicCategory::Treasury,
    ),
];

/// Classify a free-text question into a topic category.
///
/// Pure function: lower-cased substring membership over the priority list,
/// `general_banking` when nothing matches, `general` for empty input.
pub fn classify(question: &str) -> TopicCategory {
    let q = question.trim().to_lowercase();
    if q.is_empty() {
        return TopicCategory::General;
    }
    for (keywords, topic) in CLASSIFIER_RULES {
        if keywords.iter().any(|k| q.contains(k)) {
            return *topic;
        }
    }
    TopicCategory::GeneralBanking
}

/// Total mapping from topic category to agent specialization.
/// `general_banking` desks are the fallback for everything without its own
/// desk (transfers, cards share the account services desk).
pub fn specialization_for(topic: TopicCategory) -> Specialization {
    match topic {
        TopicCategory::AccountServices | TopicCategory::Transfers | TopicCategory::Cards => {
            Specialization::AccountServices
        }
        TopicCategory::LoansCredit => Specialization::LoansCredit,
        TopicCategory::Investments => Specialization::Investments,
        TopicCategory::Compliance => Specialization::Compliance,
        TopicCategory::Treasury => Specialization::Treasury,
        TopicCategory::GeneralBanking | TopicCategory::General => Specialization::GeneralBanking,
    }
}

/// Resolve an initial question straight to a specialization.
pub fn route(question: &str) -> Specialization {
    specialization_for(classify(question))
}

/// Reply generation seam. `CannedResponder` is the deterministic default;
/// an async NLU service can live behind the same interface as long as the
/// per-session message ordering guarantee holds.
pub trait ResponseGenerator: Send + Sync {
    /// Generate the agent reply to an inbound message.
    fn reply(&self, specialization: Specialization, message: &str) -> String;

    /// Welcome line appended when an agent attaches to a session.
    fn welcome(&self, agent_name: &str, specialization: Specialization) -> String {
        format!(
            "Hello, I'm {} from our {} desk. How can I help you today?",
            agent_name,
            specialization.display_name()
        )
    }

    /// System notice appended when a session is queued instead of attached.
    fn queue_notice(&self, specialization: Specialization) -> String {
        format!(
            "All of our {} specialists are currently assisting other customers. \
             You have been placed in the queue and an agent will join you shortly.",
            specialization.display_name()
        )
    }
}

/// Deterministic per-specialization template replies. Exactly one canned
/// string per desk; the inbound message text does not influence the output.
pub struct CannedResponder;

impl ResponseGenerator for CannedResponder {
    fn reply(&self, specialization: Specialization, _message: &str) -> String {
        let text = match specialization {
            Specialization::GeneralBanking => {
                "Thank you for reaching out. I can help with any everyday banking question \
                 — accounts, branches, fees, or anything else. Could you tell me a bit more?"
            }
            Specialization::Treasury => {
                "Thanks for your treasury enquiry. I can review liquidity positions, cash \
                 management, and risk exposure with you. Let me pull up the relevant figures."
            }
            Specialization::Compliance => {
                "I can assist with compliance matters including KYC, AML, and regulatory \
                 reporting. Please note some requests may require document verification."
            }
            Specialization::TechnicalSupport => {
                "Sorry you're running into trouble. Let's get this fixed — can you describe \
                 what you see on screen, and whether it happens on web or mobile?"
            }
            Specialization::AccountServices => {
                "Happy to help with your account. I can check balances, recent activity, \
                 deposits, and withdrawals. Which account would you like to look at?"
            }
            Specialization::LoansCredit => {
                "I can walk you through our loan and credit options, current rates, and \
                 eligibility. Would you like to start with a quick affordability check?"
            }
            Specialization::Investments => {
                "Glad to help with your investments. I can review your portfolio, discuss \
                 market positions, or explain available products. Where shall we start?"
            }
            Specialization::International => {
                "I handle international banking — cross-border payments, foreign currency \
                 accounts, and correspondent services. What do you need help with?"
            }
            Specialization::IslamicBanking => {
                "Welcome. I can advise on our Shariah-compliant products, including \
                 Murabaha financing and profit-sharing accounts. How can I assist?"
            }
            Specialization::BusinessBanking => {
                "I support our business customers with merchant services, payroll, and \
                 commercial lending. What can I do for your business today?"
            }
            Specialization::SovereignBanking => {
                "Thank you for contacting the sovereign banking desk. I can assist with \
                 institutional mandates and government portfolio services."
            }
            Specialization::StablecoinOperations => {
                "I can help with stablecoin operations — issuance, redemption, and reserve \
                 attestations. Which operation are you asking about?"
            }
        };
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_account_balance() {
        assert_eq!(
            classify("What is my account balance?"),
            TopicCategory::AccountServices
        );
    }

    #[test]
    fn test_classify_loan() {
        assert_eq!(classify("I need a loan"), TopicCategory::LoansCredit);
    }

    #[test]
    fn test_classify_empty_is_general() {
        assert_eq!(classify(""), TopicCategory::General);
        assert_eq!(classify("   "), TopicCategory::General);
    }

    #[test]
    fn test_classify_no_match_is_general_banking() {
        assert_eq!(classify("hello there"), TopicCategory::GeneralBanking);
    }

    #[test]
    fn test_classify_priority_first_match_wins() {
        // "account" (rule 1) beats "transfer" (rule 2) regardless of position
        assert_eq!(
            classify("transfer money out of my account"),
            TopicCategory::AccountServices
        );
        // "payment" hits the transfers rule before "card" is considered
        assert_eq!(
            classify("card payment failed"),
            TopicCategory::Transfers
        );
    }

    #[test]
    fn test_classify_is_case_insensitive() {
        assert_eq!(classify("LIQUIDITY CHECK"), TopicCategory::Treasury);
        assert_eq!(classify("KYC documents"), TopicCategory::Compliance);
    }

    #[test]
    fn test_classify_is_deterministic() {
        for _ in 0..3 {
            assert_eq!(classify("mortgage rates"), TopicCategory::LoansCredit);
        }
    }

    #[test]
    fn test_route_map_is_total() {
        for topic in TopicCategory::ALL {
            // must not panic, and fallback topics land on general banking
            let spec = specialization_for(topic);
            if matches!(topic, TopicCategory::General | TopicCategory::GeneralBanking) {
                assert_eq!(spec, Specialization::GeneralBanking);
            }
        }
    }

    #[test]
    fn test_cards_and_accounts_share_a_desk() {
        assert_eq!(
            specialization_for(TopicCategory::Cards),
            Specialization::AccountServices
        );
        assert_eq!(
            specialization_for(TopicCategory::AccountServices),
            Specialization::AccountServices
        );
    }

    #[test]
    fn test_route_end_to_end() {
        assert_eq!(route("liquidity check"), Specialization::Treasury);
        assert_eq!(route("I need a loan"), Specialization::LoansCredit);
        assert_eq!(route(""), Specialization::GeneralBanking);
    }

    #[test]
    fn test_canned_replies_cover_all_desks() {
        let responder = CannedResponder;
        let mut seen = std::collections::HashSet::new();
        for spec in Specialization::ALL {
            let reply = responder.reply(spec, "anything");
            assert!(!reply.is_empty());
            assert!(seen.insert(reply), "reply for {spec} duplicates another desk");
        }
    }

    #[test]
    fn test_canned_reply_ignores_message_text() {
        let responder = CannedResponder;
        assert_eq!(
            responder.reply(Specialization::Treasury, "what's our cash position"),
            responder.reply(Specialization::Treasury, "something else entirely")
        );
    }

    #[test]
    fn test_welcome_names_agent_and_desk() {
        let responder = CannedResponder;
        let w = responder.welcome("Treasury Desk", Specialization::Treasury);
        assert!(w.contains("Treasury Desk"));
        assert!(w.contains("Treasury"));
    }
}
