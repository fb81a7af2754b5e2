use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar::BusinessDayAdjuster;
use crate::decimal::{Money, Rate};
use crate::interest::InterestCalculator;
use crate::types::{
    AccountId, InterestModality, InvestmentId, InvestmentState, MovementId, MovementType, Product,
    TransactionId,
};

/// a time deposit contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Investment {
    pub id: InvestmentId,
    pub account_id: AccountId,
    pub product: Product,
    pub principal: Money,
    pub term_days: u32,
    pub interest_modality: InterestModality,
    pub open_date: NaiveDate,
    pub maturity_date: NaiveDate,
    pub auto_renew: bool,
    pub state: InvestmentState,
    /// frozen at opening, never looked up again
    pub annual_rate: Rate,
    /// total interest over the term, fixed at opening
    pub total_interest: Money,
    /// predecessor when opened by auto-renewal
    pub renewed_from: Option<InvestmentId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// terms for a new contract, validated by the lifecycle before use
#[derive(Debug, Clone, PartialEq)]
pub struct OpeningTerms {
    pub account_id: AccountId,
    pub principal: Money,
    pub term_days: u32,
    pub interest_modality: InterestModality,
    pub auto_renew: bool,
    pub open_date: NaiveDate,
    pub annual_rate: Rate,
}

impl Investment {
    /// price and date a new ACTIVE investment
    pub fn open(
        terms: OpeningTerms,
        calculator: &dyn InterestCalculator,
        adjuster: &BusinessDayAdjuster,
        now: DateTime<Utc>,
    ) -> Self {
        let total_interest = calculator.interest(terms.principal, terms.annual_rate, terms.term_days);
        Self {
            id: Uuid::new_v4(),
            account_id: terms.account_id,
            product: Product::TimeDeposit,
            principal: terms.principal,
            term_days: terms.term_days,
            interest_modality: terms.interest_modality,
            open_date: terms.open_date,
            maturity_date: adjuster.adjust_maturity(terms.open_date, terms.term_days),
            auto_renew: terms.auto_renew,
            state: InvestmentState::Active,
            annual_rate: terms.annual_rate,
            total_interest,
            renewed_from: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == InvestmentState::Active
    }

    /// principal plus all interest
    pub fn final_amount(&self) -> Money {
        self.principal + self.total_interest
    }

    /// terms for the contract that replaces this one on auto-renewal
    pub fn renewal_terms(&self, annual_rate: Rate) -> OpeningTerms {
        OpeningTerms {
            account_id: self.account_id.clone(),
            principal: self.principal,
            term_days: self.term_days,
            interest_modality: self.interest_modality,
            auto_renew: self.auto_renew,
            open_date: self.maturity_date,
            annual_rate,
        }
    }
}

/// immutable record linking a settlement action to the ledger transaction behind it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub investment_id: InvestmentId,
    /// absent when nothing had to move (e.g. zero remaining interest on renewal)
    pub transaction_id: Option<TransactionId>,
    pub movement_type: MovementType,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
}

impl Movement {
    pub fn new(
        investment_id: InvestmentId,
        transaction_id: Option<TransactionId>,
        movement_type: MovementType,
        amount: Money,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            investment_id,
            transaction_id,
            movement_type,
            amount,
            created_at,
        }
    }
}
