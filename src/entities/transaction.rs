// 💰 Transaction Entity
// A dated cash-flow entry: money in (entrada) or money out (saida).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// DIRECTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Income
    #[serde(rename = "entrada")]
    Inflow,

    /// Expense
    #[serde(rename = "saida")]
    Outflow,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inflow => "entrada",
            Direction::Outflow => "saida",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "entrada" | "in" | "inflow" | "income" => Some(Direction::Inflow),
            "saida" | "saída" | "out" | "outflow" | "expense" => Some(Direction::Outflow),
            _ => None,
        }
    }

    /// Multiplier applied to the amount when computing a balance
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Inflow => 1.0,
            Direction::Outflow => -1.0,
        }
    }
}

// ============================================================================
// PAYMENT METHOD
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[default]
    #[serde(rename = "PIX")]
    Pix,

    #[serde(rename = "Cartão de Crédito")]
    CreditCard,

    #[serde(rename = "Cartão de Débito")]
    DebitCard,

    #[serde(rename = "Dinheiro")]
    Cash,

    /// Bank slip
    #[serde(rename = "Boleto")]
    Boleto,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 5] = [
        PaymentMethod::Pix,
        PaymentMethod::CreditCard,
        PaymentMethod::DebitCard,
        PaymentMethod::Cash,
        PaymentMethod::Boleto,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Pix => "PIX",
            PaymentMethod::CreditCard => "Cartão de Crédito",
            PaymentMethod::DebitCard => "Cartão de Débito",
            PaymentMethod::Cash => "Dinheiro",
            PaymentMethod::Boleto => "Boleto",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str().eq_ignore_ascii_case(label.trim()))
    }
}

// ============================================================================
// TRANSACTION ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub description: String,
    pub category: String,
    /// Always non-negative; `direction` carries the sign
    pub amount: f64,
    pub date: NaiveDate,
    pub method: PaymentMethod,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub description: String,
    pub category: String,
    pub amount: f64,
    pub date: NaiveDate,
    #[serde(default)]
    pub method: PaymentMethod,
    pub direction: Direction,
}

impl Transaction {
    pub fn new(new: NewTransaction) -> Self {
        Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            description: new.description,
            category: new.category,
            amount: new.amount,
            date: new.date,
            method: new.method,
            direction: new.direction,
        }
    }

    /// Amount with the direction's sign applied
    pub fn signed_amount(&self) -> f64 {
        self.direction.sign() * self.amount
    }

    pub fn is_inflow(&self) -> bool {
        self.direction == Direction::Inflow
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionPatch {
    pub description: Option<String>,
    pub category: Option<String>,
    pub amount: Option<f64>,
    pub date: Option<NaiveDate>,
    pub method: Option<PaymentMethod>,
    pub direction: Option<Direction>,
}

impl TransactionPatch {
    pub fn apply(self, tx: &mut Transaction) {
        if let Some(description) = self.description {
            tx.description = description;
        }
        if let Some(category) = self.category {
            tx.category = category;
        }
        if let Some(amount) = self.amount {
            tx.amount = amount;
        }
        if let Some(date) = self.date {
            tx.date = date;
        }
        if let Some(method) = self.method {
            tx.method = method;
        }
        if let Some(direction) = self.direction {
            tx.direction = direction;
        }
    }
}
