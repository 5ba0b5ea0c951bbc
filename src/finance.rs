// 💵 Finance - cash-flow sums, category views, BRL formatting, CSV report

use crate::entities::{Direction, Transaction};
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;

// ============================================================================
// CATEGORY PRESETS
// ============================================================================

/// Sentinel picked in forms when the user types a category of their own
pub const CUSTOM_CATEGORY: &str = "Outra...";

pub const INFLOW_CATEGORIES: [&str; 4] = ["Consulta", "Sessão Avulsa", "Pacote Mensal", "Pilates"];

pub const OUTFLOW_CATEGORIES: [&str; 5] = [
    "Aluguel",
    "Equipamentos",
    "Material de Consumo",
    "Impostos",
    "Marketing",
];

pub fn preset_categories(direction: Direction) -> &'static [&'static str] {
    match direction {
        Direction::Inflow => &INFLOW_CATEGORIES,
        Direction::Outflow => &OUTFLOW_CATEGORIES,
    }
}

pub fn is_preset_category(direction: Direction, category: &str) -> bool {
    preset_categories(direction).iter().any(|c| *c == category)
}

// ============================================================================
// SUMMARY
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinanceSummary {
    pub income: f64,
    pub expenses: f64,
    /// income - expenses
    pub balance: f64,
    pub inflow_count: usize,
    pub outflow_count: usize,
}

pub fn summarize(transactions: &[Transaction]) -> FinanceSummary {
    let mut summary = FinanceSummary::default();

    for tx in transactions {
        match tx.direction {
            Direction::Inflow => {
                summary.income += tx.amount;
                summary.inflow_count += 1;
            }
            Direction::Outflow => {
                summary.expenses += tx.amount;
                summary.outflow_count += 1;
            }
        }
    }

    summary.balance = summary.income - summary.expenses;
    summary
}

/// Transactions in `category`; `None` or a blank string keeps everything
pub fn filter_by_category<'a>(
    transactions: &'a [Transaction],
    category: Option<&str>,
) -> Vec<&'a Transaction> {
    match category.map(str::trim).filter(|c| !c.is_empty()) {
        Some(category) => transactions.iter().filter(|t| t.category == category).collect(),
        None => transactions.iter().collect(),
    }
}

/// Distinct categories, in the order they first appear
pub fn categories_in_use(transactions: &[Transaction]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for tx in transactions {
        if !seen.iter().any(|c| c == &tx.category) {
            seen.push(tx.category.clone());
        }
    }
    seen
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub direction: Direction,
    pub category: String,
    pub count: usize,
    pub total: f64,
}

/// Totals per (direction, category), largest first
pub fn by_category(transactions: &[Transaction]) -> Vec<CategoryTotal> {
    let mut totals: HashMap<(Direction, String), (usize, f64)> = HashMap::new();

    for tx in transactions {
        let entry = totals
            .entry((tx.direction, tx.category.clone()))
            .or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += tx.amount;
    }

    let mut result: Vec<CategoryTotal> = totals
        .into_iter()
        .map(|((direction, category), (count, total))| CategoryTotal {
            direction,
            category,
            count,
            total,
        })
        .collect();

    result.sort_by(|a, b| {
        b.total
            .partial_cmp(&a.total)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.category.cmp(&b.category))
    });
    result
}

// ============================================================================
// MONEY FORMAT
// ============================================================================

/// `R$ 1.234,56` (dot thousands, comma decimals)
pub fn format_brl(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let units = (cents / 100).to_string();
    let frac = cents % 100;

    let mut grouped = String::new();
    for (i, ch) in units.chars().enumerate() {
        if i > 0 && (units.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}R$ {},{:02}", sign, grouped, frac)
}

/// Parse a user-typed amount.
///
/// With a comma present the text is read in Brazilian notation (`1.234,56`);
/// otherwise the dot is the decimal point (`150.5`). A leading `R$` is
/// ignored. Negative and non-finite values are rejected.
pub fn parse_amount(text: &str) -> Result<f64> {
    let cleaned = text.trim().trim_start_matches("R$").trim();
    if cleaned.is_empty() {
        return Err(anyhow!("amount is empty"));
    }

    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned.to_string()
    };

    let value: f64 = normalized
        .parse()
        .with_context(|| format!("'{}' is not a number", text.trim()))?;

    if !value.is_finite() {
        return Err(anyhow!("'{}' is not a finite amount", text.trim()));
    }
    if value < 0.0 {
        return Err(anyhow!("amount must not be negative"));
    }
    Ok(value)
}

// ============================================================================
// CSV REPORT
// ============================================================================

const CSV_HEADER: [&str; 6] = [
    "Date",
    "Description",
    "Category",
    "Direction",
    "Payment_Method",
    "Amount",
];

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    date: String,
    description: &'a str,
    category: &'a str,
    direction: &'a str,
    method: &'a str,
    amount: String,
}

/// Write the transactions as CSV; returns the number of rows written.
/// The header line is written even for an empty ledger.
pub fn export_csv<W: Write>(transactions: &[Transaction], writer: W) -> Result<usize> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    wtr.write_record(CSV_HEADER)
        .context("Failed to write CSV header")?;

    for tx in transactions {
        wtr.serialize(CsvRow {
            date: tx.date.format("%d/%m/%Y").to_string(),
            description: &tx.description,
            category: &tx.category,
            direction: tx.direction.as_str(),
            method: tx.method.as_str(),
            amount: format!("{:.2}", tx.signed_amount()),
        })
        .context("Failed to write CSV row")?;
    }

    wtr.flush().context("Failed to flush CSV output")?;
    Ok(transactions.len())
}
