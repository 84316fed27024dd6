//! Row types for the four entities in §3. Kept as plain `sqlx::FromRow`
//! structs rather than an ORM with relationship traversal, per §9's
//! re-architecture guidance: "prefer explicit foreign-key columns plus
//! small repository functions... rather than implicit collection
//! traversal."

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct BlockRow {
    pub id: i64,
    pub hash: Vec<u8>,
    pub height: i32,
    pub ntime: DateTime<Utc>,
    pub difficulty: f64,
    pub currency: String,
    pub algo: String,
    pub orphan: bool,
    pub total_in: Decimal,
    pub total_out: Decimal,
}

#[derive(Debug, Clone, FromRow)]
pub struct TransactionRow {
    pub id: i64,
    pub txid: Vec<u8>,
    pub block_id: Option<i64>,
    pub coinbase: bool,
    pub total_in: Decimal,
    pub total_out: Decimal,
    pub network_fee: Option<Decimal>,
}

#[derive(Debug, Clone, FromRow)]
pub struct AddressRow {
    pub id: i64,
    pub hash: Vec<u8>,
    pub version: i16,
    pub currency: String,
    pub first_seen_at: Option<DateTime<Utc>>,
    pub total_in: Decimal,
    pub total_out: Decimal,
}

impl AddressRow {
    pub fn balance(&self) -> Decimal {
        self.total_in - self.total_out
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct OutputRow {
    pub origin_tx_hash: Vec<u8>,
    pub index: i32,
    pub amount: Decimal,
    #[sqlx(rename = "type")]
    pub script_type: i16,
    pub address_hash: Option<Vec<u8>>,
    pub spend_tx_id: Option<i64>,
}
