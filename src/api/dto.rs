//! JSON shapes returned by the read-side (§6, §12). Kept separate from the
//! `store::models` row types so the wire format (hex strings, not raw
//! bytes) doesn't leak into the persistence layer.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::store::models::{AddressRow, BlockRow, OutputRow, TransactionRow};

#[derive(Debug, Serialize)]
pub struct BlockDto {
    pub hash: String,
    pub height: i32,
    pub ntime: i64,
    pub difficulty: f64,
    pub currency: String,
    pub algo: String,
    pub total_in: Decimal,
    pub total_out: Decimal,
}

impl From<BlockRow> for BlockDto {
    fn from(row: BlockRow) -> Self {
        BlockDto {
            hash: hex::encode(&row.hash),
            height: row.height,
            ntime: row.ntime.timestamp(),
            difficulty: row.difficulty,
            currency: row.currency,
            algo: row.algo,
            total_in: row.total_in,
            total_out: row.total_out,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionDto {
    pub txid: String,
    pub block_height: Option<i32>,
    pub coinbase: bool,
    pub total_in: Decimal,
    pub total_out: Decimal,
    pub network_fee: Option<Decimal>,
}

impl TransactionDto {
    pub fn from_row(row: TransactionRow, block_height: Option<i32>) -> Self {
        TransactionDto {
            txid: hex::encode(&row.txid),
            block_height,
            coinbase: row.coinbase,
            total_in: row.total_in,
            total_out: row.total_out,
            network_fee: row.network_fee,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AddressDto {
    pub hash: String,
    pub version: i16,
    pub currency: String,
    pub total_in: Decimal,
    pub total_out: Decimal,
    pub balance: Decimal,
}

impl From<AddressRow> for AddressDto {
    fn from(row: AddressRow) -> Self {
        let balance = row.balance();
        AddressDto {
            hash: hex::encode(&row.hash),
            version: row.version,
            currency: row.currency,
            total_in: row.total_in,
            total_out: row.total_out,
            balance,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OutputDto {
    pub origin_txid: String,
    pub index: i32,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub script_type: i16,
    pub spent: bool,
}

impl From<OutputRow> for OutputDto {
    fn from(row: OutputRow) -> Self {
        OutputDto {
            origin_txid: hex::encode(&row.origin_tx_hash),
            index: row.index,
            amount: row.amount,
            script_type: row.script_type,
            spent: row.spend_tx_id.is_some(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum SearchResult {
    Block(BlockDto),
    Transaction(TransactionDto),
    Address(AddressDto),
    NotFound { query: String },
}
