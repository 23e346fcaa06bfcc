//! Append-only CSV log of executed orders.
//!
//! One line per fill, no header:
//! `<timestamp>,<symbol>,<BUY|SELL>,price:<entry>,sl:<sl>,tp:<tp>,lot_size:<volume>`

use std::fs::{File, OpenOptions};
use std::path::Path;

use parking_lot::Mutex;

use crate::domain::error::TraderError;
use crate::domain::trade::TradeRecord;
use crate::ports::trade_log_port::TradeLog;

pub struct CsvTradeLog {
    writer: Mutex<csv::Writer<File>>,
}

impl CsvTradeLog {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TraderError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        Ok(Self {
            writer: Mutex::new(writer),
        })
    }
}

pub fn format_fields(trade: &TradeRecord) -> [String; 7] {
    [
        trade.open_time.to_rfc3339(),
        trade.symbol.clone(),
        trade.direction.to_string(),
        format!("price:{}", trade.entry_price),
        format!("sl:{}", trade.stop_loss),
        format!("tp:{}", trade.take_profit),
        format!("lot_size:{}", trade.volume),
    ]
}

impl TradeLog for CsvTradeLog {
    fn record(&self, trade: &TradeRecord) -> Result<(), TraderError> {
        let mut writer = self.writer.lock();
        writer.write_record(format_fields(trade))?;
        writer.flush()?;
        Ok(())
    }
}
