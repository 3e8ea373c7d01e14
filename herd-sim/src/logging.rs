// src/logging.rs
// CSV loggers on top of EventBus.

use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::error;

use crate::events::{EventListener, SimEvent};

fn open_csv_with_header(dir: &Path, filename: &str, header: &str) -> std::io::Result<BufWriter<File>> {
    create_dir_all(dir)?;
    let path: PathBuf = dir.join(filename);

    let file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
    let mut writer = BufWriter::new(file);

    // Write header immediately.
    writer.write_all(header.as_bytes())?;
    writer.write_all(b"\n")?;
    Ok(writer)
}

fn write_line(writer: &mut BufWriter<File>, logger: &str, line: &str) {
    if let Err(e) = writer.write_all(line.as_bytes()) {
        error!("[{logger}] write error: {e}");
    }
}

/// Order logger: logs/orders.csv
pub struct CsvOrderLogger {
    file: BufWriter<File>,
}

impl CsvOrderLogger {
    pub fn new<P: AsRef<Path>>(dir: P) -> std::io::Result<Self> {
        let header = "ts,from,to,msg_type,symbol,side,price,qty";
        let file = open_csv_with_header(dir.as_ref(), "orders.csv", header)?;
        Ok(Self { file })
    }
}

impl EventListener for CsvOrderLogger {
    fn on_event(&mut self, event: &SimEvent) {
        if let SimEvent::OrderLog {
            ts,
            from,
            to,
            msg_type,
            symbol,
            side,
            price,
            qty,
        } = event
        {
            let symbol_str = symbol.as_deref().unwrap_or("");
            let side_str = side.map(|s| format!("{:?}", s)).unwrap_or_default();
            let price_str = price.map(|p| p.to_string()).unwrap_or_default();
            let qty_str = qty.map(|q| q.to_string()).unwrap_or_default();

            let line = format!(
                "{ts},{from},{to},{msg_type:?},{symbol},{side},{price},{qty}\n",
                symbol = symbol_str,
                side = side_str,
                price = price_str,
                qty = qty_str,
            );
            write_line(&mut self.file, "CsvOrderLogger", &line);
        }
    }
}

/// Trade logger: logs/trades.csv
pub struct CsvTradeLogger {
    file: BufWriter<File>,
}

impl CsvTradeLogger {
    pub fn new<P: AsRef<Path>>(dir: P) -> std::io::Result<Self> {
        let header = "ts,symbol,price,qty,buyer,seller";
        let file = open_csv_with_header(dir.as_ref(), "trades.csv", header)?;
        Ok(Self { file })
    }
}

impl EventListener for CsvTradeLogger {
    fn on_event(&mut self, event: &SimEvent) {
        if let SimEvent::Trade {
            ts,
            symbol,
            price,
            qty,
            buyer,
            seller,
        } = event
        {
            let line = format!("{ts},{symbol},{price},{qty},{buyer},{seller}\n");
            write_line(&mut self.file, "CsvTradeLogger", &line);
        }
    }
}

/// Herd signal logger: logs/signals.csv
///
/// One row per relayed copy (`event=relayed`) and one per follower reaction
/// (`event=mirrored`).
pub struct CsvSignalLogger {
    file: BufWriter<File>,
}

impl CsvSignalLogger {
    pub fn new<P: AsRef<Path>>(dir: P) -> std::io::Result<Self> {
        let header = "ts,event,leader,follower,kind,relay_delay_ns,side,qty,price";
        let file = open_csv_with_header(dir.as_ref(), "signals.csv", header)?;
        Ok(Self { file })
    }
}

impl EventListener for CsvSignalLogger {
    fn on_event(&mut self, event: &SimEvent) {
        let line = match event {
            SimEvent::SignalRelayed {
                ts,
                leader,
                follower,
                kind,
                relay_delay_ns,
            } => format!("{ts},relayed,{leader},{follower},{},{relay_delay_ns},,,\n", kind.as_str()),
            SimEvent::SignalMirrored {
                ts,
                follower,
                kind,
                side,
                qty,
                price,
            } => {
                let side_str = side.map(|s| format!("{:?}", s)).unwrap_or_default();
                format!("{ts},mirrored,,{follower},{},,{side_str},{qty},{price}\n", kind.as_str())
            }
            _ => return,
        };
        write_line(&mut self.file, "CsvSignalLogger", &line);
    }
}

/// End-of-day valuation logger: logs/valuations.csv
pub struct CsvValuationLogger {
    file: BufWriter<File>,
}

impl CsvValuationLogger {
    pub fn new<P: AsRef<Path>>(dir: P) -> std::io::Result<Self> {
        let header = "ts,agent,name,holdings,cash,surplus";
        let file = open_csv_with_header(dir.as_ref(), "valuations.csv", header)?;
        Ok(Self { file })
    }
}

impl EventListener for CsvValuationLogger {
    fn on_event(&mut self, event: &SimEvent) {
        if let SimEvent::FinalValuation {
            ts,
            agent,
            name,
            holdings,
            cash,
            surplus,
        } = event
        {
            let line = format!("{ts},{agent},{name},{holdings},{cash},{surplus:.6}\n");
            write_line(&mut self.file, "CsvValuationLogger", &line);
            // Valuations are the last events of a run.
            if let Err(e) = self.file.flush() {
                error!("[CsvValuationLogger] flush error: {e}");
            }
        }
    }
}
