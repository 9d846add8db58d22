use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::candles::Candle;
use crate::error::PipelineError;

/// Writes contents to a file, creating parent directories if needed.
pub fn write_file<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> std::io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(contents.as_ref())?;
    Ok(())
}

/// Reads candles from a delimited file with columns
/// `timestamp,open,high,low,close,volume`. A non-numeric first line is
/// treated as a header and skipped. Field separator may be a comma, space
/// or tab.
pub fn read_candles_csv<P: AsRef<Path>>(
    path: P,
    exchange: &str,
    symbol: &str,
    timeframe: &str,
) -> Result<Vec<Candle>, PipelineError> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(file);

    let mut candles = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let fields: Vec<&str> = trimmed
            .split([',', ' ', '\t'])
            .filter(|s| !s.is_empty())
            .collect();

        if fields.len() < 6 {
            return Err(PipelineError::Parse(format!(
                "line {}: expected 6 columns, got {}",
                line_num + 1,
                fields.len()
            )));
        }

        if line_num == 0 && fields[0].parse::<i64>().is_err() {
            continue; // header
        }

        let parse_f64 = |s: &str, name: &str| {
            s.parse::<f64>().map_err(|_| {
                PipelineError::Parse(format!("line {}: invalid {} {:?}", line_num + 1, name, s))
            })
        };

        let timestamp = fields[0].parse::<i64>().map_err(|_| {
            PipelineError::Parse(format!(
                "line {}: invalid timestamp {:?}",
                line_num + 1,
                fields[0]
            ))
        })?;

        candles.push(Candle {
            exchange: exchange.to_string(),
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            timestamp,
            open: parse_f64(fields[1], "open")?,
            high: parse_f64(fields[2], "high")?,
            low: parse_f64(fields[3], "low")?,
            close: parse_f64(fields[4], "close")?,
            volume: parse_f64(fields[5], "volume")?,
            close_time: 0,
            is_final: true,
        });
    }

    if candles.is_empty() {
        return Err(PipelineError::InvalidInput(
            "no candles found in file".to_string(),
        ));
    }

    Ok(candles)
}
