use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{AttributeValue, Record};

const US_FORMAT: &str = "%m/%d/%Y %I:%M:%S %p";
const US_FORMAT_24H: &str = "%m/%d/%Y %H:%M:%S";
const ISO_PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampFormat {
    // MM/DD/YYYY hh:mm:ss AM
    UsSlash,
    // YYYY-MM-DDThh:mm:ss.sssZ
    IsoZulu,
}

impl TimestampFormat {
    // 日付と時刻の区切り T の有無で判定する
    pub fn detect(value: &str) -> Self {
        if value.contains('T') {
            TimestampFormat::IsoZulu
        } else {
            TimestampFormat::UsSlash
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub datetime: NaiveDateTime,
    pub format: TimestampFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampParseError(pub String);

impl fmt::Display for TimestampParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognised timestamp: {:?}", self.0)
    }
}

impl std::error::Error for TimestampParseError {}

impl Timestamp {
    pub fn with_date(self, date: NaiveDate) -> Self {
        Self {
            datetime: NaiveDateTime::new(date, self.datetime.time()),
            format: self.format,
        }
    }
}

impl FromStr for Timestamp {
    type Err = TimestampParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        let format = TimestampFormat::detect(trimmed);
        let parsed = match format {
            TimestampFormat::IsoZulu => {
                let body = trimmed.strip_suffix('Z').unwrap_or(trimmed);
                NaiveDateTime::parse_from_str(body, ISO_PARSE_FORMAT).ok()
            }
            TimestampFormat::UsSlash => NaiveDateTime::parse_from_str(trimmed, US_FORMAT)
                .or_else(|_| NaiveDateTime::parse_from_str(trimmed, US_FORMAT_24H))
                .ok(),
        };

        parsed
            .map(|datetime| Timestamp { datetime, format })
            .ok_or_else(|| TimestampParseError(s.to_string()))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.format {
            TimestampFormat::UsSlash => write!(f, "{}", self.datetime.format(US_FORMAT)),
            TimestampFormat::IsoZulu => write!(f, "{}", self.datetime.format(ISO_FORMAT)),
        }
    }
}

// 全件を解析してから書き換えるので、失敗時にレコードは変更されない
pub fn remap(
    records: &mut [Record],
    fields: &[String],
    target_date: Option<NaiveDate>,
) -> Result<()> {
    let Some(date) = target_date else {
        return Ok(());
    };

    // 全件を先にパースして、失敗時にレコードを書き換えないようにする
    let mut updates: Vec<(usize, &str, String)> = Vec::new();
    for (idx, record) in records.iter().enumerate() {
        for field in fields {
            let Some(value) = record.get(field) else {
                continue;
            };
            let raw = match value {
                AttributeValue::Null => continue,
                AttributeValue::Text(s) => s.as_str(),
                _ => {
                    return Err(Error::TimestampParse {
                        field: field.clone(),
                        value: format!("{:?}", value),
                        record: idx,
                    })
                }
            };
            let timestamp: Timestamp = raw.parse().map_err(|_| Error::TimestampParse {
                field: field.clone(),
                value: raw.to_string(),
                record: idx,
            })?;
            updates.push((idx, field.as_str(), timestamp.with_date(date).to_string()));
        }
    }

    debug!("Re-dating {} timestamp values to {}", updates.len(), date);
    for (idx, field, value) in updates {
        records[idx].set(field, value);
    }

    Ok(())
}
