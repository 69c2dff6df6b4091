//! # IP Geolocation
//!
//! Local lookup table from IP ranges to country codes, loaded once at startup.
//! No network calls on the request path.
//!
//! ## Format
//! CSV rows of `start_ip,end_ip,country`, both ends inclusive. IPv4 and IPv6 rows
//! can be mixed in one file. Lines starting with `#` are comments, a leading
//! header row is skipped.
use std::{
    io::Read,
    net::IpAddr,
    path::Path,
};

use tracing::{info, warn};

/// Accepts a two-letter code, uppercased. `XX` is the CDN marker for unknown.
pub fn country_code(raw: &str) -> Option<String> {
    let code = raw.trim().to_ascii_uppercase();

    if code.len() == 2 && code.bytes().all(|b| b.is_ascii_uppercase()) && code != "XX" {
        Some(code)
    } else {
        None
    }
}

struct IpRange<T> {
    start: T,
    end: T,
    country: String,
}

fn find<T: Ord + Copy>(ranges: &[IpRange<T>], ip: T) -> Option<&str> {
    let index = ranges.partition_point(|range| range.start <= ip);

    ranges[..index]
        .last()
        .filter(|range| ip <= range.end)
        .map(|range| range.country.as_str())
}

#[derive(Default)]
pub struct GeoTable {
    v4: Vec<IpRange<u32>>,
    v6: Vec<IpRange<u128>>,
}

impl GeoTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, csv::Error> {
        let file = std::fs::File::open(path.as_ref())?;
        let table = Self::from_reader(file)?;

        info!(
            "Loaded {} IP ranges from {}",
            table.len(),
            path.as_ref().display()
        );

        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut table = Self::default();

        for (row, record) in reader.records().enumerate() {
            let record = record?;

            let (Some(start), Some(end), Some(country)) =
                (record.get(0), record.get(1), record.get(2))
            else {
                warn!("Skipping GeoIP row {row}: expected 3 fields");
                continue;
            };

            let (Ok(start), Ok(end)) = (start.parse::<IpAddr>(), end.parse::<IpAddr>()) else {
                if row != 0 {
                    warn!("Skipping GeoIP row {row}: bad address");
                }
                continue;
            };

            let Some(country) = country_code(country) else {
                warn!("Skipping GeoIP row {row}: bad country {country:?}");
                continue;
            };

            match (start, end) {
                (IpAddr::V4(start), IpAddr::V4(end)) if start <= end => table.v4.push(IpRange {
                    start: start.into(),
                    end: end.into(),
                    country,
                }),
                (IpAddr::V6(start), IpAddr::V6(end)) if start <= end => table.v6.push(IpRange {
                    start: start.into(),
                    end: end.into(),
                    country,
                }),
                _ => warn!("Skipping GeoIP row {row}: mixed families or reversed range"),
            }
        }

        table.v4.sort_by_key(|range| range.start);
        table.v6.sort_by_key(|range| range.start);

        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.v4.len() + self.v6.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn lookup(&self, ip: IpAddr) -> Option<String> {
        let found = match ip {
            IpAddr::V4(v4) => find(&self.v4, u32::from(v4)),
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => find(&self.v4, u32::from(v4)),
                None => find(&self.v6, u128::from(v6)),
            },
        };

        found.map(str::to_string)
    }
}
