use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Literal token written wherever a value could not be extracted
pub const UNAVAILABLE: &str = "N/A";

/// A scraped value, or the explicit "unavailable" marker
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T> {
    Value(T),
    Unavailable,
}

impl<T> From<Option<T>> for Field<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Field::Unavailable, Field::Value)
    }
}

impl<T: fmt::Display> fmt::Display for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Value(v) => v.fmt(f),
            Field::Unavailable => f.write_str(UNAVAILABLE),
        }
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Value(v) => v.serialize(serializer),
            Field::Unavailable => serializer.serialize_str(UNAVAILABLE),
        }
    }
}

/// Catalog the listing was scraped from
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Rumah123,
}

/// One property listing, normalized. Field order is the CSV column order.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ListingRecord {
    pub price: Field<i64>,
    pub location: Field<String>,
    pub bedrooms: Field<String>,
    pub toilet: Field<String>,
    pub garage: Field<String>,
    #[serde(rename = "LT")]
    pub land_area: Field<f64>,
    #[serde(rename = "LB")]
    pub building_area: Field<f64>,
    pub listing_url: Field<String>,
    pub image_url: Field<String>,
    pub source: Source,
}

impl ListingRecord {
    pub const COLUMNS: [&'static str; 10] = [
        "price",
        "location",
        "bedrooms",
        "toilet",
        "garage",
        "LT",
        "LB",
        "listing_url",
        "image_url",
        "source",
    ];
}

/// A catalog region: stable key, display name and base listing URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionSpec {
    pub key: &'static str,
    pub name: &'static str,
    pub base_url: &'static str,
}

pub const REGIONS: &[RegionSpec] = &[
    RegionSpec {
        key: "dki-jakarta",
        name: "DKI Jakarta",
        base_url: "https://www.rumah123.com/jual/dki-jakarta/rumah/",
    },
    RegionSpec {
        key: "bogor",
        name: "Bogor",
        base_url: "https://www.rumah123.com/jual/bogor/rumah/",
    },
    RegionSpec {
        key: "depok",
        name: "Depok",
        base_url: "https://www.rumah123.com/jual/depok/rumah/",
    },
    RegionSpec {
        key: "tangerang",
        name: "Tangerang",
        base_url: "https://www.rumah123.com/jual/tangerang/rumah/",
    },
    RegionSpec {
        key: "tangerang-selatan",
        name: "Tangerang Selatan",
        base_url: "https://www.rumah123.com/jual/tangerang-selatan/rumah/",
    },
    RegionSpec {
        key: "bekasi",
        name: "Bekasi",
        base_url: "https://www.rumah123.com/jual/bekasi/rumah/",
    },
];

impl RegionSpec {
    /// Look a region up by key (`bogor`) or by its 1-based menu number (`2`)
    pub fn lookup(choice: &str) -> Option<&'static RegionSpec> {
        let choice = choice.trim();
        if let Ok(idx) = choice.parse::<usize>() {
            return idx.checked_sub(1).and_then(|i| REGIONS.get(i));
        }
        REGIONS.iter().find(|r| r.key.eq_ignore_ascii_case(choice))
    }
}

/// One unit of dispatch: a single catalog page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageJob {
    pub base_url: String,
    pub page: u32,
}

/// `{base}/?page={n}` with any trailing slashes on `base` removed
pub fn page_url(base_url: &str, page: u32) -> String {
    format!("{}/?page={}", base_url.trim_end_matches('/'), page)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("page range must look like 'start-end', got '{0}'")]
    Malformed(String),
    #[error("page range must be between 1 and {max}, got {start}-{end}")]
    OutOfBounds { start: u32, end: u32, max: u32 },
}

/// Inclusive range of catalog pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        if self.end < self.start {
            0
        } else {
            (self.end - self.start + 1) as usize
        }
    }

    pub fn pages(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }

    pub fn jobs(&self, base_url: &str) -> Vec<PageJob> {
        self.pages()
            .map(|page| PageJob {
                base_url: base_url.to_string(),
                page,
            })
            .collect()
    }

    /// Reject ranges that fall outside `1..=max_page`
    pub fn within(self, max_page: u32) -> Result<Self, RangeError> {
        if self.start < 1 || self.start > self.end || self.end > max_page {
            return Err(RangeError::OutOfBounds {
                start: self.start,
                end: self.end,
                max: max_page,
            });
        }
        Ok(self)
    }
}

impl FromStr for PageRange {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || RangeError::Malformed(s.to_string());
        let (start, end) = s.trim().split_once('-').ok_or_else(malformed)?;
        let start = start.trim().parse().map_err(|_| malformed())?;
        let end = end.trim().parse().map_err(|_| malformed())?;
        Ok(Self { start, end })
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
