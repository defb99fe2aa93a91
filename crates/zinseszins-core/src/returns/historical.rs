use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{Rate, Year};

/// Built-in historical index data sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoricalIndex {
    /// DAX performance index, calendar-year total returns.
    Dax,
}

const DAX_ANNUAL_RETURNS: [(Year, Decimal); 24] = [
    (2000, dec!(-0.075)),
    (2001, dec!(-0.198)),
    (2002, dec!(-0.439)),
    (2003, dec!(0.371)),
    (2004, dec!(0.073)),
    (2005, dec!(0.271)),
    (2006, dec!(0.220)),
    (2007, dec!(0.223)),
    (2008, dec!(-0.404)),
    (2009, dec!(0.238)),
    (2010, dec!(0.161)),
    (2011, dec!(-0.147)),
    (2012, dec!(0.291)),
    (2013, dec!(0.255)),
    (2014, dec!(0.027)),
    (2015, dec!(0.096)),
    (2016, dec!(0.069)),
    (2017, dec!(0.125)),
    (2018, dec!(-0.183)),
    (2019, dec!(0.255)),
    (2020, dec!(0.035)),
    (2021, dec!(0.158)),
    (2022, dec!(-0.123)),
    (2023, dec!(0.203)),
];

impl HistoricalIndex {
    pub fn annual_returns(&self) -> BTreeMap<Year, Rate> {
        match self {
            HistoricalIndex::Dax => DAX_ANNUAL_RETURNS.iter().copied().collect(),
        }
    }
}

/// A named sequence of crisis-year returns that can be placed on any start
/// year of a projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlackSwanEvent {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Consecutive yearly returns, first element is the first crisis year.
    pub returns: Vec<Rate>,
}

impl BlackSwanEvent {
    /// Year -> return map for placing the event at `start_year`.
    pub fn overrides_from(&self, start_year: Year) -> BTreeMap<Year, Rate> {
        self.returns
            .iter()
            .enumerate()
            .map(|(i, r)| (start_year + i as Year, *r))
            .collect()
    }
}

/// Predefined black swan events based on DAX crisis years.
pub fn black_swan_events() -> Vec<BlackSwanEvent> {
    vec![
        BlackSwanEvent {
            id: "dotcom-crash".into(),
            name: "Dotcom-Crash (2000-2002)".into(),
            description: "Platzen der Technologieblase, drei Verlustjahre in Folge".into(),
            returns: vec![dec!(-0.075), dec!(-0.198), dec!(-0.439)],
        },
        BlackSwanEvent {
            id: "finanzkrise".into(),
            name: "Finanzkrise (2008)".into(),
            description: "Globale Finanzkrise nach dem Lehman-Zusammenbruch".into(),
            returns: vec![dec!(-0.404)],
        },
        BlackSwanEvent {
            id: "euro-krise".into(),
            name: "Euro-Krise (2011)".into(),
            description: "Staatsschuldenkrise im Euroraum".into(),
            returns: vec![dec!(-0.147)],
        },
    ]
}

pub fn find_black_swan_event(id: &str) -> Option<BlackSwanEvent> {
    black_swan_events().into_iter().find(|e| e.id == id)
}
