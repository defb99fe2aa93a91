use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{EngineError, ValidationIssue};
use crate::types::{Rate, Year};
use crate::EngineResult;

/// Plausible range for a published Basiszins.
const MIN_PLAUSIBLE_RATE: Rate = dec!(-0.02);
const MAX_PLAUSIBLE_RATE: Rate = dec!(0.10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasiszinsSource {
    /// Fetched from the Bundesbank by an outside collaborator.
    Api,
    /// Entered by the user for a future year.
    Manual,
    /// Shipped with the engine.
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasiszinsEntry {
    pub rate: Rate,
    pub source: BasiszinsSource,
    #[serde(default)]
    pub last_updated: Option<NaiveDate>,
}

/// Basiszins per year for the Vorabpauschale (BMF publication, January 2 of
/// each year).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BasiszinsTable {
    entries: BTreeMap<Year, BasiszinsEntry>,
}

impl Default for BasiszinsTable {
    fn default() -> Self {
        let published = [
            (2018, dec!(0.0087)),
            (2019, dec!(0.0052)),
            (2020, dec!(0.0007)),
            (2021, dec!(-0.0045)),
            (2022, dec!(-0.0005)),
            (2023, dec!(0.0255)),
            (2024, dec!(0.0229)),
            (2025, dec!(0.0253)),
        ];
        let entries = published
            .into_iter()
            .map(|(year, rate)| {
                (
                    year,
                    BasiszinsEntry {
                        rate,
                        source: BasiszinsSource::Default,
                        last_updated: None,
                    },
                )
            })
            .collect();
        Self { entries }
    }
}

impl BasiszinsTable {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Rate for `year`: the exact entry, else the latest earlier year, else
    /// zero (no Vorabpauschale).
    pub fn rate_for_year(&self, year: Year) -> Rate {
        if let Some(entry) = self.entries.get(&year) {
            return entry.rate;
        }
        match self.entries.range(..year).next_back() {
            Some((known, entry)) => {
                log::debug!("Basiszins {year} unknown, using {known}");
                entry.rate
            }
            None => Decimal::ZERO,
        }
    }

    /// Set a manual rate. Past years (before `current_year`) are published
    /// figures and cannot be changed.
    pub fn set_rate(
        &mut self,
        year: Year,
        rate: Rate,
        current_year: Year,
        today: Option<NaiveDate>,
    ) -> EngineResult<()> {
        if year < current_year && self.entries.contains_key(&year) {
            return Err(EngineError::InvalidInput {
                field: format!("basiszins.{year}"),
                reason: "Historische Basiszinsen können nicht geändert werden".into(),
            });
        }
        if let Some(issue) = check_plausible(year, rate) {
            return Err(EngineError::InvalidConfiguration(vec![issue]));
        }
        self.entries.insert(
            year,
            BasiszinsEntry {
                rate,
                source: BasiszinsSource::Manual,
                last_updated: today,
            },
        );
        Ok(())
    }

    /// Merge values fetched from an outside source. Fetched values win over
    /// shipped defaults and manual entries; implausible values are skipped and
    /// returned as issues.
    pub fn merge_fetched(
        &mut self,
        fetched: &BTreeMap<Year, Rate>,
        fetched_on: Option<NaiveDate>,
    ) -> Vec<ValidationIssue> {
        let mut skipped = Vec::new();
        for (&year, &rate) in fetched {
            if let Some(issue) = check_plausible(year, rate) {
                log::warn!("Skipping fetched Basiszins {year}: {}", issue.message);
                skipped.push(issue);
                continue;
            }
            self.entries.insert(
                year,
                BasiszinsEntry {
                    rate,
                    source: BasiszinsSource::Api,
                    last_updated: fetched_on,
                },
            );
        }
        skipped
    }

    pub fn validate(&self) -> Vec<ValidationIssue> {
        self.entries
            .iter()
            .filter_map(|(&year, entry)| check_plausible(year, entry.rate))
            .collect()
    }
}

fn check_plausible(year: Year, rate: Rate) -> Option<ValidationIssue> {
    if rate < MIN_PLAUSIBLE_RATE || rate > MAX_PLAUSIBLE_RATE {
        Some(ValidationIssue::new(
            format!("basiszins.{year}"),
            format!("Basiszins {rate} liegt außerhalb des plausiblen Bereichs (-2% bis 10%)."),
        ))
    } else {
        None
    }
}
