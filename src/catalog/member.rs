//! Structured ensemble-member keys.
//!
//! The archive identifies everything with `.`-joined facet strings
//! (`source.member.grid.experiment.variable`). These types keep the dotted
//! form as the on-disk encoding but give every consumer named fields, so the
//! string splitting happens in exactly one place.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("key `{key}` has {found} segments, expected {expected}")]
pub struct KeyParseError {
    pub key: String,
    pub expected: usize,
    pub found: usize,
}

fn split_key(key: &str, expected: usize) -> Result<Vec<&str>, KeyParseError> {
    let parts: Vec<&str> = key.split('.').collect();
    if parts.len() != expected || parts.iter().any(|p| p.is_empty()) {
        return Err(KeyParseError {
            key: key.to_string(),
            expected,
            found: parts.len(),
        });
    }
    Ok(parts)
}

/// One raw catalog entry: a single variable of a single run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemberKey {
    pub source_id: String,
    pub member_id: String,
    pub grid_label: String,
    pub experiment_id: String,
    pub variable_id: String,
}

impl MemberKey {
    /// The run this entry belongs to, ignoring experiment and variable.
    pub fn variant_key(&self) -> VariantKey {
        VariantKey {
            source_id: self.source_id.clone(),
            member_id: self.member_id.clone(),
            grid_label: self.grid_label.clone(),
        }
    }

    /// The climatology-store key this entry contributes to.
    pub fn climatology_key(&self) -> ClimatologyKey {
        ClimatologyKey {
            source_id: self.source_id.clone(),
            member_id: self.member_id.clone(),
            experiment_id: self.experiment_id.clone(),
        }
    }

    /// Key form usable as a file name (`.` separators replaced by `_`).
    pub fn file_stem(&self) -> String {
        self.to_string().replace('.', "_")
    }
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}.{}",
            self.source_id, self.member_id, self.grid_label, self.experiment_id, self.variable_id
        )
    }
}

impl FromStr for MemberKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = split_key(s, 5)?;
        Ok(MemberKey {
            source_id: parts[0].to_string(),
            member_id: parts[1].to_string(),
            grid_label: parts[2].to_string(),
            experiment_id: parts[3].to_string(),
            variable_id: parts[4].to_string(),
        })
    }
}

/// One model run: `source.member.grid`. Groups raw entries for completeness
/// filtering, the one-variant-per-model filter and the native area field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariantKey {
    pub source_id: String,
    pub member_id: String,
    pub grid_label: String,
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.source_id, self.member_id, self.grid_label)
    }
}

impl FromStr for VariantKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = split_key(s, 3)?;
        Ok(VariantKey {
            source_id: parts[0].to_string(),
            member_id: parts[1].to_string(),
            grid_label: parts[2].to_string(),
        })
    }
}

/// One climatology-store entry: `source.member.experiment`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClimatologyKey {
    pub source_id: String,
    pub member_id: String,
    pub experiment_id: String,
}

impl ClimatologyKey {
    /// Entry name with the experiment stripped, for listings that only care
    /// about which model/variant produced the data.
    pub fn without_experiment(&self) -> String {
        format!("{}.{}", self.source_id, self.member_id)
    }

    pub fn file_stem(&self) -> String {
        self.to_string().replace('.', "_")
    }
}

impl fmt::Display for ClimatologyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}",
            self.source_id, self.member_id, self.experiment_id
        )
    }
}

impl FromStr for ClimatologyKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = split_key(s, 3)?;
        Ok(ClimatologyKey {
            source_id: parts[0].to_string(),
            member_id: parts[1].to_string(),
            experiment_id: parts[2].to_string(),
        })
    }
}

/// Keeps the first variant of each distinct source id, preserving order.
pub fn keep_one_variant_per_model(keys: &[VariantKey]) -> Vec<VariantKey> {
    let mut seen: Vec<&str> = Vec::new();
    let mut kept = Vec::new();

    for key in keys {
        if !seen.contains(&key.source_id.as_str()) {
            seen.push(&key.source_id);
            kept.push(key.clone());
        }
    }

    kept
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_round_trip_member_key() {
        let text = "ACCESS-CM2.r1i1p1f1.gn.piClim-aer.clt";
        let key: MemberKey = text.parse().unwrap();

        assert_eq!(key.source_id, "ACCESS-CM2");
        assert_eq!(key.member_id, "r1i1p1f1");
        assert_eq!(key.grid_label, "gn");
        assert_eq!(key.experiment_id, "piClim-aer");
        assert_eq!(key.variable_id, "clt");
        assert_eq!(key.to_string(), text);
    }

    #[test]
    fn should_reject_wrong_segment_count() {
        let err = "ACCESS-CM2.r1i1p1f1".parse::<MemberKey>().unwrap_err();
        assert_eq!(err.expected, 5);
        assert_eq!(err.found, 2);
    }

    #[test]
    fn should_strip_experiment_from_climatology_key() {
        let key: ClimatologyKey = "ACCESS-CM2.r1i1p1f1.piClim-aer".parse().unwrap();
        assert_eq!(key.without_experiment(), "ACCESS-CM2.r1i1p1f1");
    }

    #[test]
    fn should_derive_group_keys() {
        let key: MemberKey = "MIROC6.r1i1p1f1.gn.piClim-control.rsdt".parse().unwrap();

        assert_eq!(key.variant_key().to_string(), "MIROC6.r1i1p1f1.gn");
        assert_eq!(
            key.climatology_key().to_string(),
            "MIROC6.r1i1p1f1.piClim-control"
        );
        assert_eq!(key.file_stem(), "MIROC6_r1i1p1f1_gn_piClim-control_rsdt");
    }

    #[test]
    fn should_keep_first_variant_of_each_model() {
        let keys: Vec<VariantKey> = [
            "IPSL-CM6A-LR.r1i1p1f1.gr",
            "IPSL-CM6A-LR.r2i1p1f1.gr",
            "IPSL-CM6A-LR.r3i1p1f1.gr",
            "IPSL-CM6A-LR.r4i1p1f1.gr",
            "IPSL-CM6A-LR-INCA.r1i1p1f1.gr",
            "MIROC6.r11i1p1f1.gn",
            "MIROC6.r1i1p1f1.gn",
        ]
        .iter()
        .map(|k| k.parse().unwrap())
        .collect();

        let kept = keep_one_variant_per_model(&keys);
        let kept: Vec<String> = kept.iter().map(|k| k.to_string()).collect();

        assert_eq!(
            kept,
            vec![
                "IPSL-CM6A-LR.r1i1p1f1.gr",
                "IPSL-CM6A-LR-INCA.r1i1p1f1.gr",
                "MIROC6.r11i1p1f1.gn",
            ]
        );
    }
}
