//! ESGF catalog search configuration and ensemble filtering.

pub mod client;
pub mod member;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use self::client::DatasetRecord;
use self::member::{keep_one_variant_per_model, VariantKey};

/// One allowed model/variant pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelVariant {
    pub source_id: String,
    pub member_id: String,
}

/// Search facets for one analysis, passed explicitly to whatever needs them
/// instead of living as process-wide globals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub experiment_id: Vec<String>,
    pub variable_id: Vec<String>,
    pub table_id: String,
    /// When set, only these model/variant pairs survive filtering.
    pub keep_only: Option<Vec<ModelVariant>>,
}

impl SearchCriteria {
    /// Short-wave aerosol-forcing case: both `piClim` experiments and the
    /// eight SW radiation/cloud variables of the monthly atmosphere table.
    pub fn shortwave() -> Self {
        SearchCriteria {
            experiment_id: vec!["piClim-control".into(), "piClim-aer".into()],
            variable_id: vec![
                "clt".into(),
                "rsdt".into(),
                "rsut".into(),
                "rsutcs".into(),
                "rsds".into(),
                "rsus".into(),
                "rsdscs".into(),
                "rsuscs".into(),
            ],
            table_id: "Amon".into(),
            keep_only: None,
        }
    }

    /// Same facets as [`shortwave`](Self::shortwave), restricted to the
    /// model/variant pairs of Zelinka et al. (2023), table 1.
    pub fn zelinka_shortwave() -> Self {
        let pairs: &[(&str, &str)] = &[
            ("ACCESS-CM2", "r1i1p1f1"),
            ("ACCESS-ESM1-5", "r1i1p1f1"),
            ("BCC-ESM1", "r1i1p1f1"),
            ("CESM2", "r1i1p1f1"),
            ("CNRM-CM6-1", "r1i1p1f2"),
            ("CNRM-ESM2-1", "r1i1p1f2"),
            ("CanESM5", "r1i1p2f1"),
            ("GFDL-CM4", "r1i1p1f1"),
            ("GFDL-ESM4", "r1i1p1f1"),
            ("GISS-E2-1-G", "r1i1p1f1"),
            ("GISS-E2-1-G", "r1i1p1f2"),
            ("GISS-E2-1-G", "r1i1p3f1"),
            ("HadGEM3-GC31-LL", "r1i1p1f3"),
            ("IPSL-CM6A-LR-INCA", "r1i1p1f1"),
            ("IPSL-CM6A-LR", "r1i1p1f1"),
            ("IPSL-CM6A-LR", "r2i1p1f1"),
            ("IPSL-CM6A-LR", "r3i1p1f1"),
            ("IPSL-CM6A-LR", "r4i1p1f1"),
            ("MIROC6", "r11i1p1f1"),
            ("MIROC6", "r1i1p1f1"),
            ("MPI-ESM-1-2-HAM", "r1i1p1f1"),
            ("MRI-ESM2-0", "r1i1p1f1"),
            ("NorESM2-LM", "r1i1p1f1"),
            ("NorESM2-LM", "r1i1p2f1"),
            ("NorESM2-MM", "r1i1p1f1"),
            ("UKESM1-0-LL", "r1i1p1f4"),
        ];

        SearchCriteria {
            keep_only: Some(
                pairs
                    .iter()
                    .map(|(source_id, member_id)| ModelVariant {
                        source_id: source_id.to_string(),
                        member_id: member_id.to_string(),
                    })
                    .collect(),
            ),
            ..Self::shortwave()
        }
    }

    /// A run is complete when it provides one file per experiment/variable
    /// combination.
    pub fn expected_file_count(&self) -> usize {
        self.experiment_id.len() * self.variable_id.len()
    }

    fn allows(&self, key: &VariantKey) -> bool {
        match &self.keep_only {
            None => true,
            Some(pairs) => pairs
                .iter()
                .any(|p| p.source_id == key.source_id && p.member_id == key.member_id),
        }
    }
}

/// Groups raw records by run and drops incomplete runs, plus any run outside
/// the criteria's allow-list.
pub fn complete_groups(
    records: Vec<DatasetRecord>,
    criteria: &SearchCriteria,
) -> BTreeMap<VariantKey, Vec<DatasetRecord>> {
    let mut groups: BTreeMap<VariantKey, Vec<DatasetRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.key.variant_key())
            .or_default()
            .push(record);
    }

    groups
        .into_iter()
        .filter(|(key, group)| {
            group.len() == criteria.expected_file_count() && criteria.allows(key)
        })
        .collect()
}

/// Keeps one variant per model: the first member id of each source id in the
/// grouped ordering.
pub fn first_variant_groups(
    groups: BTreeMap<VariantKey, Vec<DatasetRecord>>,
) -> BTreeMap<VariantKey, Vec<DatasetRecord>> {
    let keys: Vec<VariantKey> = groups.keys().cloned().collect();
    let kept = keep_one_variant_per_model(&keys);

    groups
        .into_iter()
        .filter(|(key, _)| kept.contains(key))
        .collect()
}

/// The source id to search cell areas under. The INCA runs publish no
/// `areacella` of their own; they share the parent model's grid.
pub fn areacella_source_alias(source_id: &str) -> &str {
    if source_id == "IPSL-CM6A-LR-INCA" {
        "IPSL-CM6A-LR"
    } else {
        source_id
    }
}

// -- Tests -------------------------------------------------------------------
