//! Thin client for the ESGF federated search API.
//!
//! One GET per search, one GET per file. Failures surface immediately; there
//! is no retry or backoff layer.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use futures::StreamExt;
use serde::Deserialize;

use super::member::MemberKey;
use super::SearchCriteria;

/// Public ESGF index node used when none is configured.
pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://esgf-node.llnl.gov/esg-search/search";

/// One downloadable file known to the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRecord {
    pub key: MemberKey,
    pub url: String,
}

pub struct EsgfClient {
    http: reqwest::Client,
    search_endpoint: String,
}

impl EsgfClient {
    pub fn new(search_endpoint: impl Into<String>) -> Self {
        EsgfClient {
            http: reqwest::Client::new(),
            search_endpoint: search_endpoint.into(),
        }
    }

    /// Searches file entries matching the criteria's facets.
    pub async fn search_files(&self, criteria: &SearchCriteria) -> Result<Vec<DatasetRecord>> {
        let params = [
            ("project", "CMIP6".to_string()),
            ("type", "File".to_string()),
            ("format", "application/solr+json".to_string()),
            ("latest", "true".to_string()),
            ("distrib", "true".to_string()),
            ("limit", "10000".to_string()),
            ("experiment_id", criteria.experiment_id.join(",")),
            ("variable_id", criteria.variable_id.join(",")),
            ("table_id", criteria.table_id.clone()),
        ];

        self.run_search(&params).await
    }

    /// Searches the cell-area file for a model/grid combination, across any
    /// experiment and variant that published one.
    pub async fn search_areacella(
        &self,
        source_id: &str,
        grid_label: &str,
    ) -> Result<Vec<DatasetRecord>> {
        let params = [
            ("project", "CMIP6".to_string()),
            ("type", "File".to_string()),
            ("format", "application/solr+json".to_string()),
            ("latest", "true".to_string()),
            ("distrib", "true".to_string()),
            ("limit", "100".to_string()),
            ("variable_id", "areacella".to_string()),
            ("source_id", source_id.to_string()),
            ("grid_label", grid_label.to_string()),
        ];

        self.run_search(&params).await
    }

    async fn run_search(&self, params: &[(&str, String)]) -> Result<Vec<DatasetRecord>> {
        let response = self
            .http
            .get(&self.search_endpoint)
            .query(params)
            .send()
            .await
            .context("contacting the ESGF search endpoint")?;

        if !response.status().is_success() {
            bail!("search failed with status {}", response.status());
        }

        let body: SolrResponse = response
            .json()
            .await
            .context("parsing the ESGF search response")?;

        body.response
            .docs
            .into_iter()
            .map(record_from_doc)
            .collect()
    }

    /// Downloads a record's file into `dir`, named after its key, and
    /// returns the file path.
    pub async fn download(&self, record: &DatasetRecord, dir: &Path) -> Result<PathBuf> {
        let file_path = dir.join(format!("{}.nc", record.key.file_stem()));

        let response = self
            .http
            .get(&record.url)
            .send()
            .await
            .with_context(|| format!("downloading `{}`", record.url))?;

        if !response.status().is_success() {
            bail!(
                "downloading `{}` failed with status {}",
                record.url,
                response.status()
            );
        }

        let mut file = File::create(&file_path)
            .with_context(|| format!("creating `{}`", file_path.display()))?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.with_context(|| format!("reading `{}`", record.url))?;
            file.write_all(&chunk)?;
        }

        Ok(file_path)
    }
}

// The search response is Solr JSON: every facet value arrives as an array.
#[derive(Debug, Deserialize)]
struct SolrResponse {
    response: SolrBody,
}

#[derive(Debug, Deserialize)]
struct SolrBody {
    #[serde(default)]
    docs: Vec<SolrDoc>,
}

#[derive(Debug, Deserialize)]
struct SolrDoc {
    #[serde(default)]
    source_id: Vec<String>,
    #[serde(default)]
    member_id: Vec<String>,
    #[serde(default)]
    grid_label: Vec<String>,
    #[serde(default)]
    experiment_id: Vec<String>,
    #[serde(default)]
    variable_id: Vec<String>,
    #[serde(default)]
    url: Vec<String>,
}

fn record_from_doc(doc: SolrDoc) -> Result<DatasetRecord> {
    let key = MemberKey {
        source_id: single_facet(&doc.source_id, "source_id")?,
        member_id: single_facet(&doc.member_id, "member_id")?,
        grid_label: single_facet(&doc.grid_label, "grid_label")?,
        experiment_id: single_facet(&doc.experiment_id, "experiment_id")?,
        variable_id: single_facet(&doc.variable_id, "variable_id")?,
    };

    let url = http_url(&doc.url)
        .with_context(|| format!("no HTTP download url for `{key}`"))?;

    Ok(DatasetRecord { key, url })
}

fn single_facet(values: &[String], facet: &str) -> Result<String> {
    values
        .first()
        .cloned()
        .with_context(|| format!("search document is missing the `{facet}` facet"))
}

// url entries look like "<url>|<mime>|<service>"; we want the HTTPServer one.
fn http_url(urls: &[String]) -> Option<String> {
    urls.iter()
        .find(|entry| entry.ends_with("|HTTPServer"))
        .and_then(|entry| entry.split('|').next())
        .map(str::to_string)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_pick_http_url_among_services() {
        let urls = vec![
            "gsiftp://esgf.example/thredds/a.nc|application/gridftp|GridFTP".to_string(),
            "https://esgf.example/thredds/a.nc|application/netcdf|HTTPServer".to_string(),
            "https://esgf.example/thredds/dodsC/a.nc|application/opendap|OPENDAP".to_string(),
        ];

        assert_eq!(
            http_url(&urls).unwrap(),
            "https://esgf.example/thredds/a.nc"
        );
    }

    #[test]
    fn should_build_record_from_solr_doc() {
        let json = r#"{
            "source_id": ["ACCESS-CM2"],
            "member_id": ["r1i1p1f1"],
            "grid_label": ["gn"],
            "experiment_id": ["piClim-aer"],
            "variable_id": ["clt"],
            "url": ["https://esgf.example/clt.nc|application/netcdf|HTTPServer"]
        }"#;
        let doc: SolrDoc = serde_json::from_str(json).unwrap();

        let record = record_from_doc(doc).unwrap();

        assert_eq!(
            record.key.to_string(),
            "ACCESS-CM2.r1i1p1f1.gn.piClim-aer.clt"
        );
        assert_eq!(record.url, "https://esgf.example/clt.nc");
    }

    #[test]
    fn should_fail_without_http_service() {
        let json = r#"{
            "source_id": ["ACCESS-CM2"],
            "member_id": ["r1i1p1f1"],
            "grid_label": ["gn"],
            "experiment_id": ["piClim-aer"],
            "variable_id": ["clt"],
            "url": ["gsiftp://esgf.example/clt.nc|application/gridftp|GridFTP"]
        }"#;
        let doc: SolrDoc = serde_json::from_str(json).unwrap();

        assert!(record_from_doc(doc).is_err());
    }

    #[test]
    fn should_parse_empty_search_response() {
        let json = r#"{"response": {"numFound": 0, "docs": []}}"#;
        let body: SolrResponse = serde_json::from_str(json).unwrap();
        assert!(body.response.docs.is_empty());
    }
}
