use std::time::Duration;

use chrono::NaiveDate;
use reqwest::blocking::Client;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::domain::{FdaCategory, Record};
use crate::error::ResearchError;
use crate::http::{build_client, send_with_retries};

const OPENFDA_BASE: &str = "https://api.fda.gov";

/// Parameters of one FDA search beyond the category itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FdaQuery {
    pub max_results: usize,
    /// Free text narrowing the category's default filter.
    pub query: Option<String>,
}

impl FdaQuery {
    pub fn new(max_results: usize) -> Self {
        Self {
            max_results,
            query: None,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.query = (!query.trim().is_empty()).then_some(query);
        self
    }
}

/// Fetches FDA entries for one category, newest first.
pub trait FdaSource: Send + Sync {
    fn search(&self, category: FdaCategory, query: &FdaQuery) -> Result<Vec<Record>, ResearchError>;
}

/// Endpoint and filter used for a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FdaRequest {
    pub endpoint: &'static str,
    pub search: Option<String>,
    pub sort: &'static str,
}

impl FdaRequest {
    pub fn for_category(category: FdaCategory, query: &FdaQuery) -> Self {
        let (endpoint, base_filter, sort) = match category {
            FdaCategory::Recalls => (
                "food/enforcement.json",
                Some(r#"status:"Ongoing""#),
                "recall_initiation_date:desc",
            ),
            FdaCategory::Drugs => ("drug/event.json", None, "receivedate:desc"),
            FdaCategory::Food => (
                "food/enforcement.json",
                Some(r#"product_type:"food""#),
                "recall_initiation_date:desc",
            ),
            FdaCategory::Clinical => ("drug/event.json", Some("serious:1"), "receivedate:desc"),
        };
        let text_filter = query.query.as_deref().map(|text| {
            let text = text.replace('"', "");
            match category {
                FdaCategory::Recalls | FdaCategory::Food => {
                    format!(r#"reason_for_recall:"{}""#, text.trim())
                }
                FdaCategory::Drugs | FdaCategory::Clinical => {
                    format!(r#"patient.drug.medicinalproduct:"{}""#, text.trim())
                }
            }
        });
        let search = match (base_filter, text_filter) {
            (Some(base), Some(text)) => Some(format!("{base} AND {text}")),
            (Some(base), None) => Some(base.to_string()),
            (None, Some(text)) => Some(text),
            (None, None) => None,
        };
        Self {
            endpoint,
            search,
            sort,
        }
    }
}

#[derive(Clone)]
pub struct OpenFdaHttpClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenFdaHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, ResearchError> {
        let client = build_client("application/json", timeout)
            .map_err(|err| ResearchError::OpenFdaHttp(err.to_string()))?;
        let api_key = std::env::var("OPENFDA_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        Ok(Self {
            client,
            base_url: OPENFDA_BASE.to_string(),
            api_key,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl FdaSource for OpenFdaHttpClient {
    fn search(&self, category: FdaCategory, query: &FdaQuery) -> Result<Vec<Record>, ResearchError> {
        let request = FdaRequest::for_category(category, query);
        let url = format!("{}/{}", self.base_url, request.endpoint);
        let limit = query.max_results.to_string();
        let mut params = vec![("limit", limit.as_str()), ("sort", request.sort)];
        if let Some(search) = request.search.as_deref() {
            params.push(("search", search));
        }
        if let Some(key) = self.api_key.as_deref() {
            params.push(("api_key", key));
        }

        let response = send_with_retries(|| self.client.get(&url).query(&params), "openfda")
            .map_err(|err| ResearchError::OpenFdaHttp(err.to_string()))?;
        let status = response.status().as_u16();
        if status == 404 {
            // openFDA answers an empty match set with 404 NOT_FOUND.
            debug!(category = category.as_str(), "openfda returned no matches");
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "openFDA request failed".to_string());
            return Err(ResearchError::OpenFdaStatus { status, message });
        }
        let body: Value = response
            .json()
            .map_err(|err| ResearchError::OpenFdaHttp(err.to_string()))?;
        let today = chrono::Local::now().date_naive();
        let records = parse_results(category, &body, today)?;
        debug!(category = category.as_str(), found = records.len(), "openfda results parsed");
        Ok(records)
    }
}

/// Maps an openFDA response body onto stored FDA records.
pub fn parse_results(
    category: FdaCategory,
    body: &Value,
    today: NaiveDate,
) -> Result<Vec<Record>, ResearchError> {
    let results = match body.get("results") {
        Some(Value::Array(results)) => results,
        Some(_) => {
            return Err(ResearchError::OpenFdaHttp(
                "`results` is not an array".to_string(),
            ));
        }
        None => return Ok(Vec::new()),
    };
    Ok(results
        .iter()
        .enumerate()
        .map(|(idx, result)| normalize_result(category, idx + 1, result, today))
        .collect())
}

/// Builds one record; `position` is 1-based and only used for derived ids.
pub fn normalize_result(
    category: FdaCategory,
    position: usize,
    result: &Value,
    today: NaiveDate,
) -> Record {
    let doc_type = category.doc_type();
    let retrieved = today.format("%Y-%m-%d").to_string();
    let upstream_id = match category {
        FdaCategory::Recalls | FdaCategory::Food => text(result, "/recall_number"),
        FdaCategory::Drugs | FdaCategory::Clinical => text(result, "/safetyreportid"),
    };
    let id = if upstream_id.is_empty() {
        derived_id(doc_type, position, today)
    } else {
        upstream_id
    };

    let document = match category {
        FdaCategory::Recalls | FdaCategory::Food => json!({
            "id": id.clone(),
            "title": text(result, "/product_description"),
            "summary": text(result, "/reason_for_recall"),
            "date": fda_date(&text(result, "/recall_initiation_date")).unwrap_or_else(|| retrieved.clone()),
            "type": doc_type,
            "retrieved_date": retrieved,
            "product_info": {
                "product_name": text(result, "/product_description"),
                "company_name": text(result, "/recalling_firm"),
                "recall_number": text(result, "/recall_number"),
                "recall_classification": text(result, "/classification"),
                "recall_status": text(result, "/status"),
                "distribution_pattern": text(result, "/distribution_pattern"),
                "quantity": text(result, "/product_quantity"),
                "state": text(result, "/state"),
                "city": text(result, "/city"),
            },
        }),
        FdaCategory::Drugs => json!({
            "id": id.clone(),
            "title": text(result, "/patient/drug/0/medicinalproduct"),
            "summary": text(result, "/patient/reaction/0/reactionmeddrapt"),
            "date": fda_date(&text(result, "/receivedate")).unwrap_or_else(|| retrieved.clone()),
            "type": doc_type,
            "retrieved_date": retrieved,
            "drug_info": {
                "drug_name": text(result, "/patient/drug/0/medicinalproduct"),
                "manufacturer": text(result, "/patient/drug/0/openfda/manufacturer_name/0"),
                "dosage_form": text(result, "/patient/drug/0/drugdosageform"),
                "route": text(result, "/patient/drug/0/openfda/route/0"),
                "indication": text(result, "/patient/drug/0/drugindication"),
            },
        }),
        FdaCategory::Clinical => json!({
            "id": id.clone(),
            "title": text(result, "/patient/drug/0/medicinalproduct"),
            "summary": text(result, "/patient/reaction/0/reactionmeddrapt"),
            "date": fda_date(&text(result, "/receivedate")).unwrap_or_else(|| retrieved.clone()),
            "type": doc_type,
            "retrieved_date": retrieved,
            "clinical_info": {
                "conditions": texts(result, "/patient/reaction", "reactionmeddrapt"),
                "interventions": texts(result, "/patient/drug", "medicinalproduct"),
                "serious": text(result, "/serious"),
                "sponsor": text(result, "/companynumb"),
                "locations": [text(result, "/occurcountry")],
            },
        }),
    };

    let attributes = match document {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    Record::fda(id, Some(category), attributes)
}

/// Fallback identifier when upstream omits one: `{doc_type}_{position}_{YYYYMMDD}`.
pub fn derived_id(doc_type: &str, position: usize, today: NaiveDate) -> String {
    format!("{doc_type}_{position}_{}", today.format("%Y%m%d"))
}

/// openFDA dates are `YYYYMMDD`; stored dates are `YYYY-MM-DD`.
fn fda_date(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    Some(
        NaiveDate::parse_from_str(raw, "%Y%m%d")
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|_| raw.to_string()),
    )
}

fn text(value: &Value, pointer: &str) -> String {
    match value.pointer(pointer) {
        Some(Value::String(text)) => text.trim().to_string(),
        Some(Value::Number(number)) => number.to_string(),
        _ => String::new(),
    }
}

fn texts(value: &Value, pointer: &str, field: &str) -> Vec<String> {
    value
        .pointer(pointer)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get(field).and_then(Value::as_str))
                .filter(|text| !text.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recall_filters_combine_with_query() {
        let request = FdaRequest::for_category(
            FdaCategory::Recalls,
            &FdaQuery::new(5).with_query("\"listeria\""),
        );
        assert_eq!(request.endpoint, "food/enforcement.json");
        assert_eq!(
            request.search.as_deref(),
            Some(r#"status:"Ongoing" AND reason_for_recall:"listeria""#)
        );
    }

    #[test]
    fn drugs_have_no_default_filter() {
        let request = FdaRequest::for_category(FdaCategory::Drugs, &FdaQuery::new(5));
        assert_eq!(request.endpoint, "drug/event.json");
        assert_eq!(request.search, None);
        assert_eq!(request.sort, "receivedate:desc");
    }

    #[test]
    fn fda_dates_are_reformatted() {
        assert_eq!(fda_date("20240115").as_deref(), Some("2024-01-15"));
        assert_eq!(fda_date("01/15/2024").as_deref(), Some("01/15/2024"));
        assert_eq!(fda_date(""), None);
    }
}
