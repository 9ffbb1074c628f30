use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// htsget ticket response per spec 1.3
#[derive(Debug, Serialize)]
pub struct HtsgetResponse {
    pub htsget: HtsgetResponseBody,
}

#[derive(Debug, Serialize)]
pub struct HtsgetResponseBody {
    pub format: Format,
    pub urls: Vec<UrlEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UrlEntry {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

/// Data formats served by this implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Format {
    Bam,
    Bcf,
}

impl Format {
    pub fn name(&self) -> &'static str {
        match self {
            Format::Bam => "BAM",
            Format::Bcf => "BCF",
        }
    }
}

/// Query parameters for ticket requests.  Numeric values travel as strings
/// and are parsed by the handlers so that failures map onto the htsget
/// error envelope instead of a bare 400.
#[derive(Debug, Deserialize, Default)]
pub struct TicketQuery {
    pub format: Option<String>,
    #[serde(rename = "referenceName")]
    pub reference_name: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Query parameters for block requests
#[derive(Debug, Deserialize, Default)]
pub struct BlockQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Service info response (GA4GH service-info spec)
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub id: String,
    pub name: String,
    pub r#type: ServiceType,
    pub description: Option<String>,
    pub organization: Organization,
    pub version: String,
    pub htsget: HtsgetCapabilities,
}

#[derive(Debug, Serialize)]
pub struct ServiceType {
    pub group: String,
    pub artifact: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct Organization {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct HtsgetCapabilities {
    pub datatype: String,
    pub formats: Vec<Format>,
    #[serde(rename = "fieldsParameterEffective")]
    pub fields_parameter_effective: bool,
    #[serde(rename = "tagsParametersEffective")]
    pub tags_parameters_effective: bool,
}
