//! PubMed client using the E-utilities API.

use async_trait::async_trait;
use quick_xml::de::from_str;
use quick_xml::events::{BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::Deserialize;

use crate::config::{Config, PubMedConfig};
use crate::models::{
    AffiliationQuery, DateWindow, Identifier, PublicationBuilder, PublicationRecord,
};
use crate::sources::{FetchError, IdentifierSearch, RecordFetcher, SearchError};
use crate::utils::HttpClient;

/// PubMed E-utilities client
///
/// Searches with ESearch (JSON) and fetches one record at a time with EFetch (XML).
#[derive(Debug, Clone)]
pub struct PubMedClient {
    client: HttpClient,
    config: PubMedConfig,
}

impl PubMedClient {
    /// Create a client for the given endpoints with a default HTTP client
    pub fn new(config: PubMedConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: HttpClient::new()?,
            config,
        })
    }

    /// Create a client from the full application configuration
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: HttpClient::from_config(&config.http)?,
            config: config.pubmed.clone(),
        })
    }

    /// Endpoint configuration in use
    pub fn config(&self) -> &PubMedConfig {
        &self.config
    }

    /// Build ESearch query string for an affiliation search
    fn build_search_url(&self, query: &AffiliationQuery, window: &DateWindow) -> String {
        let mut params = vec![
            ("db", "pubmed".to_string()),
            ("term", query.term()),
            ("retmax", query.max_results.to_string()),
            ("retmode", "json".to_string()),
            ("datetype", "pdat".to_string()),
            ("mindate", window.min_date()),
            ("maxdate", window.max_date()),
            ("usehistory", "y".to_string()),
        ];
        if let Some(key) = &self.config.api_key {
            params.push(("api_key", key.clone()));
        }

        format!("{}?{}", self.config.search_url, encode_params(&params))
    }

    /// Build EFetch URL for one identifier
    fn build_fetch_url(&self, id: &str) -> String {
        let mut params = vec![
            ("db", "pubmed".to_string()),
            ("id", id.to_string()),
            ("retmode", "xml".to_string()),
        ];
        if let Some(key) = &self.config.api_key {
            params.push(("api_key", key.clone()));
        }

        format!("{}?{}", self.config.fetch_url, encode_params(&params))
    }

    /// Parse ESearch JSON into the identifier list
    fn parse_search_response(json: &str) -> Result<Vec<Identifier>, SearchError> {
        #[derive(Debug, Deserialize)]
        struct ESearchResponse {
            esearchresult: Option<ESearchResult>,
            error: Option<String>,
        }

        #[derive(Debug, Deserialize)]
        struct ESearchResult {
            #[serde(default)]
            idlist: Vec<String>,
            #[serde(rename = "ERROR")]
            error: Option<String>,
        }

        let response: ESearchResponse = serde_json::from_str(json)?;

        if let Some(error) = response.error {
            return Err(SearchError::Api(error));
        }

        let result = response
            .esearchresult
            .ok_or_else(|| SearchError::Parse("missing esearchresult".to_string()))?;

        if let Some(error) = result.error {
            return Err(SearchError::Api(error));
        }

        Ok(result.idlist)
    }
}

fn encode_params(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

#[async_trait]
impl IdentifierSearch for PubMedClient {
    async fn search_ids(&self, query: &AffiliationQuery) -> Result<Vec<Identifier>, SearchError> {
        if query.cleaned_affiliation().is_empty() {
            return Err(SearchError::InvalidQuery(
                "affiliation must not be empty".to_string(),
            ));
        }

        let url = self.build_search_url(query, &query.date_window());
        tracing::debug!(term = %query.term(), weeks = query.window_weeks, "Searching PubMed");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SearchError::Network(format!("Failed to search PubMed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SearchError::Api(format!(
                "PubMed API returned status: {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Network(format!("Failed to read response: {}", e)))?;

        let ids = Self::parse_search_response(&body)?;
        tracing::debug!(count = ids.len(), "PubMed search returned identifiers");
        Ok(ids)
    }
}

#[async_trait]
impl RecordFetcher for PubMedClient {
    async fn fetch(&self, id: &str) -> Result<PublicationRecord, FetchError> {
        let url = self.build_fetch_url(id);
        tracing::debug!(pmid = id, "Fetching PubMed record");

        let response = self.client.get(&url).send().await.map_err(|e| {
            FetchError::RequestFailed(format!("Failed to fetch PMID {}: {}", id, e))
        })?;

        if !response.status().is_success() {
            return Err(FetchError::RequestFailed(format!(
                "PubMed API returned status: {}",
                response.status()
            )));
        }

        let xml = response
            .text()
            .await
            .map_err(|e| FetchError::RequestFailed(format!("Failed to read response: {}", e)))?;

        parse_record(&xml, id)
    }
}

/// Elements read as plain text even when PubMed nests markup inside them
/// (`<i>`, `<sup>`, MathML and so on)
const TEXT_FIELDS: &[&[u8]] = &[
    b"ArticleTitle",
    b"Affiliation",
    b"Title",
    b"ISOAbbreviation",
    b"LastName",
    b"ForeName",
    b"CollectiveName",
];

fn parse_failed(e: impl std::fmt::Display) -> FetchError {
    FetchError::ParseFailed(format!("XML: {}", e))
}

/// Rewrite `xml` so every [`TEXT_FIELDS`] element holds a single text node
/// with the concatenated text of all its descendants.
fn flatten_text_fields(xml: &str) -> Result<String, FetchError> {
    struct OpenField {
        depth: usize,
        text: String,
    }

    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut open: Option<OpenField> = None;

    loop {
        let event = reader.read_event().map_err(parse_failed)?;

        if let Some(field) = open.as_mut() {
            match event {
                Event::Start(_) => field.depth += 1,
                Event::End(end) if field.depth == 0 => {
                    let text = std::mem::take(&mut field.text);
                    open = None;
                    writer
                        .write_event(Event::Text(BytesText::new(&text)))
                        .map_err(parse_failed)?;
                    writer.write_event(Event::End(end)).map_err(parse_failed)?;
                }
                Event::End(_) => field.depth -= 1,
                Event::Text(t) => match t.unescape() {
                    Ok(text) => field.text.push_str(&text),
                    Err(_) => field.text.push_str(&String::from_utf8_lossy(&t)),
                },
                Event::CData(c) => field.text.push_str(&String::from_utf8_lossy(&c)),
                Event::Eof => break,
                _ => {}
            }
            continue;
        }

        match event {
            Event::Eof => break,
            Event::Start(start) => {
                if TEXT_FIELDS.iter().any(|field| *field == start.name().as_ref()) {
                    open = Some(OpenField {
                        depth: 0,
                        text: String::new(),
                    });
                }
                writer.write_event(Event::Start(start)).map_err(parse_failed)?;
            }
            other => writer.write_event(other).map_err(parse_failed)?,
        }
    }

    String::from_utf8(writer.into_inner()).map_err(parse_failed)
}

/// Parse one EFetch payload into a record.
///
/// The first `PubmedArticle` is mapped; a payload without one is a
/// [`FetchError::ParseFailed`]. Missing fields fall back to documented
/// defaults instead of failing:
///
/// - title: `ArticleTitle`, else `"No title available"`
/// - journal: `Journal/Title`, else `Journal/ISOAbbreviation`, else `"Journal not specified"`
/// - authors: `"LastName ForeName"` or `CollectiveName`, one entry per `Author`
/// - affiliations: the author's `AffiliationInfo/Affiliation` texts joined with `"; "`,
///   or `""`
/// - doi: `ArticleId[@IdType="doi"]`, else `ELocationID[@EIdType="doi"]`, else none
/// - pmid: `MedlineCitation/PMID`, else `requested_id`
pub fn parse_record(xml: &str, requested_id: &str) -> Result<PublicationRecord, FetchError> {
    #[derive(Debug, Deserialize)]
    struct PubmedArticleSet {
        #[serde(rename = "PubmedArticle", default)]
        articles: Vec<PubmedArticle>,
    }

    #[derive(Debug, Deserialize)]
    #[allow(non_snake_case)]
    struct PubmedArticle {
        MedlineCitation: Option<MedlineCitation>,
        PubmedData: Option<PubmedData>,
    }

    #[derive(Debug, Deserialize)]
    #[allow(non_snake_case)]
    struct MedlineCitation {
        PMID: Option<Text>,
        Article: Option<Article>,
    }

    #[derive(Debug, Deserialize)]
    #[allow(non_snake_case)]
    struct Article {
        Journal: Option<Journal>,
        ArticleTitle: Option<Text>,
        #[serde(rename = "ELocationID", default)]
        elocation_ids: Vec<ELocationId>,
        AuthorList: Option<AuthorList>,
    }

    #[derive(Debug, Deserialize)]
    #[allow(non_snake_case)]
    struct Journal {
        Title: Option<Text>,
        ISOAbbreviation: Option<Text>,
    }

    #[derive(Debug, Deserialize)]
    struct ELocationId {
        #[serde(rename = "@EIdType", default)]
        id_type: String,
        #[serde(rename = "$text", default)]
        value: String,
    }

    #[derive(Debug, Deserialize)]
    struct AuthorList {
        #[serde(rename = "Author", default)]
        authors: Vec<Author>,
    }

    #[derive(Debug, Deserialize)]
    #[allow(non_snake_case)]
    struct Author {
        LastName: Option<Text>,
        ForeName: Option<Text>,
        CollectiveName: Option<Text>,
        #[serde(rename = "AffiliationInfo", default)]
        affiliation_info: Vec<AffiliationInfo>,
    }

    #[derive(Debug, Deserialize)]
    #[allow(non_snake_case)]
    struct AffiliationInfo {
        Affiliation: Option<Text>,
    }

    #[derive(Debug, Deserialize)]
    #[allow(non_snake_case)]
    struct PubmedData {
        ArticleIdList: Option<ArticleIdList>,
    }

    #[derive(Debug, Deserialize)]
    struct ArticleIdList {
        #[serde(rename = "ArticleId", default)]
        ids: Vec<ArticleId>,
    }

    #[derive(Debug, Deserialize)]
    struct ArticleId {
        #[serde(rename = "@IdType", default)]
        id_type: String,
        #[serde(rename = "$text", default)]
        value: String,
    }

    #[derive(Debug, Deserialize)]
    struct Text {
        #[serde(rename = "$text", default)]
        value: String,
    }

    impl Text {
        fn trimmed(&self) -> &str {
            self.value.trim()
        }
    }

    let xml = flatten_text_fields(xml)?;
    let set: PubmedArticleSet = from_str(&xml)?;

    let article = set
        .articles
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::ParseFailed("no PubmedArticle element".to_string()))?;

    let citation = article.MedlineCitation.as_ref();
    let details = citation.and_then(|m| m.Article.as_ref());

    let pmid = citation
        .and_then(|m| m.PMID.as_ref())
        .map(|p| p.trimmed())
        .filter(|p| !p.is_empty())
        .unwrap_or(requested_id);

    let mut builder = PublicationBuilder::new(pmid);

    if let Some(title) = details.and_then(|a| a.ArticleTitle.as_ref()) {
        builder = builder.title(title.trimmed());
    }

    let journal = details.and_then(|a| a.Journal.as_ref()).and_then(|j| {
        j.Title
            .as_ref()
            .map(Text::trimmed)
            .filter(|t| !t.is_empty())
            .or_else(|| j.ISOAbbreviation.as_ref().map(Text::trimmed))
    });
    if let Some(journal) = journal {
        builder = builder.journal(journal);
    }

    let authors = details
        .and_then(|a| a.AuthorList.as_ref())
        .map(|l| l.authors.as_slice())
        .unwrap_or_default();
    for author in authors {
        let name = match &author.CollectiveName {
            Some(collective) => collective.trimmed().to_string(),
            None => {
                let last = author.LastName.as_ref().map(Text::trimmed).unwrap_or("");
                let fore = author.ForeName.as_ref().map(Text::trimmed).unwrap_or("");
                format!("{} {}", last, fore).trim().to_string()
            }
        };
        let affiliation = author
            .affiliation_info
            .iter()
            .filter_map(|info| info.Affiliation.as_ref())
            .map(Text::trimmed)
            .filter(|a| !a.is_empty())
            .collect::<Vec<_>>()
            .join("; ");
        builder = builder.author(name, affiliation);
    }

    let doi = article
        .PubmedData
        .as_ref()
        .and_then(|pd| pd.ArticleIdList.as_ref())
        .and_then(|l| l.ids.iter().find(|id| id.id_type == "doi"))
        .map(|id| id.value.trim())
        .or_else(|| {
            details
                .and_then(|a| a.elocation_ids.iter().find(|e| e.id_type == "doi"))
                .map(|e| e.value.trim())
        });
    if let Some(doi) = doi {
        builder = builder.doi(doi);
    }

    Ok(builder.build())
}
