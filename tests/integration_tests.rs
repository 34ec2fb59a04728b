//! Integration tests for medfetch
//!
//! These tests drive the PubMed client, batch fetcher and pipeline against a
//! local mock server.

use medfetch::config::PubMedConfig;
use medfetch::sources::{FetchError, IdentifierSearch, PubMedClient, RecordFetcher, SearchError};
use medfetch::{search_affiliation, AffiliationQuery, BatchConfig, BatchFetcher, SearchOutcome};
use mockito::{Matcher, Server, ServerGuard};
use std::sync::Arc;

fn article(pmid: &str, author: (&str, &str), affiliation: &str, doi: Option<&str>) -> String {
    let doi = doi
        .map(|d| format!(r#"<ArticleId IdType="doi">{}</ArticleId>"#, d))
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" ?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation Status="MEDLINE" Owner="NLM">
      <PMID Version="1">{pmid}</PMID>
      <Article PubModel="Print">
        <Journal>
          <Title>Journal of Integration</Title>
        </Journal>
        <ArticleTitle>Study {pmid}</ArticleTitle>
        <AuthorList CompleteYN="Y">
          <Author ValidYN="Y">
            <LastName>{last}</LastName>
            <ForeName>{fore}</ForeName>
            <AffiliationInfo>
              <Affiliation>{affiliation}</Affiliation>
            </AffiliationInfo>
          </Author>
        </AuthorList>
      </Article>
    </MedlineCitation>
    <PubmedData>
      <ArticleIdList>
        <ArticleId IdType="pubmed">{pmid}</ArticleId>
        {doi}
      </ArticleIdList>
    </PubmedData>
  </PubmedArticle>
</PubmedArticleSet>"#,
        pmid = pmid,
        last = author.0,
        fore = author.1,
        affiliation = affiliation,
        doi = doi,
    )
}

fn client_for(server: &ServerGuard, api_key: Option<&str>) -> PubMedClient {
    let config = PubMedConfig {
        search_url: format!("{}/esearch.fcgi", server.url()),
        fetch_url: format!("{}/efetch.fcgi", server.url()),
        api_key: api_key.map(str::to_string),
        ..PubMedConfig::default()
    };
    PubMedClient::new(config).unwrap()
}

#[tokio::test]
async fn test_search_sends_affiliation_term() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("db".into(), "pubmed".into()),
            Matcher::UrlEncoded("term".into(), "\"MIT\"[Affiliation]".into()),
            Matcher::UrlEncoded("retmode".into(), "json".into()),
            Matcher::UrlEncoded("retmax".into(), "25".into()),
            Matcher::UrlEncoded("datetype".into(), "pdat".into()),
            Matcher::UrlEncoded("usehistory".into(), "y".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"esearchresult":{"count":"2","idlist":["101","102"]}}"#)
        .create_async()
        .await;

    let client = client_for(&server, None);
    let query = AffiliationQuery::new("\"MIT\"").max_results(25);
    let ids = client.search_ids(&query).await.unwrap();

    assert_eq!(ids, vec!["101", "102"]);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_search_http_error_is_api_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::Any)
        .with_status(503)
        .create_async()
        .await;

    let client = client_for(&server, None);
    let result = client.search_ids(&AffiliationQuery::new("MIT")).await;

    assert!(matches!(result, Err(SearchError::Api(_))));
}

#[tokio::test]
async fn test_blank_affiliation_is_rejected_before_request() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let client = client_for(&server, None);
    let result = client.search_ids(&AffiliationQuery::new(" \"\" ")).await;

    assert!(matches!(result, Err(SearchError::InvalidQuery(_))));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_fetch_parses_record_and_sends_api_key() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/efetch.fcgi")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("db".into(), "pubmed".into()),
            Matcher::UrlEncoded("id".into(), "101".into()),
            Matcher::UrlEncoded("retmode".into(), "xml".into()),
            Matcher::UrlEncoded("api_key".into(), "secret".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "text/xml")
        .with_body(article(
            "101",
            ("Smith", "John"),
            "MIT CSAIL, Cambridge, MA",
            Some("10.1000/xyz"),
        ))
        .create_async()
        .await;

    let client = client_for(&server, Some("secret"));
    let record = client.fetch("101").await.unwrap();

    assert_eq!(record.pmid, "101");
    assert_eq!(record.title, "Study 101");
    assert_eq!(record.journal, "Journal of Integration");
    assert_eq!(record.authors, vec!["Smith John"]);
    assert_eq!(record.affiliations, vec!["MIT CSAIL, Cambridge, MA"]);
    assert_eq!(record.doi.as_deref(), Some("10.1000/xyz"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_fetch_server_error_is_request_failed() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/efetch.fcgi")
        .match_query(Matcher::Any)
        .with_status(500)
        .create_async()
        .await;

    let client = client_for(&server, None);
    let result = client.fetch("101").await;

    assert!(matches!(result, Err(FetchError::RequestFailed(_))));
}

#[tokio::test]
async fn test_fetch_empty_article_set_is_parse_failure() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/efetch.fcgi")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<PubmedArticleSet></PubmedArticleSet>")
        .create_async()
        .await;

    let client = client_for(&server, None);
    let result = client.fetch("999").await;

    assert!(matches!(result, Err(FetchError::ParseFailed(_))));
}

#[tokio::test]
async fn test_search_affiliation_end_to_end() {
    let mut server = Server::new_async().await;
    let _search = server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::UrlEncoded(
            "term".into(),
            "\"MIT, Cambridge\"[Affiliation]".into(),
        ))
        .with_status(200)
        .with_body(r#"{"esearchresult":{"idlist":["201","202","203"]}}"#)
        .create_async()
        .await;
    let _matching = server
        .mock("GET", "/efetch.fcgi")
        .match_query(Matcher::UrlEncoded("id".into(), "201".into()))
        .with_status(200)
        .with_body(article("201", ("Smith", "John"), "MIT CSAIL", None))
        .create_async()
        .await;
    let _other = server
        .mock("GET", "/efetch.fcgi")
        .match_query(Matcher::UrlEncoded("id".into(), "202".into()))
        .with_status(200)
        .with_body(article("202", ("Lee", "Ann"), "Stanford University", None))
        .create_async()
        .await;
    let _failing = server
        .mock("GET", "/efetch.fcgi")
        .match_query(Matcher::UrlEncoded("id".into(), "203".into()))
        .with_status(500)
        .create_async()
        .await;

    let client = Arc::new(client_for(&server, None));
    let batch = BatchFetcher::new(Arc::clone(&client), BatchConfig::new(2, 0));
    let query = AffiliationQuery::new("MIT, Cambridge");

    let outcome = search_affiliation(client.as_ref(), &batch, &query)
        .await
        .unwrap();

    match outcome {
        SearchOutcome::Matches {
            found,
            publications,
        } => {
            assert_eq!(found, 3);
            assert_eq!(publications.len(), 1);
            assert_eq!(publications[0].record.pmid, "201");
            assert_eq!(publications[0].matched_authors, vec!["Smith John"]);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_batch_isolates_failures_over_http() {
    let mut server = Server::new_async().await;
    for id in ["301", "302", "304"] {
        server
            .mock("GET", "/efetch.fcgi")
            .match_query(Matcher::UrlEncoded("id".into(), id.into()))
            .with_status(200)
            .with_body(article(id, ("Doe", "Jane"), "Karolinska Institutet", None))
            .create_async()
            .await;
    }
    server
        .mock("GET", "/efetch.fcgi")
        .match_query(Matcher::UrlEncoded("id".into(), "303".into()))
        .with_status(404)
        .create_async()
        .await;

    let batch = BatchFetcher::new(client_for(&server, None), BatchConfig::new(3, 5));
    let ids: Vec<String> = ["301", "302", "303", "304"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let result = batch.fetch_all(&ids).await;

    assert_eq!(result.len(), 3);
    assert_eq!(result.failed, vec!["303"]);
    assert!(!result.cancelled);
    let mut pmids: Vec<_> = result.records.iter().map(|r| r.pmid.as_str()).collect();
    pmids.sort();
    assert_eq!(pmids, vec!["301", "302", "304"]);
}

#[tokio::test]
async fn test_no_identifiers_skips_fetching() {
    let mut server = Server::new_async().await;
    let _search = server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"esearchresult":{"count":"0","idlist":[]}}"#)
        .create_async()
        .await;
    let fetch = server
        .mock("GET", "/efetch.fcgi")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let client = Arc::new(client_for(&server, None));
    let batch = BatchFetcher::new(Arc::clone(&client), BatchConfig::default());

    let outcome = search_affiliation(client.as_ref(), &batch, &AffiliationQuery::new("Nowhere"))
        .await
        .unwrap();

    assert_eq!(outcome, SearchOutcome::NoResults);
    fetch.assert_async().await;
}
