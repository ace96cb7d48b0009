use anyhow::{anyhow, Context, Result};
use log::debug;
use serde::Deserialize;

use crate::logic::semantic::{ask_query, StatementChanges};
use crate::model::{Statement, ValidationMessage};
use crate::store::traits::SemanticStore;

const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";

/// Semantic store behind SPARQL 1.1 query and update endpoints
#[derive(Debug, Clone)]
pub struct SparqlEndpointStore {
    client: reqwest::Client,
    query_endpoint: String,
    update_endpoint: String,
}

#[derive(Deserialize)]
struct AskResponse {
    boolean: bool,
}

impl SparqlEndpointStore {
    pub fn new(query_endpoint: impl Into<String>, update_endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            query_endpoint: query_endpoint.into(),
            update_endpoint: update_endpoint.into(),
        }
    }

    async fn ask(&self, statement: &Statement) -> Result<bool> {
        let query = ask_query(statement)?;
        let response = self
            .client
            .post(&self.query_endpoint)
            .header("accept", SPARQL_RESULTS_JSON)
            .form(&[("query", query.as_str())])
            .send()
            .await
            .context("Failed to send SPARQL ASK query")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("SPARQL query endpoint error {}: {}", status, body));
        }

        let answer: AskResponse = response
            .json()
            .await
            .context("Failed to parse SPARQL ASK response")?;
        Ok(answer.boolean)
    }
}

#[async_trait::async_trait]
impl SemanticStore for SparqlEndpointStore {
    async fn save_changes(&self, adds: &[Statement], removes: &[Statement]) -> Result<()> {
        let changes = StatementChanges {
            adds: adds.to_vec(),
            removes: removes.to_vec(),
        };
        if changes.is_empty() {
            return Ok(());
        }

        let update = changes.to_sparql_update()?;
        debug!("SPARQL update: {}", update);
        let response = self
            .client
            .post(&self.update_endpoint)
            .form(&[("update", update.as_str())])
            .send()
            .await
            .context("Failed to send SPARQL update")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("SPARQL update endpoint error {}: {}", status, body));
        }
        Ok(())
    }

    async fn validate_database_state(&self, removes: &[Statement]) -> Result<Vec<ValidationMessage>> {
        let mut messages = Vec::new();
        for statement in removes {
            if !self.ask(statement).await? {
                messages.push(ValidationMessage::error(
                    statement.subject.clone(),
                    format!("Expected statement is missing from the database: {}", statement),
                ));
            }
        }
        Ok(messages)
    }
}
