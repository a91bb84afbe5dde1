use crate::compiler::{IdConstraint, build_expressions, upsert_seed};
use crate::config::OperationsConfig;
use crate::errors::DbError;
use crate::filter::{DOC_ID_FIELD, DocumentId};
use crate::matcher::ResolvedExpression;
use crate::operation::read::FindReader;
use crate::store::{DocumentShredder, ReadDocument, StoreSession};
use crate::update::{DocumentUpdater, TargetLocator};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Per-command parameters of the read-modify-write engine.
#[derive(Debug, Clone)]
pub struct UpdateSettings {
    /// Maximum number of documents to modify in one command.
    pub update_limit: usize,
    /// Maximum re-read and reapply attempts per document on write conflict.
    pub retry_limit: usize,
    pub upsert: bool,
    pub return_document_in_response: bool,
    /// When returning documents, return the post-update version instead of
    /// the version observed at read time.
    pub return_updated_document: bool,
    pub page_size: usize,
    pub max_concurrency: usize,
}

impl UpdateSettings {
    #[must_use]
    pub fn from_config(config: &OperationsConfig) -> Self {
        Self {
            update_limit: config.default_update_limit,
            retry_limit: config.default_retry_limit,
            upsert: false,
            return_document_in_response: false,
            return_updated_document: false,
            page_size: config.default_page_size,
            max_concurrency: config.max_update_concurrency,
        }
    }
}

/// Outcome for one processed document. A populated `error` reports a
/// per-document failure that did not affect sibling documents.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatedDocument {
    pub id: DocumentId,
    pub upserted: bool,
    pub document: Option<Value>,
    pub error: Option<String>,
}

/// Aggregate result of one read-modify-write command.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOperationPage {
    pub matched_count: usize,
    pub modified_count: usize,
    pub updated: Vec<UpdatedDocument>,
    pub return_document_in_response: bool,
    pub more_data: bool,
}

struct DocumentOutcome {
    updated: UpdatedDocument,
    wrote: bool,
}

impl DocumentOutcome {
    fn failed(id: DocumentId, upserted: bool, error: DbError) -> Self {
        Self {
            updated: UpdatedDocument {
                id,
                upserted,
                document: None,
                error: Some(error.to_string()),
            },
            wrote: false,
        }
    }
}

/// Pages through the documents matched by a resolved filter, applies the
/// update pipeline to each, and writes every modified document back under
/// optimistic concurrency: the conditional write carries the transaction
/// token observed at read time and is retried after a re-read on conflict, up
/// to `retry_limit` times. Conflict exhaustion and update-operator failures
/// are isolated to the affected document; store transport failures abort the
/// whole command.
pub struct ReadAndUpdateOperation<'a, S, H> {
    session: &'a S,
    shredder: &'a H,
    resolved: &'a ResolvedExpression,
    updater: &'a DocumentUpdater,
    settings: UpdateSettings,
}

impl<'a, S: StoreSession, H: DocumentShredder> ReadAndUpdateOperation<'a, S, H> {
    pub fn new(
        session: &'a S,
        shredder: &'a H,
        resolved: &'a ResolvedExpression,
        updater: &'a DocumentUpdater,
        settings: UpdateSettings,
    ) -> Self {
        Self { session, shredder, resolved, updater, settings }
    }

    pub async fn execute(&self) -> Result<UpdateOperationPage, DbError> {
        let compiled = build_expressions(self.resolved, None)?;
        let reader = FindReader::new(&compiled, self.settings.page_size);

        // paging is sequential; one extra document beyond the limit proves
        // whether more data remains
        let mut candidates: Vec<ReadDocument> = Vec::new();
        let mut paging_state: Option<String> = None;
        loop {
            let page = reader.next_page(self.session, paging_state.as_deref()).await?;
            candidates.extend(page.docs);
            if candidates.len() > self.settings.update_limit {
                break;
            }
            match page.paging_state {
                Some(state) => paging_state = Some(state),
                None => break,
            }
        }
        let more_data = candidates.len() > self.settings.update_limit;
        candidates.truncate(self.settings.update_limit);
        let matched_count = candidates.len();

        let mut upserted = false;
        if candidates.is_empty() && self.settings.upsert {
            candidates.push(self.synthesize_document()?);
            upserted = true;
        }

        let outcomes: Vec<DocumentOutcome> = stream::iter(
            candidates.into_iter().map(|doc| self.update_document(doc, upserted)),
        )
        .buffered(self.settings.max_concurrency.max(1))
        .try_collect()
        .await?;

        let modified_count =
            outcomes.iter().filter(|o| o.wrote && !o.updated.upserted).count();
        let updated = outcomes.into_iter().map(|o| o.updated).collect();
        Ok(UpdateOperationPage {
            matched_count,
            modified_count,
            updated,
            return_document_in_response: self.settings.return_document_in_response,
            more_data,
        })
    }

    /// Seeds a synthetic new document from the filter's conjunctive equality
    /// constraints. An id is generated when the filter carries none.
    fn synthesize_document(&self) -> Result<ReadDocument, DbError> {
        let mut document = Value::Object(Map::new());
        let mut id: Option<DocumentId> = None;
        for (path, value) in upsert_seed(self.resolved) {
            if path == DOC_ID_FIELD {
                id = Some(DocumentId::from_json(&value)?);
            }
            let target = TargetLocator::parse(&path)?;
            if let Some((parent, leaf)) = target.locate_parent(&mut document, true)? {
                parent.insert(leaf.to_string(), value);
            }
        }
        let id = match id {
            Some(id) => id,
            None => {
                let generated = DocumentId::String(Uuid::new_v4().to_string());
                if let Value::Object(map) = &mut document {
                    map.insert(DOC_ID_FIELD.to_string(), generated.to_json());
                }
                generated
            }
        };
        Ok(ReadDocument { id, tx_id: None, document })
    }

    /// The per-document state machine: apply, conditionally write, and on a
    /// compare-and-swap miss re-read this document and try again.
    async fn update_document(
        &self,
        candidate: ReadDocument,
        upserted: bool,
    ) -> Result<DocumentOutcome, DbError> {
        let id = candidate.id.clone();
        let mut current = candidate;
        for attempt in 0..=self.settings.retry_limit {
            let is_new = current.tx_id.is_none();
            let (updated_doc, modified) =
                match self.updater.apply_updates(current.document.clone(), is_new) {
                    Ok(result) => result,
                    Err(err) => return Ok(DocumentOutcome::failed(id, upserted, err)),
                };
            if !modified && !is_new {
                return Ok(DocumentOutcome {
                    updated: UpdatedDocument {
                        id,
                        upserted,
                        document: self.response_document(current.document, updated_doc),
                        error: None,
                    },
                    wrote: false,
                });
            }
            let shredded = match self.shredder.shred(&id, &updated_doc, Uuid::new_v4()) {
                Ok(shredded) => shredded,
                Err(err) => return Ok(DocumentOutcome::failed(id, upserted, err)),
            };
            let applied = self.session.write_conditional(&shredded, current.tx_id).await?;
            if applied {
                return Ok(DocumentOutcome {
                    updated: UpdatedDocument {
                        id,
                        upserted,
                        document: self.response_document(current.document, updated_doc),
                        error: None,
                    },
                    wrote: true,
                });
            }
            if attempt == self.settings.retry_limit {
                break;
            }
            log::debug!("conditional write conflict for {id}, re-reading (attempt {})", attempt + 1);
            match self.read_again(&id).await? {
                Some(fresh) => current = fresh,
                None => {
                    // the document vanished or stopped matching the filter
                    return Ok(DocumentOutcome::failed(id, upserted, DbError::ConcurrencyFailure));
                }
            }
        }
        Ok(DocumentOutcome::failed(
            id,
            upserted,
            DbError::RetryExhausted(self.settings.retry_limit),
        ))
    }

    /// Targeted re-read of one document, keeping the filter's non-id
    /// constraints and overriding its id constraint.
    async fn read_again(&self, id: &DocumentId) -> Result<Option<ReadDocument>, DbError> {
        let compiled =
            build_expressions(self.resolved, Some(IdConstraint::eq(id.clone())))?;
        let reader = FindReader::new(&compiled, 1);
        let page = reader.next_page(self.session, None).await?;
        Ok(page.docs.into_iter().next())
    }

    fn response_document(&self, before: Value, after: Value) -> Option<Value> {
        if !self.settings.return_document_in_response {
            return None;
        }
        Some(if self.settings.return_updated_document { after } else { before })
    }
}
