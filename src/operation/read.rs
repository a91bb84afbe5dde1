use crate::compiler::ExpressionBuiltResult;
use crate::errors::DbError;
use crate::store::{FindResponse, StoreSession};

/// Pages through the documents selected by a compiled expression set. The
/// alternative expressions (one per fanned-out id value) are walked in order,
/// so selection order is deterministic; the continuation token is composite,
/// `"{expression_index}:{store_state}"`.
#[derive(Debug, Clone)]
pub struct FindReader<'a> {
    result: &'a ExpressionBuiltResult,
    page_size: usize,
}

impl<'a> FindReader<'a> {
    #[must_use]
    pub fn new(result: &'a ExpressionBuiltResult, page_size: usize) -> Self {
        Self { result, page_size }
    }

    pub async fn next_page<S: StoreSession>(
        &self,
        session: &S,
        paging_state: Option<&str>,
    ) -> Result<FindResponse, DbError> {
        let Some(expressions) = &self.result.expressions else {
            return Ok(FindResponse::default());
        };
        let (mut index, mut inner) = parse_paging_state(paging_state)?;
        let mut docs = Vec::new();
        while index < expressions.len() && docs.len() < self.page_size {
            let page = session
                .select(
                    &expressions[index],
                    self.result.allow_filtering,
                    inner.as_deref(),
                    self.page_size - docs.len(),
                )
                .await?;
            docs.extend(page.docs);
            match page.paging_state {
                Some(state) => inner = Some(state),
                None => {
                    index += 1;
                    inner = None;
                }
            }
        }
        let paging_state = if index < expressions.len() {
            Some(format!("{index}:{}", inner.unwrap_or_default()))
        } else {
            None
        };
        Ok(FindResponse { docs, paging_state })
    }
}

fn parse_paging_state(state: Option<&str>) -> Result<(usize, Option<String>), DbError> {
    let Some(state) = state else {
        return Ok((0, None));
    };
    let (index, inner) = state
        .split_once(':')
        .ok_or_else(|| DbError::StoreError(format!("malformed paging state '{state}'")))?;
    let index = index
        .parse::<usize>()
        .map_err(|_| DbError::StoreError(format!("malformed paging state '{state}'")))?;
    let inner = if inner.is_empty() { None } else { Some(inner.to_string()) };
    Ok((index, inner))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_state_round_trips() {
        assert_eq!(parse_paging_state(None).unwrap(), (0, None));
        assert_eq!(parse_paging_state(Some("2:")).unwrap(), (2, None));
        assert_eq!(
            parse_paging_state(Some("1:abc")).unwrap(),
            (1, Some("abc".to_string()))
        );
        assert!(parse_paging_state(Some("nope")).is_err());
        assert!(parse_paging_state(Some("x:abc")).is_err());
    }
}
