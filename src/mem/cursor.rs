use std::sync::Arc;

use bson::Document;
use parking_lot::RwLock;

use crate::handle::StoreCursor;
use crate::types::{ReadPreference, SortSpec};

use super::eval;

/// Cursor over the in-memory record set. Shaping calls are recorded in the
/// collection's operation log in the order they arrive; the matching
/// records are fetched on rewind (or on the first advance) and iterated
/// from that snapshot.
pub(crate) struct MemCursor {
    records: Arc<RwLock<Vec<Document>>>,
    op_log: Arc<RwLock<Vec<String>>>,
    condition: Document,
    projection: Document,
    skip: u64,
    limit: u64,
    sort: Vec<SortSpec>,
    fetched: Option<Vec<Document>>,
    position: usize,
}

impl MemCursor {
    pub(crate) fn new(
        records: Arc<RwLock<Vec<Document>>>,
        op_log: Arc<RwLock<Vec<String>>>,
        condition: Document,
        projection: Document,
    ) -> Self {
        Self {
            records,
            op_log,
            condition,
            projection,
            skip: 0,
            limit: 0,
            sort: Vec::new(),
            fetched: None,
            position: 0,
        }
    }

    fn log(&self, entry: String) {
        self.op_log.write().push(entry);
    }

    fn fetch(&mut self) {
        let mut matched: Vec<Document> = {
            let records = self.records.read();
            records.iter().filter(|r| eval::matches(r, &self.condition)).cloned().collect()
        };

        if !self.sort.is_empty() {
            matched.sort_by(|a, b| eval::compare_records(a, b, &self.sort));
        }

        let skip = usize::try_from(self.skip).unwrap_or(usize::MAX);
        let mut matched =
            if skip >= matched.len() { Vec::new() } else { matched.split_off(skip) };
        if self.limit > 0 {
            matched.truncate(usize::try_from(self.limit).unwrap_or(usize::MAX));
        }

        for record in &mut matched {
            *record = eval::project(record, &self.projection);
        }

        self.fetched = Some(matched);
        self.position = 0;
    }
}

impl StoreCursor for MemCursor {
    fn skip(&mut self, n: u64) {
        self.log(format!("skip({n})"));
        if self.fetched.is_none() {
            self.skip = n;
        }
    }

    fn limit(&mut self, n: u64) {
        self.log(format!("limit({n})"));
        if self.fetched.is_none() {
            self.limit = n;
        }
    }

    fn sort(&mut self, sort: &[SortSpec]) {
        let fields: Vec<&str> = sort.iter().map(|s| s.field.as_str()).collect();
        self.log(format!("sort({})", fields.join(",")));
        if self.fetched.is_none() {
            self.sort = sort.to_vec();
        }
    }

    fn set_read_preference(&mut self, preference: ReadPreference, _tags: Option<&[Document]>) {
        self.log(format!("read_preference({preference:?})"));
    }

    fn rewind(&mut self) {
        self.log("rewind".into());
        self.fetch();
    }

    fn advance(&mut self) -> Option<Document> {
        if self.fetched.is_none() {
            self.fetch();
        }
        let fetched = self.fetched.as_ref()?;
        let record = fetched.get(self.position)?.clone();
        self.position += 1;
        Some(record)
    }
}
