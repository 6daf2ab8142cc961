use std::sync::Arc;

use bson::{Bson, Document, doc, oid::ObjectId};
use rand::Rng;
use serde::de::DeserializeOwned;

use crate::errors::Error;
use crate::expression::Expression;
use crate::handle::{CollectionHandle, FindAndModifyOptions};
use crate::operator::Operator;
use crate::query::cursor::Cursor;
use crate::query::paginator::Paginator;
use crate::types::{ReadPreference, SortSpec, TagSet, sort_document};

/// Accumulates conditions, projection, paging and read preferences, then
/// materializes a [`Cursor`] against the collection handle.
///
/// `M` is the decoded record type; `Query<bson::Document>` yields raw
/// records.
///
/// The cursor is memoized on first access: configuration applied after that
/// (skip, limit, sort, read preferences) is not retroactively applied to
/// the open cursor. Callers wanting the new shape must build a new query.
pub struct Query<M> {
    handle: Arc<dyn CollectionHandle>,
    expression: Expression,
    fields: Document,
    skip: u64,
    limit: u64,
    sort: Vec<SortSpec>,
    read_preferences: Vec<(ReadPreference, Option<TagSet>)>,
    cursor: Option<Cursor<M>>,
}

impl<M> Clone for Query<M> {
    /// Clones the configuration (expression, projection, skip, limit, sort,
    /// read preferences); a memoized cursor is not carried over.
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            expression: self.expression.clone(),
            fields: self.fields.clone(),
            skip: self.skip,
            limit: self.limit,
            sort: self.sort.clone(),
            read_preferences: self.read_preferences.clone(),
            cursor: None,
        }
    }
}

impl<M> std::fmt::Debug for Query<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("handle", &self.handle.name())
            .field("expression", &self.expression)
            .field("fields", &self.fields)
            .field("skip", &self.skip)
            .field("limit", &self.limit)
            .field("sort", &self.sort)
            .field("read_preferences", &self.read_preferences)
            .field("cursor_open", &self.cursor.is_some())
            .finish()
    }
}

impl<M> Query<M> {
    #[must_use]
    pub fn new(handle: Arc<dyn CollectionHandle>) -> Self {
        Self {
            handle,
            expression: Expression::new(),
            fields: Document::new(),
            skip: 0,
            limit: 0,
            sort: Vec::new(),
            read_preferences: Vec::new(),
            cursor: None,
        }
    }

    /// Replace the projection with an include-only spec.
    #[must_use]
    pub fn fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|f| ((*f).to_string(), Bson::Int32(1))).collect();
        self
    }

    /// Replace the projection with an exclude-only spec.
    #[must_use]
    pub fn skip_fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|f| ((*f).to_string(), Bson::Int32(0))).collect();
        self
    }

    /// Append one field to the include list. Mixing include and exclude
    /// entries is passed through uninterpreted; the store's own validation
    /// applies.
    #[must_use]
    pub fn field(mut self, field: &str) -> Self {
        self.fields.insert(field, 1_i32);
        self
    }

    /// Append one field to the exclude list.
    #[must_use]
    pub fn skip_field(mut self, field: &str) -> Self {
        self.fields.insert(field, 0_i32);
        self
    }

    /// Project a bounded window of an array field.
    #[must_use]
    pub fn slice(mut self, field: &str, limit: i64) -> Self {
        self.fields.insert(field, doc! { "$slice": limit });
        self
    }

    /// Project a bounded window of an array field, starting at `skip`.
    ///
    /// # Errors
    /// `InvalidArgument` when a nonzero skip is given without a limit.
    pub fn slice_spec(mut self, field: &str, limit: i64, skip: i64) -> Result<Self, Error> {
        if skip != 0 {
            if limit == 0 {
                return Err(Error::InvalidArgument(
                    "slice with an offset requires a limit".into(),
                ));
            }
            self.fields.insert(field, doc! { "$slice": [skip, limit] });
        } else {
            self.fields.insert(field, doc! { "$slice": limit });
        }
        Ok(self)
    }

    /// Merge the caller's expression into this query's condition,
    /// right-biased per field.
    #[must_use]
    pub fn query(mut self, expression: &Expression) -> Self {
        self.expression = self.expression.merge(expression);
        self
    }

    #[must_use]
    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    /// Condition the query on the canonical identifier. A literal that does
    /// not parse as an object id is used verbatim as the equality value;
    /// that typically yields a legitimate "no match" rather than a fault.
    #[must_use]
    pub fn by_id(mut self, id: &str) -> Self {
        self.expression = self.expression.where_eq("_id", normalize_id(id));
        self
    }

    /// Condition on a set of identifiers, each normalized as in
    /// [`by_id`](Query::by_id).
    #[must_use]
    pub fn by_id_list(mut self, ids: &[&str]) -> Self {
        let ids = ids.iter().map(|id| normalize_id(id)).collect();
        self.expression = self.expression.where_in("_id", ids);
        self
    }

    /// Number of records to skip. No effect on an already-materialized
    /// cursor.
    #[must_use]
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    /// Bound the result count; 0 means unbounded. No effect on an
    /// already-materialized cursor.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Bound the result count and set the skip offset in one call.
    #[must_use]
    pub fn limit_with_offset(mut self, limit: u64, offset: u64) -> Self {
        self.limit = limit;
        self.skip = offset;
        self
    }

    /// Result ordering. No effect on an already-materialized cursor.
    #[must_use]
    pub fn sort(mut self, sort: Vec<SortSpec>) -> Self {
        self.sort = sort;
        self
    }

    #[must_use]
    pub fn current_skip(&self) -> u64 {
        self.skip
    }

    #[must_use]
    pub fn current_limit(&self) -> u64 {
        self.limit
    }

    pub(crate) fn set_skip(&mut self, skip: u64) {
        self.skip = skip;
    }

    pub(crate) fn set_limit(&mut self, limit: u64) {
        self.limit = limit;
    }

    #[must_use]
    pub fn read_primary_only(self) -> Self {
        self.read_preference(ReadPreference::Primary, None)
    }

    #[must_use]
    pub fn read_primary_preferred(self, tags: Option<TagSet>) -> Self {
        self.read_preference(ReadPreference::PrimaryPreferred, tags)
    }

    #[must_use]
    pub fn read_secondary_only(self, tags: Option<TagSet>) -> Self {
        self.read_preference(ReadPreference::Secondary, tags)
    }

    #[must_use]
    pub fn read_secondary_preferred(self, tags: Option<TagSet>) -> Self {
        self.read_preference(ReadPreference::SecondaryPreferred, tags)
    }

    #[must_use]
    pub fn read_nearest(self, tags: Option<TagSet>) -> Self {
        self.read_preference(ReadPreference::Nearest, tags)
    }

    /// Append an entry to the ordered read-preference list, overwriting the
    /// tags of an already-recorded kind in place. Applied at cursor
    /// materialization, not immediately.
    #[must_use]
    pub fn read_preference(mut self, preference: ReadPreference, tags: Option<TagSet>) -> Self {
        if let Some(entry) = self.read_preferences.iter_mut().find(|(p, _)| *p == preference) {
            entry.1 = tags;
        } else {
            self.read_preferences.push((preference, tags));
        }
        self
    }

    /// The query's current condition document.
    #[must_use]
    pub fn to_document(&self) -> Document {
        self.expression.to_document()
    }
}

impl<M: DeserializeOwned> Query<M> {
    /// The memoized cursor, materialized on first access: the find is
    /// issued, then skip, limit and sort are applied in that fixed order
    /// (some store protocols apply shaping calls in issue order), the query
    /// is logged, the initial fetch happens, and accumulated read
    /// preferences are applied in insertion order.
    pub fn get_cursor(&mut self) -> &mut Cursor<M> {
        if self.cursor.is_none() {
            self.cursor = Some(self.materialize());
        }
        match self.cursor.as_mut() {
            Some(cursor) => cursor,
            None => unreachable!(),
        }
    }

    fn materialize(&self) -> Cursor<M> {
        let condition = self.expression.to_document();
        let mut store = self.handle.find(&condition, &self.fields);

        if self.skip > 0 {
            store.skip(self.skip);
        }
        if self.limit > 0 {
            store.limit(self.limit);
        }
        if !self.sort.is_empty() {
            store.sort(&self.sort);
        }

        let event = doc! {
            "collection": self.handle.name(),
            "query": condition,
            "project": self.fields.clone(),
            "sort": sort_document(&self.sort),
        };
        log::debug!(target: "docket::query", "{event}");

        store.rewind();

        for (preference, tags) in &self.read_preferences {
            store.set_read_preference(*preference, tags.as_deref());
        }

        Cursor::new(store)
    }

    /// Advance the memoized cursor by one record.
    pub fn next_record(&mut self) -> Option<Result<M, Error>> {
        self.get_cursor().next()
    }

    /// Count matching documents, ignoring skip and limit.
    ///
    /// # Errors
    /// Store-level failures propagate unmodified.
    pub fn count(&self) -> Result<u64, Error> {
        self.handle.count(&self.expression.to_document(), None, None)
    }

    /// Count matching documents, honoring the query's skip and limit.
    ///
    /// # Errors
    /// Store-level failures propagate unmodified.
    pub fn limited_count(&self) -> Result<u64, Error> {
        let limit = (self.limit > 0).then_some(self.limit);
        let skip = (self.skip > 0).then_some(self.skip);
        self.handle.count(&self.expression.to_document(), limit, skip)
    }

    /// Fetch a single record honoring condition and projection.
    ///
    /// # Errors
    /// Store-level failures and record decode failures.
    pub fn find_one(&self) -> Result<Option<M>, Error> {
        let record = self.handle.find_one(&self.expression.to_document(), &self.fields)?;
        record.map(|r| bson::deserialize_from_document(r).map_err(Error::from)).transpose()
    }

    /// Materialize the full iteration into an ordered collection.
    ///
    /// # Errors
    /// Store-level failures and record decode failures.
    pub fn find_all(&mut self) -> Result<Vec<M>, Error> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record() {
            records.push(record?);
        }
        Ok(records)
    }

    /// Atomically fetch and delete the first document matching condition
    /// and sort; returns the removed record.
    ///
    /// # Errors
    /// Store-level failures and record decode failures.
    pub fn find_and_remove(&self) -> Result<Option<M>, Error> {
        let options = FindAndModifyOptions {
            remove: true,
            sort: self.sort.clone(),
            ..FindAndModifyOptions::default()
        };
        let record = self.handle.find_and_modify(
            &self.expression.to_document(),
            None,
            &self.fields,
            &options,
        )?;
        record.map(|r| bson::deserialize_from_document(r).map_err(Error::from)).transpose()
    }

    /// Atomically apply `operator` to the first document matching condition
    /// and sort, returning the post-update record.
    ///
    /// # Errors
    /// Store-level failures and record decode failures.
    pub fn find_and_update(&self, operator: &Operator, upsert: bool) -> Result<Option<M>, Error> {
        let options = FindAndModifyOptions {
            new: true,
            upsert,
            sort: self.sort.clone(),
            ..FindAndModifyOptions::default()
        };
        let update = operator.to_document();
        let record = self.handle.find_and_modify(
            &self.expression.to_document(),
            Some(&update),
            &self.fields,
            &options,
        )?;
        record.map(|r| bson::deserialize_from_document(r).map_err(Error::from)).transpose()
    }

    /// Apply `f` over the iterated sequence, producing a result set keyed
    /// by record identifier.
    ///
    /// # Errors
    /// Store-level failures and record decode failures.
    pub fn map<T, F>(&mut self, mut f: F) -> Result<Vec<(String, T)>, Error>
    where
        F: FnMut(M) -> T,
    {
        let mut out = Vec::new();
        let cursor = self.get_cursor();
        while let Some(entry) = cursor.next_entry() {
            let (key, record) = entry?;
            out.push((key, f(record)));
        }
        Ok(out)
    }

    /// Keep the records `f` accepts, keyed by record identifier.
    ///
    /// # Errors
    /// Store-level failures and record decode failures.
    pub fn filter<F>(&mut self, mut f: F) -> Result<Vec<(String, M)>, Error>
    where
        F: FnMut(&M) -> bool,
    {
        let mut out = Vec::new();
        let cursor = self.get_cursor();
        while let Some(entry) = cursor.next_entry() {
            let (key, record) = entry?;
            if f(&record) {
                out.push((key, record));
            }
        }
        Ok(out)
    }

    /// One matching record picked uniformly by offset: skip is drawn from
    /// `[0, count-1]` and the limit set to 1.
    ///
    /// # Errors
    /// Store-level failures and record decode failures.
    pub fn find_random(&mut self) -> Result<Option<M>, Error> {
        let count = self.count()?;
        match count {
            0 => Ok(None),
            1 => self.find_one(),
            n => {
                self.skip = rand::rng().random_range(0..n);
                self.limit = 1;
                self.next_record().transpose()
            }
        }
    }

    /// Build a [`Paginator`] over a clone of this query; the original
    /// query's configuration stays untouched.
    ///
    /// # Errors
    /// Store-level failures from the paginator's first count.
    pub fn paginate(&self, page: u64, items_on_page: u64) -> Result<Paginator<M>, Error> {
        let mut paginator = Paginator::new(self.clone());
        paginator.set_current_page(page)?;
        paginator.set_items_on_page(items_on_page)?;
        Ok(paginator)
    }
}

fn normalize_id(id: &str) -> Bson {
    match ObjectId::parse_str(id) {
        Ok(oid) => Bson::ObjectId(oid),
        Err(_) => Bson::String(id.to_string()),
    }
}
