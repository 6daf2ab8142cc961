use std::sync::Arc;

use bson::{Bson, Document, oid::ObjectId};
use parking_lot::RwLock;

use crate::errors::Error;
use crate::handle::{CollectionHandle, FindAndModifyOptions, StoreCursor};
use crate::types::{Order, ReadPreference, SortSpec, TagSet, WriteConcern};

use super::cursor::MemCursor;
use super::eval;
use super::update;

/// One in-memory collection: an insertion-ordered record list behind a
/// lock, plus the read-preference/write-concern settings and the shaping
/// operation log its cursors write to.
pub struct MemCollection {
    name: String,
    records: Arc<RwLock<Vec<Document>>>,
    op_log: Arc<RwLock<Vec<String>>>,
    read_preference: RwLock<Option<(ReadPreference, Option<TagSet>)>>,
    write_concern: RwLock<WriteConcern>,
}

impl MemCollection {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: Arc::new(RwLock::new(Vec::new())),
            op_log: Arc::new(RwLock::new(Vec::new())),
            read_preference: RwLock::new(None),
            write_concern: RwLock::new(WriteConcern::default()),
        }
    }

    /// Shaping calls recorded by this collection's cursors, in issue order.
    #[must_use]
    pub fn shaping_log(&self) -> Vec<String> {
        self.op_log.read().clone()
    }

    pub fn clear_shaping_log(&self) {
        self.op_log.write().clear();
    }

    #[must_use]
    pub fn recorded_read_preference(&self) -> Option<(ReadPreference, Option<TagSet>)> {
        self.read_preference.read().clone()
    }

    #[must_use]
    pub fn recorded_write_concern(&self) -> WriteConcern {
        *self.write_concern.read()
    }

    fn matching_indices(&self, records: &[Document], condition: &Document) -> Vec<usize> {
        records
            .iter()
            .enumerate()
            .filter(|(_, r)| eval::matches(r, condition))
            .map(|(i, _)| i)
            .collect()
    }
}

impl CollectionHandle for MemCollection {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn find(&self, condition: &Document, projection: &Document) -> Box<dyn StoreCursor> {
        Box::new(MemCursor::new(
            self.records.clone(),
            self.op_log.clone(),
            condition.clone(),
            projection.clone(),
        ))
    }

    fn count(
        &self,
        condition: &Document,
        limit: Option<u64>,
        skip: Option<u64>,
    ) -> Result<u64, Error> {
        let records = self.records.read();
        let mut count = records.iter().filter(|r| eval::matches(r, condition)).count() as u64;
        if let Some(skip) = skip {
            count = count.saturating_sub(skip);
        }
        if let Some(limit) = limit {
            count = count.min(limit);
        }
        Ok(count)
    }

    fn find_one(
        &self,
        condition: &Document,
        projection: &Document,
    ) -> Result<Option<Document>, Error> {
        let records = self.records.read();
        Ok(records
            .iter()
            .find(|r| eval::matches(r, condition))
            .map(|r| eval::project(r, projection)))
    }

    fn find_and_modify(
        &self,
        condition: &Document,
        update_doc: Option<&Document>,
        projection: &Document,
        options: &FindAndModifyOptions,
    ) -> Result<Option<Document>, Error> {
        let mut records = self.records.write();
        let mut indices = self.matching_indices(&records, condition);
        if !options.sort.is_empty() {
            indices.sort_by(|&a, &b| eval::compare_records(&records[a], &records[b], &options.sort));
        }

        let Some(&index) = indices.first() else {
            if options.upsert && !options.remove {
                let update_doc = update_doc.ok_or_else(|| {
                    Error::StoreOperation("update document required for upsert".into())
                })?;
                let mut seeded = seed_from_condition(condition);
                if !seeded.contains_key("_id") {
                    seeded.insert("_id", ObjectId::new());
                }
                update::apply_update(&mut seeded, update_doc)?;
                records.push(seeded.clone());
                return Ok(options.new.then(|| eval::project(&seeded, projection)));
            }
            return Ok(None);
        };

        if options.remove {
            let removed = records.remove(index);
            return Ok(Some(eval::project(&removed, projection)));
        }

        let update_doc = update_doc
            .ok_or_else(|| Error::StoreOperation("update document required".into()))?;
        let before = records[index].clone();
        update::apply_update(&mut records[index], update_doc)?;
        let returned = if options.new { records[index].clone() } else { before };
        Ok(Some(eval::project(&returned, projection)))
    }

    fn aggregate(&self, pipeline: &[Document]) -> Result<Vec<Document>, Error> {
        let mut rows: Vec<Document> = self.records.read().clone();
        for stage in pipeline {
            let (op, spec) = match stage.iter().next() {
                Some((op, spec)) if stage.len() == 1 => (op.as_str(), spec),
                _ => {
                    return Err(Error::StoreOperation(format!(
                        "malformed pipeline stage: {stage}"
                    )));
                }
            };
            match (op, spec) {
                ("$match", Bson::Document(condition)) => {
                    rows.retain(|r| eval::matches(r, condition));
                }
                ("$sort", Bson::Document(sort_doc)) => {
                    let sort = sort_specs(sort_doc);
                    rows.sort_by(|a, b| eval::compare_records(a, b, &sort));
                }
                ("$skip", n) => {
                    let skip = n.as_i64().or_else(|| n.as_i32().map(i64::from)).unwrap_or(0);
                    let skip = usize::try_from(skip.max(0)).unwrap_or(usize::MAX);
                    rows = if skip >= rows.len() { Vec::new() } else { rows.split_off(skip) };
                }
                ("$limit", n) => {
                    let limit = n.as_i64().or_else(|| n.as_i32().map(i64::from)).unwrap_or(0);
                    rows.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
                }
                ("$project", Bson::Document(projection)) => {
                    for row in &mut rows {
                        *row = eval::project(row, projection);
                    }
                }
                ("$count", Bson::String(field)) => {
                    let mut counted = Document::new();
                    counted.insert(field.clone(), rows.len() as i64);
                    rows = vec![counted];
                }
                (other, _) => {
                    return Err(Error::StoreOperation(format!(
                        "unsupported pipeline stage: {other}"
                    )));
                }
            }
        }
        Ok(rows)
    }

    fn distinct(&self, field: &str, condition: Option<&Document>) -> Result<Vec<Bson>, Error> {
        let records = self.records.read();
        let mut values: Vec<Bson> = Vec::new();
        for record in records.iter() {
            if let Some(condition) = condition
                && !eval::matches(record, condition)
            {
                continue;
            }
            match eval::get_path(record, field) {
                // array fields contribute their elements
                Some(Bson::Array(items)) => {
                    for item in items {
                        if !values.contains(item) {
                            values.push(item.clone());
                        }
                    }
                }
                Some(value) => {
                    if !values.contains(value) {
                        values.push(value.clone());
                    }
                }
                None => {}
            }
        }
        Ok(values)
    }

    fn insert_batch(&self, new_records: &[Document]) -> Result<(), Error> {
        let mut records = self.records.write();
        for record in new_records {
            let mut record = record.clone();
            if !record.contains_key("_id") {
                record.insert("_id", ObjectId::new());
            }
            records.push(record);
        }
        Ok(())
    }

    fn update_many(&self, condition: &Document, update_doc: &Document) -> Result<u64, Error> {
        let mut records = self.records.write();
        let indices = self.matching_indices(&records, condition);
        for &index in &indices {
            update::apply_update(&mut records[index], update_doc)?;
        }
        Ok(indices.len() as u64)
    }

    fn remove(&self, condition: &Document) -> Result<u64, Error> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|r| !eval::matches(r, condition));
        Ok((before - records.len()) as u64)
    }

    fn drop_collection(&self) -> Result<(), Error> {
        self.records.write().clear();
        Ok(())
    }

    fn set_read_preference(
        &self,
        preference: ReadPreference,
        tags: Option<&[Document]>,
    ) -> Result<(), Error> {
        *self.read_preference.write() = Some((preference, tags.map(<[Document]>::to_vec)));
        Ok(())
    }

    fn set_write_concern(&self, concern: WriteConcern) -> Result<(), Error> {
        *self.write_concern.write() = concern;
        Ok(())
    }
}

fn sort_specs(sort_doc: &Document) -> Vec<SortSpec> {
    sort_doc
        .iter()
        .map(|(field, direction)| {
            let direction = direction.as_i64().or_else(|| direction.as_i32().map(i64::from));
            SortSpec {
                field: field.clone(),
                order: if direction.unwrap_or(1) < 0 { Order::Desc } else { Order::Asc },
            }
        })
        .collect()
}

fn seed_from_condition(condition: &Document) -> Document {
    let mut seeded = Document::new();
    for (path, value) in condition {
        match value {
            Bson::Document(sub) if eval::is_operator_document(sub) => {}
            literal => {
                update::set_path(&mut seeded, path, literal.clone());
            }
        }
    }
    seeded
}
