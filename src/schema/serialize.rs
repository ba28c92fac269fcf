//! # Schema Serialization
//!
//! Renders a [`Schema`] into the textual form the sequence generator
//! consumes. Every style is the same traversal over tables, columns,
//! sampled values, and foreign keys; only the token layout differs, so
//! the styles are data ([`StyleLayout`]) rather than separate code
//! paths.
//!
//! The `compact` layout is the pipe-delimited form most checkpoints are
//! trained on:
//!
//! ```text
//!  | concert_singer | concert : concert_id , stadium_id | stadium : stadium_id , name
//! ```
//!
//! Content sampling (`with_content`) issues bounded read-only queries
//! against the database file and prefers values that appear in the
//! question, which is the strongest hint a generator can get about
//! literal values.

use std::collections::HashMap;
use std::path::Path;

use rand::seq::SliceRandom;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};

use crate::config::{SerializationConfig, SerializationStyle};
use crate::error::{TranslateError, TranslateResult};
use crate::schema::Schema;

/// Upper bound on rows scanned per column when sampling content.
const SAMPLE_SCAN_LIMIT: usize = 64;

/// Values longer than this are useless as generator hints.
const MAX_SAMPLE_LEN: usize = 32;

/// Token frames for one serialization style.
///
/// A rendered schema is:
/// `db_open db_id db_close` then per table
/// `table_open name columns_open col(, col)* table_close` joined by
/// `table_sep`, with columns as
/// `column_open name column_close [value_open v(, v)* value_close]`,
/// and finally `fk_open from fk_arrow to (fk_sep …)* fk_close`.
struct StyleLayout {
    db_open: &'static str,
    db_close: &'static str,
    table_open: &'static str,
    columns_open: &'static str,
    table_close: &'static str,
    table_sep: &'static str,
    column_open: &'static str,
    column_close: &'static str,
    column_sep: &'static str,
    value_open: &'static str,
    value_sep: &'static str,
    value_close: &'static str,
    fk_open: &'static str,
    fk_arrow: &'static str,
    fk_sep: &'static str,
    fk_close: &'static str,
}

/// `Database: d. Table: t. Columns: a, b. Foreign keys: t.a references u.b`
const VERBOSE: StyleLayout = StyleLayout {
    db_open: "Database: ",
    db_close: ". ",
    table_open: "Table: ",
    columns_open: ". Columns: ",
    table_close: "",
    table_sep: ". ",
    column_open: "",
    column_close: "",
    column_sep: ", ",
    value_open: " (",
    value_sep: ", ",
    value_close: ")",
    fk_open: ". Foreign keys: ",
    fk_arrow: " references ",
    fk_sep: ", ",
    fk_close: "",
};

/// ` | d | t : a , b | t.a = u.b`
const COMPACT: StyleLayout = StyleLayout {
    db_open: " | ",
    db_close: "",
    table_open: " | ",
    columns_open: " : ",
    table_close: "",
    table_sep: "",
    column_open: "",
    column_close: "",
    column_sep: " , ",
    value_open: " ( ",
    value_sep: " , ",
    value_close: " )",
    fk_open: " | ",
    fk_arrow: " = ",
    fk_sep: " , ",
    fk_close: "",
};

/// `CREATE TABLE "t" ("a", "b");` with foreign keys as comment lines
const DDL: StyleLayout = StyleLayout {
    db_open: "-- Database: ",
    db_close: "\n",
    table_open: "CREATE TABLE \"",
    columns_open: "\" (",
    table_close: ");",
    table_sep: "\n",
    column_open: "\"",
    column_close: "\"",
    column_sep: ", ",
    value_open: " /* ",
    value_sep: ", ",
    value_close: " */",
    fk_open: "\n-- foreign keys:\n-- ",
    fk_arrow: " REFERENCES ",
    fk_sep: "\n-- ",
    fk_close: "",
};

/// `[d] t ( a , b ) u ( c ) t.a -> u.c`
const GROUPED: StyleLayout = StyleLayout {
    db_open: "[",
    db_close: "] ",
    table_open: "",
    columns_open: " ( ",
    table_close: " )",
    table_sep: " ",
    column_open: "",
    column_close: "",
    column_sep: " , ",
    value_open: " [",
    value_sep: " , ",
    value_close: "]",
    fk_open: " ",
    fk_arrow: " -> ",
    fk_sep: " , ",
    fk_close: "",
};

impl StyleLayout {
    fn of(style: SerializationStyle) -> &'static StyleLayout {
        match style {
            SerializationStyle::Verbose => &VERBOSE,
            SerializationStyle::Compact => &COMPACT,
            SerializationStyle::Ddl => &DDL,
            SerializationStyle::Grouped => &GROUPED,
        }
    }
}

/// Per-request overrides for a subset of [`SerializationConfig`]; the
/// `/serialized-schema` endpoint exposes these as query parameters.
#[derive(Debug, Clone, Default)]
pub struct SerializationOverrides {
    pub style: Option<SerializationStyle>,
    pub randomize_order: Option<bool>,
    pub with_db_id: Option<bool>,
    pub with_content: Option<bool>,
}

impl SerializationOverrides {
    /// Merge over the configured defaults.
    pub fn apply(&self, base: &SerializationConfig) -> SerializationConfig {
        let mut config = base.clone();
        if let Some(style) = self.style {
            config.style = style;
        }
        if let Some(v) = self.randomize_order {
            config.randomize_order = v;
        }
        if let Some(v) = self.with_db_id {
            config.with_db_id = v;
        }
        if let Some(v) = self.with_content {
            config.with_content = v;
        }
        config
    }
}

/// Assemble the text handed to the generator:
/// `prefix + question + " " + serialized schema`, both sides trimmed.
pub fn generator_input(question: &str, serialized_schema: &str, prefix: &str) -> String {
    format!("{prefix}{} {}", question.trim(), serialized_schema.trim())
}

/// Renders schemas according to one [`SerializationConfig`].
///
/// Rendering is deterministic for fixed inputs unless `randomize_order`
/// is set, which shuffles table order and column order within each table
/// with a fresh per-call RNG.
#[derive(Debug, Clone)]
pub struct SchemaSerializer {
    config: SerializationConfig,
}

impl SchemaSerializer {
    pub fn new(config: SerializationConfig) -> Self {
        SchemaSerializer { config }
    }

    pub fn config(&self) -> &SerializationConfig {
        &self.config
    }

    /// Render `schema` for `question`.
    ///
    /// `db_file` is only opened when `with_content` is set; the question
    /// steers which sampled values are kept. Blocking when sampling, so
    /// async callers run this on the blocking pool.
    pub fn serialize(
        &self,
        schema: &Schema,
        question: &str,
        db_file: &Path,
    ) -> TranslateResult<String> {
        let samples = if self.config.with_content {
            Some(self.collect_samples(schema, question, db_file)?)
        } else {
            None
        };
        Ok(self.render(schema, samples.as_ref()))
    }

    fn render(&self, schema: &Schema, samples: Option<&HashMap<usize, Vec<String>>>) -> String {
        let layout = StyleLayout::of(self.config.style);

        let mut table_order: Vec<usize> = (0..schema.tables.len()).collect();
        let mut column_orders: Vec<Vec<usize>> = (0..schema.tables.len())
            .map(|t| {
                schema
                    .columns
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| c.table_index == t)
                    .map(|(i, _)| i)
                    .collect()
            })
            .collect();
        if self.config.randomize_order {
            let mut rng = rand::thread_rng();
            table_order.shuffle(&mut rng);
            for order in &mut column_orders {
                order.shuffle(&mut rng);
            }
        }

        let mut out = String::new();
        if self.config.with_db_id {
            out.push_str(layout.db_open);
            out.push_str(&schema.db_id);
            out.push_str(layout.db_close);
        }

        let table_fragments: Vec<String> = table_order
            .iter()
            .map(|&t| {
                let columns: Vec<String> = column_orders[t]
                    .iter()
                    .map(|&ci| self.column_fragment(schema, ci, samples, layout))
                    .collect();
                format!(
                    "{}{}{}{}{}",
                    layout.table_open,
                    self.display_name(&schema.tables[t].name),
                    layout.columns_open,
                    columns.join(layout.column_sep),
                    layout.table_close
                )
            })
            .collect();
        out.push_str(&table_fragments.join(layout.table_sep));

        if self.config.with_foreign_keys && !schema.foreign_keys.is_empty() {
            let pairs: Vec<String> = schema
                .foreign_keys
                .iter()
                .filter_map(|fk| {
                    Some(format!(
                        "{}{}{}",
                        self.fk_label(schema, fk.from_column)?,
                        layout.fk_arrow,
                        self.fk_label(schema, fk.to_column)?
                    ))
                })
                .collect();
            if !pairs.is_empty() {
                out.push_str(layout.fk_open);
                out.push_str(&pairs.join(layout.fk_sep));
                out.push_str(layout.fk_close);
            }
        }

        out
    }

    fn column_fragment(
        &self,
        schema: &Schema,
        column_index: usize,
        samples: Option<&HashMap<usize, Vec<String>>>,
        layout: &StyleLayout,
    ) -> String {
        let mut fragment = format!(
            "{}{}{}",
            layout.column_open,
            self.display_name(&schema.columns[column_index].name),
            layout.column_close
        );
        if let Some(values) = samples.and_then(|s| s.get(&column_index)) {
            if !values.is_empty() {
                fragment.push_str(layout.value_open);
                fragment.push_str(&values.join(layout.value_sep));
                fragment.push_str(layout.value_close);
            }
        }
        fragment
    }

    fn display_name(&self, name: &str) -> String {
        if self.config.normalize_columns {
            name.to_lowercase()
        } else {
            name.to_string()
        }
    }

    fn fk_label(&self, schema: &Schema, column_index: usize) -> Option<String> {
        let column = schema.columns.get(column_index)?;
        let table = schema.tables.get(column.table_index)?;
        Some(format!(
            "{}.{}",
            self.display_name(&table.name),
            self.display_name(&column.name)
        ))
    }

    fn collect_samples(
        &self,
        schema: &Schema,
        question: &str,
        db_file: &Path,
    ) -> TranslateResult<HashMap<usize, Vec<String>>> {
        let read_err = |e: rusqlite::Error| TranslateError::SchemaRead {
            db_id: schema.db_id.clone(),
            message: e.to_string(),
        };
        let conn = Connection::open_with_flags(db_file, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(read_err)?;

        let mut samples = HashMap::new();
        for (i, column) in schema.columns.iter().enumerate() {
            let Some(table) = schema.tables.get(column.table_index) else {
                continue;
            };
            let values = sample_column_values(
                &conn,
                &table.name,
                &column.name,
                question,
                self.config.content_sample_limit,
            )
            .map_err(read_err)?;
            if !values.is_empty() {
                samples.insert(i, values);
            }
        }
        Ok(samples)
    }
}

/// Representative values for one column, question-matched values first.
fn sample_column_values(
    conn: &Connection,
    table: &str,
    column: &str,
    question: &str,
    limit: usize,
) -> rusqlite::Result<Vec<String>> {
    let sql = format!(
        "SELECT DISTINCT {col} FROM {table} WHERE {col} IS NOT NULL LIMIT {SAMPLE_SCAN_LIMIT}",
        col = quote_ident(column),
        table = quote_ident(table),
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    let mut values = Vec::new();
    while let Some(row) = rows.next()? {
        let text = match row.get_ref(0)? {
            ValueRef::Integer(i) => i.to_string(),
            ValueRef::Real(f) => f.to_string(),
            ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
            // blobs are never useful as generator hints
            _ => continue,
        };
        if text.is_empty() || text.len() > MAX_SAMPLE_LEN {
            continue;
        }
        values.push(text);
    }

    let question_lc = question.to_lowercase();
    let (matched, rest): (Vec<String>, Vec<String>) = values
        .into_iter()
        .partition(|v| question_lc.contains(&v.to_lowercase()));
    Ok(matched.into_iter().chain(rest).take(limit).collect())
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
