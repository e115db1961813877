use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::fs::OpenOptions;
use std::hash::{Hash, Hasher};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::{DbError, DbResult};
use crate::heap_file::HeapFile;
use crate::tuple::TupleDesc;
use crate::types::Type;

/// The set of tables known to a database instance. Table ids are derived
/// deterministically by hashing a table's canonicalized file path, so a
/// fresh `Catalog` that reopens the same files agrees with a prior run
/// without needing to persist an id-to-path mapping.
pub struct Catalog {
    by_name: RwLock<HashMap<String, Arc<HeapFile>>>,
    by_id: RwLock<HashMap<i64, Arc<HeapFile>>>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    pub fn new() -> Self {
        Catalog {
            by_name: RwLock::new(HashMap::new()),
            by_id: RwLock::new(HashMap::new()),
        }
    }

    fn table_id_for_path(path: &Path) -> DbResult<i64> {
        let canonical = path
            .canonicalize()
            .or_else(|_| {
                // the file may not exist yet; canonicalize the parent and
                // re-append the file name so the id is still stable.
                let parent = path.parent().unwrap_or_else(|| Path::new("."));
                std::fs::create_dir_all(parent)?;
                Ok::<PathBuf, std::io::Error>(parent.canonicalize()?.join(
                    path.file_name()
                        .ok_or_else(|| std::io::Error::other("table path has no file name"))?,
                ))
            })
            .map_err(DbError::Io)?;
        let mut hasher = DefaultHasher::new();
        canonical.hash(&mut hasher);
        Ok(hasher.finish() as i64)
    }

    /// Opens (creating if necessary) the file at `path` as a heap table
    /// with schema `td`, registers it under `name` (defaulting to the
    /// file stem), and returns its deterministic table id.
    pub fn add_table(
        &self,
        path: impl AsRef<Path>,
        td: TupleDesc,
        name: Option<String>,
        page_size: usize,
    ) -> DbResult<i64> {
        let path = path.as_ref();
        let id = Self::table_id_for_path(path)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;
        let name = name.unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| id.to_string())
        });
        let heap_file = Arc::new(HeapFile::new(file, td, id, page_size));
        self.by_name.write().unwrap().insert(name, heap_file.clone());
        self.by_id.write().unwrap().insert(id, heap_file);
        Ok(id)
    }

    pub fn table_by_name(&self, name: &str) -> Option<Arc<HeapFile>> {
        self.by_name.read().unwrap().get(name).cloned()
    }

    pub fn heap_file(&self, table_id: i64) -> DbResult<Arc<HeapFile>> {
        self.by_id
            .read()
            .unwrap()
            .get(&table_id)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("no table with id {}", table_id)))
    }

    pub fn tuple_desc(&self, table_id: i64) -> DbResult<TupleDesc> {
        Ok(self.heap_file(table_id)?.tuple_desc().clone())
    }

    /// Loads table definitions from a text schema file, one table per
    /// line, in the form `name (col: Int, col: String(20), ...)`. Data
    /// files are created alongside the schema file as `<name>.dat`.
    pub fn load_schema(&self, schema_path: impl AsRef<Path>, page_size: usize) -> DbResult<()> {
        let schema_path = schema_path.as_ref();
        let data_dir = schema_path.parent().unwrap_or_else(|| Path::new("."));
        let file = std::fs::File::open(schema_path)?;
        for line in BufReader::new(file).lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let open = line
                .find('(')
                .ok_or_else(|| DbError::Schema(format!("malformed schema line: {}", line)))?;
            let table_name = line[..open].trim().to_string();
            let close = line
                .rfind(')')
                .ok_or_else(|| DbError::Schema(format!("malformed schema line: {}", line)))?;
            let mut names = vec![];
            let mut types = vec![];
            for field in line[open + 1..close].split(',') {
                let mut parts = field.splitn(2, ':');
                let fname = parts
                    .next()
                    .ok_or_else(|| DbError::Schema(format!("malformed field in: {}", line)))?
                    .trim()
                    .to_string();
                let ftype = parts
                    .next()
                    .ok_or_else(|| DbError::Schema(format!("missing type for field {}", fname)))?
                    .trim();
                let parsed = parse_type(ftype)?;
                names.push(fname);
                types.push(parsed);
            }
            let td = TupleDesc::named(types, names);
            self.add_table(data_dir.join(format!("{}.dat", table_name)), td, Some(table_name), page_size)?;
        }
        Ok(())
    }
}

fn parse_type(spec: &str) -> DbResult<Type> {
    if spec.eq_ignore_ascii_case("Int") {
        return Ok(Type::Int);
    }
    if let Some(rest) = spec
        .strip_prefix("String(")
        .or_else(|| spec.strip_prefix("string("))
    {
        let bound = rest
            .trim_end_matches(')')
            .trim()
            .parse::<usize>()
            .map_err(|_| DbError::Schema(format!("invalid string bound in: {}", spec)))?;
        return Ok(Type::Str(bound));
    }
    Err(DbError::Schema(format!("unknown field type: {}", spec)))
}
