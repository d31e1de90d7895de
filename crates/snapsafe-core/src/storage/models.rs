/// One durable row for the content-hash index: a file accepted for copy in
/// this or any prior run. `hash` is the unique dedup key.
#[derive(Debug, Clone)]
pub struct IndexRecord {
    pub src_path: String,
    pub dest_path: String,
    pub hash: String,
    pub size: i64,
    pub mtime: i64,
    pub inserted_at: String,
}

impl IndexRecord {
    pub fn new(src_path: String, dest_path: String, hash: String, size: i64, mtime: i64) -> Self {
        Self {
            src_path,
            dest_path,
            hash,
            size,
            mtime,
            inserted_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
