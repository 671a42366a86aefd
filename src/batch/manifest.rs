use super::*;

/// A JSON array on disk that only ever grows. Each append rewrites the file
/// atomically and fsyncs before returning.
#[derive(Debug)]
pub struct AppendOnlyLog<T> {
    path: PathBuf,
    entries: Vec<T>,
}

pub type JobManifest = AppendOnlyLog<JobRecord>;
pub type DeadLetterLog = AppendOnlyLog<DeadLetterRecord>;

impl<T> AppendOnlyLog<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn load(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
            if raw.iter().all(u8::is_ascii_whitespace) {
                Vec::new()
            } else {
                serde_json::from_slice(&raw)
                    .with_context(|| format!("failed to parse {}", path.display()))?
            }
        } else {
            Vec::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn append(&mut self, entry: T) -> Result<()> {
        self.entries.push(entry);
        if let Err(err) = write_json_durable(&self.path, &self.entries) {
            self.entries.pop();
            return Err(err);
        }
        Ok(())
    }
}

/// Where an interrupted submission picks up again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumePoint {
    pub next_shard_index: u64,
    pub offset: u64,
}

impl JobManifest {
    pub fn resume_point(&self) -> ResumePoint {
        let next_shard_index = self
            .entries
            .iter()
            .map(|record| record.shard_index)
            .max()
            .map(|index| index + 1)
            .unwrap_or(1);
        let offset = self
            .entries
            .iter()
            .map(|record| record.end_offset)
            .max()
            .unwrap_or(0);

        ResumePoint {
            next_shard_index,
            offset,
        }
    }

    pub fn submitted_request_count(&self) -> u64 {
        self.entries.iter().map(|record| record.request_count).sum()
    }
}
