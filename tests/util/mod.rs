use chat_forensics::ingest::load_store;
use chat_forensics::store::MessageStore;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: std::sync::Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }

    pub fn count(&self, needle: &str) -> usize {
        self.output().matches(needle).count()
    }
}

#[allow(dead_code)]
struct TestWriter(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.0.lock().unwrap();
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[allow(dead_code)]
pub struct EnvGuard {
    key: String,
    prev: Option<String>,
}

#[allow(dead_code)]
impl EnvGuard {
    pub fn set(key: &str, val: impl AsRef<str>) -> Self {
        let prev = std::env::var(key).ok();
        unsafe { std::env::set_var(key, val.as_ref()) };
        Self {
            key: key.to_string(),
            prev,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.prev {
            Some(v) => unsafe { std::env::set_var(&self.key, v) },
            None => unsafe { std::env::remove_var(&self.key) },
        }
    }
}

/// Builds a normalized JSON Lines export, one object per message.
#[allow(dead_code)]
#[derive(Debug, Clone, Default)]
pub struct ExportFixture {
    rows: Vec<Value>,
}

#[allow(dead_code)]
impl ExportFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Two-party message. Ids are assigned sequentially as `m1`, `m2`, ...
    pub fn direct(mut self, sender: &str, receiver: &str, sent_at: &str, body: &str) -> Self {
        let id = format!("m{}", self.rows.len() + 1);
        self.rows.push(json!({
            "msg_id": id,
            "sender": sender,
            "receiver": receiver,
            "sent_at": sent_at,
            "body": body,
        }));
        self
    }

    pub fn group(mut self, group_id: &str, sender: &str, sent_at: &str, body: &str) -> Self {
        let id = format!("m{}", self.rows.len() + 1);
        self.rows.push(json!({
            "msg_id": id,
            "sender": sender,
            "group_id": group_id,
            "sent_at": sent_at,
            "body": body,
        }));
        self
    }

    /// Set or override a field on the most recently added row.
    pub fn field(mut self, name: &str, value: Value) -> Self {
        if let Some(Value::Object(map)) = self.rows.last_mut() {
            map.insert(name.to_string(), value);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn write(&self, path: &Path) -> PathBuf {
        let body: String = self
            .rows
            .iter()
            .map(|row| format!("{row}\n"))
            .collect();
        std::fs::write(path, body).expect("write fixture");
        path.to_path_buf()
    }
}

/// The two-conversation export used across scenario tests: A<->B with one
/// January "hello" and two February messages, group G with one January message.
#[allow(dead_code)]
pub fn scenario_export() -> ExportFixture {
    ExportFixture::new()
        .direct("A", "B", "2024-01-01 09:00:00", "hello there")
        .direct("B", "A", "2024-02-01 10:00:00", "how are you")
        .direct("A", "B", "2024-02-01 10:05:00", "see you")
        .group("G", "C", "2024-01-15 12:00:00", "group ping")
}

#[allow(dead_code)]
pub struct TempFixtureDir {
    pub dir: TempDir,
}

#[allow(dead_code)]
impl TempFixtureDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("tempdir"),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Write `fixture` as `messages.jsonl` and return its path.
    pub fn export(&self, fixture: &ExportFixture) -> PathBuf {
        fixture.write(&self.dir.path().join("messages.jsonl"))
    }

    pub fn load(&self, fixture: &ExportFixture) -> MessageStore {
        let path = self.export(fixture);
        load_store(&[path], None).expect("load fixture store")
    }
}
